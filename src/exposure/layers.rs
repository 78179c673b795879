//! Per-layer step height and exposure time, resin use and time estimates.

use crate::config::units::{Ms, Nm};
use crate::config::ProjectConfig;
use crate::profile::LayerChange;

/// Height and exposure time of one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerPlan {
    /// Tower step before the layer
    pub height: Nm,
    /// Exposure time
    pub etime: Ms,
}

/// Buckets layer indices into height/time pairs.
///
/// - layer 0: first layer height, first exposure time
/// - layers 1 and 2: regular height, first exposure time
/// - the next `fade_layers` layers: exposure time falls linearly toward the
///   regular time
/// - then regular height and time, switching to the second and third pair
///   at layer numbers `slice2` and `slice3`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerPlanner {
    first_height: Nm,
    height: Nm,
    etime: Ms,
    etime_first: Ms,
    fade_layers: u32,
    slice2: u32,
    slice3: u32,
    second: (Nm, Ms),
    third: (Nm, Ms),
}

impl LayerPlanner {
    /// Planner for a project.
    pub fn new(config: &ProjectConfig) -> Self {
        Self {
            first_height: config.first_layer_height(),
            height: config.layer_height,
            etime: config.exposure_time,
            etime_first: config.exposure_time_first,
            fade_layers: u32::from(config.fade_layers),
            slice2: config.slice2,
            slice3: config.slice3,
            second: config.second_pair(),
            third: config.third_pair(),
        }
    }

    /// Plan of layer `index`.
    pub fn plan(&self, index: u32) -> LayerPlan {
        let (height, etime) = if index == 0 {
            (self.first_height, self.etime_first)
        } else if index < 3 {
            (self.height, self.etime_first)
        } else if index < self.fade_layers + 3 {
            (self.height, self.fade(index))
        } else if index.saturating_add(1) < self.slice2 {
            (self.height, self.etime)
        } else if index.saturating_add(1) < self.slice3 {
            self.second
        } else {
            self.third
        };
        LayerPlan { height, etime }
    }

    fn fade(&self, index: u32) -> Ms {
        let first = i64::from(self.etime_first.0);
        let last = i64::from(self.etime.0);
        let step = i64::from(index - 2);
        let etime = first - (first - last) * step / i64::from(self.fade_layers + 1);
        Ms(etime.clamp(0, i64::from(u32::MAX)) as u32)
    }

    /// Tower travel of layers `0..layers`.
    pub fn total_height(&self, layers: u32) -> Nm {
        (0..layers).fold(Nm::ZERO, |acc, i| acc + self.plan(i).height)
    }
}

/// Resin consumed by one layer in ml.
pub fn layer_resin_ml(white_pixels: u32, pixel_area_mm2: f64, height: Nm) -> f64 {
    (f64::from(white_pixels) * pixel_area_mm2 * height.to_mm() / 1000.0).max(0.0)
}

/// Expected duration of layers `from..total`.
///
/// The first `slow_layers` of them are counted with the slow layer change.
pub fn estimate_remaining(
    planner: &LayerPlanner,
    from: u32,
    total: u32,
    slow_layers: u32,
    fast: &LayerChange,
    slow: &LayerChange,
) -> Ms {
    let mut remaining = Ms::ZERO;
    for (n, index) in (from..total).enumerate() {
        let change = if (n as u64) < u64::from(slow_layers) {
            slow
        } else {
            fast
        };
        remaining += planner.plan(index).etime
            + change.moves_time
            + change.delay_before_exposure
            + change.delay_after_exposure;
    }
    remaining
}

/// Whole minutes of `time`, rounded to nearest.
pub fn to_minutes(time: Ms) -> u32 {
    libm::round(f64::from(time.0) / 60_000.0) as u32
}
