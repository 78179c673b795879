//! Printer hardware configuration.

use serde::{Deserialize, Serialize};

use super::units::{Ms, Nm, TowerGeometry, Ustep};

/// Immutable printer configuration, built once at startup.
///
/// Every field has a default matching the SL1 printer, so a TOML file only
/// needs to list what differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HwConfig {
    /// Tower lead screw geometry
    pub tower_geometry: TowerGeometry,
    /// Tower travel from the tank to the top endstop
    pub tower_height: Nm,
    /// Extra tower offset applied to the print start position
    pub calib_tower_offset: Nm,
    /// Tower homing sensitivity (-2..=2)
    pub tower_sensitivity: i8,

    /// Whether the tilt is used for tear-off
    pub tilt: bool,
    /// Tilt position at layer exposure
    pub tilt_height: Ustep,
    /// Lowest reachable tilt position
    pub tilt_min: Ustep,
    /// Highest reachable tilt position
    pub tilt_max: Ustep,
    /// Distance from home still treated as "at home"
    pub tilt_homing_tolerance: Ustep,
    /// Tilt homing sensitivity (-2..=2)
    pub tilt_sensitivity: i8,

    /// Exposed area percentage above which a layer counts as large
    pub limit4fast: u8,
    /// Exposure display geometry
    pub display: DisplayGeometry,
    /// Tower travel printed with slow tear-off after a large layer
    pub force_slow_tilt_height: Nm,

    /// Tilt strokes per resin stir
    pub stirring_moves: u8,
    /// Settling delay after stirring
    pub stirring_delay: Ms,

    /// Expose large layers in two halves
    pub per_partes: bool,
    /// UV LED timed per layer by the controller instead of kept on
    pub blink_exposure: bool,
    /// Pause when the cover opens
    pub cover_check: bool,
    /// Measure resin before printing
    pub resin_sensor: bool,

    /// Keep UV LED on while going up and down
    pub up_and_down_uv_on: bool,
    /// Wait at the top during up and down
    pub up_and_down_wait: Ms,
    /// Automatic up and down period in layers, 0 disables
    pub up_and_down_every_layer: u32,
    /// Tower offset added after up and down
    pub up_and_down_z_offset: Nm,
    /// Extra exposure of the layer after up and down
    pub up_and_down_expo_comp: Ms,

    /// Duration of a fast layer change
    pub tilt_fast_time: Ms,
    /// Duration of a slow layer change
    pub tilt_slow_time: Ms,

    /// Poll interval while waiting for a move
    pub move_poll_interval: Ms,
    /// Poll interval while waiting for homing
    pub homing_poll_interval: Ms,
    /// Give up waiting for a move after this long
    pub move_timeout: Ms,

    /// Highest UV LED temperature allowed at print start
    pub max_uv_temperature: f32,
    /// Resin volume limits
    pub resin: ResinLimits,
}

impl Default for HwConfig {
    fn default() -> Self {
        Self {
            tower_geometry: TowerGeometry::default(),
            tower_height: Nm::from_mm(120),
            calib_tower_offset: Nm::ZERO,
            tower_sensitivity: 0,
            tilt: true,
            tilt_height: Ustep(4928),
            tilt_min: Ustep(-12800),
            tilt_max: Ustep(6016),
            tilt_homing_tolerance: Ustep(96),
            tilt_sensitivity: 0,
            limit4fast: 35,
            display: DisplayGeometry::default(),
            force_slow_tilt_height: Nm(1_000_000),
            stirring_moves: 3,
            stirring_delay: Ms(500),
            per_partes: false,
            blink_exposure: true,
            cover_check: true,
            resin_sensor: true,
            up_and_down_uv_on: false,
            up_and_down_wait: Ms::from_secs(10),
            up_and_down_every_layer: 0,
            up_and_down_z_offset: Nm::ZERO,
            up_and_down_expo_comp: Ms::ZERO,
            tilt_fast_time: Ms(5500),
            tilt_slow_time: Ms(8000),
            move_poll_interval: Ms(100),
            homing_poll_interval: Ms(250),
            move_timeout: Ms::from_secs(120),
            max_uv_temperature: 55.0,
            resin: ResinLimits::default(),
        }
    }
}

impl HwConfig {
    /// White pixel count above which a layer is printed slow.
    pub fn white_pixels_threshold(&self) -> u32 {
        let pixels = u64::from(self.display.width_px) * u64::from(self.display.height_px);
        (pixels * u64::from(self.limit4fast) / 100) as u32
    }

    /// Tower position at the top endstop.
    pub fn tower_end(&self) -> Nm {
        self.tower_height
    }
}

/// Exposure display resolution and pixel pitch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayGeometry {
    /// Horizontal resolution
    pub width_px: u32,
    /// Vertical resolution
    pub height_px: u32,
    /// Pixel edge length
    pub pixel_size: Nm,
}

impl Default for DisplayGeometry {
    fn default() -> Self {
        Self {
            width_px: 1440,
            height_px: 2560,
            pixel_size: Nm(46_875),
        }
    }
}

impl DisplayGeometry {
    /// Area of one pixel in square millimeters.
    pub fn pixel_area_mm2(&self) -> f64 {
        let edge = self.pixel_size.to_mm();
        edge * edge
    }
}

/// Resin volume limits in milliliters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResinLimits {
    /// Below this the print cannot start
    pub min_ml: f32,
    /// Tank capacity
    pub max_ml: f32,
    /// Warn when the remaining resin drops below this
    pub low_warn_ml: f32,
    /// Ask for a refill when the remaining resin drops below this
    pub feed_wait_ml: f32,
}

impl Default for ResinLimits {
    fn default() -> Self {
        Self {
            min_ml: 68.5,
            max_ml: 200.0,
            low_warn_ml: 60.0,
            feed_wait_ml: 50.0,
        }
    }
}

impl ResinLimits {
    /// Volume needed to print `used_ml` of resin, capped at tank capacity.
    pub fn required_ml(&self, used_ml: f32) -> f32 {
        (used_ml + self.min_ml).min(self.max_ml)
    }
}
