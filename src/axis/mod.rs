//! Tower and tilt axis controllers.
//!
//! Both axes share one [`McLink`]. Each one keeps its moving profiles, homing
//! sensitivity and last commanded target; the tilt additionally owns the
//! tear-off choreography.
//!
//! # Example
//!
//! ```rust
//! use sla_exposure::axis::{Axes, Axis};
//! use sla_exposure::config::{HwConfig, Nm};
//! use sla_exposure::controller::{McLink, SimulatedController};
//! use sla_exposure::timing::RecordingDelay;
//!
//! let link = McLink::new(SimulatedController::new());
//! let mut axes = Axes::with_defaults(link, RecordingDelay::new(), &HwConfig::default()).unwrap();
//! axes.start().unwrap();
//! axes.tower.sync_ensure(2).unwrap();
//! axes.tower.move_ensure(Nm::from_mm(10)).unwrap();
//! assert_eq!(axes.tower.position().unwrap(), Nm::from_mm(10));
//! ```

mod common;
mod sensitivity;
mod tear_off;
mod tilt;
mod tower;

use core::fmt;

use embedded_hal::delay::DelayNs;
use log::warn;

use crate::config::HwConfig;
use crate::controller::{AxisKind, HomingStatus, McLink, MotionController};
use crate::error::Result;
use crate::profile::{ProfileId, ProfileSet, TiltMovingProfiles, TowerMovingProfiles};

pub use common::{AxisTiming, HOMING_CONFIRMATIONS, MOVE_TRIES};
pub use sensitivity::{
    check_sensitivity, SensitivityTable, SENSITIVITY_MAX, SENSITIVITY_MIN, TILT_SENSITIVITY,
    TOWER_SENSITIVITY,
};
pub use tear_off::{TearOffStrategy, RELEASE_STEP};
pub use tilt::Tilt;
pub use tower::Tower;

/// Common operations of a controlled axis.
///
/// Positions are in the axis' own unit: nanometers for the tower,
/// microsteps for the tilt.
pub trait Axis {
    /// Position unit.
    type Unit: Copy + PartialEq + fmt::Debug;
    /// Moving profile identifier.
    type Profile: ProfileId;

    /// Which axis this is.
    fn kind(&self) -> AxisKind;

    /// Current position.
    fn position(&self) -> Result<Self::Unit>;

    /// Overwrite the position counter.
    ///
    /// # Errors
    ///
    /// `PositionFailed` while the axis moves.
    fn set_position(&mut self, position: Self::Unit) -> Result<()>;

    /// Last commanded target.
    fn target_position(&self) -> Self::Unit;

    /// Position after a successful homing.
    fn home_position(&self) -> Self::Unit;

    /// True while the axis moves.
    fn is_moving(&self) -> Result<bool>;

    /// Start a move and return immediately.
    fn move_to(&mut self, target: Self::Unit) -> Result<()>;

    /// Block until the axis stops.
    fn wait_stopped(&mut self) -> Result<()>;

    /// Move and verify the reached position, retrying stalled moves.
    fn move_ensure(&mut self, target: Self::Unit) -> Result<()>;

    /// Stop; the target becomes the current position.
    fn stop(&mut self) -> Result<()>;

    /// Disable the motor driver.
    fn release(&mut self) -> Result<()>;

    /// Start homing.
    fn sync(&mut self) -> Result<()>;

    /// Current homing state.
    fn homing_status(&self) -> Result<HomingStatus>;

    /// Home, retrying failed attempts `retries` times.
    fn sync_ensure(&mut self, retries: u8) -> Result<()>;

    /// Find the lowest reliable homing sensitivity.
    fn home_calibrate(&mut self) -> Result<i8>;

    /// Homing sensitivity in use.
    fn sensitivity(&self) -> i8;

    /// Change the homing sensitivity.
    fn set_sensitivity(&mut self, sensitivity: i8) -> Result<()>;

    /// Active moving profile, if one was set.
    fn actual_profile(&self) -> Option<Self::Profile>;

    /// Activate a moving profile.
    fn set_actual_profile(&mut self, profile: Self::Profile) -> Result<()>;

    /// Write every moving profile to the controller.
    fn apply_all_profiles(&mut self) -> Result<()>;

    /// True once homed.
    fn synced(&self) -> Result<bool> {
        Ok(self.homing_status()? == HomingStatus::Synced)
    }

    /// True when stopped at the last commanded target.
    fn on_target_position(&self) -> Result<bool> {
        Ok(!self.is_moving()? && self.position()? == self.target_position())
    }
}

/// Both axes of a printer.
pub struct Axes<C, D> {
    /// Build platform
    pub tower: Tower<C, D>,
    /// Resin tank
    pub tilt: Tilt<C, D>,
    tower_sensitivity: i8,
    tilt_sensitivity: i8,
}

impl<C, D> Axes<C, D>
where
    C: MotionController,
    D: DelayNs + Clone,
{
    /// Create both axes from explicit moving profiles.
    pub fn new(
        link: McLink<C>,
        delay: D,
        config: &HwConfig,
        tower_profiles: ProfileSet<TowerMovingProfiles>,
        tilt_profiles: ProfileSet<TiltMovingProfiles>,
    ) -> Result<Self> {
        check_sensitivity(config.tower_sensitivity)?;
        check_sensitivity(config.tilt_sensitivity)?;
        Ok(Self {
            tower: Tower::new(link.clone(), delay.clone(), config, tower_profiles)?,
            tilt: Tilt::new(link, delay, config, tilt_profiles)?,
            tower_sensitivity: config.tower_sensitivity,
            tilt_sensitivity: config.tilt_sensitivity,
        })
    }

    /// Create both axes with the compiled-in moving profiles.
    pub fn with_defaults(link: McLink<C>, delay: D, config: &HwConfig) -> Result<Self> {
        Self::new(link, delay, config, ProfileSet::new(), ProfileSet::new())
    }
}

impl<C, D> Axes<C, D>
where
    C: MotionController,
    D: DelayNs,
{
    /// Apply configured sensitivities and write all profiles.
    pub fn start(&mut self) -> Result<()> {
        self.tower.set_sensitivity(self.tower_sensitivity)?;
        self.tilt.set_sensitivity(self.tilt_sensitivity)?;
        self.tower.apply_all_profiles()?;
        self.tilt.apply_all_profiles()
    }

    /// Release both motors, reporting the first failure.
    pub fn release_motors(&mut self) -> Result<()> {
        let tower = self.tower.release();
        let tilt = self.tilt.release();
        if let Err(e) = &tower {
            warn!("tower release failed: {}", e);
        }
        tower.and(tilt)
    }
}

impl<C, D> fmt::Debug for Axes<C, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Axes")
            .field("tower_sensitivity", &self.tower_sensitivity)
            .field("tilt_sensitivity", &self.tilt_sensitivity)
            .finish_non_exhaustive()
    }
}
