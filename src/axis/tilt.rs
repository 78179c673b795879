//! Resin tank tilt axis in microsteps.

use core::fmt;

use embedded_hal::delay::DelayNs;
use log::debug;

use crate::config::units::Ustep;
use crate::config::HwConfig;
use crate::controller::{AxisKind, HomingStatus, McLink, MotionController};
use crate::error::{ConfigError, Result};
use crate::profile::{ProfileSet, TiltMoveParams, TiltMovingProfiles, TiltProfileId};

use super::common::{AxisCore, AxisTiming};
use super::sensitivity::TILT_SENSITIVITY;
use super::tear_off::TearOffStrategy;
use super::Axis;

/// Resin tank tilt controller.
///
/// Home is the bottom endstop at zero.
pub struct Tilt<C, D> {
    core: AxisCore<C, D, TiltMovingProfiles>,
    tear_off: TearOffStrategy,
}

impl<C, D> Tilt<C, D>
where
    C: MotionController,
    D: DelayNs,
{
    /// Create the tilt controller.
    pub fn new(
        link: McLink<C>,
        delay: D,
        config: &HwConfig,
        profiles: ProfileSet<TiltMovingProfiles>,
    ) -> Result<Self> {
        if config.tilt_min.0 >= config.tilt_max.0 {
            return Err(ConfigError::InvalidTiltLimits {
                min: config.tilt_min.0,
                max: config.tilt_max.0,
            }
            .into());
        }
        Ok(Self {
            core: AxisCore::new(
                AxisKind::Tilt,
                link,
                delay,
                profiles,
                &TILT_SENSITIVITY,
                0,
                AxisTiming::from_config(config),
            )?,
            tear_off: TearOffStrategy::from_config(config),
        })
    }

    /// Tank level position.
    #[inline]
    pub fn height(&self) -> Ustep {
        self.tear_off.height
    }

    /// Tear-off parameters.
    #[inline]
    pub fn tear_off(&self) -> &TearOffStrategy {
        &self.tear_off
    }

    /// Replace the tear-off parameters.
    pub fn set_tear_off(&mut self, tear_off: TearOffStrategy) {
        self.tear_off = tear_off;
    }

    /// Stored moving profiles.
    pub fn profiles(&self) -> &ProfileSet<TiltMovingProfiles> {
        self.core.profiles()
    }

    /// Edit moving profiles; call [`Axis::apply_all_profiles`] afterwards.
    pub fn profiles_mut(&mut self) -> &mut ProfileSet<TiltMovingProfiles> {
        self.core.profiles_mut()
    }

    /// Tilt down to the endstop, freeing a stuck tank if needed.
    ///
    /// # Errors
    ///
    /// `HomeFailed` for the tilt if the tank cannot be freed.
    pub fn layer_down(&mut self, params: &TiltMoveParams) -> Result<()> {
        debug!("tilt: layer down {:?}", params);
        let tear_off = self.tear_off;
        tear_off.layer_down(&mut self.core, params)
    }

    /// Tilt up to the tank level.
    pub fn layer_up(&mut self, params: &TiltMoveParams) -> Result<()> {
        debug!("tilt: layer up {:?}", params);
        let tear_off = self.tear_off;
        tear_off.layer_up(&mut self.core, params)
    }

    /// Rock the tank to stir the resin and rehome.
    pub fn stir_resin(&mut self) -> Result<()> {
        let tear_off = self.tear_off;
        tear_off.stir_resin(&mut self.core)
    }

    /// Move to the tank level with the fast profile.
    pub fn go_to_level(&mut self) -> Result<()> {
        self.core.set_actual_profile(TiltProfileId::MoveFast)?;
        self.core.move_ensure(self.tear_off.height.0)
    }

    /// True while the endstop is triggered.
    pub fn endstop(&self) -> Result<bool> {
        self.core.endstop()
    }
}

impl<C, D> Axis for Tilt<C, D>
where
    C: MotionController,
    D: DelayNs,
{
    type Unit = Ustep;
    type Profile = TiltProfileId;

    fn kind(&self) -> AxisKind {
        AxisKind::Tilt
    }

    fn position(&self) -> Result<Ustep> {
        Ok(Ustep(self.core.position()?))
    }

    fn set_position(&mut self, position: Ustep) -> Result<()> {
        self.core.set_position(position.0)
    }

    fn target_position(&self) -> Ustep {
        Ustep(self.core.target())
    }

    fn home_position(&self) -> Ustep {
        Ustep(self.core.home_position())
    }

    fn is_moving(&self) -> Result<bool> {
        self.core.is_moving()
    }

    fn move_to(&mut self, target: Ustep) -> Result<()> {
        self.core.move_to(target.0)
    }

    fn wait_stopped(&mut self) -> Result<()> {
        self.core.wait_stopped()
    }

    fn move_ensure(&mut self, target: Ustep) -> Result<()> {
        self.core.move_ensure(target.0)
    }

    fn stop(&mut self) -> Result<()> {
        self.core.stop()
    }

    fn release(&mut self) -> Result<()> {
        self.core.release()
    }

    fn sync(&mut self) -> Result<()> {
        self.core.sync()
    }

    fn homing_status(&self) -> Result<HomingStatus> {
        self.core.homing_status()
    }

    fn sync_ensure(&mut self, retries: u8) -> Result<()> {
        self.core.sync_ensure(retries)
    }

    fn home_calibrate(&mut self) -> Result<i8> {
        self.core.home_calibrate()
    }

    fn sensitivity(&self) -> i8 {
        self.core.sensitivity()
    }

    fn set_sensitivity(&mut self, sensitivity: i8) -> Result<()> {
        self.core.set_sensitivity(sensitivity)
    }

    fn actual_profile(&self) -> Option<TiltProfileId> {
        self.core.actual_profile()
    }

    fn set_actual_profile(&mut self, profile: TiltProfileId) -> Result<()> {
        self.core.set_actual_profile(profile)
    }

    fn apply_all_profiles(&mut self) -> Result<()> {
        self.core.apply_all_profiles()
    }
}

impl<C, D> fmt::Debug for Tilt<C, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tilt")
            .field("tear_off", &self.tear_off)
            .finish_non_exhaustive()
    }
}
