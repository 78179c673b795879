//! Tilt tear-off choreography.
//!
//! Separates a cured layer from the tank film by tilting the tank down and
//! back up in profile-driven phases. When the tank does not come back down
//! to the endstop it is freed in small pulls before the tilt is rehomed.

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use crate::config::units::Ustep;
use crate::config::HwConfig;
use crate::controller::{AxisKind, MotionController};
use crate::error::{MotionError, Result};
use crate::profile::{TiltMoveParams, TiltMovingProfiles, TiltProfileId};

use super::common::AxisCore;

/// Step of one unstuck pull.
pub const RELEASE_STEP: Ustep = Ustep(128);

/// Tear-off parameters shared by all layer change profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TearOffStrategy {
    /// Tank level position
    pub height: Ustep,
    /// Accepted distance from zero after tilting down
    pub tolerance: Ustep,
    /// Total travel the unstuck pulls may cover
    pub max_travel: Ustep,
    /// Length of one unstuck pull
    pub release_step: Ustep,
    /// Profile of the unstuck pulls
    pub release_profile: TiltProfileId,
    /// Up and down cycles of a resin stir
    pub stirring_moves: u8,
}

impl TearOffStrategy {
    /// Build the strategy from the hardware configuration.
    pub fn from_config(config: &HwConfig) -> Self {
        Self {
            height: config.tilt_height,
            tolerance: config.tilt_homing_tolerance,
            max_travel: config.tilt_max,
            release_step: RELEASE_STEP,
            release_profile: TiltProfileId::LayerRelease,
            stirring_moves: config.stirring_moves,
        }
    }

    /// Tilt down to the endstop.
    ///
    /// # Errors
    ///
    /// `HomeFailed` if the tank stays stuck after every unstuck pull.
    pub(crate) fn layer_down<C, D>(
        &self,
        tilt: &mut AxisCore<C, D, TiltMovingProfiles>,
        params: &TiltMoveParams,
    ) -> Result<()>
    where
        C: MotionController,
        D: DelayNs,
    {
        tilt.set_actual_profile(params.initial_profile)?;
        if params.offset.0 > 0 {
            let target = tilt.position()? - params.offset.0;
            tilt.move_to(target)?;
            tilt.wait_stopped()?;
        }
        tilt.delay_ms(params.offset_delay);

        tilt.set_actual_profile(params.finish_profile)?;
        if params.cycles > 0 {
            let per_cycle = (Ustep(tilt.position()?) / i32::from(params.cycles)).0;
            for _ in 0..params.cycles {
                let target = tilt.position()? - per_cycle;
                tilt.move_to(target)?;
                tilt.wait_stopped()?;
                tilt.delay_ms(params.delay);
            }
        }

        if !tilt.endstop()? {
            tilt.move_to(-self.tolerance.0)?;
            tilt.wait_stopped()?;
        }
        let position = tilt.position()?;
        if tilt.endstop()? && position.abs() <= self.tolerance.0 {
            return Ok(());
        }
        self.unstuck(tilt, position)
    }

    fn unstuck<C, D>(&self, tilt: &mut AxisCore<C, D, TiltMovingProfiles>, position: i32) -> Result<()>
    where
        C: MotionController,
        D: DelayNs,
    {
        warn!("tilt stuck at {}, pulling free", position);
        tilt.set_actual_profile(self.release_profile)?;
        let mut travelled = 0;
        while travelled < self.max_travel.0 && !tilt.endstop()? {
            tilt.set_position(self.release_step.0)?;
            tilt.move_to(0)?;
            tilt.wait_stopped()?;
            travelled += self.release_step.0;
        }
        if !tilt.endstop()? {
            warn!("tilt still stuck after {} usteps", travelled);
            return Err(MotionError::HomeFailed {
                axis: AxisKind::Tilt,
            }
            .into());
        }
        debug!("tilt free after {} usteps", travelled);
        tilt.sync_ensure(0)
    }

    /// Tilt up to the tank level.
    pub(crate) fn layer_up<C, D>(
        &self,
        tilt: &mut AxisCore<C, D, TiltMovingProfiles>,
        params: &TiltMoveParams,
    ) -> Result<()>
    where
        C: MotionController,
        D: DelayNs,
    {
        tilt.set_actual_profile(params.initial_profile)?;
        if params.offset.0 > 0 {
            tilt.move_to(self.height.0 - params.offset.0)?;
            tilt.wait_stopped()?;
        }
        tilt.delay_ms(params.offset_delay);

        tilt.set_actual_profile(params.finish_profile)?;
        if params.cycles > 0 {
            let per_cycle = ((self.height - Ustep(tilt.position()?)) / i32::from(params.cycles)).0;
            for _ in 0..params.cycles {
                let target = tilt.position()? + per_cycle;
                tilt.move_to(target)?;
                tilt.wait_stopped()?;
                tilt.delay_ms(params.delay);
            }
        }
        Ok(())
    }

    /// Stir the resin by rocking the tank, rehoming after every move.
    ///
    /// End positions are not verified; the homing corrects them.
    pub(crate) fn stir_resin<C, D>(&self, tilt: &mut AxisCore<C, D, TiltMovingProfiles>) -> Result<()>
    where
        C: MotionController,
        D: DelayNs,
    {
        debug!("stirring resin, {} moves", self.stirring_moves);
        for _ in 0..self.stirring_moves {
            tilt.set_actual_profile(TiltProfileId::HomingFast)?;
            tilt.move_to(self.height.0)?;
            tilt.wait_stopped()?;
            tilt.move_to(0)?;
            tilt.wait_stopped()?;
            tilt.sync_ensure(1)?;
        }
        Ok(())
    }
}
