//! Shared axis machinery: polling, retries, homing and profile writes.
//!
//! Works on raw microsteps; [`Tower`](super::Tower) and [`Tilt`](super::Tilt)
//! put their units on top.

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::config::units::Ms;
use crate::config::HwConfig;
use crate::controller::{AxisKind, HomingStatus, McLink, MotionController};
use crate::error::{ControllerError, MotionError, Result};
use crate::profile::{
    MovingFields, ProfileId, ProfileKind, ProfileSet, ProfileValues, CURRENT_FIELD,
    STALLGUARD_FIELD,
};

use super::sensitivity::{check_sensitivity, SensitivityTable};

/// Attempts of a move before it is reported as failed.
pub const MOVE_TRIES: u8 = 3;

/// Successful homings required at one sensitivity during calibration.
pub const HOMING_CONFIRMATIONS: u8 = 3;

/// Polling settings of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisTiming {
    /// Interval between `is_moving` polls
    pub poll_interval: Ms,
    /// Interval between homing status polls
    pub homing_poll_interval: Ms,
    /// Longest accepted move or homing
    pub move_timeout: Ms,
}

impl AxisTiming {
    /// Take the polling settings from the hardware configuration.
    pub fn from_config(config: &HwConfig) -> Self {
        Self {
            poll_interval: config.move_poll_interval,
            homing_poll_interval: config.homing_poll_interval,
            move_timeout: config.move_timeout,
        }
    }

    fn budget(&self, interval: Ms) -> u32 {
        (self.move_timeout.0 / interval.0.max(1)).max(1)
    }
}

pub(crate) struct AxisCore<C, D, K: ProfileKind> {
    kind: AxisKind,
    link: McLink<C>,
    delay: D,
    profiles: ProfileSet<K>,
    table: &'static SensitivityTable,
    sensitivity: i8,
    actual_profile: Option<K::Id>,
    target: i32,
    home_position: i32,
    timing: AxisTiming,
}

impl<C, D, K> AxisCore<C, D, K>
where
    C: MotionController,
    D: DelayNs,
    K: ProfileKind<Fields = MovingFields>,
{
    pub(crate) fn new(
        kind: AxisKind,
        link: McLink<C>,
        delay: D,
        profiles: ProfileSet<K>,
        table: &'static SensitivityTable,
        home_position: i32,
        timing: AxisTiming,
    ) -> Result<Self> {
        profiles.validate()?;
        Ok(Self {
            kind,
            link,
            delay,
            profiles,
            table,
            sensitivity: 0,
            actual_profile: None,
            target: 0,
            home_position,
            timing,
        })
    }

    fn mc<R>(&self, f: impl FnOnce(&mut C, AxisKind) -> core::result::Result<R, ControllerError>) -> Result<R> {
        let kind = self.kind;
        Ok(self.link.with(|mc| f(mc, kind))?)
    }

    #[inline]
    pub(crate) fn kind(&self) -> AxisKind {
        self.kind
    }

    #[inline]
    pub(crate) fn target(&self) -> i32 {
        self.target
    }

    #[inline]
    pub(crate) fn home_position(&self) -> i32 {
        self.home_position
    }

    pub(crate) fn position(&self) -> Result<i32> {
        self.mc(|mc, a| mc.position(a))
    }

    pub(crate) fn set_position(&mut self, position: i32) -> Result<()> {
        if self.is_moving()? {
            return Err(MotionError::PositionFailed { axis: self.kind }.into());
        }
        self.mc(|mc, a| mc.set_position(a, position))?;
        self.target = position;
        Ok(())
    }

    pub(crate) fn is_moving(&self) -> Result<bool> {
        self.mc(|mc, a| mc.is_moving(a))
    }

    pub(crate) fn endstop(&self) -> Result<bool> {
        self.mc(|mc, a| mc.endstop(a))
    }

    pub(crate) fn move_to(&mut self, target: i32) -> Result<()> {
        debug!("{}: move to {}", self.kind, target);
        self.mc(|mc, a| mc.move_to(a, target))?;
        self.target = target;
        Ok(())
    }

    pub(crate) fn stop(&mut self) -> Result<()> {
        self.mc(|mc, a| mc.stop(a))?;
        self.target = self.position()?;
        Ok(())
    }

    pub(crate) fn release(&mut self) -> Result<()> {
        debug!("{}: release motor", self.kind);
        self.mc(|mc, a| mc.release(a))
    }

    /// Block for `ms`; zero does not touch the delay provider.
    pub(crate) fn delay_ms(&mut self, ms: Ms) {
        if ms.0 > 0 {
            self.delay.delay_ms(ms.0);
        }
    }

    pub(crate) fn wait_stopped(&mut self) -> Result<()> {
        let budget = self.timing.budget(self.timing.poll_interval);
        let mut polls = 0;
        while self.is_moving()? {
            if polls >= budget {
                warn!("{}: still moving after {} polls, stopping", self.kind, polls);
                self.stop()?;
                return Err(MotionError::MoveTimeout { axis: self.kind }.into());
            }
            polls += 1;
            self.delay_ms(self.timing.poll_interval);
        }
        Ok(())
    }

    /// Move to `target` and verify the position, retrying a stalled move.
    ///
    /// A move away from home that ends on the endstop fails immediately.
    pub(crate) fn move_ensure(&mut self, target: i32) -> Result<()> {
        let home = self.home_position;
        let away = target.abs_diff(home) > self.position()?.abs_diff(home);
        let mut position = self.position()?;
        for attempt in 1..=MOVE_TRIES {
            self.move_to(target)?;
            self.wait_stopped()?;
            position = self.position()?;
            if away && self.endstop()? {
                warn!("{}: endstop hit moving away from home", self.kind);
                break;
            }
            if position == target {
                return Ok(());
            }
            warn!(
                "{}: move to {} ended at {} (attempt {}/{})",
                self.kind, target, position, attempt, MOVE_TRIES
            );
        }
        Err(MotionError::MoveFailed {
            axis: self.kind,
            target,
            position,
        }
        .into())
    }

    pub(crate) fn sync(&mut self) -> Result<()> {
        info!("{}: homing", self.kind);
        self.mc(|mc, a| mc.home(a))
    }

    pub(crate) fn homing_status(&self) -> Result<HomingStatus> {
        Ok(HomingStatus::from_raw(self.mc(|mc, a| mc.homing_status(a))?))
    }

    /// Home once and wait for the result.
    pub(crate) fn sync_wait(&mut self) -> Result<HomingStatus> {
        self.sync()?;
        let budget = self.timing.budget(self.timing.homing_poll_interval);
        let mut polls = 0;
        loop {
            let status = self.homing_status()?;
            if !status.in_progress() {
                if status == HomingStatus::Synced {
                    let home = self.home_position;
                    self.mc(|mc, a| mc.set_position(a, home))?;
                    self.target = home;
                }
                return Ok(status);
            }
            if polls >= budget {
                return Err(MotionError::MoveTimeout { axis: self.kind }.into());
            }
            polls += 1;
            self.delay_ms(self.timing.homing_poll_interval);
        }
    }

    /// Home, retrying failed attempts `retries` times.
    pub(crate) fn sync_ensure(&mut self, retries: u8) -> Result<()> {
        let mut retries = retries;
        loop {
            match self.sync_wait()? {
                HomingStatus::Synced => return Ok(()),
                HomingStatus::EndstopNotReached => {
                    return Err(MotionError::EndstopNotReached { axis: self.kind }.into())
                }
                status => {
                    if retries == 0 {
                        return Err(MotionError::HomeFailed { axis: self.kind }.into());
                    }
                    warn!(
                        "{}: homing ended with {:?}, {} retries left",
                        self.kind, status, retries
                    );
                    retries -= 1;
                }
            }
        }
    }

    /// Find the lowest sensitivity that homes reliably.
    ///
    /// Each failed homing check raises the sensitivity by one; homing has to
    /// succeed [`HOMING_CONFIRMATIONS`] times in a row at one sensitivity.
    pub(crate) fn home_calibrate(&mut self) -> Result<i8> {
        let mut sensitivity = 0;
        self.set_sensitivity(sensitivity)?;
        let mut tries = HOMING_CONFIRMATIONS;
        while tries > 0 {
            match self.sync_wait()? {
                HomingStatus::EndstopNotReached => {
                    return Err(MotionError::EndstopNotReached { axis: self.kind }.into())
                }
                HomingStatus::CheckFailed => {
                    sensitivity += 1;
                    if sensitivity >= self.table.calibration_limit() {
                        return Err(MotionError::HomeCheckFailed { axis: self.kind }.into());
                    }
                    warn!(
                        "{}: homing check failed, sensitivity raised to {}",
                        self.kind, sensitivity
                    );
                    self.set_sensitivity(sensitivity)?;
                    tries = HOMING_CONFIRMATIONS;
                }
                _ => tries -= 1,
            }
        }
        info!("{}: homing calibrated at sensitivity {}", self.kind, sensitivity);
        Ok(sensitivity)
    }

    #[inline]
    pub(crate) fn sensitivity(&self) -> i8 {
        self.sensitivity
    }

    /// Change the sensitivity and rewrite the homing profiles.
    pub(crate) fn set_sensitivity(&mut self, sensitivity: i8) -> Result<()> {
        check_sensitivity(sensitivity)?;
        self.sensitivity = sensitivity;
        for id in K::Id::ALL {
            if self.table.entry(id.index(), sensitivity).is_some() {
                self.write_slot(*id)?;
            }
        }
        self.reselect_actual()
    }

    pub(crate) fn profiles(&self) -> &ProfileSet<K> {
        &self.profiles
    }

    /// Edit the stored profiles; call [`Self::apply_all_profiles`] afterwards.
    pub(crate) fn profiles_mut(&mut self) -> &mut ProfileSet<K> {
        &mut self.profiles
    }

    #[inline]
    pub(crate) fn actual_profile(&self) -> Option<K::Id> {
        self.actual_profile
    }

    /// Values written for `id`, with the homing overrides applied.
    pub(crate) fn payload(&self, id: K::Id) -> Result<ProfileValues> {
        let mut values = self.profiles.profile(id).dump()?;
        if let Some([current, stallguard]) = self.table.entry(id.index(), self.sensitivity) {
            if let Some(v) = values.get_mut(CURRENT_FIELD) {
                *v = current;
            }
            if let Some(v) = values.get_mut(STALLGUARD_FIELD) {
                *v = stallguard;
            }
        }
        Ok(values)
    }

    fn write_slot(&mut self, id: K::Id) -> Result<()> {
        let payload = self.payload(id)?;
        let slot = id.index();
        self.mc(|mc, a| {
            mc.select_profile(a, slot)?;
            mc.write_profile(a, &payload)
        })
    }

    fn reselect_actual(&mut self) -> Result<()> {
        match self.actual_profile {
            Some(id) => {
                let slot = id.index();
                self.mc(|mc, a| mc.select_profile(a, slot))
            }
            None => Ok(()),
        }
    }

    /// Activate a profile; no-op if it is already active.
    pub(crate) fn set_actual_profile(&mut self, id: K::Id) -> Result<()> {
        if self.actual_profile == Some(id) {
            return Ok(());
        }
        debug!("{}: profile {}", self.kind, id.name());
        self.write_slot(id)?;
        self.actual_profile = Some(id);
        Ok(())
    }

    /// Write every profile into its controller slot.
    pub(crate) fn apply_all_profiles(&mut self) -> Result<()> {
        for id in K::Id::ALL {
            self.write_slot(*id)?;
        }
        self.reselect_actual()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::sensitivity::TILT_SENSITIVITY;
    use crate::controller::{McCommand, SimulatedController};
    use crate::profile::{TiltMovingProfiles, TiltProfileId};
    use crate::timing::RecordingDelay;

    type Core = AxisCore<SimulatedController, RecordingDelay, TiltMovingProfiles>;

    fn core() -> (Core, McLink<SimulatedController>, RecordingDelay) {
        let link = McLink::new(SimulatedController::new());
        let delay = RecordingDelay::new();
        let timing = AxisTiming {
            poll_interval: Ms(100),
            homing_poll_interval: Ms(250),
            move_timeout: Ms(1000),
        };
        let core = AxisCore::new(
            AxisKind::Tilt,
            link.clone(),
            delay.clone(),
            ProfileSet::new(),
            &TILT_SENSITIVITY,
            0,
            timing,
        )
        .unwrap();
        (core, link, delay)
    }

    #[test]
    fn test_set_actual_profile_skips_active() {
        let (mut core, link, _) = core();
        core.set_actual_profile(TiltProfileId::MoveFast).unwrap();
        core.set_actual_profile(TiltProfileId::MoveFast).unwrap();
        link.with(|mc| {
            assert_eq!(mc.selected_profiles(AxisKind::Tilt), vec![2]);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_homing_payload_uses_sensitivity() {
        let (mut core, link, _) = core();
        core.set_sensitivity(2).unwrap();
        link.with(|mc| {
            let slot = mc.profile_slot(AxisKind::Tilt, 0);
            assert_eq!(slot[CURRENT_FIELD], 22);
            assert_eq!(slot[STALLGUARD_FIELD], 12);
            Ok(())
        })
        .unwrap();
        assert!(core.set_sensitivity(3).is_err());
        assert_eq!(core.sensitivity(), 2);
    }

    #[test]
    fn test_set_position_while_moving_fails() {
        let (mut core, link, _) = core();
        link.with(|mc| {
            mc.set_move_latency(AxisKind::Tilt, 5);
            Ok(())
        })
        .unwrap();
        core.move_to(800).unwrap();
        assert_eq!(
            core.set_position(0),
            Err(MotionError::PositionFailed { axis: AxisKind::Tilt }.into())
        );
    }

    #[test]
    fn test_wait_stopped_times_out() {
        let (mut core, link, delay) = core();
        link.with(|mc| {
            mc.set_move_latency(AxisKind::Tilt, 100);
            Ok(())
        })
        .unwrap();
        core.move_to(800).unwrap();
        assert_eq!(
            core.wait_stopped(),
            Err(MotionError::MoveTimeout { axis: AxisKind::Tilt }.into())
        );
        // 1000 ms budget at 100 ms per poll
        assert_eq!(delay.delays().len(), 10);
    }

    #[test]
    fn test_move_ensure_retries_then_fails() {
        let (mut core, link, _) = core();
        link.with(|mc| {
            mc.set_position(AxisKind::Tilt, 600)?;
            mc.jam(AxisKind::Tilt);
            Ok(())
        })
        .unwrap();
        let err = core.move_ensure(100).unwrap_err();
        assert_eq!(
            err,
            MotionError::MoveFailed {
                axis: AxisKind::Tilt,
                target: 100,
                position: 600,
            }
            .into()
        );
        link.with(|mc| {
            assert_eq!(mc.moves(AxisKind::Tilt).len(), usize::from(MOVE_TRIES));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_sync_ensure_endstop_not_reached_is_immediate() {
        let (mut core, link, _) = core();
        link.with(|mc| {
            mc.push_homing_results(AxisKind::Tilt, &[-2]);
            Ok(())
        })
        .unwrap();
        assert_eq!(
            core.sync_ensure(5),
            Err(MotionError::EndstopNotReached { axis: AxisKind::Tilt }.into())
        );
        let homes = link
            .with(|mc| {
                Ok(mc
                    .commands()
                    .iter()
                    .filter(|c| matches!(c, McCommand::Home(_)))
                    .count())
            })
            .unwrap();
        assert_eq!(homes, 1);
    }

    #[test]
    fn test_sync_ensure_retries() {
        let (mut core, link, _) = core();
        link.with(|mc| {
            mc.push_homing_results(AxisKind::Tilt, &[-1, -3]);
            Ok(())
        })
        .unwrap();
        assert!(core.sync_ensure(1).is_err());
        assert!(core.sync_ensure(0).is_ok());
    }

    #[test]
    fn test_home_calibrate_raises_sensitivity() {
        let (mut core, link, _) = core();
        link.with(|mc| {
            mc.push_homing_results(AxisKind::Tilt, &[0, -3, 0, 0, 0]);
            Ok(())
        })
        .unwrap();
        assert_eq!(core.home_calibrate(), Ok(1));
    }
}
