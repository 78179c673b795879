//! Tower (build platform) axis in nanometers.

use core::fmt;

use embedded_hal::delay::DelayNs;
use log::debug;

use crate::config::units::{Nm, TowerGeometry, Ustep};
use crate::config::HwConfig;
use crate::controller::{AxisKind, HomingStatus, McLink, MotionController};
use crate::error::Result;
use crate::profile::{ProfileSet, TowerMovingProfiles, TowerProfileId};

use super::common::{AxisCore, AxisTiming};
use super::sensitivity::TOWER_SENSITIVITY;
use super::Axis;

/// Build platform controller.
///
/// Home is the top endstop; positions grow upward from the tank.
pub struct Tower<C, D> {
    core: AxisCore<C, D, TowerMovingProfiles>,
    geometry: TowerGeometry,
    end: Nm,
}

impl<C, D> Tower<C, D>
where
    C: MotionController,
    D: DelayNs,
{
    /// Create the tower controller.
    pub fn new(
        link: McLink<C>,
        delay: D,
        config: &HwConfig,
        profiles: ProfileSet<TowerMovingProfiles>,
    ) -> Result<Self> {
        config.tower_geometry.validate()?;
        let end = config.tower_end();
        let home = config.tower_geometry.to_microsteps(end);
        Ok(Self {
            core: AxisCore::new(
                AxisKind::Tower,
                link,
                delay,
                profiles,
                &TOWER_SENSITIVITY,
                home.0,
                AxisTiming::from_config(config),
            )?,
            geometry: config.tower_geometry,
            end,
        })
    }

    /// Height of the top endstop.
    #[inline]
    pub fn end(&self) -> Nm {
        self.end
    }

    /// Microstep conversion in use.
    #[inline]
    pub fn geometry(&self) -> &TowerGeometry {
        &self.geometry
    }

    /// Stored moving profiles.
    pub fn profiles(&self) -> &ProfileSet<TowerMovingProfiles> {
        self.core.profiles()
    }

    /// Edit moving profiles; call [`Axis::apply_all_profiles`] afterwards.
    pub fn profiles_mut(&mut self) -> &mut ProfileSet<TowerMovingProfiles> {
        self.core.profiles_mut()
    }

    fn to_usteps(&self, nm: Nm) -> i32 {
        self.geometry.to_microsteps(nm).0
    }

    fn to_nm(&self, usteps: i32) -> Nm {
        self.geometry.to_nm(Ustep(usteps))
    }

    /// Move to `target` with `profile` and verify the position.
    pub fn move_ensure_with(&mut self, profile: TowerProfileId, target: Nm) -> Result<()> {
        self.core.set_actual_profile(profile)?;
        self.move_ensure(target)
    }

    /// Raise the platform to the top endstop.
    pub fn move_to_top(&mut self) -> Result<()> {
        debug!("tower: to top");
        self.move_ensure_with(TowerProfileId::HomingFast, self.end)
    }
}

impl<C, D> Axis for Tower<C, D>
where
    C: MotionController,
    D: DelayNs,
{
    type Unit = Nm;
    type Profile = TowerProfileId;

    fn kind(&self) -> AxisKind {
        AxisKind::Tower
    }

    fn position(&self) -> Result<Nm> {
        Ok(self.to_nm(self.core.position()?))
    }

    fn set_position(&mut self, position: Nm) -> Result<()> {
        let usteps = self.to_usteps(position);
        self.core.set_position(usteps)
    }

    fn target_position(&self) -> Nm {
        self.to_nm(self.core.target())
    }

    fn home_position(&self) -> Nm {
        self.to_nm(self.core.home_position())
    }

    fn is_moving(&self) -> Result<bool> {
        self.core.is_moving()
    }

    fn move_to(&mut self, target: Nm) -> Result<()> {
        let usteps = self.to_usteps(target);
        self.core.move_to(usteps)
    }

    fn wait_stopped(&mut self) -> Result<()> {
        self.core.wait_stopped()
    }

    fn move_ensure(&mut self, target: Nm) -> Result<()> {
        let usteps = self.to_usteps(target);
        self.core.move_ensure(usteps)
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

    fn actual_profile(&self) -> Option<TowerProfileId> {
        self.core.actual_profile()
    }

    fn set_actual_profile(&mut self, profile: TowerProfileId) -> Result<()> {
        self.core.set_actual_profile(profile)
    }

    fn apply_all_profiles(&mut self) -> Result<()> {
        self.core.apply_all_profiles()
    }
}

impl<C, D> fmt::Debug for Tower<C, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tower")
            .field("geometry", &self.geometry)
            .field("end", &self.end)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::SimulatedController;
    use crate::timing::RecordingDelay;

    fn tower() -> (Tower<SimulatedController, RecordingDelay>, McLink<SimulatedController>) {
        let link = McLink::new(SimulatedController::new());
        let tower = Tower::new(
            link.clone(),
            RecordingDelay::new(),
            &HwConfig::default(),
            ProfileSet::new(),
        )
        .unwrap();
        (tower, link)
    }

    #[test]
    fn test_home_is_tower_end() {
        let (mut tower, _) = tower();
        tower.sync_ensure(0).unwrap();
        assert_eq!(tower.position().unwrap(), Nm::from_mm(120));
        assert_eq!(tower.home_position(), Nm::from_mm(120));
        assert!(tower.synced().unwrap());
    }

    #[test]
    fn test_position_is_floored_to_microsteps() {
        let (mut tower, link) = tower();
        tower.move_to(Nm(50_000 + 1249)).unwrap();
        link.with(|mc| {
            assert_eq!(mc.moves(AxisKind::Tower), vec![40]);
            Ok(())
        })
        .unwrap();
        assert_eq!(tower.target_position(), Nm(50_000));
        assert!(tower.on_target_position().unwrap());
    }

    #[test]
    fn test_move_to_top_uses_homing_profile() {
        let (mut tower, link) = tower();
        tower.move_to_top().unwrap();
        assert_eq!(tower.actual_profile(), Some(TowerProfileId::HomingFast));
        link.with(|mc| {
            assert_eq!(mc.moves(AxisKind::Tower), vec![96_000]);
            Ok(())
        })
        .unwrap();
    }
}
