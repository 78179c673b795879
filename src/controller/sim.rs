//! In-memory motion controller for tests and demos.

use std::collections::VecDeque;

use crate::error::ControllerError;
use crate::profile::ProfileValues;

use super::{AxisKind, MotionController};

/// State-changing command received by the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McCommand {
    /// Position counter overwritten
    SetPosition(AxisKind, i32),
    /// Move started
    Move(AxisKind, i32),
    /// Motion stopped
    Stop(AxisKind),
    /// Homing started
    Home(AxisKind),
    /// Profile slot selected
    SelectProfile(AxisKind, u8),
    /// Profile slot written
    WriteProfile(AxisKind, ProfileValues),
    /// Motor released
    Release(AxisKind),
}

impl McCommand {
    /// Axis the command addressed.
    pub fn axis(&self) -> AxisKind {
        match self {
            McCommand::SetPosition(a, _)
            | McCommand::Move(a, _)
            | McCommand::Stop(a)
            | McCommand::Home(a)
            | McCommand::SelectProfile(a, _)
            | McCommand::WriteProfile(a, _)
            | McCommand::Release(a) => *a,
        }
    }
}

#[derive(Debug, Clone)]
struct SimAxis {
    position: i32,
    target: i32,
    move_latency: u32,
    polls_left: u32,
    home_position: i32,
    endstop_position: i32,
    endstop_above: bool,
    homing_status: i8,
    homing_polls_left: u32,
    homing_script: VecDeque<i8>,
    homing_fallback: i8,
    slot: u8,
    slots: [ProfileValues; 8],
    jammed: bool,
    released: bool,
}

impl SimAxis {
    fn new(endstop_position: i32, endstop_above: bool) -> Self {
        Self {
            position: 0,
            target: 0,
            move_latency: 0,
            polls_left: 0,
            home_position: endstop_position,
            endstop_position,
            endstop_above,
            homing_status: -1,
            homing_polls_left: 0,
            homing_script: VecDeque::new(),
            homing_fallback: 0,
            slot: 0,
            slots: Default::default(),
            jammed: false,
            released: false,
        }
    }

    fn endstop(&self) -> bool {
        if self.endstop_above {
            self.position >= self.endstop_position
        } else {
            self.position <= self.endstop_position
        }
    }

    fn toward_endstop(&self, target: i32) -> bool {
        if self.endstop_above {
            target > self.position
        } else {
            target < self.position
        }
    }

    fn start_move(&mut self, target: i32) {
        self.released = false;
        self.target = target;
        self.polls_left = self.move_latency;
        if self.jammed && self.toward_endstop(target) {
            return;
        }
        // The endstop stops any move running past it.
        self.position = if self.endstop_above {
            target.min(self.endstop_position)
        } else {
            target.max(self.endstop_position)
        };
    }
}

/// Simulated motion controller.
///
/// Moves complete after a configurable number of `is_moving` polls (zero by
/// default). The tilt endstop sits at 0 and triggers at or below it; the
/// tower endstop triggers at or above its configured top. Every
/// state-changing command is logged.
#[derive(Debug, Clone)]
pub struct SimulatedController {
    tower: SimAxis,
    tilt: SimAxis,
    log: Vec<McCommand>,
    pending_error: Option<ControllerError>,
}

impl Default for SimulatedController {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedController {
    /// Create a simulator with the tower top at 120 mm (96000 microsteps).
    pub fn new() -> Self {
        Self {
            tower: SimAxis::new(96_000, true),
            tilt: SimAxis::new(0, false),
            log: Vec::new(),
            pending_error: None,
        }
    }

    fn axis(&self, axis: AxisKind) -> &SimAxis {
        match axis {
            AxisKind::Tower => &self.tower,
            AxisKind::Tilt => &self.tilt,
        }
    }

    fn axis_mut(&mut self, axis: AxisKind) -> &mut SimAxis {
        match axis {
            AxisKind::Tower => &mut self.tower,
            AxisKind::Tilt => &mut self.tilt,
        }
    }

    fn check(&mut self) -> Result<(), ControllerError> {
        match self.pending_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of `is_moving` polls a move reports as running.
    pub fn set_move_latency(&mut self, axis: AxisKind, polls: u32) {
        self.axis_mut(axis).move_latency = polls;
    }

    /// Position of the top endstop of the tower, in microsteps.
    pub fn set_tower_top(&mut self, usteps: i32) {
        self.tower.endstop_position = usteps;
        self.tower.home_position = usteps;
    }

    /// Queue homing results; each homing attempt consumes one.
    pub fn push_homing_results(&mut self, axis: AxisKind, results: &[i8]) {
        self.axis_mut(axis).homing_script.extend(results.iter().copied());
    }

    /// Result of homing attempts once the queue is empty.
    pub fn set_homing_fallback(&mut self, axis: AxisKind, status: i8) {
        self.axis_mut(axis).homing_fallback = status;
    }

    /// Block every move of `axis` toward its endstop.
    pub fn jam(&mut self, axis: AxisKind) {
        self.axis_mut(axis).jammed = true;
    }

    /// Free a jammed axis.
    pub fn unjam(&mut self, axis: AxisKind) {
        self.axis_mut(axis).jammed = false;
    }

    /// Fail the next command with `error`.
    pub fn inject_error(&mut self, error: ControllerError) {
        self.pending_error = Some(error);
    }

    /// True if the motor was released and not moved since.
    pub fn is_released(&self, axis: AxisKind) -> bool {
        self.axis(axis).released
    }

    /// Values stored in a profile slot.
    pub fn profile_slot(&self, axis: AxisKind, slot: u8) -> &[i32] {
        &self.axis(axis).slots[usize::from(slot) % 8]
    }

    /// Logged commands, oldest first.
    pub fn commands(&self) -> &[McCommand] {
        &self.log
    }

    /// Move targets sent to `axis`, oldest first.
    pub fn moves(&self, axis: AxisKind) -> Vec<i32> {
        self.log
            .iter()
            .filter_map(|c| match c {
                McCommand::Move(a, target) if *a == axis => Some(*target),
                _ => None,
            })
            .collect()
    }

    /// Profile slots selected on `axis`, oldest first.
    pub fn selected_profiles(&self, axis: AxisKind) -> Vec<u8> {
        self.log
            .iter()
            .filter_map(|c| match c {
                McCommand::SelectProfile(a, slot) if *a == axis => Some(*slot),
                _ => None,
            })
            .collect()
    }

    /// Forget logged commands.
    pub fn clear_log(&mut self) {
        self.log.clear();
    }
}

impl MotionController for SimulatedController {
    fn position(&mut self, axis: AxisKind) -> Result<i32, ControllerError> {
        self.check()?;
        Ok(self.axis(axis).position)
    }

    fn set_position(&mut self, axis: AxisKind, position: i32) -> Result<(), ControllerError> {
        self.check()?;
        self.log.push(McCommand::SetPosition(axis, position));
        let sim = self.axis_mut(axis);
        sim.position = position;
        sim.target = position;
        Ok(())
    }

    fn move_to(&mut self, axis: AxisKind, target: i32) -> Result<(), ControllerError> {
        self.check()?;
        self.log.push(McCommand::Move(axis, target));
        self.axis_mut(axis).start_move(target);
        Ok(())
    }

    fn stop(&mut self, axis: AxisKind) -> Result<(), ControllerError> {
        self.check()?;
        self.log.push(McCommand::Stop(axis));
        let sim = self.axis_mut(axis);
        sim.polls_left = 0;
        sim.target = sim.position;
        Ok(())
    }

    fn is_moving(&mut self, axis: AxisKind) -> Result<bool, ControllerError> {
        self.check()?;
        let sim = self.axis_mut(axis);
        if sim.polls_left > 0 {
            sim.polls_left -= 1;
            return Ok(true);
        }
        Ok(false)
    }

    fn home(&mut self, axis: AxisKind) -> Result<(), ControllerError> {
        self.check()?;
        self.log.push(McCommand::Home(axis));
        let sim = self.axis_mut(axis);
        sim.released = false;
        sim.homing_status = 1;
        sim.homing_polls_left = sim.move_latency;
        Ok(())
    }

    fn homing_status(&mut self, axis: AxisKind) -> Result<i8, ControllerError> {
        self.check()?;
        let sim = self.axis_mut(axis);
        if sim.homing_status > 0 {
            if sim.homing_polls_left > 0 {
                sim.homing_polls_left -= 1;
                return Ok(sim.homing_status);
            }
            sim.homing_status = sim.homing_script.pop_front().unwrap_or(sim.homing_fallback);
            if sim.homing_status == 0 {
                sim.position = sim.home_position;
                sim.target = sim.home_position;
            }
        }
        Ok(sim.homing_status)
    }

    fn select_profile(&mut self, axis: AxisKind, slot: u8) -> Result<(), ControllerError> {
        self.check()?;
        self.log.push(McCommand::SelectProfile(axis, slot));
        self.axis_mut(axis).slot = slot % 8;
        Ok(())
    }

    fn active_profile(&mut self, axis: AxisKind) -> Result<u8, ControllerError> {
        self.check()?;
        Ok(self.axis(axis).slot)
    }

    fn write_profile(&mut self, axis: AxisKind, values: &[i32]) -> Result<(), ControllerError> {
        self.check()?;
        let stored = ProfileValues::from_slice(values)
            .map_err(|_| ControllerError::InvalidReply(crate::error::bounded("profile too long")))?;
        self.log.push(McCommand::WriteProfile(axis, stored.clone()));
        let sim = self.axis_mut(axis);
        sim.slots[usize::from(sim.slot)] = stored;
        Ok(())
    }

    fn read_profile(&mut self, axis: AxisKind) -> Result<ProfileValues, ControllerError> {
        self.check()?;
        let sim = self.axis(axis);
        Ok(sim.slots[usize::from(sim.slot)].clone())
    }

    fn endstop(&mut self, axis: AxisKind) -> Result<bool, ControllerError> {
        self.check()?;
        Ok(self.axis(axis).endstop())
    }

    fn release(&mut self, axis: AxisKind) -> Result<(), ControllerError> {
        self.check()?;
        self.log.push(McCommand::Release(axis));
        self.axis_mut(axis).released = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tilt_stops_at_endstop() {
        let mut mc = SimulatedController::new();
        mc.set_position(AxisKind::Tilt, 500).unwrap();
        mc.move_to(AxisKind::Tilt, -96).unwrap();
        assert_eq!(mc.position(AxisKind::Tilt).unwrap(), 0);
        assert!(mc.endstop(AxisKind::Tilt).unwrap());
    }

    #[test]
    fn test_jammed_tilt_does_not_descend() {
        let mut mc = SimulatedController::new();
        mc.set_position(AxisKind::Tilt, 500).unwrap();
        mc.jam(AxisKind::Tilt);
        mc.move_to(AxisKind::Tilt, 0).unwrap();
        assert_eq!(mc.position(AxisKind::Tilt).unwrap(), 500);
        mc.move_to(AxisKind::Tilt, 900).unwrap();
        assert_eq!(mc.position(AxisKind::Tilt).unwrap(), 900);
    }

    #[test]
    fn test_move_latency() {
        let mut mc = SimulatedController::new();
        mc.set_move_latency(AxisKind::Tower, 2);
        mc.move_to(AxisKind::Tower, 100).unwrap();
        assert!(mc.is_moving(AxisKind::Tower).unwrap());
        assert!(mc.is_moving(AxisKind::Tower).unwrap());
        assert!(!mc.is_moving(AxisKind::Tower).unwrap());
    }

    #[test]
    fn test_homing_script() {
        let mut mc = SimulatedController::new();
        mc.push_homing_results(AxisKind::Tilt, &[-3]);
        mc.home(AxisKind::Tilt).unwrap();
        assert_eq!(mc.homing_status(AxisKind::Tilt).unwrap(), -3);
        mc.home(AxisKind::Tilt).unwrap();
        assert_eq!(mc.homing_status(AxisKind::Tilt).unwrap(), 0);
    }

    #[test]
    fn test_injected_error() {
        let mut mc = SimulatedController::new();
        mc.inject_error(ControllerError::Timeout);
        assert_eq!(mc.position(AxisKind::Tilt), Err(ControllerError::Timeout));
        assert!(mc.position(AxisKind::Tilt).is_ok());
    }
}
