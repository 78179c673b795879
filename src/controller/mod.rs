//! Hardware command channel to the motion controller.
//!
//! The controller is reached over one serial link shared by both axes. Wire
//! encoding is controller specific; the core only needs the operations of
//! [`MotionController`].

mod sim;

use core::fmt;
use std::sync::{Arc, Mutex};

use crate::error::ControllerError;
use crate::profile::ProfileValues;

pub use sim::{McCommand, SimulatedController};

/// The two controlled axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisKind {
    /// Build platform lift
    Tower,
    /// Resin tank tilt
    Tilt,
}

impl AxisKind {
    /// Lowercase name for logs and files.
    pub const fn name(self) -> &'static str {
        match self {
            AxisKind::Tower => "tower",
            AxisKind::Tilt => "tilt",
        }
    }
}

impl fmt::Display for AxisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisKind::Tower => write!(f, "Tower"),
            AxisKind::Tilt => write!(f, "Tilt"),
        }
    }
}

/// Homing state reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingStatus {
    /// Not homed since power on
    Unknown,
    /// Homing running, with the controller's phase number
    InProgress(i8),
    /// Homed
    Synced,
    /// Endstop never reached
    EndstopNotReached,
    /// Homed, but the sanity check failed
    CheckFailed,
}

impl HomingStatus {
    /// Decode the controller's raw status.
    pub fn from_raw(raw: i8) -> Self {
        match raw {
            0 => HomingStatus::Synced,
            -2 => HomingStatus::EndstopNotReached,
            -3 => HomingStatus::CheckFailed,
            n if n > 0 => HomingStatus::InProgress(n),
            _ => HomingStatus::Unknown,
        }
    }

    /// Raw controller value.
    pub fn raw(self) -> i8 {
        match self {
            HomingStatus::Synced => 0,
            HomingStatus::Unknown => -1,
            HomingStatus::EndstopNotReached => -2,
            HomingStatus::CheckFailed => -3,
            HomingStatus::InProgress(n) => n,
        }
    }

    /// True while homing has not settled.
    pub fn in_progress(self) -> bool {
        matches!(self, HomingStatus::InProgress(_))
    }
}

/// Operations the core requires from the motion controller.
///
/// Positions are raw microsteps of the addressed axis.
pub trait MotionController {
    /// Current position.
    fn position(&mut self, axis: AxisKind) -> Result<i32, ControllerError>;

    /// Overwrite the position counter without moving.
    fn set_position(&mut self, axis: AxisKind, position: i32) -> Result<(), ControllerError>;

    /// Start a move to `target`; returns immediately.
    fn move_to(&mut self, axis: AxisKind, target: i32) -> Result<(), ControllerError>;

    /// Stop any motion.
    fn stop(&mut self, axis: AxisKind) -> Result<(), ControllerError>;

    /// True while the axis moves.
    fn is_moving(&mut self, axis: AxisKind) -> Result<bool, ControllerError>;

    /// Start homing.
    fn home(&mut self, axis: AxisKind) -> Result<(), ControllerError>;

    /// Raw homing status: 0 synced, >0 in progress, -2 endstop not reached,
    /// -3 check failed, anything else unknown.
    fn homing_status(&mut self, axis: AxisKind) -> Result<i8, ControllerError>;

    /// Select the active profile slot.
    fn select_profile(&mut self, axis: AxisKind, slot: u8) -> Result<(), ControllerError>;

    /// Currently selected profile slot.
    fn active_profile(&mut self, axis: AxisKind) -> Result<u8, ControllerError>;

    /// Write values into the selected profile slot.
    fn write_profile(&mut self, axis: AxisKind, values: &[i32]) -> Result<(), ControllerError>;

    /// Read values of the selected profile slot.
    fn read_profile(&mut self, axis: AxisKind) -> Result<ProfileValues, ControllerError>;

    /// True while the home endstop is triggered.
    fn endstop(&mut self, axis: AxisKind) -> Result<bool, ControllerError>;

    /// Disable the motor driver.
    fn release(&mut self, axis: AxisKind) -> Result<(), ControllerError>;
}

/// Shared handle to the serial link.
///
/// Both axis controllers hold a clone; each call locks the link for one
/// command.
pub struct McLink<C> {
    inner: Arc<Mutex<C>>,
}

impl<C: MotionController> McLink<C> {
    /// Wrap a controller.
    pub fn new(controller: C) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    /// Run `f` with exclusive access to the controller.
    pub fn with<R>(
        &self,
        f: impl FnOnce(&mut C) -> Result<R, ControllerError>,
    ) -> Result<R, ControllerError> {
        let mut guard = self.inner.lock().map_err(|_| ControllerError::LinkPoisoned)?;
        f(&mut guard)
    }
}

impl<C> Clone for McLink<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for McLink<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McLink").finish_non_exhaustive()
    }
}
