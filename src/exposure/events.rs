//! Events published by the exposure worker.

use core::fmt;

use crate::config::units::{Ms, Nm};
use crate::error::{ErrorPayload, FatalError};

use super::state::{CheckResult, ExposureCheck, ExposureState};

/// Non-fatal condition reported to the user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Warning {
    /// Measured resin is less than the print needs
    ResinNotEnough {
        /// Measured volume in ml
        measured_ml: f32,
        /// Required volume in ml
        required_ml: f32,
    },
    /// Remaining resin dropped below the warning level
    ResinLow {
        /// Remaining volume in ml
        remaining_ml: f32,
    },
}

impl Warning {
    /// Stable warning code.
    pub const fn code(&self) -> u16 {
        match self {
            Warning::ResinNotEnough { .. } => 10_601,
            Warning::ResinLow { .. } => 10_602,
        }
    }

    /// Numeric payload of the warning.
    pub fn payload(&self) -> ErrorPayload {
        match *self {
            Warning::ResinNotEnough {
                measured_ml,
                required_ml,
            } => ErrorPayload::ResinVolume {
                measured_ml,
                required_ml,
            },
            Warning::ResinLow { remaining_ml } => ErrorPayload::ResinVolume {
                measured_ml: remaining_ml,
                required_ml: 0.0,
            },
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::ResinNotEnough {
                measured_ml,
                required_ml,
            } => write!(
                f,
                "Not enough resin: {:.1} ml measured, {:.1} ml required",
                measured_ml, required_ml
            ),
            Warning::ResinLow { remaining_ml } => {
                write!(f, "Resin low: {:.1} ml left", remaining_ml)
            }
        }
    }
}

/// Summary of one printed layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerRecord {
    /// Zero-based layer index
    pub index: u32,
    /// Step height of the layer
    pub height: Nm,
    /// Tower position after the layer
    pub position: Nm,
    /// Exposure time, compensation included
    pub etime: Ms,
    /// Lit pixels of the layer image
    pub white_pixels: u32,
    /// Printed with slow tear-off
    pub slow: bool,
    /// Resin used so far in ml
    pub resin_count_ml: f64,
    /// Expected time to finish the print
    pub remaining: Ms,
}

/// Notification from the exposure worker.
#[derive(Debug, Clone, PartialEq)]
pub enum ExposureEvent {
    /// State changed
    StateChanged {
        /// Previous state
        from: ExposureState,
        /// New state
        to: ExposureState,
    },
    /// A pre-print check progressed
    Check {
        /// Which check
        check: ExposureCheck,
        /// Its new result
        result: CheckResult,
    },
    /// A layer was printed
    Layer(LayerRecord),
    /// A warning was raised
    Warning(Warning),
    /// The print failed
    Fatal(FatalError),
}
