//! Error types for sla-exposure.
//!
//! Provides unified error handling across configuration, profile data, the
//! motion controller link, axis motion and the exposure engine.

use core::fmt;

use crate::controller::AxisKind;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all sla-exposure operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration or profile data error
    Config(ConfigError),
    /// Axis motion or homing error
    Motion(MotionError),
    /// Motion controller link error
    Controller(ControllerError),
    /// Exposure engine error
    Exposure(ExposureError),
}

/// Configuration and profile data errors.
///
/// These are raised while loading data, before any print can start.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to parse TOML or JSON data
    ParseError(heapless::String<128>),
    /// File I/O error
    IoError(heapless::String<128>),
    /// Profile name not part of the profile set
    UnknownProfile(heapless::String<32>),
    /// Field name not part of the profile contract
    UnknownField {
        /// Profile that was being read
        profile: heapless::String<32>,
        /// Offending field name
        field: heapless::String<32>,
    },
    /// Profile field has no value in any layer
    MissingValue {
        /// Profile name
        profile: heapless::String<32>,
        /// Field name
        field: heapless::String<32>,
    },
    /// Value outside of the allowed range
    ValueOutOfRange {
        /// Field name
        field: heapless::String<32>,
        /// Rejected value
        value: i64,
        /// Minimum allowed value
        min: i64,
        /// Maximum allowed value
        max: i64,
    },
    /// Motor sensitivity outside -2..=2
    InvalidSensitivity(i8),
    /// Fade layer count outside the supported range
    InvalidFadeLayers(u16),
    /// Layer height must be positive
    InvalidLayerHeight(i64),
    /// Tower geometry yields a zero microstep size
    InvalidGeometry,
    /// Tilt travel limits are inconsistent
    InvalidTiltLimits {
        /// Lowest tilt position
        min: i32,
        /// Highest tilt position
        max: i32,
    },
    /// Builder is missing a required component
    MissingComponent(&'static str),
    /// Unknown command token
    InvalidCommand(heapless::String<32>),
}

/// Axis motion and homing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionError {
    /// Position cannot be set while the axis is moving
    PositionFailed {
        /// Axis that rejected the request
        axis: AxisKind,
    },
    /// Axis did not reach its target
    MoveFailed {
        /// Axis that failed
        axis: AxisKind,
        /// Requested target in microsteps
        target: i32,
        /// Reached position in microsteps
        position: i32,
    },
    /// Axis kept moving past the poll budget
    MoveTimeout {
        /// Axis that timed out
        axis: AxisKind,
    },
    /// Homing failed after all retries
    HomeFailed {
        /// Axis that failed to home
        axis: AxisKind,
    },
    /// Homing sanity check kept failing across all sensitivity steps
    HomeCheckFailed {
        /// Axis that failed the check
        axis: AxisKind,
    },
    /// Endstop was never reached while homing
    EndstopNotReached {
        /// Axis with the missing endstop
        axis: AxisKind,
    },
}

/// Motion controller link errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerError {
    /// Controller did not answer in time
    Timeout,
    /// Serial communication failed
    Communication(heapless::String<64>),
    /// Controller answered with something unexpected
    InvalidReply(heapless::String<64>),
    /// Another thread panicked while holding the link
    LinkPoisoned,
}

/// Exposure engine errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ExposureError {
    /// Measured resin is below the absolute minimum
    ResinTooLow {
        /// Measured volume in ml
        measured_ml: f32,
        /// Minimum volume in ml
        required_ml: f32,
    },
    /// Resin sensor did not deliver a measurement
    ResinSensorFailed,
    /// Project has too few layers to print
    NotEnoughLayers(usize),
    /// UV LED temperature is outside of the safe range
    TemperatureOutOfRange {
        /// Measured temperature in degrees Celsius
        celsius: f32,
    },
    /// Display could not show a layer
    Screen(heapless::String<64>),
    /// Snapshot could not be read or written
    Snapshot(heapless::String<128>),
    /// Snapshot belongs to another project
    SnapshotMismatch,
    /// Worker thread panicked
    WorkerPanicked,
    /// Worker thread could not be started
    WorkerStart(heapless::String<64>),
}

/// Stable numeric codes for errors surfaced to the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    /// Unspecified failure
    Unknown = 10500,
    /// Invalid configuration or profile data
    Config = 10501,
    /// Motion controller communication failed
    Controller = 10502,
    /// Position set while moving
    PositionFailed = 10503,
    /// Move did not reach its target
    MoveFailed = 10504,
    /// Tower failed to home
    TowerHomeFailed = 10101,
    /// Tilt failed to home
    TiltHomeFailed = 10102,
    /// Tower homing check failed at every sensitivity
    TowerHomeCheckFailed = 10103,
    /// Tilt homing check failed at every sensitivity
    TiltHomeCheckFailed = 10104,
    /// Tower endstop not reached
    TowerEndstopNotReached = 10105,
    /// Tilt endstop not reached
    TiltEndstopNotReached = 10106,
    /// Resin volume below minimum
    ResinTooLow = 10108,
    /// Resin sensor failure
    ResinSensorFailed = 10109,
    /// UV LED temperature out of range
    TemperatureOutOfRange = 10110,
    /// Project data invalid
    Project = 10111,
    /// Display failure
    Screen = 10112,
    /// Worker thread crashed
    WorkerPanicked = 10113,
}

impl ErrorCode {
    /// Numeric value of the code.
    #[inline]
    pub const fn value(self) -> u16 {
        self as u16
    }
}

/// Optional numeric payload attached to a fatal error or warning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorPayload {
    /// Measured vs. required resin volume in ml
    ResinVolume {
        /// Measured volume
        measured_ml: f32,
        /// Required volume
        required_ml: f32,
    },
    /// Measured temperature
    Temperature {
        /// Degrees Celsius
        celsius: f32,
    },
}

/// Structured fatal error: code, message and optional payload.
#[derive(Debug, Clone, PartialEq)]
pub struct FatalError {
    /// Stable error code
    pub code: ErrorCode,
    /// Human readable description
    pub message: String,
    /// Optional numeric payload
    pub payload: Option<ErrorPayload>,
}

impl Error {
    /// Stable code of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Config(_) => ErrorCode::Config,
            Error::Controller(_) => ErrorCode::Controller,
            Error::Motion(e) => match *e {
                MotionError::PositionFailed { .. } => ErrorCode::PositionFailed,
                MotionError::MoveFailed { .. } | MotionError::MoveTimeout { .. } => {
                    ErrorCode::MoveFailed
                }
                MotionError::HomeFailed { axis: AxisKind::Tower } => ErrorCode::TowerHomeFailed,
                MotionError::HomeFailed { axis: AxisKind::Tilt } => ErrorCode::TiltHomeFailed,
                MotionError::HomeCheckFailed { axis: AxisKind::Tower } => {
                    ErrorCode::TowerHomeCheckFailed
                }
                MotionError::HomeCheckFailed { axis: AxisKind::Tilt } => {
                    ErrorCode::TiltHomeCheckFailed
                }
                MotionError::EndstopNotReached { axis: AxisKind::Tower } => {
                    ErrorCode::TowerEndstopNotReached
                }
                MotionError::EndstopNotReached { axis: AxisKind::Tilt } => {
                    ErrorCode::TiltEndstopNotReached
                }
            },
            Error::Exposure(e) => match e {
                ExposureError::ResinTooLow { .. } => ErrorCode::ResinTooLow,
                ExposureError::ResinSensorFailed => ErrorCode::ResinSensorFailed,
                ExposureError::NotEnoughLayers(_)
                | ExposureError::Snapshot(_)
                | ExposureError::SnapshotMismatch => ErrorCode::Project,
                ExposureError::TemperatureOutOfRange { .. } => ErrorCode::TemperatureOutOfRange,
                ExposureError::Screen(_) => ErrorCode::Screen,
                ExposureError::WorkerPanicked | ExposureError::WorkerStart(_) => {
                    ErrorCode::WorkerPanicked
                }
            },
        }
    }

    /// Numeric payload carried by this error, if any.
    pub fn payload(&self) -> Option<ErrorPayload> {
        match self {
            Error::Exposure(ExposureError::ResinTooLow {
                measured_ml,
                required_ml,
            }) => Some(ErrorPayload::ResinVolume {
                measured_ml: *measured_ml,
                required_ml: *required_ml,
            }),
            Error::Exposure(ExposureError::TemperatureOutOfRange { celsius }) => {
                Some(ErrorPayload::Temperature { celsius: *celsius })
            }
            _ => None,
        }
    }

    /// Convert into the structured form stored in the fatal-error slot.
    pub fn to_fatal(&self) -> FatalError {
        FatalError {
            code: self.code(),
            message: self.to_string(),
            payload: self.payload(),
        }
    }
}

/// Copy `text` into a bounded string, truncating on a char boundary.
pub(crate) fn bounded<const N: usize>(text: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in text.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Motion(e) => write!(f, "Motion error: {}", e),
            Error::Controller(e) => write!(f, "Motion controller error: {}", e),
            Error::Exposure(e) => write!(f, "Exposure error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
            ConfigError::UnknownProfile(name) => write!(f, "Unknown profile '{}'", name),
            ConfigError::UnknownField { profile, field } => {
                write!(f, "Profile '{}' has no field '{}'", profile, field)
            }
            ConfigError::MissingValue { profile, field } => {
                write!(f, "Profile '{}' is missing a value for '{}'", profile, field)
            }
            ConfigError::ValueOutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "Value {} of '{}' is outside [{}, {}]", value, field, min, max),
            ConfigError::InvalidSensitivity(v) => {
                write!(f, "Invalid sensitivity: {}. Must be -2..=2", v)
            }
            ConfigError::InvalidFadeLayers(v) => {
                write!(f, "Invalid fade layer count: {}. Must be 3-200", v)
            }
            ConfigError::InvalidLayerHeight(v) => {
                write!(f, "Invalid layer height: {} nm. Must be > 0", v)
            }
            ConfigError::InvalidGeometry => write!(f, "Tower geometry yields zero microstep size"),
            ConfigError::InvalidTiltLimits { min, max } => {
                write!(f, "Invalid tilt limits: min ({}) must be < max ({})", min, max)
            }
            ConfigError::MissingComponent(what) => write!(f, "Missing component: {}", what),
            ConfigError::InvalidCommand(token) => write!(f, "Unknown command '{}'", token),
        }
    }
}

impl fmt::Display for MotionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionError::PositionFailed { axis } => {
                write!(f, "{} position cannot be set while moving", axis)
            }
            MotionError::MoveFailed {
                axis,
                target,
                position,
            } => write!(f, "{} stopped at {} instead of {}", axis, position, target),
            MotionError::MoveTimeout { axis } => write!(f, "{} move timed out", axis),
            MotionError::HomeFailed { axis } => write!(f, "{} homing failed", axis),
            MotionError::HomeCheckFailed { axis } => {
                write!(f, "{} homing check failed at every sensitivity", axis)
            }
            MotionError::EndstopNotReached { axis } => write!(f, "{} endstop not reached", axis),
        }
    }
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::Timeout => write!(f, "Controller did not respond"),
            ControllerError::Communication(msg) => write!(f, "Communication failed: {}", msg),
            ControllerError::InvalidReply(msg) => write!(f, "Invalid reply: {}", msg),
            ControllerError::LinkPoisoned => write!(f, "Controller link poisoned"),
        }
    }
}

impl fmt::Display for ExposureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExposureError::ResinTooLow {
                measured_ml,
                required_ml,
            } => write!(
                f,
                "Resin too low: measured {:.1} ml, at least {:.1} ml required",
                measured_ml, required_ml
            ),
            ExposureError::ResinSensorFailed => write!(f, "Resin sensor failed"),
            ExposureError::NotEnoughLayers(n) => write!(f, "Project has only {} layers", n),
            ExposureError::TemperatureOutOfRange { celsius } => {
                write!(f, "UV LED temperature {:.1} C out of range", celsius)
            }
            ExposureError::Screen(msg) => write!(f, "Display error: {}", msg),
            ExposureError::Snapshot(msg) => write!(f, "Snapshot error: {}", msg),
            ExposureError::SnapshotMismatch => write!(f, "Snapshot belongs to another project"),
            ExposureError::WorkerPanicked => write!(f, "Exposure worker crashed"),
            ExposureError::WorkerStart(msg) => write!(f, "Exposure worker not started: {}", msg),
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<MotionError> for Error {
    fn from(e: MotionError) -> Self {
        Error::Motion(e)
    }
}

impl From<ControllerError> for Error {
    fn from(e: ControllerError) -> Self {
        Error::Controller(e)
    }
}

impl From<ExposureError> for Error {
    fn from(e: ExposureError) -> Self {
        Error::Exposure(e)
    }
}

impl std::error::Error for Error {}

impl std::error::Error for ConfigError {}

impl std::error::Error for MotionError {}

impl std::error::Error for ControllerError {}

impl std::error::Error for ExposureError {}
