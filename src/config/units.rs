//! Unit types for physical quantities.
//!
//! Motor microsteps, nanometers and milliseconds are distinct newtypes so that
//! mixing them is a compile error. Converting tower travel between microsteps
//! and nanometers needs an explicit [`TowerGeometry`].

use core::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Motor position or distance in microsteps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ustep(pub i32);

impl Ustep {
    /// Zero microsteps.
    pub const ZERO: Self = Self(0);

    /// Create a new Ustep value.
    #[inline]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> i32 {
        self.0
    }

    /// Absolute distance.
    #[inline]
    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }
}

impl Add for Ustep {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Ustep {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Ustep {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Mul<i32> for Ustep {
    type Output = Self;

    fn mul(self, rhs: i32) -> Self::Output {
        Self(self.0 * rhs)
    }
}

/// Floor division, matching the controller's integer split of a move.
impl Div<i32> for Ustep {
    type Output = Self;

    fn div(self, rhs: i32) -> Self::Output {
        Self(self.0.div_euclid(rhs))
    }
}

/// Length in nanometers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nm(pub i64);

impl Nm {
    /// Zero length.
    pub const ZERO: Self = Self(0);

    /// Create a new Nm value.
    #[inline]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Create from millimeters.
    #[inline]
    pub const fn from_mm(mm: i64) -> Self {
        Self(mm * 1_000_000)
    }

    /// Length in millimeters.
    #[inline]
    pub fn to_mm(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }
}

impl Add for Nm {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Nm {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Nm {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Nm {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Nm {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Mul<i64> for Nm {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

/// Duration in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ms(pub u32);

impl Ms {
    /// Zero duration.
    pub const ZERO: Self = Self(0);

    /// Create a new Ms value.
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Create from whole seconds.
    #[inline]
    pub const fn from_secs(secs: u32) -> Self {
        Self(secs * 1000)
    }

    /// Duration in seconds.
    #[inline]
    pub fn as_secs_f32(self) -> f32 {
        self.0 as f32 / 1000.0
    }

    /// Subtract without wrapping below zero.
    #[inline]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Add for Ms {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Ms {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Mul<u32> for Ms {
    type Output = Self;

    fn mul(self, rhs: u32) -> Self::Output {
        Self(self.0.saturating_mul(rhs))
    }
}

impl From<Ms> for core::time::Duration {
    fn from(ms: Ms) -> Self {
        core::time::Duration::from_millis(u64::from(ms.0))
    }
}

/// Microstep divisor (1, 2, 4, 8, 16, 32, 64, 128, 256).
///
/// Validated at construction to be a power of 2 within the valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Microsteps(u16);

impl Microsteps {
    /// Sixteenth step, the SL1 driver setting.
    pub const SIXTEENTH: Self = Self(16);
    /// Thirty-second step.
    pub const THIRTY_SECOND: Self = Self(32);

    const VALID_VALUES: [u16; 9] = [1, 2, 4, 8, 16, 32, 64, 128, 256];

    /// Create a new Microsteps value with validation.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValueOutOfRange` if the value is not a valid power of 2.
    pub fn new(value: u16) -> Result<Self, ConfigError> {
        if Self::VALID_VALUES.contains(&value) {
            Ok(Self(value))
        } else {
            Err(ConfigError::ValueOutOfRange {
                field: crate::error::bounded("microsteps"),
                value: i64::from(value),
                min: 1,
                max: 256,
            })
        }
    }

    /// Get the raw divisor value.
    #[inline]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl Default for Microsteps {
    fn default() -> Self {
        Self::SIXTEENTH
    }
}

impl TryFrom<u16> for Microsteps {
    type Error = ConfigError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for Microsteps {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use core::fmt::Write;
        let value = u16::deserialize(deserializer)?;
        Microsteps::new(value).map_err(|e| {
            let mut buf = heapless::String::<128>::new();
            let _ = write!(buf, "{}", e);
            serde::de::Error::custom(buf.as_str())
        })
    }
}

/// Tower lead screw geometry: converts between microsteps and nanometers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerGeometry {
    /// Lead screw pitch
    #[serde(default = "default_screw_pitch")]
    pub screw_pitch: Nm,
    /// Full steps per motor revolution
    #[serde(default = "default_steps_per_rev")]
    pub steps_per_rev: u16,
    /// Driver microstep divisor
    #[serde(default)]
    pub microsteps: Microsteps,
}

fn default_screw_pitch() -> Nm {
    Nm::from_mm(4)
}

fn default_steps_per_rev() -> u16 {
    200
}

impl Default for TowerGeometry {
    fn default() -> Self {
        Self {
            screw_pitch: default_screw_pitch(),
            steps_per_rev: default_steps_per_rev(),
            microsteps: Microsteps::default(),
        }
    }
}

impl TowerGeometry {
    /// Tower travel of one microstep, truncated to whole nanometers.
    #[inline]
    pub fn microstep_size_nm(&self) -> i64 {
        let per_rev = i64::from(self.steps_per_rev) * i64::from(self.microsteps.value());
        if per_rev == 0 {
            0
        } else {
            self.screw_pitch.0 / per_rev
        }
    }

    /// Check that the geometry yields a usable microstep size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.microstep_size_nm() <= 0 {
            return Err(ConfigError::InvalidGeometry);
        }
        Ok(())
    }

    /// Convert microsteps to nanometers.
    #[inline]
    pub fn to_nm(&self, usteps: Ustep) -> Nm {
        Nm(self.microstep_size_nm() * i64::from(usteps.0))
    }

    /// Convert nanometers to microsteps, rounding toward negative infinity.
    #[inline]
    pub fn to_microsteps(&self, nm: Nm) -> Ustep {
        let size = self.microstep_size_nm().max(1);
        let steps = nm.0.div_euclid(size);
        Ustep(steps.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
    }
}
