//! Homing sensitivity tables.
//!
//! Sensitivity -2..=2 selects a `[current, stallguard_threshold]` pair that
//! replaces the values of the two homing profiles when they are written to
//! the controller.

use crate::error::ConfigError;

/// Lowest supported sensitivity.
pub const SENSITIVITY_MIN: i8 = -2;
/// Highest supported sensitivity.
pub const SENSITIVITY_MAX: i8 = 2;

/// Homing current and stallguard overrides per sensitivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensitivityTable {
    /// Overrides of the `homingFast` profile, indexed by sensitivity + 2
    pub homing_fast: [[i32; 2]; 5],
    /// Overrides of the `homingSlow` profile, indexed by sensitivity + 2
    pub homing_slow: [[i32; 2]; 5],
}

/// Tilt homing overrides.
pub const TILT_SENSITIVITY: SensitivityTable = SensitivityTable {
    //               -2       -1       0        +1       +2
    homing_fast: [[20, 5], [20, 6], [20, 7], [21, 9], [22, 12]],
    homing_slow: [[16, 3], [16, 5], [16, 7], [16, 9], [16, 11]],
};

/// Tower homing overrides.
pub const TOWER_SENSITIVITY: SensitivityTable = SensitivityTable {
    homing_fast: [[22, 0], [22, 2], [22, 4], [22, 6], [22, 8]],
    homing_slow: [[14, 0], [15, 0], [16, 1], [16, 3], [16, 5]],
};

impl SensitivityTable {
    /// Number of sensitivity steps.
    pub const fn len(&self) -> usize {
        self.homing_fast.len()
    }

    /// True for a table without steps.
    pub const fn is_empty(&self) -> bool {
        self.homing_fast.is_empty()
    }

    /// Override for profile slot `slot` (0 = homingFast, 1 = homingSlow).
    pub fn entry(&self, slot: u8, sensitivity: i8) -> Option<[i32; 2]> {
        let index = usize::try_from(i16::from(sensitivity) + 2).ok()?;
        match slot {
            0 => self.homing_fast.get(index).copied(),
            1 => self.homing_slow.get(index).copied(),
            _ => None,
        }
    }

    /// Highest sensitivity the homing calibration may try, exclusive.
    ///
    /// Calibration only walks the positive half of the table.
    pub fn calibration_limit(&self) -> i8 {
        (self.len() as i8) - 2
    }
}

/// Check that `sensitivity` lies within -2..=2.
pub fn check_sensitivity(sensitivity: i8) -> Result<(), ConfigError> {
    if (SENSITIVITY_MIN..=SENSITIVITY_MAX).contains(&sensitivity) {
        Ok(())
    } else {
        Err(ConfigError::InvalidSensitivity(sensitivity))
    }
}
