//! Configuration validation.

use crate::error::{bounded, ConfigError, Error, Result};

use super::{HwConfig, ProjectConfig};

/// Supported fade layer range.
pub const FADE_LAYERS_MIN: u16 = 3;
/// Supported fade layer range.
pub const FADE_LAYERS_MAX: u16 = 200;

/// Validate a hardware configuration.
///
/// Checks:
/// - Tower geometry yields a non-zero microstep size
/// - Sensitivities are within -2..=2
/// - Tilt limits are ordered and the tilt height lies between them
/// - Percentages and counts are in range
pub fn validate_hw_config(config: &HwConfig) -> Result<()> {
    config.tower_geometry.validate()?;

    for sensitivity in [config.tower_sensitivity, config.tilt_sensitivity] {
        if !(-2..=2).contains(&sensitivity) {
            return Err(Error::Config(ConfigError::InvalidSensitivity(sensitivity)));
        }
    }

    if config.tilt_min >= config.tilt_max {
        return Err(Error::Config(ConfigError::InvalidTiltLimits {
            min: config.tilt_min.0,
            max: config.tilt_max.0,
        }));
    }

    check_range(
        "tilt_height",
        i64::from(config.tilt_height.0),
        0,
        i64::from(config.tilt_max.0),
    )?;
    check_range("tower_height", config.tower_height.0, 1, i64::MAX)?;
    check_range("limit4fast", i64::from(config.limit4fast), 0, 100)?;
    check_range("stirring_moves", i64::from(config.stirring_moves), 1, 10)?;
    check_range(
        "move_poll_interval",
        i64::from(config.move_poll_interval.0),
        1,
        10_000,
    )?;

    Ok(())
}

/// Validate the print parameters of a project.
pub fn validate_project_config(config: &ProjectConfig) -> Result<()> {
    if !(FADE_LAYERS_MIN..=FADE_LAYERS_MAX).contains(&config.fade_layers) {
        return Err(Error::Config(ConfigError::InvalidFadeLayers(
            config.fade_layers,
        )));
    }

    let heights = [
        Some(config.layer_height),
        config.layer_height_first,
        config.layer_height2,
        config.layer_height3,
    ];
    for height in heights.into_iter().flatten() {
        if height.0 <= 0 {
            return Err(Error::Config(ConfigError::InvalidLayerHeight(height.0)));
        }
    }

    check_range("exposure_time", i64::from(config.exposure_time.0), 1, 3_600_000)?;
    check_range(
        "exposure_time_first",
        i64::from(config.exposure_time_first.0),
        1,
        3_600_000,
    )?;

    Ok(())
}

fn check_range(field: &str, value: i64, min: i64, max: i64) -> Result<()> {
    if value < min || value > max {
        return Err(Error::Config(ConfigError::ValueOutOfRange {
            field: bounded(field),
            value,
            min,
            max,
        }));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::units::Ustep;

    #[test]
    fn test_default_configs_are_valid() {
        assert!(validate_hw_config(&HwConfig::default()).is_ok());
        assert!(validate_project_config(&ProjectConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_sensitivity() {
        let config = HwConfig {
            tilt_sensitivity: 3,
            ..HwConfig::default()
        };
        assert!(matches!(
            validate_hw_config(&config),
            Err(Error::Config(ConfigError::InvalidSensitivity(3)))
        ));
    }

    #[test]
    fn test_invalid_tilt_limits() {
        let config = HwConfig {
            tilt_min: Ustep(100),
            tilt_max: Ustep(100),
            ..HwConfig::default()
        };
        assert!(matches!(
            validate_hw_config(&config),
            Err(Error::Config(ConfigError::InvalidTiltLimits { .. }))
        ));
    }

    #[test]
    fn test_fade_layers_bounds() {
        let config = ProjectConfig {
            fade_layers: 2,
            ..ProjectConfig::default()
        };
        assert!(matches!(
            validate_project_config(&config),
            Err(Error::Config(ConfigError::InvalidFadeLayers(2)))
        ));
    }
}
