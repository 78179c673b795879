//! Configuration loading from TOML files.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{bounded, ConfigError, Error, Result};

use super::{HwConfig, ProjectConfig};

/// Load the printer configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or validated.
///
/// # Example
///
/// ```rust,ignore
/// use sla_exposure::load_hw_config;
///
/// let config = load_hw_config("/etc/sla/hardware.toml")?;
/// ```
pub fn load_hw_config<P: AsRef<Path>>(path: P) -> Result<HwConfig> {
    parse_hw_config(&read(path.as_ref())?)
}

/// Parse the printer configuration from a TOML string.
pub fn parse_hw_config(content: &str) -> Result<HwConfig> {
    let config: HwConfig = parse(content)?;
    super::validation::validate_hw_config(&config)?;
    Ok(config)
}

/// Load project print parameters from a TOML file.
pub fn load_project_config<P: AsRef<Path>>(path: P) -> Result<ProjectConfig> {
    parse_project_config(&read(path.as_ref())?)
}

/// Parse project print parameters from a TOML string.
pub fn parse_project_config(content: &str) -> Result<ProjectConfig> {
    let config: ProjectConfig = parse(content)?;
    super::validation::validate_project_config(&config)?;
    Ok(config)
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::Config(ConfigError::IoError(bounded(&e.to_string()))))
}

fn parse<T: DeserializeOwned>(content: &str) -> Result<T> {
    toml::from_str(content).map_err(|e| Error::Config(ConfigError::ParseError(bounded(e.message()))))
}
