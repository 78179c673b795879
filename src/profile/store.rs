//! JSON profile files.
//!
//! A file holds one object per profile, each a flat map of field name to
//! integer:
//!
//! ```json
//! { "homingFast": { "starting_steprate": 2560, "current": 20 } }
//! ```
//!
//! Files are layered: default file, factory file, user file, each overriding
//! the one before.

use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use serde_json::{Map, Value};

use crate::error::{bounded, ConfigError, Error, Result};

use super::set::{ProfileId, ProfileKind, ProfileSet};
use super::single::{Level, ProfileFields};

/// Locations of the files making up a profile set.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileFiles<'a> {
    /// Model defaults shipped with the firmware; must exist when given
    pub default: Option<&'a Path>,
    /// Factory calibration, may not exist yet
    pub factory: Option<&'a Path>,
    /// User overrides, may not exist yet
    pub user: Option<&'a Path>,
}

impl<K: ProfileKind> ProfileSet<K> {
    /// Build a set from compiled-in defaults and the given files.
    ///
    /// # Errors
    ///
    /// I/O or parse errors, values outside the field ranges, unknown fields,
    /// and `MissingValue` if some profile is still incomplete afterwards.
    pub fn load(files: &ProfileFiles<'_>) -> Result<Self> {
        let mut set = Self::new();
        if let Some(path) = files.default {
            set.apply_json(&read(path)?, Level::Default)?;
        }
        for (path, level) in [(files.factory, Level::Factory), (files.user, Level::User)] {
            match path {
                Some(path) if path.exists() => set.apply_json(&read(path)?, level)?,
                Some(path) => debug!("{}: {} not present", K::NAME, path.display()),
                None => {}
            }
        }
        set.validate()?;
        info!("{}: loaded (modified: {})", K::NAME, set.is_modified());
        Ok(set)
    }

    /// Parse a JSON document into one value layer.
    pub fn apply_json(&mut self, json: &str, level: Level) -> Result<()> {
        let root: Value = serde_json::from_str(json).map_err(parse_error)?;
        let Value::Object(root) = root else {
            return Err(Error::Config(ConfigError::ParseError(bounded(
                "profile file must be a JSON object",
            ))));
        };
        for (name, fields) in root.iter() {
            let Some(id) = K::Id::from_name(name) else {
                warn!("{}: ignoring unknown profile '{}'", K::NAME, name);
                continue;
            };
            let Value::Object(fields) = fields else {
                return Err(Error::Config(ConfigError::ParseError(bounded(name))));
            };
            let profile = self.profile_mut(id);
            for (field, value) in fields.iter() {
                let value = match value {
                    Value::Bool(b) => i32::from(*b),
                    Value::Number(n) => n
                        .as_i64()
                        .and_then(|v| i32::try_from(v).ok())
                        .ok_or_else(|| Error::Config(ConfigError::ParseError(bounded(field))))?,
                    _ => return Err(Error::Config(ConfigError::ParseError(bounded(field)))),
                };
                profile.set(level, field, value)?;
            }
        }
        Ok(())
    }

    /// Serialize one value layer, leaving out values the layers below
    /// already give.
    ///
    /// An unmodified layer serializes to `{}`.
    pub fn to_json(&self, level: Level) -> Result<String> {
        let mut root = Map::new();
        for profile in self.iter() {
            let mut fields = Map::new();
            for (index, spec) in <K::Fields as ProfileFields>::FIELDS.iter().enumerate() {
                let Some(value) = profile.layer_value(level, index) else {
                    continue;
                };
                if profile.value_below(level, index) == Some(value) {
                    continue;
                }
                fields.insert(spec.name.to_string(), Value::from(value));
            }
            if !fields.is_empty() {
                root.insert(profile.name().to_string(), Value::Object(fields));
            }
        }
        serde_json::to_string_pretty(&Value::Object(root)).map_err(parse_error)
    }

    /// Write factory values to `path`.
    pub fn save_factory<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write(path.as_ref(), &self.to_json(Level::Factory)?)
    }

    /// Write user values to `path`.
    pub fn save_user<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write(path.as_ref(), &self.to_json(Level::User)?)
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(io_error)
}

fn write(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(io_error)?;
    debug!("profiles written to {}", path.display());
    Ok(())
}

fn io_error(e: std::io::Error) -> Error {
    Error::Config(ConfigError::IoError(bounded(&e.to_string())))
}

fn parse_error(e: serde_json::Error) -> Error {
    Error::Config(ConfigError::ParseError(bounded(&e.to_string())))
}
