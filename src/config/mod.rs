//! Configuration module for sla-exposure.
//!
//! Provides the printer hardware configuration, project print parameters,
//! typed units, TOML loading and validation, and the change-record bus.

mod changes;
mod hardware;
mod loader;
mod project;
pub mod units;
mod validation;

pub use changes::{ChangeBus, ConfigChange};
pub use hardware::{DisplayGeometry, HwConfig, ResinLimits};
pub use loader::{load_hw_config, load_project_config, parse_hw_config, parse_project_config};
pub use project::{ProjectConfig, SLICE_NEVER};
pub use validation::{validate_hw_config, validate_project_config, FADE_LAYERS_MAX, FADE_LAYERS_MIN};

// Re-export unit types at config level
pub use units::{Microsteps, Ms, Nm, TowerGeometry, Ustep};
