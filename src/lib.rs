//! # sla-exposure
//!
//! Layer printing core for SLA resin printers.
//!
//! ## Features
//!
//! - **Typed units**: microsteps, nanometers and milliseconds never mix
//! - **Layered profiles**: motion and tear-off profiles with default, factory
//!   and user values, loaded from JSON
//! - **Tower and tilt axes**: verified moves, homing with sensitivity
//!   calibration, stuck tank detection and recovery
//! - **Exposure worker**: pre-print checks, the layer loop, pause, refill and
//!   up-and-down actions driven by a command channel
//! - **Crash recovery**: per-layer snapshots to resume an interrupted print
//! - **embedded-hal 1.0**: every wait goes through `DelayNs`, so whole prints
//!   run in tests without sleeping
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sla_exposure::{load_hw_config, load_project_config, Axes, ExposureBuilder, Project};
//!
//! let config = load_hw_config("hardware.toml")?;
//! let project = Project::new(load_project_config("project.toml")?);
//! let axes = Axes::with_defaults(link, StdDelay, &config)?;
//!
//! let handle = ExposureBuilder::new()
//!     .config(config)
//!     .project(project)
//!     .axes(axes)
//!     .delay(StdDelay)
//!     .hardware(hardware)
//!     .screen(screen)
//!     .snapshot_path("last_exposure.json")
//!     .build()?
//!     .start()?;
//!
//! handle.send(Command::Pause);
//! let (report, _events) = handle.join();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
#![allow(clippy::result_large_err)]

// Core modules
pub mod axis;
pub mod config;
pub mod controller;
pub mod error;
pub mod exposure;
pub mod profile;
pub mod timing;

// Re-exports for ergonomic API
pub use axis::{Axes, Axis, TearOffStrategy, Tilt, Tower};
pub use config::{load_hw_config, load_project_config, HwConfig, ProjectConfig};
pub use controller::{AxisKind, McLink, MotionController, SimulatedController};
pub use error::{Error, ErrorCode, FatalError, Result};
pub use exposure::{
    Command, CommandSender, Exposure, ExposureBuilder, ExposureEvent, ExposureHandle,
    ExposureReport, ExposureState, Project,
};
pub use profile::{Level, ProfileSet};
pub use timing::{RecordingDelay, StdDelay};

// Unit types
pub use config::units::{Ms, Nm, TowerGeometry, Ustep};
