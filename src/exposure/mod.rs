//! Print jobs: layer planning, the exposure worker and its channels.
//!
//! An [`Exposure`] is assembled with an [`ExposureBuilder`] and started on a
//! thread of its own. The caller talks to it only through the command
//! channel ([`CommandSender`]) and the event channel ([`ExposureEvent`]);
//! the worker owns every piece of print state.
//!
//! # Example
//!
//! ```rust
//! use sla_exposure::axis::Axes;
//! use sla_exposure::config::{HwConfig, ProjectConfig};
//! use sla_exposure::controller::{McLink, SimulatedController};
//! use sla_exposure::exposure::{
//!     ExposureBuilder, ExposureState, Project, SimulatedPeripherals, SimulatedScreen,
//! };
//! use sla_exposure::timing::RecordingDelay;
//!
//! let config = HwConfig::default();
//! let delay = RecordingDelay::new();
//! let link = McLink::new(SimulatedController::new());
//! let axes = Axes::with_defaults(link, delay.clone(), &config).unwrap();
//! let project = Project::new(ProjectConfig {
//!     name: "cube".into(),
//!     total_layers: 3,
//!     ..ProjectConfig::default()
//! });
//!
//! let exposure = ExposureBuilder::new()
//!     .config(config)
//!     .project(project)
//!     .axes(axes)
//!     .delay(delay)
//!     .hardware(SimulatedPeripherals::new())
//!     .screen(SimulatedScreen::new(1000))
//!     .build()
//!     .unwrap();
//! let (report, _events) = exposure.start().unwrap().join();
//! assert_eq!(report.state, ExposureState::Finished);
//! assert_eq!(report.actual_layer, 3);
//! ```

mod builder;
mod command;
mod engine;
mod events;
mod layers;
mod peripherals;
mod project;
mod snapshot;
mod state;

pub use builder::{Exposure, ExposureBuilder, ExposureHandle};
pub use command::{Command, CommandSender};
pub use engine::{
    ExposureEngine, ExposureOptions, ExposureReport, ExposureSession, UV_POLL, WAIT_STEP,
};
pub use events::{ExposureEvent, LayerRecord, Warning};
pub use layers::{estimate_remaining, layer_resin_ml, to_minutes, LayerPlan, LayerPlanner};
pub use peripherals::{
    ExposureHardware, ExposureScreen, PowerLedMode, SimulatedPeripherals, SimulatedScreen,
};
pub use project::{Project, ProjectLayer, MIN_LAYERS};
pub use snapshot::ExposureSnapshot;
pub use state::{CheckResult, ExposureCheck, ExposureState};
