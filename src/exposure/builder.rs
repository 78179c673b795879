//! Builder for an exposure and the handle of its worker thread.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;
use log::error;

use crate::axis::Axes;
use crate::config::{validate_hw_config, HwConfig};
use crate::controller::MotionController;
use crate::error::{bounded, ConfigError, Error, ExposureError, Result};
use crate::profile::{ExposureProfiles, LayerProfiles, ProfileSet};

use super::command::{Command, CommandSender};
use super::engine::{EngineParts, ExposureEngine, ExposureOptions, ExposureReport};
use super::events::ExposureEvent;
use super::peripherals::{ExposureHardware, ExposureScreen};
use super::project::Project;
use super::snapshot::ExposureSnapshot;

/// Builder for [`Exposure`].
///
/// Printer configuration, project, axes, delay, hardware and screen are
/// required. Profiles default to the compiled-in sets.
pub struct ExposureBuilder<C, D, H, S> {
    config: Option<HwConfig>,
    project: Option<Project>,
    axes: Option<Axes<C, D>>,
    delay: Option<D>,
    hardware: Option<H>,
    screen: Option<S>,
    layer_profiles: ProfileSet<LayerProfiles>,
    exposure_profiles: ProfileSet<ExposureProfiles>,
    options: ExposureOptions,
    snapshot_path: Option<PathBuf>,
    resume: Option<ExposureSnapshot>,
}

impl<C, D, H, S> Default for ExposureBuilder<C, D, H, S>
where
    C: MotionController,
    D: DelayNs + Clone,
    H: ExposureHardware,
    S: ExposureScreen,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C, D, H, S> ExposureBuilder<C, D, H, S>
where
    C: MotionController,
    D: DelayNs + Clone,
    H: ExposureHardware,
    S: ExposureScreen,
{
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: None,
            project: None,
            axes: None,
            delay: None,
            hardware: None,
            screen: None,
            layer_profiles: ProfileSet::new(),
            exposure_profiles: ProfileSet::new(),
            options: ExposureOptions::default(),
            snapshot_path: None,
            resume: None,
        }
    }

    /// Set the printer configuration.
    pub fn config(mut self, config: HwConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the project to print.
    pub fn project(mut self, project: Project) -> Self {
        self.project = Some(project);
        self
    }

    /// Set the axes.
    pub fn axes(mut self, axes: Axes<C, D>) -> Self {
        self.axes = Some(axes);
        self
    }

    /// Set the delay provider used for exposures and waits.
    pub fn delay(mut self, delay: D) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set the UV LED and sensor hardware.
    pub fn hardware(mut self, hardware: H) -> Self {
        self.hardware = Some(hardware);
        self
    }

    /// Set the exposure display.
    pub fn screen(mut self, screen: S) -> Self {
        self.screen = Some(screen);
        self
    }

    /// Use loaded layer change profiles.
    pub fn layer_profiles(mut self, profiles: ProfileSet<LayerProfiles>) -> Self {
        self.layer_profiles = profiles;
        self
    }

    /// Use loaded exposure profiles.
    pub fn exposure_profiles(mut self, profiles: ProfileSet<ExposureProfiles>) -> Self {
        self.exposure_profiles = profiles;
        self
    }

    /// Set the start prompts.
    pub fn options(mut self, options: ExposureOptions) -> Self {
        self.options = options;
        self
    }

    /// Save a snapshot to `path` after every layer.
    pub fn snapshot_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Continue an interrupted print.
    pub fn resume(mut self, snapshot: ExposureSnapshot) -> Self {
        self.resume = Some(snapshot);
        self
    }

    /// Build the exposure.
    ///
    /// # Errors
    ///
    /// `MissingComponent` for a required part that was not set, or a
    /// configuration error from the printer configuration or profiles.
    pub fn build(self) -> Result<Exposure<C, D, H, S>> {
        let config = self.config.ok_or(ConfigError::MissingComponent("config"))?;
        let project = self.project.ok_or(ConfigError::MissingComponent("project"))?;
        let axes = self.axes.ok_or(ConfigError::MissingComponent("axes"))?;
        let delay = self.delay.ok_or(ConfigError::MissingComponent("delay"))?;
        let hardware = self.hardware.ok_or(ConfigError::MissingComponent("hardware"))?;
        let screen = self.screen.ok_or(ConfigError::MissingComponent("screen"))?;
        validate_hw_config(&config)?;

        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let engine = ExposureEngine::new(EngineParts {
            config,
            project,
            axes,
            delay,
            hardware,
            screen,
            layer_profiles: self.layer_profiles,
            exposure_profiles: self.exposure_profiles,
            options: self.options,
            commands: command_rx,
            events: event_tx.clone(),
            snapshot_path: self.snapshot_path,
            resume: self.resume,
        })?;
        Ok(Exposure {
            engine,
            commands: CommandSender::new(command_tx),
            events: event_rx,
            notify: event_tx,
        })
    }
}

/// A built exposure, not started yet.
///
/// Commands sent before [`Exposure::start`] are handled in order once the
/// worker runs.
pub struct Exposure<C, D, H, S> {
    engine: ExposureEngine<C, D, H, S>,
    commands: CommandSender,
    events: Receiver<ExposureEvent>,
    notify: Sender<ExposureEvent>,
}

impl<C, D, H, S> Exposure<C, D, H, S>
where
    C: MotionController + Send + 'static,
    D: DelayNs + Clone + Send + 'static,
    H: ExposureHardware + Send + 'static,
    S: ExposureScreen + Send + 'static,
{
    /// Command channel of the exposure.
    pub fn commands(&self) -> CommandSender {
        self.commands.clone()
    }

    /// The engine, for inspection before the start.
    pub fn engine(&self) -> &ExposureEngine<C, D, H, S> {
        &self.engine
    }

    /// Start the worker thread.
    ///
    /// A panic inside the worker ends the print as `FAILURE`. Panics while
    /// finishing leave only an empty report behind.
    pub fn start(self) -> Result<ExposureHandle> {
        let Exposure {
            engine,
            commands,
            events,
            notify,
        } = self;
        let thread = thread::Builder::new()
            .name("exposure".into())
            .spawn(move || {
                let started = Instant::now();
                match panic::catch_unwind(AssertUnwindSafe(|| engine.run())) {
                    Ok(report) => report,
                    Err(_) => {
                        error!("exposure worker panicked");
                        let report = ExposureReport::panicked(started.elapsed());
                        if let Some(fatal) = &report.fatal {
                            notify.send(ExposureEvent::Fatal(fatal.clone())).ok();
                        }
                        report
                    }
                }
            })
            .map_err(|e| Error::from(ExposureError::WorkerStart(bounded(&e.to_string()))))?;
        Ok(ExposureHandle {
            commands,
            events,
            thread,
        })
    }
}

impl<C, D, H, S> core::fmt::Debug for Exposure<C, D, H, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Exposure").finish_non_exhaustive()
    }
}

/// Handle of a running exposure.
#[derive(Debug)]
pub struct ExposureHandle {
    commands: CommandSender,
    events: Receiver<ExposureEvent>,
    thread: JoinHandle<ExposureReport>,
}

impl ExposureHandle {
    /// Command channel.
    pub fn commands(&self) -> &CommandSender {
        &self.commands
    }

    /// Queue a command. Returns false if the worker has ended.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command)
    }

    /// Event channel.
    pub fn events(&self) -> &Receiver<ExposureEvent> {
        &self.events
    }

    /// True once the worker has ended.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the worker; returns its report and the events not received
    /// yet.
    pub fn join(self) -> (ExposureReport, Vec<ExposureEvent>) {
        let ExposureHandle {
            commands,
            events,
            thread,
        } = self;
        let report = thread
            .join()
            .unwrap_or_else(|_| ExposureReport::panicked(Duration::ZERO));
        drop(commands);
        (report, events.try_iter().collect())
    }
}
