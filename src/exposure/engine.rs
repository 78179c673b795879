//! The print job worker.
//!
//! One [`ExposureEngine`] owns the axes, the UV LED, the display and all
//! session counters of a print. It runs the pre-print checks, then the layer
//! loop, and reacts to [`Command`]s at well defined points: at every layer
//! boundary and inside every wait. Motion primitives are never interrupted.

use core::mem::replace;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::axis::{Axes, Axis};
use crate::config::units::{Ms, Nm, Ustep};
use crate::config::HwConfig;
use crate::controller::{AxisKind, MotionController};
use crate::error::{bounded, ConfigError, Error, ExposureError, FatalError, MotionError, Result};
use crate::profile::{
    fill_profiles, ExposureProfileId, ExposureProfiles, LayerChange, LayerProfiles, ProfileId,
    ProfileSet, TiltProfileId, TowerProfileId,
};

use super::command::Command;
use super::events::{ExposureEvent, LayerRecord, Warning};
use super::layers::{estimate_remaining, layer_resin_ml};
use super::peripherals::{ExposureHardware, ExposureScreen, PowerLedMode};
use super::project::Project;
use super::snapshot::{now_secs, ExposureSnapshot};
use super::state::{CheckResult, ExposureCheck, ExposureState};

/// Granularity of waits that react to commands and the cover.
pub const WAIT_STEP: Ms = Ms(500);

/// Poll interval while waiting for a timed exposure to end.
pub const UV_POLL: Ms = Ms(100);

const UV_OFF_POLLS: u32 = 50;

/// Optional prompts before the checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExposureOptions {
    /// Wait in CONFIRM for the user to start the print
    pub confirm_start: bool,
    /// Wait in POUR_IN_RESIN for the user to fill the tank
    pub pour_in_resin: bool,
}

/// Counters of a print, owned by the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureSession {
    /// Next layer to print
    pub actual_layer: u32,
    /// Tower position of the last printed layer
    pub position: Nm,
    /// Resin used so far in ml
    pub resin_count_ml: f64,
    /// Resin available at start plus refills; `None` when not measured
    pub resin_volume_ml: Option<f64>,
    /// Layers printed with slow tear-off
    pub slow_layers_done: u32,
    /// Extra exposure for the next layer
    pub exposure_compensation: Ms,
    /// Exposure profile in use
    pub exposure_profile: ExposureProfileId,
    /// Resin was stirred since the last exposure
    pub was_stirring: bool,
    /// Lit pixels of the previous layer
    pub prev_white_pixels: u32,
    /// Previous layer was printed slow
    pub prev_slow: bool,
    /// Tower travel left with forced slow tear-off
    pub force_slow_remaining: Nm,
    /// Both axes homed during the checks
    pub homed: bool,
    /// Print ended with the tank stuck
    pub stuck: bool,
    /// Print was canceled
    pub canceled: bool,
    /// Low resin warning already raised
    pub low_resin_warned: bool,
}

impl ExposureSession {
    /// Fresh session.
    pub fn new(exposure_profile: ExposureProfileId) -> Self {
        Self {
            actual_layer: 0,
            position: Nm::ZERO,
            resin_count_ml: 0.0,
            resin_volume_ml: None,
            slow_layers_done: 0,
            exposure_compensation: Ms::ZERO,
            exposure_profile,
            was_stirring: false,
            prev_white_pixels: 0,
            prev_slow: true,
            force_slow_remaining: Nm::ZERO,
            homed: false,
            stuck: false,
            canceled: false,
            low_resin_warned: false,
        }
    }

    /// Resin left in the tank, if it was measured.
    pub fn remaining_resin_ml(&self) -> Option<f64> {
        self.resin_volume_ml.map(|volume| volume - self.resin_count_ml)
    }

    /// Serializable progress.
    pub fn snapshot(&self, project_name: &str) -> ExposureSnapshot {
        ExposureSnapshot {
            project_name: project_name.to_owned(),
            actual_layer: self.actual_layer,
            position_nm: self.position.0,
            resin_count_ml: self.resin_count_ml,
            resin_volume_ml: self.resin_volume_ml,
            slow_layers_done: self.slow_layers_done,
            exposure_profile: self.exposure_profile.name().to_owned(),
            canceled: self.canceled,
            saved_at: now_secs(),
        }
    }

    fn restore(&mut self, snapshot: &ExposureSnapshot, exposure_profile: ExposureProfileId) {
        self.actual_layer = snapshot.actual_layer;
        self.position = snapshot.position();
        self.resin_count_ml = snapshot.resin_count_ml;
        self.resin_volume_ml = snapshot.resin_volume_ml;
        self.slow_layers_done = snapshot.slow_layers_done;
        self.exposure_profile = exposure_profile;
    }
}

/// Outcome of a finished worker.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureReport {
    /// Final state
    pub state: ExposureState,
    /// Layers printed, counting from the start of the project
    pub actual_layer: u32,
    /// Final tower position
    pub position: Nm,
    /// Resin used in ml
    pub resin_count_ml: f64,
    /// Layers printed with slow tear-off
    pub slow_layers_done: u32,
    /// Fatal error of a failed print
    pub fatal: Option<FatalError>,
    /// Warnings raised during the print
    pub warnings: Vec<Warning>,
    /// Wall time of the worker
    pub print_time: Duration,
}

impl ExposureReport {
    pub(crate) fn panicked(print_time: Duration) -> Self {
        Self {
            state: ExposureState::Failure,
            actual_layer: 0,
            position: Nm::ZERO,
            resin_count_ml: 0.0,
            slow_layers_done: 0,
            fatal: Some(Error::from(ExposureError::WorkerPanicked).to_fatal()),
            warnings: Vec::new(),
            print_time,
        }
    }
}

/// Why the layer loop stopped early.
#[derive(Debug)]
pub(crate) enum Stop {
    /// User canceled
    Canceled,
    /// Resumed snapshot had nothing left to print
    Done,
    /// Unrecoverable error
    Failed(Error),
}

impl From<Error> for Stop {
    fn from(e: Error) -> Self {
        Stop::Failed(e)
    }
}

type Flow<T = ()> = core::result::Result<T, Stop>;

/// Everything an engine is assembled from.
pub(crate) struct EngineParts<C, D, H, S> {
    pub config: HwConfig,
    pub project: Project,
    pub axes: Axes<C, D>,
    pub delay: D,
    pub hardware: H,
    pub screen: S,
    pub layer_profiles: ProfileSet<LayerProfiles>,
    pub exposure_profiles: ProfileSet<ExposureProfiles>,
    pub options: ExposureOptions,
    pub commands: Receiver<Command>,
    pub events: Sender<ExposureEvent>,
    pub snapshot_path: Option<PathBuf>,
    pub resume: Option<ExposureSnapshot>,
}

/// Print job worker.
pub struct ExposureEngine<C, D, H, S> {
    config: HwConfig,
    project: Project,
    axes: Axes<C, D>,
    delay: D,
    hardware: H,
    screen: S,
    layer_profiles: ProfileSet<LayerProfiles>,
    exposure_profiles: ProfileSet<ExposureProfiles>,
    options: ExposureOptions,
    commands: Receiver<Command>,
    pending: VecDeque<Command>,
    events: Sender<ExposureEvent>,
    snapshot_path: Option<PathBuf>,
    resume: Option<ExposureSnapshot>,
    threshold: u32,
    fast: LayerChange,
    slow: LayerChange,
    state: ExposureState,
    session: ExposureSession,
    fatal: Option<FatalError>,
    warnings: Vec<Warning>,
}

/// Fast and slow layer changes of an exposure profile.
fn resolve_changes(
    layer_profiles: &ProfileSet<LayerProfiles>,
    exposure_profiles: &ProfileSet<ExposureProfiles>,
    id: ExposureProfileId,
) -> Result<(LayerChange, LayerChange)> {
    let (small, large) = fill_profiles(exposure_profiles.profile(id))?;
    Ok((
        LayerChange::from_profile(layer_profiles.profile(small))?,
        LayerChange::from_profile(layer_profiles.profile(large))?,
    ))
}

impl<C, D, H, S> ExposureEngine<C, D, H, S>
where
    C: MotionController,
    D: DelayNs + Clone,
    H: ExposureHardware,
    S: ExposureScreen,
{
    pub(crate) fn new(parts: EngineParts<C, D, H, S>) -> Result<Self> {
        let profile = parts.project.config().exposure_profile;
        let (fast, slow) = resolve_changes(&parts.layer_profiles, &parts.exposure_profiles, profile)?;
        Ok(Self {
            threshold: parts.config.white_pixels_threshold(),
            config: parts.config,
            project: parts.project,
            axes: parts.axes,
            delay: parts.delay,
            hardware: parts.hardware,
            screen: parts.screen,
            layer_profiles: parts.layer_profiles,
            exposure_profiles: parts.exposure_profiles,
            options: parts.options,
            commands: parts.commands,
            pending: VecDeque::new(),
            events: parts.events,
            snapshot_path: parts.snapshot_path,
            resume: parts.resume,
            fast,
            slow,
            state: ExposureState::ReadingData,
            session: ExposureSession::new(profile),
            fatal: None,
            warnings: Vec::new(),
        })
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> ExposureState {
        self.state
    }

    /// Session counters.
    #[inline]
    pub fn session(&self) -> &ExposureSession {
        &self.session
    }

    /// Project being printed.
    #[inline]
    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Expected duration of the layers not printed yet.
    pub fn remaining_time(&self) -> Ms {
        let slow_left = self
            .project
            .config()
            .layers_slow
            .saturating_sub(self.session.slow_layers_done);
        estimate_remaining(
            self.project.planner(),
            self.session.actual_layer,
            self.project.total_layers(),
            slow_left,
            &self.fast,
            &self.slow,
        )
    }

    /// Run the whole print on the calling thread.
    ///
    /// A panic in the layer loop ends the print as `FAILURE` with the UV LED
    /// off and the motors released.
    pub fn run(mut self) -> ExposureReport {
        let started = Instant::now();
        info!(
            "exposure of '{}' started: {} layers",
            self.project.name(),
            self.project.total_layers()
        );
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.print())) {
            Ok(outcome) => outcome,
            Err(_) => {
                error!("exposure worker panicked at layer {}", self.session.actual_layer);
                Err(Stop::Failed(ExposureError::WorkerPanicked.into()))
            }
        };
        let state = self.finish(outcome);
        info!(
            "exposure of '{}' ended {} after {} layers",
            self.project.name(),
            state,
            self.session.actual_layer
        );
        ExposureReport {
            state,
            actual_layer: self.session.actual_layer,
            position: self.session.position,
            resin_count_ml: self.session.resin_count_ml,
            slow_layers_done: self.session.slow_layers_done,
            fatal: self.fatal,
            warnings: self.warnings,
            print_time: started.elapsed(),
        }
    }

    fn print(&mut self) -> Flow {
        self.project.validate()?;
        if let Some(snapshot) = self.resume.take() {
            self.restore(&snapshot)?;
            if self.session.actual_layer >= self.project.total_layers() {
                info!("snapshot of '{}' has nothing left to print", self.project.name());
                return Err(Stop::Done);
            }
        }
        if self.options.confirm_start {
            self.set_state(ExposureState::Confirm);
            self.confirm()?;
        }
        if self.options.pour_in_resin {
            self.set_state(ExposureState::PourInResin);
            self.confirm()?;
        }
        self.set_state(ExposureState::Checks);
        self.run_checks()?;

        self.set_state(ExposureState::Printing);
        self.uv_resume()?;
        while self.session.actual_layer < self.project.total_layers() {
            self.handle_commands()?;
            self.scheduled_actions()?;
            self.print_layer()?;
        }
        Ok(())
    }

    fn restore(&mut self, snapshot: &ExposureSnapshot) -> Flow {
        if snapshot.project_name != self.project.name() {
            return Err(Error::from(ExposureError::SnapshotMismatch).into());
        }
        let profile = ExposureProfileId::from_name(&snapshot.exposure_profile).ok_or_else(|| {
            Error::from(ConfigError::UnknownProfile(bounded(&snapshot.exposure_profile)))
        })?;
        (self.fast, self.slow) =
            resolve_changes(&self.layer_profiles, &self.exposure_profiles, profile)?;
        self.session.restore(snapshot, profile);
        info!(
            "resuming '{}' at layer {}, {:.2} ml used",
            self.project.name(),
            snapshot.actual_layer,
            snapshot.resin_count_ml
        );
        Ok(())
    }

    fn confirm(&mut self) -> Flow {
        match self.wait_for_user(&[Command::Continue, Command::Back]) {
            Command::Continue => Ok(()),
            _ => Err(Stop::Canceled),
        }
    }

    // Checks

    fn run_checks(&mut self) -> Flow {
        for check in ExposureCheck::ALL {
            self.check_result(check, CheckResult::Scheduled);
        }
        for check in ExposureCheck::ALL {
            self.check_result(check, CheckResult::Running);
            match self.run_check(check) {
                Ok(result) => self.check_result(check, result),
                Err(stop) => {
                    if let Stop::Failed(_) = stop {
                        self.check_result(check, CheckResult::Failure);
                    }
                    return Err(stop);
                }
            }
        }
        Ok(())
    }

    fn run_check(&mut self, check: ExposureCheck) -> Flow<CheckResult> {
        match check {
            ExposureCheck::Hardware => {
                self.axes.start()?;
                if self.config.tilt {
                    self.axes.tilt.sync_ensure(2)?;
                }
                self.axes.tower.sync_ensure(2)?;
                self.session.homed = true;
                Ok(CheckResult::Success)
            }
            ExposureCheck::Temperature => {
                let celsius = self.hardware.uv_temperature()?;
                if celsius > self.config.max_uv_temperature {
                    return Err(Error::from(ExposureError::TemperatureOutOfRange { celsius }).into());
                }
                Ok(CheckResult::Success)
            }
            ExposureCheck::Project => {
                self.project.validate()?;
                Ok(CheckResult::Success)
            }
            ExposureCheck::Cover => {
                if !self.config.cover_check {
                    return Ok(CheckResult::Disabled);
                }
                if !self.hardware.cover_closed()? {
                    self.cover_open()?;
                }
                Ok(CheckResult::Success)
            }
            ExposureCheck::Resin => self.check_resin(),
            ExposureCheck::StartPositions => {
                let target = self.session.position + self.config.calib_tower_offset;
                self.axes.tower.move_ensure_with(TowerProfileId::MoveFast, target)?;
                Ok(CheckResult::Success)
            }
            ExposureCheck::Stirring => {
                if !self.config.tilt {
                    return Ok(CheckResult::Disabled);
                }
                self.axes.tilt.stir_resin()?;
                self.session.was_stirring = true;
                Ok(CheckResult::Success)
            }
        }
    }

    fn check_resin(&mut self) -> Flow<CheckResult> {
        if !self.config.resin_sensor {
            return Ok(CheckResult::Disabled);
        }
        let limits = self.config.resin;
        let measured = self
            .hardware
            .measure_resin_ml()?
            .ok_or_else(|| Error::from(ExposureError::ResinSensorFailed))?;
        info!("measured {:.1} ml of resin", measured);
        if measured < limits.min_ml {
            return Err(Error::from(ExposureError::ResinTooLow {
                measured_ml: measured,
                required_ml: limits.min_ml,
            })
            .into());
        }
        self.session.resin_volume_ml = Some(f64::from(measured) + self.session.resin_count_ml);

        let required = limits.required_ml(self.project.config().used_material_ml);
        if measured >= required {
            return Ok(CheckResult::Success);
        }
        self.raise(Warning::ResinNotEnough {
            measured_ml: measured,
            required_ml: required,
        });
        self.set_state(ExposureState::CheckWarning);
        if self.wait_for_user(&[Command::Continue, Command::Back]) != Command::Continue {
            return Err(Stop::Canceled);
        }
        self.set_state(ExposureState::Checks);
        Ok(CheckResult::Warning)
    }

    // Layer loop

    fn handle_commands(&mut self) -> Flow {
        while let Some(command) = self.next_command() {
            match command {
                Command::Pause => self.pause()?,
                Command::Exit => return Err(Stop::Canceled),
                Command::UpDown => self.up_and_down()?,
                Command::FeedMe | Command::FeedMeByButton => self.feed_me()?,
                Command::Continue | Command::Back => {
                    debug!("{}: ignoring {}", self.state, command)
                }
            }
        }
        if self.config.cover_check && !self.hardware.cover_closed()? {
            self.cover_open()?;
        }
        Ok(())
    }

    fn scheduled_actions(&mut self) -> Flow {
        let every = self.config.up_and_down_every_layer;
        let layer = self.session.actual_layer;
        if every > 0 && layer > 0 && layer % every == 0 {
            info!("scheduled up and down at layer {}", layer);
            self.up_and_down()?;
        }
        if let Some(remaining) = self.session.remaining_resin_ml() {
            let limits = self.config.resin;
            if remaining < f64::from(limits.low_warn_ml) && !self.session.low_resin_warned {
                self.session.low_resin_warned = true;
                self.raise(Warning::ResinLow {
                    remaining_ml: remaining as f32,
                });
            }
            if remaining < f64::from(limits.feed_wait_ml) {
                info!("{:.1} ml of resin left, asking for a refill", remaining);
                self.feed_me()?;
            }
        }
        Ok(())
    }

    fn print_layer(&mut self) -> Flow {
        let index = self.session.actual_layer;
        let layer = self
            .project
            .layer(index)
            .cloned()
            .ok_or_else(|| Error::from(ExposureError::NotEnoughLayers(index as usize)))?;
        let etime = layer.etime + replace(&mut self.session.exposure_compensation, Ms::ZERO);

        let previous = self.change(self.session.prev_slow);
        self.session.position += layer.height;
        self.move_to_layer(&previous)?;

        let mut before = previous.delay_before_exposure;
        if replace(&mut self.session.was_stirring, false) {
            before += self.config.stirring_delay;
        }
        self.pause_ms(before);

        let white = self.screen.show_layer(index, &layer.image, false)?;
        let slow = self.classify(index, white, layer.height);
        let change = self.change(slow);
        debug!(
            "layer {}: {} white pixels, {} tear-off, {} ms",
            index,
            white,
            if slow { "slow" } else { "fast" },
            etime.0
        );
        self.expose(etime)?;
        self.screen.blank()?;
        if self.config.per_partes && white > self.threshold {
            self.screen.show_layer(index, &layer.image, true)?;
            self.expose(etime)?;
            self.screen.blank()?;
        }
        self.pause_ms(change.delay_after_exposure);

        if self.config.tilt && change.use_tilt {
            self.tear_off(&change)?;
        }

        let pixel_area = self.config.display.pixel_area_mm2();
        self.session.resin_count_ml += layer_resin_ml(white, pixel_area, layer.height);
        if slow {
            self.session.slow_layers_done += 1;
        }
        self.session.prev_white_pixels = white;
        self.session.prev_slow = slow;
        self.session.actual_layer += 1;

        let record = LayerRecord {
            index,
            height: layer.height,
            position: self.session.position,
            etime,
            white_pixels: white,
            slow,
            resin_count_ml: self.session.resin_count_ml,
            remaining: self.remaining_time(),
        };
        info!(
            "layer {}/{} printed, {:.2} ml used",
            index + 1,
            self.project.total_layers(),
            record.resin_count_ml
        );
        self.emit(ExposureEvent::Layer(record));
        self.save_snapshot();
        Ok(())
    }

    fn change(&self, slow: bool) -> LayerChange {
        if slow {
            self.slow
        } else {
            self.fast
        }
    }

    /// Tower to the next layer, tilt back up under the platform.
    fn move_to_layer(&mut self, previous: &LayerChange) -> Flow {
        let target = self.session.position + self.config.calib_tower_offset;
        let profile = previous.tower_profile;
        let tilt = self.config.tilt && previous.use_tilt;
        let hop = previous.tower_hop_height;
        let hopping =
            hop > Nm::ZERO && (!tilt || self.session.prev_white_pixels > self.threshold);

        if hopping {
            self.axes.tower.move_ensure_with(profile, target + hop)?;
        } else {
            self.axes.tower.move_ensure_with(profile, target)?;
        }
        if tilt {
            self.axes.tilt.layer_up(&previous.tilt_up)?;
        }
        if hopping {
            self.axes.tower.move_ensure_with(profile, target)?;
        }
        Ok(())
    }

    fn classify(&mut self, index: u32, white: u32, height: Nm) -> bool {
        let large = white > self.threshold;
        let forced = self.session.force_slow_remaining > Nm::ZERO;
        if large {
            self.session.force_slow_remaining = self.config.force_slow_tilt_height;
        } else if forced {
            self.session.force_slow_remaining =
                (self.session.force_slow_remaining - height).max(Nm::ZERO);
        }
        index < self.project.config().first_slow_layers() || large || forced
    }

    fn expose(&mut self, etime: Ms) -> Flow {
        if !self.config.blink_exposure {
            self.delay.delay_ms(etime.0);
            return Ok(());
        }
        self.hardware.uv_led(true, etime)?;
        self.delay.delay_ms(etime.0);
        for _ in 0..UV_OFF_POLLS {
            if !self.hardware.uv_led_state()?.0 {
                return Ok(());
            }
            self.delay.delay_ms(UV_POLL.0);
        }
        warn!("UV LED still on after {} ms, switching off", etime.0);
        self.hardware.uv_led(false, Ms::ZERO)?;
        Ok(())
    }

    fn tear_off(&mut self, change: &LayerChange) -> Flow {
        match self.axes.tilt.layer_down(&change.tilt_down) {
            Err(Error::Motion(MotionError::HomeFailed {
                axis: AxisKind::Tilt,
            })) => self.stuck(),
            other => Ok(other?),
        }
    }

    // User actions

    fn stuck(&mut self) -> Flow {
        warn!("tank stuck at layer {}", self.session.actual_layer);
        self.set_state(ExposureState::Stuck);
        self.hardware.uv_led(false, Ms::ZERO)?;
        self.axes.tilt.release()?;
        self.hardware.power_led(PowerLedMode::Warn)?;
        self.hardware.beep_alarm(3)?;
        if self.wait_for_user(&[Command::Continue, Command::Back]) != Command::Continue {
            self.session.stuck = true;
            return Err(Stop::Canceled);
        }

        self.set_state(ExposureState::StuckRecovery);
        self.axes.tilt.sync_ensure(1)?;
        self.axes.tilt.stir_resin()?;
        self.session.was_stirring = true;
        self.hardware.power_led(PowerLedMode::Normal)?;
        self.uv_resume()?;
        self.set_state(ExposureState::Printing);
        info!("stuck tank recovered");
        Ok(())
    }

    fn pause(&mut self) -> Flow {
        info!("pause at layer {}", self.session.actual_layer);
        self.set_state(ExposureState::PendingAction);
        self.uv_pause()?;
        self.set_state(ExposureState::Waiting);
        if self.wait_for_user(&[Command::Continue, Command::Back]) != Command::Continue {
            return Err(Stop::Canceled);
        }
        self.uv_resume()?;
        self.set_state(ExposureState::Printing);
        Ok(())
    }

    fn feed_me(&mut self) -> Flow {
        info!("feed me at layer {}", self.session.actual_layer);
        self.set_state(ExposureState::PendingAction);
        self.uv_pause()?;
        if self.config.tilt {
            self.axes.tilt.go_to_level()?;
        }
        self.set_state(ExposureState::FeedMe);
        self.hardware.power_led(PowerLedMode::Warn)?;
        self.hardware.beep_alarm(1)?;
        match self.wait_for_user(&[Command::Continue, Command::Back]) {
            Command::Continue => {
                let volume = f64::from(self.config.resin.max_ml) + self.session.resin_count_ml;
                info!("resin refilled");
                self.session.resin_volume_ml = Some(volume);
                self.session.low_resin_warned = false;
            }
            Command::Back => {
                info!("refill skipped, resin level no longer tracked");
                self.session.resin_volume_ml = None;
            }
            _ => return Err(Stop::Canceled),
        }

        if self.config.tilt {
            self.set_state(ExposureState::TiltingDown);
            self.axes.tilt.set_actual_profile(TiltProfileId::HomingFast)?;
            self.axes.tilt.move_ensure(Ustep::ZERO)?;
            self.set_state(ExposureState::Stirring);
            self.axes.tilt.stir_resin()?;
        }
        self.hardware.power_led(PowerLedMode::Normal)?;
        self.session.was_stirring = true;
        self.session.exposure_compensation = self.config.up_and_down_expo_comp;
        self.uv_resume()?;
        self.set_state(ExposureState::Printing);
        Ok(())
    }

    fn up_and_down(&mut self) -> Flow {
        info!("up and down at layer {}", self.session.actual_layer);
        self.hardware.power_led(PowerLedMode::Warn)?;
        self.uv_pause()?;
        if self.config.blink_exposure && self.config.up_and_down_uv_on {
            self.hardware.uv_led(true, Ms::ZERO)?;
        }

        self.set_state(ExposureState::GoingUp);
        let end = self.axes.tower.end();
        self.axes.tower.move_ensure_with(TowerProfileId::HomingFast, end)?;

        self.set_state(ExposureState::Waiting);
        self.timed_wait(self.config.up_and_down_wait)?;
        self.hardware.uv_led(false, Ms::ZERO)?;

        if self.config.tilt {
            self.set_state(ExposureState::Stirring);
            self.axes.tilt.stir_resin()?;
        }

        self.set_state(ExposureState::GoingDown);
        self.session.position =
            (self.session.position + self.config.up_and_down_z_offset).max(Nm::ZERO);
        let target = self.session.position + self.config.calib_tower_offset;
        let profile = self.change(self.session.prev_slow).tower_profile;
        self.axes.tower.move_ensure_with(profile, target)?;

        self.session.was_stirring = true;
        self.session.exposure_compensation = self.config.up_and_down_expo_comp;
        self.hardware.power_led(PowerLedMode::Normal)?;
        self.uv_resume()?;
        self.set_state(ExposureState::Printing);
        Ok(())
    }

    fn cover_open(&mut self) -> Flow {
        let resume = self.state;
        warn!("cover open in {}", resume);
        if resume == ExposureState::Printing {
            self.uv_pause()?;
        }
        self.set_state(ExposureState::CoverOpen);
        self.hardware.power_led(PowerLedMode::Warn)?;
        loop {
            self.delay.delay_ms(WAIT_STEP.0);
            self.poll_commands()?;
            if self.hardware.cover_closed()? {
                break;
            }
        }
        self.hardware.power_led(PowerLedMode::Normal)?;
        self.set_state(resume);
        if resume == ExposureState::Printing {
            self.uv_resume()?;
        }
        Ok(())
    }

    // Waiting

    /// Sleep in steps, honouring exit and the cover.
    fn timed_wait(&mut self, total: Ms) -> Flow {
        let mut left = total;
        while left > Ms::ZERO {
            let step = left.min(WAIT_STEP);
            self.delay.delay_ms(step.0);
            left = left.saturating_sub(step);
            self.poll_commands()?;
            if self.config.cover_check && !self.hardware.cover_closed()? {
                self.cover_open()?;
            }
        }
        Ok(())
    }

    fn pause_ms(&mut self, time: Ms) {
        if time > Ms::ZERO {
            self.delay.delay_ms(time.0);
        }
    }

    /// Take commands that arrived during a wait; only exit acts at once.
    fn poll_commands(&mut self) -> Flow {
        while let Ok(command) = self.commands.try_recv() {
            if command == Command::Exit {
                return Err(Stop::Canceled);
            }
            debug!("{}: {} deferred", self.state, command);
            self.pending.push_back(command);
        }
        Ok(())
    }

    fn next_command(&mut self) -> Option<Command> {
        self.pending
            .pop_front()
            .or_else(|| self.commands.try_recv().ok())
    }

    /// Block until the user sends one of `accepted` or exit.
    ///
    /// A closed command channel counts as exit.
    fn wait_for_user(&mut self, accepted: &[Command]) -> Command {
        loop {
            let command = match self.pending.pop_front() {
                Some(command) => command,
                None => match self.commands.recv() {
                    Ok(command) => command,
                    Err(_) => {
                        warn!("command channel closed in {}", self.state);
                        return Command::Exit;
                    }
                },
            };
            if command == Command::Exit || accepted.contains(&command) {
                debug!("{}: {}", self.state, command);
                return command;
            }
            debug!("{}: ignoring {}", self.state, command);
        }
    }

    fn uv_pause(&mut self) -> Flow {
        if !self.config.blink_exposure {
            self.hardware.uv_led(false, Ms::ZERO)?;
        }
        Ok(())
    }

    fn uv_resume(&mut self) -> Flow {
        if !self.config.blink_exposure {
            self.hardware.uv_led(true, Ms::ZERO)?;
        }
        Ok(())
    }

    // Finishing

    fn finish(&mut self, outcome: Flow) -> ExposureState {
        if let Err(e) = self.hardware.uv_led(false, Ms::ZERO) {
            warn!("UV LED off failed: {}", e);
        }
        if let Err(e) = self.screen.blank() {
            warn!("blanking the display failed: {}", e);
        }
        let state = match outcome {
            Ok(()) => self.park(ExposureState::Finished),
            Err(Stop::Done) => ExposureState::Done,
            Err(Stop::Canceled) => {
                self.session.canceled = true;
                if self.session.stuck {
                    self.release_motors();
                    ExposureState::Canceled
                } else {
                    self.park(ExposureState::Canceled)
                }
            }
            Err(Stop::Failed(e)) => self.fail(e),
        };
        if state != ExposureState::Failure {
            self.remove_snapshot();
        }
        self.set_state(state);
        state
    }

    /// Raise the platform out of the resin.
    fn park(&mut self, state: ExposureState) -> ExposureState {
        if !self.session.homed {
            return state;
        }
        match self.axes.tower.move_to_top() {
            Ok(()) => state,
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, e: Error) -> ExposureState {
        error!("exposure failed at layer {}: {}", self.session.actual_layer, e);
        let fatal = e.to_fatal();
        self.emit(ExposureEvent::Fatal(fatal.clone()));
        self.fatal = Some(fatal);
        if let Err(e) = self.hardware.power_led(PowerLedMode::Error) {
            warn!("power LED failed: {}", e);
        }
        self.release_motors();
        ExposureState::Failure
    }

    fn release_motors(&mut self) {
        if let Err(e) = self.axes.release_motors() {
            warn!("releasing motors failed: {}", e);
        }
    }

    // Notifications

    fn set_state(&mut self, state: ExposureState) {
        if state == self.state {
            return;
        }
        info!("exposure state {} -> {}", self.state, state);
        let from = replace(&mut self.state, state);
        self.emit(ExposureEvent::StateChanged { from, to: state });
    }

    fn check_result(&mut self, check: ExposureCheck, result: CheckResult) {
        debug!("check {:?}: {:?}", check, result);
        self.emit(ExposureEvent::Check { check, result });
    }

    fn raise(&mut self, warning: Warning) {
        warn!("{}", warning);
        self.warnings.push(warning);
        self.emit(ExposureEvent::Warning(warning));
    }

    fn emit(&self, event: ExposureEvent) {
        // Nobody listening is fine.
        self.events.send(event).ok();
    }

    fn save_snapshot(&self) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        if let Err(e) = self.session.snapshot(self.project.name()).save(path) {
            warn!("snapshot not saved: {}", e);
        }
    }

    fn remove_snapshot(&self) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        if let Err(e) = ExposureSnapshot::remove(path) {
            warn!("snapshot not removed: {}", e);
        }
    }
}

impl<C, D, H, S> core::fmt::Debug for ExposureEngine<C, D, H, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExposureEngine")
            .field("project", &self.project.name())
            .field("state", &self.state)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
