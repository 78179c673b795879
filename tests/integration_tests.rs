//! Integration tests for sla-exposure.
//!
//! Whole prints run against the simulated controller, peripherals and
//! screen; `RecordingDelay` keeps them from sleeping.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use sla_exposure::axis::{Axes, Axis};
use sla_exposure::config::{HwConfig, Ms, Nm, ProjectConfig, Ustep};
use sla_exposure::controller::{AxisKind, McCommand, McLink, SimulatedController};
use sla_exposure::error::{ErrorCode, MotionError};
use sla_exposure::exposure::{
    CheckResult, Command, Exposure, ExposureBuilder, ExposureCheck, ExposureEvent, ExposureHandle,
    ExposureOptions, ExposureReport, ExposureSnapshot, ExposureState, LayerRecord, Project,
    SimulatedPeripherals, SimulatedScreen, Warning,
};
use sla_exposure::profile::{LayerChange, LayerProfileId, LayerProfiles, ProfileFiles, ProfileSet};
use sla_exposure::timing::RecordingDelay;

type SimExposure = Exposure<SimulatedController, RecordingDelay, SimulatedPeripherals, SimulatedScreen>;

// =============================================================================
// Test rig
// =============================================================================

struct Printer {
    link: McLink<SimulatedController>,
    delay: RecordingDelay,
    hardware: SimulatedPeripherals,
    screen: SimulatedScreen,
}

impl Printer {
    fn new() -> Self {
        Self {
            link: McLink::new(SimulatedController::new()),
            delay: RecordingDelay::new(),
            hardware: SimulatedPeripherals::new(),
            screen: SimulatedScreen::new(1000),
        }
    }

    fn builder(
        &self,
        config: HwConfig,
    ) -> ExposureBuilder<SimulatedController, RecordingDelay, SimulatedPeripherals, SimulatedScreen>
    {
        let axes = Axes::with_defaults(self.link.clone(), self.delay.clone(), &config).unwrap();
        ExposureBuilder::new()
            .config(config)
            .axes(axes)
            .delay(self.delay.clone())
            .hardware(self.hardware.clone())
            .screen(self.screen.clone())
    }

    fn exposure(&self, layers: u32) -> SimExposure {
        self.builder(HwConfig::default())
            .project(project(layers))
            .build()
            .unwrap()
    }

    fn mc<R>(&self, f: impl FnOnce(&mut SimulatedController) -> R) -> R {
        self.link.with(|mc| Ok(f(mc))).unwrap()
    }
}

fn project(layers: u32) -> Project {
    Project::new(ProjectConfig {
        name: "numbers".into(),
        total_layers: layers,
        layer_height: Nm(50_000),
        exposure_time: Ms(8000),
        exposure_time_first: Ms(35000),
        fade_layers: 10,
        ..ProjectConfig::default()
    })
}

fn run(exposure: SimExposure) -> (ExposureReport, Vec<ExposureEvent>) {
    exposure.start().unwrap().join()
}

fn states(events: &[ExposureEvent]) -> Vec<ExposureState> {
    events
        .iter()
        .filter_map(|e| match e {
            ExposureEvent::StateChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect()
}

fn layers(events: &[ExposureEvent]) -> Vec<LayerRecord> {
    events
        .iter()
        .filter_map(|e| match e {
            ExposureEvent::Layer(record) => Some(*record),
            _ => None,
        })
        .collect()
}

/// Collect events until the worker enters `state`.
fn wait_for_state(handle: &ExposureHandle, state: ExposureState, seen: &mut Vec<ExposureEvent>) {
    loop {
        let event = handle
            .events()
            .recv_timeout(Duration::from_secs(10))
            .expect("worker never reached the state");
        let hit = matches!(event, ExposureEvent::StateChanged { to, .. } if to == state);
        seen.push(event);
        if hit {
            return;
        }
    }
}

/// Jam the tank while layer 0 is shown, so its tear-off gets stuck.
fn jam_tilt_on_first_layer(printer: &Printer) {
    let link = printer.link.clone();
    printer.screen.on_layer(move |index, _| {
        if index == 0 {
            link.with(|mc| {
                mc.jam(AxisKind::Tilt);
                Ok(())
            })
            .ok();
        }
    });
}

// =============================================================================
// Whole prints
// =============================================================================

#[test]
fn test_two_layer_print_finishes() {
    let printer = Printer::new();
    let (report, events) = run(printer.exposure(2));

    assert_eq!(report.state, ExposureState::Finished);
    assert_eq!(report.actual_layer, 2);
    assert_eq!(report.position, Nm(100_000));
    assert!(report.fatal.is_none());
    assert_eq!(
        states(&events),
        vec![ExposureState::Checks, ExposureState::Printing, ExposureState::Finished]
    );

    // First layers fade from the first exposure time
    assert_eq!(printer.hardware.exposures(), vec![Ms(35000), Ms(35000)]);
    let records = layers(&events);
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].position, Nm(100_000));
    assert!(records.iter().all(|r| r.slow));

    // Start position, two layers, then parked at the top
    assert_eq!(printer.mc(|mc| mc.moves(AxisKind::Tower)), vec![0, 40, 80, 96_000]);
    assert_eq!(printer.screen.shown().len(), 2);
    assert!(!printer.hardware.uv_on());
}

#[test]
fn test_checks_run_in_order() {
    let printer = Printer::new();
    let (_, events) = run(printer.exposure(1));
    let finished: Vec<ExposureCheck> = events
        .iter()
        .filter_map(|e| match e {
            ExposureEvent::Check {
                check,
                result: CheckResult::Success,
            } => Some(*check),
            _ => None,
        })
        .collect();
    assert_eq!(finished, ExposureCheck::ALL.to_vec());
}

#[test]
fn test_disabled_checks_are_reported() {
    let printer = Printer::new();
    let config = HwConfig {
        tilt: false,
        cover_check: false,
        resin_sensor: false,
        ..HwConfig::default()
    };
    let exposure = printer.builder(config).project(project(2)).build().unwrap();
    let (report, events) = run(exposure);

    assert_eq!(report.state, ExposureState::Finished);
    for check in [ExposureCheck::Cover, ExposureCheck::Resin, ExposureCheck::Stirring] {
        assert!(events.contains(&ExposureEvent::Check {
            check,
            result: CheckResult::Disabled,
        }));
    }
    assert!(printer.mc(|mc| mc.moves(AxisKind::Tilt)).is_empty());
}

#[test]
fn test_continuous_uv_without_blinking() {
    let printer = Printer::new();
    let config = HwConfig {
        blink_exposure: false,
        ..HwConfig::default()
    };
    let exposure = printer.builder(config).project(project(2)).build().unwrap();
    let (report, _) = run(exposure);

    assert_eq!(report.state, ExposureState::Finished);
    assert!(printer.hardware.exposures().is_empty());
    let log = printer.hardware.uv_log();
    assert_eq!(log.first(), Some(&(true, Ms::ZERO)));
    assert_eq!(log.last(), Some(&(false, Ms::ZERO)));
}

#[test]
fn test_large_layer_exposed_in_halves() {
    let printer = Printer::new();
    let config = HwConfig {
        per_partes: true,
        ..HwConfig::default()
    };
    let large = config.white_pixels_threshold() + 1;
    printer.screen.push_white_pixels(&[large, 10]);
    let exposure = printer.builder(config).project(project(2)).build().unwrap();
    let (report, _) = run(exposure);

    assert_eq!(report.state, ExposureState::Finished);
    let halves: Vec<(u32, bool)> = printer
        .screen
        .shown()
        .into_iter()
        .map(|(index, _, second)| (index, second))
        .collect();
    assert_eq!(halves, vec![(0, false), (0, true), (1, false)]);
    assert_eq!(printer.hardware.exposures().len(), 3);
}

// =============================================================================
// Commands
// =============================================================================

#[test]
fn test_pause_then_exit_cancels() {
    let printer = Printer::new();
    let exposure = printer.exposure(3);
    let commands = exposure.commands();
    assert!(commands.send(Command::Pause));
    assert!(commands.send(Command::Exit));
    let (report, events) = run(exposure);

    assert_eq!(report.state, ExposureState::Canceled);
    assert_eq!(report.actual_layer, 0);
    assert_eq!(
        states(&events),
        vec![
            ExposureState::Checks,
            ExposureState::Printing,
            ExposureState::PendingAction,
            ExposureState::Waiting,
            ExposureState::Canceled,
        ]
    );
    assert!(layers(&events).is_empty());
    assert!(printer.screen.shown().is_empty());
    // Canceled prints still park the platform
    assert_eq!(printer.mc(|mc| mc.moves(AxisKind::Tower)).last(), Some(&96_000));
}

#[test]
fn test_pause_then_continue_finishes() {
    let printer = Printer::new();
    let exposure = printer.exposure(2);
    let commands = exposure.commands();
    commands.send(Command::Pause);
    commands.send(Command::Continue);
    let (report, events) = run(exposure);

    assert_eq!(report.state, ExposureState::Finished);
    assert_eq!(report.actual_layer, 2);
    assert!(states(&events).contains(&ExposureState::Waiting));
}

#[test]
fn test_up_and_down_compensates_exposure() {
    let printer = Printer::new();
    let config = HwConfig {
        up_and_down_expo_comp: Ms(2000),
        ..HwConfig::default()
    };
    let exposure = printer.builder(config).project(project(2)).build().unwrap();
    exposure.commands().send(Command::UpDown);
    let (report, events) = run(exposure);

    assert_eq!(report.state, ExposureState::Finished);
    assert_eq!(
        states(&events),
        vec![
            ExposureState::Checks,
            ExposureState::Printing,
            ExposureState::GoingUp,
            ExposureState::Waiting,
            ExposureState::Stirring,
            ExposureState::GoingDown,
            ExposureState::Printing,
            ExposureState::Finished,
        ]
    );
    let etimes: Vec<Ms> = layers(&events).iter().map(|r| r.etime).collect();
    assert_eq!(etimes, vec![Ms(37000), Ms(35000)]);
    // 10 s at the top in 500 ms steps
    let steps = printer.delay.delays().iter().filter(|&&d| d == 500).count();
    assert!(steps >= 20);
}

#[test]
fn test_feed_me_refill() {
    let printer = Printer::new();
    let exposure = printer.exposure(2);
    let commands = exposure.commands();
    commands.send(Command::FeedMe);
    commands.send(Command::Continue);
    let (report, events) = run(exposure);

    assert_eq!(report.state, ExposureState::Finished);
    assert_eq!(
        states(&events),
        vec![
            ExposureState::Checks,
            ExposureState::Printing,
            ExposureState::PendingAction,
            ExposureState::FeedMe,
            ExposureState::TiltingDown,
            ExposureState::Stirring,
            ExposureState::Printing,
            ExposureState::Finished,
        ]
    );
    assert!(printer.hardware.beeps() >= 1);
}

#[test]
fn test_feed_me_exit_cancels() {
    let printer = Printer::new();
    let exposure = printer.exposure(2);
    let commands = exposure.commands();
    commands.send(Command::FeedMeByButton);
    commands.send(Command::Exit);
    let (report, events) = run(exposure);

    assert_eq!(report.state, ExposureState::Canceled);
    assert!(states(&events).contains(&ExposureState::FeedMe));
    assert!(layers(&events).is_empty());
}

#[test]
fn test_confirm_prompt_back_cancels() {
    let printer = Printer::new();
    let exposure = printer
        .builder(HwConfig::default())
        .project(project(2))
        .options(ExposureOptions {
            confirm_start: true,
            pour_in_resin: false,
        })
        .build()
        .unwrap();
    exposure.commands().send(Command::Back);
    let (report, events) = run(exposure);

    assert_eq!(report.state, ExposureState::Canceled);
    assert_eq!(
        states(&events),
        vec![ExposureState::Confirm, ExposureState::Canceled]
    );
    // Nothing was homed, so nothing moved
    assert!(printer.mc(|mc| mc.moves(AxisKind::Tower)).is_empty());
}

#[test]
fn test_cover_open_during_checks() {
    let printer = Printer::new();
    printer.hardware.open_cover(2);
    let (report, events) = run(printer.exposure(1));

    assert_eq!(report.state, ExposureState::Finished);
    assert_eq!(
        states(&events),
        vec![
            ExposureState::Checks,
            ExposureState::CoverOpen,
            ExposureState::Checks,
            ExposureState::Printing,
            ExposureState::Finished,
        ]
    );
}

// =============================================================================
// Stuck tank
// =============================================================================

#[test]
fn test_stuck_tank_waits_for_user_then_recovers() {
    let printer = Printer::new();
    jam_tilt_on_first_layer(&printer);
    let handle = printer.exposure(2).start().unwrap();

    let mut seen = Vec::new();
    wait_for_state(&handle, ExposureState::Stuck, &mut seen);
    assert!(!handle.is_finished());
    printer.mc(|mc| mc.unjam(AxisKind::Tilt));
    assert!(handle.send(Command::Continue));

    let (report, rest) = handle.join();
    seen.extend(rest);
    assert_eq!(report.state, ExposureState::Finished);
    assert_eq!(report.actual_layer, 2);
    assert_eq!(
        states(&seen),
        vec![
            ExposureState::Checks,
            ExposureState::Printing,
            ExposureState::Stuck,
            ExposureState::StuckRecovery,
            ExposureState::Printing,
            ExposureState::Finished,
        ]
    );
    assert_eq!(printer.hardware.beeps(), 3);
}

#[test]
fn test_stuck_tank_rehome_failure() {
    let printer = Printer::new();
    jam_tilt_on_first_layer(&printer);
    let handle = printer.exposure(2).start().unwrap();

    let mut seen = Vec::new();
    wait_for_state(&handle, ExposureState::Stuck, &mut seen);
    printer.mc(|mc| mc.push_homing_results(AxisKind::Tilt, &[-3, -3]));
    handle.send(Command::Continue);

    let (report, rest) = handle.join();
    seen.extend(rest);
    assert_eq!(report.state, ExposureState::Failure);
    assert_eq!(report.fatal.map(|f| f.code), Some(ErrorCode::TiltHomeFailed));
    assert_eq!(states(&seen).last(), Some(&ExposureState::Failure));
    assert!(printer.mc(|mc| mc.is_released(AxisKind::Tower) && mc.is_released(AxisKind::Tilt)));
}

#[test]
fn test_stuck_tank_back_releases_motors() {
    let printer = Printer::new();
    jam_tilt_on_first_layer(&printer);
    let handle = printer.exposure(2).start().unwrap();

    let mut seen = Vec::new();
    wait_for_state(&handle, ExposureState::Stuck, &mut seen);
    handle.send(Command::Back);

    let (report, _) = handle.join();
    assert_eq!(report.state, ExposureState::Canceled);
    assert_eq!(report.actual_layer, 0);
    // Not parked: the tower was released instead
    assert_ne!(printer.mc(|mc| mc.moves(AxisKind::Tower)).last(), Some(&96_000));
    assert!(printer.mc(|mc| mc.is_released(AxisKind::Tower)));
}

#[test]
fn test_worker_panic_switches_off_uv_and_releases_motors() {
    let printer = Printer::new();
    printer.screen.on_layer(|index, _| {
        if index == 1 {
            panic!("display driver crashed");
        }
    });
    let config = HwConfig {
        blink_exposure: false,
        ..HwConfig::default()
    };
    let exposure = printer.builder(config).project(project(3)).build().unwrap();
    let (report, events) = run(exposure);

    assert_eq!(report.state, ExposureState::Failure);
    assert_eq!(report.fatal.map(|f| f.code), Some(ErrorCode::WorkerPanicked));
    // Counters survive the crash; the tower already stands at layer 1
    assert_eq!(report.actual_layer, 1);
    assert_eq!(report.position, Nm(100_000));
    assert!(report.resin_count_ml > 0.0);
    assert_eq!(states(&events).last(), Some(&ExposureState::Failure));
    assert!(!printer.hardware.uv_on());
    assert!(printer.mc(|mc| mc.is_released(AxisKind::Tower) && mc.is_released(AxisKind::Tilt)));
}

// =============================================================================
// Resin
// =============================================================================

#[test]
fn test_not_enough_resin_warning_continue() {
    let printer = Printer::new();
    printer.hardware.set_resin_ml(Some(70.0));
    let exposure = printer
        .builder(HwConfig::default())
        .project(Project::new(ProjectConfig {
            used_material_ml: 10.0,
            ..project(2).config().clone()
        }))
        .build()
        .unwrap();
    exposure.commands().send(Command::Continue);
    let (report, events) = run(exposure);

    assert_eq!(report.state, ExposureState::Finished);
    assert!(matches!(
        report.warnings.as_slice(),
        [Warning::ResinNotEnough { .. }]
    ));
    assert_eq!(
        states(&events),
        vec![
            ExposureState::Checks,
            ExposureState::CheckWarning,
            ExposureState::Checks,
            ExposureState::Printing,
            ExposureState::Finished,
        ]
    );
    assert!(events.contains(&ExposureEvent::Check {
        check: ExposureCheck::Resin,
        result: CheckResult::Warning,
    }));
}

#[test]
fn test_not_enough_resin_warning_back() {
    let printer = Printer::new();
    printer.hardware.set_resin_ml(Some(70.0));
    let exposure = printer
        .builder(HwConfig::default())
        .project(Project::new(ProjectConfig {
            used_material_ml: 10.0,
            ..project(2).config().clone()
        }))
        .build()
        .unwrap();
    exposure.commands().send(Command::Back);
    let (report, events) = run(exposure);

    assert_eq!(report.state, ExposureState::Canceled);
    assert_eq!(states(&events).last(), Some(&ExposureState::Canceled));
    assert!(layers(&events).is_empty());
}

#[test]
fn test_resin_too_low_fails() {
    let printer = Printer::new();
    printer.hardware.set_resin_ml(Some(40.0));
    let (report, events) = run(printer.exposure(2));

    assert_eq!(report.state, ExposureState::Failure);
    let fatal = report.fatal.unwrap();
    assert_eq!(fatal.code, ErrorCode::ResinTooLow);
    assert!(fatal.payload.is_some());
    assert!(events.contains(&ExposureEvent::Check {
        check: ExposureCheck::Resin,
        result: CheckResult::Failure,
    }));
}

#[test]
fn test_resin_sensor_failure() {
    let printer = Printer::new();
    printer.hardware.set_resin_ml(None);
    let (report, _) = run(printer.exposure(2));
    assert_eq!(report.fatal.map(|f| f.code), Some(ErrorCode::ResinSensorFailed));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_resin_count_never_decreases(
        whites in prop::collection::vec(0u32..3_000_000, 1..8),
    ) {
        let printer = Printer::new();
        printer.screen.push_white_pixels(&whites);
        let layer_count = whites.len() as u32;
        let (report, events) = run(printer.exposure(layer_count));

        prop_assert_eq!(report.state, ExposureState::Finished);
        let records = layers(&events);
        prop_assert_eq!(records.len(), whites.len());
        let mut previous = 0.0;
        for record in &records {
            prop_assert!(record.resin_count_ml >= previous);
            previous = record.resin_count_ml;
        }
        prop_assert!((report.resin_count_ml - previous).abs() < 1e-9);
    }
}

// =============================================================================
// Snapshots
// =============================================================================

#[test]
fn test_snapshot_written_per_layer_and_removed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("last_exposure.json");
    let printer = Printer::new();

    let seen_during_print = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&seen_during_print);
    let watched = path.clone();
    printer.screen.on_layer(move |index, _| {
        if index == 1 {
            flag.store(watched.exists(), Ordering::SeqCst);
        }
    });

    let exposure = printer
        .builder(HwConfig::default())
        .project(project(2))
        .snapshot_path(&path)
        .build()
        .unwrap();
    let (report, _) = run(exposure);

    assert_eq!(report.state, ExposureState::Finished);
    assert!(seen_during_print.load(Ordering::SeqCst));
    assert!(!path.exists());
}

fn snapshot(name: &str, actual_layer: u32) -> ExposureSnapshot {
    ExposureSnapshot {
        project_name: name.into(),
        actual_layer,
        position_nm: i64::from(actual_layer) * 50_000,
        resin_count_ml: 0.5,
        resin_volume_ml: Some(200.0),
        slow_layers_done: actual_layer,
        exposure_profile: "default".into(),
        canceled: false,
        saved_at: 0,
    }
}

#[test]
fn test_resume_from_snapshot() {
    let printer = Printer::new();
    let exposure = printer
        .builder(HwConfig::default())
        .project(project(2))
        .resume(snapshot("numbers", 1))
        .build()
        .unwrap();
    let (report, events) = run(exposure);

    assert_eq!(report.state, ExposureState::Finished);
    assert_eq!(report.actual_layer, 2);
    assert_eq!(report.position, Nm(100_000));
    assert_eq!(report.slow_layers_done, 2);
    assert!(report.resin_count_ml >= 0.5);
    let shown: Vec<u32> = printer.screen.shown().iter().map(|s| s.0).collect();
    assert_eq!(shown, vec![1]);
    assert_eq!(layers(&events)[0].index, 1);
}

#[test]
fn test_resume_finished_snapshot_is_done() {
    let printer = Printer::new();
    let exposure = printer
        .builder(HwConfig::default())
        .project(project(2))
        .resume(snapshot("numbers", 2))
        .build()
        .unwrap();
    let (report, events) = run(exposure);

    assert_eq!(report.state, ExposureState::Done);
    assert_eq!(states(&events), vec![ExposureState::Done]);
    assert!(printer.mc(|mc| mc.commands().is_empty()));
}

#[test]
fn test_resume_other_project_fails() {
    let printer = Printer::new();
    let exposure = printer
        .builder(HwConfig::default())
        .project(project(2))
        .resume(snapshot("other", 1))
        .build()
        .unwrap();
    let (report, _) = run(exposure);

    assert_eq!(report.state, ExposureState::Failure);
    assert_eq!(report.fatal.map(|f| f.code), Some(ErrorCode::Project));
}

#[test]
fn test_empty_project_fails() {
    let printer = Printer::new();
    let (report, _) = run(printer.exposure(0));
    assert_eq!(report.state, ExposureState::Failure);
    assert_eq!(report.fatal.map(|f| f.code), Some(ErrorCode::Project));
}

// =============================================================================
// Axes
// =============================================================================

fn axes(link: &McLink<SimulatedController>) -> Axes<SimulatedController, RecordingDelay> {
    Axes::with_defaults(link.clone(), RecordingDelay::new(), &HwConfig::default()).unwrap()
}

#[test]
fn test_home_calibration_gives_up() {
    let link = McLink::new(SimulatedController::new());
    link.with(|mc| {
        mc.set_homing_fallback(AxisKind::Tilt, -3);
        Ok(())
    })
    .unwrap();
    let mut axes = axes(&link);

    assert_eq!(
        axes.tilt.home_calibrate(),
        Err(MotionError::HomeCheckFailed { axis: AxisKind::Tilt }.into())
    );
    let homes = link
        .with(|mc| {
            Ok(mc
                .commands()
                .iter()
                .filter(|c| matches!(c, McCommand::Home(AxisKind::Tilt)))
                .count())
        })
        .unwrap();
    assert_eq!(homes, 3);
}

#[test]
fn test_no_unstuck_within_tolerance() {
    let link = McLink::new(SimulatedController::new());
    let mut axes = axes(&link);
    axes.start().unwrap();
    axes.tilt.sync_ensure(2).unwrap();
    axes.tilt.go_to_level().unwrap();
    link.with(|mc| {
        mc.clear_log();
        Ok(())
    })
    .unwrap();

    let set = ProfileSet::<LayerProfiles>::new();
    let slow = LayerChange::from_profile(set.profile(LayerProfileId::Slow)).unwrap();
    axes.tilt.layer_down(&slow.tilt_down).unwrap();
    assert_eq!(axes.tilt.position().unwrap(), Ustep::ZERO);
    link.with(|mc| {
        assert!(!mc
            .commands()
            .iter()
            .any(|c| matches!(c, McCommand::SetPosition(AxisKind::Tilt, 128) | McCommand::Home(_))));
        Ok(())
    })
    .unwrap();
}

/// Tilt moves and selected slots of one slow layer change.
fn slow_tear_off(changes: &ProfileSet<LayerProfiles>) -> (Vec<i32>, Vec<u8>, Vec<i32>) {
    let link = McLink::new(SimulatedController::new());
    let mut axes = axes(&link);
    axes.start().unwrap();
    axes.tilt.sync_ensure(2).unwrap();
    axes.tilt.go_to_level().unwrap();
    link.with(|mc| {
        mc.clear_log();
        Ok(())
    })
    .unwrap();

    let slow = LayerChange::from_profile(changes.profile(LayerProfileId::Slow)).unwrap();
    axes.tilt.layer_down(&slow.tilt_down).unwrap();
    let (down, down_slots) = link
        .with(|mc| {
            let out = (mc.moves(AxisKind::Tilt), mc.selected_profiles(AxisKind::Tilt));
            mc.clear_log();
            Ok(out)
        })
        .unwrap();
    axes.tilt.layer_up(&slow.tilt_up).unwrap();
    let up = link.with(|mc| Ok(mc.moves(AxisKind::Tilt))).unwrap();
    (down, down_slots, up)
}

#[test]
fn test_model_tear_off_differs_only_in_data() {
    let sl1 = ProfileSet::<LayerProfiles>::new();
    let (down, slots, up) = slow_tear_off(&sl1);
    assert_eq!(down, vec![4278, 0]);
    assert_eq!(slots, vec![5, 4]);
    assert_eq!(up, vec![4528, 4928]);

    let file = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/SL1S/default_layer_profiles.json");
    let sl1s = ProfileSet::<LayerProfiles>::load(&ProfileFiles {
        default: Some(&file),
        ..ProfileFiles::default()
    })
    .unwrap();
    let (down, slots, up) = slow_tear_off(&sl1s);
    assert_eq!(down, vec![0]);
    assert_eq!(slots, vec![6, 4]);
    assert_eq!(up, vec![3728, 4928]);
}
