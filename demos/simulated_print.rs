//! Example: A whole print on simulated hardware.
//!
//! This example demonstrates how to:
//! - Load a printer configuration and a project from TOML
//! - Start an exposure on its worker thread
//! - Pause and resume it through the command channel
//! - Follow its progress on the event channel
//!
//! Run with: `cargo run --example simulated_print`

use std::time::Duration;

use log::{Level, LevelFilter, Metadata, Record};
use sla_exposure::{
    config::{parse_hw_config, parse_project_config},
    exposure::{
        to_minutes, Command, ExposureBuilder, ExposureEvent, Project, SimulatedPeripherals,
        SimulatedScreen,
    },
    Axes, McLink, Result, SimulatedController, StdDelay,
};

/// Prints warnings and errors of the library.
struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

fn main() -> Result<()> {
    log::set_logger(&LOGGER).ok();
    log::set_max_level(LevelFilter::Warn);

    println!("=== Simulated Print Example ===\n");

    // Short waits so the demo finishes in seconds on a real clock.
    let config = parse_hw_config(
        r#"
stirring_moves = 1
stirring_delay = 10
up_and_down_wait = 200
move_poll_interval = 1
homing_poll_interval = 1
"#,
    )?;
    let project = Project::new(parse_project_config(
        r#"
name = "demo"
total_layers = 6
exposure_time = 20
exposure_time_first = 50
fade_layers = 3
"#,
    )?);
    println!(
        "Project '{}': {} layers, {} um tall",
        project.name(),
        project.total_layers(),
        project.total_height().0 / 1000
    );

    let link = McLink::new(SimulatedController::new());
    let axes = Axes::with_defaults(link.clone(), StdDelay, &config)?;
    let screen = SimulatedScreen::new(250_000);
    // Layer 2 covers most of the display and is printed slow.
    screen.push_white_pixels(&[250_000, 250_000, 3_000_000]);

    let exposure = ExposureBuilder::new()
        .config(config)
        .project(project)
        .axes(axes)
        .delay(StdDelay)
        .hardware(SimulatedPeripherals::new())
        .screen(screen)
        .build()?;
    println!(
        "Estimated print time: {} min\n",
        to_minutes(exposure.engine().remaining_time())
    );

    let handle = exposure.start()?;
    let mut paused = false;
    while let Ok(event) = handle.events().recv_timeout(Duration::from_secs(5)) {
        match event {
            ExposureEvent::StateChanged { from, to } => println!("  {} -> {}", from, to),
            ExposureEvent::Layer(layer) => {
                println!(
                    "  layer {:>2}: {:>7} px, {} ms, {}, {:.4} ml used",
                    layer.index,
                    layer.white_pixels,
                    layer.etime.0,
                    if layer.slow { "slow" } else { "fast" },
                    layer.resin_count_ml
                );
                if layer.index == 3 && !paused {
                    paused = true;
                    handle.send(Command::Pause);
                    handle.send(Command::Continue);
                }
            }
            ExposureEvent::Warning(warning) => println!("  warning: {}", warning),
            ExposureEvent::Fatal(fatal) => println!("  fatal {:?}: {}", fatal.code, fatal.message),
            ExposureEvent::Check { .. } => {}
        }
        if handle.is_finished() {
            break;
        }
    }

    let (report, _) = handle.join();
    println!("\nResult: {} after {} layers", report.state, report.actual_layer);
    println!("Tower at {} um", report.position.0 / 1000);
    println!("Resin used: {:.4} ml", report.resin_count_ml);
    println!("Print time: {:?}", report.print_time);

    link.with(|mc| {
        println!("Controller commands sent: {}", mc.commands().len());
        Ok(())
    })?;

    println!("\n=== Example Complete ===");
    Ok(())
}
