//! Example: Layered profile files.
//!
//! This example demonstrates how to:
//! - Load a model's layer change profiles on top of the compiled defaults
//! - Read them as typed layer changes
//! - Change user values, publish the changes and save them
//!
//! Run with: `cargo run --example profile_files`

use std::path::Path;

use sla_exposure::{
    config::{ChangeBus, ProjectConfig},
    exposure::{estimate_remaining, to_minutes, LayerPlanner},
    profile::{
        LayerChange, LayerProfileId, LayerProfiles, Level, ProfileFiles, ProfileId, ProfileSet,
    },
    Result,
};

fn print_changes(title: &str, set: &ProfileSet<LayerProfiles>) -> Result<()> {
    println!("{}:", title);
    for id in LayerProfileId::ALL {
        let change = LayerChange::from_profile(set.profile(*id))?;
        println!(
            "  {:<10} down {:?}+{} -> {:?}, up {:?}+{} -> {:?}, {} ms",
            id.name(),
            change.tilt_down.initial_profile,
            change.tilt_down.offset.0,
            change.tilt_down.finish_profile,
            change.tilt_up.initial_profile,
            change.tilt_up.offset.0,
            change.tilt_up.finish_profile,
            change.moves_time.0
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    println!("=== Profile Files Example ===\n");

    let sl1 = ProfileSet::<LayerProfiles>::new();
    print_changes("SL1 (compiled defaults)", &sl1)?;

    let default = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/SL1S/default_layer_profiles.json");
    let dir = std::env::temp_dir().join("sla-exposure-profile-demo");
    std::fs::create_dir_all(&dir).ok();
    let user = dir.join("layer_profiles.json");

    let mut sl1s = ProfileSet::<LayerProfiles>::load(&ProfileFiles {
        default: Some(&default),
        factory: None,
        user: Some(&user),
    })?;
    print_changes("\nSL1S (default file)", &sl1s)?;

    let mut bus = ChangeBus::new();
    bus.subscribe_all(|change| {
        println!(
            "  changed {}.{}: {:?} -> {:?}",
            change.target, change.field, change.old, change.new
        );
    });

    println!("\nSlower tilt-up for a viscous resin:");
    let changes = {
        let mut writer = sl1s.writer(LayerProfileId::Slow);
        writer
            .set("tilt_up_offset_steps", 1600)?
            .set("delay_before_exposure_ms", 1000)?;
        writer.commit(Level::User)
    };
    bus.publish(&changes);
    sl1s.save_user(&user)?;
    println!("  saved to {}", user.display());

    let project = ProjectConfig {
        total_layers: 400,
        layers_slow: 50,
        ..ProjectConfig::default()
    };
    let planner = LayerPlanner::new(&project);
    for (name, set) in [("SL1", &sl1), ("SL1S", &sl1s)] {
        let fast = LayerChange::from_profile(set.profile(LayerProfileId::Fast))?;
        let slow = LayerChange::from_profile(set.profile(LayerProfileId::Slow))?;
        let time = estimate_remaining(&planner, 0, project.total_layers, project.layers_slow, &fast, &slow);
        println!("\n{} estimate for 400 layers: {} min", name, to_minutes(time));
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
