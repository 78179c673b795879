//! Unit tests for layered JSON profile files.

use std::fs;
use std::path::Path;

use sla_exposure::config::{ChangeBus, Ms, Nm};
use sla_exposure::error::{ConfigError, Error};
use sla_exposure::profile::{
    ExposureProfileId, ExposureProfiles, LayerChange, LayerProfileId, LayerProfiles, Level,
    ProfileFiles, ProfileSet, TiltMovingProfiles, TiltProfileId, TowerMovingProfiles,
    TowerProfileId,
};

fn sl1s_layer_profiles() -> &'static Path {
    Path::new(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/data/SL1S/default_layer_profiles.json"
    ))
}

/// Test that factory and user files override the defaults in order.
#[test]
fn test_layers_override_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let factory = dir.path().join("factory.json");
    let user = dir.path().join("user.json");
    fs::write(&factory, r#"{"moveFast": {"current": 40, "acceleration": 300}}"#).unwrap();
    fs::write(&user, r#"{"moveFast": {"current": 36}}"#).unwrap();

    let set = ProfileSet::<TiltMovingProfiles>::load(&ProfileFiles {
        default: None,
        factory: Some(&factory),
        user: Some(&user),
    })
    .expect("Failed to load profiles");

    let fast = set.profile(TiltProfileId::MoveFast);
    assert_eq!(fast.value("current"), Ok(36));
    assert_eq!(fast.value("acceleration"), Ok(300));
    assert_eq!(fast.layer_value(Level::Factory, 4), Some(40));
    assert!(set.is_modified());
}

/// Test that missing factory and user files are not an error.
#[test]
fn test_missing_optional_files() {
    let dir = tempfile::tempdir().unwrap();
    let factory = dir.path().join("factory.json");
    let user = dir.path().join("user.json");

    let set = ProfileSet::<TowerMovingProfiles>::load(&ProfileFiles {
        default: None,
        factory: Some(&factory),
        user: Some(&user),
    })
    .unwrap();
    assert!(!set.is_modified());
}

/// Test that a missing default file is an error.
#[test]
fn test_missing_default_file() {
    let dir = tempfile::tempdir().unwrap();
    let default = dir.path().join("default.json");
    let result = ProfileSet::<LayerProfiles>::load(&ProfileFiles {
        default: Some(&default),
        ..ProfileFiles::default()
    });
    assert!(matches!(result, Err(Error::Config(ConfigError::IoError(_)))));
}

/// Test that a value outside its field range is rejected.
#[test]
fn test_out_of_range_value_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let user = dir.path().join("user.json");
    fs::write(&user, r#"{"homingFast": {"current": 64}}"#).unwrap();

    let result = ProfileSet::<TowerMovingProfiles>::load(&ProfileFiles {
        user: Some(&user),
        ..ProfileFiles::default()
    });
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::ValueOutOfRange { value: 64, .. }))
    ));
}

/// Test that the shipped second-model file only changes tear-off data.
#[test]
fn test_model_default_file() {
    let set = ProfileSet::<LayerProfiles>::load(&ProfileFiles {
        default: Some(sl1s_layer_profiles()),
        ..ProfileFiles::default()
    })
    .unwrap();

    let slow = LayerChange::from_profile(set.profile(LayerProfileId::Slow)).unwrap();
    assert_eq!(slow.tilt_down.initial_profile, TiltProfileId::LayerMoveFast);
    assert_eq!(slow.tilt_down.offset.0, 0);
    assert_eq!(slow.tilt_up.offset.0, 1200);
    assert_eq!(slow.tilt_up.finish_profile, TiltProfileId::LayerMoveFast);
    assert_eq!(slow.moves_time, Ms(7000));
    // Fields the file leaves out keep their compiled values
    assert_eq!(slow.tower_profile, TowerProfileId::Layer);
    assert_eq!(slow.tower_hop_height, Nm::ZERO);
    assert!(slow.use_tilt);

    // A default file does not count as a modification
    assert!(!set.is_modified());
    let super_slow = set.profile(LayerProfileId::SuperSlow);
    assert_eq!(super_slow.value("tilt_down_offset_steps"), Ok(2200));
}

/// Test that saved user values load back and only differences are written.
#[test]
fn test_save_user_values() {
    let dir = tempfile::tempdir().unwrap();
    let user = dir.path().join("user.json");

    let mut set = ProfileSet::<ExposureProfiles>::new();
    let changes = {
        let mut writer = set.writer(ExposureProfileId::Default);
        writer
            .set("large_fill_layer_profile", 3)
            .unwrap()
            .set("small_fill_layer_profile", 1)
            .unwrap();
        writer.commit(Level::User)
    };
    // small fill was already 1
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].field, "large_fill_layer_profile");
    assert_eq!(changes[0].old, Some(2));
    assert_eq!(changes[0].new, Some(3));

    set.save_user(&user).unwrap();
    let loaded = ProfileSet::<ExposureProfiles>::load(&ProfileFiles {
        user: Some(&user),
        ..ProfileFiles::default()
    })
    .unwrap();
    assert_eq!(
        loaded.profile(ExposureProfileId::Default).value("large_fill_layer_profile"),
        Ok(3)
    );
    assert!(!fs::read_to_string(&user).unwrap().contains("small_fill_layer_profile"));
}

/// Test that committed changes reach subscribers of the field.
#[test]
fn test_changes_published() {
    let mut set = ProfileSet::<TowerMovingProfiles>::new();
    let changes = {
        let mut writer = set.writer(TowerProfileId::MoveFast);
        writer.set("current", 30).unwrap();
        writer.commit(Level::User)
    };

    let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = std::sync::Arc::clone(&seen);
    let mut bus = ChangeBus::new();
    bus.subscribe("current", move |change| {
        sink.lock().unwrap().push(change.new);
    });
    bus.subscribe("acceleration", |_| panic!("not changed"));

    assert_eq!(bus.publish(&changes), 1);
    assert_eq!(*seen.lock().unwrap(), vec![Some(30)]);
}

/// Test that an invalid staged value leaves the profile untouched.
#[test]
fn test_writer_rejects_unknown_field() {
    let mut set = ProfileSet::<TiltMovingProfiles>::new();
    let mut writer = set.writer(TiltProfileId::LayerRelease);
    assert!(matches!(
        writer.set("speed", 10),
        Err(ConfigError::UnknownField { .. })
    ));
    assert!(writer.is_empty());
}

/// Test that a user value equal to the default still overrides the factory.
#[test]
fn test_user_value_back_to_default_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let factory = dir.path().join("factory.json");
    let user = dir.path().join("user.json");
    fs::write(&factory, r#"{"moveFast": {"current": 49}}"#).unwrap();
    let files = ProfileFiles {
        default: None,
        factory: Some(&factory),
        user: Some(&user),
    };

    let mut set = ProfileSet::<TiltMovingProfiles>::load(&files).unwrap();
    let default = set
        .profile(TiltProfileId::MoveFast)
        .layer_value(Level::Default, 4)
        .unwrap();
    {
        let mut writer = set.writer(TiltProfileId::MoveFast);
        writer.set("current", default).unwrap();
        writer.commit(Level::User);
    }
    assert_eq!(set.profile(TiltProfileId::MoveFast).value("current"), Ok(default));

    set.save_user(&user).unwrap();
    assert!(fs::read_to_string(&user).unwrap().contains("current"));
    let loaded = ProfileSet::<TiltMovingProfiles>::load(&files).unwrap();
    assert_eq!(loaded.profile(TiltProfileId::MoveFast).value("current"), Ok(default));
}
