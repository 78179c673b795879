//! Unit tests for TOML configuration files.

use std::fs;

use sla_exposure::config::{
    load_hw_config, load_project_config, parse_hw_config, parse_project_config, HwConfig, Ms, Nm,
    Ustep,
};
use sla_exposure::error::{ConfigError, Error};
use sla_exposure::exposure::Project;
use sla_exposure::profile::ExposureProfileId;

const SL1S_HARDWARE: &str = r#"
tower_sensitivity = 1
tilt_height = 4928
tilt_max = 6016
limit4fast = 45
stirring_moves = 2
per_partes = true
up_and_down_every_layer = 50
up_and_down_expo_comp = 1000

[display]
width_px = 1620
height_px = 2560

[resin]
min_ml = 68.5
max_ml = 200.0
"#;

const PROJECT: &str = r#"
name = "gear"
total_layers = 40
layers_slow = 5
used_material_ml = 12.5
exposure_time = 2000
exposure_time_first = 30000
layer_height = 50000
layer_height_first = 100000
fade_layers = 3
slice2 = 21
layer_height2 = 25000
exposure_time2 = 1500
exposure_profile = "safe"
"#;

/// Test loading a printer configuration from a file.
#[test]
fn test_load_hw_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hardware.toml");
    fs::write(&path, SL1S_HARDWARE).unwrap();

    let config = load_hw_config(&path).expect("Failed to load hardware config");
    assert_eq!(config.tower_sensitivity, 1);
    assert_eq!(config.tilt_height, Ustep(4928));
    assert_eq!(config.stirring_moves, 2);
    assert!(config.per_partes);
    assert_eq!(config.up_and_down_expo_comp, Ms(1000));
    assert_eq!(config.display.width_px, 1620);
    // 45 % of 1620 x 2560
    assert_eq!(config.white_pixels_threshold(), 1_866_240);
    // Not listed, so defaults apply
    assert_eq!(config.tower_height, HwConfig::default().tower_height);
}

/// Test that a tilt height above the tilt range is rejected.
#[test]
fn test_tilt_height_out_of_range() {
    let result = parse_hw_config("tilt_height = 7000\ntilt_max = 6016\n");
    match result {
        Err(Error::Config(ConfigError::ValueOutOfRange { field, value, .. })) => {
            assert_eq!(field.as_str(), "tilt_height");
            assert_eq!(value, 7000);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

/// Test that swapped tilt limits are rejected.
#[test]
fn test_tilt_limits_swapped() {
    assert!(matches!(
        parse_hw_config("tilt_min = 100\ntilt_max = -100\ntilt_height = 0\n"),
        Err(Error::Config(ConfigError::InvalidTiltLimits { min: 100, max: -100 }))
    ));
}

/// Test that a TOML syntax error is reported as a parse error.
#[test]
fn test_hw_config_syntax_error() {
    assert!(matches!(
        parse_hw_config("tilt = [true"),
        Err(Error::Config(ConfigError::ParseError(_)))
    ));
}

/// Test loading a project and planning its layers.
#[test]
fn test_load_project_and_plan_layers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, PROJECT).unwrap();

    let config = load_project_config(&path).expect("Failed to load project config");
    assert_eq!(config.exposure_profile, ExposureProfileId::Safe);
    assert_eq!(config.first_slow_layers(), 6);

    let project = Project::new(config);
    assert!(project.validate().is_ok());
    assert_eq!(project.total_layers(), 40);
    let first = project.layer(0).unwrap();
    assert_eq!(first.image, "gear00000.png");
    assert_eq!(first.height, Nm(100_000));
    assert_eq!(first.etime, Ms(30000));
    // Layer number 21 is index 20
    assert_eq!(project.layer(19).unwrap().height, Nm(50_000));
    assert_eq!(project.layer(19).unwrap().etime, Ms(2000));
    assert_eq!(project.layer(20).unwrap().height, Nm(25_000));
    assert_eq!(project.layer(20).unwrap().etime, Ms(1500));
    // 100 um + 19 x 50 um + 20 x 25 um
    assert_eq!(project.total_height(), Nm(1_550_000));
}

/// Test that fade layers outside the supported range are rejected.
#[test]
fn test_fade_layers_out_of_range() {
    assert!(matches!(
        parse_project_config("fade_layers = 2\n"),
        Err(Error::Config(ConfigError::InvalidFadeLayers(2)))
    ));
    assert!(matches!(
        parse_project_config("fade_layers = 201\n"),
        Err(Error::Config(ConfigError::InvalidFadeLayers(201)))
    ));
}

/// Test that non-positive layer heights are rejected.
#[test]
fn test_zero_layer_height() {
    assert!(matches!(
        parse_project_config("layer_height = 0\n"),
        Err(Error::Config(ConfigError::InvalidLayerHeight(0)))
    ));
}

/// Test that an unknown exposure profile name is rejected.
#[test]
fn test_unknown_exposure_profile() {
    assert!(parse_project_config("exposure_profile = \"turbo\"\n").is_err());
}

/// Test explicit layer images overriding the layer count.
#[test]
fn test_project_with_images() {
    let config = parse_project_config("name = \"cube\"\ntotal_layers = 99\n").unwrap();
    let project = Project::with_images(config, vec!["a.png".into(), "b.png".into()]);
    assert_eq!(project.total_layers(), 2);
    assert_eq!(project.layers()[1].image, "b.png");
}
