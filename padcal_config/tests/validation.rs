use padcal_config::{Config, load_toml};

#[test]
fn defaults_are_valid() {
    let cfg = Config::default();
    cfg.validate().expect("built-in defaults must validate");
    assert_eq!(cfg.regions.len(), 9);
    assert!(cfg.region("center").is_some());
}

#[test]
fn rejects_zero_frame_interval() {
    let toml = r#"
[sampling]
frames_per_position = 10
frame_interval_ms = 0
sensor_timeout_ms = 150
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject frame_interval_ms=0");
    assert!(
        format!("{err}")
            .to_lowercase()
            .contains("frame_interval_ms must be >= 1")
    );
}

#[test]
fn rejects_zero_frames_per_position() {
    let toml = r#"
[sampling]
frames_per_position = 0
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject frames_per_position=0");
    assert!(format!("{err}").contains("frames_per_position must be >= 1"));
}

#[test]
fn rejects_region_outside_grid() {
    let toml = r#"
[grid]
width = 16
height = 16

[[regions]]
id = "far"
x = 20
y = 2
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject out-of-grid region");
    assert!(format!("{err}").contains("outside the 16x16 grid"));
}

#[test]
fn rejects_nonpositive_jitter() {
    let toml = r#"
[positions]
count = 5
jitter = 0
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject jitter=0");
    assert!(format!("{err}").contains("jitter must be > 0"));
}

#[test]
fn rejects_unordered_grading_thresholds() {
    let toml = r#"
[grading]
excellent = 0.10
good = 0.05
fair = 0.20
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject unordered thresholds");
    assert!(format!("{err}").contains("excellent < good < fair"));
}

#[test]
fn rejects_out_of_range_grading_threshold() {
    let toml = r#"
[grading]
excellent = 0.0
good = 0.10
fair = 0.20
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject zero threshold");
    assert!(format!("{err}").contains("grading.excellent"));
}

#[test]
fn accepts_full_custom_config() {
    let toml = r#"
[grid]
width = 32
height = 32

[[regions]]
id = "mid"
x = 16
y = 16

[positions]
count = 7
jitter = 2
seed = 9

[sampling]
frames_per_position = 5
frame_interval_ms = 50
sensor_timeout_ms = 100

[guide]
refresh_ms = 250

[grading]
excellent = 0.02
good = 0.05
fair = 0.10

[logging]
level = "debug"

[calibration]
gain_kpa_per_count = 0.02
zero_counts = 120
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.positions.seed, Some(9));
    assert_eq!(cfg.region("mid").map(|r| (r.x, r.y)), Some((16, 16)));
    let calib = cfg.calibration.expect("calibration table parsed");
    assert_eq!(calib.zero_counts, 120);
    assert_eq!(calib.offset_kpa, 0.0);
}

#[test]
fn sensor_timeout_accepts_alias() {
    let toml = r#"
[sampling]
timeout_ms = 99
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    assert_eq!(cfg.sampling.sensor_timeout_ms, 99);
}

#[test]
fn custom_regions_replace_defaults() {
    let toml = r#"
[[regions]]
id = "only"
x = 1
y = 1
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    assert_eq!(cfg.regions.len(), 1);
    assert!(cfg.region("center").is_none());
}
