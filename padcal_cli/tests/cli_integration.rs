use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use assert_cmd::Command;
use tempfile::tempdir;

// Build a minimal valid TOML config tuned for fast simulated runs
fn write_fast_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[grid]
width = 64
height = 64

[positions]
count = 2
jitter = 2
seed = 7

[sampling]
frames_per_position = 2
# keep the auto loop fast in CI
frame_interval_ms = 1
sensor_timeout_ms = 100

[guide]
refresh_ms = 5

[grading]
excellent = 0.05
good = 0.10
fair = 0.20
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["self-check"], 0, "self-check ok", "stdout")]
#[case(&["session", "--auto", "--weight", "w-100g"], 0, "survey complete", "stdout")]
#[case(&["session", "--auto"], 2, "required", "stderr")]
#[case(&["session", "--auto", "--weight", "w-100g", "--region", "nowhere"], 2, "unknown region", "stderr")]
#[case(&["session", "--auto", "--weight", "w-100g", "--jitter", "0"], 2, "jitter", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(&dir);

    let mut cmd = Command::cargo_bin("padcal_cli").unwrap();

    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(&cfg);

    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);

    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn auto_session_saves_json_and_analyze_reads_it_back() {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(&dir);
    let out = dir.path().join("session.json");

    Command::cargo_bin("padcal_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["session", "--auto", "--weight", "w-100g", "--seed", "11"])
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("survey complete"));

    let saved = fs::read_to_string(&out).unwrap();
    assert!(saved.contains("\"status\": \"completed\""));
    assert!(saved.contains("w-100g"));

    let report = dir.path().join("report.txt");
    Command::cargo_bin("padcal_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["analyze", "--input"])
        .arg(&out)
        .arg("--report")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("grade:"));

    let report_text = fs::read_to_string(&report).unwrap();
    assert!(report_text.contains("Local pad sensitivity survey report"));
    assert!(report_text.contains("Reference weight:    w-100g"));
}

#[rstest]
fn guided_session_over_stdin_commands() {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(&dir);

    // 2 positions x 2 frames; four records complete the survey.
    Command::cargo_bin("padcal_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["session", "--weight", "w-100g"])
        .write_stdin("r\nr\nr\nr\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("survey complete"));
}

#[rstest]
fn guided_session_stop_keeps_partial_data() {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(&dir);
    let out = dir.path().join("partial.json");

    Command::cargo_bin("padcal_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["session", "--weight", "w-100g"])
        .arg("--out")
        .arg(&out)
        .write_stdin("r\nr\nq\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("survey stopped"));

    let saved = fs::read_to_string(&out).unwrap();
    assert!(saved.contains("\"status\": \"stopped\""));
}

#[rstest]
fn analyze_rejects_missing_input() {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(&dir);

    Command::cargo_bin("padcal_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["analyze", "--input", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("read session JSON"));
}

#[rstest]
fn analyze_of_empty_session_reports_no_samples() {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(&dir);
    let out = dir.path().join("empty.json");

    // Stop before any position is sealed.
    Command::cargo_bin("padcal_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["session", "--weight", "w-100g"])
        .arg("--out")
        .arg(&out)
        .write_stdin("q\n")
        .assert()
        .success();

    Command::cargo_bin("padcal_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["analyze", "--input"])
        .arg(&out)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("no recorded data"));
}

#[rstest]
fn cli_reports_bad_calibration_header() {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(&dir);

    let bad_csv = dir.path().join("calib.csv");
    fs::write(&bad_csv, "raw,value\n100,0.0\n200,1.0\n").unwrap();

    Command::cargo_bin("padcal_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--calibration")
        .arg(&bad_csv)
        .arg("self-check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Expected 'raw,kpa'"));
}

#[rstest]
fn explicit_missing_config_is_an_error() {
    Command::cargo_bin("padcal_cli")
        .unwrap()
        .args(["--config", "missing.toml", "self-check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}
