mod common;

use common::{fixture_path, run_attune};

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ============================================================================
// plan
// ============================================================================

#[test]
fn plan_json_reference() {
    let output = run_attune(&["plan", "--format", "json", "--seed", "5"]);
    assert!(output.status.success(), "plan failed: {}", stderr(&output));

    let parsed: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("plan JSON should be valid");
    assert_eq!(parsed["summary"]["total_duration_ms"], 720_000);
    assert_eq!(parsed["summary"]["total_sounds"], 9);

    let timeline = parsed["timeline"].as_array().unwrap();
    let switches = timeline
        .iter()
        .filter(|e| e["kind"] == "switch-sound")
        .count();
    assert_eq!(switches, 56);
    assert_eq!(timeline.last().unwrap()["kind"], "session-complete");
}

#[test]
fn plan_is_reproducible_with_seed() {
    let a = run_attune(&["plan", "--format", "json", "--seed", "42"]);
    let b = run_attune(&["plan", "--format", "json", "--seed", "42"]);
    assert_eq!(stdout(&a), stdout(&b));
}

#[test]
fn plan_human_uses_configured_protocol() {
    let config = fixture_path("short_protocol.yaml");
    let output = run_attune(&["plan", "--config", config.to_str().unwrap(), "--seed", "1"]);
    assert!(output.status.success(), "plan failed: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("Session: 0:40 (3 sounds)"), "{text}");
    assert!(text.contains("Listen only to the kettle."), "{text}");
}

// ============================================================================
// validate
// ============================================================================

#[test]
fn validate_accepts_good_file() {
    let config = fixture_path("short_protocol.yaml");
    let output = run_attune(&["validate", config.to_str().unwrap()]);
    assert!(output.status.success(), "validate failed: {}", stderr(&output));
    assert!(stdout(&output).contains("ok"));
}

#[test]
fn validate_reports_overrun_with_config_exit_code() {
    let config = fixture_path("overrunning_instruction.yaml");
    let output = run_attune(&["validate", config.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(2));
    let err = stderr(&output);
    assert!(
        err.contains("Instruction offset 90000ms exceeds phase duration 60000ms"),
        "{err}"
    );
}

#[test]
fn validate_suggests_close_sound_id() {
    let config = fixture_path("misspelled_target.yaml");
    let output = run_attune(&["validate", config.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("Did you mean 'clock-tick'?"));
}

#[test]
fn validate_strict_fails_on_warnings() {
    let config = fixture_path("wide_jitter.yaml");
    let path = config.to_str().unwrap();

    assert!(run_attune(&["validate", path]).status.success());
    assert_eq!(
        run_attune(&["validate", "--strict", path]).status.code(),
        Some(2)
    );
}

// ============================================================================
// rate / results
// ============================================================================

#[test]
fn rating_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("sessions.json");
    let store = store.to_str().unwrap();

    let output = run_attune(&["results", "--store", store]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("No sessions recorded yet."));

    let output = run_attune(&["rate", "pre", "-2", "--store", store]);
    assert!(output.status.success(), "rate pre failed: {}", stderr(&output));
    assert!(stdout(&output).contains("Before: -2 (Very Self-Focused)"));

    let output = run_attune(&["rate", "post", "1", "--store", store]);
    assert!(output.status.success(), "rate post failed: {}", stderr(&output));
    assert!(stdout(&output).contains("Improved by 3 points"));

    let output = run_attune(&["results", "--store", store, "--format", "json"]);
    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(parsed["pre"], -2);
    assert_eq!(parsed["post"], 1);
    assert_eq!(parsed["change"]["change"], 3);
    assert_eq!(parsed["stats"]["total_sessions"], 1);
    assert_eq!(parsed["stats"]["improvement_rate"], 100);
}

#[test]
fn rate_post_without_pre_is_a_store_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("sessions.json");
    let output = run_attune(&["rate", "post", "0", "--store", store.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(5));
    assert!(stderr(&output).contains("no session in progress"));
}

#[test]
fn rating_out_of_range_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("sessions.json");
    let output = run_attune(&["rate", "pre", "7", "--store", store.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(5));
    assert!(!store.exists());
}

// ============================================================================
// general
// ============================================================================

#[test]
fn help_lists_commands() {
    let output = run_attune(&["--help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    for command in ["run", "plan", "validate", "rate", "results"] {
        assert!(text.contains(command), "help should list {command}: {text}");
    }
}

#[test]
fn unknown_command_fails() {
    let output = run_attune(&["dance"]);
    assert!(!output.status.success());
}
