//! Command behavior tests for autoops

mod common;

use common::TestEnv;
use predicates::prelude::*;

#[test]
fn test_init_writes_config_and_dirs() {
    let env = TestEnv::new().unwrap();
    let config = env.config_dir.join("fresh.json");

    env.command()
        .arg("--config")
        .arg(&config)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("autoops initialized"))
        .stdout(predicate::str::contains("OPENAI_API_KEY"));

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&config).unwrap()).unwrap();
    assert_eq!(written["decision"]["model"], "gpt-4o-mini");
    assert_eq!(written["search"]["max_results"], 5);

    // Defaults live under ~/.autoops, and HOME is the temp dir
    assert!(env.config_dir.join("history").is_dir());
    assert!(env.config_dir.join("sandbox").is_dir());
}

#[test]
fn test_init_keeps_existing_config() {
    let env = TestEnv::new().unwrap();
    env.create_config().unwrap();
    let before = std::fs::read_to_string(env.config_file()).unwrap();

    env.with_config().arg("init").assert().success();

    assert_eq!(std::fs::read_to_string(env.config_file()).unwrap(), before);
    assert!(env.history_dir().is_dir());
    assert!(env.sandbox_dir().is_dir());
}

#[test]
fn test_stop_raises_configured_signal() {
    let env = TestEnv::new().unwrap();
    env.create_config().unwrap();

    env.with_config()
        .arg("stop")
        .assert()
        .success()
        .stdout(predicate::str::contains("Stop signal raised"));

    assert!(env.stop_file().exists());
}

#[test]
fn test_stop_with_explicit_path() {
    let env = TestEnv::new().unwrap();
    let path = env.temp_dir.path().join("nested").join("halt");

    env.command()
        .arg("stop")
        .arg("--stop-signal")
        .arg(&path)
        .assert()
        .success();

    assert!(path.exists());
}

#[test]
fn test_history_list_empty() {
    let env = TestEnv::new().unwrap();
    env.create_config().unwrap();

    env.with_config()
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No stored histories"));
}

#[test]
fn test_history_list_and_print() {
    let env = TestEnv::new().unwrap();
    env.create_config().unwrap();
    env.write_history(
        "run-1",
        r#"[{"step":{"action":"finish","details":{}},"result":{"status":"success","message":"Goal complete"},"recorded_at":"2026-01-01T00:00:00Z"}]"#,
    )
    .unwrap();
    env.write_history("run-2", "[]").unwrap();

    env.with_config()
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("run-1"))
        .stdout(predicate::str::contains("run-2"));

    env.with_config()
        .args(["history", "run-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"action\": \"finish\""))
        .stdout(predicate::str::contains("Goal complete"));
}

#[test]
fn test_history_unknown_id_fails() {
    let env = TestEnv::new().unwrap();
    env.create_config().unwrap();

    env.with_config()
        .args(["history", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no history named 'missing'"));
}

#[test]
fn test_history_corrupt_file_fails() {
    let env = TestEnv::new().unwrap();
    env.create_config().unwrap();
    env.write_history("broken", "{not json").unwrap();

    env.with_config()
        .args(["history", "broken"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("History failed"));
}

#[test]
fn test_invalid_config_fails() {
    let env = TestEnv::new().unwrap();
    std::fs::write(env.config_file(), "{ nope").unwrap();

    env.with_config()
        .arg("history")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}
