//! CLI tests for rolemon_agent (binary).
use assert_cmd::prelude::*;
use std::fs;
use std::process::Command;

#[test]
fn help_prints_usage() {
    let out = Command::cargo_bin("rolemon_agent")
        .expect("binary exists")
        .arg("--help")
        .output()
        .expect("run agent");
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Usage"));
}

#[test]
fn unknown_flag_is_rejected_with_usage() {
    let out = Command::cargo_bin("rolemon_agent")
        .unwrap()
        .arg("--bogus")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("--bogus") && stderr.contains("Usage"), "{stderr}");
}

#[test]
fn check_lists_rules_in_declaration_order() {
    let td = tempfile::tempdir().unwrap();
    let cfg = td.path().join("config.json");
    fs::write(
        &cfg,
        r#"{"applications": [
            {"name": "cpp_service", "roles": [
                {"name": "worker", "process_name": "cpp_worker"},
                {"name": "master", "process_name": "cpp_master"}
            ]}
        ]}"#,
    )
    .unwrap();
    let out = Command::cargo_bin("rolemon_agent")
        .unwrap()
        .args(["--check", "--config"])
        .arg(&cfg)
        .output()
        .unwrap();
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    let worker = text.find("cpp_service_worker").expect("worker listed");
    let master = text.find("cpp_service_master").expect("master listed");
    assert!(worker < master, "{text}");
}

#[test]
fn malformed_rule_table_is_fatal_at_startup() {
    let td = tempfile::tempdir().unwrap();
    let cfg = td.path().join("config.json");
    fs::write(&cfg, r#"{"applications": [{"name": "a", "roles": [{"name": "r"}]}]}"#).unwrap();
    let out = Command::cargo_bin("rolemon_agent")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("neither process_name nor cmdline"));
}

#[test]
fn once_writes_a_single_cycle_to_the_log() {
    let td = tempfile::tempdir().unwrap();
    let cfg = td.path().join("config.json");
    let log = td.path().join("roles.csv");
    // the agent matches its own process name; the log may still be empty if /proc is restricted
    let json = serde_json::json!({
        "cpu_sample_ms": 10,
        "collect_host": false,
        "applications": [{"name": "self", "roles": [{"name": "agent", "process_name": "rolemon_agent"}]}],
        "sinks": {"log": {"path": log}}
    });
    fs::write(&cfg, json.to_string()).unwrap();
    let status = Command::cargo_bin("rolemon_agent")
        .unwrap()
        .args(["--once", "--config"])
        .arg(&cfg)
        .env("ROLEMON_LOG", "warn")
        .status()
        .unwrap();
    assert!(status.success());
    let text = fs::read_to_string(&log).unwrap_or_default();
    if !text.is_empty() {
        assert!(text.starts_with("timestamp,role,"), "{text}");
        assert_eq!(text.matches("timestamp,role").count(), 1);
    }
}
