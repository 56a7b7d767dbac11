use std::process::Command;

const PLAN: &str = r#"{"name":"Roadmap","tasks":[{"name":"kickoff","duration":0},{"name":"build","duration":5}]}"#;

fn hub(state_dir: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_project-hub"));
    cmd.arg("--yes").arg("--state-dir").arg(state_dir);
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn normalize_rewrites_legacy_milestones() {
    let tempdir = tempfile::tempdir().unwrap();
    let path = tempdir.path().join("plan.json");
    std::fs::write(&path, PLAN).unwrap();

    let output = hub(&tempdir.path().join("state"))
        .arg("normalize")
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let saved: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(saved["tasks"][0]["milestone"], true);
    assert!(saved["tasks"][1].get("milestone").is_none());
    assert!(tempdir.path().join("state").join("recent.json").exists());
}

#[test]
fn open_prints_summary() {
    let tempdir = tempfile::tempdir().unwrap();
    let path = tempdir.path().join("plan.json");
    std::fs::write(&path, PLAN).unwrap();

    let output = hub(&tempdir.path().join("state"))
        .arg("open")
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Roadmap"));
    assert!(stdout.contains("2 tasks"));
    assert!(stdout.contains("kickoff (0d) [milestone]"));
}

#[test]
fn open_of_malformed_file_fails() {
    let tempdir = tempfile::tempdir().unwrap();
    let path = tempdir.path().join("broken.json");
    std::fs::write(&path, "not json").unwrap();

    let output = hub(&tempdir.path().join("state"))
        .arg("open")
        .arg(&path)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("can't open document"));
    assert!(stderr.contains("unsupported document format"));
}

#[test]
fn new_saves_to_given_target() {
    let tempdir = tempfile::tempdir().unwrap();
    let path = tempdir.path().join("fresh.json");

    let output = hub(&tempdir.path().join("state"))
        .arg("new")
        .arg("--name")
        .arg("Launch")
        .arg("--save-to")
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let saved: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(saved["name"], "Launch");
    assert_eq!(saved["tasks"].as_array().unwrap().len(), 0);
}
