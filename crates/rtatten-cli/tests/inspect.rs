use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::{error::Error, fs, path::PathBuf};

#[test]
fn inspect_prints_normalized_session() -> Result<(), Box<dyn Error>> {
    let settings = workspace_root().join("test_data/session.toml");

    let mut cmd = cargo_bin_cmd!("rtatten");
    cmd.args([
        "inspect",
        "--config",
        settings.to_str().expect("utf8 path"),
        "--highres-scan",
        "4",
        "--functional-scan",
        "7",
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let actual: Value = serde_json::from_slice(&output)?;

    assert_eq!(actual["config"]["session"]["Runs"], serde_json::json!([1, 2, 3]));
    assert_eq!(actual["config"]["session"]["useButtonBox"], Value::Bool(true));
    assert_eq!(actual["config"]["session"]["subjectNum"], 101);

    let reg = &actual["regConfig"];
    assert_eq!(reg["subjName"], "0501233_face");
    assert_eq!(reg["scanFolder"], "/data/20230501.0501233_face.0501233_face");
    assert_eq!(reg["runNum"], 1);
    assert_eq!(reg["dayNum"], 1);
    assert_eq!(reg["highresScan"], "4");
    assert_eq!(reg["functionalScan"], "7");
    assert_eq!(reg["fParam"], "0.6");
    assert_eq!(reg["dryrun"], "true");
    assert_eq!(reg["roi_name"], "wholebrain_mask");
    Ok(())
}

#[test]
fn inspect_rejects_malformed_settings() {
    let settings = workspace_root().join("test_data/broken.toml");
    let mut cmd = cargo_bin_cmd!("rtatten");
    cmd.args(["inspect", "--config", settings.to_str().expect("utf8 path")]);
    cmd.assert().failure();
}

#[test]
fn inspect_reports_missing_subject_name() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let settings = dir.path().join("nameless.toml");
    fs::write(
        &settings,
        concat!(
            "[experiment]\nexperimentName = \"face\"\n\n",
            "[session]\ndataDir = \"/data\"\nRuns = [1]\nScanNums = [2]\n",
        ),
    )?;

    let mut cmd = cargo_bin_cmd!("rtatten");
    cmd.args(["inspect", "--config", settings.to_str().expect("utf8 path")]);
    let output = cmd.assert().failure().get_output().stderr.clone();
    let stderr = String::from_utf8(output)?;
    assert!(stderr.contains("either subjectName or sessionNum"));
    Ok(())
}

fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .expect("crates dir")
        .parent()
        .expect("workspace root")
        .to_path_buf()
}
