use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn scenario_list_names_presets() {
    let mut cmd = Command::cargo_bin("bdt").unwrap();
    cmd.args(["scenario", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pure-arbitrage"))
        .stdout(predicate::str::contains("two-month-peaks"));
}

#[test]
fn materialize_then_solve_monthly() {
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = Command::cargo_bin("bdt").unwrap();
    cmd.args([
        "scenario",
        "materialize",
        "--preset",
        "pure-arbitrage",
        "--out-dir",
    ])
    .arg(dir.path())
    .assert()
    .success();

    let spec_path = dir.path().join("pure-arbitrage.toml");
    assert!(spec_path.exists());
    assert!(dir.path().join("pure-arbitrage.csv").exists());

    let out_dir = dir.path().join("run");
    let mut cmd = Command::cargo_bin("bdt").unwrap();
    cmd.args(["monthly", "--scenario"])
        .arg(&spec_path)
        .arg("--out-dir")
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("total cost"));

    assert!(out_dir.join("trajectory.csv").exists());
    assert!(out_dir.join("summary.json").exists());
}

#[test]
fn unknown_preset_fails_with_hint() {
    let mut cmd = Command::cargo_bin("bdt").unwrap();
    cmd.args(["scenario", "materialize", "--preset", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown preset"));
}
