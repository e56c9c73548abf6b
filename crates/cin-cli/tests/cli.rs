use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const FRONT: &str = "ROYAUME DU MAROC\nCARTE NATIONALE D'IDENTITE\nMOHAMED\nALAMI\nNé le 01.01.1990\nà CASABLANCA\nAB123456";

const BACK: &str = "Fils de AHMED\net de FATIMA\nAdresse: 12 RUE IBN SINA RABAT\nIDMARAB1234567<AB123456<<<<<<";

/// `cin` with its config directory isolated in `home`.
fn cin(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("cin").unwrap();
    cmd.env("XDG_CONFIG_HOME", home).env("HOME", home);
    cmd
}

#[test]
fn process_text_input_prints_record_json() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("front.txt");
    fs::write(&input, FRONT).unwrap();

    cin(dir.path())
        .args(["process", "--text"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""side":"FRONT""#))
        .stdout(predicate::str::contains(r#""cin_number":"AB123456""#))
        .stdout(predicate::str::contains(r#""father_name_fr":null"#));
}

#[test]
fn process_detects_text_by_extension_and_writes_csv() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("back.txt");
    let output = dir.path().join("back.csv");
    fs::write(&input, BACK).unwrap();

    cin(dir.path())
        .args(["process", "--format", "csv", "--output"])
        .arg(&output)
        .arg(&input)
        .assert()
        .success();

    let csv = fs::read_to_string(&output).unwrap();
    assert!(csv.starts_with("side,cin_number,"));
    assert!(csv.contains("BACK,AB123456,"));
    assert!(csv.contains("AHMED"));
}

#[test]
fn process_saved_ocr_result() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("ocr.json");
    fs::write(&input, serde_json::json!({ "text": FRONT }).to_string()).unwrap();

    cin(dir.path())
        .args(["process", "--ocr-json", "--show-confidence"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("ALAMI"))
        .stdout(predicate::str::contains("Mean field confidence"));
}

#[test]
fn process_empty_text_fails() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("empty.txt");
    fs::write(&input, "  \n\t ").unwrap();

    cin(dir.path())
        .args(["process"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("image unreadable"));
}

#[test]
fn process_missing_input_fails() {
    let dir = TempDir::new().unwrap();

    cin(dir.path())
        .args(["process", "does-not-exist.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn batch_writes_outputs_and_summary() {
    let dir = TempDir::new().unwrap();
    let cards = dir.path().join("cards");
    let out = dir.path().join("out");
    fs::create_dir_all(&cards).unwrap();
    fs::write(cards.join("front.txt"), FRONT).unwrap();
    fs::write(cards.join("back.txt"), BACK).unwrap();
    fs::write(cards.join("blank.txt"), "   ").unwrap();

    let pattern = format!("{}/*.txt", cards.display());
    cin(dir.path())
        .args(["batch", &pattern, "--summary", "--continue-on-error", "--output-dir"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 3 files"))
        .stdout(predicate::str::contains("2 successful"));

    assert!(out.join("front.json").exists());
    assert!(out.join("back.json").exists());
    assert!(!out.join("blank.json").exists());

    let summary = fs::read_to_string(out.join("summary.csv")).unwrap();
    assert_eq!(summary.lines().count(), 4);
    assert!(summary.contains("blank.txt,error,"));
}

#[test]
fn batch_stops_on_first_error_by_default() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("blank.txt"), "").unwrap();

    let pattern = format!("{}/*.txt", dir.path().display());
    cin(dir.path())
        .args(["batch", &pattern])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Processing failed"));
}

#[test]
fn config_init_get_set() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("cin.json");
    let config_arg = config.to_str().unwrap();

    cin(dir.path())
        .args(["--config", config_arg, "config", "init"])
        .assert()
        .success();
    assert!(config.exists());

    cin(dir.path())
        .args(["--config", config_arg, "config", "get", "ocr.engine"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"auto\""));

    cin(dir.path())
        .args(["--config", config_arg, "config", "set", "extraction.min_field_confidence", "0.99"])
        .assert()
        .success();

    cin(dir.path())
        .args(["--config", config_arg, "config", "get", "extraction.min_field_confidence"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0.99"));

    cin(dir.path())
        .args(["--config", config_arg, "config", "set", "ocr.engine", "paddle"])
        .assert()
        .failure();
}

#[test]
fn config_applies_to_processing() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("cin.json");
    fs::write(&config, r#"{"extraction": {"min_field_confidence": 0.99}}"#).unwrap();
    let input = dir.path().join("front.txt");
    fs::write(&input, FRONT).unwrap();

    cin(dir.path())
        .args(["--config", config.to_str().unwrap(), "process"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""cin_number":null"#));
}
