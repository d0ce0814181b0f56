use assert_cmd::cargo::cargo_bin_cmd;
use pdf_engine::fixtures::{encrypted_marker_pdf, SamplePdf};
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn sample(dir: &TempDir) -> PathBuf {
    let bytes = SamplePdf::new()
        .page("the quick foo fox")
        .page("second page")
        .page("third page")
        .title("Quarterly Report")
        .author("Finance")
        .build()
        .expect("fixture should build");
    write(dir.path(), "sample.pdf", &bytes)
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("fixture should be written");
    path
}

fn tempdir() -> TempDir {
    tempfile::tempdir().expect("temp dir should be created")
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("pageview-cli")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::diff(format!("{}\n", env!("CARGO_PKG_VERSION"))));
}

#[test]
fn info_emits_json_contract() {
    let temp = tempdir();
    let output = cargo_bin_cmd!("pageview-cli")
        .arg("info")
        .arg(sample(&temp))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    assert_eq!(value["page_count"], 3);
    assert_eq!(value["first_page_size_pt"]["width"], 200.0);
    assert_eq!(value["first_page_size_pt"]["height"], 300.0);
    assert_eq!(value["metadata"]["Title"], "Quarterly Report");
    assert_eq!(value["metadata"]["Author"], "Finance");
}

#[test]
fn info_fails_for_missing_file() {
    let temp = tempdir();
    cargo_bin_cmd!("pageview-cli")
        .arg("info")
        .arg(temp.path().join("missing.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn info_fails_for_invalid_pdf() {
    let temp = tempdir();
    let path = write(temp.path(), "invalid.pdf", b"definitely not a pdf");

    cargo_bin_cmd!("pageview-cli")
        .arg("info")
        .arg(path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open"));
}

#[test]
fn non_pdf_files_are_rejected() {
    let temp = tempdir();
    let path = write(temp.path(), "notes.txt", b"hello");

    cargo_bin_cmd!("pageview-cli")
        .arg("info")
        .arg(path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Please upload a PDF file."));
}

#[test]
fn protected_pdf_prompts_and_fails_when_cancelled() {
    let temp = tempdir();
    let path = write(temp.path(), "locked.pdf", encrypted_marker_pdf());

    cargo_bin_cmd!("pageview-cli")
        .arg("info")
        .arg(path)
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Password for locked.pdf"))
        .stderr(predicate::str::contains("password entry cancelled"));
}

#[test]
fn owner_only_pdf_opens_without_prompting() {
    let temp = tempdir();
    let bytes = SamplePdf::new()
        .page("readable")
        .title("Owner Only")
        .protect("", "owner")
        .build()
        .expect("fixture should build");
    let path = write(temp.path(), "owner.pdf", &bytes);

    let output = cargo_bin_cmd!("pageview-cli")
        .arg("info")
        .arg(path)
        .assert()
        .success()
        .stderr(predicate::str::contains("Password for").not())
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    assert_eq!(value["metadata"]["Title"], "Owner Only");
}

#[test]
fn protected_pdf_unlocks_from_prompt_or_flag() {
    let temp = tempdir();
    let bytes = SamplePdf::new()
        .page("classified")
        .title("Locked")
        .protect("secret", "owner")
        .build()
        .expect("fixture should build");
    let path = write(temp.path(), "locked.pdf", &bytes);

    cargo_bin_cmd!("pageview-cli")
        .arg("info")
        .arg(&path)
        .write_stdin("guess\nsecret\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("Incorrect password."))
        .stdout(predicate::str::contains("\"Title\": \"Locked\""));

    cargo_bin_cmd!("pageview-cli")
        .args(["search", "--password", "secret"])
        .arg(&path)
        .arg("classified")
        .assert()
        .success()
        .stdout(predicate::str::contains("found \"classified\" on page 1"));
}

#[test]
fn render_writes_png_with_zoom_and_rotation() {
    let temp = tempdir();
    let output_path = temp.path().join("out").join("page.png");

    cargo_bin_cmd!("pageview-cli")
        .arg("render")
        .arg(sample(&temp))
        .args(["--page", "2", "--zoom", "1", "--rotate", "90", "--output"])
        .arg(&output_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("page.png"));

    let image = image::open(&output_path).expect("render should be a readable image");
    assert_eq!((image.width(), image.height()), (300, 200));
}

#[test]
fn render_uses_configured_initial_zoom() {
    let temp = tempdir();
    let config = write(temp.path(), "viewer.json", br#"{ "initial_zoom": 2.0 }"#);
    let output_path = temp.path().join("zoomed.png");

    cargo_bin_cmd!("pageview-cli")
        .arg("--config")
        .arg(config)
        .arg("render")
        .arg(sample(&temp))
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success();

    let image = image::open(&output_path).expect("render should be a readable image");
    assert_eq!((image.width(), image.height()), (400, 600));
}

#[test]
fn render_rejects_out_of_range_page_and_bad_rotation() {
    let temp = tempdir();
    let pdf = sample(&temp);

    cargo_bin_cmd!("pageview-cli")
        .arg("render")
        .arg(&pdf)
        .args(["--page", "7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("page 7 is out of range (1-3)"));

    cargo_bin_cmd!("pageview-cli")
        .arg("render")
        .arg(&pdf)
        .args(["--rotate", "45"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--rotate must be 0, 90, 180 or 270"));
}

#[test]
fn thumbs_writes_one_png_per_page() {
    let temp = tempdir();
    let out_dir = temp.path().join("thumbs");

    cargo_bin_cmd!("pageview-cli")
        .arg("thumbs")
        .arg(sample(&temp))
        .arg("--output-dir")
        .arg(&out_dir)
        .assert()
        .success();

    for page in 1..=3 {
        let path = out_dir.join(format!("sample-thumb-{page}.png"));
        let image = image::open(&path).expect("thumbnail should be readable image");
        assert_eq!((image.width(), image.height()), (120, 160));
    }
}

#[test]
fn search_reports_matches_on_the_requested_page() {
    let temp = tempdir();
    let pdf = sample(&temp);

    cargo_bin_cmd!("pageview-cli")
        .arg("search")
        .arg(&pdf)
        .arg("FOO")
        .assert()
        .success()
        .stdout(predicate::str::contains("found \"FOO\" on page 1"));

    cargo_bin_cmd!("pageview-cli")
        .arg("search")
        .arg(&pdf)
        .arg("foo")
        .args(["--page", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"foo\" not found on page 2"));

    cargo_bin_cmd!("pageview-cli")
        .arg("search")
        .arg(&pdf)
        .args(["^third", "--page", "3", "--regex"])
        .assert()
        .success()
        .stdout(predicate::str::contains("found \"^third\" on page 3"));

    cargo_bin_cmd!("pageview-cli")
        .arg("search")
        .arg(&pdf)
        .arg(" ")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Please enter a search term."));
}

#[test]
fn view_session_runs_scripted_commands() {
    let temp = tempdir();

    cargo_bin_cmd!("pageview-cli")
        .arg("view")
        .arg(sample(&temp))
        .write_stdin("next\nsearch second\nbookmark\nbookmarks\nzoom 9\nprev\nprev\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("page 1 / 3 | zoom 150% | rotation 0 | 300x450"))
        .stdout(predicate::str::contains("\"second\" found on page 2"))
        .stdout(predicate::str::contains("1: page 2"))
        .stdout(predicate::str::contains("page 2 / 3 | zoom 400% | rotation 0 | 800x1200"))
        .stdout(predicate::str::contains("already on the first page"));
}
