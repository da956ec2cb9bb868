use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn quickbook() -> Command {
    Command::new(env!("CARGO_BIN_EXE_quickbook"))
}

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn fixture_suite_passes() {
    let output = quickbook()
        .args(["test", "--no-color"])
        .arg(fixtures())
        .output()
        .expect("failed to run quickbook");
    assert!(output.status.success(), "fixtures failed:\n{}", stderr(&output));
    assert!(!stderr(&output).contains("FAIL"));
}

#[test]
fn fixture_category_filter() {
    let output = quickbook()
        .args(["test", "--no-color", "--category", "templates"])
        .arg(fixtures())
        .output()
        .expect("failed to run quickbook");
    let log = stderr(&output);
    assert!(output.status.success(), "{log}");
    assert!(log.contains("templates"));
    assert!(!log.contains("phrase"));
}

#[test]
fn list_categories() {
    let output = quickbook()
        .args(["test", "--list-categories"])
        .arg(fixtures())
        .output()
        .expect("failed to run quickbook");
    let log = stderr(&output);
    assert!(log.contains("blocks"));
    assert!(log.contains("docinfo"));
}

#[test]
fn build_writes_pretty_printed_xml() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("guide.qbk");
    std::fs::write(
        &input,
        "[article Guide\n    [quickbook 1.5]\n]\n\n[section Intro]\nHello *world*.\n[endsect]\n",
    )
    .expect("write input");

    let output = quickbook()
        .args(["--debug", "--no-color"])
        .arg(&input)
        .output()
        .expect("failed to run quickbook");
    assert!(output.status.success(), "{}", stderr(&output));

    let xml_path = dir.path().join("guide.xml");
    assert!(stdout(&output).contains("Generating Output File:"));
    let xml = std::fs::read_to_string(&xml_path).expect("output written");
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(xml.contains("<article id=\"guide\""));
    assert!(xml.contains("\n  <section id=\"guide.intro\">"));
    assert!(xml.contains("Hello <emphasis role=\"bold\">world</emphasis>."));
}

#[test]
fn build_with_explicit_output_and_no_pretty_print() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("in.qbk");
    let target = dir.path().join("custom.xml");
    std::fs::write(&input, "[note Careful.]\n").expect("write input");

    let output = quickbook()
        .arg("build")
        .arg(&input)
        .arg("--output-file")
        .arg(&target)
        .arg("--no-pretty-print")
        .output()
        .expect("failed to run quickbook");
    assert!(output.status.success(), "{}", stderr(&output));
    let xml = std::fs::read_to_string(&target).expect("output written");
    assert_eq!(xml, "<note><para>Careful.</para></note>");
}

#[test]
fn build_reports_error_count() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("broken.qbk");
    std::fs::write(&input, "Text.\n\n[endsect]\n").expect("write input");

    let output = quickbook()
        .args(["--no-color", "--ms-errors"])
        .arg(&input)
        .output()
        .expect("failed to run quickbook");
    assert!(!output.status.success());
    let log = stderr(&output);
    assert!(log.contains("broken.qbk(3): error: mismatched [endsect]"), "{log}");
    assert!(log.contains("Error count: 1."), "{log}");
}

#[test]
fn include_path_is_searched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shared = dir.path().join("shared");
    std::fs::create_dir(&shared).expect("create dir");
    std::fs::write(shared.join("common.qbk"), "Shared paragraph.\n").expect("write include");
    let input = dir.path().join("main.qbk");
    std::fs::write(&input, "[include common.qbk]\n").expect("write input");

    let output = quickbook()
        .arg(&input)
        .arg("-I")
        .arg(&shared)
        .arg("--no-pretty-print")
        .output()
        .expect("failed to run quickbook");
    assert!(output.status.success(), "{}", stderr(&output));
    let xml = std::fs::read_to_string(dir.path().join("main.xml")).expect("output written");
    assert_eq!(xml, "<para>Shared paragraph.</para>");
}

#[test]
fn missing_input_fails() {
    let output = quickbook()
        .arg("/nonexistent/input.qbk")
        .output()
        .expect("failed to run quickbook");
    assert!(!output.status.success());
    assert!(stderr(&output).contains("cannot read"));
}
