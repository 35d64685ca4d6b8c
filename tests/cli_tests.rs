use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

fn run(dir: &Path, args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_scanip"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("binary starts");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).to_string()
}

#[test]
fn empty_input_exits_without_touching_results() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(dir.path(), &[], "\n");
    assert!(out.status.success());
    assert!(stdout(&out).contains("No input provided. Exiting."));
    assert!(!dir.path().join("scanip.results.txt").exists());
}

#[test]
fn unparseable_ranges_exit_early() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(dir.path(), &["--targets", "not-an-ip"], "");
    assert!(out.status.success());
    assert!(stdout(&out).contains("No valid IPs found. Exiting."));
    assert!(!dir.path().join("scanip.results.txt").exists());
}

#[test]
fn help_prints_usage_without_scanning() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(dir.path(), &["-h"], "");
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("Usage"));
    assert!(text.contains("--verbose"));
    assert!(!text.contains("Enter CIDR"));
}

#[test]
fn prompted_scan_of_closed_port_completes() {
    let dir = tempfile::tempdir().unwrap();
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let summary = dir.path().join("summary.json");
    let out = run(
        dir.path(),
        &["--summary", summary.to_str().unwrap()],
        &format!("127.0.0.1\n2\n{port}\n"),
    );

    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("Enter number of threads (default 500): "));
    assert!(text.trim_end().ends_with("Scan completed."));
    assert!(!dir.path().join("scanip.results.txt").exists());
    let log = String::from_utf8_lossy(&out.stderr);
    assert!(log.contains("ranges") && log.contains("127.0.0.1"), "stderr: {log}");

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary).unwrap()).unwrap();
    assert_eq!(json["total"], 1);
    assert_eq!(json["scanned"], 1);
    assert_eq!(json["responded"], 0);
    assert_eq!(json["cancelled"], false);
}
