use std::io::{BufRead, BufReader};
use std::process::{Command, Output, Stdio};

use timerlat_load::prelude::*;

fn timerlat_load(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_timerlat_load"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn allowed_cpu() -> String {
    get_affinity(0).unwrap().cpus()[0].to_string()
}

fn fake_tracefs(cpu: &str) -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    let cpu_dir = timerlat_cpu_dir(root.path(), cpu.parse().unwrap());
    std::fs::create_dir_all(&cpu_dir).unwrap();
    std::fs::write(cpu_dir.join("timerlat_fd"), b"").unwrap();
    root
}

#[test]
fn missing_timerlat_fd_exits_1() {
    let root = tempfile::tempdir().unwrap();
    let cpu = allowed_cpu();
    let out = timerlat_load(&[&cpu, "--tracing-dir", root.path().to_str().unwrap()]);

    assert_eq!(out.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Error opening timerlat fd, did you run timerlat -U?"), "{stdout}");
}

#[test]
fn offline_cpu_exits_1() {
    let out = timerlat_load(&["100000"]);

    assert_eq!(out.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with("Error setting affinity: "), "{stdout}");
}

#[test]
fn bounded_run_leaves_cleanly() {
    let cpu = allowed_cpu();
    let root = fake_tracefs(&cpu);
    let out = timerlat_load(&[
        &cpu,
        "--tracing-dir", root.path().to_str().unwrap(),
        "--size", "1",
        "--max-time", "1",
    ]);

    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Leaving"));
}

#[test]
fn empty_data_source_is_an_io_error() {
    let cpu = allowed_cpu();
    let root = fake_tracefs(&cpu);
    let data = root.path().join("empty");
    std::fs::write(&data, b"").unwrap();

    let out = timerlat_load(&[
        &cpu,
        "--tracing-dir", root.path().to_str().unwrap(),
        "--data-source", data.to_str().unwrap(),
    ]);

    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stdout).starts_with("I/O error occurred: "));
}

#[test]
fn zero_size_is_rejected_by_the_parser() {
    let out = timerlat_load(&["0", "--size", "0"]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn negative_cpu_is_an_affinity_error() {
    let out = timerlat_load(&["-1"]);

    assert_eq!(out.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with("Error setting affinity: "), "{stdout}");
}

#[test]
fn negative_priority_is_a_priority_error() {
    let cpu = allowed_cpu();
    let root = fake_tracefs(&cpu);
    let out = timerlat_load(&[&cpu, "-p", "-5", "--tracing-dir", root.path().to_str().unwrap()]);

    assert_eq!(out.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with("Error setting priority: "), "{stdout}");
}

#[test]
fn interrupt_leaves_cleanly() {
    let cpu = allowed_cpu();
    let root = fake_tracefs(&cpu);
    let mut child = Command::new(env!("CARGO_BIN_EXE_timerlat_load"))
        .args([cpu.as_str(), "--tracing-dir", root.path().to_str().unwrap(), "--size", "1"])
        .env("RUST_LOG", "info")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    // the handler is installed once the loop is announced
    let mut stderr = BufReader::new(child.stderr.take().unwrap()).lines();
    let started = stderr.by_ref()
        .map(|line| line.unwrap())
        .any(|line| line.contains("Running on CPU"));
    assert!(started);

    assert_eq!(unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGINT) }, 0);

    // keep the pipe open until the final summary is logged
    stderr.for_each(drop);

    let out = child.wait_with_output().unwrap();
    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Leaving"));
}
