#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Output};

pub fn partlock(data_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_partlock"))
        .arg("--data-dir")
        .arg(data_dir)
        .args(args)
        .env_remove("PARTLOCK_DATA_DIR")
        .env_remove("PARTLOCK_LOG")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run partlock")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

pub fn read_json(path: &Path) -> serde_json::Value {
    let content = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&content).unwrap()
}
