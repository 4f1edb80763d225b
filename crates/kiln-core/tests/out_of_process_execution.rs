//! Integration tests for the out-of-process strategy.
//!
//! These stage real cargo projects and build them with `cargo build`.
//! Programs without external crates build offline; the ones that pull
//! crates from crates.io are ignored by default.

use std::time::{Duration, Instant};

use tempfile::TempDir;

use kiln_core::{ExecutorConfig, InputRow, Strategy, TaskRequest, TaskResponse, TaskScheduler};

fn scheduler(work_dir: &TempDir, timeout: u64) -> TaskScheduler {
    let config = ExecutorConfig {
        strategy: Strategy::OutOfProcess,
        work_dir: Some(work_dir.path().to_path_buf()),
        code_timeout_seconds: timeout,
        ..Default::default()
    };
    TaskScheduler::new(config).expect("cargo must be available")
}

#[test]
fn test_fixed_string_program() {
    let temp = TempDir::new().unwrap();
    let scheduler = scheduler(&temp, 300);

    let response = scheduler.run_task(TaskRequest::new(
        "fn main() {\n    println!(\"hello from cargo\");\n}\n",
        "main",
    ));

    assert_eq!(response, TaskResponse::success("hello from cargo"));
}

#[test]
fn test_non_main_entry_reads_rows_from_stdin() {
    let temp = TempDir::new().unwrap();
    let scheduler = scheduler(&temp, 300);

    let source = r#"
use std::io::Read;

fn report() {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input).unwrap();
    println!("rows: {}", input.matches("\"name\"").count());
}
"#;
    let rows: Vec<InputRow> = ["a", "b"]
        .iter()
        .map(|name| InputRow::from([("name".to_string(), name.to_string())]))
        .collect();

    let response = scheduler.run_task(TaskRequest::new(source, "report").with_input_rows(rows));

    assert_eq!(response, TaskResponse::success("rows: 2"));
}

#[test]
fn test_build_failure_is_failure_with_cargo_output() {
    let temp = TempDir::new().unwrap();
    let scheduler = scheduler(&temp, 300);

    let response = scheduler.run_task(TaskRequest::new("fn main() { let x: u32 = \"no\"; }", "main"));

    match response {
        TaskResponse::Failure { stdout, stderr } => {
            assert!(stdout.is_empty());
            assert!(stderr.contains("mismatched types"), "{}", stderr);
        }
        other => panic!("Expected failure, got {:?}", other),
    }
}

#[test]
fn test_runtime_panic_is_failure() {
    let temp = TempDir::new().unwrap();
    let scheduler = scheduler(&temp, 300);

    let source = "fn main() {\n    println!(\"partial\");\n    panic!(\"row 3 is malformed\");\n}\n";
    let response = scheduler.run_task(TaskRequest::new(source, "main"));

    match response {
        TaskResponse::Failure { stdout, stderr } => {
            assert_eq!(stdout, "partial\n");
            assert!(stderr.contains("row 3 is malformed"), "{}", stderr);
        }
        other => panic!("Expected failure, got {:?}", other),
    }
}

#[test]
fn test_returned_error_is_failure() {
    let temp = TempDir::new().unwrap();
    let scheduler = scheduler(&temp, 300);

    let source = "fn run() -> Result<(), String> {\n    Err(\"bad input\".into())\n}\n";
    let response = scheduler.run_task(TaskRequest::new(source, "run"));

    let stderr = response.std_err().expect("returned error is a failure");
    assert!(stderr.contains("Error: \"bad input\""), "{}", stderr);
}

#[test]
fn test_endless_program_times_out_and_is_killed() {
    let temp = TempDir::new().unwrap();
    let scheduler = scheduler(&temp, 3);

    let source = "fn main() {\n    loop {\n        std::thread::sleep(std::time::Duration::from_millis(10));\n    }\n}\n";

    let start = Instant::now();
    let response = scheduler.run_task(TaskRequest::new(source, "main"));

    assert!(response.is_timeout(), "Expected timeout, got {:?}", response);
    assert!(start.elapsed() < Duration::from_secs(6), "Took {:?}", start.elapsed());
}

#[test]
#[ignore = "Requires network access to crates.io"]
fn test_sum_with_serde_json() {
    let temp = TempDir::new().unwrap();
    let scheduler = scheduler(&temp, 600);

    let source = r#"
use std::collections::BTreeMap;
use serde_json::Value;

fn main() {
    let rows: Vec<BTreeMap<String, String>> = serde_json::from_reader(std::io::stdin()).unwrap();
    let total: f64 = rows.iter().map(|r| r["amount"].parse::<f64>().unwrap()).sum();
    let out: Value = serde_json::json!({ "total": total });
    println!("{}", out);
}
"#;
    let rows: Vec<InputRow> = ["1", "2", "3.5"]
        .iter()
        .map(|amount| InputRow::from([("amount".to_string(), amount.to_string())]))
        .collect();

    let response = scheduler.run_task(TaskRequest::new(source, "main").with_input_rows(rows));

    assert_eq!(response, TaskResponse::success(r#"{"total":6.5}"#));
}
