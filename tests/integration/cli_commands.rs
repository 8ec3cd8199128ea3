//! Commands executed through the route table against a temporary workspace.

use std::path::Path;

use bulkgen::cli::{Cli, RunContext};
use bulkgen::error::RunError;
use bulkgen::types::JobKind;
use clap::Parser;
use tempfile::TempDir;

use crate::integration::test_utils::{with_xdg_env, write_job_file, write_workspace_config};

fn workspace(extra_config: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    write_workspace_config(dir.path(), extra_config);
    write_job_file(dir.path(), "blog", JobKind::Content, 5);
    write_job_file(dir.path(), "regions", JobKind::Terms, 3);
    dir
}

fn run(context: &RunContext, workspace: &Path, args: &[&str]) -> Result<String, RunError> {
    let ws = workspace.to_string_lossy().into_owned();
    let mut argv = vec!["bulkgen", "--workspace", ws.as_str()];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    context.execute(&cli.command)
}

#[test]
fn test_generate_then_status_and_log() {
    let ws = workspace("");
    with_xdg_env(&ws, || {
        let context = RunContext::new(ws.path().to_path_buf(), None).unwrap();

        let out = run(
            &context,
            ws.path(),
            &["generate", "content", "blog", "--number_of_posts", "3", "--step-size", "2"],
        )
        .unwrap();
        assert!(out.contains("3 of 3"), "unexpected output: {out}");

        let status = run(&context, ws.path(), &["status", "blog", "--format", "json"]).unwrap();
        let cursor: serde_json::Value = serde_json::from_str(&status).unwrap();
        assert_eq!(cursor["phase"], "done");
        assert_eq!(cursor["processed_count"], 3);

        let log = run(&context, ws.path(), &["log", "blog", "--format", "json"]).unwrap();
        let log: serde_json::Value = serde_json::from_str(&log).unwrap();
        let entries = log["entries"].as_array().unwrap();
        assert_eq!(
            entries.iter().filter(|e| e["kind"] == "item").count(),
            3,
            "a step of two items, then one"
        );

        let listing = run(&context, ws.path(), &["list", "content", "--format", "json"]).unwrap();
        let listing: serde_json::Value = serde_json::from_str(&listing).unwrap();
        assert_eq!(listing["jobs"][0]["id"], "blog");
        assert_eq!(listing["jobs"][0]["generated"], 3);
    });
}

#[test]
fn test_generate_several_jobs_in_order() {
    let ws = workspace("");
    write_job_file(ws.path(), "news", JobKind::Content, 2);
    with_xdg_env(&ws, || {
        let context = RunContext::new(ws.path().to_path_buf(), None).unwrap();
        let out = run(&context, ws.path(), &["generate", "content", "blog,news"]).unwrap();
        let lines: Vec<&str> = out.lines().filter(|l| l.starts_with("Job ")).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Job blog"));
        assert!(lines[1].starts_with("Job news"));
    });
}

#[test]
fn test_wrong_kind_and_unknown_job_are_rejected() {
    let ws = workspace("");
    with_xdg_env(&ws, || {
        let context = RunContext::new(ws.path().to_path_buf(), None).unwrap();
        let err = run(&context, ws.path(), &["generate", "terms", "blog"]).unwrap_err();
        assert!(matches!(err, RunError::InvalidJob(_)));
        let err = run(&context, ws.path(), &["generate", "terms", "missing"]).unwrap_err();
        assert!(matches!(err, RunError::JobNotFound(_)));
    });
}

#[test]
fn test_preview_writes_nothing() {
    let ws = workspace("");
    with_xdg_env(&ws, || {
        let context = RunContext::new(ws.path().to_path_buf(), None).unwrap();
        let out = run(&context, ws.path(), &["test", "terms", "regions"]).unwrap();
        assert!(out.contains("Test term #0"), "unexpected output: {out}");
        assert!(out.contains("regions row 0"));

        let status = run(&context, ws.path(), &["status", "regions"]).unwrap();
        assert_eq!(status, "Job regions has no recorded run.");
    });
}

#[test]
fn test_maintenance_commands_need_yes_without_terminal() {
    let ws = workspace("");
    with_xdg_env(&ws, || {
        let context = RunContext::new(ws.path().to_path_buf(), None).unwrap();
        run(&context, ws.path(), &["generate", "terms", "regions"]).unwrap();

        let dry = run(
            &context,
            ws.path(),
            &["delete-generated-terms", "regions", "--dry-run"],
        )
        .unwrap();
        assert!(dry.starts_with("Would delete 3 item(s)"), "unexpected output: {dry}");

        let deleted = run(
            &context,
            ws.path(),
            &["delete-generated-terms", "regions", "--limit", "2", "--yes"],
        )
        .unwrap();
        assert!(deleted.starts_with("Deleted 2 item(s)"), "unexpected output: {deleted}");

        let rest = run(
            &context,
            ws.path(),
            &["delete_generated_terms", "regions", "--limit", "-1", "--yes", "--format", "json"],
        )
        .unwrap();
        let report: serde_json::Value = serde_json::from_str(&rest).unwrap();
        assert_eq!(report["count_affected"], 1);
    });
}

#[test]
fn test_cancel_without_run_is_reported() {
    let ws = workspace("");
    with_xdg_env(&ws, || {
        let context = RunContext::new(ws.path().to_path_buf(), None).unwrap();
        let out = run(&context, ws.path(), &["cancel", "blog"]).unwrap();
        assert_eq!(out, "Job blog has no unfinished run.");
    });
}

#[test]
fn test_invoke_serves_wire_requests() {
    let ws = workspace("");
    with_xdg_env(&ws, || {
        let context = RunContext::new(ws.path().to_path_buf(), None).unwrap();
        let start = r#"{"action":"start","job_id":"regions","nonce":"run-w","step_size":2,"target_count":3,"stop_on_error":true}"#;
        let out = run(&context, ws.path(), &["invoke", "--request", start]).unwrap();
        let response: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(response["success"], true);

        let step = r#"{"action":"step","job_id":"regions","nonce":"run-w","current_offset":0,"resume_offset":0,"step_size":2,"target_count":3,"stop_on_error":true}"#;
        let out = run(&context, ws.path(), &["invoke", "--request", step]).unwrap();
        let response: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(response["success"], true);
        assert_eq!(response["data"].as_array().unwrap().len(), 2);

        let garbage = run(&context, ws.path(), &["invoke", "--request", "{not json"]).unwrap();
        let response: serde_json::Value = serde_json::from_str(&garbage).unwrap();
        assert_eq!(response["success"], false);
    });
}
