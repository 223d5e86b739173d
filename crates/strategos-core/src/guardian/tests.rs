use super::{GuardianConfig, GuardianEngine, GuardianState};
use crate::error::Error;
use crate::events::{EngineEvent, EventBus};

use std::sync::Arc;
use std::time::Duration;
use strategos_rpc::{IssueCategory, IssueSeverity, MockTransport, ScriptedReply, ValidationIssue};
use tempfile::TempDir;

fn engine_with(config: GuardianConfig) -> (Arc<GuardianEngine>, Arc<MockTransport>, EventBus) {
    let mock = Arc::new(MockTransport::new());
    let events = EventBus::new(64);
    let engine = GuardianEngine::new(config, mock.clone(), events.clone())
        .expect("default globs compile");
    (Arc::new(engine), mock, events)
}

fn quiet_config() -> GuardianConfig {
    GuardianConfig {
        realtime: false,
        ..GuardianConfig::default()
    }
}

fn issue(severity: IssueSeverity, title: &str) -> ValidationIssue {
    ValidationIssue::new("style/check", severity, IssueCategory::Quality, title)
}

fn issues_reply(issues: &[ValidationIssue]) -> ScriptedReply {
    ScriptedReply::Ok(serde_json::json!({ "issues": issues }))
}

/// Two eligible files, one ignored extension, one pruned directory.
fn project_tree() -> TempDir {
    let dir = tempfile::tempdir().expect("create temp dir");
    std::fs::write(dir.path().join("main.rs"), "fn main() {}").expect("write file");
    std::fs::write(dir.path().join("lib.rs"), "pub fn lib() {}").expect("write file");
    std::fs::write(dir.path().join("notes.md"), "# notes").expect("write file");
    std::fs::create_dir_all(dir.path().join("target/debug")).expect("create dir");
    std::fs::write(dir.path().join("target/debug/out.rs"), "fn gen() {}").expect("write file");
    dir
}

#[tokio::test]
async fn test_start_and_stop_lifecycle() {
    let dir = project_tree();
    let (engine, _mock, events) = engine_with(quiet_config());
    let mut rx = events.subscribe();

    engine.start(dir.path()).await.unwrap();
    assert_eq!(engine.state(), GuardianState::Watching);
    assert_eq!(engine.status().watched_root.as_deref(), Some(dir.path()));

    match rx.try_recv().unwrap() {
        EngineEvent::GuardianStarted { watched_files } => assert_eq!(watched_files, 2),
        other => panic!("unexpected event: {other:?}"),
    }

    engine.stop().await;
    assert_eq!(engine.state(), GuardianState::Stopped);
    assert!(engine.status().watched_root.is_none());
    assert!(matches!(rx.try_recv(), Ok(EngineEvent::GuardianStopped)));
}

#[tokio::test]
async fn test_double_start_rejected() {
    let dir = project_tree();
    let (engine, _mock, _events) = engine_with(quiet_config());

    engine.start(dir.path()).await.unwrap();
    let err = engine.start(dir.path()).await.unwrap_err();
    assert!(matches!(err, Error::Guardian(_)));
    assert!(err.to_string().contains("already running"));

    engine.stop().await;
}

#[tokio::test]
async fn test_stop_without_start_is_noop() {
    let (engine, _mock, events) = engine_with(quiet_config());
    let mut rx = events.subscribe();

    engine.stop().await;
    assert_eq!(engine.state(), GuardianState::Stopped);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_start_on_missing_root_fails_and_resets_state() {
    // Default config keeps realtime watching on, so a missing root fails
    // when the watcher is attached.
    let (engine, _mock, _events) = engine_with(GuardianConfig::default());

    let missing = std::path::Path::new("/nonexistent/strategos-guardian-root");
    assert!(engine.start(missing).await.is_err());
    assert_eq!(engine.state(), GuardianState::Stopped);
}

#[tokio::test]
async fn test_realtime_start_attaches_watcher() {
    let dir = project_tree();
    let (engine, _mock, _events) = engine_with(GuardianConfig::default());

    match engine.start(dir.path()).await {
        Ok(()) => {
            assert_eq!(engine.state(), GuardianState::Watching);
            engine.stop().await;
            assert_eq!(engine.state(), GuardianState::Stopped);
        }
        // Platform without a usable watcher backend
        Err(err) => assert!(matches!(err, Error::Watch(_))),
    }
}

#[tokio::test]
async fn test_validate_file_records_issues_and_publishes() {
    let (engine, mock, events) = engine_with(quiet_config());
    let mut rx = events.subscribe();
    mock.push(issues_reply(&[
        issue(IssueSeverity::Warning, "long function"),
        issue(IssueSeverity::Warning, "missing docs"),
    ]));

    let issues = engine.validate_file("src/lib.rs").await.unwrap();
    assert_eq!(issues.len(), 2);

    let status = engine.status();
    assert_eq!(status.validated_files, 1);
    assert_eq!(status.recent_issues.len(), 2);

    match rx.try_recv().unwrap() {
        EngineEvent::ValidationIssuesFound {
            file,
            count,
            blocking,
        } => {
            assert_eq!(file, "src/lib.rs");
            assert_eq!(count, 2);
            assert!(!blocking);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_notifications_disabled_suppresses_event() {
    let config = GuardianConfig {
        notifications: false,
        ..quiet_config()
    };
    let (engine, mock, events) = engine_with(config);
    let mut rx = events.subscribe();
    mock.push(issues_reply(&[issue(IssueSeverity::Error, "unused import")]));

    engine.validate_file("src/lib.rs").await.unwrap();
    assert!(rx.try_recv().is_err());
    assert_eq!(engine.status().recent_issues.len(), 1);
}

#[tokio::test]
async fn test_clean_file_publishes_nothing() {
    let (engine, _mock, events) = engine_with(quiet_config());
    let mut rx = events.subscribe();

    let issues = engine.validate_file("src/lib.rs").await.unwrap();
    assert!(issues.is_empty());
    assert!(rx.try_recv().is_err());
    assert_eq!(engine.status().validated_files, 1);
}

#[tokio::test]
async fn test_commit_blocked_on_critical_issue() {
    let (engine, mock, _events) = engine_with(quiet_config());
    mock.push(issues_reply(&[issue(
        IssueSeverity::Critical,
        "hardcoded credentials",
    )]));

    let check = engine
        .validate_before_commit(&["src/auth.rs".to_string()])
        .await
        .unwrap();
    assert!(!check.passed);
    assert_eq!(check.issues.len(), 1);
    let reason = check.blocking_reason.unwrap();
    assert!(reason.contains("critical"));
}

#[tokio::test]
async fn test_commit_passes_under_thresholds() {
    let (engine, mock, _events) = engine_with(quiet_config());
    mock.push(issues_reply(&[
        issue(IssueSeverity::Error, "unused import"),
        issue(IssueSeverity::Error, "shadowed binding"),
    ]));

    let check = engine
        .validate_before_commit(&["src/lib.rs".to_string()])
        .await
        .unwrap();
    assert!(check.passed);
    assert!(check.blocking_reason.is_none());
    assert_eq!(check.issues.len(), 2);
}

#[tokio::test]
async fn test_deploy_blocked_when_errors_exceed_threshold() {
    let (engine, mock, _events) = engine_with(quiet_config());
    let errors: Vec<ValidationIssue> = (0..6)
        .map(|i| issue(IssueSeverity::Error, &format!("error-{i}")))
        .collect();
    mock.push(ScriptedReply::Ok(serde_json::json!({
        "issues": errors,
        "files_checked": 4,
    })));

    let check = engine.validate_before_deploy("production").await.unwrap();
    assert!(!check.approved);
    assert_eq!(check.report.files_checked, 4);
    assert!(check.blocking_reason.unwrap().contains("error"));
}

#[tokio::test]
async fn test_auto_fix_applies_fixes_and_counts() {
    let config = GuardianConfig {
        auto_fix: true,
        ..quiet_config()
    };
    let (engine, mock, events) = engine_with(config);
    let mut rx = events.subscribe();

    let fixable = issue(IssueSeverity::Warning, "trailing whitespace").auto_fixable();
    mock.push(issues_reply(&[fixable.clone()]));
    mock.push(ScriptedReply::Ok(serde_json::json!({
        "fix": { "fixed": [fixable.id], "failed": [] },
    })));

    engine.validate_file("src/lib.rs").await.unwrap();
    assert_eq!(mock.call_count(), 2);

    let status = engine.status();
    assert_eq!(status.auto_fixed, 1);
    assert!(status.recent_issues[0].resolved);

    assert!(matches!(
        rx.try_recv(),
        Ok(EngineEvent::ValidationIssuesFound { .. })
    ));
    match rx.try_recv().unwrap() {
        EngineEvent::AutoFixApplied { file, fixed } => {
            assert_eq!(file, "src/lib.rs");
            assert_eq!(fixed, 1);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_auto_fix_disabled_makes_no_fix_call() {
    let (engine, mock, _events) = engine_with(quiet_config());
    mock.push(issues_reply(&[
        issue(IssueSeverity::Warning, "trailing whitespace").auto_fixable()
    ]));

    engine.validate_file("src/lib.rs").await.unwrap();
    assert_eq!(mock.call_count(), 1);
    assert_eq!(engine.status().auto_fixed, 0);
}

#[tokio::test]
async fn test_auto_fix_failure_does_not_fail_validation() {
    let config = GuardianConfig {
        auto_fix: true,
        ..quiet_config()
    };
    let (engine, mock, _events) = engine_with(config);
    mock.push(issues_reply(&[
        issue(IssueSeverity::Warning, "trailing whitespace").auto_fixable()
    ]));
    mock.push(ScriptedReply::NetworkError("fixer offline".to_string()));

    let issues = engine.validate_file("src/lib.rs").await.unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(engine.status().auto_fixed, 0);
}

#[tokio::test]
async fn test_recent_issues_ring_buffer_caps() {
    let (engine, mock, _events) = engine_with(quiet_config());
    let many: Vec<ValidationIssue> = (0..60)
        .map(|i| issue(IssueSeverity::Info, &format!("finding-{i}")))
        .collect();
    mock.push(issues_reply(&many));

    engine.validate_file("src/big.rs").await.unwrap();

    let recent = engine.status().recent_issues;
    assert_eq!(recent.len(), 50);
    assert_eq!(recent[0].title, "finding-10");
    assert_eq!(recent[49].title, "finding-59");
}

#[tokio::test]
async fn test_enqueue_respects_filter() {
    let (engine, _mock, _events) = engine_with(quiet_config());

    engine.enqueue("src/app.rs");
    engine.enqueue("target/debug/gen.rs");
    engine.enqueue("notes.md");
    engine.enqueue("src/app.rs");

    assert_eq!(engine.status().pending_files, 1);
}

#[tokio::test]
async fn test_update_config_applies_at_next_read() {
    let (engine, mock, _events) = engine_with(quiet_config());

    // two errors pass the default threshold of five
    mock.push(issues_reply(&[
        issue(IssueSeverity::Error, "unused import"),
        issue(IssueSeverity::Error, "shadowed binding"),
    ]));
    let check = engine
        .validate_before_commit(&["src/lib.rs".to_string()])
        .await
        .unwrap();
    assert!(check.passed);

    // tighten the error threshold and widen the globs while running
    let mut config = quiet_config();
    config.thresholds.error = 0;
    config.include.push("**/*.md".to_string());
    engine.update_config(config).unwrap();
    assert_eq!(engine.config().thresholds.error, 0);

    mock.push(issues_reply(&[issue(IssueSeverity::Error, "unused import")]));
    let check = engine
        .validate_before_commit(&["src/lib.rs".to_string()])
        .await
        .unwrap();
    assert!(!check.passed);
    assert!(check.blocking_reason.unwrap().contains("error"));

    // markdown is now eligible for the watch queue
    engine.enqueue("notes.md");
    assert_eq!(engine.status().pending_files, 1);
}

#[tokio::test]
async fn test_update_config_rejects_bad_globs() {
    let (engine, _mock, _events) = engine_with(quiet_config());

    let mut config = quiet_config();
    config.include = vec!["[".to_string()];
    assert!(engine.update_config(config).is_err());

    // the previous filter stays in force
    engine.enqueue("src/app.rs");
    assert_eq!(engine.status().pending_files, 1);
}

#[tokio::test(start_paused = true)]
async fn test_batches_respect_size_and_interval() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = GuardianConfig {
        realtime: false,
        validation_interval_secs: 1,
        batch_size: 10,
        ..GuardianConfig::default()
    };
    let (engine, mock, _events) = engine_with(config);
    engine.start(dir.path()).await.unwrap();

    for i in 0..15 {
        engine.enqueue(format!("src/file{i:02}.rs"));
    }
    assert_eq!(engine.status().pending_files, 15);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    let status = engine.status();
    assert_eq!(status.validated_files, 10);
    assert_eq!(status.pending_files, 5);

    tokio::time::sleep(Duration::from_millis(1000)).await;
    let status = engine.status();
    assert_eq!(status.validated_files, 15);
    assert_eq!(status.pending_files, 0);
    assert_eq!(mock.call_count(), 15);

    engine.stop().await;
}
