//! Continuous validation engine.
//!
//! The guardian watches a project tree, queues changed files, and sends them
//! to the validation backend in batches. It also backs the explicit
//! pre-commit and pre-deploy gates, using the configured blocking thresholds
//! to decide whether an operation may proceed.

use crate::error::{Error, Result};
use crate::events::{EngineEvent, EventBus};
use crate::guardian::config::{BlockingThresholds, GuardianConfig};
use crate::guardian::watcher::{ChangeWatcher, FileFilter};

use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use strategos_rpc::{
    AgentTransport, IssueSeverity, ValidationClient, ValidationIssue, ValidationReport,
};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How many issues the status ring buffer retains.
const RECENT_ISSUES_CAP: usize = 50;

/// Lifecycle state of the guardian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardianState {
    /// Not running
    Stopped,
    /// Start requested, watcher and scan still in progress
    Starting,
    /// Watching the project tree
    Watching,
}

impl fmt::Display for GuardianState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GuardianState::Stopped => "stopped",
            GuardianState::Starting => "starting",
            GuardianState::Watching => "watching",
        };
        f.write_str(name)
    }
}

/// Verdict of a pre-commit validation gate.
#[derive(Debug, Clone, Serialize)]
pub struct CommitCheck {
    /// Whether the commit may proceed
    pub passed: bool,
    /// Issues found in the changed files
    pub issues: Vec<ValidationIssue>,
    /// Which thresholds were exceeded, when blocked
    pub blocking_reason: Option<String>,
}

/// Verdict of a pre-deploy validation gate.
#[derive(Debug, Clone, Serialize)]
pub struct DeployCheck {
    /// Whether the deploy may proceed
    pub approved: bool,
    /// Full project validation report
    pub report: ValidationReport,
    /// Which thresholds were exceeded, when blocked
    pub blocking_reason: Option<String>,
}

/// Snapshot of the guardian for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct GuardianStatus {
    /// Current lifecycle state
    pub state: GuardianState,
    /// Root directory under watch, when running
    pub watched_root: Option<PathBuf>,
    /// Files queued and waiting for the next batch
    pub pending_files: usize,
    /// Total files validated since construction
    pub validated_files: u64,
    /// Total issues auto-fixed since construction
    pub auto_fixed: u64,
    /// Most recent issues, oldest first
    pub recent_issues: Vec<ValidationIssue>,
}

/// Continuous validation engine.
///
/// Construction is cheap and synchronous; the background worker only exists
/// between [`GuardianEngine::start`] and [`GuardianEngine::stop`]. The gate
/// methods work in either state.
pub struct GuardianEngine {
    config: RwLock<GuardianConfig>,
    filter: RwLock<FileFilter>,
    client: ValidationClient,
    events: EventBus,
    state: RwLock<GuardianState>,
    watched_root: RwLock<Option<PathBuf>>,
    pending: Mutex<HashSet<PathBuf>>,
    recent_issues: Mutex<VecDeque<ValidationIssue>>,
    validated_files: AtomicU64,
    auto_fixed: AtomicU64,
    shutdown: Mutex<Option<CancellationToken>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl GuardianEngine {
    /// Create a stopped engine.
    ///
    /// Fails when the configured include/exclude globs do not compile.
    pub fn new(
        config: GuardianConfig,
        transport: Arc<dyn AgentTransport>,
        events: EventBus,
    ) -> Result<Self> {
        let filter = FileFilter::new(&config)?;
        Ok(Self {
            config: RwLock::new(config),
            filter: RwLock::new(filter),
            client: ValidationClient::new(transport),
            events,
            state: RwLock::new(GuardianState::Stopped),
            watched_root: RwLock::new(None),
            pending: Mutex::new(HashSet::new()),
            recent_issues: Mutex::new(VecDeque::new()),
            validated_files: AtomicU64::new(0),
            auto_fixed: AtomicU64::new(0),
            shutdown: Mutex::new(None),
            worker: Mutex::new(None),
        })
    }

    /// A snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> GuardianConfig {
        self.snapshot()
    }

    /// Replace the configuration while the engine runs.
    ///
    /// Glob, threshold, batching, auto-fix, and notification changes take
    /// effect on the next read; `realtime` and the tick interval apply at the
    /// next [`GuardianEngine::start`]. Invalid globs leave the previous
    /// configuration in place.
    pub fn update_config(&self, config: GuardianConfig) -> Result<()> {
        let filter = FileFilter::new(&config)?;
        *self.filter.write().unwrap_or_else(|e| e.into_inner()) = filter;
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;
        info!("guardian configuration updated");
        Ok(())
    }

    fn snapshot(&self) -> GuardianConfig {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> GuardianState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Start watching `root` and validating changed files.
    ///
    /// The engine runs until [`GuardianEngine::stop`] is called. Starting an
    /// already-running engine is an error.
    pub async fn start(self: &Arc<Self>, root: impl AsRef<Path>) -> Result<()> {
        {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            if *state != GuardianState::Stopped {
                return Err(Error::Guardian(format!(
                    "guardian is already running (state: {state})"
                )));
            }
            *state = GuardianState::Starting;
        }
        let root = root.as_ref().to_path_buf();
        match self.start_inner(root).await {
            Ok(()) => Ok(()),
            Err(err) => {
                *self.state.write().unwrap_or_else(|e| e.into_inner()) = GuardianState::Stopped;
                Err(err)
            }
        }
    }

    async fn start_inner(self: &Arc<Self>, root: PathBuf) -> Result<()> {
        let realtime = self.snapshot().realtime;
        let watcher = if realtime {
            Some(ChangeWatcher::new(&root)?)
        } else {
            None
        };

        let scan_root = root.clone();
        let scan_filter = self.filter.read().unwrap_or_else(|e| e.into_inner()).clone();
        let watched_files =
            tokio::task::spawn_blocking(move || scan_eligible(&scan_root, &scan_filter))
                .await
                .unwrap_or(0);

        let token = CancellationToken::new();
        *self.shutdown.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());
        *self.watched_root.write().unwrap_or_else(|e| e.into_inner()) = Some(root.clone());

        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move { engine.run(watcher, token).await });
        *self.worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);

        *self.state.write().unwrap_or_else(|e| e.into_inner()) = GuardianState::Watching;
        info!(
            root = %root.display(),
            watched_files,
            realtime,
            "guardian started"
        );
        self.events
            .publish(EngineEvent::GuardianStarted { watched_files });
        Ok(())
    }

    /// Stop the engine.
    ///
    /// Waits for the worker to exit, so an in-flight batch finishes before
    /// this returns. Stopping a stopped engine is a no-op.
    pub async fn stop(&self) {
        let token = self
            .shutdown
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(token) = token else {
            return;
        };
        token.cancel();

        let handle = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "guardian worker ended abnormally");
            }
        }

        *self.state.write().unwrap_or_else(|e| e.into_inner()) = GuardianState::Stopped;
        *self.watched_root.write().unwrap_or_else(|e| e.into_inner()) = None;
        info!("guardian stopped");
        self.events.publish(EngineEvent::GuardianStopped);
    }

    /// Queue a file for the next validation batch.
    ///
    /// Paths outside the include globs (or inside the exclude globs) are
    /// silently dropped. Queueing the same file twice before a batch runs
    /// validates it once.
    pub fn enqueue(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let eligible = self
            .filter
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_eligible(&path);
        if !eligible {
            return;
        }
        debug!(path = %path.display(), "queued for validation");
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path);
    }

    /// Validate one file now, outside the batch schedule.
    ///
    /// Records issues, publishes [`EngineEvent::ValidationIssuesFound`], and
    /// applies auto-fixes when enabled.
    pub async fn validate_file(&self, path: impl AsRef<Path>) -> Result<Vec<ValidationIssue>> {
        let file = path.as_ref().to_string_lossy().to_string();
        let issues = self.client.validate_file(&file).await?;
        self.validated_files.fetch_add(1, Ordering::Relaxed);

        if !issues.is_empty() {
            let config = self.snapshot();
            self.record_issues(&issues);
            let blocking = blocking_reason(&issues, &config.thresholds).is_some();
            debug!(file = %file, count = issues.len(), blocking, "validation issues found");
            if config.notifications {
                self.events.publish(EngineEvent::ValidationIssuesFound {
                    file: file.clone(),
                    count: issues.len(),
                    blocking,
                });
            }
            if config.auto_fix {
                self.apply_auto_fixes(&file, &issues).await;
            }
        }
        Ok(issues)
    }

    /// Validate the whole watched project (or the current directory when the
    /// engine is stopped).
    pub async fn validate_project(&self) -> Result<ValidationReport> {
        let root = self
            .watched_root
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let project = root
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());
        let report = self.client.validate_project(&project).await?;
        if !report.issues.is_empty() {
            self.record_issues(&report.issues);
        }
        Ok(report)
    }

    /// Pre-commit gate: validate the changed files and apply the blocking
    /// thresholds.
    pub async fn validate_before_commit(&self, changed_files: &[String]) -> Result<CommitCheck> {
        let issues = self.client.validate_before_commit(changed_files).await?;
        if !issues.is_empty() {
            self.record_issues(&issues);
        }
        let blocking_reason = blocking_reason(&issues, &self.snapshot().thresholds);
        if let Some(reason) = &blocking_reason {
            warn!(files = changed_files.len(), reason = %reason, "commit blocked by validation");
        }
        Ok(CommitCheck {
            passed: blocking_reason.is_none(),
            issues,
            blocking_reason,
        })
    }

    /// Pre-deploy gate: run a full project validation against `target` and
    /// apply the blocking thresholds.
    pub async fn validate_before_deploy(&self, target: &str) -> Result<DeployCheck> {
        let report = self.client.validate_before_deploy(target).await?;
        if !report.issues.is_empty() {
            self.record_issues(&report.issues);
        }
        let blocking_reason = blocking_reason(&report.issues, &self.snapshot().thresholds);
        if let Some(reason) = &blocking_reason {
            warn!(target = %target, reason = %reason, "deploy blocked by validation");
        }
        Ok(DeployCheck {
            approved: blocking_reason.is_none(),
            report,
            blocking_reason,
        })
    }

    /// Snapshot for status displays.
    #[must_use]
    pub fn status(&self) -> GuardianStatus {
        GuardianStatus {
            state: self.state(),
            watched_root: self
                .watched_root
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
            pending_files: self.pending.lock().unwrap_or_else(|e| e.into_inner()).len(),
            validated_files: self.validated_files.load(Ordering::Relaxed),
            auto_fixed: self.auto_fixed.load(Ordering::Relaxed),
            recent_issues: self
                .recent_issues
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .cloned()
                .collect(),
        }
    }

    /// Worker loop. A batch in flight completes before cancellation is
    /// observed at the next `select!`.
    async fn run(self: Arc<Self>, watcher: Option<ChangeWatcher>, token: CancellationToken) {
        let period = Duration::from_secs(self.snapshot().validation_interval_secs);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval completes immediately; consume it so
        // the first batch runs one full period after start.
        ticker.tick().await;

        if let Some(mut watcher) = watcher {
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = ticker.tick() => self.drain_batch().await,
                    changed = watcher.next_change() => match changed {
                        Some(path) => self.enqueue(path),
                        None => {
                            warn!("file watcher channel closed; continuing on timer only");
                            break;
                        }
                    },
                }
            }
        }

        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = ticker.tick() => self.drain_batch().await,
            }
        }
    }

    /// Validate up to `batch_size` queued files.
    async fn drain_batch(&self) {
        let batch_size = self.snapshot().batch_size;
        let batch: Vec<PathBuf> = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            let batch: Vec<PathBuf> = pending
                .iter()
                .take(batch_size)
                .cloned()
                .collect();
            for path in &batch {
                pending.remove(path);
            }
            batch
        };
        if batch.is_empty() {
            return;
        }

        debug!(count = batch.len(), "validating batch");
        let results = futures::future::join_all(
            batch.iter().map(|path| self.validate_file(path)),
        )
        .await;
        for (path, result) in batch.iter().zip(results) {
            if let Err(err) = result {
                warn!(path = %path.display(), error = %err, "validation backend unavailable");
            }
        }
    }

    /// Request fixes for every fixable, unresolved issue in `issues`.
    ///
    /// Fix failures are logged and never fail the surrounding validation.
    async fn apply_auto_fixes(&self, file: &str, issues: &[ValidationIssue]) {
        let fixable: Vec<Uuid> = issues
            .iter()
            .filter(|issue| issue.auto_fixable && !issue.resolved)
            .map(|issue| issue.id)
            .collect();
        if fixable.is_empty() {
            return;
        }

        match self.client.auto_fix(file, &fixable).await {
            Ok(outcome) => {
                let fixed = outcome.fixed_count();
                if fixed > 0 {
                    self.auto_fixed.fetch_add(fixed as u64, Ordering::Relaxed);
                    self.mark_resolved(&outcome.fixed);
                    info!(file = %file, fixed, "auto-fixed issues");
                    self.events.publish(EngineEvent::AutoFixApplied {
                        file: file.to_string(),
                        fixed,
                    });
                }
                if !outcome.failed.is_empty() {
                    warn!(file = %file, failed = outcome.failed.len(), "issues could not be auto-fixed");
                }
            }
            Err(err) => {
                warn!(file = %file, error = %err, "auto-fix request failed");
            }
        }
    }

    fn record_issues(&self, issues: &[ValidationIssue]) {
        let mut recent = self
            .recent_issues
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        for issue in issues {
            recent.push_back(issue.clone());
        }
        while recent.len() > RECENT_ISSUES_CAP {
            recent.pop_front();
        }
    }

    fn mark_resolved(&self, ids: &[Uuid]) {
        let mut recent = self
            .recent_issues
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        for issue in recent.iter_mut() {
            if ids.contains(&issue.id) {
                issue.resolved = true;
            }
        }
    }
}

/// Which blocking thresholds the given issues exceed, if any.
///
/// Resolved issues do not count against the thresholds.
fn blocking_reason(issues: &[ValidationIssue], thresholds: &BlockingThresholds) -> Option<String> {
    let mut reasons = Vec::new();
    for severity in IssueSeverity::ALL {
        let count = issues
            .iter()
            .filter(|issue| issue.severity == severity && !issue.resolved)
            .count();
        let allowed = thresholds.for_severity(severity);
        if count > allowed {
            reasons.push(format!("{count} {severity} issue(s) exceed the allowed {allowed}"));
        }
    }
    if reasons.is_empty() {
        None
    } else {
        Some(reasons.join("; "))
    }
}

/// Count eligible files under `root`, pruning excluded directories.
///
/// Symlinks are not followed. Unreadable directories are skipped.
fn scan_eligible(root: &Path, filter: &FileFilter) -> usize {
    let mut count = 0;
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let path = entry.path();
            if file_type.is_dir() {
                if !filter.prunes_dir(&path) {
                    stack.push(path);
                }
            } else if file_type.is_file() && filter.is_eligible(&path) {
                count += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use strategos_rpc::IssueCategory;

    fn issue(severity: IssueSeverity) -> ValidationIssue {
        ValidationIssue::new("rule", severity, IssueCategory::Quality, "finding")
    }

    #[test]
    fn test_blocking_reason_none_when_under_thresholds() {
        let thresholds = BlockingThresholds::default();
        let issues = vec![issue(IssueSeverity::Error), issue(IssueSeverity::Warning)];
        assert!(blocking_reason(&issues, &thresholds).is_none());
    }

    #[test]
    fn test_blocking_reason_names_each_exceeded_severity() {
        let thresholds = BlockingThresholds {
            critical: 0,
            error: 0,
            warning: 20,
            info: 50,
        };
        let issues = vec![
            issue(IssueSeverity::Critical),
            issue(IssueSeverity::Error),
            issue(IssueSeverity::Error),
        ];
        let reason = blocking_reason(&issues, &thresholds).unwrap();
        assert!(reason.contains("2 error issue(s) exceed the allowed 0"));
        assert!(reason.contains("1 critical issue(s) exceed the allowed 0"));
    }

    #[test]
    fn test_blocking_reason_skips_resolved_issues() {
        let thresholds = BlockingThresholds::default();
        let mut critical = issue(IssueSeverity::Critical);
        critical.resolved = true;
        assert!(blocking_reason(&[critical], &thresholds).is_none());
    }

    #[test]
    fn test_guardian_state_display() {
        assert_eq!(GuardianState::Stopped.to_string(), "stopped");
        assert_eq!(GuardianState::Watching.to_string(), "watching");
    }
}
