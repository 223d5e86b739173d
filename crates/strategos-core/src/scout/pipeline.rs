//! The scout pipeline: cached pre-analysis with a proceed/block verdict

use crate::command::Urgency;
use crate::config::ScoutSettings;
use crate::events::{EngineEvent, EventBus};
use crate::scout::analyzer::{assess_dependencies, find_duplications, scan_tech_debt};
use crate::scout::cache::{spawn_sweeper, AnalysisCache, CacheStats};
use crate::scout::types::{
    DebtSeverity, DependencyImpact, DuplicationMatch, RiskLevel, RiskSummary, ScoutReport,
    ScoutRequest, TechDebtItem,
};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Similarity above which a duplication match blocks the workflow.
const BLOCKING_SIMILARITY: f64 = 0.8;

/// Base confidence before any analysis findings.
const BASE_CONFIDENCE: f64 = 0.5;

/// Runs pre-analysis for workflow operations.
///
/// Reports are cached by request content; a background sweeper expires
/// stale entries until the pipeline's cancellation token fires.
pub struct ScoutPipeline {
    cache: Arc<AnalysisCache>,
    events: EventBus,
    analysis_runs: AtomicU64,
    sweep_interval: Duration,
    sweeper_started: AtomicBool,
    shutdown: CancellationToken,
}

impl ScoutPipeline {
    /// Create a pipeline. The cache sweeper starts on first use, so
    /// construction is safe outside a runtime.
    #[must_use]
    pub fn new(settings: &ScoutSettings, events: EventBus) -> Self {
        Self {
            cache: Arc::new(AnalysisCache::from_settings(settings)),
            events,
            analysis_runs: AtomicU64::new(0),
            sweep_interval: Duration::from_secs(settings.sweep_interval_secs),
            sweeper_started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    fn ensure_sweeper(&self) {
        if !self.sweeper_started.swap(true, Ordering::SeqCst) {
            spawn_sweeper(
                Arc::clone(&self.cache),
                self.sweep_interval,
                self.shutdown.clone(),
            );
        }
    }

    /// Analyze an operation, serving from the cache when possible.
    ///
    /// Never fails: when the analysis itself dies the report degrades to a
    /// proceed verdict carrying a warning, so scout trouble cannot block
    /// work on its own.
    pub async fn analyze(&self, request: &ScoutRequest) -> ScoutReport {
        self.ensure_sweeper();
        let key = request.cache_key();
        if let Some(mut report) = self.cache.get(&key) {
            debug!(operation = %request.operation, "scout cache hit");
            report.cache_hit = true;
            self.events.publish(EngineEvent::ScoutCompleted {
                cache_hit: true,
                should_proceed: report.should_proceed,
            });
            return report;
        }

        self.analysis_runs.fetch_add(1, Ordering::Relaxed);
        let analysis_request = request.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let duplications = find_duplications(&analysis_request);
            let impact = assess_dependencies(&analysis_request);
            let debt = analysis_request
                .snippet
                .as_deref()
                .map(scan_tech_debt)
                .unwrap_or_default();
            (duplications, impact, debt)
        })
        .await;

        let report = match outcome {
            Ok((duplications, impact, debt)) => {
                build_report(request, duplications, impact, debt)
            }
            Err(join_error) => {
                warn!(operation = %request.operation, "scout analysis failed: {join_error}");
                degraded_report(request)
            }
        };

        self.cache.insert(key, report.clone());
        self.events.publish(EngineEvent::ScoutCompleted {
            cache_hit: false,
            should_proceed: report.should_proceed,
        });
        report
    }

    /// Number of analyses that actually ran (cache misses).
    #[must_use]
    pub fn analysis_runs(&self) -> u64 {
        self.analysis_runs.load(Ordering::Relaxed)
    }

    /// Cache counters, for status reporting.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached report.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Stop the background sweeper.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for ScoutPipeline {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn build_report(
    request: &ScoutRequest,
    duplications: Vec<DuplicationMatch>,
    impact: DependencyImpact,
    debt: Vec<TechDebtItem>,
) -> ScoutReport {
    let mut warnings = Vec::new();
    let mut suggestions = Vec::new();

    let highest_similarity = duplications
        .iter()
        .map(|m| m.similarity)
        .fold(0.0f64, f64::max);
    let strong_duplicate = duplications
        .iter()
        .find(|m| m.similarity > BLOCKING_SIMILARITY);

    let mut blocked = false;
    if let Some(duplicate) = strong_duplicate {
        if request.urgency == Urgency::Emergency {
            warnings.push(format!(
                "{} looks heavily duplicated in {} (similarity {:.2}); proceeding due to emergency urgency",
                request.operation, duplicate.file, duplicate.similarity
            ));
        } else {
            blocked = true;
            warnings.push(format!(
                "existing implementation in {} is {:.0}% similar; confirm before duplicating it",
                duplicate.file,
                duplicate.similarity * 100.0
            ));
        }
    }

    match impact.risk {
        RiskLevel::Critical => {
            // Critical dependency risk always blocks, urgency included
            blocked = true;
            warnings.push(format!(
                "critical dependency risk: {} breaking-change indicators across {} files",
                impact.breaking_changes.len(),
                impact.affected_files.len()
            ));
        }
        RiskLevel::High => {
            warnings.push(format!(
                "high dependency risk, estimated effort {}",
                impact.effort_estimate
            ));
        }
        _ => {}
    }

    if debt.iter().any(|item| item.severity == DebtSeverity::Critical) {
        warnings.push("critical technical debt present in the touched code".to_string());
    }

    for duplicate in &duplications {
        if !suggestions.contains(&duplicate.suggestion) {
            suggestions.push(duplicate.suggestion.clone());
        }
    }
    if impact.risk >= RiskLevel::High {
        suggestions.push("Review the affected files before starting".to_string());
    }

    let mut confidence = BASE_CONFIDENCE;
    if !duplications.is_empty() {
        confidence += 0.2;
    }
    if !impact.affected_files.is_empty() || !impact.breaking_changes.is_empty() {
        confidence += 0.2;
    }
    if !debt.is_empty() {
        confidence += 0.1;
    }
    let confidence = confidence.min(1.0);

    let mut overall = impact.risk;
    if highest_similarity > BLOCKING_SIMILARITY && overall < RiskLevel::High {
        overall = RiskLevel::High;
    }
    let headline = format!(
        "{} duplication match(es), {} breaking-change indicator(s), {} debt item(s)",
        duplications.len(),
        impact.breaking_changes.len(),
        debt.len()
    );

    ScoutReport {
        operation: request.operation.clone(),
        risk_summary: RiskSummary {
            overall,
            duplication_count: duplications.len(),
            highest_similarity,
            breaking_change_count: impact.breaking_changes.len(),
            debt_count: debt.len(),
            headline,
        },
        duplications,
        dependency_impact: impact,
        tech_debt: debt,
        should_proceed: !blocked,
        warnings,
        suggestions,
        confidence,
        cache_hit: false,
        generated_at: Utc::now(),
    }
}

/// Report used when the analysis itself fails. Always allows the workflow
/// to continue.
fn degraded_report(request: &ScoutRequest) -> ScoutReport {
    ScoutReport {
        operation: request.operation.clone(),
        duplications: Vec::new(),
        dependency_impact: DependencyImpact {
            affected_files: Vec::new(),
            breaking_changes: Vec::new(),
            risk: RiskLevel::Low,
            effort_estimate: "unknown".to_string(),
        },
        tech_debt: Vec::new(),
        should_proceed: true,
        warnings: vec!["scout analysis was unavailable; proceeding without pre-analysis".to_string()],
        suggestions: Vec::new(),
        confidence: 0.0,
        risk_summary: RiskSummary {
            overall: RiskLevel::Low,
            duplication_count: 0,
            highest_similarity: 0.0,
            breaking_change_count: 0,
            debt_count: 0,
            headline: "scout analysis unavailable".to_string(),
        },
        cache_hit: false,
        generated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> ScoutPipeline {
        ScoutPipeline::new(&ScoutSettings::default(), EventBus::default())
    }

    #[tokio::test]
    async fn test_identical_requests_hit_cache_once() {
        let scout = pipeline();
        let request = ScoutRequest::new("create_feature", "implement payment processing");

        let first = scout.analyze(&request).await;
        let second = scout.analyze(&request).await;

        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(scout.analysis_runs(), 1);
        assert_eq!(scout.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn test_strong_duplication_blocks() {
        let scout = pipeline();
        let request = ScoutRequest::new(
            "create_feature",
            "rework the login authentication session oauth flow",
        );

        let report = scout.analyze(&request).await;
        assert!(!report.should_proceed);
        assert!(!report.warnings.is_empty());
        assert!(report.risk_summary.highest_similarity > 0.8);
    }

    #[tokio::test]
    async fn test_emergency_urgency_overrides_duplication_block() {
        let scout = pipeline();
        let request = ScoutRequest::new(
            "create_feature",
            "rework the login authentication session oauth flow",
        )
        .with_urgency(Urgency::Emergency);

        let report = scout.analyze(&request).await;
        assert!(report.should_proceed);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("emergency urgency")));
    }

    #[tokio::test]
    async fn test_critical_risk_blocks_even_in_emergency() {
        let scout = pipeline();
        let request = ScoutRequest::new(
            "refactor_code",
            "remove delete rename replace and migrate everything",
        )
        .with_urgency(Urgency::Emergency);

        let report = scout.analyze(&request).await;
        assert!(!report.should_proceed);
        assert_eq!(report.dependency_impact.risk, RiskLevel::Critical);
    }

    #[tokio::test]
    async fn test_confidence_reflects_analysis_completeness() {
        let scout = pipeline();

        let bare = ScoutRequest::new("plan_project", "organize the roadmap");
        let report = scout.analyze(&bare).await;
        assert!((report.confidence - 0.5).abs() < 1e-9);

        let rich = ScoutRequest::new("fix_bug", "fix the payment flow")
            .with_snippet("// TODO: handle declined cards\nprintln!(\"debug\");");
        let report = scout.analyze(&rich).await;
        // duplication + dependency findings + debt findings
        assert!((report.confidence - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_scout_completed_event_published() {
        let bus = EventBus::default();
        let mut events = bus.subscribe();
        let scout = ScoutPipeline::new(&ScoutSettings::default(), bus);

        let request = ScoutRequest::new("write_tests", "cover the parser");
        scout.analyze(&request).await;

        let event = events.try_recv().unwrap();
        assert!(matches!(
            event,
            EngineEvent::ScoutCompleted {
                cache_hit: false,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_degraded_report_allows_progress() {
        let request = ScoutRequest::new("fix_bug", "fix everything");
        let report = degraded_report(&request);
        assert!(report.should_proceed);
        assert_eq!(report.confidence, 0.0);
        assert!(!report.warnings.is_empty());
    }
}
