//! Resilient agent call execution
//!
//! Wraps a transport with the full recovery pipeline: per-agent circuit
//! breakers, category-driven retries with exponential backoff, a single
//! reroute to a fallback agent, resource reclamation, and an offline mock
//! result as the last resort when fallback is enabled.

use crate::config::ResilienceSettings;
use crate::events::{EngineEvent, EventBus};
use crate::resilience::breaker::{BreakerConfig, BreakerRegistry, BreakerState, CircuitBreaker};
use crate::resilience::classify::{
    assess_severity, classify, suggested_resolution, AgentError, ErrorCategory,
};
use crate::resilience::retry::backoff_delay;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use strategos_rpc::{
    offline_result, AgentId, AgentRequest, AgentResponse, AgentTransport,
};

/// Retries granted to timeout failures.
const TIMEOUT_RETRIES: u32 = 2;

/// Fallback agent for each primary, used when the primary keeps failing
/// or its breaker is open. Scout and guardian have no stand-in: skipping
/// pre-analysis is handled upstream and validation must not be faked.
#[must_use]
pub fn reroute_target(agent: AgentId) -> Option<AgentId> {
    match agent {
        AgentId::Developer => Some(AgentId::Architect),
        AgentId::Architect => Some(AgentId::Pm),
        AgentId::Qa => Some(AgentId::Developer),
        AgentId::Pm => Some(AgentId::Po),
        AgentId::Po => Some(AgentId::Pm),
        AgentId::Scout | AgentId::Guardian => None,
    }
}

/// A reclaimable resource the executor can free when an agent reports
/// resource exhaustion.
#[async_trait]
pub trait ResourceGuard: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Free whatever this guard holds.
    async fn reclaim(&self) -> crate::error::Result<()>;
}

/// Outcome of a resilient call.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    /// The response, possibly produced by a fallback agent or the offline mock
    pub response: AgentResponse,
    /// Agent that actually served the call
    pub served_by: AgentId,
    /// Transport calls made, including the successful one
    pub attempts: u32,
    /// True when the response is the offline mock, not a real agent
    pub fallback: bool,
}

/// Executes agent calls through the recovery pipeline.
pub struct ResilientExecutor {
    transport: Arc<dyn AgentTransport>,
    breakers: Arc<BreakerRegistry>,
    settings: ResilienceSettings,
    guards: Vec<Arc<dyn ResourceGuard>>,
    events: EventBus,
}

impl ResilientExecutor {
    /// Create an executor over the given transport.
    #[must_use]
    pub fn new(
        transport: Arc<dyn AgentTransport>,
        settings: ResilienceSettings,
        events: EventBus,
    ) -> Self {
        let breakers = Arc::new(BreakerRegistry::new(BreakerConfig::from_settings(&settings)));
        Self {
            transport,
            breakers,
            settings,
            guards: Vec::new(),
            events,
        }
    }

    /// Register a resource guard.
    #[must_use]
    pub fn with_guard(mut self, guard: Arc<dyn ResourceGuard>) -> Self {
        self.guards.push(guard);
        self
    }

    /// Breaker registry, for status reporting.
    #[must_use]
    pub fn breakers(&self) -> Arc<BreakerRegistry> {
        Arc::clone(&self.breakers)
    }

    /// Call an agent, applying the recovery policy per failure category:
    ///
    /// - network: retry with exponential backoff, up to `max_retries`
    /// - timeout: immediate retry, up to two times
    /// - agent: one reroute to the fallback agent
    /// - resource: run the resource guards, then one retry
    /// - validation, permission, configuration: fail immediately
    ///
    /// When every avenue is exhausted and `fallback_enabled` is set, the
    /// offline mock result is returned instead of the final error.
    pub async fn execute(
        &self,
        request: AgentRequest,
    ) -> std::result::Result<CallOutcome, AgentError> {
        let mut agent = request.agent;
        let mut attempts: u32 = 0;
        let mut network_used: u32 = 0;
        let mut timeout_used: u32 = 0;
        let mut guards_ran = false;
        let mut rerouted = false;
        let mut last_error: Option<AgentError> = None;

        loop {
            let breaker = self.breakers.breaker(agent);
            if !breaker.try_acquire() {
                warn!(agent = %agent, "circuit breaker rejected call");
                if let Some(next) = self.take_reroute(&mut rerouted, agent) {
                    agent = next;
                    continue;
                }
                last_error = Some(breaker_open_error(&breaker, request.task));
                break;
            }

            attempts += 1;
            let mut attempt_request = request.clone();
            attempt_request.agent = agent;

            let before = breaker.state();
            match self.transport.call(attempt_request).await {
                Ok(response) => {
                    breaker.record_success();
                    self.emit_breaker_change(agent, before, breaker.state());
                    debug!(agent = %agent, attempts, "agent call succeeded");
                    return Ok(CallOutcome {
                        response,
                        served_by: agent,
                        attempts,
                        fallback: false,
                    });
                }
                Err(err) => {
                    breaker.record_failure();
                    self.emit_breaker_change(agent, before, breaker.state());

                    let classified =
                        classify(&err, Some(agent), None, self.settings.max_retries);
                    warn!(
                        agent = %agent,
                        category = %classified.category,
                        severity = ?classified.severity,
                        attempts,
                        "agent call failed: {}",
                        classified.message
                    );

                    match classified.category {
                        ErrorCategory::Network if network_used < self.settings.max_retries => {
                            network_used += 1;
                            let delay = backoff_delay(network_used - 1);
                            debug!(agent = %agent, retry = network_used, ?delay, "backing off");
                            tokio::time::sleep(delay).await;
                            last_error = Some(classified);
                        }
                        ErrorCategory::Timeout if timeout_used < TIMEOUT_RETRIES => {
                            timeout_used += 1;
                            debug!(agent = %agent, retry = timeout_used, "retrying after timeout");
                            last_error = Some(classified);
                        }
                        ErrorCategory::Agent => {
                            if let Some(next) = self.take_reroute(&mut rerouted, agent) {
                                agent = next;
                                last_error = Some(classified);
                            } else {
                                last_error = Some(classified);
                                break;
                            }
                        }
                        ErrorCategory::Resource if !guards_ran => {
                            guards_ran = true;
                            self.run_guards().await;
                            last_error = Some(classified);
                        }
                        ErrorCategory::Validation
                        | ErrorCategory::Permission
                        | ErrorCategory::Configuration => {
                            // Caller-side problems: retrying or masking them
                            // with a mock would hide the actual defect.
                            return Err(classified);
                        }
                        _ => {
                            last_error = Some(classified);
                            break;
                        }
                    }
                }
            }
        }

        self.fallback_or(request, attempts, last_error)
    }

    fn take_reroute(&self, rerouted: &mut bool, from: AgentId) -> Option<AgentId> {
        if *rerouted {
            return None;
        }
        let next = reroute_target(from)?;
        *rerouted = true;
        info!(from = %from, to = %next, "rerouting call to fallback agent");
        Some(next)
    }

    async fn run_guards(&self) {
        for guard in &self.guards {
            match guard.reclaim().await {
                Ok(()) => info!(guard = guard.name(), "resource guard reclaimed"),
                Err(err) => warn!(guard = guard.name(), "resource guard failed: {err}"),
            }
        }
    }

    fn fallback_or(
        &self,
        request: AgentRequest,
        attempts: u32,
        last_error: Option<AgentError>,
    ) -> std::result::Result<CallOutcome, AgentError> {
        let error = last_error.unwrap_or_else(|| exhausted_error(request.agent));
        if !self.settings.fallback_enabled {
            return Err(error);
        }

        info!(
            agent = %request.agent,
            category = %error.category,
            "serving offline mock result after exhausted recovery"
        );
        let response = AgentResponse {
            result: offline_result(request.agent, request.task),
            execution_time_ms: 0,
            agent: request.agent,
            request_id: request.request_id,
        };
        Ok(CallOutcome {
            response,
            served_by: request.agent,
            attempts,
            fallback: true,
        })
    }

    fn emit_breaker_change(&self, agent: AgentId, before: BreakerState, after: BreakerState) {
        if before != after {
            self.events.publish(EngineEvent::BreakerStateChanged {
                agent: agent.as_str().to_string(),
                state: after.to_string(),
            });
        }
    }
}

fn breaker_open_error(breaker: &CircuitBreaker, task: strategos_rpc::TaskKind) -> AgentError {
    let agent = breaker.agent();
    let message = match breaker.time_until_retry() {
        Some(wait) => format!(
            "circuit breaker open for {agent} during {task}, retry in {}s",
            wait.as_secs()
        ),
        None => format!("circuit breaker open for {agent} during {task}"),
    };
    AgentError {
        id: Uuid::new_v4(),
        category: ErrorCategory::Agent,
        severity: assess_severity(ErrorCategory::Agent, &message),
        message,
        agent: Some(agent),
        task_id: None,
        retry_count: 0,
        max_retries: 0,
        retryable: false,
        resolution: suggested_resolution(ErrorCategory::Agent).to_string(),
    }
}

fn exhausted_error(agent: AgentId) -> AgentError {
    let message = format!("all recovery attempts exhausted for {agent}");
    AgentError {
        id: Uuid::new_v4(),
        category: ErrorCategory::Unknown,
        severity: assess_severity(ErrorCategory::Unknown, &message),
        message,
        agent: Some(agent),
        task_id: None,
        retry_count: 0,
        max_retries: 0,
        retryable: false,
        resolution: suggested_resolution(ErrorCategory::Unknown).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use strategos_rpc::{MockTransport, ScriptedReply, TaskKind};

    fn settings() -> ResilienceSettings {
        ResilienceSettings::default()
    }

    fn request(agent: AgentId) -> AgentRequest {
        AgentRequest::new(agent, TaskKind::Implementation, serde_json::json!({}))
    }

    fn executor(mock: Arc<MockTransport>, settings: ResilienceSettings) -> ResilientExecutor {
        ResilientExecutor::new(mock, settings, EventBus::default())
    }

    struct CountingGuard {
        reclaims: AtomicU32,
    }

    #[async_trait]
    impl ResourceGuard for CountingGuard {
        fn name(&self) -> &str {
            "counting"
        }

        async fn reclaim(&self) -> crate::error::Result<()> {
            self.reclaims.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let mock = Arc::new(MockTransport::new());
        let exec = executor(mock.clone(), settings());

        let outcome = exec.execute(request(AgentId::Developer)).await.unwrap();
        assert!(!outcome.fallback);
        assert_eq!(outcome.served_by, AgentId::Developer);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failure_retries_with_backoff() {
        let mock = Arc::new(MockTransport::new());
        mock.push(ScriptedReply::NetworkError("connection refused".into()));
        mock.push(ScriptedReply::NetworkError("connection reset".into()));
        mock.push(ScriptedReply::Ok(serde_json::json!({"done": true})));
        let exec = executor(mock.clone(), settings());

        let outcome = exec.execute(request(AgentId::Developer)).await.unwrap();
        assert!(!outcome.fallback);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.response.result["done"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn test_timeout_retries_immediately() {
        let mock = Arc::new(MockTransport::new());
        mock.push(ScriptedReply::Timeout(5000));
        mock.push(ScriptedReply::Timeout(5000));
        let exec = executor(mock.clone(), settings());

        let outcome = exec.execute(request(AgentId::Qa)).await.unwrap();
        assert!(!outcome.fallback);
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn test_timeout_budget_exhausted_falls_back() {
        let mock = Arc::new(MockTransport::new());
        mock.push_failures(3, ScriptedReply::Timeout(5000));
        let exec = executor(mock.clone(), settings());

        let outcome = exec.execute(request(AgentId::Qa)).await.unwrap();
        assert!(outcome.fallback);
        assert_eq!(outcome.served_by, AgentId::Qa);
        assert_eq!(outcome.response.result["offline"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn test_agent_failure_reroutes_once() {
        let mock = Arc::new(MockTransport::new());
        mock.push(ScriptedReply::AgentError("agent crashed".into()));
        let exec = executor(mock.clone(), settings());

        let outcome = exec.execute(request(AgentId::Developer)).await.unwrap();
        assert!(!outcome.fallback);
        assert_eq!(outcome.served_by, AgentId::Architect);
        assert_eq!(outcome.attempts, 2);

        let received = mock.received();
        assert_eq!(received[0].agent, AgentId::Developer);
        assert_eq!(received[1].agent, AgentId::Architect);
    }

    #[tokio::test]
    async fn test_scout_has_no_reroute() {
        let mock = Arc::new(MockTransport::new());
        mock.push(ScriptedReply::AgentError("agent crashed".into()));
        let mut cfg = settings();
        cfg.fallback_enabled = false;
        let exec = executor(mock.clone(), cfg);

        let error = exec.execute(request(AgentId::Scout)).await.unwrap_err();
        assert_eq!(error.category, ErrorCategory::Agent);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_validation_error_fails_fast_despite_fallback() {
        let mock = Arc::new(MockTransport::new());
        mock.push(ScriptedReply::AgentError("invalid request payload".into()));
        let exec = executor(mock.clone(), settings());

        let error = exec.execute(request(AgentId::Developer)).await.unwrap_err();
        assert_eq!(error.category, ErrorCategory::Validation);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_resource_failure_runs_guards_then_retries() {
        let mock = Arc::new(MockTransport::new());
        mock.push(ScriptedReply::AgentError("out of memory during task".into()));
        let guard = Arc::new(CountingGuard {
            reclaims: AtomicU32::new(0),
        });
        let exec = executor(mock.clone(), settings()).with_guard(guard.clone());

        let outcome = exec.execute(request(AgentId::Developer)).await.unwrap();
        assert!(!outcome.fallback);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(guard.reclaims.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_skips_to_fallback() {
        let mock = Arc::new(MockTransport::new());
        mock.push(ScriptedReply::NetworkError("network down".into()));
        let mut cfg = settings();
        cfg.failure_threshold = 1;
        let exec = executor(mock.clone(), cfg);

        let outcome = exec.execute(request(AgentId::Scout)).await.unwrap();
        assert!(outcome.fallback);
        assert_eq!(outcome.attempts, 1);
        assert!(exec.breakers().breaker(AgentId::Scout).is_open());
    }

    #[tokio::test]
    async fn test_fallback_disabled_surfaces_error() {
        let mock = Arc::new(MockTransport::new());
        mock.push_failures(3, ScriptedReply::Timeout(1000));
        let mut cfg = settings();
        cfg.fallback_enabled = false;
        let exec = executor(mock.clone(), cfg);

        let error = exec.execute(request(AgentId::Pm)).await.unwrap_err();
        assert_eq!(error.category, ErrorCategory::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_events_published() {
        let mock = Arc::new(MockTransport::new());
        mock.push(ScriptedReply::NetworkError("network down".into()));
        let bus = EventBus::default();
        let mut events = bus.subscribe();
        let mut cfg = settings();
        cfg.failure_threshold = 1;
        let exec = ResilientExecutor::new(mock, cfg, bus);

        exec.execute(request(AgentId::Scout)).await.unwrap();

        let event = events.try_recv().unwrap();
        assert!(matches!(
            event,
            EngineEvent::BreakerStateChanged { ref state, .. } if state == "Open"
        ));
    }
}
