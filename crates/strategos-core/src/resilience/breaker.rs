//! Circuit breaker per agent
//!
//! Three states:
//! - Closed: normal operation, calls pass through
//! - Open: consecutive failures hit the threshold, calls are rejected
//! - HalfOpen: the open timeout elapsed, exactly one probe call may pass
//!
//! All transitions go through one mutex so concurrent callers observe a
//! single consistent state machine; in particular only one caller can win
//! the half-open probe slot.

use crate::config::ResilienceSettings;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use strategos_rpc::AgentId;
use tracing::{debug, info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation - calls pass through
    Closed,
    /// Failures exceeded threshold - calls are rejected
    Open,
    /// Testing recovery - a single probe call passes through
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Configuration for circuit breakers
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Duration an open circuit rejects calls before allowing a probe
    pub open_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(60),
        }
    }
}

impl BreakerConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure threshold
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the open timeout
    #[must_use]
    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Derive breaker configuration from the resilience settings.
    #[must_use]
    pub fn from_settings(settings: &ResilienceSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            open_timeout: Duration::from_secs(settings.breaker_timeout_secs),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failures: u32,
    open_until: Option<Instant>,
    probe_started: Option<Instant>,
}

/// Circuit breaker guarding calls to one agent
pub struct CircuitBreaker {
    agent: AgentId,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a new breaker for an agent.
    #[must_use]
    pub fn new(agent: AgentId, config: BreakerConfig) -> Self {
        Self {
            agent,
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failures: 0,
                open_until: None,
                probe_started: None,
            }),
        }
    }

    /// Agent this breaker guards.
    #[must_use]
    pub fn agent(&self) -> AgentId {
        self.agent
    }

    /// Current state, without side effects.
    #[must_use]
    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    /// Current consecutive-failure count.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.lock().failures
    }

    /// Whether a call made right now would be rejected.
    #[must_use]
    pub fn is_open(&self) -> bool {
        let inner = self.lock();
        inner.state == BreakerState::Open
            && inner.open_until.map_or(false, |until| Instant::now() < until)
    }

    /// Time left until an open circuit admits a probe, if it is open.
    #[must_use]
    pub fn time_until_retry(&self) -> Option<Duration> {
        let inner = self.lock();
        match inner.state {
            BreakerState::Open => inner
                .open_until
                .map(|until| until.saturating_duration_since(Instant::now())),
            _ => None,
        }
    }

    /// Ask to make a call. Returns false when the call must be rejected.
    ///
    /// An open circuit whose timeout has elapsed hands out exactly one
    /// half-open probe; concurrent callers lose until the probe reports.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.lock();
        let now = Instant::now();

        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let elapsed = inner.open_until.map_or(true, |until| now >= until);
                if elapsed {
                    info!(agent = %self.agent, "circuit breaker entering half-open state");
                    inner.state = BreakerState::HalfOpen;
                    inner.probe_started = Some(now);
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => {
                // A probe that never reported frees the slot after the open
                // timeout, so an abandoned call cannot wedge the breaker.
                let stale = inner
                    .probe_started
                    .map_or(true, |started| now.duration_since(started) >= self.config.open_timeout);
                if stale {
                    inner.probe_started = Some(now);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.failures = 0;
            }
            BreakerState::HalfOpen => {
                info!(agent = %self.agent, "circuit breaker closed after successful probe");
                inner.state = BreakerState::Closed;
                inner.failures = 0;
                inner.open_until = None;
                inner.probe_started = None;
            }
            BreakerState::Open => {}
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        let now = Instant::now();
        match inner.state {
            BreakerState::Closed => {
                inner.failures += 1;
                debug!(
                    agent = %self.agent,
                    failures = inner.failures,
                    threshold = self.config.failure_threshold,
                    "circuit breaker failure recorded"
                );
                if inner.failures >= self.config.failure_threshold {
                    warn!(agent = %self.agent, "circuit breaker opened");
                    inner.state = BreakerState::Open;
                    inner.open_until = Some(now + self.config.open_timeout);
                }
            }
            BreakerState::HalfOpen => {
                warn!(agent = %self.agent, "probe failed, circuit breaker reopened");
                inner.state = BreakerState::Open;
                inner.open_until = Some(now + self.config.open_timeout);
                inner.probe_started = None;
            }
            BreakerState::Open => {}
        }
    }

    /// Force the breaker back to closed.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = BreakerState::Closed;
        inner.failures = 0;
        inner.open_until = None;
        inner.probe_started = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Per-agent breaker registry.
///
/// Breakers are created lazily on first use and never destroyed.
pub struct BreakerRegistry {
    breakers: DashMap<AgentId, Arc<CircuitBreaker>>,
    config: BreakerConfig,
}

impl BreakerRegistry {
    /// Create a registry with the given breaker configuration.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
        }
    }

    /// Get the breaker for an agent, creating it on first use.
    #[must_use]
    pub fn breaker(&self, agent: AgentId) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(agent)
            .or_insert_with(|| Arc::new(CircuitBreaker::new(agent, self.config.clone())))
            .clone()
    }

    /// Current state of every breaker created so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(AgentId, BreakerState)> {
        let mut states: Vec<(AgentId, BreakerState)> = self
            .breakers
            .iter()
            .map(|entry| (*entry.key(), entry.value().state()))
            .collect();
        states.sort_by_key(|(agent, _)| agent.as_str());
        states
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
