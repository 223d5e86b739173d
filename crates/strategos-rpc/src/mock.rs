//! Mock agent transport for tests and offline operation
//!
//! Returns scripted replies when queued, otherwise a deterministic response
//! derived from the (agent, task) pair. The same pair always yields the same
//! payload, so workflows remain exercisable with no agents reachable.

use crate::error::{Error, Result};
use crate::transport::AgentTransport;
use crate::types::{AgentId, AgentRequest, AgentResponse, TaskKind};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A reply queued into the mock
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Respond successfully with this payload
    Ok(serde_json::Value),
    /// Fail with a network error
    NetworkError(String),
    /// Fail with a timeout
    Timeout(u64),
    /// Fail with an agent-side error
    AgentError(String),
}

/// Deterministic offline payload for an (agent, task) pair.
#[must_use]
pub fn offline_result(agent: AgentId, task: TaskKind) -> serde_json::Value {
    serde_json::json!({
        "agent": agent.as_str(),
        "task": task.as_str(),
        "summary": format!("{agent} completed {task} (offline mock)"),
        "offline": true,
    })
}

/// A mock transport that returns queued replies or deterministic defaults.
pub struct MockTransport {
    scripted: Mutex<VecDeque<ScriptedReply>>,
    calls: Mutex<Vec<AgentRequest>>,
    call_count: AtomicU64,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a new mock transport with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            call_count: AtomicU64::new(0),
        }
    }

    /// Queue a reply; replies are consumed in FIFO order.
    pub fn push(&self, reply: ScriptedReply) {
        self.scripted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    /// Queue the same failure `n` times.
    pub fn push_failures(&self, n: usize, reply: ScriptedReply) {
        for _ in 0..n {
            self.push(reply.clone());
        }
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Snapshot of every request received, in arrival order.
    #[must_use]
    pub fn received(&self) -> Vec<AgentRequest> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait::async_trait]
impl AgentTransport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn call(&self, request: AgentRequest) -> Result<AgentResponse> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let scripted = self
            .scripted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match scripted {
            Some(ScriptedReply::Ok(result)) => Ok(AgentResponse {
                result,
                execution_time_ms: 0,
                agent: request.agent,
                request_id: request.request_id,
            }),
            Some(ScriptedReply::NetworkError(msg)) => Err(Error::Network(msg)),
            Some(ScriptedReply::Timeout(ms)) => Err(Error::Timeout(ms)),
            Some(ScriptedReply::AgentError(msg)) => Err(Error::Agent(msg)),
            None => Ok(AgentResponse {
                result: offline_result(request.agent, request.task),
                execution_time_ms: 0,
                agent: request.agent,
                request_id: request.request_id,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(agent: AgentId, task: TaskKind) -> AgentRequest {
        AgentRequest::new(agent, task, serde_json::json!({}))
    }

    #[tokio::test]
    async fn test_offline_response_is_deterministic() {
        let mock = MockTransport::new();
        let a = mock
            .call(request(AgentId::Developer, TaskKind::Implementation))
            .await
            .unwrap();
        let b = mock
            .call(request(AgentId::Developer, TaskKind::Implementation))
            .await
            .unwrap();
        assert_eq!(a.result, b.result);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_scripted_replies_consumed_in_order() {
        let mock = MockTransport::new();
        mock.push(ScriptedReply::NetworkError("connection refused".into()));
        mock.push(ScriptedReply::Ok(serde_json::json!({"done": true})));

        let err = mock
            .call(request(AgentId::Qa, TaskKind::TestCreation))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Network(_)));

        let ok = mock
            .call(request(AgentId::Qa, TaskKind::TestCreation))
            .await
            .unwrap();
        assert_eq!(ok.result["done"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn test_received_records_requests() {
        let mock = MockTransport::new();
        mock.call(request(AgentId::Architect, TaskKind::Design))
            .await
            .unwrap();
        let received = mock.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].agent, AgentId::Architect);
    }

    #[tokio::test]
    async fn test_default_stream_yields_final_response() {
        let mock = MockTransport::new();
        let (mut events, response) = mock
            .open_stream(request(AgentId::Pm, TaskKind::Planning))
            .await
            .unwrap();
        assert_eq!(response.agent, AgentId::Pm);
        assert!(events.recv().await.is_none());
    }
}
