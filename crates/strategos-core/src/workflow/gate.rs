//! Confirmation gate for high-risk pauses
//!
//! When pre-analysis flags an operation, execution parks here on a oneshot
//! channel until the caller answers or the timeout runs out. An unanswered
//! request is denied: a workflow never proceeds into a flagged operation
//! just because nobody was watching.

use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{info, warn};
use uuid::Uuid;

struct PendingConfirmation {
    request_id: Uuid,
    sender: oneshot::Sender<bool>,
}

/// Parks workflows that need sign-off before continuing.
pub struct ConfirmationGate {
    pending: DashMap<Uuid, PendingConfirmation>,
    timeout: Duration,
}

impl ConfirmationGate {
    /// Create a gate whose unanswered requests are denied after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            timeout,
        }
    }

    /// Register a confirmation request for a workflow.
    ///
    /// Returns the request id to surface to callers and the receiver to
    /// pass to [`ConfirmationGate::wait`]. A second request for the same
    /// workflow displaces the first, denying it.
    pub fn request(&self, workflow_id: Uuid) -> (Uuid, oneshot::Receiver<bool>) {
        let (sender, receiver) = oneshot::channel();
        let request_id = Uuid::new_v4();
        self.pending.insert(
            workflow_id,
            PendingConfirmation { request_id, sender },
        );
        (request_id, receiver)
    }

    /// Wait for the decision. A timeout or a dropped request denies.
    pub async fn wait(&self, workflow_id: Uuid, receiver: oneshot::Receiver<bool>) -> bool {
        let decision = match tokio::time::timeout(self.timeout, receiver).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(_)) => false,
            Err(_) => {
                warn!(%workflow_id, "confirmation timed out, denying");
                false
            }
        };
        self.pending.remove(&workflow_id);
        decision
    }

    /// Answer a pending request.
    ///
    /// Returns false when nothing was waiting for this workflow, or when
    /// the waiter already gave up.
    pub fn resolve(&self, workflow_id: Uuid, proceed: bool) -> bool {
        match self.pending.remove(&workflow_id) {
            Some((_, confirmation)) => {
                info!(
                    %workflow_id,
                    request_id = %confirmation.request_id,
                    proceed,
                    "confirmation resolved"
                );
                confirmation.sender.send(proceed).is_ok()
            }
            None => false,
        }
    }

    /// Drop a pending request without answering; the waiter sees a denial.
    pub fn clear(&self, workflow_id: Uuid) {
        self.pending.remove(&workflow_id);
    }

    /// Number of unresolved requests.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
