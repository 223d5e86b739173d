//! Agent transport trait
//!
//! The single seam between Strategos and whatever carries requests to the
//! remote agents. Production deployments plug in an RPC client; tests and
//! offline operation use [`crate::MockTransport`].

use crate::error::Result;
use crate::types::{AgentEvent, AgentRequest, AgentResponse};
use tokio::sync::mpsc;

/// Receiver half of a duplex agent event channel.
///
/// Events arrive in the order the agent emitted them; the channel closing
/// means the operation finished (or the transport dropped).
pub type EventStream = mpsc::Receiver<AgentEvent>;

/// Transport over which agent requests travel.
#[async_trait::async_trait]
pub trait AgentTransport: Send + Sync {
    /// Human-readable transport name, used in logs
    fn name(&self) -> &str;

    /// Perform a request/response call to an agent.
    async fn call(&self, request: AgentRequest) -> Result<AgentResponse>;

    /// Open a duplex stream for a long-running operation.
    ///
    /// The default implementation performs a plain call and yields no
    /// intermediate events; transports with true streaming support override
    /// this.
    async fn open_stream(&self, request: AgentRequest) -> Result<(EventStream, AgentResponse)> {
        let (_tx, rx) = mpsc::channel(1);
        let response = self.call(request).await?;
        Ok((rx, response))
    }
}
