//! Envelope types carried through the dispatcher queue.

use tokio::sync::oneshot;

use crate::cancellation::CancellationToken;
use crate::message::AnyMessage;
use crate::types::{AgentId, Result, TopicId};

/// Context handed to an agent's `on_message` alongside the payload.
#[derive(Debug, Clone)]
pub struct MessageContext {
    pub sender: Option<AgentId>,
    pub topic_id: Option<TopicId>,
    pub is_rpc: bool,
    pub cancellation_token: CancellationToken,
    pub message_id: String,
}

/// A point-to-point request awaiting exactly one response.
#[derive(Debug)]
pub struct SendEnvelope {
    pub message: AnyMessage,
    pub sender: Option<AgentId>,
    pub recipient: AgentId,
    pub message_id: String,
    pub cancellation_token: CancellationToken,
    pub result_handle: oneshot::Sender<Result<AnyMessage>>,
}

/// A fan-out broadcast to every subscriber of a topic. Carries no single
/// result handle: each recipient's response (if any) is discarded, matching
/// spec.md's publish semantics.
#[derive(Debug)]
pub struct PublishEnvelope {
    pub message: AnyMessage,
    pub sender: Option<AgentId>,
    pub topic_id: TopicId,
    pub message_id: String,
    pub cancellation_token: CancellationToken,
}

/// The reply to a previously-sent `SendEnvelope`, carrying the result back
/// to the original caller's `result_handle`.
#[derive(Debug)]
pub struct ResponseEnvelope {
    pub message: Result<AnyMessage>,
    pub sender: AgentId,
    pub recipient: Option<AgentId>,
    pub result_handle: oneshot::Sender<Result<AnyMessage>>,
}

/// The three shapes of work the dispatcher loop pulls off the queue.
#[derive(Debug)]
pub enum Envelope {
    Send(SendEnvelope),
    Publish(PublishEnvelope),
    Response(ResponseEnvelope),
}
