//! Intervention pipeline: ordered middleware that observes, transforms, or
//! drops an envelope before it reaches the subscription/delivery stage.

use async_trait::async_trait;

use crate::message::AnyMessage;
use crate::types::AgentId;

/// Sentinel returned by an intervention handler to drop the in-flight
/// envelope. Carries a human-readable reason surfaced in
/// `Error::MessageDropped`.
#[derive(Debug, Clone)]
pub struct DropMessage(pub String);

impl DropMessage {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// The outcome of running one intervention handler over one message.
#[derive(Debug)]
pub enum InterventionOutcome {
    /// Continue the pipeline with (possibly transformed) message.
    Continue(AnyMessage),
    /// Stop the pipeline; drop the envelope and settle any waiting result
    /// with `Error::MessageDropped`.
    Drop(DropMessage),
}

/// Middleware invoked on every send and every publish delivery before the
/// recipient agent sees the message. Handlers run in registration order;
/// the first one that returns `Drop` ends the pipeline for that envelope.
#[async_trait(?Send)]
pub trait InterventionHandler: std::fmt::Debug {
    async fn on_send(
        &self,
        message: AnyMessage,
        sender: Option<&AgentId>,
        recipient: &AgentId,
    ) -> InterventionOutcome {
        let _ = (sender, recipient);
        InterventionOutcome::Continue(message)
    }

    async fn on_publish(
        &self,
        message: AnyMessage,
        sender: Option<&AgentId>,
        topic: &crate::types::TopicId,
    ) -> InterventionOutcome {
        let _ = (sender, topic);
        InterventionOutcome::Continue(message)
    }

    async fn on_response(
        &self,
        message: AnyMessage,
        sender: &AgentId,
        recipient: Option<&AgentId>,
    ) -> InterventionOutcome {
        let _ = (sender, recipient);
        InterventionOutcome::Continue(message)
    }
}

/// Run every registered handler in order over an outgoing `on_send` message,
/// returning the final (possibly transformed) message or the first `Drop`.
pub(crate) async fn run_send_pipeline(
    handlers: &[std::rc::Rc<dyn InterventionHandler>],
    mut message: AnyMessage,
    sender: Option<&AgentId>,
    recipient: &AgentId,
) -> InterventionOutcome {
    for handler in handlers {
        match handler.on_send(message, sender, recipient).await {
            InterventionOutcome::Continue(m) => message = m,
            drop @ InterventionOutcome::Drop(_) => return drop,
        }
    }
    InterventionOutcome::Continue(message)
}

pub(crate) async fn run_publish_pipeline(
    handlers: &[std::rc::Rc<dyn InterventionHandler>],
    mut message: AnyMessage,
    sender: Option<&AgentId>,
    topic: &crate::types::TopicId,
) -> InterventionOutcome {
    for handler in handlers {
        match handler.on_publish(message, sender, topic).await {
            InterventionOutcome::Continue(m) => message = m,
            drop @ InterventionOutcome::Drop(_) => return drop,
        }
    }
    InterventionOutcome::Continue(message)
}

pub(crate) async fn run_response_pipeline(
    handlers: &[std::rc::Rc<dyn InterventionHandler>],
    mut message: AnyMessage,
    sender: &AgentId,
    recipient: Option<&AgentId>,
) -> InterventionOutcome {
    for handler in handlers {
        match handler.on_response(message, sender, recipient).await {
            InterventionOutcome::Continue(m) => message = m,
            drop @ InterventionOutcome::Drop(_) => return drop,
        }
    }
    InterventionOutcome::Continue(message)
}
