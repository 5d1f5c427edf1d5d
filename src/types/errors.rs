//! Application error types.
//!
//! All errors use `thiserror` for automatic `Error` trait derivation and
//! carry enough context to log directly.

use thiserror::Error;

/// Runtime result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the runtime's public API.
#[derive(Error, Debug)]
pub enum Error {
    /// `send_message` targeted an agent type with no registered factory.
    #[error("recipient not found: {0}")]
    RecipientNotFound(String),

    /// An agent id was looked up (e.g. via `try_get_underlying_agent_instance`)
    /// but no instance exists and none can be lazily constructed.
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    /// `register`/`register_with_context` called twice for the same agent type.
    #[error("agent type already registered: {0}")]
    DuplicateType(String),

    /// A factory was registered or invoked with the wrong arity.
    #[error("factory arity error: {0}")]
    FactoryArity(String),

    /// A factory constructed an agent whose `id()` didn't match the
    /// identity it was asked to build.
    #[error("factory type mismatch: {0}")]
    FactoryTypeMismatch(String),

    /// An intervention handler returned `DropMessage`.
    #[error("message dropped by intervention: {0}")]
    MessageDropped(String),

    /// The envelope's cancellation token fired before a result was produced.
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// An agent or intervention handler panicked, or returned an error.
    #[error("handler error: {0}")]
    HandlerError(String),

    /// An API method was called outside the lifecycle state it requires
    /// (e.g. `send_message` after `stop()`, `stop_when_idle` before `start()`).
    #[error("lifecycle misuse: {0}")]
    LifecycleMisuse(String),

    /// State snapshot/restore round-tripped through `serde_json` and failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An `AgentType`/`AgentId`/`TopicId` was constructed or parsed from a
    /// malformed string. Not named in spec.md's error table, which never
    /// discusses malformed identifiers directly.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// `add_subscription` called with an `id` already registered. Not named
    /// in spec.md's error table (§4.2 just says "rejected with an error"
    /// without naming the kind), ambient addition alongside `InvalidIdentifier`.
    #[error("duplicate subscription: {0}")]
    DuplicateSubscription(String),

    /// `remove_subscription` called with an `id` that isn't registered.
    #[error("subscription not found: {0}")]
    SubscriptionNotFound(String),
}

impl Error {
    pub fn recipient_not_found(msg: impl Into<String>) -> Self {
        Self::RecipientNotFound(msg.into())
    }

    pub fn agent_not_found(msg: impl Into<String>) -> Self {
        Self::AgentNotFound(msg.into())
    }

    pub fn duplicate_type(msg: impl Into<String>) -> Self {
        Self::DuplicateType(msg.into())
    }

    pub fn factory_arity(msg: impl Into<String>) -> Self {
        Self::FactoryArity(msg.into())
    }

    pub fn factory_type_mismatch(msg: impl Into<String>) -> Self {
        Self::FactoryTypeMismatch(msg.into())
    }

    pub fn message_dropped(msg: impl Into<String>) -> Self {
        Self::MessageDropped(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    pub fn handler_error(msg: impl Into<String>) -> Self {
        Self::HandlerError(msg.into())
    }

    pub fn lifecycle_misuse(msg: impl Into<String>) -> Self {
        Self::LifecycleMisuse(msg.into())
    }

    pub fn invalid_identifier(msg: impl Into<String>) -> Self {
        Self::InvalidIdentifier(msg.into())
    }

    pub fn duplicate_subscription(msg: impl Into<String>) -> Self {
        Self::DuplicateSubscription(msg.into())
    }

    pub fn subscription_not_found(msg: impl Into<String>) -> Self {
        Self::SubscriptionNotFound(msg.into())
    }
}
