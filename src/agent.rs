//! The `Agent` trait and its lazy-construction factories.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use async_trait::async_trait;
use serde_json::Map as JsonMap;

use crate::message::AnyMessage;
use crate::runtime::AgentRuntime;
use crate::types::{AgentId, Result};

/// Static, agent-supplied description metadata. Agent implementations may
/// return a fixed value here; it has no bearing on routing.
#[derive(Debug, Clone, Default)]
pub struct AgentMetadata {
    pub description: String,
}

/// A single participant in the runtime. Not `Send`: the runtime drives
/// every agent from one cooperative, single-threaded event loop, so there
/// is never a need to move an agent instance across threads.
#[async_trait(?Send)]
pub trait Agent: std::any::Any + std::fmt::Debug {
    fn id(&self) -> &AgentId;

    fn metadata(&self) -> AgentMetadata {
        AgentMetadata::default()
    }

    /// Downcasting hook for `register_factory`'s and
    /// `try_get_underlying_agent_instance`'s `expected_class` checks.
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    /// Handle one message delivered by send or publish. `is_rpc` on the
    /// accompanying `MessageContext` distinguishes the two: a publish
    /// delivery's return value is discarded by the runtime. The message is
    /// borrowed rather than owned so a publish fan-out can lend the same
    /// payload to every subscriber without requiring message types to
    /// implement `Clone`.
    async fn on_message(
        &mut self,
        message: &AnyMessage,
        ctx: &crate::envelope::MessageContext,
    ) -> Result<AnyMessage>;

    /// Snapshot internal state as a JSON object. The default implementation
    /// returns an empty map, i.e. "nothing to save".
    async fn save_state(&self) -> Result<JsonMap<String, serde_json::Value>> {
        Ok(JsonMap::new())
    }

    /// Restore internal state from a previously-saved snapshot. The default
    /// implementation ignores the input.
    async fn load_state(&mut self, _state: &JsonMap<String, serde_json::Value>) -> Result<()> {
        Ok(())
    }
}

type BoxedAgent = Box<dyn Agent>;
type FactoryFuture = Pin<Box<dyn Future<Output = Result<BoxedAgent>>>>;

/// Agent factories are always deferred — called the first time an
/// `AgentId` is addressed, never eagerly at registration time. This
/// matches the original implementation's own design note that a factory
/// is "a promise, not a constructor call".
#[derive(Clone)]
pub(crate) enum RegisteredFactory {
    /// Zero-argument factory: `Fn(AgentId) -> Future<Output = Result<Agent>>`.
    /// The common case; most agents don't need a runtime handle.
    Nullary(Rc<dyn Fn(AgentId) -> FactoryFuture>),
    /// Two-argument factory taking a runtime handle as well as the id.
    /// Spec.md marks this arity deprecated; kept for agents that must send
    /// messages from within their own constructor.
    WithContext(Rc<dyn Fn(AgentRuntime, AgentId) -> FactoryFuture>),
}

impl std::fmt::Debug for RegisteredFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nullary(_) => write!(f, "RegisteredFactory::Nullary"),
            Self::WithContext(_) => write!(f, "RegisteredFactory::WithContext"),
        }
    }
}

impl RegisteredFactory {
    pub(crate) fn invoke(&self, runtime: AgentRuntime, id: AgentId) -> FactoryFuture {
        match self {
            Self::Nullary(f) => f(id),
            Self::WithContext(f) => f(runtime, id),
        }
    }
}

/// Wrap a nullary constructor function as a `RegisteredFactory`.
pub(crate) fn nullary_factory<F, Fut>(f: F) -> RegisteredFactory
where
    F: Fn(AgentId) -> Fut + 'static,
    Fut: Future<Output = Result<BoxedAgent>> + 'static,
{
    RegisteredFactory::Nullary(Rc::new(move |id| Box::pin(f(id))))
}

/// Wrap a `(runtime, id)` constructor function as a `RegisteredFactory`.
pub(crate) fn context_factory<F, Fut>(f: F) -> RegisteredFactory
where
    F: Fn(AgentRuntime, AgentId) -> Fut + 'static,
    Fut: Future<Output = Result<BoxedAgent>> + 'static,
{
    RegisteredFactory::WithContext(Rc::new(move |rt, id| Box::pin(f(rt, id))))
}
