//! The agent runtime: public API, registration, and shared state.
//!
//! `AgentRuntime` is a cheap `Clone`-able handle around `Rc<RefCell<..>>`
//! state. It is not `Send`/`Sync` and must be driven inside a
//! `tokio::task::LocalSet` — typically via
//! `#[tokio::main(flavor = "current_thread")]`, or a dedicated
//! `std::thread` running a current-thread `Runtime` + `LocalSet` when
//! embedding this crate inside a larger multi-threaded program. No shared
//! state here is guarded by a mutex: everything lives on one thread, so a
//! mutex would only add overhead spec.md explicitly calls unnecessary.

mod delivery;
mod dispatcher;
mod lifecycle;

pub use lifecycle::RunContext;

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use serde_json::{Map as JsonMap, Value};
use tokio::sync::oneshot;

use crate::agent::{context_factory, nullary_factory, Agent, AgentMetadata, RegisteredFactory};
use crate::cancellation::CancellationToken;
use crate::envelope::{Envelope, MessageContext, PublishEnvelope, SendEnvelope};
use crate::intervention::InterventionHandler;
use crate::message::AnyMessage;
use crate::queue::EnvelopeQueue;
use crate::subscription::{Subscription, SubscriptionManager};
use crate::types::{AgentId, AgentType, Error, Result, RuntimeConfig, TopicId};

/// Marker trait for a registered wire-format serializer. The runtime stores
/// these but never invokes them: a serialization registry's actual wire
/// format is out of scope, matching spec.md's Non-goals. `add_message_serializer`
/// exists purely so the runtime's external surface matches spec.md §6.
pub trait MessageSerializer: std::fmt::Debug {}

struct Inner {
    factories: HashMap<AgentType, RegisteredFactory>,
    instances: HashMap<AgentId, Rc<tokio::sync::Mutex<Box<dyn Agent>>>>,
    subscriptions: SubscriptionManager,
    interventions: Vec<Rc<dyn InterventionHandler>>,
    serializers: Vec<Box<dyn MessageSerializer>>,
    warned_deprecated_arity: std::collections::HashSet<AgentType>,
    config: RuntimeConfig,
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inner")
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .field("instances", &self.instances.len())
            .finish()
    }
}

/// A cheap, `Clone`-able handle to the runtime's shared state.
#[derive(Debug, Clone)]
pub struct AgentRuntime {
    inner: Rc<RefCell<Inner>>,
    /// Indirected through a `RefCell` so `stop()` can swap in a fresh queue
    /// for a possible future `start()`, per spec.md §4.9 — a bare `Rc`
    /// can't be replaced through a shared handle.
    queue: Rc<RefCell<Rc<EnvelopeQueue<Envelope>>>>,
    /// Indirected for the same reason: `stop()` replaces the run context so
    /// `started`/`stop_requested` don't permanently latch after one stop.
    run: Rc<RefCell<Rc<RunContext>>>,
}

impl AgentRuntime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                factories: HashMap::new(),
                instances: HashMap::new(),
                subscriptions: SubscriptionManager::new(),
                interventions: Vec::new(),
                serializers: Vec::new(),
                warned_deprecated_arity: std::collections::HashSet::new(),
                config,
            })),
            queue: Rc::new(RefCell::new(Rc::new(EnvelopeQueue::new()))),
            run: Rc::new(RefCell::new(Rc::new(RunContext::new()))),
        }
    }

    pub(crate) fn queue(&self) -> Rc<EnvelopeQueue<Envelope>> {
        self.queue.borrow().clone()
    }

    pub(crate) fn run_context(&self) -> Rc<RunContext> {
        self.run.borrow().clone()
    }

    /// Replace the queue and run context with fresh ones, so a runtime that
    /// has been `stop()`-ped can be `start()`-ed again. See `lifecycle::stop`.
    pub(crate) fn reset_for_restart(&self) {
        *self.queue.borrow_mut() = Rc::new(EnvelopeQueue::new());
        *self.run.borrow_mut() = Rc::new(RunContext::new());
    }

    /// Register a nullary factory for `agent_type`, installing each of
    /// `subscriptions` first (spec.md §4.3/§6's `register(type, factory,
    /// subscriptions?)`). Fails with `Error::DuplicateSubscription` if any
    /// subscription's id collides with one already registered, or with
    /// `Error::DuplicateType` if a factory (of either arity) is already
    /// registered for `agent_type` — matching the original implementation's
    /// `register`, which installs subscriptions before recording the
    /// factory, so a subscription failure leaves the type unregistered.
    pub fn register<F, Fut>(
        &self,
        agent_type: AgentType,
        factory: F,
        subscriptions: Vec<Box<dyn Subscription>>,
    ) -> Result<()>
    where
        F: Fn(AgentId) -> Fut + 'static,
        Fut: Future<Output = Result<Box<dyn Agent>>> + 'static,
    {
        for subscription in subscriptions {
            self.add_subscription(subscription)?;
        }
        self.install_factory(agent_type, nullary_factory(factory))
    }

    /// Register a two-argument factory receiving a runtime handle alongside
    /// the identity being constructed. Deprecated per spec.md §3/§9: prefer
    /// `register`, which covers nearly every agent. Kept for agents that
    /// must address the runtime from within their own constructor.
    pub fn register_with_context<F, Fut>(&self, agent_type: AgentType, factory: F) -> Result<()>
    where
        F: Fn(AgentRuntime, AgentId) -> Fut + 'static,
        Fut: Future<Output = Result<Box<dyn Agent>>> + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        if inner.config.warn_on_deprecated_factory_arity
            && inner.warned_deprecated_arity.insert(agent_type.clone())
        {
            tracing::warn!(
                target: "runtime",
                agent_type = %agent_type,
                "register_with_context is deprecated; prefer register()"
            );
        }
        drop(inner);
        self.install_factory(agent_type, context_factory(factory))
    }

    /// The stricter form of `register` (spec.md §4.3/§6): the factory's
    /// produced instance must have concrete type `T`, the `expected_class`
    /// spec.md refers to, realized here as a type parameter rather than a
    /// runtime value since Rust has no reified class objects. A mismatch is
    /// detected the first time `agent_type` is addressed, raising
    /// `Error::FactoryTypeMismatch`, mirroring the original implementation's
    /// `register_factory`, which wraps the user factory in a checking
    /// closure rather than validating at registration time (registration
    /// happens before any instance exists to check).
    pub fn register_factory<T, F, Fut>(&self, agent_type: AgentType, factory: F) -> Result<()>
    where
        T: Agent + 'static,
        F: Fn(AgentId) -> Fut + 'static,
        Fut: Future<Output = Result<Box<dyn Agent>>> + 'static,
    {
        let checked = move |id: AgentId| {
            let fut = factory(id);
            async move {
                let agent = fut.await?;
                if agent.as_any().type_id() != std::any::TypeId::of::<T>() {
                    return Err(Error::factory_type_mismatch(format!(
                        "factory for {} produced an agent that isn't {}",
                        agent.id(),
                        std::any::type_name::<T>()
                    )));
                }
                Ok(agent)
            }
        };
        self.install_factory(agent_type, nullary_factory(checked))
    }

    pub(crate) fn install_factory(
        &self,
        agent_type: AgentType,
        factory: RegisteredFactory,
    ) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.factories.contains_key(&agent_type) {
            return Err(Error::duplicate_type(agent_type.to_string()));
        }
        inner.factories.insert(agent_type, factory);
        Ok(())
    }

    /// Add `subscription`. Fails with `Error::DuplicateSubscription` if its
    /// id is already registered (spec.md §4.2).
    pub fn add_subscription(&self, subscription: Box<dyn Subscription>) -> Result<()> {
        self.inner.borrow_mut().subscriptions.add(subscription)
    }

    /// Remove the subscription with `subscription_id`. Fails with
    /// `Error::SubscriptionNotFound` if no such id is registered (spec.md §4.2).
    pub fn remove_subscription(&self, subscription_id: &str) -> Result<()> {
        self.inner.borrow_mut().subscriptions.remove(subscription_id)
    }

    pub fn add_intervention_handler(&self, handler: Rc<dyn InterventionHandler>) {
        self.inner.borrow_mut().interventions.push(handler);
    }

    /// Register a wire-format serializer. Stored but never invoked — see
    /// `MessageSerializer`'s doc comment.
    pub fn add_message_serializer(&self, serializer: Box<dyn MessageSerializer>) {
        self.inner.borrow_mut().serializers.push(serializer);
    }

    /// Send a point-to-point message and await the recipient's response.
    /// Fails immediately with `Error::RecipientNotFound` if no factory is
    /// registered for the recipient's agent type — the check happens
    /// synchronously, before the envelope is ever enqueued, so there is no
    /// risk of the queue's background delivery task trying to settle an
    /// already-failed result a second time.
    pub async fn send_message(
        &self,
        message: AnyMessage,
        recipient: AgentId,
        sender: Option<AgentId>,
        cancellation_token: Option<CancellationToken>,
    ) -> Result<AnyMessage> {
        if !self.inner.borrow().factories.contains_key(&recipient.agent_type) {
            return Err(Error::recipient_not_found(recipient.to_string()));
        }

        let (tx, rx) = oneshot::channel();
        let token = cancellation_token.unwrap_or_default();
        let envelope = SendEnvelope {
            message,
            sender,
            recipient,
            message_id: uuid::Uuid::new_v4().to_string(),
            cancellation_token: token,
            result_handle: tx,
        };
        self.queue().put(Envelope::Send(envelope));

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::handler_error(
                "result sender dropped without settling (runtime stopped?)",
            )),
        }
    }

    /// Publish a message to every subscriber of `topic`. Fire-and-forget:
    /// resolves once the envelope has been enqueued, not once delivered.
    pub async fn publish_message(
        &self,
        message: AnyMessage,
        topic_id: TopicId,
        sender: Option<AgentId>,
        cancellation_token: Option<CancellationToken>,
    ) -> Result<()> {
        let envelope = PublishEnvelope {
            message,
            sender,
            topic_id,
            message_id: uuid::Uuid::new_v4().to_string(),
            cancellation_token: cancellation_token.unwrap_or_default(),
        };
        self.queue().put(Envelope::Publish(envelope));
        Ok(())
    }

    /// Metadata for `id`, lazily constructing the agent if necessary.
    pub async fn agent_metadata(&self, id: &AgentId) -> Result<AgentMetadata> {
        let instance = self.get_or_create(id).await?;
        let metadata = instance.lock().await.metadata();
        Ok(metadata)
    }

    pub async fn agent_save_state(&self, id: &AgentId) -> Result<JsonMap<String, Value>> {
        let instance = self.get_or_create(id).await?;
        let state = instance.lock().await.save_state().await?;
        Ok(state)
    }

    pub async fn agent_load_state(
        &self,
        id: &AgentId,
        state: &JsonMap<String, Value>,
    ) -> Result<()> {
        let instance = self.get_or_create(id).await?;
        instance.lock().await.load_state(state).await
    }

    /// Snapshot every currently-instantiated agent's state, keyed by the
    /// agent id's `Display` form. Agents never lazily constructed are not
    /// included, matching spec.md §4.10.
    pub async fn save_state(&self) -> Result<JsonMap<String, Value>> {
        let ids: Vec<AgentId> = self.inner.borrow().instances.keys().cloned().collect();
        let mut out = JsonMap::new();
        for id in ids {
            let state = self.agent_save_state(&id).await?;
            out.insert(id.to_string(), Value::Object(state));
        }
        Ok(out)
    }

    /// Restore every agent named in `snapshot`, lazily constructing each
    /// one first. Fails with `Error::InvalidIdentifier` if a key doesn't
    /// parse as an `AgentId`.
    pub async fn load_state(&self, snapshot: &JsonMap<String, Value>) -> Result<()> {
        for (key, value) in snapshot {
            let id: AgentId = key.parse()?;
            let state = value
                .as_object()
                .cloned()
                .unwrap_or_default();
            self.agent_load_state(&id, &state).await?;
        }
        Ok(())
    }

    /// Look up a cached instance without constructing one, checking that
    /// its concrete type is `T` — spec.md §6's
    /// `try_get_underlying_agent_instance(id, expected_class)`, with
    /// `expected_class` realized as a type parameter. Fails with
    /// `Error::AgentNotFound` if `id` has never been addressed, or with
    /// `Error::FactoryTypeMismatch` if the cached instance isn't a `T`.
    pub async fn try_get_underlying_agent_instance<T: Agent + 'static>(
        &self,
        id: &AgentId,
    ) -> Result<Rc<tokio::sync::Mutex<Box<dyn Agent>>>> {
        let instance = self
            .inner
            .borrow()
            .instances
            .get(id)
            .cloned()
            .ok_or_else(|| Error::agent_not_found(id.to_string()))?;
        let matches_type = instance.lock().await.as_any().type_id() == std::any::TypeId::of::<T>();
        if !matches_type {
            return Err(Error::factory_type_mismatch(format!(
                "instance for {} isn't {}",
                id,
                std::any::type_name::<T>()
            )));
        }
        Ok(instance)
    }

    /// Return the cached instance for `id`, lazily constructing it via its
    /// registered factory if this is the first time `id` has been
    /// addressed.
    pub async fn get(&self, id: &AgentId) -> Result<Rc<tokio::sync::Mutex<Box<dyn Agent>>>> {
        self.get_or_create(id).await
    }

    pub(crate) async fn get_or_create(
        &self,
        id: &AgentId,
    ) -> Result<Rc<tokio::sync::Mutex<Box<dyn Agent>>>> {
        if let Some(existing) = self.inner.borrow().instances.get(id).cloned() {
            return Ok(existing);
        }

        let factory = self
            .inner
            .borrow()
            .factories
            .get(&id.agent_type)
            .cloned()
            .ok_or_else(|| Error::agent_not_found(id.to_string()))?;

        let agent = factory.invoke(self.clone(), id.clone()).await?;
        if agent.id() != id {
            return Err(Error::factory_type_mismatch(format!(
                "factory for {} constructed agent with id {}",
                id, agent.id()
            )));
        }

        let cell = Rc::new(tokio::sync::Mutex::new(agent));
        self.inner
            .borrow_mut()
            .instances
            .insert(id.clone(), cell.clone());
        Ok(cell)
    }

    pub(crate) fn interventions(&self) -> Vec<Rc<dyn InterventionHandler>> {
        self.inner.borrow().interventions.clone()
    }

    pub(crate) fn subscription_recipients(&self, topic: &TopicId) -> Vec<AgentId> {
        self.inner.borrow().subscriptions.recipients(topic)
    }

    pub(crate) fn config_stop_when_period(&self) -> std::time::Duration {
        self.inner.borrow().config.stop_when_check_period
    }
}

impl Default for AgentRuntime {
    fn default() -> Self {
        Self::new()
    }
}
