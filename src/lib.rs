//! # agent-runtime — a single-threaded, cooperative agent messaging runtime
//!
//! Routes typed messages between stateful agents via point-to-point
//! send/response and topic-based publish, with lifecycle control, lazy
//! agent instantiation, subscription-based routing, and an intervention
//! pipeline that can observe, transform, or drop any in-flight message.
//!
//! ## Concurrency model
//!
//! [`AgentRuntime`](runtime::AgentRuntime) is not `Send`/`Sync`. It must be
//! driven on a single OS thread inside a [`tokio::task::LocalSet`] — either
//! directly under `#[tokio::main(flavor = "current_thread")]`, or on a
//! dedicated thread running its own current-thread `Runtime` + `LocalSet`
//! when embedding this crate inside a larger multi-threaded program:
//!
//! ```ignore
//! let local = tokio::task::LocalSet::new();
//! local.run_until(async {
//!     let runtime = agent_runtime::AgentRuntime::new();
//!     runtime.start()?;
//!     // ... register agents, send/publish messages ...
//!     runtime.stop_when_idle().await
//! }).await?;
//! ```
//!
//! No shared state here is guarded by a mutex: everything lives on one
//! thread, so there is nothing to contend over.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod agent;
pub mod cancellation;
pub mod envelope;
pub mod intervention;
pub mod message;
pub mod queue;
pub mod runtime;
pub mod subscription;
pub mod types;

// Internal utilities.
mod recovery;
pub mod observability;

pub use agent::{Agent, AgentMetadata};
pub use cancellation::CancellationToken;
pub use envelope::MessageContext;
pub use intervention::{DropMessage, InterventionHandler, InterventionOutcome};
pub use message::AnyMessage;
pub use runtime::AgentRuntime;
pub use subscription::{Subscription, SubscriptionManager};
pub use types::{AgentId, AgentType, Error, Result, RuntimeConfig, TopicId};
