//! Core types shared across the runtime.
//!
//! - **IDs**: `AgentType`, `AgentId`, `TopicId`.
//! - **Errors**: the `Error`/`Result` pair every fallible operation returns.
//! - **Config**: `RuntimeConfig` and its nested sections.

mod config;
mod errors;
mod ids;

pub use config::{ObservabilityConfig, RuntimeConfig};
pub use errors::{Error, Result};
pub use ids::{AgentId, AgentType, TopicId};
