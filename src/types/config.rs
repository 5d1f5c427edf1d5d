//! Runtime configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Knobs the runtime itself owns. Everything else (agent behavior,
/// subscription predicates, message contents) is the embedding
/// application's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Poll period for `stop_when`'s condition check.
    #[serde(with = "humantime_serde_compat", default = "default_stop_when_period")]
    pub stop_when_check_period: Duration,

    /// Emit a `tracing::warn!` the first time `register_with_context` is
    /// used for a given agent type, matching the original implementation's
    /// deprecation warning for the two-argument factory arity.
    #[serde(default = "default_true")]
    pub warn_on_deprecated_factory_arity: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            observability: ObservabilityConfig::default(),
            stop_when_check_period: default_stop_when_period(),
            warn_on_deprecated_factory_arity: true,
        }
    }
}

fn default_stop_when_period() -> Duration {
    Duration::from_secs(1)
}

fn default_true() -> bool {
    true
}

/// Observability configuration, matching the style (if not the content) of
/// the teacher crate's `ObservabilityConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Thin re-implementation of the one `humantime_serde` feature this crate
/// needs (serializing a `Duration` as seconds), so the crate doesn't carry
/// the `humantime-serde` dependency for a single field.
mod humantime_serde_compat {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
