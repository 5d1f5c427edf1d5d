//! Strongly-typed identifiers for agents and topics.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{Error, Result};

/// The type of an agent, e.g. `"greeter"`. Distinct agent instances sharing
/// a type are distinguished by their `key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentType(String);

impl AgentType {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::invalid_identifier("AgentType cannot be empty"));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A concrete agent identity: a type plus an instance key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId {
    pub agent_type: AgentType,
    pub key: String,
}

impl AgentId {
    pub fn new(agent_type: AgentType, key: impl Into<String>) -> Self {
        Self {
            agent_type,
            key: key.into(),
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.agent_type, self.key)
    }
}

impl FromStr for AgentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (ty, key) = s
            .split_once('/')
            .ok_or_else(|| Error::invalid_identifier(format!("malformed agent id: {s}")))?;
        Ok(Self {
            agent_type: AgentType::new(ty.to_string())?,
            key: key.to_string(),
        })
    }
}

/// A topic identity: a topic type plus a scoping source, e.g. the
/// publisher's agent key. Two `TopicId`s are equal iff both fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicId {
    pub topic_type: String,
    pub source: String,
}

impl TopicId {
    pub fn new(topic_type: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            topic_type: topic_type.into(),
            source: source.into(),
        }
    }

    /// A topic scoped to the default source, matching the original
    /// implementation's `TopicId(type, "default")` convenience constructor.
    pub fn with_default_source(topic_type: impl Into<String>) -> Self {
        Self::new(topic_type, "default")
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.topic_type, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id_fragment() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z0-9_-]{0,15}".prop_map(|s| s)
    }

    proptest! {
        #[test]
        fn agent_id_display_parse_round_trips(ty in id_fragment(), key in id_fragment()) {
            let id = AgentId::new(AgentType::new(ty).unwrap(), key);
            let rendered = id.to_string();
            let parsed: AgentId = rendered.parse().unwrap();
            prop_assert_eq!(parsed, id);
        }
    }

    #[test]
    fn malformed_agent_id_rejected() {
        assert!("no-slash-here".parse::<AgentId>().is_err());
    }
}
