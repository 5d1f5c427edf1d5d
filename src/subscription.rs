//! Topic-based subscription routing.

use std::collections::HashSet;

use crate::types::{AgentId, Error, Result, TopicId};

/// A rule mapping published topics to a recipient agent identity.
/// Implementations decide both whether a topic matches (`matches`) and,
/// if so, which agent instance should receive it (`map_to_agent`) —
/// typically deriving the instance key from the topic's `source` field.
pub trait Subscription: std::fmt::Debug {
    /// A stable identifier for this subscription, used for removal and for
    /// de-duplication when the same subscription is added twice.
    fn id(&self) -> &str;

    fn matches(&self, topic: &TopicId) -> bool;

    fn map_to_agent(&self, topic: &TopicId) -> AgentId;
}

/// Owns the set of active subscriptions and resolves publish recipients.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    subscriptions: Vec<Box<dyn Subscription>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `subscription`. Fails with `Error::DuplicateSubscription` if
    /// its `id` is already registered, per spec.md §4.2.
    pub fn add(&mut self, subscription: Box<dyn Subscription>) -> Result<()> {
        if self.subscriptions.iter().any(|s| s.id() == subscription.id()) {
            return Err(Error::duplicate_subscription(subscription.id()));
        }
        self.subscriptions.push(subscription);
        Ok(())
    }

    /// Remove the subscription with `subscription_id`. Fails with
    /// `Error::SubscriptionNotFound` if no such id is registered, per
    /// spec.md §4.2.
    pub fn remove(&mut self, subscription_id: &str) -> Result<()> {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id() != subscription_id);
        if self.subscriptions.len() == before {
            return Err(Error::subscription_not_found(subscription_id));
        }
        Ok(())
    }

    /// All agent identities subscribed to `topic`, in first-registered
    /// order, with duplicate identities collapsed (the same agent can be
    /// reachable via more than one matching subscription but should only
    /// receive the message once).
    pub fn recipients(&self, topic: &TopicId) -> Vec<AgentId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for sub in &self.subscriptions {
            if sub.matches(topic) {
                let agent_id = sub.map_to_agent(topic);
                if seen.insert(agent_id.clone()) {
                    out.push(agent_id);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct TypeMatch {
        id: String,
        topic_type: String,
        agent_type: crate::types::AgentType,
    }

    impl Subscription for TypeMatch {
        fn id(&self) -> &str {
            &self.id
        }

        fn matches(&self, topic: &TopicId) -> bool {
            topic.topic_type == self.topic_type
        }

        fn map_to_agent(&self, topic: &TopicId) -> AgentId {
            AgentId::new(self.agent_type.clone(), topic.source.clone())
        }
    }

    fn agent_type(name: &str) -> crate::types::AgentType {
        crate::types::AgentType::new(name).unwrap()
    }

    #[test]
    fn recipients_dedups_preserving_order() {
        let mut mgr = SubscriptionManager::new();
        mgr.add(Box::new(TypeMatch {
            id: "a".into(),
            topic_type: "greet".into(),
            agent_type: agent_type("greeter"),
        }))
        .unwrap();
        mgr.add(Box::new(TypeMatch {
            id: "b".into(),
            topic_type: "greet".into(),
            agent_type: agent_type("greeter"),
        }))
        .unwrap();
        let topic = TopicId::with_default_source("greet");
        let recipients = mgr.recipients(&topic);
        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0], AgentId::new(agent_type("greeter"), "default"));
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut mgr = SubscriptionManager::new();
        mgr.add(Box::new(TypeMatch {
            id: "a".into(),
            topic_type: "greet".into(),
            agent_type: agent_type("greeter"),
        }))
        .unwrap();
        let err = mgr
            .add(Box::new(TypeMatch {
                id: "a".into(),
                topic_type: "other".into(),
                agent_type: agent_type("greeter"),
            }))
            .unwrap_err();
        assert!(matches!(err, crate::types::Error::DuplicateSubscription(_)));
    }

    #[test]
    fn remove_drops_matching_subscription() {
        let mut mgr = SubscriptionManager::new();
        mgr.add(Box::new(TypeMatch {
            id: "a".into(),
            topic_type: "greet".into(),
            agent_type: agent_type("greeter"),
        }))
        .unwrap();
        mgr.remove("a").unwrap();
        let err = mgr.remove("a").unwrap_err();
        assert!(matches!(err, crate::types::Error::SubscriptionNotFound(_)));
        assert!(mgr.recipients(&TopicId::with_default_source("greet")).is_empty());
    }

    #[test]
    fn non_matching_topic_has_no_recipients() {
        let mut mgr = SubscriptionManager::new();
        mgr.add(Box::new(TypeMatch {
            id: "a".into(),
            topic_type: "greet".into(),
            agent_type: agent_type("greeter"),
        }))
        .unwrap();
        assert!(mgr
            .recipients(&TopicId::with_default_source("other"))
            .is_empty());
    }

    proptest::proptest! {
        /// However many overlapping subscriptions map to the same agent,
        /// `recipients` never reports that agent more than once.
        #[test]
        fn recipients_never_duplicate_an_agent(n in 1usize..20) {
            let mut mgr = SubscriptionManager::new();
            for i in 0..n {
                mgr.add(Box::new(TypeMatch {
                    id: format!("sub-{i}"),
                    topic_type: "greet".into(),
                    agent_type: agent_type("greeter"),
                })).unwrap();
            }
            let topic = TopicId::with_default_source("greet");
            let recipients = mgr.recipients(&topic);
            let unique: std::collections::HashSet<_> = recipients.iter().collect();
            proptest::prop_assert_eq!(recipients.len(), unique.len());
            proptest::prop_assert!(recipients.len() <= 1);
        }
    }
}
