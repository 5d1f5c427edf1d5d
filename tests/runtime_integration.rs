//! End-to-end scenarios exercising the public runtime API.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;

use agent_runtime::{
    Agent, AgentId, AgentRuntime, AgentType, AnyMessage, CancellationToken, DropMessage, Error,
    InterventionHandler, InterventionOutcome, MessageContext, Result, Subscription, TopicId,
};

#[derive(Debug)]
struct EchoAgent {
    id: AgentId,
}

#[async_trait(?Send)]
impl Agent for EchoAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    async fn on_message(&mut self, message: &AnyMessage, _ctx: &MessageContext) -> Result<AnyMessage> {
        let text = message
            .downcast_ref::<String>()
            .expect("EchoAgent only handles String messages");
        Ok(AnyMessage::new(format!("echo: {text}")))
    }
}

fn echo_type() -> AgentType {
    AgentType::new("echo").unwrap()
}

#[tokio::test]
async fn s1_send_and_receive_echo() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let runtime = AgentRuntime::new();
            runtime
                .register(echo_type(), |id| async move { Ok(Box::new(EchoAgent { id }) as Box<dyn Agent>) }, Vec::new())
                .unwrap();
            runtime.start().unwrap();

            let reply = runtime
                .send_message(
                    AnyMessage::new("hello".to_string()),
                    AgentId::new(echo_type(), "a"),
                    None,
                    None,
                )
                .await
                .unwrap();

            let text: String = reply.downcast().unwrap();
            assert_eq!(text, "echo: hello");

            runtime.stop_when_idle().await.unwrap();
        })
        .await;
}

#[derive(Debug)]
struct CollectorAgent {
    id: AgentId,
    received: Rc<RefCell<Vec<String>>>,
}

#[async_trait(?Send)]
impl Agent for CollectorAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    async fn on_message(&mut self, message: &AnyMessage, _ctx: &MessageContext) -> Result<AnyMessage> {
        let text = message.downcast_ref::<String>().unwrap().clone();
        self.received.borrow_mut().push(text);
        Ok(AnyMessage::new(()))
    }
}

#[derive(Debug)]
struct FixedSubscription {
    id: String,
    topic_type: String,
    target: AgentId,
}

impl Subscription for FixedSubscription {
    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, topic: &TopicId) -> bool {
        topic.topic_type == self.topic_type
    }

    fn map_to_agent(&self, _topic: &TopicId) -> AgentId {
        self.target.clone()
    }
}

#[tokio::test]
async fn s2_publish_fans_out_without_self_delivery() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let runtime = AgentRuntime::new();
            let collector_type = AgentType::new("collector").unwrap();

            let alice = AgentId::new(collector_type.clone(), "alice");
            let bob = AgentId::new(collector_type.clone(), "bob");

            let alice_log = Rc::new(RefCell::new(Vec::new()));
            let bob_log = Rc::new(RefCell::new(Vec::new()));

            {
                let alice_log = alice_log.clone();
                let bob_log = bob_log.clone();
                runtime
                    .register(collector_type, move |id| {
                        let log = if id.key == "alice" {
                            alice_log.clone()
                        } else {
                            bob_log.clone()
                        };
                        async move { Ok(Box::new(CollectorAgent { id, received: log }) as Box<dyn Agent>) }
                    }, Vec::new())
                    .unwrap();
            }

            runtime
                .add_subscription(Box::new(FixedSubscription {
                    id: "to-alice".into(),
                    topic_type: "broadcast".into(),
                    target: alice.clone(),
                }))
                .unwrap();
            runtime
                .add_subscription(Box::new(FixedSubscription {
                    id: "to-bob".into(),
                    topic_type: "broadcast".into(),
                    target: bob.clone(),
                }))
                .unwrap();

            runtime.start().unwrap();

            runtime
                .publish_message(
                    AnyMessage::new("hi everyone".to_string()),
                    TopicId::with_default_source("broadcast"),
                    Some(alice.clone()),
                    None,
                )
                .await
                .unwrap();

            runtime.stop_when_idle().await.unwrap();

            assert!(alice_log.borrow().is_empty(), "publisher must not receive its own message");
            assert_eq!(bob_log.borrow().as_slice(), ["hi everyone".to_string()]);
        })
        .await;
}

#[derive(Debug)]
struct DropEverything;

#[async_trait(?Send)]
impl InterventionHandler for DropEverything {
    async fn on_send(
        &self,
        _message: AnyMessage,
        _sender: Option<&AgentId>,
        _recipient: &AgentId,
    ) -> InterventionOutcome {
        InterventionOutcome::Drop(DropMessage::new("blocked by policy"))
    }
}

#[tokio::test]
async fn s3_intervention_drops_send() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let runtime = AgentRuntime::new();
            runtime
                .register(echo_type(), |id| async move { Ok(Box::new(EchoAgent { id }) as Box<dyn Agent>) }, Vec::new())
                .unwrap();
            runtime.add_intervention_handler(Rc::new(DropEverything));
            runtime.start().unwrap();

            let result = runtime
                .send_message(
                    AnyMessage::new("hello".to_string()),
                    AgentId::new(echo_type(), "a"),
                    None,
                    None,
                )
                .await;

            assert!(matches!(result, Err(Error::MessageDropped(_))));
            runtime.stop_when_idle().await.unwrap();
        })
        .await;
}

#[tokio::test]
async fn s4_send_to_unregistered_type_fails_fast() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let runtime = AgentRuntime::new();
            runtime.start().unwrap();

            let unknown_type = AgentType::new("nobody-registered-this").unwrap();
            let result = runtime
                .send_message(
                    AnyMessage::new(1u32),
                    AgentId::new(unknown_type, "x"),
                    None,
                    None,
                )
                .await;

            assert!(matches!(result, Err(Error::RecipientNotFound(_))));
            runtime.stop_when_idle().await.unwrap();
        })
        .await;
}

#[derive(Debug)]
struct SlowAgent {
    id: AgentId,
}

#[async_trait(?Send)]
impl Agent for SlowAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    async fn on_message(&mut self, _message: &AnyMessage, _ctx: &MessageContext) -> Result<AnyMessage> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(AnyMessage::new(()))
    }
}

#[tokio::test]
async fn s5_cancellation_preempts_slow_handler() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let runtime = AgentRuntime::new();
            let slow_type = AgentType::new("slow").unwrap();
            runtime
                .register(slow_type.clone(), |id| async move {
                    Ok(Box::new(SlowAgent { id }) as Box<dyn Agent>)
                }, Vec::new())
                .unwrap();
            runtime.start().unwrap();

            let token = CancellationToken::new();
            let cancel_token = token.clone();
            tokio::task::spawn_local(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancel_token.cancel();
            });

            let result = runtime
                .send_message(
                    AnyMessage::new(()),
                    AgentId::new(slow_type, "a"),
                    None,
                    Some(token),
                )
                .await;

            assert!(matches!(result, Err(Error::Cancelled(_))));
            runtime.stop_when_idle().await.unwrap();
        })
        .await;
}

#[derive(Debug, Default)]
struct CounterAgent {
    id: Option<AgentId>,
    count: u64,
}

#[async_trait(?Send)]
impl Agent for CounterAgent {
    fn id(&self) -> &AgentId {
        self.id.as_ref().expect("id set at construction")
    }

    async fn on_message(&mut self, _message: &AnyMessage, _ctx: &MessageContext) -> Result<AnyMessage> {
        self.count += 1;
        Ok(AnyMessage::new(self.count))
    }

    async fn save_state(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        let mut map = serde_json::Map::new();
        map.insert("count".to_string(), serde_json::json!(self.count));
        Ok(map)
    }

    async fn load_state(&mut self, state: &serde_json::Map<String, serde_json::Value>) -> Result<()> {
        if let Some(count) = state.get("count").and_then(|v| v.as_u64()) {
            self.count = count;
        }
        Ok(())
    }
}

#[tokio::test]
async fn s6_state_round_trips_across_runtimes() {
    let counter_type = AgentType::new("counter").unwrap();
    let id = AgentId::new(counter_type.clone(), "only");

    let snapshot = {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let runtime = AgentRuntime::new();
                runtime
                    .register(counter_type.clone(), |id| async move {
                        Ok(Box::new(CounterAgent {
                            id: Some(id),
                            count: 0,
                        }) as Box<dyn Agent>)
                    }, Vec::new())
                    .unwrap();
                runtime.start().unwrap();

                for _ in 0..3 {
                    runtime
                        .send_message(AnyMessage::new(()), id.clone(), None, None)
                        .await
                        .unwrap();
                }

                let snapshot = runtime.save_state().await.unwrap();
                runtime.stop_when_idle().await.unwrap();
                snapshot
            })
            .await
    };

    let restored_count = {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let runtime = AgentRuntime::new();
                runtime
                    .register(counter_type.clone(), |id| async move {
                        Ok(Box::new(CounterAgent {
                            id: Some(id),
                            count: 0,
                        }) as Box<dyn Agent>)
                    }, Vec::new())
                    .unwrap();
                runtime.start().unwrap();

                runtime.load_state(&snapshot).await.unwrap();

                let reply = runtime
                    .send_message(AnyMessage::new(()), id.clone(), None, None)
                    .await
                    .unwrap();
                runtime.stop_when_idle().await.unwrap();
                reply.downcast::<u64>().unwrap()
            })
            .await
    };

    pretty_assertions::assert_eq!(restored_count, 4u64, "3 prior increments + 1 after restore");
}
