//! Per-variant delivery: resolve the recipient(s), invoke their handler,
//! and settle or re-enqueue the result.

use tokio::sync::oneshot;

use crate::cancellation::CancellationToken;
use crate::envelope::{Envelope, MessageContext, ResponseEnvelope};
use crate::message::AnyMessage;
use crate::recovery::with_recovery_async;
use crate::types::{AgentId, Error, Result, TopicId};

use super::AgentRuntime;

/// Deliver a `SendEnvelope`'s (already-intercepted) message to its
/// recipient, then enqueue a `ResponseEnvelope` carrying the outcome so the
/// response pipeline's `on_response` intervention hook runs before the
/// original caller's `send_message` future is settled. On any failure that
/// occurs before a response can be produced, the caller's future is
/// settled directly and no `ResponseEnvelope` is enqueued.
pub(crate) async fn process_send(
    runtime: AgentRuntime,
    sender: Option<AgentId>,
    recipient: AgentId,
    message_id: String,
    cancellation_token: CancellationToken,
    message: AnyMessage,
    result_handle: oneshot::Sender<Result<AnyMessage>>,
) {
    if cancellation_token.is_cancelled() {
        let _ = result_handle.send(Err(Error::cancelled("cancelled before delivery")));
        runtime.queue().task_done();
        return;
    }

    let outcome = deliver_one(
        &runtime,
        &recipient,
        &message,
        MessageContext {
            sender: sender.clone(),
            topic_id: None,
            is_rpc: true,
            cancellation_token: cancellation_token.clone(),
            message_id,
        },
    )
    .await;

    match outcome {
        Ok(reply) => {
            runtime.queue().put(Envelope::Response(ResponseEnvelope {
                message: Ok(reply),
                sender: recipient,
                recipient: sender,
                result_handle,
            }));
        }
        Err(err) => {
            let _ = result_handle.send(Err(err));
        }
    }
    runtime.queue().task_done();
}

/// Fan a (already-intercepted) publish message out to every current
/// subscriber, excluding the publisher itself. Per-recipient errors are
/// logged, not propagated: publish is fire-and-forget, matching spec.md's
/// delivery semantics.
pub(crate) async fn process_publish(
    runtime: AgentRuntime,
    sender: Option<AgentId>,
    topic_id: TopicId,
    message: AnyMessage,
    message_id: String,
    cancellation_token: CancellationToken,
) {
    let recipients = runtime.subscription_recipients(&topic_id);
    for recipient in recipients {
        if Some(&recipient) == sender.as_ref() {
            continue;
        }
        let ctx = MessageContext {
            sender: sender.clone(),
            topic_id: Some(topic_id.clone()),
            is_rpc: false,
            cancellation_token: cancellation_token.clone(),
            message_id: message_id.clone(),
        };
        if let Err(err) = deliver_one(&runtime, &recipient, &message, ctx).await {
            tracing::warn!(
                target: "runtime.events",
                recipient = %recipient,
                topic = %topic_id,
                error = %err,
                "publish delivery failed"
            );
        }
    }
    runtime.queue().task_done();
}

async fn deliver_one(
    runtime: &AgentRuntime,
    recipient: &AgentId,
    message: &AnyMessage,
    ctx: MessageContext,
) -> Result<AnyMessage> {
    let instance = runtime.get_or_create(recipient).await?;
    let token = ctx.cancellation_token.clone();
    let operation_name = format!("{}::on_message", recipient);

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::cancelled(format!("cancelled during delivery to {recipient}"))),
        result = with_recovery_async(
            async {
                let mut agent = instance.lock().await;
                agent.on_message(message, &ctx).await
            },
            &operation_name,
        ) => result,
    }
}
