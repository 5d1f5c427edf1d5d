//! The message loop: pop one envelope, run interception, hand off delivery.

use crate::envelope::Envelope;
use crate::intervention::InterventionOutcome;
use crate::types::Error;

use super::delivery;
use super::AgentRuntime;

/// Spawn the dispatcher loop on the current `LocalSet`. Every iteration
/// that doesn't exit the loop ends in a `yield_now`, the Rust analogue of
/// the original implementation's `asyncio.sleep(0)` cooperative yield.
pub(crate) fn spawn(runtime: AgentRuntime) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_local(async move {
        loop {
            let envelope = match runtime.queue().pop().await {
                Some(envelope) => envelope,
                None => break,
            };

            if runtime.run_context().should_stop_before_processing() {
                // Still honor invariant 3: every `put` gets exactly one
                // `task_done`, even for work abandoned by a hard stop.
                settle_as_cancelled(&runtime, envelope);
                runtime.queue().task_done();
                tokio::task::yield_now().await;
                continue;
            }

            process_one(runtime.clone(), envelope).await;
            tokio::task::yield_now().await;
        }
    })
}

async fn process_one(runtime: AgentRuntime, envelope: Envelope) {
    match envelope {
        Envelope::Send(send) => {
            let handlers = runtime.interventions();
            let outcome = crate::intervention::run_send_pipeline(
                &handlers,
                send.message,
                send.sender.as_ref(),
                &send.recipient,
            )
            .await;
            match outcome {
                InterventionOutcome::Continue(message) => {
                    tokio::task::spawn_local(delivery::process_send(
                        runtime.clone(),
                        send.sender,
                        send.recipient,
                        send.message_id,
                        send.cancellation_token,
                        message,
                        send.result_handle,
                    ));
                }
                InterventionOutcome::Drop(reason) => {
                    let _ = send
                        .result_handle
                        .send(Err(Error::message_dropped(reason.0)));
                    runtime.queue().task_done();
                }
            }
        }
        Envelope::Publish(publish) => {
            let handlers = runtime.interventions();
            let message_id = publish.message_id.clone();
            let cancellation_token = publish.cancellation_token.clone();
            let outcome = crate::intervention::run_publish_pipeline(
                &handlers,
                publish.message,
                publish.sender.as_ref(),
                &publish.topic_id,
            )
            .await;
            match outcome {
                InterventionOutcome::Continue(message) => {
                    tokio::task::spawn_local(delivery::process_publish(
                        runtime.clone(),
                        publish.sender,
                        publish.topic_id,
                        message,
                        message_id,
                        cancellation_token,
                    ));
                }
                InterventionOutcome::Drop(_) => {
                    runtime.queue().task_done();
                }
            }
        }
        Envelope::Response(response) => {
            let handlers = runtime.interventions();
            match response.message {
                Ok(message) => {
                    let outcome = crate::intervention::run_response_pipeline(
                        &handlers,
                        message,
                        &response.sender,
                        response.recipient.as_ref(),
                    )
                    .await;
                    match outcome {
                        InterventionOutcome::Continue(message) => {
                            let _ = response.result_handle.send(Ok(message));
                        }
                        InterventionOutcome::Drop(reason) => {
                            let _ = response
                                .result_handle
                                .send(Err(Error::message_dropped(reason.0)));
                        }
                    }
                }
                Err(err) => {
                    let _ = response.result_handle.send(Err(err));
                }
            }
            runtime.queue().task_done();
        }
    }
}

fn settle_as_cancelled(_runtime: &AgentRuntime, envelope: Envelope) {
    match envelope {
        Envelope::Send(send) => {
            let _ = send
                .result_handle
                .send(Err(Error::cancelled("runtime stopped before delivery")));
        }
        Envelope::Response(response) => {
            let _ = response
                .result_handle
                .send(Err(Error::cancelled("runtime stopped before delivery")));
        }
        Envelope::Publish(_) => {}
    }
}
