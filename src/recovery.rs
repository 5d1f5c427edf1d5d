//! Panic recovery for user-supplied handlers.
//!
//! A single agent (or intervention handler) panicking must not crash the
//! whole runtime — it is caught, logged, and converted to
//! `Error::HandlerError`. Adapted from the teacher crate's
//! `kernel::recovery` module.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::types::{Error, Result};

/// Run an async operation with panic recovery. If `operation` panics, the
/// panic is caught, logged, and converted to `Error::HandlerError` instead
/// of unwinding through the dispatcher.
pub async fn with_recovery_async<Fut, T>(operation: Fut, operation_name: &str) -> Result<T>
where
    Fut: std::future::Future<Output = Result<T>>,
{
    match AssertUnwindSafe(operation).catch_unwind().await {
        Ok(result) => result,
        Err(panic_payload) => {
            let panic_msg = extract_panic_message(&panic_payload);
            tracing::error!(
                target: "runtime.events",
                operation = operation_name,
                panic = %panic_msg,
                "panic_recovered"
            );
            Err(Error::handler_error(format!(
                "panic in {operation_name}: {panic_msg}"
            )))
        }
    }
}

fn extract_panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic (no message)".to_string()
    }
}
