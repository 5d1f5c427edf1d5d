//! Cancellation tokens.
//!
//! Wraps `tokio_util::sync::CancellationToken` (already part of the
//! teacher's dependency stack, used in `ipc/server.rs` for graceful
//! shutdown) with the bookkeeping `link_future` needs: idempotent,
//! exactly-once settlement of a linked result as `Error::Cancelled` if the
//! token fires before the result settles on its own.

use std::cell::RefCell;
use std::rc::Rc;

use tokio::sync::oneshot;

use crate::types::Error;

/// A cancellation handle that can be cloned cheaply and linked to at most
/// one in-flight result per clone-group member.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: tokio_util::sync::CancellationToken,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: tokio_util::sync::CancellationToken::new(),
        }
    }

    /// Signal cancellation. Idempotent: firing twice is a no-op the second
    /// time.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.inner.cancelled().await;
    }

    /// Spawn a watcher (on the current `LocalSet`) that settles `sender`
    /// with `Error::Cancelled` if this token fires first. The watcher exits
    /// without sending if the slot has already been taken, i.e. if the
    /// normal completion path won the race — settlement happens at most
    /// once either way, matching spec.md's "first settlement wins"
    /// requirement for linked results.
    pub fn link_future<T: 'static>(
        &self,
        reason: impl Into<String>,
        slot: Rc<RefCell<Option<oneshot::Sender<crate::types::Result<T>>>>>,
    ) {
        let token = self.inner.clone();
        let reason = reason.into();
        tokio::task::spawn_local(async move {
            token.cancelled().await;
            if let Some(sender) = slot.borrow_mut().take() {
                let _ = sender.send(Err(Error::cancelled(reason)));
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let token = CancellationToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn link_future_settles_on_cancel() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let token = CancellationToken::new();
                let (tx, rx) = oneshot::channel::<crate::types::Result<()>>();
                let slot = Rc::new(RefCell::new(Some(tx)));
                token.link_future("test cancel", slot);
                token.cancel();
                let result = rx.await.expect("watcher sends before dropping sender");
                assert!(matches!(result, Err(Error::Cancelled(_))));
            })
            .await;
    }

    #[tokio::test]
    async fn link_future_does_not_fire_if_already_settled() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let token = CancellationToken::new();
                let (tx, rx) = oneshot::channel::<crate::types::Result<()>>();
                let slot = Rc::new(RefCell::new(Some(tx)));
                token.link_future("unused", slot.clone());
                // Normal completion path wins the race.
                if let Some(sender) = slot.borrow_mut().take() {
                    let _ = sender.send(Ok(()));
                }
                token.cancel();
                let result = rx.await.unwrap();
                assert!(result.is_ok());
            })
            .await;
    }
}
