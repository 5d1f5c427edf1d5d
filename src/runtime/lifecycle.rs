//! Run context and lifecycle control: `start`/`stop`/`stop_when_idle`/`stop_when`.

use std::cell::{Cell, RefCell};

use crate::types::{Error, Result};

use super::dispatcher;
use super::AgentRuntime;

/// Tracks the dispatcher task and whether a hard stop has been requested.
#[derive(Debug, Default)]
pub struct RunContext {
    dispatcher: RefCell<Option<tokio::task::JoinHandle<()>>>,
    started: Cell<bool>,
    stop_requested: Cell<bool>,
}

impl RunContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn should_stop_before_processing(&self) -> bool {
        self.stop_requested.get()
    }

    pub fn is_running(&self) -> bool {
        self.started.get() && !self.stop_requested.get()
    }
}

impl AgentRuntime {
    /// Start the dispatcher loop. Fails with `Error::LifecycleMisuse` if
    /// already started.
    pub fn start(&self) -> Result<()> {
        let run = self.run_context();
        if run.started.get() {
            return Err(Error::lifecycle_misuse("runtime already started"));
        }
        run.started.set(true);
        let handle = dispatcher::spawn(self.clone());
        *run.dispatcher.borrow_mut() = Some(handle);
        Ok(())
    }

    /// Request a hard stop: remaining queued envelopes are settled with
    /// `Error::Cancelled` rather than delivered, and the dispatcher exits
    /// once the queue drains. Awaits only the dispatcher task — not the
    /// queue's `join()` — since a hard stop is defined by "stop accepting
    /// new work promptly", not "finish everything first" (that's
    /// `stop_when_idle`'s job). Before returning, replaces the queue and
    /// run context with fresh ones so a subsequent `start()` succeeds,
    /// matching the original implementation's `self._run_context = None;
    /// self._message_queue = Queue()`.
    pub async fn stop(&self) -> Result<()> {
        let run = self.run_context();
        if !run.started.get() {
            return Err(Error::lifecycle_misuse("runtime not started"));
        }
        run.stop_requested.set(true);
        self.queue().shutdown();
        let handle = run.dispatcher.borrow_mut().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.reset_for_restart();
        Ok(())
    }

    /// Wait for every currently-outstanding envelope to finish normal
    /// delivery, then perform a hard stop. Callers should stop issuing new
    /// `send_message`/`publish_message` calls before awaiting this, or the
    /// queue may never go idle.
    pub async fn stop_when_idle(&self) -> Result<()> {
        if !self.run_context().started.get() {
            return Err(Error::lifecycle_misuse("runtime not started"));
        }
        self.queue().join().await;
        self.stop().await
    }

    /// Poll `condition` at `RuntimeConfig::stop_when_check_period` until it
    /// returns `true`, then perform a hard stop. Spec.md flags polling as
    /// an inferior mechanism compared to an event-driven wakeup, but it is
    /// required for compatibility with callers supplying an arbitrary
    /// predicate with no associated notification.
    pub async fn stop_when<F>(&self, mut condition: F) -> Result<()>
    where
        F: FnMut() -> bool,
    {
        if !self.run_context().started.get() {
            return Err(Error::lifecycle_misuse("runtime not started"));
        }
        let period = self.config_stop_when_period();
        let mut interval = tokio::time::interval(period);
        loop {
            if condition() {
                break;
            }
            interval.tick().await;
        }
        self.stop().await
    }
}
