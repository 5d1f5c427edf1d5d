//! A single-threaded FIFO queue with join/shutdown semantics.
//!
//! tokio's own channels don't expose `asyncio.Queue`'s pairing of
//! `task_done()`/`join()` idle detection with a `shutdown()` sentinel, so
//! this is built from scratch: a `VecDeque` behind a `RefCell`, an
//! outstanding-item counter behind a `Cell`, and two `Notify`s — one to
//! wake a waiting `pop`, one to wake a waiting `join`.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use tokio::sync::Notify;

/// FIFO queue of `T`, not `Send`/`Sync` — intended to live on one
/// `LocalSet`-bound task alongside the rest of the runtime.
#[derive(Debug)]
pub struct EnvelopeQueue<T> {
    items: RefCell<VecDeque<T>>,
    /// Items that have been popped but not yet marked `task_done`.
    outstanding: Cell<usize>,
    shutdown: Cell<bool>,
    item_ready: Notify,
    idle: Notify,
}

impl<T> Default for EnvelopeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EnvelopeQueue<T> {
    pub fn new() -> Self {
        Self {
            items: RefCell::new(VecDeque::new()),
            outstanding: Cell::new(0),
            shutdown: Cell::new(false),
            item_ready: Notify::new(),
            idle: Notify::new(),
        }
    }

    /// Enqueue an item. Counts toward `join()`'s outstanding-work tally
    /// until a matching `task_done()` call.
    pub fn put(&self, item: T) {
        self.items.borrow_mut().push_back(item);
        self.outstanding.set(self.outstanding.get() + 1);
        self.item_ready.notify_one();
    }

    /// Pop the next item in FIFO order, waiting if the queue is empty.
    /// Returns `None` once `shutdown()` has been called and the queue has
    /// drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            if let Some(item) = self.items.borrow_mut().pop_front() {
                return Some(item);
            }
            if self.shutdown.get() {
                return None;
            }
            self.item_ready.notified().await;
        }
    }

    /// Mark one previously-popped item as fully processed. Every `put` must
    /// be matched by exactly one `task_done`, whether the item was
    /// delivered, dropped by an intervention, or settled with an error.
    pub fn task_done(&self) {
        let remaining = self.outstanding.get().saturating_sub(1);
        self.outstanding.set(remaining);
        if remaining == 0 {
            self.idle.notify_waiters();
        }
    }

    /// Wait until every enqueued item has a matching `task_done()`.
    pub async fn join(&self) {
        loop {
            if self.outstanding.get() == 0 {
                return;
            }
            self.idle.notified().await;
        }
    }

    /// Stop accepting new waiters on `pop()` once the queue drains. Items
    /// already queued are still returned by `pop()`; only emptiness after
    /// shutdown causes `pop()` to return `None`.
    pub fn shutdown(&self) {
        self.shutdown.set(true);
        self.item_ready.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
