//! Single-flight operation queue.
//!
//! Mutating cart operations take a turn before touching either store. Turns
//! are handed out in the order they were requested (tokio's mutex is fair),
//! so concurrent calls run one at a time in dispatch order.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, MutexGuard};

/// FIFO queue serializing mutating operations on one cart.
#[derive(Debug, Default)]
pub struct OperationQueue {
    turn: Mutex<()>,
    depth: AtomicUsize,
}

/// Exclusive turn on the queue. The next operation starts when this drops.
#[derive(Debug)]
pub struct QueueTurn<'a> {
    _guard: MutexGuard<'a, ()>,
    depth: &'a AtomicUsize,
    operation: &'static str,
}

impl OperationQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for this operation's turn.
    ///
    /// Dropping the returned future before it resolves gives up the place
    /// in line without running anything.
    pub async fn enter(&self, operation: &'static str) -> QueueTurn<'_> {
        let waiting = self.depth.fetch_add(1, Ordering::SeqCst);
        if waiting > 0 {
            tracing::debug!(operation, waiting, "Cart operation queued");
        }

        let pending = Pending { depth: &self.depth };
        let guard = self.turn.lock().await;
        std::mem::forget(pending);

        QueueTurn {
            _guard: guard,
            depth: &self.depth,
            operation,
        }
    }

    /// Operations running or waiting.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

impl Drop for QueueTurn<'_> {
    fn drop(&mut self) {
        let remaining = self.depth.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        tracing::trace!(operation = self.operation, remaining, "Cart operation finished");
    }
}

/// Undoes the depth increment if `enter` is cancelled while waiting.
struct Pending<'a> {
    depth: &'a AtomicUsize,
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}
