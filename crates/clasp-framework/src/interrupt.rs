//! Interrupt waiters.
//!
//! A running handler can suspend itself until a matching event arrives (the
//! next message of the same user, for instance). Waiters are consulted by the
//! [`Dispatcher`](crate::dispatcher::Dispatcher) **before** any plugin: an
//! event accepted by a waiter is consumed and never reaches the plugins.
//!
//! ```rust,ignore
//! let mut waiter = ctx.interrupts().register(10, move |ev| ev.sender_id() == Some(&user));
//! ctx.bot().send(&**ctx.event(), &"continue?".into()).await?;
//! match waiter.next(Duration::from_secs(30)).await {
//!     Some(reply) => { /* ... */ }
//!     None => { /* timed out */ }
//! }
//! // dropping `waiter` unregisters it
//! ```
//!
//! Because the waiting handler holds up its own dispatch, the runtime must
//! dispatch events concurrently (one task per event) for a waiter to ever
//! be fed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use clasp_core::BoxedEvent;

type WaitPredicate = Arc<dyn Fn(&BoxedEvent) -> bool + Send + Sync>;

struct Waiter {
    id: u64,
    priority: i32,
    predicate: WaitPredicate,
    tx: mpsc::UnboundedSender<BoxedEvent>,
}

#[derive(Default)]
struct Registry {
    /// Sorted by priority, then registration order.
    waiters: Mutex<Vec<Waiter>>,
    next_id: AtomicU64,
}

/// The set of pending interrupt waiters of one dispatcher.
#[derive(Clone, Default)]
pub struct Interrupts {
    registry: Arc<Registry>,
}

impl Interrupts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter. Lower `priority` values are offered events first.
    ///
    /// The waiter is live as soon as this returns, so events arriving while
    /// the caller is still sending prompts are not lost.
    pub fn register<F>(&self, priority: i32, predicate: F) -> WaitHandle
    where
        F: Fn(&BoxedEvent) -> bool + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut waiters = self.registry.waiters.lock();
        let at = waiters.partition_point(|w| w.priority <= priority);
        waiters.insert(
            at,
            Waiter {
                id,
                priority,
                predicate: Arc::new(predicate),
                tx,
            },
        );
        trace!(id, priority, "interrupt waiter registered");
        WaitHandle {
            id,
            registry: self.registry.clone(),
            rx,
        }
    }

    /// Offers `event` to the registered waiters in priority order.
    ///
    /// Returns `true` if a waiter consumed it.
    pub fn offer(&self, event: &BoxedEvent) -> bool {
        let candidates: Vec<(WaitPredicate, mpsc::UnboundedSender<BoxedEvent>)> = self
            .registry
            .waiters
            .lock()
            .iter()
            .map(|w| (w.predicate.clone(), w.tx.clone()))
            .collect();

        candidates
            .into_iter()
            .any(|(predicate, tx)| predicate(event) && tx.send(event.clone()).is_ok())
    }

    /// Number of waiters currently registered.
    pub fn len(&self) -> usize {
        self.registry.waiters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Interrupts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interrupts")
            .field("waiters", &self.len())
            .finish()
    }
}

/// A registered waiter. Dropping it unregisters the waiter.
pub struct WaitHandle {
    id: u64,
    registry: Arc<Registry>,
    rx: mpsc::UnboundedReceiver<BoxedEvent>,
}

impl WaitHandle {
    /// Waits for the next matching event, or `None` once `timeout` elapses.
    pub async fn next(&mut self, timeout: Duration) -> Option<BoxedEvent> {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .ok()
            .flatten()
    }
}

impl Drop for WaitHandle {
    fn drop(&mut self) {
        self.registry.waiters.lock().retain(|w| w.id != self.id);
        trace!(id = self.id, "interrupt waiter released");
    }
}
