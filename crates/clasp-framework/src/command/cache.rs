//! Per-command, per-message result deduplication.
//!
//! Every dispatch of one message to one command goes through
//! [`ResultCache::get_or_create`]. The first caller gets a [`Resolver`] and
//! performs the parse; every other caller gets a [`Waiter`] that resolves to
//! the same value. `None` means the dispatch ended without anything to
//! deliver, and waiters skip silently.
//!
//! Each command keeps at most `capacity` entries. The least recently used
//! *resolved* entry is evicted first; pending entries are never evicted, so a
//! table may briefly exceed its capacity while many messages are in flight.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::trace;

use super::grammar::CommandId;
use super::projection::CommandResult;

/// Default number of entries kept per command.
pub const DEFAULT_CAPACITY: usize = 10;

/// What a successful command run does to the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuccessPolicy {
    /// Leave every entry in place.
    #[default]
    Keep,
    /// Drop the entry of the message that succeeded.
    Entry,
    /// Drop every entry of every command.
    All,
}

#[derive(Debug, Clone)]
enum Slot<T> {
    Pending,
    Done(Option<T>),
}

struct Table<T> {
    entries: HashMap<String, Arc<watch::Sender<Slot<T>>>>,
    /// Keys from least to most recently used.
    order: VecDeque<String>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }
}

impl<T> Table<T> {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }

    fn evict(&mut self, capacity: usize) {
        while self.entries.len() > capacity {
            let victim = self.order.iter().position(|k| {
                self.entries
                    .get(k)
                    .is_some_and(|slot| matches!(*slot.borrow(), Slot::Done(_)))
            });
            match victim.and_then(|pos| self.order.remove(pos)) {
                Some(key) => {
                    trace!(%key, "Evicted cached command result");
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

type Tables<T> = Mutex<HashMap<CommandId, Table<T>>>;

/// Outcome of [`ResultCache::get_or_create`].
pub enum Lookup<T> {
    /// Another dispatch owns the entry.
    Existing(Waiter<T>),
    /// This dispatch owns the entry and must resolve it.
    Fresh(Resolver<T>),
}

/// Waits for the owner of an entry to resolve it.
pub struct Waiter<T> {
    rx: watch::Receiver<Slot<T>>,
}

impl<T: Clone> Waiter<T> {
    pub async fn wait(mut self) -> Option<T> {
        match self.rx.wait_for(|slot| matches!(slot, Slot::Done(_))).await {
            Ok(slot) => match &*slot {
                Slot::Done(value) => value.clone(),
                Slot::Pending => None,
            },
            Err(_) => None,
        }
    }
}

/// Write side of a fresh entry.
///
/// Dropping it unresolved resolves the entry to `None`.
pub struct Resolver<T> {
    tx: Arc<watch::Sender<Slot<T>>>,
    settled: bool,
}

impl<T> Resolver<T> {
    pub fn resolve(mut self, value: Option<T>) {
        self.settle(value);
    }

    fn settle(&mut self, value: Option<T>) {
        self.settled = true;
        self.tx.send_replace(Slot::Done(value));
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if !self.settled {
            self.settle(None);
        }
    }
}

/// Bounded dedup table keyed by `(command, message id)`.
pub struct ResultCache<T = Arc<CommandResult>> {
    capacity: usize,
    tables: Tables<T>,
}

impl<T: Clone + Send + Sync + 'static> ResultCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tables: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Finds the entry for `key`, creating a pending one if there is none.
    pub fn get_or_create(&self, command: CommandId, key: &str) -> Lookup<T> {
        let mut tables = self.tables.lock();
        let table = tables.entry(command).or_default();

        if let Some(tx) = table.entries.get(key) {
            let rx = tx.subscribe();
            table.touch(key);
            return Lookup::Existing(Waiter { rx });
        }

        let (tx, _) = watch::channel(Slot::Pending);
        let tx = Arc::new(tx);
        table.entries.insert(key.to_string(), tx.clone());
        table.order.push_back(key.to_string());
        table.evict(self.capacity);
        Lookup::Fresh(Resolver { tx, settled: false })
    }

    /// Number of entries held for a command.
    pub fn len(&self, command: CommandId) -> usize {
        self.tables
            .lock()
            .get(&command)
            .map_or(0, |table| table.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.tables.lock().values().all(|t| t.entries.is_empty())
    }

    /// Drops one entry.
    pub fn remove(&self, command: CommandId, key: &str) {
        if let Some(table) = self.tables.lock().get_mut(&command) {
            table.remove(key);
        }
    }

    /// Drops every entry of one command.
    pub fn remove_command(&self, command: CommandId) {
        self.tables.lock().remove(&command);
    }

    /// Drops every entry.
    ///
    /// Owners of pending entries can still resolve them; their waiters are
    /// not affected.
    pub fn clear(&self) {
        self.tables.lock().clear();
    }

    /// Applies `policy` after a handler ran successfully.
    pub fn notify_success(&self, command: CommandId, key: &str, policy: SuccessPolicy) {
        match policy {
            SuccessPolicy::Keep => {}
            SuccessPolicy::Entry => self.remove(command, key),
            SuccessPolicy::All => self.clear(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for ResultCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<T> std::fmt::Debug for ResultCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("capacity", &self.capacity)
            .field("commands", &self.tables.lock().len())
            .finish()
    }
}
