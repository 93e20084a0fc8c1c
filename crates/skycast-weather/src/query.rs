//! Keyed request de-duplication.
//!
//! Every key maps to at most one slot: either a request in flight, which
//! later callers subscribe to instead of issuing their own, or a ready
//! value. Failures are never cached.

use crate::types::WeatherError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

type Outcome<V> = Option<Result<V, WeatherError>>;

enum Slot<V> {
    InFlight {
        id: u64,
        rx: watch::Receiver<Outcome<V>>,
    },
    Ready(V),
}

enum Role<V> {
    Leader { id: u64, tx: watch::Sender<Outcome<V>> },
    Follower(watch::Receiver<Outcome<V>>),
}

/// Per-key in-flight request table with a result cache.
pub struct QueryClient<K, V> {
    slots: Arc<Mutex<HashMap<K, Slot<V>>>>,
    next_id: Arc<AtomicU64>,
}

impl<K, V> Clone for QueryClient<K, V> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<K, V> Default for QueryClient<K, V> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<K, V> std::fmt::Debug for QueryClient<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("slots", &self.slots.lock().len())
            .finish()
    }
}

impl<K, V> QueryClient<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `key`, calling `fetcher` only if no result is cached and no
    /// request for the same key is already running.
    pub async fn fetch<F, Fut>(&self, key: K, fetcher: F) -> Result<V, WeatherError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, WeatherError>>,
    {
        let role = {
            let mut slots = self.slots.lock();
            match slots.get(&key) {
                Some(Slot::Ready(value)) => {
                    tracing::debug!("Query {:?} served from cache", key);
                    return Ok(value.clone());
                }
                Some(Slot::InFlight { rx, .. }) => Role::Follower(rx.clone()),
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let (tx, rx) = watch::channel(None);
                    slots.insert(key.clone(), Slot::InFlight { id, rx });
                    Role::Leader { id, tx }
                }
            }
        };

        match role {
            Role::Follower(rx) => {
                tracing::debug!("Query {:?} joined in-flight request", key);
                wait_for(rx).await
            }
            Role::Leader { id, tx } => {
                let guard = LeaderGuard {
                    slots: &*self.slots,
                    key: Some(key),
                    id,
                };
                let result = fetcher().await;
                guard.complete(&result);
                tx.send_replace(Some(result.clone()));
                result
            }
        }
    }

    /// Cached value for `key`, if one is ready.
    pub fn peek(&self, key: &K) -> Option<V> {
        match self.slots.lock().get(key) {
            Some(Slot::Ready(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Forget `key`. A request still in flight completes for its waiters but
    /// is not cached.
    pub fn invalidate(&self, key: &K) {
        self.slots.lock().remove(key);
    }
}

async fn wait_for<V: Clone>(mut rx: watch::Receiver<Outcome<V>>) -> Result<V, WeatherError> {
    loop {
        let current = rx.borrow_and_update().clone();
        if let Some(result) = current {
            return result;
        }
        if rx.changed().await.is_err() {
            // Leader dropped; take a final value if it raced the drop
            let last = rx.borrow().clone();
            return last.unwrap_or(Err(WeatherError::Cancelled));
        }
    }
}

/// Clears the leader's in-flight slot if the leader is dropped before finishing.
struct LeaderGuard<'a, K: Eq + Hash, V> {
    slots: &'a Mutex<HashMap<K, Slot<V>>>,
    key: Option<K>,
    id: u64,
}

impl<K: Eq + Hash, V: Clone> LeaderGuard<'_, K, V> {
    fn complete(mut self, result: &Result<V, WeatherError>) {
        let Some(key) = self.key.take() else {
            return;
        };
        let mut slots = self.slots.lock();
        if !owns_slot(&slots, &key, self.id) {
            return;
        }
        match result {
            Ok(value) => {
                slots.insert(key, Slot::Ready(value.clone()));
            }
            Err(_) => {
                slots.remove(&key);
            }
        }
    }
}

impl<K: Eq + Hash, V> Drop for LeaderGuard<'_, K, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let mut slots = self.slots.lock();
            if owns_slot(&slots, &key, self.id) {
                slots.remove(&key);
            }
        }
    }
}

fn owns_slot<K: Eq + Hash, V>(slots: &HashMap<K, Slot<V>>, key: &K, id: u64) -> bool {
    matches!(slots.get(key), Some(Slot::InFlight { id: current, .. }) if *current == id)
}

/// Status of one keyed query as seen by its consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<K, V> {
    pub key: Option<K>,
    pub pending: bool,
    pub error: Option<WeatherError>,
    pub data: Option<V>,
}

impl<K, V> Default for QueryState<K, V> {
    fn default() -> Self {
        Self {
            key: None,
            pending: false,
            error: None,
            data: None,
        }
    }
}

impl<K: PartialEq, V> QueryState<K, V> {
    /// Disabled query: no key, nothing pending.
    pub fn disable(&mut self) {
        *self = Self::default();
    }

    /// Begin waiting on `key`. Data for a different key is dropped.
    pub fn start(&mut self, key: K) {
        if self.key.as_ref() != Some(&key) {
            self.data = None;
        }
        self.key = Some(key);
        self.pending = true;
        self.error = None;
    }

    /// Apply a result if `key` is still the current key. Returns whether it was applied.
    pub fn resolve(&mut self, key: &K, result: Result<V, WeatherError>) -> bool {
        if self.key.as_ref() != Some(key) {
            return false;
        }
        self.pending = false;
        match result {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
            }
            Err(e) => {
                self.error = Some(e);
            }
        }
        true
    }

    pub fn is_current(&self, key: &K) -> bool {
        self.key.as_ref() == Some(key)
    }

    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }
}
