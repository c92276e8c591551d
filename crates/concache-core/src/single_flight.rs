//! Thundering-herd protection.
//!
//! For any burst of concurrent calls sharing a key, the supplied loader
//! runs at most once; every caller observes the same outcome. Cancellation
//! of the leader propagates a [`CacheError::Cancelled`] to every follower
//! rather than leaving a zombie load running; see the `LeaderGuard` below.
//!
//! Fan-out uses `tokio::sync::watch` rather than `broadcast`: a `watch`
//! receiver always sees the most recently sent value the moment it
//! subscribes, regardless of when that value was sent, so a follower can
//! never subscribe a beat too late and miss the one outcome a leader ever
//! produces. A `broadcast::Receiver` created via `subscribe()` only
//! delivers values sent *after* the call, which leaves a window between a
//! follower cloning the sender handle and actually subscribing to it
//! during which the leader can resolve and the follower hangs forever.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::CacheError;

type Outcome<V> = Result<V, CacheError>;

/// Registry of in-flight single-key loads, keyed by `K`.
///
/// Holds at most one entry per key with a live load. The registry lock is
/// only ever held for the duration of a map lookup/insert/remove, never
/// across a loader invocation.
pub struct SingleFlight<K, V> {
    pending: Mutex<HashMap<K, watch::Sender<Option<Outcome<V>>>>>,
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `loader` for `key`, coalescing any concurrent callers for the
    /// same key onto the single in-flight call.
    ///
    /// The leader (the caller that finds no existing pending load) runs
    /// `loader` outside the registry lock, so loads for different keys
    /// never serialise behind each other. Followers subscribe to the
    /// leader's `watch` channel while still holding the registry lock, so
    /// there is no window between "found a pending load" and "started
    /// watching its outcome" for the leader to race past unobserved.
    pub async fn run<F, Fut>(&self, key: K, loader: F) -> Outcome<V>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Outcome<V>>,
    {
        let (mut receiver, leader_sender) = {
            let mut pending = self.pending.lock();
            if let Some(sender) = pending.get(&key) {
                (sender.subscribe(), None)
            } else {
                let (sender, receiver) = watch::channel(None);
                pending.insert(key.clone(), sender.clone());
                (receiver, Some(sender))
            }
        };

        let Some(sender) = leader_sender else {
            loop {
                if let Some(outcome) = receiver.borrow().clone() {
                    return outcome;
                }
                if receiver.changed().await.is_err() {
                    return Err(CacheError::Cancelled);
                }
            }
        };

        let mut guard = LeaderGuard {
            registry: &self.pending,
            key,
            sender,
            resolved: false,
        };
        let outcome = loader().await;
        guard.resolve(outcome.clone());
        outcome
    }
}

/// Removes the registry entry for `key` and, if the leader never reached
/// [`LeaderGuard::resolve`] (it was cancelled mid-load), publishes
/// [`CacheError::Cancelled`] so every follower unblocks with an error
/// instead of hanging forever.
struct LeaderGuard<'a, K, V>
where
    K: Hash + Eq + Clone,
{
    registry: &'a Mutex<HashMap<K, watch::Sender<Option<Outcome<V>>>>>,
    key: K,
    sender: watch::Sender<Option<Outcome<V>>>,
    resolved: bool,
}

impl<K, V> LeaderGuard<'_, K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn resolve(&mut self, outcome: Outcome<V>) {
        self.resolved = true;
        // Ignore send errors: no followers were subscribed, which is fine.
        let _ = self.sender.send(Some(outcome));
    }
}

impl<K, V> Drop for LeaderGuard<'_, K, V>
where
    K: Hash + Eq + Clone,
{
    fn drop(&mut self) {
        self.registry.lock().remove(&self.key);
        if !self.resolved {
            let _ = self.sender.send(Some(Err(CacheError::Cancelled)));
        }
    }
}
