//! Cross-key batch coalescing, the DataLoader pattern.
//!
//! Concurrent misses for *different* keys sharing a batch loader are
//! deferred for up to `batch_window` (or until `max_batch_size` items have
//! queued, whichever comes first) and then satisfied with one multi-key
//! upstream call. The queue is a `tokio::sync::Mutex` guarding a `Vec` of
//! oneshot senders, grouped by loader identity before a flush, with
//! results written back before any waiter is resolved.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::error::CacheError;

/// Identifies which batch loader a queued item belongs to, so that
/// different loader identities are never merged into one upstream call
/// even when they share a coalescer.
pub type LoaderId = u64;

/// Result of invoking a batch loader: callers map a caller-supplied key
/// list to this enum.
pub enum BatchResult<K, V> {
    /// Results aligned to the input key order, `results[i]` for `keys[i]`.
    Ordered(Vec<Option<V>>),
    /// Results keyed by the actual input key; a key absent from the map
    /// resolves to `None`.
    Keyed(HashMap<K, V>),
}

type Outcome<V> = Result<V, CacheError>;

/// A batch loader invocation: an ordered list of keys in, a [`BatchResult`]
/// or error out.
pub type BatchLoaderFn<K, V> = Arc<
    dyn Fn(Vec<K>) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<BatchResult<K, V>, CacheError>> + Send>>
        + Send
        + Sync,
>;

struct QueueItem<K, V> {
    key: K,
    loader_id: LoaderId,
    loader: BatchLoaderFn<K, V>,
    ttl: Option<Duration>,
    responder: oneshot::Sender<Outcome<Option<V>>>,
}

/// Writes a resolved `(key, value, ttl)` back into the cache's store.
/// Invoked by the flush, inside the batch lock, before any promise of
/// that group is resolved; see [`BatchCoalescer::flush_locked`].
pub type WriteBack<K, V> = Arc<dyn Fn(K, V, Option<Duration>) + Send + Sync>;

/// Coalesces concurrent misses across different keys into fewer upstream
/// calls, bounded by a time window and a size threshold.
///
/// One coalescer instance may be shared by calls using different loader
/// functions, as long as each distinct loader is given its own
/// [`LoaderId`]: the flush groups items by id before invoking a group's
/// own loader, so mixed traffic never cross-contaminates upstream calls.
pub struct BatchCoalescer<K, V> {
    batch_window: Duration,
    max_batch_size: usize,
    write_back: WriteBack<K, V>,
    state: Mutex<State<K, V>>,
}

struct State<K, V> {
    items: Vec<QueueItem<K, V>>,
    timer: Option<JoinHandle<()>>,
}

impl<K, V> BatchCoalescer<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a coalescer with the given flush window and size threshold.
    /// `write_back` is how a flush persists a resolved value into the
    /// cache's store before handing it to waiters.
    #[must_use]
    pub fn new(batch_window: Duration, max_batch_size: usize, write_back: WriteBack<K, V>) -> Self {
        Self {
            batch_window,
            max_batch_size,
            write_back,
            state: Mutex::new(State {
                items: Vec::new(),
                timer: None,
            }),
        }
    }

    /// Enqueues `key` for the named loader and returns its eventual
    /// result. A size-triggered flush happens inline, within the lock
    /// that protects the queue; a window-triggered flush is armed as a
    /// background task the first time the queue goes from empty to
    /// non-empty, and cleared whenever a flush runs so a size-triggered
    /// flush cannot be double-flushed by a stale timer.
    pub async fn enqueue(
        self: &Arc<Self>,
        key: K,
        loader_id: LoaderId,
        loader: BatchLoaderFn<K, V>,
        ttl: Option<Duration>,
    ) -> Outcome<Option<V>> {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state.lock().await;
            state.items.push(QueueItem {
                key,
                loader_id,
                loader,
                ttl,
                responder: tx,
            });

            if state.items.len() >= self.max_batch_size {
                if let Some(timer) = state.timer.take() {
                    timer.abort();
                }
                Self::flush_locked(&mut state, &self.write_back).await;
            } else if state.timer.is_none() {
                let this = self.clone();
                let window = self.batch_window;
                state.timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(window).await;
                    let mut state = this.state.lock().await;
                    state.timer = None;
                    Self::flush_locked(&mut state, &this.write_back).await;
                }));
            }
        }

        rx.await.unwrap_or(Err(CacheError::Cancelled))
    }

    /// Snapshots and clears the queue, groups by loader identity, invokes
    /// each group's own loader, writes every successful result back into
    /// the cache's store, and only then resolves that group's waiters, so
    /// a waiter that wakes up can immediately `get()` the value.
    /// Must be called with `state` already locked.
    async fn flush_locked(state: &mut State<K, V>, write_back: &WriteBack<K, V>) {
        if state.items.is_empty() {
            return;
        }

        let items = std::mem::take(&mut state.items);

        let mut groups: HashMap<LoaderId, Vec<usize>> = HashMap::new();
        for (idx, item) in items.iter().enumerate() {
            groups.entry(item.loader_id).or_default().push(idx);
        }

        let mut items: Vec<Option<QueueItem<K, V>>> = items.into_iter().map(Some).collect();

        for (_loader_id, indices) in groups {
            let group_keys: Vec<K> = indices
                .iter()
                .map(|&i| items[i].as_ref().expect("index not yet consumed").key.clone())
                .collect();
            let loader = items[*indices.first().expect("non-empty group")]
                .as_ref()
                .expect("index not yet consumed")
                .loader
                .clone();

            let result = loader(group_keys).await;

            match result {
                Ok(BatchResult::Ordered(values)) => {
                    if values.len() != indices.len() {
                        let err = CacheError::BatchLengthMismatch {
                            expected: indices.len(),
                            actual: values.len(),
                        };
                        for &i in &indices {
                            if let Some(item) = items[i].take() {
                                let _ = item.responder.send(Err(err.clone()));
                            }
                        }
                        continue;
                    }
                    for (slot, &i) in indices.iter().enumerate() {
                        if let Some(item) = items[i].take() {
                            if let Some(value) = values[slot].clone() {
                                write_back(item.key, value.clone(), item.ttl);
                                let _ = item.responder.send(Ok(Some(value)));
                            } else {
                                let _ = item.responder.send(Ok(None));
                            }
                        }
                    }
                }
                Ok(BatchResult::Keyed(mut map)) => {
                    for &i in &indices {
                        if let Some(item) = items[i].take() {
                            match map.remove(&item.key) {
                                Some(value) => {
                                    write_back(item.key, value.clone(), item.ttl);
                                    let _ = item.responder.send(Ok(Some(value)));
                                }
                                None => {
                                    let _ = item.responder.send(Ok(None));
                                }
                            }
                        }
                    }
                }
                Err(err) => {
                    for &i in &indices {
                        if let Some(item) = items[i].take() {
                            let _ = item.responder.send(Err(err.clone()));
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_loader(calls: Arc<AtomicUsize>) -> BatchLoaderFn<String, String> {
        Arc::new(move |keys: Vec<String>| {
            let calls = calls.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                let values = keys.iter().map(|k| Some(format!("val-{k}"))).collect();
                Ok(BatchResult::Ordered(values))
            })
        })
    }

    fn recording_write_back() -> (WriteBack<String, String>, Arc<parking_lot::Mutex<Vec<(String, String)>>>) {
        let written = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = written.clone();
        let write_back: WriteBack<String, String> =
            Arc::new(move |k, v, _ttl| sink.lock().push((k, v)));
        (write_back, written)
    }

    #[tokio::test]
    async fn window_triggered_flush_coalesces_concurrent_misses() {
        let (write_back, written) = recording_write_back();
        let coalescer = Arc::new(BatchCoalescer::<String, String>::new(
            Duration::from_millis(10),
            50,
            write_back,
        ));
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = counting_loader(calls.clone());

        let mut handles = Vec::new();
        for i in 0..20 {
            let coalescer = coalescer.clone();
            let loader = loader.clone();
            handles.push(tokio::spawn(async move {
                coalescer.enqueue(format!("k{i}"), 1, loader, None).await
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let value = handle.await.unwrap().unwrap();
            assert_eq!(value, Some(format!("val-k{i}")));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(written.lock().len(), 20, "flush must write every resolved value back");
    }

    #[tokio::test]
    async fn size_triggered_flush_does_not_wait_for_window() {
        let (write_back, _written) = recording_write_back();
        let coalescer = Arc::new(BatchCoalescer::<String, String>::new(
            Duration::from_secs(3600),
            4,
            write_back,
        ));
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = counting_loader(calls.clone());

        let mut handles = Vec::new();
        for i in 0..4 {
            let coalescer = coalescer.clone();
            let loader = loader.clone();
            handles.push(tokio::spawn(async move {
                coalescer.enqueue(format!("k{i}"), 1, loader, None).await
            }));
        }

        let start = std::time::Instant::now();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn loader_failure_rejects_only_its_own_group() {
        let (write_back, written) = recording_write_back();
        let coalescer = Arc::new(BatchCoalescer::<String, String>::new(
            Duration::from_millis(5),
            50,
            write_back,
        ));
        let failing: BatchLoaderFn<String, String> =
            Arc::new(|_keys| Box::pin(async { Err(CacheError::loader_message("upstream down")) }));

        let result = coalescer.enqueue("k".to_string(), 1, failing, None).await;
        assert!(result.is_err());
        assert!(written.lock().is_empty(), "a failed load must not be written back");
    }

    #[tokio::test]
    async fn keyed_result_missing_key_resolves_to_none() {
        let (write_back, written) = recording_write_back();
        let coalescer = Arc::new(BatchCoalescer::<String, String>::new(
            Duration::from_millis(5),
            50,
            write_back,
        ));
        let loader: BatchLoaderFn<String, String> =
            Arc::new(|_keys| Box::pin(async { Ok(BatchResult::Keyed(HashMap::new())) }));

        let result = coalescer.enqueue("k".to_string(), 1, loader, None).await;
        assert_eq!(result.unwrap(), None);
        assert!(written.lock().is_empty(), "an absent result must not be written back");
    }

    #[tokio::test]
    async fn distinct_loader_ids_never_merge_into_one_call() {
        let (write_back, _written) = recording_write_back();
        let coalescer = Arc::new(BatchCoalescer::<String, String>::new(
            Duration::from_millis(10),
            50,
            write_back,
        ));
        let calls_a = Arc::new(AtomicUsize::new(0));
        let calls_b = Arc::new(AtomicUsize::new(0));
        let loader_a = counting_loader(calls_a.clone());
        let loader_b = counting_loader(calls_b.clone());

        let a = coalescer.enqueue("a".to_string(), 1, loader_a, None);
        let b = coalescer.enqueue("b".to_string(), 2, loader_b, None);
        let (a, b) = tokio::join!(a, b);
        assert_eq!(a.unwrap(), Some("val-a".to_string()));
        assert_eq!(b.unwrap(), Some("val-b".to_string()));
        assert_eq!(calls_a.load(Ordering::SeqCst), 1);
        assert_eq!(calls_b.load(Ordering::SeqCst), 1);
    }
}
