//! Request-scoped batching loader.

use crate::store::StoreError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Fetch strategy behind a [`BatchLoader`].
///
/// Receives every key of one batch and returns whatever it found, keyed by
/// the requested key. Keys absent from the map resolve to `None`.
#[async_trait]
pub trait BatchFn<K, V>: Send + Sync
where
    K: Send + Sync + 'static,
    V: Send + 'static,
{
    async fn load(&self, keys: &[K]) -> Result<HashMap<K, V>, StoreError>;
}

type BatchResult<K, V> = Option<Arc<HashMap<K, V>>>;

enum Slot<K, V> {
    Ready(Option<V>),
    InFlight {
        batch: u64,
        rx: watch::Receiver<BatchResult<K, V>>,
    },
}

struct Pending<K, V> {
    id: u64,
    keys: Vec<K>,
    tx: watch::Sender<BatchResult<K, V>>,
    rx: watch::Receiver<BatchResult<K, V>>,
}

struct State<K, V> {
    slots: HashMap<K, Slot<K, V>>,
    pending: Option<Pending<K, V>>,
    next_batch: u64,
}

impl<K: Clone + Eq + Hash, V> State<K, V> {
    /// Adds `key` to the batch being collected, opening one if needed.
    fn enqueue(&mut self, key: K) -> watch::Receiver<BatchResult<K, V>> {
        let next = self.next_batch;
        let pending = self.pending.get_or_insert_with(|| {
            let (tx, rx) = watch::channel(None);
            Pending {
                id: next,
                keys: Vec::new(),
                tx,
                rx,
            }
        });
        if pending.id == next {
            self.next_batch += 1;
        }
        pending.keys.push(key.clone());
        let rx = pending.rx.clone();
        self.slots.insert(
            key,
            Slot::InFlight {
                batch: pending.id,
                rx: rx.clone(),
            },
        );
        rx
    }
}

struct Inner<K, V> {
    name: &'static str,
    fetch: Arc<dyn BatchFn<K, V>>,
    max_batch_size: usize,
    state: Mutex<State<K, V>>,
    dispatches: AtomicU64,
}

/// Coalescing, caching key → value loader.
///
/// Every key requested before the batch is dispatched goes out in one call
/// to the [`BatchFn`]. A `load` registers its key, yields once to the
/// scheduler so sibling resolvers can register theirs, then dispatches
/// whatever is pending. Keys requested after that start a new batch.
///
/// Results are cached for the lifetime of the loader, including misses.
/// A loader belongs to exactly one request and is dropped with it.
///
/// # Failure Isolation
///
/// If a batch fetch fails, each key is retried on its own. Keys that still
/// fail resolve to `None` and are not cached; siblings resolve normally.
///
/// # Cancellation
///
/// The fetch runs on a spawned task. Dropping the waiting future does not
/// cancel it; the result is still cached.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use quorum_runtime::loader::{BatchFn, BatchLoader};
/// use quorum_runtime::store::StoreError;
/// use std::collections::HashMap;
///
/// struct Square;
///
/// #[async_trait]
/// impl BatchFn<u32, u64> for Square {
///     async fn load(&self, keys: &[u32]) -> Result<HashMap<u32, u64>, StoreError> {
///         Ok(keys.iter().map(|k| (*k, u64::from(*k) * u64::from(*k))).collect())
///     }
/// }
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let loader = BatchLoader::new("square", Square, 100);
/// let values = loader.load_many(vec![3, 4, 3]).await;
/// assert_eq!(values, vec![Some(9), Some(16), Some(9)]);
/// assert_eq!(loader.dispatch_count(), 1);
/// # });
/// ```
pub struct BatchLoader<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for BatchLoader<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> BatchLoader<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a loader. `max_batch_size` is raised to at least 1.
    pub fn new(name: &'static str, fetch: impl BatchFn<K, V> + 'static, max_batch_size: usize) -> Self {
        Self::from_arc(name, Arc::new(fetch), max_batch_size)
    }

    pub fn from_arc(name: &'static str, fetch: Arc<dyn BatchFn<K, V>>, max_batch_size: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                fetch,
                max_batch_size: max_batch_size.max(1),
                state: Mutex::new(State {
                    slots: HashMap::new(),
                    pending: None,
                    next_batch: 0,
                }),
                dispatches: AtomicU64::new(0),
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Resolves one key.
    pub async fn load(&self, key: K) -> Option<V> {
        let mut rx = {
            let mut state = self.inner.state.lock();
            let joined = match state.slots.get(&key) {
                Some(Slot::Ready(value)) => return value.clone(),
                Some(Slot::InFlight { rx, .. }) => Some(rx.clone()),
                None => None,
            };
            match joined {
                Some(rx) => rx,
                None => state.enqueue(key.clone()),
            }
        };

        tokio::task::yield_now().await;
        self.dispatch();

        let value = match rx.wait_for(Option::is_some).await {
            Ok(result) => result.as_ref().and_then(|map| map.get(&key).cloned()),
            Err(_) => {
                tracing::warn!(loader = self.inner.name, key = ?key, "batch task ended without a result");
                None
            }
        };
        value
    }

    /// Resolves several keys; the result has one entry per input key, in
    /// input order.
    pub async fn load_many(&self, keys: Vec<K>) -> Vec<Option<V>> {
        futures::future::join_all(keys.into_iter().map(|key| self.load(key))).await
    }

    /// Caches `value` for `key` without fetching.
    pub fn prime(&self, key: K, value: V) {
        self.inner
            .state
            .lock()
            .slots
            .insert(key, Slot::Ready(Some(value)));
    }

    /// Forgets `key`; the next load fetches it again.
    pub fn clear(&self, key: &K) {
        self.inner.state.lock().slots.remove(key);
    }

    pub fn clear_all(&self) {
        self.inner.state.lock().slots.clear();
    }

    /// Number of batches dispatched so far.
    #[must_use]
    pub fn dispatch_count(&self) -> u64 {
        self.inner.dispatches.load(Ordering::Relaxed)
    }

    fn dispatch(&self) {
        let Some(pending) = self.inner.state.lock().pending.take() else {
            return;
        };
        self.inner.dispatches.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(loader = self.inner.name, batch = pending.id, keys = pending.keys.len(), "dispatching batch");
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run_batch(pending).await });
    }
}

impl<K, V> Inner<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn run_batch(&self, pending: Pending<K, V>) {
        let Pending { id, keys, tx, .. } = pending;
        let mut found: HashMap<K, V> = HashMap::with_capacity(keys.len());
        let mut failed: HashSet<K> = HashSet::new();

        for chunk in keys.chunks(self.max_batch_size) {
            match self.fetch.load(chunk).await {
                Ok(map) => found.extend(map),
                Err(err) if chunk.len() == 1 => {
                    tracing::warn!(loader = self.name, key = ?chunk[0], error = %err, "key fetch failed");
                    failed.insert(chunk[0].clone());
                }
                Err(err) => {
                    tracing::warn!(
                        loader = self.name,
                        keys = chunk.len(),
                        error = %err,
                        "batch fetch failed, retrying keys one by one"
                    );
                    for key in chunk {
                        match self.fetch.load(std::slice::from_ref(key)).await {
                            Ok(map) => found.extend(map),
                            Err(err) => {
                                tracing::warn!(loader = self.name, key = ?key, error = %err, "key fetch failed");
                                failed.insert(key.clone());
                            }
                        }
                    }
                }
            }
        }

        {
            let mut state = self.state.lock();
            for key in &keys {
                let ours = matches!(
                    state.slots.get(key),
                    Some(Slot::InFlight { batch, .. }) if *batch == id
                );
                if !ours {
                    continue;
                }
                if failed.contains(key) {
                    state.slots.remove(key);
                } else {
                    state
                        .slots
                        .insert(key.clone(), Slot::Ready(found.get(key).cloned()));
                }
            }
        }

        tx.send_replace(Some(Arc::new(found)));
    }
}
