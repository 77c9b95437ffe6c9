//! Single-flight fetch coordination
//!
//! `FetchCoordinator::run_once` guarantees that at most one operation per key
//! is in flight. Callers arriving while a fetch is running join it and
//! receive a clone of its result instead of starting their own.

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{debug, warn};

type SharedFetch<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;
type Registry<K, T, E> = Arc<Mutex<HashMap<K, InFlightFetch<T, E>>>>;

/// A fetch that has started but not settled
struct InFlightFetch<T, E> {
    /// Distinguishes this fetch from later ones for the same key
    id: u64,

    /// When the fetch started
    started_at: Instant,

    /// Result handle shared by every waiter
    future: SharedFetch<T, E>,
}

/// Counters for coordinator activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorStats {
    /// Operations actually started
    pub started: u64,

    /// Calls that joined an already running operation
    pub joined: u64,
}

/// Deduplicates concurrent fetches per key
///
/// The operation is spawned onto the Tokio runtime, so it runs to completion
/// even if every caller stops waiting. The in-flight record is removed by the
/// spawned task itself when the operation settles, before any waiter sees the
/// result; a later call therefore always starts a fresh operation. Nothing is
/// remembered about settled fetches.
pub struct FetchCoordinator<K, T, E> {
    in_flight: Registry<K, T, E>,
    next_id: AtomicU64,
    started: AtomicU64,
    joined: AtomicU64,
}

/// Removes the in-flight record when the spawned operation finishes or
/// unwinds
struct ClearOnSettle<K, T, E>
where
    K: Eq + Hash,
{
    registry: Registry<K, T, E>,
    key: Option<K>,
    id: u64,
}

impl<K, T, E> Drop for ClearOnSettle<K, T, E>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        let mut in_flight = lock(&self.registry);
        if in_flight.get(&key).map_or(false, |fetch| fetch.id == self.id) {
            in_flight.remove(&key);
        }
    }
}

fn lock<K, T, E>(registry: &Registry<K, T, E>) -> MutexGuard<'_, HashMap<K, InFlightFetch<T, E>>> {
    // The map is left consistent by every critical section
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<K, T, E> Default for FetchCoordinator<K, T, E> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            started: AtomicU64::new(0),
            joined: AtomicU64::new(0),
        }
    }
}

impl<K, T, E> FetchCoordinator<K, T, E>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + 'static,
{
    /// Create a coordinator with no fetches in flight
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `operation` for `key` unless a fetch for `key` is already running
    ///
    /// `operation` is invoked on the spawned task when no fetch is in
    /// flight and dropped unused otherwise. Every concurrent caller for the
    /// same key receives the same success value or the same error. An
    /// operation that panics, either while building its future or while
    /// running it, is reported as `E::from(JoinError)`.
    pub async fn run_once<F, Fut>(&self, key: K, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let future = {
            let mut in_flight = lock(&self.in_flight);

            if let Some(fetch) = in_flight.get(&key) {
                debug!(
                    "Joining in-flight fetch for {:?} (running for {:?})",
                    key,
                    fetch.started_at.elapsed()
                );
                self.joined.fetch_add(1, Ordering::Relaxed);
                drop(operation);
                fetch.future.clone()
            } else {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                self.started.fetch_add(1, Ordering::Relaxed);
                debug!("Starting fetch for {:?}", key);

                let guard = ClearOnSettle {
                    registry: Arc::clone(&self.in_flight),
                    key: Some(key.clone()),
                    id,
                };
                // The registry lock is held until the record is inserted, so
                // the guard cannot run before the record exists. The operation
                // is only called on the spawned task, never under the lock.
                let handle = tokio::spawn(async move {
                    let _guard = guard;
                    operation().await
                });

                let future = async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(join_error) => {
                            warn!("Fetch task did not complete: {}", join_error);
                            Err(E::from(join_error))
                        }
                    }
                }
                .boxed()
                .shared();

                in_flight.insert(
                    key,
                    InFlightFetch {
                        id,
                        started_at: Instant::now(),
                        future: future.clone(),
                    },
                );
                future
            }
        };

        future.await
    }

    /// Whether a fetch for `key` is currently running
    pub fn is_in_flight(&self, key: &K) -> bool {
        lock(&self.in_flight).contains_key(key)
    }

    /// Number of fetches currently running
    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Get coordinator statistics
    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            started: self.started.load(Ordering::Relaxed),
            joined: self.joined.load(Ordering::Relaxed),
        }
    }
}
