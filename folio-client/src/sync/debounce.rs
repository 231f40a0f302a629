//! Keyed debouncer
//!
//! At most one pending write per key. A newer payload cancels the pending
//! timer, is coalesced over the pending payload and re-arms the full window.
//! When a timer fires, the payload is removed from the table and handed to
//! the flush callback; cancellation never reaches a flush already running.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::{BoxFuture, join_all};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Payloads that can absorb a newer payload for the same key
pub trait Coalesce {
    fn coalesce(&mut self, newer: Self);
}

/// Callback receiving a payload once its window has elapsed
pub type FlushFn<K, P> = Arc<dyn Fn(K, P) -> BoxFuture<'static, ()> + Send + Sync>;

struct PendingWrite<P> {
    payload: P,
    cancel: CancellationToken,
    generation: u64,
}

struct Inner<K, P> {
    window: Duration,
    pending: Mutex<HashMap<K, PendingWrite<P>>>,
    generation: AtomicU64,
    flush: FlushFn<K, P>,
}

pub struct KeyedDebouncer<K, P> {
    inner: Arc<Inner<K, P>>,
}

impl<K, P> Clone for KeyedDebouncer<K, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, P> KeyedDebouncer<K, P>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    P: Coalesce + Send + 'static,
{
    pub fn new(window: Duration, flush: FlushFn<K, P>) -> Self {
        Self {
            inner: Arc::new(Inner {
                window,
                pending: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                flush,
            }),
        }
    }

    /// Schedule `payload` for `key`, restarting the window.
    ///
    /// Must be called inside a tokio runtime.
    pub fn schedule(&self, key: K, payload: P) {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();

        {
            let mut pending = self.inner.pending.lock();
            let payload = match pending.remove(&key) {
                Some(mut previous) => {
                    previous.cancel.cancel();
                    previous.payload.coalesce(payload);
                    previous.payload
                }
                None => payload,
            };
            pending.insert(
                key.clone(),
                PendingWrite {
                    payload,
                    cancel: cancel.clone(),
                    generation,
                },
            );
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(inner.window) => {
                    let due = {
                        let mut pending = inner.pending.lock();
                        match pending.get(&key) {
                            Some(write) if write.generation == generation => pending.remove(&key),
                            _ => None,
                        }
                    };
                    if let Some(write) = due {
                        (inner.flush)(key, write.payload).await;
                    }
                }
            }
        });
    }

    /// Drop the pending payload for `key`, returning it
    pub fn cancel(&self, key: &K) -> Option<P> {
        let write = self.inner.pending.lock().remove(key)?;
        write.cancel.cancel();
        Some(write.payload)
    }

    /// Flush `key` now instead of waiting for its window
    pub async fn flush(&self, key: &K) -> bool {
        let Some(payload) = self.cancel(key) else {
            return false;
        };
        (self.inner.flush)(key.clone(), payload).await;
        true
    }

    /// Flush every pending key now. Returns how many were flushed.
    pub async fn flush_all(&self) -> usize {
        let drained: Vec<(K, PendingWrite<P>)> = self.inner.pending.lock().drain().collect();
        let count = drained.len();
        let flushes = drained.into_iter().map(|(key, write)| {
            write.cancel.cancel();
            (self.inner.flush)(key, write.payload)
        });
        join_all(flushes).await;
        count
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.inner.pending.lock().contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }
}
