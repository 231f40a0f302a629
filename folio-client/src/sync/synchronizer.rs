use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::BoxFuture;
use dashmap::mapref::entry::Entry;
use tokio::sync::{mpsc, watch};

use shared::models::{EntityKind, OrderedEntity, ScopeKey};
use shared::request::{EntityCreate, EntityPatch};

use super::debounce::{Coalesce, FlushFn, KeyedDebouncer};
use super::retry::with_credential_retry;
use crate::editor::Mutation;
use crate::ports::{CredentialRefresher, NotificationPort};
use crate::remote::RemoteStore;
use crate::{ClientError, ClientResult};

/// Oldest failed writes of an entity are dropped beyond this
const MAX_FAILED_PER_ENTITY: usize = 16;

/// Identity of a persisted entity across scopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: i64,
}

impl EntityKey {
    pub fn new(kind: EntityKind, id: i64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Events published after remote writes complete
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Authoritative contents of a scope, fetched after a successful
    /// create, delete or reorder
    ScopeRefreshed {
        scope: ScopeKey,
        entities: Vec<OrderedEntity>,
    },
}

/// A write as it is sent to the server
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteWrite {
    Create { scope: ScopeKey, data: EntityCreate },
    Update { scope: ScopeKey, id: i64, patch: EntityPatch },
    Delete { scope: ScopeKey, id: i64 },
    Reorder { scope: ScopeKey, source_id: i64, target_id: i64 },
}

impl RemoteWrite {
    pub fn scope(&self) -> ScopeKey {
        match self {
            Self::Create { scope, .. }
            | Self::Update { scope, .. }
            | Self::Delete { scope, .. }
            | Self::Reorder { scope, .. } => *scope,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Reorder { .. } => "reorder",
        }
    }

    /// Discrete writes change positions, so the scope is refetched afterwards
    fn changes_positions(&self) -> bool {
        !matches!(self, Self::Update { .. })
    }

    async fn send(&self, remote: &dyn RemoteStore) -> ClientResult<()> {
        match self {
            Self::Create { scope, data } => remote.create_entity(*scope, data.clone()).await.map(|_| ()),
            Self::Update { scope, id, patch } => {
                remote.update_entity(*scope, *id, patch.clone()).await.map(|_| ())
            }
            Self::Delete { scope, id } => remote.delete_entity(*scope, *id).await.map(|_| ()),
            Self::Reorder {
                scope,
                source_id,
                target_id,
            } => remote.reorder_entities(*scope, *source_id, *target_id).await,
        }
    }
}

/// Debounced payload: one merged patch per entity
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpdate {
    scope: ScopeKey,
    patch: EntityPatch,
}

impl Coalesce for PendingUpdate {
    /// Newer keys win; `null` stays as a removal
    fn coalesce(&mut self, newer: Self) {
        self.patch.props.extend(newer.patch.props);
    }
}

struct SyncInner {
    remote: Arc<dyn RemoteStore>,
    refresher: Arc<dyn CredentialRefresher>,
    notifier: Arc<dyn NotificationPort>,
    /// One serial queue per entity with queued or running writes
    lanes: DashMap<EntityKey, mpsc::UnboundedSender<RemoteWrite>>,
    /// Retryable failures per entity, oldest first
    failed: DashMap<EntityKey, Vec<RemoteWrite>>,
    events: mpsc::UnboundedSender<SyncEvent>,
    /// Writes queued or running
    in_flight: watch::Sender<usize>,
}

impl SyncInner {
    /// Queue `write` behind any earlier write to the same entity
    fn enqueue(self: &Arc<Self>, key: EntityKey, write: RemoteWrite) {
        self.in_flight.send_modify(|n| *n += 1);

        // The shard lock is held while sending; a lane retires under the same lock.
        match self.lanes.entry(key) {
            Entry::Occupied(mut lane) => {
                if let Err(mpsc::error::SendError(write)) = lane.get().send(write) {
                    let tx = self.spawn_lane(key, write);
                    lane.insert(tx);
                }
            }
            Entry::Vacant(slot) => {
                let tx = self.spawn_lane(key, write);
                slot.insert(tx);
            }
        }
    }

    fn spawn_lane(self: &Arc<Self>, key: EntityKey, first: RemoteWrite) -> mpsc::UnboundedSender<RemoteWrite> {
        let (tx, rx) = mpsc::unbounded_channel();
        // rx is alive, send cannot fail
        let _ = tx.send(first);
        tokio::spawn(self.clone().run_lane(key, rx));
        tx
    }

    async fn run_lane(self: Arc<Self>, key: EntityKey, mut rx: mpsc::UnboundedReceiver<RemoteWrite>) {
        loop {
            while let Ok(write) = rx.try_recv() {
                self.execute(key, write).await;
                self.in_flight.send_modify(|n| *n = n.saturating_sub(1));
            }
            match self.lanes.entry(key) {
                Entry::Occupied(lane) if rx.is_empty() => {
                    lane.remove();
                    break;
                }
                Entry::Occupied(_) => continue,
                Entry::Vacant(_) => break,
            }
        }
    }

    async fn execute(&self, key: EntityKey, write: RemoteWrite) {
        self.notifier.notify_pending();

        let remote = self.remote.as_ref();
        let result = with_credential_retry(
            || write.send(remote),
            ClientError::classify,
            self.refresher.as_ref(),
        )
        .await;

        match result {
            Ok(()) => {
                self.supersede_failed(key, &write);
                tracing::debug!(%key, op = write.label(), "Remote write succeeded");
                self.notifier.notify_success();
                if write.changes_positions() {
                    self.refresh_scope(write.scope()).await;
                }
            }
            Err(failure) => {
                tracing::warn!(%key, op = write.label(), %failure, "Remote write failed");
                if failure.is_retryable() {
                    self.record_failed(key, write);
                }
                self.notifier.notify_failure(&failure);
            }
        }
    }

    /// Queue a failed write for [`PersistenceSynchronizer::retry_failed`].
    /// Consecutive failed updates collapse into one patch.
    fn record_failed(&self, key: EntityKey, write: RemoteWrite) {
        let mut queue = self.failed.entry(key).or_default();
        if let RemoteWrite::Update { patch, .. } = &write
            && let Some(RemoteWrite::Update { patch: queued, .. }) = queue.last_mut()
        {
            queued.props.extend(patch.props.clone());
            return;
        }
        if queue.len() >= MAX_FAILED_PER_ENTITY {
            let dropped = queue.remove(0);
            tracing::warn!(%key, op = dropped.label(), "Failed write dropped, retry queue full");
        }
        queue.push(write);
    }

    /// A successful update makes older failed values of the same keys obsolete
    fn supersede_failed(&self, key: EntityKey, write: &RemoteWrite) {
        let RemoteWrite::Update { patch: sent, .. } = write else {
            return;
        };
        let Some(mut queue) = self.failed.get_mut(&key) else {
            return;
        };
        queue.retain_mut(|queued| match queued {
            RemoteWrite::Update { patch, .. } => {
                patch.props.retain(|k, _| !sent.props.contains_key(k));
                !patch.props.is_empty()
            }
            _ => true,
        });
        let empty = queue.is_empty();
        drop(queue);
        if empty {
            self.failed.remove_if(&key, |_, queue| queue.is_empty());
        }
    }

    async fn refresh_scope(&self, scope: ScopeKey) {
        let remote = self.remote.as_ref();
        let fetched = with_credential_retry(
            || remote.fetch_scope(scope),
            ClientError::classify,
            self.refresher.as_ref(),
        )
        .await;

        match fetched {
            Ok(entities) => {
                // receiver may be gone; nothing to publish to then
                let _ = self.events.send(SyncEvent::ScopeRefreshed { scope, entities });
            }
            Err(failure) => {
                tracing::warn!(%scope, %failure, "Scope refetch failed");
            }
        }
    }
}

/// Sends applied mutations to a [`RemoteStore`].
///
/// - `Update` is debounced per entity; only the merged payload is sent.
/// - `Create`, `Delete`, `Reorder` are sent immediately. `Delete` drops any
///   pending update of the same entity.
/// - Writes to one entity run one at a time, in submission order; writes to
///   different entities run concurrently.
/// - Retryable failures are queued per entity in failure order and resent by
///   [`retry_failed`](Self::retry_failed). A later successful update drops the
///   keys it overwrote from queued failed updates; a delete drops the queue.
/// - Outcomes are reported through the [`NotificationPort`] only. Local state
///   is never touched.
pub struct PersistenceSynchronizer {
    inner: Arc<SyncInner>,
    debouncer: KeyedDebouncer<EntityKey, PendingUpdate>,
}

impl PersistenceSynchronizer {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        refresher: Arc<dyn CredentialRefresher>,
        notifier: Arc<dyn NotificationPort>,
        debounce: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let (in_flight, _) = watch::channel(0);
        let inner = Arc::new(SyncInner {
            remote,
            refresher,
            notifier,
            lanes: DashMap::new(),
            failed: DashMap::new(),
            events,
            in_flight,
        });

        let target = inner.clone();
        let flush: FlushFn<EntityKey, PendingUpdate> = Arc::new(move |key: EntityKey, update: PendingUpdate| -> BoxFuture<'static, ()> {
            target.enqueue(
                key,
                RemoteWrite::Update {
                    scope: update.scope,
                    id: key.id,
                    patch: update.patch,
                },
            );
            Box::pin(async {})
        });

        let synchronizer = Self {
            inner,
            debouncer: KeyedDebouncer::new(debounce, flush),
        };
        (synchronizer, receiver)
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.inner.remote
    }

    /// Hand over a mutation that has been applied locally.
    ///
    /// Must be called inside a tokio runtime.
    pub fn submit(&self, mutation: Mutation) {
        let key = EntityKey::new(mutation.kind(), mutation.entity_id());
        match mutation {
            Mutation::Update { scope, patch, .. } => {
                self.debouncer.schedule(
                    key,
                    PendingUpdate {
                        scope,
                        patch: EntityPatch { props: patch },
                    },
                );
            }
            Mutation::Delete { scope, id } => {
                if self.debouncer.cancel(&key).is_some() {
                    tracing::debug!(%key, "Pending update dropped by delete");
                }
                self.inner.failed.remove(&key);
                self.inner.enqueue(key, RemoteWrite::Delete { scope, id });
            }
            Mutation::Create { scope, entity } => {
                let data = EntityCreate {
                    id: Some(entity.id),
                    sort_order: Some(entity.sort_order),
                    props: entity.props,
                };
                self.inner.enqueue(key, RemoteWrite::Create { scope, data });
            }
            Mutation::Reorder {
                scope,
                source_id,
                target_id,
                ..
            } => {
                self.inner.enqueue(
                    key,
                    RemoteWrite::Reorder {
                        scope,
                        source_id,
                        target_id,
                    },
                );
            }
        }
    }

    /// Send every debounced update now. Returns how many were pending.
    pub async fn flush_pending(&self) -> usize {
        self.debouncer.flush_all().await
    }

    /// Wait until no write is queued or running (debounced updates excluded)
    pub async fn settled(&self) {
        let mut rx = self.inner.in_flight.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Re-dispatch every write that failed with a retryable error, in the
    /// order each entity's writes originally failed. Returns how many were sent.
    pub fn retry_failed(&self) -> usize {
        let keys: Vec<EntityKey> = self.inner.failed.iter().map(|e| *e.key()).collect();
        let mut count = 0;
        for key in keys {
            let Some((key, writes)) = self.inner.failed.remove(&key) else {
                continue;
            };
            for write in writes {
                tracing::info!(%key, op = write.label(), "Retrying failed write");
                self.inner.enqueue(key, write);
                count += 1;
            }
        }
        count
    }

    /// Failed writes waiting for [`retry_failed`](Self::retry_failed)
    pub fn failed_count(&self) -> usize {
        self.inner.failed.iter().map(|queue| queue.len()).sum()
    }

    pub fn has_pending_update(&self, key: &EntityKey) -> bool {
        self.debouncer.is_pending(key)
    }
}
