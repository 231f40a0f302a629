//! Editor Session
//!
//! Owns the local [`EditorState`], one [`EditHistory`] per scope and the
//! [`PersistenceSynchronizer`]. Every mutation applied, undone or redone is
//! forwarded to the synchronizer. A failed write never rolls local state
//! back; a refetched scope whose order differs from the local one replaces it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use shared::models::{OrderedEntity, Props, ScopeKey};
use shared::util::snowflake_id;

use super::{Command, EditHistory, EditorError, EditorState, Mutation};
use crate::ports::{CredentialRefresher, NotificationPort};
use crate::remote::RemoteStore;
use crate::sync::{PersistenceSynchronizer, SyncEvent};
use crate::{ClientConfig, ClientResult};

/// Result of reflecting a server snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeSync {
    /// Local order already matched; history kept
    InSync,
    /// Local order differed; scope replaced, history cleared
    Replaced,
    /// Scope is not open in this session
    NotLoaded,
}

pub struct EditorSession {
    state: EditorState,
    histories: HashMap<ScopeKey, EditHistory>,
    history_limit: usize,
    sync: PersistenceSynchronizer,
    events: mpsc::UnboundedReceiver<SyncEvent>,
}

impl EditorSession {
    pub fn new(
        config: &ClientConfig,
        remote: Arc<dyn RemoteStore>,
        refresher: Arc<dyn CredentialRefresher>,
        notifier: Arc<dyn NotificationPort>,
    ) -> Self {
        let (sync, events) =
            PersistenceSynchronizer::new(remote, refresher, notifier, config.debounce_window());
        Self {
            state: EditorState::new(),
            histories: HashMap::new(),
            history_limit: config.history_limit,
            sync,
            events,
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn entities(&self, scope: ScopeKey) -> &[OrderedEntity] {
        self.state.entities(scope)
    }

    pub fn synchronizer(&self) -> &PersistenceSynchronizer {
        &self.sync
    }

    /// Fetch a scope from the server and make it editable (history starts empty)
    pub async fn load_scope(&mut self, scope: ScopeKey) -> ClientResult<()> {
        let entities = self.sync.remote().fetch_scope(scope).await?;
        tracing::debug!(%scope, count = entities.len(), "Scope loaded");
        self.reconcile(scope, entities);
        Ok(())
    }

    /// Replace a scope with a server snapshot. Its history is cleared, since
    /// recorded commands may no longer match the new positions.
    pub fn reconcile(&mut self, scope: ScopeKey, entities: Vec<OrderedEntity>) {
        self.state.load_scope(scope, entities);
        if let Some(history) = self.histories.get_mut(&scope) {
            history.clear();
        }
    }

    /// Apply through the scope's history and hand the result to the synchronizer
    fn record(&mut self, scope: ScopeKey, command: Command) -> Result<(), EditorError> {
        let limit = self.history_limit;
        let history = self
            .histories
            .entry(scope)
            .or_insert_with(|| EditHistory::with_limit(limit));
        let applied = history.apply(command, &mut self.state)?;
        self.sync.submit(applied);
        Ok(())
    }

    /// Create an entity at `at` (default: end of scope). Returns the new id.
    pub fn create_entity(&mut self, scope: ScopeKey, props: Props, at: Option<usize>) -> Result<i64, EditorError> {
        let id = loop {
            let id = snowflake_id();
            if self.state.get(scope, id).is_none() {
                break id;
            }
        };
        let command = Command::create(&self.state, scope, id, props, at)?;
        self.record(scope, command)?;
        Ok(id)
    }

    pub fn update_entity(&mut self, scope: ScopeKey, id: i64, patch: Props) -> Result<(), EditorError> {
        let command = Command::update(&self.state, scope, id, patch)?;
        self.record(scope, command)
    }

    pub fn delete_entity(&mut self, scope: ScopeKey, id: i64) -> Result<(), EditorError> {
        let command = Command::delete(&self.state, scope, id)?;
        self.record(scope, command)
    }

    /// Move `source_id` to the position of `target_id`. Returns `false` for a no-op.
    pub fn reorder_entity(&mut self, scope: ScopeKey, source_id: i64, target_id: i64) -> Result<bool, EditorError> {
        match Command::reorder(&self.state, scope, source_id, target_id)? {
            Some(command) => {
                self.record(scope, command)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Undo the latest edit in `scope`. Returns `false` if there was none.
    pub fn undo(&mut self, scope: ScopeKey) -> Result<bool, EditorError> {
        let Some(history) = self.histories.get_mut(&scope) else {
            return Ok(false);
        };
        let applied = history.undo(&mut self.state)?;
        Ok(self.forward(applied))
    }

    /// Redo the latest undone edit in `scope`. Returns `false` if there was none.
    pub fn redo(&mut self, scope: ScopeKey) -> Result<bool, EditorError> {
        let Some(history) = self.histories.get_mut(&scope) else {
            return Ok(false);
        };
        let applied = history.redo(&mut self.state)?;
        Ok(self.forward(applied))
    }

    fn forward(&self, applied: Option<Mutation>) -> bool {
        match applied {
            Some(mutation) => {
                self.sync.submit(mutation);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self, scope: ScopeKey) -> bool {
        self.histories.get(&scope).is_some_and(EditHistory::can_undo)
    }

    pub fn can_redo(&self, scope: ScopeKey) -> bool {
        self.histories.get(&scope).is_some_and(EditHistory::can_redo)
    }

    /// Send every debounced update now, wait for all writes to finish and
    /// reflect the refetched scopes locally (leaving a page, closing the editor).
    ///
    /// A scope whose refetch disagrees with local state is read once more
    /// before it is replaced; with every write settled that read is the
    /// server's final order, even if two refetches raced each other.
    pub async fn flush_pending(&mut self) {
        let flushed = self.sync.flush_pending().await;
        if flushed > 0 {
            tracing::debug!(flushed, "Pending updates flushed");
        }
        self.sync.settled().await;

        for (scope, entities) in self.drain_refreshes() {
            if self.compare(scope, &entities) != ScopeSync::Replaced {
                continue;
            }
            match self.sync.remote().fetch_scope(scope).await {
                Ok(latest) => {
                    self.apply_refresh(scope, latest);
                }
                Err(e) => tracing::warn!(%scope, error = %e, "Scope refetch failed, keeping local order"),
            }
        }
    }

    /// Reflect every refetch published so far. Returns how many scopes were
    /// replaced (and lost their history).
    pub fn apply_refreshes(&mut self) -> usize {
        let mut replaced = 0;
        for (scope, entities) in self.drain_refreshes() {
            if self.apply_refresh(scope, entities) == ScopeSync::Replaced {
                replaced += 1;
            }
        }
        replaced
    }

    /// Reflect a server snapshot of `scope`.
    ///
    /// Same ids in the same order: nothing changes and the history is kept
    /// (local props are at least as new as the server's). Otherwise the scope
    /// is replaced and its history cleared.
    pub fn apply_refresh(&mut self, scope: ScopeKey, entities: Vec<OrderedEntity>) -> ScopeSync {
        let outcome = self.compare(scope, &entities);
        if outcome == ScopeSync::Replaced {
            tracing::info!(%scope, "Local order diverged from server, scope replaced");
            self.reconcile(scope, entities);
        }
        outcome
    }

    fn compare(&self, scope: ScopeKey, entities: &[OrderedEntity]) -> ScopeSync {
        if !self.state.is_loaded(scope) {
            return ScopeSync::NotLoaded;
        }
        let mut remote: Vec<(i32, i64)> = entities.iter().map(|e| (e.sort_order, e.id)).collect();
        remote.sort_unstable();
        if remote.into_iter().map(|(_, id)| id).eq(self.state.entities(scope).iter().map(|e| e.id)) {
            ScopeSync::InSync
        } else {
            ScopeSync::Replaced
        }
    }

    /// Queued refetches, latest snapshot per scope
    fn drain_refreshes(&mut self) -> Vec<(ScopeKey, Vec<OrderedEntity>)> {
        let mut latest: Vec<(ScopeKey, Vec<OrderedEntity>)> = Vec::new();
        while let Ok(SyncEvent::ScopeRefreshed { scope, entities }) = self.events.try_recv() {
            latest.retain(|(s, _)| *s != scope);
            latest.push((scope, entities));
        }
        latest
    }

    /// Stop editing `scope`: pending writes are sent, then its entities and
    /// history are dropped.
    pub async fn close_scope(&mut self, scope: ScopeKey) {
        self.flush_pending().await;
        self.state.unload_scope(scope);
        self.histories.remove(&scope);
        tracing::debug!(%scope, "Scope closed");
    }

    /// Re-send writes that failed with a retryable error
    pub fn retry_failed(&self) -> usize {
        self.sync.retry_failed()
    }

    /// Next synchronizer event, waiting if none is queued. Pass refreshes to
    /// [`apply_refresh`](Self::apply_refresh) to reflect them.
    pub async fn next_event(&mut self) -> Option<SyncEvent> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<SyncEvent> {
        self.events.try_recv().ok()
    }
}
