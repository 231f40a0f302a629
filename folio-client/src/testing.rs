//! Test doubles shared by the unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use shared::models::{OrderedEntity, Props, ScopeKey, merge_props};
use shared::request::{EntityCreate, EntityPatch};

use crate::editor::EditorState;
use crate::ports::{CredentialRefresher, NotificationPort, RefreshOutcome};
use crate::remote::RemoteStore;
use crate::sync::SyncFailure;
use crate::{ClientError, ClientResult};

pub const PAGE: i64 = 100;

pub fn scope_of() -> ScopeKey {
    ScopeKey::blocks_of(PAGE)
}

pub fn props(value: Value) -> Props {
    value.as_object().cloned().unwrap_or_default()
}

pub fn block(id: i64) -> OrderedEntity {
    OrderedEntity {
        id,
        scope_id: PAGE,
        sort_order: 0,
        props: Props::new(),
    }
}

/// Blocks 1..=4 with names A..D at positions 0..3
pub fn seeded_blocks() -> Vec<OrderedEntity> {
    ["A", "B", "C", "D"]
        .iter()
        .enumerate()
        .map(|(index, name)| OrderedEntity {
            id: index as i64 + 1,
            scope_id: PAGE,
            sort_order: index as i32,
            props: props(json!({ "name": name })),
        })
        .collect()
}

pub fn seeded_state() -> (EditorState, ScopeKey) {
    let scope = scope_of();
    let mut state = EditorState::new();
    state.load_scope(scope, seeded_blocks());
    (state, scope)
}

/// Scripted failure for the next remote call
#[derive(Debug, Clone, Copy)]
pub enum Fail {
    Expired,
    Unavailable,
    NotFound,
}

impl Fail {
    fn into_error(self) -> ClientError {
        match self {
            Self::Expired => ClientError::CredentialExpired("token expired".into()),
            Self::Unavailable => ClientError::Server {
                status: 503,
                message: "unavailable".into(),
            },
            Self::NotFound => ClientError::NotFound("missing".into()),
        }
    }
}

/// Remote call as recorded by [`MockRemote`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(i64, Option<i32>),
    Update(i64, Props),
    Delete(i64),
    Reorder(i64, i64),
    Fetch(ScopeKey),
}

/// In-memory server with the same ordering semantics as folio-server
#[derive(Default)]
pub struct MockRemote {
    scopes: Mutex<HashMap<ScopeKey, Vec<OrderedEntity>>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<VecDeque<Fail>>,
    latency: Mutex<Option<Duration>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scope(scope: ScopeKey, entities: Vec<OrderedEntity>) -> Self {
        let remote = Self::new();
        remote.scopes.lock().insert(scope, entities);
        remote
    }

    pub fn fail_next(&self, fail: Fail) {
        self.failures.lock().push_back(fail);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// Recorded calls, scope refetches excluded
    pub fn writes(&self) -> Vec<Call> {
        self.calls
            .lock()
            .iter()
            .filter(|c| !matches!(c, Call::Fetch(_)))
            .cloned()
            .collect()
    }

    pub fn fetches(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::Fetch(_)))
            .count()
    }

    pub fn ids(&self, scope: ScopeKey) -> Vec<i64> {
        self.scopes
            .lock()
            .get(&scope)
            .map(|v| v.iter().map(|e| e.id).collect())
            .unwrap_or_default()
    }

    pub fn entity(&self, scope: ScopeKey, id: i64) -> Option<OrderedEntity> {
        self.scopes
            .lock()
            .get(&scope)
            .and_then(|v| v.iter().find(|e| e.id == id).cloned())
    }

    /// Most writes running at the same time
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: Call) -> ClientResult<()> {
        self.calls.lock().push(call);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        match self.failures.lock().pop_front() {
            Some(fail) => Err(fail.into_error()),
            None => Ok(()),
        }
    }

    fn not_found(scope: ScopeKey, id: i64) -> ClientError {
        ClientError::NotFound(format!("{} {id} not found in {scope}", scope.kind))
    }
}

fn renumber(entities: &mut [OrderedEntity]) {
    for (index, entity) in entities.iter_mut().enumerate() {
        entity.sort_order = index as i32;
    }
}

#[async_trait]
impl RemoteStore for MockRemote {
    async fn create_entity(&self, scope: ScopeKey, data: EntityCreate) -> ClientResult<OrderedEntity> {
        let id = data.id.unwrap_or_default();
        self.enter(Call::Create(id, data.sort_order)).await?;

        let mut scopes = self.scopes.lock();
        let entities = scopes.entry(scope).or_default();
        if entities.iter().any(|e| e.id == id) {
            return Err(ClientError::Conflict(format!("{id} already exists")));
        }
        let at = data
            .sort_order
            .map_or(entities.len(), |o| (o.max(0) as usize).min(entities.len()));
        let entity = OrderedEntity {
            id,
            scope_id: scope.parent_id,
            sort_order: at as i32,
            props: data.props,
        };
        entities.insert(at, entity.clone());
        renumber(entities);
        Ok(entity)
    }

    async fn update_entity(&self, scope: ScopeKey, id: i64, patch: EntityPatch) -> ClientResult<OrderedEntity> {
        self.enter(Call::Update(id, patch.props.clone())).await?;

        let mut scopes = self.scopes.lock();
        let entity = scopes
            .get_mut(&scope)
            .and_then(|v| v.iter_mut().find(|e| e.id == id))
            .ok_or_else(|| Self::not_found(scope, id))?;
        merge_props(&mut entity.props, &patch.props);
        Ok(entity.clone())
    }

    async fn delete_entity(&self, scope: ScopeKey, id: i64) -> ClientResult<i64> {
        self.enter(Call::Delete(id)).await?;

        let mut scopes = self.scopes.lock();
        let entities = scopes.get_mut(&scope).ok_or_else(|| Self::not_found(scope, id))?;
        let index = entities
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| Self::not_found(scope, id))?;
        entities.remove(index);
        renumber(entities);
        Ok(id)
    }

    async fn reorder_entities(&self, scope: ScopeKey, source_id: i64, target_id: i64) -> ClientResult<()> {
        self.enter(Call::Reorder(source_id, target_id)).await?;
        if source_id == target_id {
            return Ok(());
        }

        let mut scopes = self.scopes.lock();
        let entities = scopes
            .get_mut(&scope)
            .ok_or_else(|| Self::not_found(scope, source_id))?;
        let from = entities
            .iter()
            .position(|e| e.id == source_id)
            .ok_or_else(|| Self::not_found(scope, source_id))?;
        let to = entities
            .iter()
            .position(|e| e.id == target_id)
            .ok_or_else(|| Self::not_found(scope, target_id))?;
        let moved = entities.remove(from);
        entities.insert(to, moved);
        renumber(entities);
        Ok(())
    }

    async fn fetch_scope(&self, scope: ScopeKey) -> ClientResult<Vec<OrderedEntity>> {
        self.calls.lock().push(Call::Fetch(scope));
        Ok(self.scopes.lock().get(&scope).cloned().unwrap_or_default())
    }
}

/// Notification recorded by [`RecordingNotifier`]
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Pending,
    Success,
    Failure(SyncFailure),
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }
}

impl NotificationPort for RecordingNotifier {
    fn notify_pending(&self) {
        self.notices.lock().push(Notice::Pending);
    }

    fn notify_success(&self) {
        self.notices.lock().push(Notice::Success);
    }

    fn notify_failure(&self, failure: &SyncFailure) {
        self.notices.lock().push(Notice::Failure(failure.clone()));
    }
}

/// Refresher returning a fixed outcome, counting calls
pub struct ScriptedRefresher {
    outcome: RefreshOutcome,
    calls: AtomicUsize,
}

impl ScriptedRefresher {
    pub fn new(outcome: RefreshOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialRefresher for ScriptedRefresher {
    async fn refresh(&self) -> RefreshOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome
    }
}
