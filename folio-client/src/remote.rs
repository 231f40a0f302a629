//! Remote mutation surface
//!
//! What the synchronizer needs from the server. [`HttpClient`](crate::HttpClient)
//! is the production implementation; tests substitute in-memory stores.

use async_trait::async_trait;

use shared::models::{OrderedEntity, ScopeKey};
use shared::request::{EntityCreate, EntityPatch};

use crate::ClientResult;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create an entity (client-chosen id and order when given)
    async fn create_entity(&self, scope: ScopeKey, data: EntityCreate) -> ClientResult<OrderedEntity>;

    /// Shallow-merge `patch` into the entity's props
    async fn update_entity(&self, scope: ScopeKey, id: i64, patch: EntityPatch)
    -> ClientResult<OrderedEntity>;

    /// Delete an entity, returning its id
    async fn delete_entity(&self, scope: ScopeKey, id: i64) -> ClientResult<i64>;

    /// Move `source_id` to the current position of `target_id`
    async fn reorder_entities(&self, scope: ScopeKey, source_id: i64, target_id: i64) -> ClientResult<()>;

    /// Entire scope in order
    async fn fetch_scope(&self, scope: ScopeKey) -> ClientResult<Vec<OrderedEntity>>;
}
