//! Scope-generic handlers shared by pages and blocks
//!
//! Each route module extracts its path parameters into a [`ScopeKey`] and
//! delegates here.

use validator::Validate;

use shared::models::{OrderedEntity, ScopeKey};
use shared::request::{EntityCreate, EntityPatch, ReorderRequest, ReorderResponse};

use crate::core::ServerState;
use crate::db::repository::ordered;
use crate::db::{ReorderOutcome, reorder};
use crate::utils::{ApiResponse, AppResult};

pub async fn list(state: &ServerState, scope: ScopeKey) -> AppResult<ApiResponse<Vec<OrderedEntity>>> {
    let entities = ordered::find_in_scope(state.pool(), scope).await?;
    Ok(ApiResponse::success(entities))
}

pub async fn create(
    state: &ServerState,
    scope: ScopeKey,
    payload: EntityCreate,
) -> AppResult<ApiResponse<OrderedEntity>> {
    payload.validate()?;
    let entity = ordered::create(state.pool(), scope, payload).await?;
    Ok(ApiResponse::success(entity))
}

pub async fn update(
    state: &ServerState,
    scope: ScopeKey,
    id: i64,
    payload: EntityPatch,
) -> AppResult<ApiResponse<OrderedEntity>> {
    payload.validate()?;
    let entity = ordered::update(state.pool(), scope, id, payload).await?;
    Ok(ApiResponse::success(entity))
}

pub async fn delete(state: &ServerState, scope: ScopeKey, id: i64) -> AppResult<ApiResponse<i64>> {
    let id = ordered::delete(state.pool(), scope, id).await?;
    Ok(ApiResponse::success(id))
}

pub async fn reorder_in_scope(
    state: &ServerState,
    scope: ScopeKey,
    payload: ReorderRequest,
) -> AppResult<ApiResponse<ReorderResponse>> {
    payload.validate()?;
    let outcome = reorder(state.pool(), scope, payload.source_id, payload.target_id).await?;
    let response = match outcome {
        ReorderOutcome::Moved { from, to } => ReorderResponse {
            moved: true,
            from: Some(from),
            to: Some(to),
        },
        ReorderOutcome::NoOp => ReorderResponse::default(),
    };
    Ok(ApiResponse::success(response))
}
