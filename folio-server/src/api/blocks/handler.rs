//! Block API Handlers

use axum::{
    Json,
    extract::{Path, State},
};

use shared::models::{OrderedEntity, ScopeKey};
use shared::request::{EntityCreate, EntityPatch, ReorderRequest, ReorderResponse};

use crate::api::ordered;
use crate::core::ServerState;
use crate::utils::{ApiResponse, AppResult};

/// GET /api/pages/{page_id}/blocks - 按顺序列出页面区块
pub async fn list(
    State(state): State<ServerState>,
    Path(page_id): Path<i64>,
) -> AppResult<ApiResponse<Vec<OrderedEntity>>> {
    ordered::list(&state, ScopeKey::blocks_of(page_id)).await
}

/// POST /api/pages/{page_id}/blocks - 创建区块 (页面必须存在)
pub async fn create(
    State(state): State<ServerState>,
    Path(page_id): Path<i64>,
    Json(payload): Json<EntityCreate>,
) -> AppResult<ApiResponse<OrderedEntity>> {
    ordered::create(&state, ScopeKey::blocks_of(page_id), payload).await
}

/// PUT /api/pages/{page_id}/blocks/{id} - 更新区块属性 (浅合并, null 删除键)
pub async fn update(
    State(state): State<ServerState>,
    Path((page_id, id)): Path<(i64, i64)>,
    Json(payload): Json<EntityPatch>,
) -> AppResult<ApiResponse<OrderedEntity>> {
    ordered::update(&state, ScopeKey::blocks_of(page_id), id, payload).await
}

/// DELETE /api/pages/{page_id}/blocks/{id} - 删除区块
pub async fn delete(
    State(state): State<ServerState>,
    Path((page_id, id)): Path<(i64, i64)>,
) -> AppResult<ApiResponse<i64>> {
    ordered::delete(&state, ScopeKey::blocks_of(page_id), id).await
}

/// POST /api/pages/{page_id}/blocks/reorder - 区块排序
pub async fn reorder(
    State(state): State<ServerState>,
    Path(page_id): Path<i64>,
    Json(payload): Json<ReorderRequest>,
) -> AppResult<ApiResponse<ReorderResponse>> {
    ordered::reorder_in_scope(&state, ScopeKey::blocks_of(page_id), payload).await
}
