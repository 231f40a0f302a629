//! Page API Handlers

use axum::{
    Json,
    extract::{Path, State},
};

use shared::models::{OrderedEntity, ScopeKey};
use shared::request::{EntityCreate, EntityPatch, ReorderRequest, ReorderResponse};

use crate::api::ordered;
use crate::core::ServerState;
use crate::utils::{ApiResponse, AppResult};

/// GET /api/sites/{site_id}/pages - 按顺序列出站点页面
pub async fn list(
    State(state): State<ServerState>,
    Path(site_id): Path<i64>,
) -> AppResult<ApiResponse<Vec<OrderedEntity>>> {
    ordered::list(&state, ScopeKey::pages_of(site_id)).await
}

/// POST /api/sites/{site_id}/pages - 创建页面
pub async fn create(
    State(state): State<ServerState>,
    Path(site_id): Path<i64>,
    Json(payload): Json<EntityCreate>,
) -> AppResult<ApiResponse<OrderedEntity>> {
    ordered::create(&state, ScopeKey::pages_of(site_id), payload).await
}

/// PUT /api/sites/{site_id}/pages/{id} - 更新页面属性
pub async fn update(
    State(state): State<ServerState>,
    Path((site_id, id)): Path<(i64, i64)>,
    Json(payload): Json<EntityPatch>,
) -> AppResult<ApiResponse<OrderedEntity>> {
    ordered::update(&state, ScopeKey::pages_of(site_id), id, payload).await
}

/// DELETE /api/sites/{site_id}/pages/{id} - 删除页面 (连同其区块)
pub async fn delete(
    State(state): State<ServerState>,
    Path((site_id, id)): Path<(i64, i64)>,
) -> AppResult<ApiResponse<i64>> {
    ordered::delete(&state, ScopeKey::pages_of(site_id), id).await
}

/// POST /api/sites/{site_id}/pages/reorder - 页面排序
pub async fn reorder(
    State(state): State<ServerState>,
    Path(site_id): Path<i64>,
    Json(payload): Json<ReorderRequest>,
) -> AppResult<ApiResponse<ReorderResponse>> {
    ordered::reorder_in_scope(&state, ScopeKey::pages_of(site_id), payload).await
}
