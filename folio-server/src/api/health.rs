//! 健康检查路由
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/health | GET | 健康检查 (含数据库连通性) |

use axum::{Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;
use crate::utils::ApiResponse;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/health", get(health))
}

/// 健康检查响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// 状态 (ok | degraded)
    status: &'static str,
    /// 版本号
    version: &'static str,
    /// 数据库是否可用
    database: bool,
}

async fn health(State(state): State<ServerState>) -> ApiResponse<HealthResponse> {
    let database = sqlx::query("SELECT 1").execute(state.pool()).await.is_ok();
    if !database {
        tracing::warn!("Health check: database unreachable");
    }

    ApiResponse::success(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}
