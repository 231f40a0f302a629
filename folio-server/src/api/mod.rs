//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`pages`] - 站点内页面 (scope = site)
//! - [`blocks`] - 页面内区块 (scope = page)
//!
//! pages 和 blocks 共用 [`ordered`] 中的通用 handler，仅路径参数不同。

pub mod blocks;
pub mod health;
pub mod ordered;
pub mod pages;

use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

// Re-export common types for handlers
pub use crate::utils::{ApiResponse, AppError, AppResult};

/// Request body limit (props are capped at 64 KiB, leave headroom for the envelope)
const BODY_LIMIT: usize = 256 * 1024;

/// Build a router with all routes registered (no middleware, no state)
pub fn build_router() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(pages::router())
        .merge(blocks::router())
}

/// Build a fully configured application with all middleware
///
/// Used by both the HTTP server and router tests.
pub fn build_app(state: &ServerState) -> Router<ServerState> {
    let timeout = Duration::from_millis(state.config.request_timeout_ms);

    build_router()
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TimeoutLayer::with_status_code(
            http::StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(ConcurrencyLimitLayer::new(64))
        // CORS - editor runs on another origin
        .layer(CorsLayer::permissive())
        // Trace - Request tracing (logs at INFO level)
        .layer(TraceLayer::new_for_http())
}
