//! Block API 模块
//!
//! Blocks are ordered within a page.

mod handler;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/pages/{page_id}/blocks", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/reorder", post(handler::reorder))
        .route("/{id}", put(handler::update).delete(handler::delete))
}
