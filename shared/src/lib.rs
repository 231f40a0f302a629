//! Shared types for Folio
//!
//! Common types used by the server and the editor client: ordered entity
//! models, request payloads, the unified error system and small utilities.

pub mod error;
pub mod models;
pub mod request;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use models::{EntityKind, OrderedEntity, Props, ScopeKey};
pub use request::{EntityCreate, EntityPatch, ReorderRequest, ReorderResponse};
