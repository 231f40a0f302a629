//! Data models
//!
//! Shared between folio-server and folio-client (via API).
//! All IDs are `i64` (SQLite INTEGER PRIMARY KEY).

pub mod entity;

// Re-exports
pub use entity::*;
