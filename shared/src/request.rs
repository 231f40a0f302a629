//! Request payloads for the ordered-collection API
//!
//! Shared between folio-server (handlers) and folio-client (remote calls).

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::Props;

/// Upper bound on the serialized size of a props payload
pub const MAX_PROPS_BYTES: usize = 64 * 1024;

/// Create entity payload
///
/// `id` is optional so that a client can re-create a deleted entity under its
/// original id (undo of a delete). `sort_order` defaults to the end of the scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct EntityCreate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0))]
    pub sort_order: Option<i32>,
    #[serde(default)]
    #[validate(custom(function = "validate_props"))]
    pub props: Props,
}

/// Partial update payload (shallow merge, `null` removes a key)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct EntityPatch {
    #[validate(custom(function = "validate_props"))]
    pub props: Props,
}

/// Move `source_id` to the current position of `target_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ReorderRequest {
    #[validate(range(min = 1))]
    pub source_id: i64,
    #[validate(range(min = 1))]
    pub target_id: i64,
}

/// Result of a reorder call
///
/// `moved = false` means the request was a no-op (same entity, or already in place).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderResponse {
    pub moved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<i32>,
}

fn validate_props(props: &Props) -> Result<(), ValidationError> {
    if props.keys().any(|k| k.is_empty()) {
        return Err(ValidationError::new("empty_key"));
    }
    let size = serde_json::to_vec(props).map(|v| v.len()).unwrap_or(usize::MAX);
    if size > MAX_PROPS_BYTES {
        return Err(ValidationError::new("props_too_large"));
    }
    Ok(())
}
