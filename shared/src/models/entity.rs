//! Ordered entity model
//!
//! Pages (within a site) and blocks (within a page) share one shape: an id, the
//! id of the scope they live in, a dense zero-based `sort_order` and a bag of
//! JSON props.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Free-form entity properties (title, content, style, ...)
pub type Props = Map<String, Value>;

/// Which ordered collection an entity belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Pages, scoped by site
    Page,
    /// Blocks, scoped by page
    Block,
}

impl EntityKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Block => "block",
        }
    }

    /// Name of the parent the scope is keyed by
    pub fn parent_name(&self) -> &'static str {
        match self {
            Self::Page => "site",
            Self::Block => "page",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Partition key of an ordered collection (e.g. the blocks of page 12)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeKey {
    pub kind: EntityKind,
    pub parent_id: i64,
}

impl ScopeKey {
    pub fn pages_of(site_id: i64) -> Self {
        Self {
            kind: EntityKind::Page,
            parent_id: site_id,
        }
    }

    pub fn blocks_of(page_id: i64) -> Self {
        Self {
            kind: EntityKind::Block,
            parent_id: page_id,
        }
    }

    /// REST collection path relative to the API root
    pub fn collection_path(&self) -> String {
        match self.kind {
            EntityKind::Page => format!("api/sites/{}/pages", self.parent_id),
            EntityKind::Block => format!("api/pages/{}/blocks", self.parent_id),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}s@{}:{}",
            self.kind,
            self.kind.parent_name(),
            self.parent_id
        )
    }
}

/// Persisted ordered entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedEntity {
    pub id: i64,
    /// Id of the parent scope (site for pages, page for blocks)
    pub scope_id: i64,
    pub sort_order: i32,
    #[serde(default)]
    pub props: Props,
}

/// Shallow merge `patch` into `props`.
///
/// Top-level keys are replaced wholesale; a `null` value removes the key, so
/// merged props never contain `null`.
pub fn merge_props(props: &mut Props, patch: &Props) {
    for (key, value) in patch {
        if value.is_null() {
            props.remove(key);
        } else {
            props.insert(key.clone(), value.clone());
        }
    }
}

/// Prior values of exactly the keys `patch` touches (`null` for absent keys).
///
/// Merging the result back with [`merge_props`] undoes the patch.
pub fn prior_values(props: &Props, patch: &Props) -> Props {
    patch
        .keys()
        .map(|key| (key.clone(), props.get(key).cloned().unwrap_or(Value::Null)))
        .collect()
}
