//! Repository Module
//!
//! Provides scope-constrained operations for the ordered tables (`page`, `block`).

pub mod ordered;

use shared::error::{AppError, ErrorCode};
use shared::models::{EntityKind, OrderedEntity, Props, ScopeKey};
use sqlx::{Sqlite, SqliteExecutor, SqlitePool, Transaction};
use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{} {id} not found in {scope}", .scope.kind)]
    NotFound { scope: ScopeKey, id: i64 },

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// SQLite reported the database as busy/locked; the transaction was rolled back
    #[error("Database busy: {0}")]
    Busy(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_BUSY_SNAPSHOT (517)
            if matches!(db_err.code().as_deref(), Some("5" | "6" | "517")) {
                return RepoError::Busy(db_err.message().to_string());
            }
        }
        RepoError::Database(err.to_string())
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound { scope, id } => {
                let code = match scope.kind {
                    EntityKind::Page => ErrorCode::PageNotFound,
                    EntityKind::Block => ErrorCode::BlockNotFound,
                };
                AppError::with_message(code, format!("{} {id} not found in {scope}", scope.kind))
                    .with_detail("id", id)
                    .with_detail("scope_id", scope.parent_id)
            }
            RepoError::Duplicate(msg) => AppError::with_message(ErrorCode::AlreadyExists, msg),
            RepoError::Validation(msg) => AppError::validation(msg),
            RepoError::Busy(msg) => AppError::with_message(ErrorCode::SystemBusy, msg),
            RepoError::Database(msg) => AppError::database(msg),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

// =============================================================================
// Table mapping: 每种实体对应一张表和一个 scope 列
// =============================================================================

/// Physical table backing an ordered collection
#[derive(Debug, Clone, Copy)]
pub(crate) struct OrderedTable {
    pub table: &'static str,
    pub scope_column: &'static str,
}

impl OrderedTable {
    pub(crate) const fn of(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Page => Self {
                table: "page",
                scope_column: "site_id",
            },
            EntityKind::Block => Self {
                table: "block",
                scope_column: "page_id",
            },
        }
    }
}

/// Raw row as stored; `props` is JSON text
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EntityRow {
    pub id: i64,
    pub scope_id: i64,
    pub sort_order: i32,
    pub props: String,
}

impl TryFrom<EntityRow> for OrderedEntity {
    type Error = RepoError;

    fn try_from(row: EntityRow) -> Result<Self, Self::Error> {
        let props: Props = serde_json::from_str(&row.props)
            .map_err(|e| RepoError::Database(format!("Corrupt props for id {}: {e}", row.id)))?;
        Ok(OrderedEntity {
            id: row.id,
            scope_id: row.scope_id,
            sort_order: row.sort_order,
            props,
        })
    }
}

/// Open a write transaction holding SQLite's write lock from `BEGIN`.
///
/// Concurrent writers wait under `busy_timeout` instead of reading a snapshot
/// that another writer then invalidates (`SQLITE_BUSY_SNAPSHOT`).
pub(crate) async fn begin_write(pool: &SqlitePool) -> RepoResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Current `sort_order` of `id` within `scope`, or `None` if it is not there
pub(crate) async fn position_in_scope<'e, E>(
    executor: E,
    scope: ScopeKey,
    id: i64,
) -> RepoResult<Option<i32>>
where
    E: SqliteExecutor<'e>,
{
    let t = OrderedTable::of(scope.kind);
    let sql = format!(
        "SELECT sort_order FROM {} WHERE id = ? AND {} = ?",
        t.table, t.scope_column
    );
    let order = sqlx::query_scalar::<Sqlite, i32>(&sql)
        .bind(id)
        .bind(scope.parent_id)
        .fetch_optional(executor)
        .await?;
    Ok(order)
}

/// `(id, sort_order)` pairs of a scope in order
#[cfg(test)]
pub(crate) async fn scope_orders<'e, E>(executor: E, scope: ScopeKey) -> RepoResult<Vec<(i64, i32)>>
where
    E: SqliteExecutor<'e>,
{
    let t = OrderedTable::of(scope.kind);
    let sql = format!(
        "SELECT id, sort_order FROM {} WHERE {} = ? ORDER BY sort_order, id",
        t.table, t.scope_column
    );
    let rows = sqlx::query_as::<Sqlite, (i64, i32)>(&sql)
        .bind(scope.parent_id)
        .fetch_all(executor)
        .await?;
    Ok(rows)
}
