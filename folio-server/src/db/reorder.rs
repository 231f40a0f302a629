//! Scoped Reorder Engine
//!
//! Moves one entity to another entity's position inside a scope while keeping
//! the scope's `sort_order` values exactly `0..n-1`.
//!
//! ```text
//! forward  (s < t): rows with s < order <= t get order - 1, source gets t
//! backward (s > t): rows with t <= order < s get order + 1, source gets t
//! ```
//!
//! Both steps run in a single transaction: range shift first, then placement.
//! Errors are returned as-is; dropping the uncommitted transaction rolls back
//! every row it touched. The transaction starts with `BEGIN IMMEDIATE`, so
//! concurrent reorders of the same scope queue on SQLite's write lock (bounded
//! by `busy_timeout`); nothing in-process serializes them.

use super::repository::{OrderedTable, RepoError, RepoResult, begin_write, position_in_scope};
use shared::models::ScopeKey;
use shared::util::now_millis;
use sqlx::SqlitePool;

/// Result of a reorder request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderOutcome {
    /// Source moved from one position to another
    Moved { from: i32, to: i32 },
    /// Nothing to do (same entity, or already in place)
    NoOp,
}

/// Move `source_id` to the position currently held by `target_id` within `scope`.
pub async fn reorder(
    pool: &SqlitePool,
    scope: ScopeKey,
    source_id: i64,
    target_id: i64,
) -> RepoResult<ReorderOutcome> {
    if source_id == target_id {
        return Ok(ReorderOutcome::NoOp);
    }

    let t = OrderedTable::of(scope.kind);
    let mut tx = begin_write(pool).await?;

    let source_order = position_in_scope(&mut *tx, scope, source_id)
        .await?
        .ok_or(RepoError::NotFound {
            scope,
            id: source_id,
        })?;
    let target_order = position_in_scope(&mut *tx, scope, target_id)
        .await?
        .ok_or(RepoError::NotFound {
            scope,
            id: target_id,
        })?;

    if source_order == target_order {
        tracing::warn!(
            %scope,
            source_id,
            target_id,
            sort_order = source_order,
            "Reorder source and target share a position"
        );
        return Ok(ReorderOutcome::NoOp);
    }

    let now = now_millis();

    // 1. Range shift
    let shift_sql = if source_order < target_order {
        format!(
            "UPDATE {} SET sort_order = sort_order - 1, updated_at = ? \
             WHERE {} = ? AND sort_order > ? AND sort_order <= ?",
            t.table, t.scope_column
        )
    } else {
        format!(
            "UPDATE {} SET sort_order = sort_order + 1, updated_at = ? \
             WHERE {} = ? AND sort_order >= ? AND sort_order < ?",
            t.table, t.scope_column
        )
    };
    let (low, high) = if source_order < target_order {
        (source_order, target_order)
    } else {
        (target_order, source_order)
    };
    let shifted = sqlx::query(&shift_sql)
        .bind(now)
        .bind(scope.parent_id)
        .bind(low)
        .bind(high)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    // 2. Placement
    let place_sql = format!(
        "UPDATE {} SET sort_order = ?, updated_at = ? WHERE id = ? AND {} = ?",
        t.table, t.scope_column
    );
    sqlx::query(&place_sql)
        .bind(target_order)
        .bind(now)
        .bind(source_id)
        .bind(scope.parent_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        %scope,
        source_id,
        target_id,
        from = source_order,
        to = target_order,
        shifted,
        "Entity reordered"
    );

    Ok(ReorderOutcome::Moved {
        from: source_order,
        to: target_order,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use crate::db::repository::{ordered, scope_orders};
    use serde_json::json;
    use shared::request::EntityCreate;

    const SITE: i64 = 1;
    const PAGE: i64 = 100;

    /// Page 100 with blocks A=1, B=2, C=3, D=4 at orders 0..3, plus a second
    /// page 200 holding block X=9.
    async fn seeded() -> SqlitePool {
        let pool = DbService::in_memory().await.unwrap().pool;
        seed(&pool).await;
        pool
    }

    async fn seed(pool: &SqlitePool) {
        for (page_id, order) in [(PAGE, 0), (200, 1)] {
            ordered::create(
                pool,
                ScopeKey::pages_of(SITE),
                EntityCreate {
                    id: Some(page_id),
                    sort_order: Some(order),
                    props: Default::default(),
                },
            )
            .await
            .unwrap();
        }
        for (id, name) in [(1, "A"), (2, "B"), (3, "C"), (4, "D")] {
            ordered::create(
                pool,
                ScopeKey::blocks_of(PAGE),
                EntityCreate {
                    id: Some(id),
                    sort_order: None,
                    props: json!({ "name": name }).as_object().cloned().unwrap(),
                },
            )
            .await
            .unwrap();
        }
        ordered::create(
            pool,
            ScopeKey::blocks_of(200),
            EntityCreate {
                id: Some(9),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    async fn ids_in_order(pool: &SqlitePool, scope: ScopeKey) -> Vec<i64> {
        let rows = scope_orders(pool, scope).await.unwrap();
        for (index, (_, order)) in rows.iter().enumerate() {
            assert_eq!(*order, index as i32, "scope is not dense: {rows:?}");
        }
        rows.into_iter().map(|(id, _)| id).collect()
    }

    #[tokio::test]
    async fn test_forward_move() {
        let pool = seeded().await;
        let scope = ScopeKey::blocks_of(PAGE);

        let outcome = reorder(&pool, scope, 1, 3).await.unwrap();
        assert_eq!(outcome, ReorderOutcome::Moved { from: 0, to: 2 });
        // [B, C, A, D]
        assert_eq!(ids_in_order(&pool, scope).await, vec![2, 3, 1, 4]);
    }

    #[tokio::test]
    async fn test_backward_move() {
        let pool = seeded().await;
        let scope = ScopeKey::blocks_of(PAGE);

        let outcome = reorder(&pool, scope, 4, 2).await.unwrap();
        assert_eq!(outcome, ReorderOutcome::Moved { from: 3, to: 1 });
        // [A, D, B, C]
        assert_eq!(ids_in_order(&pool, scope).await, vec![1, 4, 2, 3]);
    }

    #[tokio::test]
    async fn test_adjacent_swap_and_back() {
        let pool = seeded().await;
        let scope = ScopeKey::blocks_of(PAGE);

        reorder(&pool, scope, 2, 3).await.unwrap();
        assert_eq!(ids_in_order(&pool, scope).await, vec![1, 3, 2, 4]);
        reorder(&pool, scope, 2, 3).await.unwrap();
        assert_eq!(ids_in_order(&pool, scope).await, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_same_id_is_noop() {
        let pool = seeded().await;
        let scope = ScopeKey::blocks_of(PAGE);

        assert_eq!(
            reorder(&pool, scope, 2, 2).await.unwrap(),
            ReorderOutcome::NoOp
        );
        assert_eq!(ids_in_order(&pool, scope).await, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_same_id_unknown_entity_is_noop() {
        let pool = seeded().await;
        // storage is not consulted at all
        assert_eq!(
            reorder(&pool, ScopeKey::blocks_of(PAGE), 777, 777).await.unwrap(),
            ReorderOutcome::NoOp
        );
    }

    #[tokio::test]
    async fn test_source_outside_scope_is_not_found() {
        let pool = seeded().await;
        let scope = ScopeKey::blocks_of(PAGE);

        let err = reorder(&pool, scope, 9, 2).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound { id: 9, .. }));
        assert_eq!(ids_in_order(&pool, scope).await, vec![1, 2, 3, 4]);
        assert_eq!(ids_in_order(&pool, ScopeKey::blocks_of(200)).await, vec![9]);
    }

    #[tokio::test]
    async fn test_target_missing_is_not_found() {
        let pool = seeded().await;
        let scope = ScopeKey::blocks_of(PAGE);

        let err = reorder(&pool, scope, 1, 12345).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound { id: 12345, .. }));
        assert_eq!(ids_in_order(&pool, scope).await, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_every_pair_keeps_scope_dense() {
        let original = [1_i64, 2, 3, 4];
        for (s, &source) in original.iter().enumerate() {
            for (t, &target) in original.iter().enumerate() {
                let pool = seeded().await;
                let scope = ScopeKey::blocks_of(PAGE);
                reorder(&pool, scope, source, target).await.unwrap();

                let mut expected = original.to_vec();
                let moved = expected.remove(s);
                expected.insert(t, moved);
                assert_eq!(
                    ids_in_order(&pool, scope).await,
                    expected,
                    "reorder({source}, {target})"
                );
            }
        }
    }

    #[tokio::test]
    async fn test_page_scope_reorder() {
        let pool = seeded().await;
        let scope = ScopeKey::pages_of(SITE);

        reorder(&pool, scope, 200, PAGE).await.unwrap();
        assert_eq!(ids_in_order(&pool, scope).await, vec![200, PAGE]);
        // blocks untouched
        assert_eq!(
            ids_in_order(&pool, ScopeKey::blocks_of(PAGE)).await,
            vec![1, 2, 3, 4]
        );
    }

    #[tokio::test]
    async fn test_failed_transaction_leaves_no_partial_shift() {
        let pool = seeded().await;
        let scope = ScopeKey::blocks_of(PAGE);

        // Placement of block 1 aborts after the range shift has already run.
        sqlx::query(
            "CREATE TRIGGER reject_placement BEFORE UPDATE OF sort_order ON block \
             WHEN NEW.id = 1 BEGIN SELECT RAISE(ABORT, 'placement rejected'); END",
        )
        .execute(&pool)
        .await
        .unwrap();

        let err = reorder(&pool, scope, 1, 4).await.unwrap_err();
        assert!(matches!(err, RepoError::Database(_)));
        assert_eq!(ids_in_order(&pool, scope).await, vec![1, 2, 3, 4]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_reorders_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.db");
        let pool = DbService::new(path.to_str().unwrap()).await.unwrap().pool;
        seed(&pool).await;
        let scope = ScopeKey::blocks_of(PAGE);

        let (first, second) = tokio::join!(reorder(&pool, scope, 1, 4), reorder(&pool, scope, 2, 3));
        assert!(matches!(first.unwrap(), ReorderOutcome::Moved { .. }));
        assert!(matches!(second.unwrap(), ReorderOutcome::Moved { .. }));

        // both commit orders give [C, B, D, A]
        assert_eq!(ids_in_order(&pool, scope).await, vec![3, 2, 4, 1]);
    }
}
