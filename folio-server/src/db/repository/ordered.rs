//! Ordered Repository
//!
//! CRUD for pages and blocks. Every write that affects positions (create with
//! an explicit order, delete) runs in one transaction so the scope stays dense.

use super::{EntityRow, OrderedTable, RepoError, RepoResult, begin_write, position_in_scope};
use shared::models::{EntityKind, OrderedEntity, ScopeKey, merge_props};
use shared::request::{EntityCreate, EntityPatch};
use shared::util::{now_millis, snowflake_id};
use sqlx::{Sqlite, SqliteExecutor, SqlitePool};

fn select_sql(t: OrderedTable) -> String {
    format!(
        "SELECT id, {} AS scope_id, sort_order, props FROM {}",
        t.scope_column, t.table
    )
}

pub async fn find_in_scope(pool: &SqlitePool, scope: ScopeKey) -> RepoResult<Vec<OrderedEntity>> {
    let t = OrderedTable::of(scope.kind);
    let sql = format!(
        "{} WHERE {} = ? ORDER BY sort_order, id",
        select_sql(t),
        t.scope_column
    );
    let rows = sqlx::query_as::<Sqlite, EntityRow>(&sql)
        .bind(scope.parent_id)
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(OrderedEntity::try_from).collect()
}

pub async fn find_by_id<'e, E>(
    executor: E,
    scope: ScopeKey,
    id: i64,
) -> RepoResult<Option<OrderedEntity>>
where
    E: SqliteExecutor<'e>,
{
    let t = OrderedTable::of(scope.kind);
    let sql = format!("{} WHERE id = ? AND {} = ?", select_sql(t), t.scope_column);
    let row = sqlx::query_as::<Sqlite, EntityRow>(&sql)
        .bind(id)
        .bind(scope.parent_id)
        .fetch_optional(executor)
        .await?;
    row.map(OrderedEntity::try_from).transpose()
}

pub async fn count_in_scope<'e, E>(executor: E, scope: ScopeKey) -> RepoResult<i64>
where
    E: SqliteExecutor<'e>,
{
    let t = OrderedTable::of(scope.kind);
    let sql = format!("SELECT COUNT(*) FROM {} WHERE {} = ?", t.table, t.scope_column);
    let count = sqlx::query_scalar::<Sqlite, i64>(&sql)
        .bind(scope.parent_id)
        .fetch_one(executor)
        .await?;
    Ok(count)
}

/// Insert an entity.
///
/// Without `sort_order` the entity is appended; with one (clamped to the scope
/// size) every entity at or after that position moves down by one.
pub async fn create(
    pool: &SqlitePool,
    scope: ScopeKey,
    data: EntityCreate,
) -> RepoResult<OrderedEntity> {
    let t = OrderedTable::of(scope.kind);
    let now = now_millis();
    let id = data.id.unwrap_or_else(snowflake_id);
    let props = serde_json::to_string(&data.props)
        .map_err(|e| RepoError::Validation(format!("Invalid props: {e}")))?;

    let mut tx = begin_write(pool).await?;

    if scope.kind == EntityKind::Block {
        let page_count = sqlx::query_scalar::<Sqlite, i64>("SELECT COUNT(*) FROM page WHERE id = ?")
            .bind(scope.parent_id)
            .fetch_one(&mut *tx)
            .await?;
        if page_count == 0 {
            return Err(RepoError::Validation(format!(
                "Page {} does not exist",
                scope.parent_id
            )));
        }
    }

    let exists_sql = format!("SELECT COUNT(*) FROM {} WHERE id = ?", t.table);
    let exists = sqlx::query_scalar::<Sqlite, i64>(&exists_sql)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    if exists > 0 {
        return Err(RepoError::Duplicate(format!("{} {id} already exists", scope.kind)));
    }

    let count = count_in_scope(&mut *tx, scope).await? as i32;
    let sort_order = data.sort_order.map_or(count, |o| o.clamp(0, count));

    if sort_order < count {
        let shift_sql = format!(
            "UPDATE {} SET sort_order = sort_order + 1, updated_at = ? WHERE {} = ? AND sort_order >= ?",
            t.table, t.scope_column
        );
        sqlx::query(&shift_sql)
            .bind(now)
            .bind(scope.parent_id)
            .bind(sort_order)
            .execute(&mut *tx)
            .await?;
    }

    let insert_sql = format!(
        "INSERT INTO {} (id, {}, sort_order, props, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        t.table, t.scope_column
    );
    sqlx::query(&insert_sql)
        .bind(id)
        .bind(scope.parent_id)
        .bind(sort_order)
        .bind(&props)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    let created = find_by_id(&mut *tx, scope, id)
        .await?
        .ok_or_else(|| RepoError::Database(format!("Failed to create {}", scope.kind)))?;
    tx.commit().await?;

    tracing::debug!(%scope, id, sort_order, "Entity created");
    Ok(created)
}

/// Shallow-merge a props patch (`null` removes a key)
pub async fn update(
    pool: &SqlitePool,
    scope: ScopeKey,
    id: i64,
    data: EntityPatch,
) -> RepoResult<OrderedEntity> {
    let t = OrderedTable::of(scope.kind);
    let mut tx = begin_write(pool).await?;

    let mut entity = find_by_id(&mut *tx, scope, id)
        .await?
        .ok_or(RepoError::NotFound { scope, id })?;
    merge_props(&mut entity.props, &data.props);

    let props = serde_json::to_string(&entity.props)
        .map_err(|e| RepoError::Validation(format!("Invalid props: {e}")))?;
    let sql = format!(
        "UPDATE {} SET props = ?, updated_at = ? WHERE id = ? AND {} = ?",
        t.table, t.scope_column
    );
    sqlx::query(&sql)
        .bind(&props)
        .bind(now_millis())
        .bind(id)
        .bind(scope.parent_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(entity)
}

/// Delete an entity and close the gap it leaves. Deleting a page also deletes its blocks.
pub async fn delete(pool: &SqlitePool, scope: ScopeKey, id: i64) -> RepoResult<i64> {
    let t = OrderedTable::of(scope.kind);
    let mut tx = begin_write(pool).await?;

    let sort_order = position_in_scope(&mut *tx, scope, id)
        .await?
        .ok_or(RepoError::NotFound { scope, id })?;

    let delete_sql = format!("DELETE FROM {} WHERE id = ? AND {} = ?", t.table, t.scope_column);
    sqlx::query(&delete_sql)
        .bind(id)
        .bind(scope.parent_id)
        .execute(&mut *tx)
        .await?;

    let shift_sql = format!(
        "UPDATE {} SET sort_order = sort_order - 1, updated_at = ? WHERE {} = ? AND sort_order > ?",
        t.table, t.scope_column
    );
    sqlx::query(&shift_sql)
        .bind(now_millis())
        .bind(scope.parent_id)
        .bind(sort_order)
        .execute(&mut *tx)
        .await?;

    if scope.kind == EntityKind::Page {
        sqlx::query("DELETE FROM block WHERE page_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    tracing::debug!(%scope, id, sort_order, "Entity deleted");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use crate::db::repository::scope_orders;
    use serde_json::json;
    use shared::models::Props;

    const SITE: i64 = 1;
    const PAGE: i64 = 10;

    fn props(value: serde_json::Value) -> Props {
        value.as_object().cloned().unwrap()
    }

    async fn pool_with_page() -> SqlitePool {
        let pool = DbService::in_memory().await.unwrap().pool;
        add_page(&pool).await;
        pool
    }

    async fn add_page(pool: &SqlitePool) {
        create(
            pool,
            ScopeKey::pages_of(SITE),
            EntityCreate {
                id: Some(PAGE),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    async fn add_block(pool: &SqlitePool, id: i64, sort_order: Option<i32>) -> OrderedEntity {
        create(
            pool,
            ScopeKey::blocks_of(PAGE),
            EntityCreate {
                id: Some(id),
                sort_order,
                props: props(json!({ "n": id })),
            },
        )
        .await
        .unwrap()
    }

    async fn orders(pool: &SqlitePool, scope: ScopeKey) -> Vec<(i64, i32)> {
        scope_orders(pool, scope).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_appends() {
        let pool = pool_with_page().await;
        let first = add_block(&pool, 1, None).await;
        let second = add_block(&pool, 2, None).await;

        assert_eq!(first.sort_order, 0);
        assert_eq!(second.sort_order, 1);
        assert_eq!(second.scope_id, PAGE);
        assert_eq!(second.props, props(json!({ "n": 2 })));
    }

    #[tokio::test]
    async fn test_create_at_position_shifts_later_rows() {
        let pool = pool_with_page().await;
        add_block(&pool, 1, None).await;
        add_block(&pool, 2, None).await;
        add_block(&pool, 3, Some(1)).await;

        assert_eq!(
            orders(&pool, ScopeKey::blocks_of(PAGE)).await,
            vec![(1, 0), (3, 1), (2, 2)]
        );
    }

    #[tokio::test]
    async fn test_create_clamps_order_past_end() {
        let pool = pool_with_page().await;
        add_block(&pool, 1, None).await;
        let block = add_block(&pool, 2, Some(99)).await;
        assert_eq!(block.sort_order, 1);
    }

    #[tokio::test]
    async fn test_create_generates_id() {
        let pool = pool_with_page().await;
        let block = create(&pool, ScopeKey::blocks_of(PAGE), EntityCreate::default())
            .await
            .unwrap();
        assert!(block.id > 0);
    }

    #[tokio::test]
    async fn test_create_duplicate_id() {
        let pool = pool_with_page().await;
        add_block(&pool, 1, None).await;
        let err = create(
            &pool,
            ScopeKey::blocks_of(PAGE),
            EntityCreate {
                id: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RepoError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_create_block_requires_page() {
        let pool = pool_with_page().await;
        let err = create(&pool, ScopeKey::blocks_of(404), EntityCreate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_merges_and_removes_null_keys() {
        let pool = pool_with_page().await;
        create(
            &pool,
            ScopeKey::blocks_of(PAGE),
            EntityCreate {
                id: Some(1),
                sort_order: None,
                props: props(json!({ "text": "hi", "color": "red" })),
            },
        )
        .await
        .unwrap();

        let updated = update(
            &pool,
            ScopeKey::blocks_of(PAGE),
            1,
            EntityPatch {
                props: props(json!({ "text": "hello", "color": null, "size": 2 })),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.props, props(json!({ "text": "hello", "size": 2 })));

        let stored = find_by_id(&pool, ScopeKey::blocks_of(PAGE), 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn test_update_outside_scope_is_not_found() {
        let pool = pool_with_page().await;
        add_block(&pool, 1, None).await;
        let err = update(&pool, ScopeKey::blocks_of(PAGE + 1), 1, EntityPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::NotFound { id: 1, .. }));
    }

    #[tokio::test]
    async fn test_delete_closes_gap() {
        let pool = pool_with_page().await;
        for id in 1..=4 {
            add_block(&pool, id, None).await;
        }
        assert_eq!(delete(&pool, ScopeKey::blocks_of(PAGE), 2).await.unwrap(), 2);
        assert_eq!(
            orders(&pool, ScopeKey::blocks_of(PAGE)).await,
            vec![(1, 0), (3, 1), (4, 2)]
        );
        assert_eq!(count_in_scope(&pool, ScopeKey::blocks_of(PAGE)).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let pool = pool_with_page().await;
        let err = delete(&pool, ScopeKey::blocks_of(PAGE), 5).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound { id: 5, .. }));
    }

    #[tokio::test]
    async fn test_delete_page_removes_its_blocks() {
        let pool = pool_with_page().await;
        add_block(&pool, 1, None).await;
        add_block(&pool, 2, None).await;

        delete(&pool, ScopeKey::pages_of(SITE), PAGE).await.unwrap();
        assert!(orders(&pool, ScopeKey::blocks_of(PAGE)).await.is_empty());
        assert!(find_in_scope(&pool, ScopeKey::pages_of(SITE)).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_create_and_delete_keep_scope_dense() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.db");
        let pool = DbService::new(path.to_str().unwrap()).await.unwrap().pool;
        add_page(&pool).await;
        for id in 1..=4 {
            add_block(&pool, id, None).await;
        }

        let scope = ScopeKey::blocks_of(PAGE);
        let data = EntityCreate {
            id: Some(5),
            sort_order: Some(0),
            props: Props::new(),
        };
        let (created, deleted) = tokio::join!(create(&pool, scope, data), delete(&pool, scope, 2));
        created.unwrap();
        deleted.unwrap();

        // either commit order ends the same way
        assert_eq!(orders(&pool, scope).await, vec![(5, 0), (1, 1), (3, 2), (4, 3)]);
    }
}
