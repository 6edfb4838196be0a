//! Schema migrations for the event store and read model databases.

mod common;

use ordering_api::read_model::run_read_model_migrations;
use ordering_event_store::run_migrations;
use sqlx::PgPool;

async fn table_exists(pool: &PgPool, table: &str) -> bool {
    sqlx::query_scalar::<_, Option<String>>("SELECT to_regclass($1)::text")
        .bind(table)
        .fetch_one(pool)
        .await
        .unwrap()
        .is_some()
}

#[sqlx::test(migrations = false)]
async fn test_read_model_migrations_create_only_the_orders_table(pool: PgPool) {
    // Act
    run_read_model_migrations(&pool).await.unwrap();

    // Assert
    assert!(table_exists(&pool, "orders").await);
    assert!(!table_exists(&pool, "events").await);
    assert!(!table_exists(&pool, "subscriptions").await);
}

#[sqlx::test(migrations = false)]
async fn test_event_store_migrations_leave_out_the_orders_table(pool: PgPool) {
    // Act
    run_migrations(&pool).await.unwrap();

    // Assert
    assert!(table_exists(&pool, "events").await);
    assert!(table_exists(&pool, "subscriptions").await);
    assert!(!table_exists(&pool, "orders").await);
}

#[sqlx::test(migrations = false)]
async fn test_both_migration_sets_share_one_database(pool: PgPool) {
    // Arrange
    common::migrate(&pool).await;

    // Act
    let rerun_event_store = run_migrations(&pool).await;
    let rerun_read_model = run_read_model_migrations(&pool).await;

    // Assert
    assert!(rerun_event_store.is_ok());
    assert!(rerun_read_model.is_ok());
    assert!(table_exists(&pool, "events").await);
    assert!(table_exists(&pool, "orders").await);
}
