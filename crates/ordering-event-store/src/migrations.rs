//! Embedded schema migrations.

use sqlx::PgPool;
use sqlx::migrate::MigrateError;

/// Applies any pending event store migrations from `migrations/event_store`,
/// embedded at compile time.
///
/// The read model may live in the same database and share its migration
/// history, so versions applied by other migrators are not treated as
/// missing.
///
/// # Errors
///
/// Returns the migrator's error if a migration fails or an applied event
/// store migration no longer matches its embedded file.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    let mut migrator = sqlx::migrate!("../../migrations/event_store");
    migrator.set_ignore_missing(true);
    migrator.run(pool).await
}
