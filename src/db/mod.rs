pub mod models;

use sqlx::SqlitePool;

/// Opens the pool and applies the schema. Migrations are plain SQL run
/// with `raw_sql` rather than `sqlx::query!`: there is never a DB
/// reachable at build time, so every query in this crate is checked at
/// runtime only.
pub async fn connect_and_migrate(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePool::connect(database_url).await?;

    sqlx::raw_sql(include_str!("../migrations/001_initial.sql"))
        .execute(&pool)
        .await?;
    sqlx::raw_sql(include_str!("../migrations/002_indices.sql"))
        .execute(&pool)
        .await?;

    Ok(pool)
}
