//! # Schema Migrations
//!
//! Migrations live in `migrations/` and follow the `YYYYMMDDHHMMSS_description.sql`
//! naming convention. They are embedded at compile time and applied with
//! sqlx's migrator, which serializes concurrent runners with an advisory lock.

use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::info;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Apply every outstanding migration.
pub async fn run(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await?;
    info!(
        migrations = MIGRATOR.iter().count(),
        "🗄️ DATABASE: schema migrations applied"
    );
    Ok(())
}
