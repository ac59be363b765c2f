//! Schema migrations for the SQLite store.
//!
//! Each schema version `NN` has a `migration_NN_up.sql` in this directory that takes the schema
//! from `NN-1` to `NN`.
//!
//! The current version is the single row of the `schema_version` table.

use crate::error::Res;
use anyhow::{bail, Context};
use sqlx::{Executor, SqlitePool};
use tracing::debug;

struct Migration {
    version: i32,
    up_sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    up_sql: include_str!("migration_01_up.sql"),
}];

/// The schema version this build of cashcoach expects.
pub(crate) const LATEST: i32 = 1;

/// Creates `schema_version` if needed and migrates the database up to `LATEST`. A database written
/// by a newer cashcoach is an error rather than being migrated down.
pub(crate) async fn migrate(pool: &SqlitePool) -> Res<()> {
    sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .execute(pool)
        .await
        .context("Failed to create the schema_version table")?;

    let current = current_version(pool).await?;
    if current > LATEST {
        bail!(
            "The database schema is at version {current} but this version of cashcoach only \
            understands up to {LATEST}"
        );
    }
    run(pool, current, LATEST).await
}

/// The version recorded in `schema_version`, or 0 for a new database.
pub(crate) async fn current_version(pool: &SqlitePool) -> Res<i32> {
    let row: (Option<i32>,) = sqlx::query_as("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .context("Failed to read the schema version")?;
    Ok(row.0.unwrap_or(0))
}

/// Moves the schema up from `from` to `to`, one version at a time.
async fn run(pool: &SqlitePool, from: i32, to: i32) -> Res<()> {
    if from >= to {
        debug!("Database schema is at version {from}");
        return Ok(());
    }
    check_available(from, to)?;

    for version in (from + 1)..=to {
        debug!("Migrating the database up to version {version:02}");
        apply(pool, find(version)?.up_sql, version).await?;
    }
    Ok(())
}

fn find(version: i32) -> Res<&'static Migration> {
    MIGRATIONS
        .iter()
        .find(|m| m.version == version)
        .with_context(|| format!("Migration {version} not found"))
}

/// Runs `sql` and records `new_version` in one transaction.
async fn apply(pool: &SqlitePool, sql: &str, new_version: i32) -> Res<()> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin migration transaction")?;

    tx.execute(sql)
        .await
        .context("Failed to execute migration SQL")?;

    sqlx::query("DELETE FROM schema_version")
        .execute(&mut *tx)
        .await
        .context("Failed to clear schema_version")?;

    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(new_version)
        .execute(&mut *tx)
        .await
        .context("Failed to update schema_version")?;

    tx.commit()
        .await
        .context("Failed to commit migration transaction")?;
    Ok(())
}

/// Fails before touching the database if any step between `from` and `to` has no migration.
fn check_available(from: i32, to: i32) -> Res<()> {
    for version in (from + 1)..=to {
        if !MIGRATIONS.iter().any(|m| m.version == version) {
            bail!("Migration {version} is missing but required to migrate from version {from} to {to}");
        }
    }
    Ok(())
}
