//! Implements the `Storage` trait with a SQLite file. Linked accounts are kept as a JSON document
//! in the `accounts` column.

use crate::error::Res;
use crate::model::{LinkedAccount, Person};
use crate::storage::{migrations, Storage};
use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::trace;

#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Opens the database at `path`, creating it if it does not exist, and brings its schema up
    /// to date.
    pub async fn connect(path: &Path) -> Res<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .context("Failed to parse SQLite connection string")?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open the SQLite database {}", path.display()))?;
        migrations::migrate(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl Storage for SqliteStorage {
    async fn get(&self, email: &str) -> Res<Option<Person>> {
        trace!("get {email}");
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT email, accounts FROM people WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to query people")?;
        let Some((email, accounts)) = row else {
            return Ok(None);
        };
        let accounts: Vec<LinkedAccount> = serde_json::from_str(&accounts)
            .with_context(|| format!("The stored accounts of {email} are not valid JSON"))?;
        Ok(Some(Person { email, accounts }))
    }

    async fn create(&self, email: &str) -> Res<bool> {
        trace!("create {email}");
        let result = sqlx::query("INSERT OR IGNORE INTO people (email, accounts) VALUES (?, '[]')")
            .bind(email)
            .execute(&self.pool)
            .await
            .context("Failed to insert into people")?;
        Ok(result.rows_affected() == 0)
    }

    async fn update(&self, person: &Person) -> Res<()> {
        trace!("update {}", person.email);
        let accounts =
            serde_json::to_string(&person.accounts).context("Unable to serialize accounts")?;
        sqlx::query(
            "INSERT INTO people (email, accounts) VALUES (?, ?) \
             ON CONFLICT(email) DO UPDATE SET accounts = excluded.accounts, \
             updated_at = CURRENT_TIMESTAMP",
        )
        .bind(&person.email)
        .bind(accounts)
        .execute(&self.pool)
        .await
        .context("Failed to update people")?;
        Ok(())
    }
}
