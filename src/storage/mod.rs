//! Persistence for `Person` records. The web server only ever looks people up by email, creates
//! them on first sign-in and appends linked accounts, so the interface is small.

mod memory;
mod migrations;
mod mongo;
mod sqlite;

use crate::config::StorageConfig;
use crate::error::Res;
use crate::model::Person;
use crate::Config;
use std::sync::Arc;
use tracing::info;

pub use memory::MemoryStorage;
pub use mongo::MongoStorage;
pub use sqlite::SqliteStorage;

/// A document store of `Person` records keyed by email.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    /// Looks up a person. `None` when nobody with that email has signed in.
    async fn get(&self, email: &str) -> Res<Option<Person>>;

    /// Creates an empty person unless one exists. Returns `true` when the person already existed.
    async fn create(&self, email: &str) -> Res<bool>;

    /// Replaces the stored person, inserting it if it is missing.
    async fn update(&self, person: &Person) -> Res<()>;
}

/// Opens the storage backend that `config` selects.
pub async fn open(config: &Config) -> Res<Arc<dyn Storage>> {
    match config.storage() {
        StorageConfig::Memory { access_token } => {
            info!("Using in-memory storage, nothing will be saved");
            Ok(Arc::new(MemoryStorage::new(access_token.clone())))
        }
        StorageConfig::Sqlite { .. } => {
            let path = config.sqlite_path();
            info!("Using SQLite storage at {}", path.display());
            Ok(Arc::new(SqliteStorage::connect(&path).await?))
        }
        StorageConfig::Mongo { uri, database } => {
            info!("Using MongoDB database '{database}'");
            Ok(Arc::new(MongoStorage::connect(uri, database).await?))
        }
    }
}
