//! Implements the `Storage` trait with MongoDB. People live in the `people` collection, one
//! document per email.

use crate::error::Res;
use crate::model::Person;
use crate::storage::Storage;
use anyhow::Context;
use mongodb::bson::{doc, Document};
use mongodb::{Client, Collection};
use tracing::{debug, trace};

const PEOPLE: &str = "people";

#[derive(Debug, Clone)]
pub struct MongoStorage {
    people: Collection<Person>,
}

impl MongoStorage {
    /// Connects to `uri`. The driver connects lazily, so a bad host only shows up on first use.
    pub async fn connect(uri: &str, database: &str) -> Res<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .context("Unable to create the MongoDB client")?;
        debug!("Using collection {database}.{PEOPLE}");
        Ok(Self {
            people: client.database(database).collection(PEOPLE),
        })
    }
}

fn by_email(email: &str) -> Document {
    doc! { "email": email }
}

fn insert_if_absent(email: &str) -> Document {
    doc! { "$setOnInsert": { "email": email, "accounts": [] } }
}

#[async_trait::async_trait]
impl Storage for MongoStorage {
    async fn get(&self, email: &str) -> Res<Option<Person>> {
        trace!("get {email}");
        self.people
            .find_one(by_email(email))
            .await
            .with_context(|| format!("Failed to look up {email}"))
    }

    async fn create(&self, email: &str) -> Res<bool> {
        trace!("create {email}");
        let result = self
            .people
            .update_one(by_email(email), insert_if_absent(email))
            .upsert(true)
            .await
            .with_context(|| format!("Failed to create {email}"))?;
        Ok(result.upserted_id.is_none())
    }

    async fn update(&self, person: &Person) -> Res<()> {
        trace!("update {}", person.email);
        self.people
            .replace_one(by_email(&person.email), person)
            .upsert(true)
            .await
            .with_context(|| format!("Failed to update {}", person.email))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documents() {
        assert_eq!(
            by_email("pat@example.com").get_str("email").unwrap(),
            "pat@example.com"
        );
        let update = insert_if_absent("pat@example.com");
        let set = update.get_document("$setOnInsert").unwrap();
        assert_eq!(set.get_str("email").unwrap(), "pat@example.com");
        assert!(set.get_array("accounts").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connect_is_lazy() {
        let storage = MongoStorage::connect("mongodb://127.0.0.1:1", "cashcoach_test").await;
        assert!(storage.is_ok());
        assert!(MongoStorage::connect("not a uri", "x").await.is_err());
    }
}
