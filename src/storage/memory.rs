//! Implements the `Storage` trait in memory. Useful for development and tests.

use crate::error::Res;
use crate::model::{LinkedAccount, Person};
use crate::storage::Storage;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// The name of the account every unknown person gets when a default token is configured.
const DEFAULT_ACCOUNT: &str = "bank1";

/// A `Storage` that forgets everything when the process exits. When it is given a default access
/// token, anyone who is not stored yet appears to have one linked account, `bank1`, using that
/// token.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    default_token: Option<String>,
    people: Mutex<HashMap<String, Person>>,
}

impl MemoryStorage {
    pub fn new(default_token: Option<String>) -> Self {
        Self {
            default_token: default_token.filter(|t| !t.is_empty()),
            people: Mutex::new(HashMap::new()),
        }
    }

    fn fresh(&self, email: &str) -> Person {
        let mut person = Person::new(email);
        if let Some(token) = &self.default_token {
            person.add_account(LinkedAccount::new(DEFAULT_ACCOUNT, token));
        }
        person
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, email: &str) -> Res<Option<Person>> {
        let people = self.people.lock().await;
        if let Some(person) = people.get(email) {
            return Ok(Some(person.clone()));
        }
        Ok(self.default_token.as_ref().map(|_| self.fresh(email)))
    }

    async fn create(&self, email: &str) -> Res<bool> {
        let mut people = self.people.lock().await;
        if people.contains_key(email) {
            return Ok(true);
        }
        people.insert(email.to_string(), self.fresh(email));
        Ok(false)
    }

    async fn update(&self, person: &Person) -> Res<()> {
        let mut people = self.people.lock().await;
        people.insert(person.email.clone(), person.clone());
        Ok(())
    }
}
