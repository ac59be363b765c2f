use serde::{Deserialize, Serialize};

/// The identity of a signed-in user. It is built once per sign-in, either from the Google userinfo
/// endpoint or from the claims of a verified ID token, and then lives inside the session cookie.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Profile {
    pub email: String,
    pub display_name: String,
    pub image_url: String,
}

impl Profile {
    pub fn new(
        email: impl Into<String>,
        display_name: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            display_name: display_name.into(),
            image_url: image_url.into(),
        }
    }
}

/// A bank account that was linked through Plaid. The `token` is the Plaid access token for the
/// item and must never leave the server.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LinkedAccount {
    pub name: String,
    pub token: String,
}

impl LinkedAccount {
    pub fn new(name: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token: token.into(),
        }
    }
}

/// The stored record for a user, keyed by `email`.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Person {
    pub email: String,
    #[serde(default)]
    pub accounts: Vec<LinkedAccount>,
}

impl Person {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            accounts: Vec::new(),
        }
    }

    pub fn add_account(&mut self, account: LinkedAccount) {
        self.accounts.push(account);
    }

    /// A copy of this person that is safe to send to a browser.
    pub fn view(&self) -> PersonView {
        PersonView {
            email: self.email.clone(),
            accounts: self
                .accounts
                .iter()
                .map(|a| AccountView {
                    name: a.name.clone(),
                })
                .collect(),
        }
    }
}

/// What `/api/accounts` returns: the person without access tokens.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PersonView {
    pub email: String,
    pub accounts: Vec<AccountView>,
}

#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct AccountView {
    pub name: String,
}
