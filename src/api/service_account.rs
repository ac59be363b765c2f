//! Service account authentication for the Google Sheets and Drive APIs.
//!
//! `yup_oauth2` signs the JWT assertion with the key's private key, trades it for an access token
//! at the key's `token_uri` and keeps the token in memory until it is about to expire.

use crate::error::Res;
use anyhow::{ensure, Context};
use std::path::Path;
use tracing::debug;
use yup_oauth2::authenticator::DefaultAuthenticator;
use yup_oauth2::{ServiceAccountAuthenticator, ServiceAccountKey};

const SERVICE_ACCOUNT: &str = "service_account";

/// Hands out access tokens for a service account, refreshing them when needed.
pub(crate) struct TokenProvider {
    auth: DefaultAuthenticator,
    scopes: Vec<String>,
}

impl TokenProvider {
    /// Reads a service account key (JSON, as downloaded from the Google Cloud Console) and builds
    /// an authenticator for it.
    pub(crate) async fn load(path: impl AsRef<Path>, scopes: &[&str]) -> Res<Self> {
        let path = path.as_ref();
        let key = yup_oauth2::read_service_account_key(path)
            .await
            .with_context(|| {
                format!(
                    "Unable to read the service account key at {}. Download a JSON key for a \
                    service account from the Google Cloud Console and pass it to 'cash init \
                    --service-account'",
                    path.display()
                )
            })?;
        Self::new(key, scopes).await
    }

    pub(crate) async fn new(key: ServiceAccountKey, scopes: &[&str]) -> Res<Self> {
        let key_type = key.key_type.as_deref().unwrap_or(SERVICE_ACCOUNT);
        ensure!(
            key_type == SERVICE_ACCOUNT,
            "Expected a key of type '{SERVICE_ACCOUNT}' but found '{key_type}'",
        );
        debug!(
            "Authenticating as {} against {}",
            key.client_email, key.token_uri
        );
        let auth = ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .context("Failed to create the service account authenticator")?;
        Ok(Self {
            auth,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Returns a valid access token, fetching a new one if the cached token is missing or about
    /// to expire.
    pub(crate) async fn token(&self) -> Res<String> {
        let token = self
            .auth
            .token(&self.scopes)
            .await
            .context("Unable to get an access token for the service account")?;
        token
            .token()
            .map(str::to_string)
            .context("The token response did not include an access token")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{service_account_key as key, TEST_RSA_PEM};
    use crate::utils;
    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_token_is_cached() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/token")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body_includes("jwt-bearer");
                then.status(200).json_body(json!({
                    "access_token": "ya29.test",
                    "expires_in": 3599,
                    "token_type": "Bearer"
                }));
            })
            .await;

        let provider = TokenProvider::new(key(&server.url("/token")), &["scope"])
            .await
            .unwrap();
        assert_eq!(provider.token().await.unwrap(), "ya29.test");
        assert_eq!(provider.token().await.unwrap(), "ya29.test");
        mock.assert_calls_async(1).await;
    }

    #[tokio::test]
    async fn test_token_request_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(400)
                    .json_body(json!({"error": "invalid_grant", "error_description": "bad jwt"}));
            })
            .await;

        let provider = TokenProvider::new(key(&server.url("/token")), &["scope"])
            .await
            .unwrap();
        let err = provider.token().await.unwrap_err();
        assert!(format!("{err:#}").contains("invalid_grant"), "{err:#}");
    }

    #[tokio::test]
    async fn test_load_service_account() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("sa.json");
        let json = json!({
            "type": "service_account",
            "project_id": "p",
            "private_key_id": "kid-1",
            "private_key": TEST_RSA_PEM,
            "client_email": "robot@p.iam.gserviceaccount.com",
            "client_id": "1234",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "https://oauth2.googleapis.com/token"
        });
        utils::write(&p, json.to_string()).await.unwrap();
        TokenProvider::load(&p, &["scope"]).await.unwrap();
    }

    #[tokio::test]
    async fn test_load_wrong_key_type() {
        let json = json!({
            "type": "authorized_user",
            "private_key": TEST_RSA_PEM,
            "client_email": "a",
            "token_uri": "https://oauth2.googleapis.com/token"
        });
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("sa.json");
        utils::write(&p, json.to_string()).await.unwrap();
        let err = TokenProvider::load(&p, &["scope"]).await.err().unwrap();
        assert!(err.to_string().contains("authorized_user"), "{err}");
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = TokenProvider::load(dir.path().join("nope.json"), &["scope"])
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("cash init"), "{err}");
    }
}
