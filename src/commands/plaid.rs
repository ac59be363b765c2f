use crate::api::plaid::{PublicTokenResponse, UpdateAccessTokenResponse};
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;

/// Creates a Plaid public token for the configured account `account`, e.g. to open Link in update
/// mode. The token is printed to stdout.
pub async fn public_token(config: &Config, account: &str) -> Result<Out<PublicTokenResponse>> {
    let account = config.account(account).pub_result(ErrorType::NotFound)?;
    let response = config
        .plaid()
        .client()
        .create_public_token(&account.token)
        .await
        .with_context(|| format!("Unable to create a public token for {}", account.name))
        .pub_result(ErrorType::Aggregator)?;
    let token = response.public_token.clone();
    Ok(Out::new(format!("Created a public token for {}", account.name), response).with_output(token))
}

/// Upgrades the legacy access token of `account`. The new token is printed to stdout; it replaces
/// `token` for the account in the config file.
pub async fn update_token(
    config: &Config,
    account: &str,
) -> Result<Out<UpdateAccessTokenResponse>> {
    let account = config.account(account).pub_result(ErrorType::NotFound)?;
    let response = config
        .plaid()
        .client()
        .update_access_token(&account.token)
        .await
        .with_context(|| format!("Unable to update the access token for {}", account.name))
        .pub_result(ErrorType::Aggregator)?;
    let token = response.access_token.clone();
    Ok(Out::new(
        format!(
            "Updated the access token for {}. Put it in the config file",
            account.name
        ),
        response,
    )
    .with_output(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccountConfig;
    use crate::test::TestEnv;
    use httpmock::prelude::*;
    use serde_json::json;

    async fn env_for(plaid: &MockServer) -> TestEnv {
        let mut env = TestEnv::new().await;
        let base_url = plaid.base_url();
        env.edit(|f| {
            f.plaid.client_id = "plaid-client".to_string();
            f.plaid.secret = "plaid-secret".to_string();
            f.plaid.base_url = Some(base_url);
            f.accounts.push(AccountConfig {
                name: "visa".to_string(),
                token: "access-visa".to_string(),
                ..Default::default()
            });
        })
        .await;
        env
    }

    #[tokio::test]
    async fn test_public_token() {
        let plaid = MockServer::start_async().await;
        let mock = plaid
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/item/public_token/create")
                    .json_body(json!({
                        "client_id": "plaid-client",
                        "secret": "plaid-secret",
                        "access_token": "access-visa"
                    }));
                then.status(200).json_body(json!({
                    "public_token": "public-sandbox-42",
                    "request_id": "req-1"
                }));
            })
            .await;
        let env = env_for(&plaid).await;
        let out = public_token(&env.config(), "visa").await.unwrap();
        mock.assert_async().await;
        assert_eq!(out.output(), Some("public-sandbox-42"));

        let err = public_token(&env.config(), "amex").await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::NotFound);
    }

    #[tokio::test]
    async fn test_update_token() {
        let plaid = MockServer::start_async().await;
        let mock = plaid
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/item/access_token/update_version")
                    .json_body_includes(r#"{"access_token_v1": "access-visa"}"#);
                then.status(200).json_body(json!({
                    "access_token": "access-sandbox-v2",
                    "item_id": "item-1",
                    "request_id": "req-2"
                }));
            })
            .await;
        let env = env_for(&plaid).await;
        let out = update_token(&env.config(), "visa").await.unwrap();
        mock.assert_async().await;
        assert_eq!(out.output(), Some("access-sandbox-v2"));
    }

    #[tokio::test]
    async fn test_update_token_plaid_error() {
        let plaid = MockServer::start_async().await;
        plaid
            .mock_async(|when, then| {
                when.method(POST).path("/item/access_token/update_version");
                then.status(400).json_body(json!({
                    "error_type": "INVALID_INPUT",
                    "error_code": "INVALID_ACCESS_TOKEN",
                    "error_message": "not a v1 token",
                    "display_message": null
                }));
            })
            .await;
        let env = env_for(&plaid).await;
        let err = update_token(&env.config(), "visa").await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Aggregator);
        assert_eq!(err.message(), "Unable to update the access token for visa");
    }
}
