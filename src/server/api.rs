//! The JSON API used by the frontend. Every handler here requires a session.

use crate::api::plaid::TransactionsResponse;
use crate::error::{ErrorType, IntoResult};
use crate::model::{LinkedAccount, Person, PersonView, Profile};
use crate::server::{AppError, AppResult, AppState, CurrentUser};
use anyhow::Context;
use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use chrono::{Months, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, info};

/// The body of `/api/accounts/add`. Both `PublicToken` and `public_token` style names are
/// accepted.
#[derive(Debug, Deserialize)]
struct AddAccountRequest {
    #[serde(alias = "Name")]
    name: String,
    #[serde(alias = "PublicToken")]
    public_token: String,
}

async fn find_person(state: &AppState, email: &str) -> AppResult<Person> {
    state
        .storage
        .get(email)
        .await
        .with_context(|| format!("couldn't find {email}"))
        .pub_result(ErrorType::Storage)?
        .ok_or_else(|| AppError::new(ErrorType::NotFound, format!("couldn't find {email}")))
}

pub(super) async fn me(CurrentUser(profile): CurrentUser) -> Json<Profile> {
    Json(profile)
}

/// The window `/api/transactions` covers: one calendar month back from `today`, inclusive.
fn last_month(today: NaiveDate) -> AppResult<(NaiveDate, NaiveDate)> {
    let start = today
        .checked_sub_months(Months::new(1))
        .context("Date out of range")?;
    Ok((start, today))
}

pub(super) async fn transactions(
    State(state): State<AppState>,
    CurrentUser(profile): CurrentUser,
) -> AppResult<Json<TransactionsResponse>> {
    let person = find_person(&state, &profile.email).await?;
    if person.accounts.is_empty() {
        return Err(AppError::new(
            ErrorType::NotFound,
            "No linked accounts. Add one first.",
        ));
    }

    let (start, end) = last_month(Utc::now().date_naive())?;
    let mut merged: Option<TransactionsResponse> = None;
    for account in &person.accounts {
        debug!("Fetching transactions for {} account {}", person.email, account.name);
        let response = state
            .plaid
            .transactions(&account.token, start, end)
            .await
            .context("Error getting transactions")
            .pub_result(ErrorType::Aggregator)?;
        match merged.as_mut() {
            None => merged = Some(response),
            Some(m) => m.merge(response),
        }
    }
    Ok(Json(merged.unwrap_or_default()))
}

pub(super) async fn accounts(
    State(state): State<AppState>,
    CurrentUser(profile): CurrentUser,
) -> AppResult<Json<PersonView>> {
    let person = find_person(&state, &profile.email).await?;
    Ok(Json(person.view()))
}

pub(super) async fn add_account(
    State(state): State<AppState>,
    CurrentUser(profile): CurrentUser,
    body: Bytes,
) -> AppResult<Json<&'static str>> {
    let mut person = find_person(&state, &profile.email).await?;
    let request: AddAccountRequest =
        serde_json::from_slice(&body).map_err(|_| AppError::bad_request())?;

    let exchanged = state
        .plaid
        .exchange(&request.public_token)
        .await
        .context("problem exchanging public token")
        .pub_result(ErrorType::Aggregator)?;

    person.add_account(LinkedAccount::new(&request.name, exchanged.access_token));
    state
        .storage
        .update(&person)
        .await
        .context("problem saving")
        .pub_result(ErrorType::Storage)?;
    info!("{} linked account {}", person.email, request.name);
    Ok(Json("saved new account"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::tests::{json_body, pat, TestServer};
    use crate::storage::Storage;
    use crate::test::{plaid_transaction, plaid_transactions_body, TestEnv};
    use axum::http::StatusCode;
    use httpmock::prelude::*;
    use serde_json::json;

    async fn env_for(plaid: &MockServer) -> TestEnv {
        let mut env = TestEnv::new().await;
        let base_url = plaid.base_url();
        env.edit(|f| {
            f.plaid.client_id = "plaid-client".to_string();
            f.plaid.secret = "plaid-secret".to_string();
            f.plaid.base_url = Some(base_url);
        })
        .await;
        env
    }

    async fn link(server: &TestServer, accounts: &[(&str, &str)]) {
        let mut person = Person::new("pat@example.com");
        for (name, token) in accounts {
            person.add_account(LinkedAccount::new(*name, *token));
        }
        server.storage.update(&person).await.unwrap();
    }

    #[test]
    fn test_last_month() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        assert_eq!(
            last_month(d("2025-03-31")).unwrap(),
            (d("2025-02-28"), d("2025-03-31"))
        );
        assert_eq!(
            last_month(d("2025-01-15")).unwrap(),
            (d("2024-12-15"), d("2025-01-15"))
        );
    }

    #[tokio::test]
    async fn test_me() {
        let server = TestServer::new(TestEnv::new().await).await;
        let cookie = server.session_cookie(&pat());
        let response = server.send(server.get("/api/me", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["email"], "pat@example.com");
    }

    #[tokio::test]
    async fn test_transactions_merges_accounts() {
        let plaid = MockServer::start_async().await;
        let visa = plaid
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/transactions/get")
                    .json_body_includes(r#"{"access_token": "access-visa"}"#);
                then.status(200).json_body(plaid_transactions_body(
                    "acct-visa",
                    "1234",
                    vec![plaid_transaction("t1", "acct-visa", "Coffee", 4.5, "2025-10-01")],
                ));
            })
            .await;
        let checking = plaid
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/transactions/get")
                    .json_body_includes(r#"{"access_token": "access-checking"}"#);
                then.status(200).json_body(plaid_transactions_body(
                    "acct-checking",
                    "9876",
                    vec![
                        plaid_transaction("t2", "acct-checking", "Rent", 1500.0, "2025-10-01"),
                        plaid_transaction("t3", "acct-checking", "Power", 80.25, "2025-10-02"),
                    ],
                ));
            })
            .await;
        let server = TestServer::new(env_for(&plaid).await).await;
        link(&server, &[("visa", "access-visa"), ("checking", "access-checking")]).await;

        let cookie = server.session_cookie(&pat());
        let response = server
            .send(server.get("/api/transactions", Some(&cookie)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["total_transactions"], 3);
        assert_eq!(body["transactions"].as_array().unwrap().len(), 3);
        assert_eq!(body["accounts"].as_array().unwrap().len(), 2);
        visa.assert_async().await;
        checking.assert_async().await;
    }

    #[tokio::test]
    async fn test_transactions_without_accounts() {
        let server = TestServer::new(TestEnv::new().await).await;
        link(&server, &[]).await;
        let cookie = server.session_cookie(&pat());
        let response = server
            .send(server.get("/api/transactions", Some(&cookie)))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let cookie = server.session_cookie(&Profile::new("stranger@example.com", "", ""));
        let response = server
            .send(server.get("/api/transactions", Some(&cookie)))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await,
            json!({"error": "couldn't find stranger@example.com"})
        );
    }

    #[tokio::test]
    async fn test_transactions_plaid_failure() {
        let plaid = MockServer::start_async().await;
        plaid
            .mock_async(|when, then| {
                when.method(POST).path("/transactions/get");
                then.status(400).json_body(json!({
                    "error_type": "ITEM_ERROR",
                    "error_code": "ITEM_LOGIN_REQUIRED",
                    "error_message": "the login details of this item have changed",
                    "display_message": null
                }));
            })
            .await;
        let server = TestServer::new(env_for(&plaid).await).await;
        link(&server, &[("visa", "access-visa")]).await;
        let cookie = server.session_cookie(&pat());
        let response = server
            .send(server.get("/api/transactions", Some(&cookie)))
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            json!({"error": "Error getting transactions"})
        );
    }

    #[tokio::test]
    async fn test_accounts_hides_tokens() {
        let server = TestServer::new(TestEnv::new().await).await;
        link(&server, &[("visa", "access-visa")]).await;
        let cookie = server.session_cookie(&pat());
        let response = server.send(server.get("/api/accounts", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"email": "pat@example.com", "accounts": [{"name": "visa"}]})
        );
    }

    #[tokio::test]
    async fn test_add_account() {
        let plaid = MockServer::start_async().await;
        let exchange = plaid
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/item/public_token/exchange")
                    .json_body(json!({
                        "client_id": "plaid-client",
                        "secret": "plaid-secret",
                        "public_token": "public-sandbox-1"
                    }));
                then.status(200).json_body(json!({
                    "access_token": "access-sandbox-1",
                    "item_id": "item-1",
                    "request_id": "req-1"
                }));
            })
            .await;
        let server = TestServer::new(env_for(&plaid).await).await;
        link(&server, &[]).await;
        let cookie = server.session_cookie(&pat());

        let response = server
            .send(server.post(
                "/api/accounts/add",
                Some(&cookie),
                r#"{"Name": "visa", "PublicToken": "public-sandbox-1"}"#,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!("saved new account"));
        exchange.assert_async().await;

        let person = server.storage.get("pat@example.com").await.unwrap().unwrap();
        assert_eq!(
            person.accounts,
            vec![LinkedAccount::new("visa", "access-sandbox-1")]
        );
    }

    #[tokio::test]
    async fn test_add_account_bad_body() {
        let server = TestServer::new(TestEnv::new().await).await;
        link(&server, &[]).await;
        let cookie = server.session_cookie(&pat());
        let response = server
            .send(server.post("/api/accounts/add", Some(&cookie), r#"{"name": "visa"}"#))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({"error": "bad request"}));
    }
}
