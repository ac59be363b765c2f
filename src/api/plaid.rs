//! A small client for the Plaid REST API.
//!
//! Every Plaid endpoint is a JSON `POST` that carries the `client_id` and `secret` in the body. A
//! non-200 status means the body is an `ErrorResponse`.

use crate::error::Res;
use anyhow::Context;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use tracing::{debug, trace};

pub const SANDBOX_URL: &str = "https://sandbox.plaid.com";
pub const DEVELOPMENT_URL: &str = "https://development.plaid.com";
pub const PRODUCTION_URL: &str = "https://production.plaid.com";

/// The most transactions Plaid returns per page.
const PAGE_SIZE: u32 = 500;

/// Which Plaid deployment to talk to.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Sandbox,
    Development,
    Production,
}

serde_plain::derive_display_from_serialize!(Environment);
serde_plain::derive_fromstr_from_deserialize!(Environment);

impl Environment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Sandbox => SANDBOX_URL,
            Environment::Development => DEVELOPMENT_URL,
            Environment::Production => PRODUCTION_URL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlaidClient {
    base_url: String,
    client_id: String,
    secret: String,
    http: reqwest::Client,
}

impl PlaidClient {
    pub fn new(
        client_id: impl Into<String>,
        secret: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            secret: secret.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches all transactions for the item behind `access_token` between `start` and `end`
    /// (inclusive). Pages are requested until `total_transactions` have been received and are
    /// merged into one response.
    pub async fn transactions(
        &self,
        access_token: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Res<TransactionsResponse> {
        let mut merged: Option<TransactionsResponse> = None;
        loop {
            let offset = merged.as_ref().map(|m| m.transactions.len()).unwrap_or(0);
            let request = TransactionsRequest {
                client_id: &self.client_id,
                secret: &self.secret,
                access_token,
                start_date: start,
                end_date: end,
                options: TransactionsOptions {
                    count: PAGE_SIZE,
                    offset: offset as u32,
                },
            };
            let page: TransactionsResponse = self.post("/transactions/get", &request).await?;
            let received = page.transactions.len();
            let done = match merged.as_mut() {
                None => {
                    let done = received >= page.total_transactions as usize;
                    merged = Some(page);
                    done
                }
                Some(m) => {
                    m.transactions.extend(page.transactions);
                    received == 0 || m.transactions.len() >= m.total_transactions as usize
                }
            };
            if done || received == 0 {
                break;
            }
        }
        let response = merged.unwrap_or_default();
        debug!(
            "Received {} of {} transactions from {start} to {end}",
            response.transactions.len(),
            response.total_transactions
        );
        Ok(response)
    }

    /// Exchanges a public token from Plaid Link for a long lived access token.
    pub async fn exchange(&self, public_token: &str) -> Res<ExchangeResponse> {
        let request = ExchangeRequest {
            client_id: &self.client_id,
            secret: &self.secret,
            public_token,
        };
        let response: ExchangeResponse = self
            .post("/item/public_token/exchange", &request)
            .await?;
        if let Some(message) = response.error_message.as_deref().filter(|m| !m.is_empty()) {
            anyhow::bail!("Plaid was unable to exchange the public token: {message}");
        }
        Ok(response)
    }

    /// Creates a public token for an existing item, e.g. to open Plaid Link in update mode.
    pub async fn create_public_token(&self, access_token: &str) -> Res<PublicTokenResponse> {
        let request = AccessTokenRequest {
            client_id: &self.client_id,
            secret: &self.secret,
            access_token,
        };
        self.post("/item/public_token/create", &request).await
    }

    /// Upgrades a legacy (v1) access token to the current token format.
    pub async fn update_access_token(&self, access_token_v1: &str) -> Res<UpdateAccessTokenResponse> {
        let request = UpdateAccessTokenRequest {
            client_id: &self.client_id,
            secret: &self.secret,
            access_token_v1,
        };
        self.post("/item/access_token/update_version", &request)
            .await
    }

    async fn post<Req, Resp>(&self, endpoint: &str, request: &Req) -> Res<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{endpoint}", self.base_url);
        trace!("POST {url}");
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .with_context(|| format!("Failed to send request to Plaid {endpoint}"))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read the response from Plaid {endpoint}"))?;

        if status != reqwest::StatusCode::OK {
            let error: ErrorResponse = serde_json::from_slice(&body).with_context(|| {
                format!(
                    "Plaid {endpoint} failed with status {status} and an unreadable body: {}",
                    String::from_utf8_lossy(&body)
                )
            })?;
            return Err(PlaidError {
                status: status.as_u16(),
                response: error,
            })
            .with_context(|| format!("Plaid request {endpoint} failed"));
        }

        serde_json::from_slice(&body)
            .with_context(|| format!("Unable to parse the response from Plaid {endpoint}"))
    }
}

/// An error that Plaid reported. Use `anyhow::Error::downcast_ref` to get at it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PlaidError {
    pub status: u16,
    pub response: ErrorResponse,
}

impl Display for PlaidError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({}): {}",
            self.response.error_type, self.response.error_code, self.status, self.response.error_message
        )
    }
}

impl std::error::Error for PlaidError {}

#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error_type: String,
    #[serde(default)]
    pub error_code: String,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub display_message: Option<String>,
}

#[derive(Serialize)]
struct TransactionsRequest<'a> {
    client_id: &'a str,
    secret: &'a str,
    access_token: &'a str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    options: TransactionsOptions,
}

#[derive(Serialize)]
struct TransactionsOptions {
    count: u32,
    offset: u32,
}

#[derive(Serialize)]
struct ExchangeRequest<'a> {
    client_id: &'a str,
    secret: &'a str,
    public_token: &'a str,
}

#[derive(Serialize)]
struct AccessTokenRequest<'a> {
    client_id: &'a str,
    secret: &'a str,
    access_token: &'a str,
}

#[derive(Serialize)]
struct UpdateAccessTokenRequest<'a> {
    client_id: &'a str,
    secret: &'a str,
    access_token_v1: &'a str,
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExchangeResponse {
    pub access_token: String,
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PublicTokenResponse {
    pub public_token: String,
    #[serde(default)]
    pub request_id: String,
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct UpdateAccessTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub request_id: String,
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TransactionsResponse {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub item: Item,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub total_transactions: u32,
}

impl TransactionsResponse {
    /// Adds the accounts and transactions of `other` to this response.
    pub fn merge(&mut self, other: TransactionsResponse) {
        self.accounts.extend(other.accounts);
        self.transactions.extend(other.transactions);
        self.total_transactions += other.total_transactions;
    }
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub available_products: Vec<String>,
    #[serde(default)]
    pub billed_products: Vec<String>,
    #[serde(default)]
    pub error: Option<ErrorResponse>,
    #[serde(default)]
    pub institution_id: Option<String>,
    #[serde(default)]
    pub item_id: String,
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub available: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub current: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub limit: Option<Decimal>,
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub institution_id: Option<String>,
    #[serde(default)]
    pub balances: Balance,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mask: Option<String>,
    #[serde(default)]
    pub official_name: Option<String>,
    #[serde(rename = "type", default)]
    pub account_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub account_id: String,
    #[serde(default)]
    pub category: Option<Vec<String>>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub transaction_type: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub date: NaiveDate,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub account_owner: Option<String>,
    #[serde(default)]
    pub name: String,
}

impl Transaction {
    /// The category path joined with `:`, e.g. `Food and Drink:Restaurants`.
    pub fn category_path(&self) -> String {
        self.category
            .as_deref()
            .map(|c| c.join(":"))
            .unwrap_or_default()
    }
}
