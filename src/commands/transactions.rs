use crate::api::plaid::TransactionsResponse;
use crate::commands::{Format, Out};
use crate::error::{ErrorType, IntoResult};
use crate::model::Interval;
use crate::{Config, Result};
use anyhow::Context;
use rust_decimal::RoundingStrategy;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// The columns written by `cash transactions` and read back by `cash ledger import`.
pub(crate) const HEADERS: [&str; 5] = ["account", "date", "description", "category", "amount"];

/// Fetches the transactions of the configured account `account` from Plaid.
///
/// With `Format::Tsv` the output is one row per transaction, columns joined by `delimiter`. The
/// account column holds the nickname of the card (see `AccountConfig::nick_map`). With
/// `Format::Json` the output is the array of Plaid transactions, which `cash ledger import` reads.
pub async fn transactions(
    config: &Config,
    account: &str,
    interval: Interval,
    delimiter: &str,
    format: Format,
) -> Result<Out<TransactionsResponse>> {
    let account = config.account(account).pub_result(ErrorType::NotFound)?;
    let client = config.plaid().client();

    info!("Showing transactions for {interval}");
    let response = client
        .transactions(&account.token, interval.start, interval.end)
        .await
        .with_context(|| format!("Unable to fetch transactions for {}", account.name))
        .pub_result(ErrorType::Aggregator)?;

    let nicks = account.nick_map(&response.accounts);
    debug!("Nicknames: {nicks:?}");

    let output = match format {
        Format::Tsv => render(&response, &nicks, delimiter),
        Format::Json => serde_json::to_string_pretty(&response.transactions)
            .context("Unable to serialize transactions")
            .pub_result(ErrorType::Internal)?,
    };
    Ok(Out::new(
        format!(
            "Fetched {} transactions for {}",
            response.transactions.len(),
            account.name
        ),
        response,
    )
    .with_output(output))
}

fn render(response: &TransactionsResponse, nicks: &BTreeMap<String, String>, delimiter: &str) -> String {
    let mut out = HEADERS.join(delimiter);
    out.push('\n');
    for t in &response.transactions {
        let amount = t
            .amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let row = [
            nicks.get(&t.account_id).cloned().unwrap_or_default(),
            t.date.to_string(),
            t.name.clone(),
            t.category_path(),
            format!("{amount:.2}"),
        ];
        out.push_str(&row.join(delimiter));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccountConfig;
    use crate::test::{plaid_transaction, plaid_transactions_body, TestEnv};
    use chrono::NaiveDate;
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
                nicknames: [("1234".to_string(), "pat".to_string())].into(),
            });
        })
        .await;
        env
    }

    fn march() -> Interval {
        Interval::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_transactions_tsv() {
        let plaid = MockServer::start_async().await;
        let mock = plaid
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/transactions/get")
                    .json_body_includes(
                        r#"{"access_token": "access-visa", "start_date": "2024-03-01", "end_date": "2024-03-31"}"#,
                    );
                then.status(200).json_body(plaid_transactions_body(
                    "acct-visa",
                    "1234",
                    vec![
                        plaid_transaction("t1", "acct-visa", "Tacos", 12.5, "2024-03-02"),
                        plaid_transaction("t2", "acct-visa", "Refund", -3.125, "2024-03-04"),
                    ],
                ));
            })
            .await;
        let env = env_for(&plaid).await;

        let out = transactions(&env.config(), "visa", march(), "\t", Format::Tsv)
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(out.message(), "Fetched 2 transactions for visa");
        assert_eq!(
            out.output().unwrap(),
            "account\tdate\tdescription\tcategory\tamount\n\
             pat\t2024-03-02\tTacos\tFood and Drink:Restaurants\t12.50\n\
             pat\t2024-03-04\tRefund\tFood and Drink:Restaurants\t-3.13\n"
        );
        assert_eq!(out.structure().unwrap().total_transactions, 2);
    }

    #[tokio::test]
    async fn test_transactions_json_and_delimiter() {
        let plaid = MockServer::start_async().await;
        plaid
            .mock_async(|when, then| {
                when.method(POST).path("/transactions/get");
                then.status(200).json_body(plaid_transactions_body(
                    "acct-visa",
                    "1234",
                    vec![plaid_transaction("t1", "acct-visa", "Tacos", 12.5, "2024-03-02")],
                ));
            })
            .await;
        let env = env_for(&plaid).await;

        let out = transactions(&env.config(), "visa", march(), ",", Format::Tsv)
            .await
            .unwrap();
        assert!(out
            .output()
            .unwrap()
            .starts_with("account,date,description,category,amount\npat,2024-03-02,Tacos,"));

        let out = transactions(&env.config(), "visa", march(), "\t", Format::Json)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(out.output().unwrap()).unwrap();
        assert_eq!(parsed[0]["transaction_id"], json!("t1"));
        assert_eq!(parsed[0]["amount"], json!(12.5));
    }

    #[tokio::test]
    async fn test_transactions_errors() {
        let plaid = MockServer::start_async().await;
        plaid
            .mock_async(|when, then| {
                when.method(POST).path("/transactions/get");
                then.status(400).json_body(json!({
                    "error_type": "INVALID_INPUT",
                    "error_code": "INVALID_ACCESS_TOKEN",
                    "error_message": "provided access token is in an invalid format",
                    "display_message": null
                }));
            })
            .await;
        let env = env_for(&plaid).await;

        let err = transactions(&env.config(), "amex", march(), "\t", Format::Tsv)
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::NotFound);
        assert_eq!(err.message(), "No account with that name.");

        let err = transactions(&env.config(), "visa", march(), "\t", Format::Tsv)
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Aggregator);
        assert_eq!(err.message(), "Unable to fetch transactions for visa");
    }
}
