use crate::api::plaid;
use crate::commands::Format;
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult, Res};
use crate::model::ledger::Transaction;
use crate::{utils, Result};
use anyhow::Context;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// A row of the TSV that `cash transactions` writes.
#[derive(Debug, Deserialize)]
struct TsvRow {
    account: String,
    date: NaiveDate,
    description: String,
    #[serde(default)]
    category: String,
    amount: String,
}

impl TsvRow {
    fn into_transaction(self, line: usize) -> Res<plaid::Transaction> {
        let amount = Decimal::from_str(self.amount.trim())
            .with_context(|| format!("Invalid amount '{}' on line {line}", self.amount))?;
        let category = if self.category.is_empty() {
            None
        } else {
            Some(self.category.split(':').map(str::to_string).collect())
        };
        Ok(plaid::Transaction {
            transaction_id: format!("line-{line}"),
            account_id: self.account,
            category,
            amount,
            date: self.date,
            name: self.description,
            ..Default::default()
        })
    }
}

fn parse_tsv(text: &str) -> Res<Vec<plaid::Transaction>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(text.as_bytes());
    let mut transactions = Vec::new();
    for (i, result) in rdr.deserialize().enumerate() {
        // Line 1 is the header.
        let line = i + 2;
        let row: TsvRow = result.with_context(|| format!("Unable to read line {line}"))?;
        transactions.push(row.into_transaction(line)?);
    }
    Ok(transactions)
}

fn parse(text: &str, format: Format) -> Res<Vec<plaid::Transaction>> {
    match format {
        Format::Json => serde_json::from_str(text).context("Unable to read the JSON transactions"),
        Format::Tsv => parse_tsv(text),
    }
}

/// Converts aggregator transactions into ledger entries.
///
/// The input is read from `input`, or from stdin when it is `None`. Every transaction is booked
/// against `owner`, or split evenly between `owner` and `split_with` when that is given. The
/// entries are written to stdout separated by blank lines.
pub async fn ledger_import(
    input: Option<&Path>,
    format: Format,
    owner: &str,
    split_with: Option<&str>,
) -> Result<Out<()>> {
    let text = utils::read_input(input).await.pub_result(ErrorType::Io)?;
    let transactions = parse(&text, format)
        .context("Unable to read the transactions to import")
        .pub_result(ErrorType::Request)?;

    let mut output = String::new();
    for t in &transactions {
        let entry = match split_with {
            Some(other) => Transaction::split(t, owner, other),
            None => Transaction::from_aggregator(t, owner),
        };
        entry.validate().pub_result(ErrorType::Internal)?;
        output.push_str(&entry.to_string());
        output.push_str("\n\n");
    }
    Ok(Out::new_message(format!("Converted {} transactions", transactions.len())).with_output(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TSV: &str = "account\tdate\tdescription\tcategory\tamount\n\
                       pat\t2024-03-02\tTacos\tFood and Drink:Restaurants\t12.50\n\
                       pat\t2024-03-04\tPaycheck\t\t-1000.00\n";

    async fn write_input(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        utils::write(&path, contents).await.unwrap();
        path
    }

    #[test]
    fn test_parse_tsv() {
        let transactions = parse_tsv(TSV).unwrap();
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0].account_id, "pat");
        assert_eq!(transactions[0].category_path(), "Food and Drink:Restaurants");
        assert_eq!(transactions[0].amount, Decimal::new(1250, 2));
        assert_eq!(transactions[1].category, None);

        let bad = "account\tdate\tdescription\tcategory\tamount\npat\t2024-03-02\tTacos\t\tlots\n";
        let err = parse_tsv(bad).unwrap_err();
        assert_eq!(err.to_string(), "Invalid amount 'lots' on line 2");
    }

    #[tokio::test]
    async fn test_ledger_import_tsv() {
        let dir = TempDir::new().unwrap();
        let path = write_input(&dir, "in.tsv", TSV).await;
        let out = ledger_import(Some(&path), Format::Tsv, "me", None)
            .await
            .unwrap();
        assert_eq!(out.message(), "Converted 2 transactions");
        assert_eq!(
            out.output().unwrap(),
            "2024/03/02 Tacos\n\
             \x20   expenses:Food and Drink:Restaurants    12.50\n\
             \x20   liabilities:pat:me\n\n\
             2024/03/04 Paycheck\n\
             \x20   expenses    -1000.00\n\
             \x20   liabilities:pat:me\n\n"
        );
    }

    #[tokio::test]
    async fn test_ledger_import_json_split() {
        let dir = TempDir::new().unwrap();
        let json = serde_json::json!([
            crate::test::plaid_transaction("t1", "acct-1", "Dinner", 30.0, "2024-03-05")
        ]);
        let path = write_input(&dir, "in.json", &json.to_string()).await;
        let out = ledger_import(Some(&path), Format::Json, "pat", Some("sam"))
            .await
            .unwrap();
        assert_eq!(
            out.output().unwrap(),
            "2024/03/05 Dinner\n\
             \x20   expenses:Food and Drink:Restaurants    30.00\n\
             \x20   liabilities:acct-1:pat    -15.00\n\
             \x20   liabilities:acct-1:sam\n\n"
        );
    }

    #[tokio::test]
    async fn test_ledger_import_bad_input() {
        let dir = TempDir::new().unwrap();
        let path = write_input(&dir, "in.json", "{not json").await;
        let err = ledger_import(Some(&path), Format::Json, "me", None)
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Request);

        let missing = dir.path().join("missing.json");
        let err = ledger_import(Some(&missing), Format::Json, "me", None)
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Io);
    }
}
