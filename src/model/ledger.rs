//! Plain-text, double-entry ledger output.
//!
//! A rendered transaction looks like this:
//!
//! ```text
//! 2024/03/05 Starbucks
//!     expenses:Food and Drink:Coffee Shop    4.33
//!     liabilities:acct-1:me
//! ```
//!
//! A posting without an amount is the "elided" posting. Ledger tools compute its amount so that
//! the transaction balances.

use crate::api::plaid;
use crate::error::Res;
use anyhow::bail;
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt::{Display, Formatter};

const DATE_FMT: &str = "%Y/%m/%d";
const INDENT: &str = "    ";

/// A colon separated account path like `expenses:Food and Drink:Restaurants`.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
pub struct AccountName(Vec<String>);

impl AccountName {
    pub fn new<S: Into<String>>(pieces: impl IntoIterator<Item = S>) -> Self {
        Self(pieces.into_iter().map(Into::into).collect())
    }

    pub fn asset<S: Into<String>>(pieces: impl IntoIterator<Item = S>) -> Self {
        Self::prefixed("assets", pieces)
    }

    pub fn liability<S: Into<String>>(pieces: impl IntoIterator<Item = S>) -> Self {
        Self::prefixed("liabilities", pieces)
    }

    pub fn expense<S: Into<String>>(pieces: impl IntoIterator<Item = S>) -> Self {
        Self::prefixed("expenses", pieces)
    }

    fn prefixed<S: Into<String>>(root: &str, pieces: impl IntoIterator<Item = S>) -> Self {
        let mut v = vec![root.to_string()];
        v.extend(pieces.into_iter().map(Into::into));
        Self(v)
    }

    pub fn pieces(&self) -> &[String] {
        &self.0
    }
}

impl Display for AccountName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(":"))
    }
}

/// One posting of a transaction. `amount == None` means the amount is elided.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Change {
    pub account: AccountName,
    pub amount: Option<Decimal>,
}

impl Change {
    pub fn new(account: AccountName, amount: Decimal) -> Self {
        Self {
            account,
            amount: Some(amount),
        }
    }

    pub fn elided(account: AccountName) -> Self {
        Self {
            account,
            amount: None,
        }
    }
}

impl Display for Change {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.amount {
            None => write!(f, "{}", self.account),
            Some(amount) => write!(
                f,
                "{}{INDENT}{:.2}",
                self.account,
                amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            ),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Transaction {
    pub date: NaiveDate,
    pub description: String,
    pub changes: Vec<Change>,
}

impl Transaction {
    pub fn new(date: NaiveDate, description: impl Into<String>, changes: Vec<Change>) -> Self {
        Self {
            date,
            description: description.into(),
            changes,
        }
    }

    /// Books a Plaid transaction as an expense against the card it was charged to, e.g.
    /// `expenses:Travel:Taxi` and `liabilities:<account_id>:<owner>`.
    pub fn from_aggregator(t: &plaid::Transaction, owner: &str) -> Self {
        let changes = vec![
            Change::new(expense_account(t), t.amount),
            Change::elided(AccountName::liability([t.account_id.as_str(), owner])),
        ];
        Self::new(t.date, &t.name, changes)
    }

    /// Like `from_aggregator`, but the charge is split evenly between two people.
    pub fn split(t: &plaid::Transaction, first: &str, second: &str) -> Self {
        let changes = vec![
            Change::new(expense_account(t), t.amount),
            Change::new(
                AccountName::liability([t.account_id.as_str(), first]),
                -t.amount / Decimal::TWO,
            ),
            Change::elided(AccountName::liability([t.account_id.as_str(), second])),
        ];
        Self::new(t.date, &t.name, changes)
    }

    /// Checks that the transaction balances. At most one posting may be elided, and when none are
    /// the amounts must sum to zero.
    pub fn validate(&self) -> Res<()> {
        if self.changes.is_empty() {
            bail!("Transaction '{}' has no postings", self.description);
        }
        let elided = self.changes.iter().filter(|c| c.amount.is_none()).count();
        if elided > 1 {
            bail!(
                "Transaction '{}' has {elided} postings without an amount, at most one is allowed",
                self.description
            );
        }
        if elided == 0 {
            let sum: Decimal = self.changes.iter().filter_map(|c| c.amount).sum();
            if !sum.is_zero() {
                bail!(
                    "Transaction '{}' does not balance, its postings sum to {sum}",
                    self.description
                );
            }
        }
        Ok(())
    }
}

impl Display for Transaction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.date.format(DATE_FMT), self.description)?;
        for change in &self.changes {
            write!(f, "\n{INDENT}{change}")?;
        }
        Ok(())
    }
}

fn expense_account(t: &plaid::Transaction) -> AccountName {
    AccountName::expense(t.category.iter().flatten().map(String::as_str))
}
