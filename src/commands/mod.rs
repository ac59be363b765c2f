//! Command handlers for the cash CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod accounts;
mod init;
mod ledger;
mod plaid;
mod serve;
mod sheets;
mod transactions;

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::{debug, info};

pub use accounts::{accounts, AccountSummary};
pub use init::{init, keygen};
pub use ledger::ledger_import;
pub use plaid::{public_token, update_token};
pub use serve::serve;
pub use sheets::{
    sheets_create, sheets_delete, sheets_import, sheets_list, sheets_pull, sheets_share,
    ListOptions,
};
pub use transactions::transactions;

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data and text meant for stdout.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,

    /// Text for stdout, e.g. a TSV table that the user will pipe somewhere.
    output: Option<String>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

/// The data format of a command's input or output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Tab (or other delimiter) separated values with a header row.
    #[default]
    Tsv,
    /// JSON, shaped like the Plaid API.
    Json,
}

serde_plain::derive_display_from_serialize!(Format);
serde_plain::derive_fromstr_from_deserialize!(Format);

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
            output: None,
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
            output: None,
        }
    }

    /// Adds text to print to stdout.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// Print the message to `info!`, the structured data (if it exists) as JSON to `debug!` and
    /// the output (if it exists) to stdout.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
        if let Some(output) = self.output() {
            print!("{output}");
            if !output.ends_with('\n') {
                println!();
            }
        }
    }
}

#[test]
fn test_out() {
    let out: Out<()> = "done".into();
    assert_eq!(out.message(), "done");
    assert!(out.structure().is_none());
    assert!(out.output().is_none());

    let out = Out::new("listed", vec![1, 2]).with_output("a\tb\n");
    assert_eq!(out.structure(), Some(&vec![1, 2]));
    assert_eq!(out.output(), Some("a\tb\n"));
}

#[test]
fn test_format() {
    assert_eq!(Format::default(), Format::Tsv);
    assert_eq!(Format::Json.to_string(), "json");
    assert_eq!("tsv".parse::<Format>().unwrap(), Format::Tsv);
}
