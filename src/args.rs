//! These structs provide the CLI interface for the cash CLI.

use crate::commands::{Format, ListOptions};
use crate::model::Interval;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// cash: Command line tools and web server for cashcoach.
///
/// cashcoach links bank accounts through Plaid, lets people sign in with Google and turns
/// transactions into ledger entries and Google Sheets.
///
/// Start with `cash init`, fill in the Google and Plaid credentials in the config file it creates,
/// then run `cash serve`.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and an initial config file.
    ///
    /// The config file gets a freshly generated cookie secret. Google and Plaid credentials must
    /// be added to it by hand before running the server.
    Init(InitArgs),
    /// Print a new random cookie secret (64 hex characters).
    Keygen,
    /// Run the web server.
    Serve,
    /// List the accounts configured for the command line tools.
    Accounts,
    /// Fetch the transactions of a configured account.
    Transactions(TransactionsArgs),
    /// Interact with the Plaid API.
    #[command(subcommand)]
    Plaid(PlaidCommand),
    /// Convert aggregator transactions to ledger entries.
    #[command(subcommand)]
    Ledger(LedgerCommand),
    /// Interact with Google Sheets.
    #[command(subcommand)]
    Sheets(SheetsCommand),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where cashcoach data and configuration is held. Defaults to ~/.cashcoach
    #[arg(long, env = "CASHCOACH_HOME", default_value_t = default_home())]
    home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, home: PathBuf) -> Self {
        Self {
            log_level,
            home: home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }
}

/// (Not shown): Args for the `cash init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// A Google service account key (JSON) for the sheets subcommands. It is moved into the
    /// secrets directory.
    #[arg(long)]
    service_account: Option<PathBuf>,
}

impl InitArgs {
    pub fn new(service_account: Option<PathBuf>) -> Self {
        Self { service_account }
    }

    pub fn service_account(&self) -> Option<&Path> {
        self.service_account.as_deref()
    }
}

/// (Not shown): Args for the `cash transactions` command.
#[derive(Debug, Parser, Clone)]
pub struct TransactionsArgs {
    /// The name of the account in the config file.
    account: String,

    /// The first day to fetch, e.g. 2024-03-01.
    #[arg(short, long)]
    start: Option<NaiveDate>,

    /// The last day to fetch (inclusive). Defaults to today when only --start is given.
    #[arg(short, long)]
    end: Option<NaiveDate>,

    /// Fetch the last N days. Overrides --start and --end.
    #[arg(short = 'l', long = "last-n", value_parser = clap::value_parser!(u64).range(1..))]
    last_n: Option<u64>,

    /// The column delimiter for TSV output.
    #[arg(short, long, default_value = "\t")]
    delimiter: String,

    #[arg(long, value_enum, default_value_t = Format::Tsv)]
    format: Format,
}

impl TransactionsArgs {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            start: None,
            end: None,
            last_n: None,
            delimiter: "\t".to_string(),
            format: Format::Tsv,
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// The dates to fetch, counting back from today where needed.
    pub fn interval(&self) -> anyhow::Result<Interval> {
        Interval::pick(self.start, self.end, self.last_n, Utc::now().date_naive())
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn format(&self) -> Format {
        self.format
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum PlaidCommand {
    /// Print a public token for an account, e.g. to open Plaid Link in update mode.
    PublicToken(AccountArg),
    /// Upgrade the legacy access token of an account and print the new one.
    UpdateToken(AccountArg),
}

#[derive(Debug, Parser, Clone)]
pub struct AccountArg {
    /// The name of the account in the config file.
    account: String,
}

impl AccountArg {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum LedgerCommand {
    /// Read transactions (JSON or the TSV written by `cash transactions`) and print ledger
    /// entries.
    Import(LedgerImportArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct LedgerImportArgs {
    /// The file to read, stdin if not set.
    #[arg(short, long)]
    file: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Whose liability account the charges are booked against.
    #[arg(long, default_value = "me")]
    owner: String,

    /// Split every charge evenly between the owner and this person.
    #[arg(long)]
    split_with: Option<String>,
}

impl LedgerImportArgs {
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn split_with(&self) -> Option<&str> {
        self.split_with.as_deref()
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum SheetsCommand {
    /// List the files the service account can see.
    List(SheetsListArgs),
    /// Create a spreadsheet from a TSV file and share it.
    Create(SheetsCreateArgs),
    /// Import a TSV file into a tab of an existing spreadsheet, replacing its contents.
    Import(SheetsImportArgs),
    /// Print a tab of a spreadsheet as TSV.
    Pull(SheetsPullArgs),
    /// Share a file with an email address.
    Share(SheetsShareArgs),
    /// Delete a file from Drive.
    Delete(SheetsDeleteArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct SheetsListArgs {
    /// A Drive query, e.g. "name contains 'budget'".
    #[arg(short, long)]
    query: Option<String>,

    /// Print file ids instead of links.
    #[arg(short, long)]
    ids: bool,

    /// Print the MIME type of each file.
    #[arg(short, long)]
    mime: bool,
}

impl SheetsListArgs {
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn options(&self) -> ListOptions {
        ListOptions {
            ids: self.ids,
            mime: self.mime,
        }
    }
}

#[derive(Debug, Parser, Clone)]
pub struct SheetsCreateArgs {
    /// The file to read data from, stdin if not set.
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// The title to give the spreadsheet.
    #[arg(short, long)]
    title: String,

    /// Share with this address instead of sheets.share_email from the config.
    #[arg(long)]
    email: Option<String>,
}

impl SheetsCreateArgs {
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}

#[derive(Debug, Parser, Clone)]
pub struct SheetsImportArgs {
    /// The file to read data from, stdin if not set.
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// The id of the spreadsheet to import to.
    #[arg(short, long)]
    spreadsheet: String,

    /// The name of the sheet to import to.
    #[arg(short, long)]
    name: String,
}

impl SheetsImportArgs {
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn spreadsheet(&self) -> &str {
        &self.spreadsheet
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Parser, Clone)]
pub struct SheetsPullArgs {
    /// The id of the spreadsheet to pull from.
    #[arg(short, long)]
    spreadsheet: String,

    /// The name of the sheet to pull.
    #[arg(short, long)]
    name: String,
}

impl SheetsPullArgs {
    pub fn spreadsheet(&self) -> &str {
        &self.spreadsheet
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Parser, Clone)]
pub struct SheetsShareArgs {
    /// The id of the file to share.
    id: String,

    /// Defaults to sheets.share_email from the config.
    #[arg(long)]
    email: Option<String>,
}

impl SheetsShareArgs {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}

#[derive(Debug, Parser, Clone)]
pub struct SheetsDeleteArgs {
    /// The id of the file to delete.
    id: String,
}

impl SheetsDeleteArgs {
    pub fn id(&self) -> &str {
        &self.id
    }
}

fn default_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join(".cashcoach"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or CASHCOACH_HOME instead of relying on the default \
                directory. If you continue using the program right now, you may have problems!",
            );
            PathBuf::from(".cashcoach")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}
