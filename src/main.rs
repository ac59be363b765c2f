use cashcoach::args::{Args, Command, LedgerCommand, PlaidCommand, SheetsCommand};
use cashcoach::{api, commands, Config, ErrorType, IntoResult, Mode, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().home().path();

    // When CASHCOACH_TEST_MODE is set and non-empty the sheets subcommands use in-memory
    // spreadsheets instead of Google.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(home, init_args.service_account())
            .await?
            .print(),

        Command::Keygen => commands::keygen().await?.print(),

        Command::Serve => {
            let config = Config::load(home).await?;
            commands::serve(&config).await?.print()
        }

        Command::Accounts => {
            let config = Config::load(home).await?;
            commands::accounts(&config).await?.print()
        }

        Command::Transactions(t) => {
            let config = Config::load(home).await?;
            let interval = t.interval().pub_result(ErrorType::Request)?;
            commands::transactions(&config, t.account(), interval, t.delimiter(), t.format())
                .await?
                .print()
        }

        Command::Plaid(plaid) => {
            let config = Config::load(home).await?;
            match plaid {
                PlaidCommand::PublicToken(a) => commands::public_token(&config, a.account())
                    .await?
                    .print(),
                PlaidCommand::UpdateToken(a) => commands::update_token(&config, a.account())
                    .await?
                    .print(),
            }
        }

        Command::Ledger(LedgerCommand::Import(import)) => commands::ledger_import(
            import.file(),
            import.format(),
            import.owner(),
            import.split_with(),
        )
        .await?
        .print(),

        Command::Sheets(sheets_command) => {
            let config = Config::load(home).await?;
            let mut sheets = api::sheets(&config, mode)
                .await
                .pub_result(ErrorType::Sheets)?;
            let sheets = sheets.as_mut();
            match sheets_command {
                SheetsCommand::List(a) => commands::sheets_list(sheets, a.query(), a.options())
                    .await?
                    .print(),
                SheetsCommand::Create(a) => {
                    commands::sheets_create(&config, sheets, a.file(), a.title(), a.email())
                        .await?
                        .print()
                }
                SheetsCommand::Import(a) => {
                    commands::sheets_import(sheets, a.file(), a.spreadsheet(), a.name())
                        .await?
                        .print()
                }
                SheetsCommand::Pull(a) => commands::sheets_pull(sheets, a.spreadsheet(), a.name())
                    .await?
                    .print(),
                SheetsCommand::Share(a) => commands::sheets_share(&config, sheets, a.id(), a.email())
                    .await?
                    .print(),
                SheetsCommand::Delete(a) => commands::sheets_delete(sheets, a.id()).await?.print(),
            }
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for the library and binary only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_PKG_NAME"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
