use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::server::generate_secret;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its subdirectories and:
/// - Creates an initial `config.json` with a fresh cookie secret and default settings
/// - Moves `service_account`, if given, into its default location in the data dir
/// - Creates the SQLite database
///
/// # Arguments
/// - `home` - The directory that will be the root of data directory, e.g. `$HOME/.cashcoach`
/// - `service_account` - A Google service account key (JSON). The `sheets` subcommands act as this
///   service account.
///
/// # Errors
/// - Returns an error if any file operations fail.
pub async fn init(home: &Path, service_account: Option<&Path>) -> Result<Out<()>> {
    let config = Config::create(home, service_account)
        .await
        .context("Unable to create the data directory and configs")
        .pub_result(ErrorType::Config)?;
    Ok(format!(
        "Created {}. Add your Google and Plaid credentials to it before running 'cash serve'",
        config.config_path().display()
    )
    .into())
}

/// Prints a new random cookie secret for `server.cookie_secret`.
pub async fn keygen() -> Result<Out<()>> {
    Ok(Out::new_message("Generated a new 32 byte cookie secret").with_output(generate_secret()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("home");
        let out = init(&home, None).await.unwrap();
        assert!(out.message().contains("config.json"));
        assert!(home.join("config.json").is_file());

        let err = init(&home, None).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }

    #[tokio::test]
    async fn test_keygen() {
        let out = keygen().await.unwrap();
        let secret = out.output().unwrap();
        assert_eq!(secret.len(), 64);
        assert!(crate::server::SessionHandler::from_hex(secret, false).is_ok());
        assert_ne!(keygen().await.unwrap().output(), Some(secret));
    }
}
