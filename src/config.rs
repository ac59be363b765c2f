//! Configuration file handling for cashcoach.
//!
//! The configuration file is stored at `$CASHCOACH_HOME/config.json` and contains settings for the
//! web server, the Google and Plaid credentials, the storage backend and the accounts used by the
//! command line tools.

use crate::api::plaid::{self, Environment, PlaidClient};
use crate::error::Res;
use crate::server::session;
use crate::storage::SqliteStorage;
use crate::utils;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "cashcoach";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const SERVICE_ACCOUNT_JSON: &str = "service_account.json";
const CONFIG_JSON: &str = "config.json";
const CASHCOACH_SQLITE: &str = "cashcoach.sqlite";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5001";
const DEFAULT_CALLBACK_URL: &str = "http://localhost:5001/oauth2callback";
const DEFAULT_MONGO_DATABASE: &str = "cashcoach";

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const GOOGLE_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const GOOGLE_ISSUERS: &[&str] = &["accounts.google.com", "https://accounts.google.com"];

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$CASHCOACH_HOME` and from there it loads `$CASHCOACH_HOME/config.json`. It provides
/// paths to other items that are either configurable or are expected in a certain location within
/// the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
}

impl Config {
    /// Creates the data directory, its subdirectories and:
    /// - Creates an initial `config.json` with a freshly generated cookie secret
    /// - Moves `service_account`, if given, into its default location in the data dir
    /// - Creates the SQLite database
    ///
    /// # Errors
    /// - Returns an error if any file operations fail.
    pub async fn create(dir: impl Into<PathBuf>, service_account: Option<&Path>) -> Res<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the cashcoach home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.exists() {
            bail!(
                "A config file already exists at '{}', refusing to overwrite it",
                config_path.display()
            );
        }

        let secrets = root.join(SECRETS);
        utils::make_dir(&secrets).await?;

        if let Some(source) = service_account {
            let destination = secrets.join(SERVICE_ACCOUNT_JSON);
            utils::rename(source, &destination).await?;
        }

        let config_file = ConfigFile {
            server: ServerConfig {
                cookie_secret: session::generate_secret(),
                ..Default::default()
            },
            ..Default::default()
        };
        config_file.save(&config_path).await?;

        let config = Self {
            root,
            secrets,
            config_path,
            config_file,
        };

        let _ = SqliteStorage::connect(&config.sqlite_path())
            .await
            .context("Unable to create the SQLite database")?;

        Ok(config)
    }

    /// This will
    /// - validate that the home directory exists and that the config file exists
    /// - load the config file
    /// - validate that the secrets directory exists
    /// - return the loaded configuration object
    pub async fn load(home: impl Into<PathBuf>) -> Res<Self> {
        let maybe_relative = home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The cashcoach home directory is missing, run 'cash init' first")?;

        let _ = utils::read_dir(&root)
            .await
            .context("The cashcoach home directory is not readable")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let config = Self {
            secrets: root.join(SECRETS),
            root,
            config_path,
            config_file,
        };
        if !config.secrets.is_dir() {
            bail!(
                "The secrets directory is missing '{}'",
                config.secrets.display()
            )
        }
        Ok(config)
    }

    /// Writes the current settings back to `config.json`.
    pub async fn save(&self) -> Res<()> {
        self.config_file.save(&self.config_path).await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn server(&self) -> &ServerConfig {
        &self.config_file.server
    }

    pub fn google(&self) -> &GoogleConfig {
        &self.config_file.google
    }

    pub fn plaid(&self) -> &PlaidConfig {
        &self.config_file.plaid
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.config_file.storage
    }

    pub fn accounts(&self) -> &[AccountConfig] {
        &self.config_file.accounts
    }

    /// Finds a command line account by name.
    pub fn account(&self, name: &str) -> Res<&AccountConfig> {
        self.accounts()
            .iter()
            .find(|a| a.name == name)
            .context("No account with that name.")
    }

    pub fn sheets(&self) -> &SheetsConfig {
        &self.config_file.sheets
    }

    /// The path of the SQLite database, resolved against the home directory.
    pub fn sqlite_path(&self) -> PathBuf {
        match &self.config_file.storage {
            StorageConfig::Sqlite { path: Some(p) } => self.resolve(p.clone()),
            _ => self.root.join(CASHCOACH_SQLITE),
        }
    }

    /// The path of the service account key used for Google Sheets, resolved against the home
    /// directory.
    pub fn service_account_path(&self) -> PathBuf {
        self.resolve(
            self.config_file
                .sheets
                .service_account_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(SECRETS).join(SERVICE_ACCOUNT_JSON)),
        )
    }

    /// Checks if `p` is relative, and if so, resolves it. Returns it unchanged if it is absolute.
    fn resolve(&self, p: PathBuf) -> PathBuf {
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }

    #[cfg(test)]
    pub(crate) fn edit(&mut self, f: impl FnOnce(&mut ConfigFile)) {
        f(&mut self.config_file)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "cashcoach",
///   "config_version": 1,
///   "server": {
///     "listen_addr": "0.0.0.0:5001",
///     "cookie_secret": "9f2c...64 hex characters...",
///     "oauth_callback_url": "http://localhost:5001/oauth2callback",
///     "secure_cookies": false
///   },
///   "google": { "client_id": "1234.apps.googleusercontent.com", "client_secret": "..." },
///   "plaid": { "client_id": "...", "secret": "...", "environment": "sandbox" },
///   "storage": { "kind": "mongo", "uri": "mongodb://localhost:27017", "database": "cashcoach" },
///   "accounts": [
///     { "name": "visa", "token": "access-sandbox-...", "nicknames": { "1234": "pat" } }
///   ],
///   "sheets": { "share_email": "pat@example.com" }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub(crate) struct ConfigFile {
    /// Application name, should always be "cashcoach"
    pub(crate) app_name: String,

    /// Configuration file version
    pub(crate) config_version: u8,

    #[serde(default)]
    pub(crate) server: ServerConfig,

    #[serde(default)]
    pub(crate) google: GoogleConfig,

    #[serde(default)]
    pub(crate) plaid: PlaidConfig,

    #[serde(default)]
    pub(crate) storage: StorageConfig,

    /// Accounts used by the command line tools.
    #[serde(default)]
    pub(crate) accounts: Vec<AccountConfig>,

    #[serde(default)]
    pub(crate) sheets: SheetsConfig,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            server: ServerConfig::default(),
            google: GoogleConfig::default(),
            plaid: PlaidConfig::default(),
            storage: StorageConfig::default(),
            accounts: Vec::new(),
            sheets: SheetsConfig::default(),
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub(crate) async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;

        let config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path. The file holds secrets, so it is only readable
    /// by the owner.
    pub(crate) async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write_secret(p, data)
            .await
            .context("Unable to write config file")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// The address the web server binds to.
    pub listen_addr: String,

    /// 32 bytes, hex encoded, used to encrypt cookies. Generate one with `cash keygen`.
    pub cookie_secret: String,

    /// Where Google sends the browser after sign-in. It must match a redirect URI registered
    /// for the OAuth client.
    pub oauth_callback_url: String,

    /// Mark cookies `Secure`. Turn this on when serving over HTTPS.
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            cookie_secret: String::new(),
            oauth_callback_url: DEFAULT_CALLBACK_URL.to_string(),
            secure_cookies: false,
        }
    }
}

/// The OAuth web client and the Google endpoints. The endpoints only need to be set for testing.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub certs_url: String,
    pub issuers: Vec<String>,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
            certs_url: GOOGLE_CERTS_URL.to_string(),
            issuers: GOOGLE_ISSUERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct PlaidConfig {
    pub client_id: String,
    pub secret: String,
    pub environment: Environment,

    /// Overrides the URL that `environment` implies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl PlaidConfig {
    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.environment.base_url().to_string())
    }

    pub fn client(&self) -> PlaidClient {
        PlaidClient::new(self.client_id.clone(), self.secret.clone(), self.base_url())
    }
}

/// Where `Person` records are kept.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Nothing is persisted. When `access_token` is set, every unknown user gets a single linked
    /// account named `bank1` that uses it, which is handy for development.
    Memory {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        access_token: Option<String>,
    },
    /// A SQLite file, `$CASHCOACH_HOME/cashcoach.sqlite` by default.
    Sqlite {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
    Mongo {
        uri: String,
        #[serde(default = "default_mongo_database")]
        database: String,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite { path: None }
    }
}

fn default_mongo_database() -> String {
    DEFAULT_MONGO_DATABASE.to_string()
}

/// A Plaid item used by the command line tools.
#[derive(Debug, Default, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct AccountConfig {
    pub name: String,
    pub token: String,

    /// Maps the last digits of an account number (the Plaid `mask`) to a short name.
    #[serde(default)]
    pub nicknames: BTreeMap<String, String>,
}

impl AccountConfig {
    /// Maps each Plaid `account_id` to the nickname of its mask. Accounts without a nickname keep
    /// their `account_id`.
    pub fn nick_map(&self, accounts: &[plaid::Account]) -> BTreeMap<String, String> {
        accounts
            .iter()
            .map(|a| {
                let nick = a
                    .mask
                    .as_ref()
                    .and_then(|m| self.nicknames.get(m))
                    .cloned()
                    .unwrap_or_else(|| a.account_id.clone());
                (a.account_id.clone(), nick)
            })
            .collect()
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct SheetsConfig {
    /// Defaults to $CASHCOACH_HOME/.secrets/service_account.json
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_path: Option<PathBuf>,

    /// New spreadsheets are shared with this address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_email: Option<String>,
}
