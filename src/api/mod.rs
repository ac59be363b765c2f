//! Clients for the services cashcoach talks to: Plaid, Google sign-in and Google Sheets/Drive.

mod id_token;
mod oauth;
pub mod plaid;
mod service_account;
mod sheet;
mod sheet_test_client;

use crate::error::Res;
use crate::model::CellRange;
use crate::Config;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use id_token::{profile_from_claims, Claims, IdTokenVerifier};
pub use oauth::GoogleOAuth;
pub use plaid::{Environment, PlaidClient};
pub use sheet_test_client::{TestSheets, TestSpreadsheet, TEST_SPREADSHEET_ID};

pub(crate) use service_account::TokenProvider;

/// OAuth scopes used by the service account for the sheets subcommands.
const SHEETS_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

/// When this environment variable is set to anything, the sheets subcommands use an in-memory
/// spreadsheet instead of Google.
pub const TEST_MODE_ENV: &str = "CASHCOACH_TEST_MODE";

/// Decides whether the sheets subcommands talk to Google or to the in-memory `TestSheets`.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Google,
    Test,
}

serde_plain::derive_display_from_serialize!(Mode);
serde_plain::derive_fromstr_from_deserialize!(Mode);

impl Mode {
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(s) if !s.is_empty() => Mode::Test,
            _ => Mode::Google,
        }
    }
}

/// A file in Google Drive.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
}

impl DriveFile {
    /// The link to open the file, falling back to the spreadsheet URL when Drive did not give us
    /// one.
    pub fn link(&self) -> String {
        self.web_view_link
            .clone()
            .unwrap_or_else(|| format!("https://docs.google.com/spreadsheets/d/{}", self.id))
    }
}

/// The spreadsheet and Drive operations used by the `sheets` subcommands.
#[async_trait::async_trait]
pub trait Sheets: Send {
    /// Lists the Drive files visible to us, optionally filtered with a Drive query like
    /// `name contains 'budget'`.
    async fn list_files(&mut self, query: Option<&str>) -> Res<Vec<DriveFile>>;

    /// Creates an empty spreadsheet and returns it.
    async fn create_spreadsheet(&mut self, title: &str) -> Res<DriveFile>;

    /// The names of the tabs of a spreadsheet, in order.
    async fn sheet_titles(&mut self, spreadsheet_id: &str) -> Res<Vec<String>>;

    async fn add_sheet(&mut self, spreadsheet_id: &str, title: &str) -> Res<()>;

    /// All values of a tab, as formatted strings.
    async fn get_values(&mut self, spreadsheet_id: &str, sheet: &str) -> Res<Vec<Vec<String>>>;

    /// Removes all values from a tab.
    async fn clear_sheet(&mut self, spreadsheet_id: &str, sheet: &str) -> Res<()>;

    async fn write_values(
        &mut self,
        spreadsheet_id: &str,
        range: &CellRange,
        values: &[Vec<String>],
    ) -> Res<()>;

    /// Gives `email` write access to a file.
    async fn share(&mut self, file_id: &str, email: &str) -> Res<()>;

    async fn delete(&mut self, file_id: &str) -> Res<()>;
}

/// Creates the `Sheets` implementation for `mode`.
pub async fn sheets(config: &Config, mode: Mode) -> Res<Box<dyn Sheets>> {
    debug!("Using {mode} mode for sheets");
    match mode {
        Mode::Google => {
            let token_provider =
                TokenProvider::load(config.service_account_path(), SHEETS_SCOPES).await?;
            Ok(Box::new(sheet::GoogleSheets::new(token_provider)))
        }
        Mode::Test => Ok(Box::new(TestSheets::default())),
    }
}

#[test]
fn test_drive_file_link() {
    let f = DriveFile {
        id: "abc".to_string(),
        ..Default::default()
    };
    assert_eq!(f.link(), "https://docs.google.com/spreadsheets/d/abc");
    let json = r#"{"id":"x","name":"Budget","mimeType":"application/vnd.google-apps.spreadsheet","webViewLink":"https://docs.google.com/x"}"#;
    let f: DriveFile = serde_json::from_str(json).unwrap();
    assert_eq!(f.mime_type, "application/vnd.google-apps.spreadsheet");
    assert_eq!(f.link(), "https://docs.google.com/x");
}
