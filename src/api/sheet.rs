//! Implements the `Sheets` trait against Google. Cell values are read and written with the
//! `sheets::Client`; spreadsheet structure and Drive files go through the REST endpoints directly.

use crate::api::{DriveFile, Sheets, TokenProvider};
use crate::error::Res;
use crate::model::{quote_sheet_name, CellRange};
use anyhow::{bail, Context};
use serde::Deserialize;
use serde_json::json;
use sheets::types::{
    BatchClearValuesRequest, BatchUpdateValuesRequest, DateTimeRenderOption, Dimension,
    ValueInputOption, ValueRange, ValueRenderOption,
};
use sheets::ClientError;
use tracing::{debug, trace};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4";
const DRIVE_API: &str = "https://www.googleapis.com/drive/v3";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
const DRIVE_FILE_FIELDS: &str = "nextPageToken,files(id,name,mimeType,webViewLink)";

/// Talks to Google Sheets and Google Drive as a service account. It asks its `TokenProvider` for
/// a token before each call; the provider refreshes it when needed.
pub(super) struct GoogleSheets {
    token_provider: TokenProvider,
    http: reqwest::Client,
    sheets_api: String,
    drive_api: String,
}

impl GoogleSheets {
    pub(super) fn new(token_provider: TokenProvider) -> Self {
        Self::with_endpoints(token_provider, SHEETS_API, DRIVE_API)
    }

    pub(super) fn with_endpoints(
        token_provider: TokenProvider,
        sheets_api: impl Into<String>,
        drive_api: impl Into<String>,
    ) -> Self {
        Self {
            token_provider,
            http: reqwest::Client::new(),
            sheets_api: sheets_api.into(),
            drive_api: drive_api.into(),
        }
    }

    /// Creates a sheets client with a refreshed access token.
    async fn client(&mut self) -> Res<sheets::Client> {
        let access_token = self.token_provider.token().await?;

        // The sheets crate wants client_id, client_secret, redirect_uri and a refresh token, none
        // of which are needed when we hand it a valid access token.
        Ok(sheets::Client::new(
            String::new(),
            String::new(),
            String::new(),
            access_token,
            String::new(),
        ))
    }

    /// Sends an authorized request and fails on any non-success status.
    async fn send(&mut self, request: reqwest::RequestBuilder) -> Res<reqwest::Response> {
        let token = self.token_provider.token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to send the request to Google")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            bail!("Google API request failed with status {status}: {body}");
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl Sheets for GoogleSheets {
    async fn list_files(&mut self, query: Option<&str>) -> Res<Vec<DriveFile>> {
        let url = format!("{}/files", self.drive_api);
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut params = vec![("fields", DRIVE_FILE_FIELDS.to_string())];
            if let Some(q) = query {
                params.push(("q", q.to_string()));
            }
            if let Some(t) = page_token.take() {
                params.push(("pageToken", t));
            }
            let request = self.http.get(&url).query(&params);
            let page: FileList = self
                .send(request)
                .await?
                .json()
                .await
                .context("Failed to parse the Drive file list")?;
            trace!("Drive returned {} files", page.files.len());
            files.extend(page.files);
            match page.next_page_token {
                Some(t) if !t.is_empty() => page_token = Some(t),
                _ => break,
            }
        }
        Ok(files)
    }

    async fn create_spreadsheet(&mut self, title: &str) -> Res<DriveFile> {
        let request = self
            .http
            .post(format!("{}/spreadsheets", self.sheets_api))
            .json(&json!({ "properties": { "title": title } }));
        let created: Spreadsheet = self
            .send(request)
            .await
            .with_context(|| format!("Failed to create the spreadsheet '{title}'"))?
            .json()
            .await
            .context("Failed to parse the new spreadsheet")?;
        debug!("Created spreadsheet {}", created.spreadsheet_id);
        Ok(DriveFile {
            id: created.spreadsheet_id,
            name: title.to_string(),
            mime_type: SPREADSHEET_MIME.to_string(),
            web_view_link: created.spreadsheet_url,
        })
    }

    async fn sheet_titles(&mut self, spreadsheet_id: &str) -> Res<Vec<String>> {
        let request = self
            .http
            .get(format!("{}/spreadsheets/{spreadsheet_id}", self.sheets_api))
            .query(&[("fields", "sheets.properties.title")]);
        let spreadsheet: Spreadsheet = self
            .send(request)
            .await?
            .json()
            .await
            .context("Failed to parse the spreadsheet")?;
        Ok(spreadsheet
            .sheets
            .into_iter()
            .map(|s| s.properties.title)
            .collect())
    }

    async fn add_sheet(&mut self, spreadsheet_id: &str, title: &str) -> Res<()> {
        let request = self
            .http
            .post(format!(
                "{}/spreadsheets/{spreadsheet_id}:batchUpdate",
                self.sheets_api
            ))
            .json(&json!({
                "requests": [{ "addSheet": { "properties": { "title": title } } }]
            }));
        self.send(request)
            .await
            .with_context(|| format!("Failed to add the sheet '{title}'"))?;
        Ok(())
    }

    async fn get_values(&mut self, spreadsheet_id: &str, sheet: &str) -> Res<Vec<Vec<String>>> {
        trace!("get_values for {sheet}");
        let range = quote_sheet_name(sheet);
        let response = self
            .client()
            .await?
            .spreadsheets()
            .values_get(
                spreadsheet_id,
                &range,
                DateTimeRenderOption::FormattedString,
                Dimension::Rows,
                ValueRenderOption::FormattedValue,
            )
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to fetch {sheet} sheet data"))?;
        Ok(response.body.values)
    }

    async fn clear_sheet(&mut self, spreadsheet_id: &str, sheet: &str) -> Res<()> {
        let request = BatchClearValuesRequest {
            ranges: vec![quote_sheet_name(sheet)],
        };
        self.client()
            .await?
            .spreadsheets()
            .values_batch_clear(spreadsheet_id, &request)
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to clear the {sheet} sheet"))?;
        Ok(())
    }

    async fn write_values(
        &mut self,
        spreadsheet_id: &str,
        range: &CellRange,
        values: &[Vec<String>],
    ) -> Res<()> {
        let request = BatchUpdateValuesRequest {
            data: vec![ValueRange {
                major_dimension: Some(Dimension::Rows),
                range: range.to_string(),
                values: values.to_vec(),
            }],
            include_values_in_response: Some(false),
            response_date_time_render_option: None,
            response_value_render_option: None,
            value_input_option: Some(ValueInputOption::UserEntered),
        };
        self.client()
            .await?
            .spreadsheets()
            .values_batch_update(spreadsheet_id, &request)
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to write {range}"))?;
        Ok(())
    }

    async fn share(&mut self, file_id: &str, email: &str) -> Res<()> {
        let request = self
            .http
            .post(format!("{}/files/{file_id}/permissions", self.drive_api))
            .json(&json!({ "type": "user", "role": "writer", "emailAddress": email }));
        self.send(request)
            .await
            .with_context(|| format!("Failed to share {file_id} with {email}"))?;
        Ok(())
    }

    async fn delete(&mut self, file_id: &str) -> Res<()> {
        let request = self
            .http
            .delete(format!("{}/files/{file_id}", self.drive_api));
        self.send(request)
            .await
            .with_context(|| format!("Failed to delete {file_id}"))?;
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Spreadsheet {
    #[serde(default)]
    spreadsheet_id: String,
    spreadsheet_url: Option<String>,
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Default, Deserialize)]
struct SheetProperties {
    title: String,
}

fn map_client_error(e: ClientError) -> anyhow::Error {
    let error_name = match &e {
        ClientError::EmptyRefreshToken => "EmptyRefreshToken".to_string(),
        ClientError::FromUtf8Error(inner) => format!("FromUtf8Error {inner}"),
        ClientError::UrlParserError(inner) => format!("UrlParserError {inner}"),
        ClientError::SerdeJsonError(inner) => format!("SerdeJsonError {inner}"),
        ClientError::ReqwestError(inner) => format!("ReqwestError {inner}"),
        ClientError::InvalidHeaderValue(inner) => format!("InvalidHeaderValue {inner}"),
        ClientError::ReqwestMiddleWareError(inner) => format!("ReqwestMiddleWareError {inner}"),
        ClientError::HttpError { .. } => "HttpError".to_string(),
        ClientError::Other(_) => "Other".to_string(),
    };
    anyhow::Error::new(e).context(error_name)
}
