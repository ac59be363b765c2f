//! The `sheets` subcommands, which move TSV data in and out of Google Sheets.

use crate::api::{DriveFile, Sheets};
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::model::CellRange;
use crate::{utils, Config, Result};
use anyhow::{anyhow, Context};
use std::path::Path;
use tracing::{info, warn};

/// Which columns `sheets list` prints besides the name.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct ListOptions {
    /// Print the file id instead of its link.
    pub ids: bool,
    /// Also print the MIME type.
    pub mime: bool,
}

fn view_link(spreadsheet_id: &str) -> String {
    DriveFile {
        id: spreadsheet_id.to_string(),
        ..Default::default()
    }
    .link()
}

async fn read_rows(file: Option<&Path>) -> Result<Vec<Vec<String>>> {
    let text = utils::read_input(file).await.pub_result(ErrorType::Io)?;
    utils::read_tsv(&text).pub_result(ErrorType::Request)
}

/// The address to share with: `email` if given, otherwise `sheets.share_email` from the config.
fn share_email<'a>(config: &'a Config, email: Option<&'a str>) -> Option<&'a str> {
    email.or(config.sheets().share_email.as_deref())
}

/// Lists the Drive files the service account can see as a TSV table.
pub async fn sheets_list(
    sheets: &mut dyn Sheets,
    query: Option<&str>,
    options: ListOptions,
) -> Result<Out<Vec<DriveFile>>> {
    let files = sheets
        .list_files(query)
        .await
        .context("Unable to retrieve data from drive")
        .pub_result(ErrorType::Sheets)?;

    let mut headers = vec!["Name", if options.ids { "ID" } else { "Link" }];
    if options.mime {
        headers.push("Mime Type");
    }
    let mut output = headers.join("\t");
    output.push('\n');

    if files.is_empty() {
        output.push_str("No files found.\n");
    }
    for f in &files {
        let mut row = vec![
            f.name.clone(),
            if options.ids { f.id.clone() } else { f.link() },
        ];
        if options.mime {
            row.push(f.mime_type.clone());
        }
        output.push_str(&row.join("\t"));
        output.push('\n');
    }
    Ok(Out::new(format!("Found {} files", files.len()), files).with_output(output))
}

/// Creates a spreadsheet named `title` holding the TSV data from `file` (stdin when `None`), then
/// shares it.
pub async fn sheets_create(
    config: &Config,
    sheets: &mut dyn Sheets,
    file: Option<&Path>,
    title: &str,
    email: Option<&str>,
) -> Result<Out<DriveFile>> {
    let rows = read_rows(file).await?;
    let created = sheets
        .create_spreadsheet(title)
        .await
        .with_context(|| format!("Unable to create spreadsheet '{title}'"))
        .pub_result(ErrorType::Sheets)?;
    info!("Created spreadsheet {}", created.id);

    let titles = sheets
        .sheet_titles(&created.id)
        .await
        .pub_result(ErrorType::Sheets)?;
    let first = titles.first().map(String::as_str).unwrap_or("Sheet1");
    sheets
        .write_values(&created.id, &CellRange::for_data(first, &rows), &rows)
        .await
        .context("Unable to import file")
        .pub_result(ErrorType::Sheets)?;

    match share_email(config, email) {
        Some(email) => {
            info!("Sharing with {email}...");
            sheets
                .share(&created.id, email)
                .await
                .context("Unable to share file")
                .pub_result(ErrorType::Sheets)?;
        }
        None => warn!("No email to share with, only the service account can open the spreadsheet"),
    }

    Ok(Out::new(format!("Complete! View at: {}", created.link()), created))
}

/// Replaces the contents of the tab `name` with the TSV data from `file` (stdin when `None`). The
/// tab is added when the spreadsheet does not have it yet.
pub async fn sheets_import(
    sheets: &mut dyn Sheets,
    file: Option<&Path>,
    spreadsheet_id: &str,
    name: &str,
) -> Result<Out<()>> {
    let rows = read_rows(file).await?;
    let titles = sheets
        .sheet_titles(spreadsheet_id)
        .await
        .context("Unable to find spreadsheet")
        .pub_result(ErrorType::Sheets)?;

    if titles.iter().any(|t| t == name) {
        sheets
            .clear_sheet(spreadsheet_id, name)
            .await
            .pub_result(ErrorType::Sheets)?;
    } else {
        info!("Adding sheet '{name}'");
        sheets
            .add_sheet(spreadsheet_id, name)
            .await
            .context("Unable to add sheet")
            .pub_result(ErrorType::Sheets)?;
    }

    sheets
        .write_values(spreadsheet_id, &CellRange::for_data(name, &rows), &rows)
        .await
        .context("Unable to add data to sheet")
        .pub_result(ErrorType::Sheets)?;
    Ok(format!("Complete! View at: {}", view_link(spreadsheet_id)).into())
}

/// Prints the contents of the tab `name` as TSV.
pub async fn sheets_pull(
    sheets: &mut dyn Sheets,
    spreadsheet_id: &str,
    name: &str,
) -> Result<Out<Vec<Vec<String>>>> {
    let titles = sheets
        .sheet_titles(spreadsheet_id)
        .await
        .context("Unable to find spreadsheet")
        .pub_result(ErrorType::Sheets)?;
    if !titles.iter().any(|t| t == name) {
        return Err(anyhow!("Unable to find sheet: {name}")).pub_result(ErrorType::NotFound);
    }

    let rows = sheets
        .get_values(spreadsheet_id, name)
        .await
        .context("Unable to fetch sheet contents")
        .pub_result(ErrorType::Sheets)?;
    let mut output = String::new();
    for row in &rows {
        output.push_str(&row.join("\t"));
        output.push('\n');
    }
    Ok(Out::new(format!("Pulled {} rows from {name}", rows.len()), rows).with_output(output))
}

/// Gives `email`, or the configured `sheets.share_email`, write access to a file.
pub async fn sheets_share(
    config: &Config,
    sheets: &mut dyn Sheets,
    file_id: &str,
    email: Option<&str>,
) -> Result<Out<()>> {
    let email = share_email(config, email)
        .context("No email to share with. Pass --email or set sheets.share_email in the config")
        .pub_result(ErrorType::Config)?;
    sheets
        .share(file_id, email)
        .await
        .context("Unable to share file")
        .pub_result(ErrorType::Sheets)?;
    Ok(format!("Successfully shared {file_id} with {email}").into())
}

pub async fn sheets_delete(sheets: &mut dyn Sheets, file_id: &str) -> Result<Out<()>> {
    sheets
        .delete(file_id)
        .await
        .context("Unable to delete file")
        .pub_result(ErrorType::Sheets)?;
    Ok(format!("Deleted {file_id}.").into())
}
