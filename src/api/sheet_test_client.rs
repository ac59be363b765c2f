//! Implements the `Sheets` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without using Google Sheets.

use crate::api::{DriveFile, Sheets};
use crate::error::Res;
use crate::model::CellRange;
use crate::utils;
use anyhow::{bail, Context};
use std::collections::BTreeMap;

/// The id of the spreadsheet that `TestSheets` starts out with.
pub const TEST_SPREADSHEET_ID: &str = "test-spreadsheet-0001";
const TEST_SPREADSHEET_NAME: &str = "Household Budget";
const TRANSACTIONS: &str = "Transactions";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

/// One spreadsheet: its tabs, in order, and who it has been shared with.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct TestSpreadsheet {
    pub name: String,
    pub tabs: Vec<(String, Vec<Vec<String>>)>,
    pub shared_with: Vec<String>,
}

impl TestSpreadsheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tabs: vec![("Sheet1".to_string(), Vec::new())],
            shared_with: Vec::new(),
        }
    }

    pub fn tab(&self, title: &str) -> Option<&Vec<Vec<String>>> {
        self.tabs.iter().find(|(t, _)| t == title).map(|(_, v)| v)
    }

    fn tab_mut(&mut self, title: &str) -> Res<&mut Vec<Vec<String>>> {
        self.tabs
            .iter_mut()
            .find(|(t, _)| t == title)
            .map(|(_, v)| v)
            .with_context(|| format!("Sheet '{title}' not found"))
    }
}

/// An implementation of the `Sheets` trait that does not use Google. It holds any number of
/// spreadsheets in memory and, by default, is seeded with one.
#[derive(Debug, Clone)]
pub struct TestSheets {
    pub files: BTreeMap<String, TestSpreadsheet>,
    next_id: usize,
}

impl TestSheets {
    pub fn new(files: BTreeMap<String, TestSpreadsheet>) -> Self {
        Self { files, next_id: 1 }
    }

    pub fn spreadsheet(&self, id: &str) -> Option<&TestSpreadsheet> {
        self.files.get(id)
    }

    fn get_mut(&mut self, id: &str) -> Res<&mut TestSpreadsheet> {
        self.files
            .get_mut(id)
            .with_context(|| format!("File not found: {id}"))
    }

    fn drive_file(id: &str, s: &TestSpreadsheet) -> DriveFile {
        DriveFile {
            id: id.to_string(),
            name: s.name.clone(),
            mime_type: SPREADSHEET_MIME.to_string(),
            web_view_link: None,
        }
    }
}

impl Default for TestSheets {
    /// Loads seed data from this module.
    fn default() -> Self {
        let mut spreadsheet = TestSpreadsheet::new(TEST_SPREADSHEET_NAME);
        // The seed data is a constant, so a parse failure leaves the tab empty.
        let rows = utils::read_tsv(TRANSACTION_DATA).unwrap_or_default();
        spreadsheet.tabs = vec![(TRANSACTIONS.to_string(), rows)];
        Self::new(BTreeMap::from([(
            TEST_SPREADSHEET_ID.to_string(),
            spreadsheet,
        )]))
    }
}

#[async_trait::async_trait]
impl Sheets for TestSheets {
    async fn list_files(&mut self, query: Option<&str>) -> Res<Vec<DriveFile>> {
        // Only `name contains '...'` queries are understood; anything else lists everything.
        let needle = query.and_then(|q| {
            q.strip_prefix("name contains '")
                .and_then(|rest| rest.strip_suffix('\''))
        });
        Ok(self
            .files
            .iter()
            .filter(|(_, s)| needle.map(|n| s.name.contains(n)).unwrap_or(true))
            .map(|(id, s)| Self::drive_file(id, s))
            .collect())
    }

    async fn create_spreadsheet(&mut self, title: &str) -> Res<DriveFile> {
        let id = format!("test-spreadsheet-{:04}", self.next_id + 1);
        self.next_id += 1;
        let spreadsheet = TestSpreadsheet::new(title);
        let file = Self::drive_file(&id, &spreadsheet);
        self.files.insert(id, spreadsheet);
        Ok(file)
    }

    async fn sheet_titles(&mut self, spreadsheet_id: &str) -> Res<Vec<String>> {
        let s = self.get_mut(spreadsheet_id)?;
        Ok(s.tabs.iter().map(|(t, _)| t.clone()).collect())
    }

    async fn add_sheet(&mut self, spreadsheet_id: &str, title: &str) -> Res<()> {
        let s = self.get_mut(spreadsheet_id)?;
        if s.tab(title).is_some() {
            bail!("A sheet with the name \"{title}\" already exists");
        }
        s.tabs.push((title.to_string(), Vec::new()));
        Ok(())
    }

    async fn get_values(&mut self, spreadsheet_id: &str, sheet: &str) -> Res<Vec<Vec<String>>> {
        let s = self.get_mut(spreadsheet_id)?;
        Ok(s.tab_mut(sheet)?.clone())
    }

    async fn clear_sheet(&mut self, spreadsheet_id: &str, sheet: &str) -> Res<()> {
        self.get_mut(spreadsheet_id)?.tab_mut(sheet)?.clear();
        Ok(())
    }

    async fn write_values(
        &mut self,
        spreadsheet_id: &str,
        range: &CellRange,
        values: &[Vec<String>],
    ) -> Res<()> {
        let tab = self.get_mut(spreadsheet_id)?.tab_mut(&range.sheet)?;
        for (r, row) in values.iter().enumerate() {
            let row_index = range.start.row + r;
            if tab.len() <= row_index {
                tab.resize(row_index + 1, Vec::new());
            }
            let target = &mut tab[row_index];
            for (c, value) in row.iter().enumerate() {
                let col_index = range.start.col + c;
                if target.len() <= col_index {
                    target.resize(col_index + 1, String::new());
                }
                target[col_index] = value.clone();
            }
        }
        Ok(())
    }

    async fn share(&mut self, file_id: &str, email: &str) -> Res<()> {
        let s = self.get_mut(file_id)?;
        if !s.shared_with.iter().any(|e| e == email) {
            s.shared_with.push(email.to_string());
        }
        Ok(())
    }

    async fn delete(&mut self, file_id: &str) -> Res<()> {
        self.files
            .remove(file_id)
            .with_context(|| format!("File not found: {file_id}"))?;
        Ok(())
    }
}

/// Seed transaction data.
const TRANSACTION_DATA: &str = "account\tdate\tdescription\tcategory\tamount
visa\t2025-10-20\tWhole Foods Market\tShops:Supermarkets\t87.43
visa\t2025-10-19\tStarbucks\tFood and Drink:Restaurants:Coffee Shop\t6.75
visa\t2025-10-18\tShell\tTravel:Gas Stations\t52.30
checking\t2025-10-16\tPG&E\tService:Utilities\t142.67
checking\t2025-10-15\tPayroll\tTransfer:Payroll\t-2500.00
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CellRange, CellRef};

    #[tokio::test]
    async fn test_seed_data() {
        let mut sheets = TestSheets::default();
        let values = sheets
            .get_values(TEST_SPREADSHEET_ID, TRANSACTIONS)
            .await
            .unwrap();
        assert_eq!(values.len(), 6);
        assert_eq!(values[0][0], "account");
        assert_eq!(values[4][2], "PG&E");
    }

    #[tokio::test]
    async fn test_write_values_grows_the_tab() {
        let mut sheets = TestSheets::default();
        let file = sheets.create_spreadsheet("New").await.unwrap();
        let range = CellRange::new("Sheet1", CellRef::new(1, 1), CellRef::new(1, 2));
        sheets
            .write_values(&file.id, &range, &[vec!["a".to_string(), "b".to_string()]])
            .await
            .unwrap();
        let values = sheets.get_values(&file.id, "Sheet1").await.unwrap();
        assert_eq!(
            values,
            vec![
                Vec::<String>::new(),
                vec![String::new(), "a".to_string(), "b".to_string()]
            ]
        );
    }

    #[tokio::test]
    async fn test_list_with_query_and_delete() {
        let mut sheets = TestSheets::default();
        sheets.create_spreadsheet("Trip").await.unwrap();
        let all = sheets.list_files(None).await.unwrap();
        assert_eq!(all.len(), 2);
        let budget = sheets
            .list_files(Some("name contains 'Budget'"))
            .await
            .unwrap();
        assert_eq!(budget.len(), 1);
        assert_eq!(budget[0].id, TEST_SPREADSHEET_ID);

        sheets.delete(TEST_SPREADSHEET_ID).await.unwrap();
        assert!(sheets.delete(TEST_SPREADSHEET_ID).await.is_err());
    }

    #[tokio::test]
    async fn test_add_sheet_twice() {
        let mut sheets = TestSheets::default();
        sheets.add_sheet(TEST_SPREADSHEET_ID, "Data").await.unwrap();
        assert!(sheets.add_sheet(TEST_SPREADSHEET_ID, "Data").await.is_err());
        let titles = sheets.sheet_titles(TEST_SPREADSHEET_ID).await.unwrap();
        assert_eq!(titles, vec![TRANSACTIONS, "Data"]);
    }
}
