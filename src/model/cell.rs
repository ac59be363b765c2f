//! A1 notation helpers for addressing spreadsheet cells, e.g. `B7` or `'My Sheet'!A1:D20`.

use anyhow::{bail, Context};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Converts a zero-based column index into its letters: `0 -> A`, `25 -> Z`, `26 -> AA`.
pub fn column_name(col: usize) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// The inverse of `column_name`. Letters are case-insensitive.
pub fn column_index(letters: &str) -> anyhow::Result<usize> {
    if letters.is_empty() {
        bail!("A column name cannot be empty");
    }
    let mut n: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            bail!("Invalid character '{c}' in column name '{letters}'");
        }
        let v = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        n = n
            .checked_mul(26)
            .and_then(|n| n.checked_add(v))
            .with_context(|| format!("Column name '{letters}' is too large"))?;
    }
    Ok(n - 1)
}

/// A single cell using zero-based indices. It displays in A1 notation, so `CellRef::new(0, 1)` is
/// `B1`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_name(self.col), self.row + 1)
    }
}

impl FromStr for CellRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .with_context(|| format!("Cell reference '{s}' has no row number"))?;
        let (letters, digits) = s.split_at(split);
        let col = column_index(letters)?;
        let row = digits
            .parse::<usize>()
            .map_err(|e| anyhow::anyhow!("Invalid row number in '{s}': {e}"))?;
        if row == 0 {
            bail!("Row numbers start at 1, got '{s}'");
        }
        Ok(CellRef::new(row - 1, col))
    }
}

impl Serialize for CellRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CellRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        CellRef::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A rectangular range on a named sheet, e.g. `Transactions!A1:E40`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct CellRange {
    pub sheet: String,
    pub start: CellRef,
    pub end: CellRef,
}

impl CellRange {
    pub fn new(sheet: impl Into<String>, start: CellRef, end: CellRef) -> Self {
        Self {
            sheet: sheet.into(),
            start,
            end,
        }
    }

    /// The range that a block of `rows` x `cols` values occupies when written at `A1`. An empty
    /// block still addresses the single cell `A1`.
    pub fn for_values(sheet: impl Into<String>, rows: usize, cols: usize) -> Self {
        Self::new(
            sheet,
            CellRef::new(0, 0),
            CellRef::new(rows.saturating_sub(1), cols.saturating_sub(1)),
        )
    }

    /// Like `for_values` but sized from the data itself, using the widest row.
    pub fn for_data<S: AsRef<str>>(sheet: impl Into<String>, data: &[Vec<S>]) -> Self {
        let cols = data.iter().map(Vec::len).max().unwrap_or(0);
        Self::for_values(sheet, data.len(), cols)
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}:{}", quote_sheet_name(&self.sheet), self.start, self.end)
    }
}

impl FromStr for CellRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bang = s
            .rfind('!')
            .with_context(|| format!("Range '{s}' is missing the sheet name"))?;
        let (sheet, cells) = (&s[..bang], &s[bang + 1..]);
        let sheet = unquote_sheet_name(sheet)?;
        let (start, end) = match cells.split_once(':') {
            Some((a, b)) => (a.parse()?, b.parse()?),
            None => {
                let c: CellRef = cells.parse()?;
                (c, c)
            }
        };
        Ok(CellRange::new(sheet, start, end))
    }
}

/// Sheet names that are not plain alphanumerics need single quotes in A1 notation, and any single
/// quote inside the name is doubled.
pub fn quote_sheet_name(name: &str) -> String {
    let plain = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

fn unquote_sheet_name(s: &str) -> anyhow::Result<String> {
    match s.strip_prefix('\'') {
        None => Ok(s.to_string()),
        Some(rest) => {
            let inner = rest
                .strip_suffix('\'')
                .with_context(|| format!("Unterminated quote in sheet name {s}"))?;
            Ok(inner.replace("''", "'"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_name() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_name(702), "AAA");
    }

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A").unwrap(), 0);
        assert_eq!(column_index("z").unwrap(), 25);
        assert_eq!(column_index("AA").unwrap(), 26);
        assert_eq!(column_index("ZZ").unwrap(), 701);
        assert!(column_index("").is_err());
        assert!(column_index("A1").is_err());
    }

    #[test]
    fn test_cell_ref() {
        assert_eq!(CellRef::new(0, 1).to_string(), "B1");
        assert_eq!(CellRef::new(41, 26).to_string(), "AA42");
        assert_eq!("AA42".parse::<CellRef>().unwrap(), CellRef::new(41, 26));
        assert!("A0".parse::<CellRef>().is_err());
        assert!("12".parse::<CellRef>().is_err());
        assert!("B".parse::<CellRef>().is_err());
    }

    #[test]
    fn test_cell_ref_serde() {
        let json = serde_json::to_string(&CellRef::new(2, 3)).unwrap();
        assert_eq!(json, r#""D3""#);
        let cell: CellRef = serde_json::from_str(&json).unwrap();
        assert_eq!(cell, CellRef::new(2, 3));
    }

    #[test]
    fn test_range_for_values() {
        let range = CellRange::for_values("Transactions", 40, 5);
        assert_eq!(range.to_string(), "Transactions!A1:E40");
        let range = CellRange::for_values("Sheet1", 0, 0);
        assert_eq!(range.to_string(), "Sheet1!A1:A1");
    }

    #[test]
    fn test_range_for_data_uses_widest_row() {
        let data = vec![vec!["a", "b"], vec!["c", "d", "e"]];
        assert_eq!(CellRange::for_data("S", &data).to_string(), "S!A1:C2");
    }

    #[test]
    fn test_quoted_sheet_names() {
        assert_eq!(quote_sheet_name("My Sheet"), "'My Sheet'");
        assert_eq!(quote_sheet_name("Bob's"), "'Bob''s'");
        assert_eq!(quote_sheet_name("2024"), "'2024'");
        assert_eq!(quote_sheet_name("Sheet1"), "Sheet1");

        let range = CellRange::for_values("Bob's Sheet", 2, 2);
        assert_eq!(range.to_string(), "'Bob''s Sheet'!A1:B2");
        let parsed: CellRange = range.to_string().parse().unwrap();
        assert_eq!(parsed, range);
    }

    #[test]
    fn test_range_parse_single_cell() {
        let r: CellRange = "Data!C3".parse().unwrap();
        assert_eq!(r.start, CellRef::new(2, 2));
        assert_eq!(r.end, CellRef::new(2, 2));
        assert!("A1:B2".parse::<CellRange>().is_err());
    }
}
