//! Types that represent the core data model, such as `Person`, the ledger `Transaction` and the
//! spreadsheet cell addresses.
mod cell;
mod interval;
pub mod ledger;
mod person;

pub use cell::{column_index, column_name, quote_sheet_name, CellRange, CellRef};
pub use interval::{Interval, DEFAULT_DAYS};
pub use person::{AccountView, LinkedAccount, Person, PersonView, Profile};
