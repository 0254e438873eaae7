pub mod spreadsheet;

pub use spreadsheet::{read_rows, RawRow, SpreadsheetError};
