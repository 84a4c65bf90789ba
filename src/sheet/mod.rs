//! Spreadsheet input: reading ranges, resolving columns by header, and
//! turning loosely formatted rows into typed metric records.

pub mod columns;
pub mod extract;
pub mod parse;
pub mod source;

/// One spreadsheet row as returned by a "read range" call.
pub type RawRow = Vec<String>;

/// Errors raised while reading or interpreting a sheet range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetError {
    /// The range has no data rows (fewer than two rows including the header).
    NoData,
    /// An expected header is absent from the header row.
    MissingColumn(String),
    /// The range name is not a safe identifier.
    InvalidRange(String),
    /// The range does not exist in the backing store.
    RangeNotFound(String),
    /// The backing store failed while reading the range.
    Read(String),
}

impl std::fmt::Display for SheetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoData => write!(f, "No data found"),
            Self::MissingColumn(header) => write!(f, "Expected column '{header}' not found"),
            Self::InvalidRange(range) => write!(f, "Invalid range name: '{range}'"),
            Self::RangeNotFound(range) => write!(f, "Range '{range}' not found"),
            Self::Read(msg) => write!(f, "Failed to read range: {msg}"),
        }
    }
}

impl std::error::Error for SheetError {}
