use crate::sheet::{RawRow, SheetError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A backing store that can return the rows of a named range.
pub trait SheetSource: Send + Sync {
    /// Read every row of `range`, header row first.
    fn read_range(&self, range: &str) -> Result<Vec<RawRow>, SheetError>;
}

/// Validate that a range name is safe to use as a file stem or cache key.
///
/// - Must be non-empty and at most 128 bytes.
/// - Must contain only alphanumeric ASCII characters, `-` or `_`.
pub fn validate_range_name(range: &str) -> Result<(), SheetError> {
    let valid = !range.is_empty()
        && range.len() <= 128
        && range
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(SheetError::InvalidRange(range.to_string()))
    }
}

/// Ranges exported as headerless CSV files: `<dir>/<range>.csv`.
pub struct CsvDirectory {
    dir: PathBuf,
}

impl CsvDirectory {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn path_for(&self, range: &str) -> Result<PathBuf, SheetError> {
        validate_range_name(range)?;
        Ok(self.dir.join(format!("{range}.csv")))
    }
}

impl SheetSource for CsvDirectory {
    fn read_range(&self, range: &str) -> Result<Vec<RawRow>, SheetError> {
        let path = self.path_for(range)?;
        if !path.is_file() {
            return Err(SheetError::RangeNotFound(range.to_string()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)
            .map_err(|e| SheetError::Read(format!("{}: {e}", path.display())))?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| SheetError::Read(format!("{}: {e}", path.display())))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        tracing::debug!(range, rows = rows.len(), "Read sheet range from CSV");
        Ok(rows)
    }
}

/// In-memory ranges, shared between threads.
#[derive(Default)]
pub struct MemorySheets {
    ranges: RwLock<HashMap<String, Vec<RawRow>>>,
}

impl MemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the rows of a range.
    pub fn insert(&self, range: &str, rows: Vec<RawRow>) {
        self.ranges.write().insert(range.to_string(), rows);
    }
}

impl SheetSource for MemorySheets {
    fn read_range(&self, range: &str) -> Result<Vec<RawRow>, SheetError> {
        validate_range_name(range)?;
        self.ranges
            .read()
            .get(range)
            .cloned()
            .ok_or_else(|| SheetError::RangeNotFound(range.to_string()))
    }
}
