use crate::sheet::columns::{ColumnMap, SheetLayout};
use crate::sheet::parse::{try_parse_date, try_parse_number, CellError};
use crate::sheet::{RawRow, SheetError};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// One parsed sheet row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub date: NaiveDate,
    /// Value of the layout's key column, or empty when it has none.
    pub source_key: String,
    pub metrics: BTreeMap<String, f64>,
}

/// Why a row did not become a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    MissingDate,
    InvalidDate { value: String },
    Duplicate,
}

/// Result of interpreting a single data row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Parsed {
        record: MetricRecord,
        /// Non-empty metric cells that could not be parsed and were read as 0.
        coerced_cells: usize,
    },
    Skipped(SkipReason),
}

/// Per-fetch accounting of what the parser kept and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseReport {
    pub rows_read: usize,
    pub rows_parsed: usize,
    pub rows_skipped: usize,
    pub missing_date: usize,
    pub invalid_date: usize,
    pub duplicates: usize,
    pub coerced_cells: usize,
}

impl ParseReport {
    fn record_skip(&mut self, reason: &SkipReason) {
        self.rows_skipped += 1;
        match reason {
            SkipReason::MissingDate => self.missing_date += 1,
            SkipReason::InvalidDate { .. } => self.invalid_date += 1,
            SkipReason::Duplicate => self.duplicates += 1,
        }
    }
}

/// Records extracted from a range together with the parse report.
#[derive(Debug, Clone, Default)]
pub struct ParsedSheet {
    pub records: Vec<MetricRecord>,
    pub report: ParseReport,
}

/// Interpret one data row against resolved columns.
pub fn parse_row(row: &[String], columns: &ColumnMap) -> RowOutcome {
    let date_cell = row.get(columns.date).map_or("", String::as_str);
    let date = match try_parse_date(date_cell) {
        Ok(date) => date,
        Err(CellError::Empty) => return RowOutcome::Skipped(SkipReason::MissingDate),
        Err(CellError::Invalid(value)) => {
            return RowOutcome::Skipped(SkipReason::InvalidDate { value })
        }
    };

    let source_key = columns
        .key
        .and_then(|idx| row.get(idx))
        .map(|cell| cell.trim().to_string())
        .unwrap_or_default();

    let mut coerced_cells = 0;
    let mut metrics = BTreeMap::new();
    for (name, idx) in &columns.metrics {
        let cell = row.get(*idx).map_or("", String::as_str);
        let value = match try_parse_number(cell) {
            Ok(value) => value,
            Err(CellError::Empty) => 0.0,
            Err(CellError::Invalid(_)) => {
                coerced_cells += 1;
                0.0
            }
        };
        metrics.insert(name.clone(), value);
    }

    RowOutcome::Parsed {
        record: MetricRecord {
            date,
            source_key,
            metrics,
        },
        coerced_cells,
    }
}

/// Convert a fetched range (header row first) into metric records.
///
/// Malformed rows are skipped and counted; only a missing header or an
/// empty range is an error.
pub fn extract_records(rows: &[RawRow], layout: &SheetLayout) -> Result<ParsedSheet, SheetError> {
    if rows.len() < 2 {
        return Err(SheetError::NoData);
    }
    let columns = ColumnMap::resolve(&rows[0], layout)?;

    let mut parsed = ParsedSheet::default();
    let mut seen: HashSet<(NaiveDate, String)> = HashSet::new();

    for row in &rows[1..] {
        parsed.report.rows_read += 1;
        match parse_row(row, &columns) {
            RowOutcome::Parsed {
                record,
                coerced_cells,
            } => {
                if layout.dedupe && !seen.insert((record.date, record.source_key.clone())) {
                    parsed.report.record_skip(&SkipReason::Duplicate);
                    continue;
                }
                parsed.report.rows_parsed += 1;
                parsed.report.coerced_cells += coerced_cells;
                parsed.records.push(record);
            }
            RowOutcome::Skipped(reason) => parsed.report.record_skip(&reason),
        }
    }

    if parsed.report.rows_skipped > 0 || parsed.report.coerced_cells > 0 {
        tracing::warn!(
            rows_read = parsed.report.rows_read,
            rows_skipped = parsed.report.rows_skipped,
            missing_date = parsed.report.missing_date,
            invalid_date = parsed.report.invalid_date,
            duplicates = parsed.report.duplicates,
            coerced_cells = parsed.report.coerced_cells,
            "Sheet rows dropped or coerced during parsing"
        );
    }

    Ok(parsed)
}
