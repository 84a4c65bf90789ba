use crate::sheet::SheetError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a source's fields live in its sheet, by header text.
///
/// Headers are matched case-insensitively after trimming, so a sheet whose
/// columns are reordered keeps working and a renamed column fails loudly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLayout {
    /// Header of the date column.
    pub date_column: String,
    /// Optional header of a dimension column (campaign, landing page, query).
    #[serde(default)]
    pub key_column: Option<String>,
    /// Metric name → header text.
    pub metrics: BTreeMap<String, String>,
    /// Skip rows repeating an earlier (date, key) pair.
    #[serde(default)]
    pub dedupe: bool,
}

/// Column indices for one fetched range, resolved from its header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub date: usize,
    pub key: Option<usize>,
    pub metrics: Vec<(String, usize)>,
}

impl ColumnMap {
    /// Resolve every column named by `layout` against `header`.
    ///
    /// Fails on the first header that cannot be found.
    pub fn resolve(header: &[String], layout: &SheetLayout) -> Result<Self, SheetError> {
        let date = find_column(header, &layout.date_column)?;
        let key = layout
            .key_column
            .as_deref()
            .map(|name| find_column(header, name))
            .transpose()?;
        let metrics = layout
            .metrics
            .iter()
            .map(|(metric, name)| Ok((metric.clone(), find_column(header, name)?)))
            .collect::<Result<Vec<_>, SheetError>>()?;

        Ok(Self { date, key, metrics })
    }
}

fn find_column(header: &[String], name: &str) -> Result<usize, SheetError> {
    let wanted = name.trim();
    header
        .iter()
        .position(|cell| cell.trim().eq_ignore_ascii_case(wanted))
        .ok_or_else(|| SheetError::MissingColumn(wanted.to_string()))
}
