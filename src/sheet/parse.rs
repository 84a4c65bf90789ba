use chrono::{Days, NaiveDate};

/// Largest serial number a spreadsheet can represent (9999-12-31).
const MAX_SERIAL: f64 = 2_958_465.0;

/// Why a single cell could not be turned into a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellError {
    Empty,
    Invalid(String),
}

impl std::fmt::Display for CellError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty cell"),
            Self::Invalid(raw) => write!(f, "unparseable cell: {raw:?}"),
        }
    }
}

impl std::error::Error for CellError {}

/// Parse a currency/percent/thousands-formatted numeric cell.
///
/// `$`, `,` and `%` are stripped before parsing, so `"$1,234.50"` is `1234.5`
/// and `"12.3%"` is `12.3` (the percent sign is not divided out).
/// Non-finite results (`"NaN"`, `"inf"`) are rejected.
pub fn try_parse_number(cell: &str) -> Result<f64, CellError> {
    let cleaned: String = cell
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '%'))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(CellError::Empty);
    }
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(CellError::Invalid(cell.to_string())),
    }
}

/// Coercing variant of [`try_parse_number`]: anything unparseable is `0.0`.
pub fn parse_number(cell: &str) -> f64 {
    try_parse_number(cell).unwrap_or(0.0)
}

/// Resolve a date cell written as `M/D/YYYY`, `YYYY-MM-DD`, or a spreadsheet
/// serial day number (days since 1899-12-30).
pub fn try_parse_date(cell: &str) -> Result<NaiveDate, CellError> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Err(CellError::Empty);
    }

    let parsed = if cell.contains('/') {
        parse_us_date(cell)
    } else if cell.contains('-') {
        parse_iso_date(cell)
    } else {
        parse_serial_date(cell)
    };

    parsed.ok_or_else(|| CellError::Invalid(cell.to_string()))
}

/// Coercing variant of [`try_parse_date`].
pub fn parse_date(cell: &str) -> Option<NaiveDate> {
    try_parse_date(cell).ok()
}

fn parse_us_date(cell: &str) -> Option<NaiveDate> {
    let mut parts = cell.split('/');
    let (month, day, year) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    ymd(year, month, day)
}

fn parse_iso_date(cell: &str) -> Option<NaiveDate> {
    // Drop a trailing time component ("2026-02-02T00:00:00", "2026-02-02 09:15").
    let date_part = cell.split(['T', ' ']).next()?;
    let mut parts = date_part.split('-');
    let (year, month, day) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    ymd(year, month, day)
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let (year, month, day) = (year.trim(), month.trim(), day.trim());
    // Two-digit years are ambiguous; refuse them rather than guess a century.
    if year.len() != 4 || month.is_empty() || month.len() > 2 || day.is_empty() || day.len() > 2 {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn parse_serial_date(cell: &str) -> Option<NaiveDate> {
    let serial: f64 = cell.parse().ok()?;
    if !serial.is_finite() || serial < 1.0 || serial > MAX_SERIAL {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    // The fractional part is the time of day.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let days = serial.trunc() as u64;
    epoch.checked_add_days(Days::new(days))
}
