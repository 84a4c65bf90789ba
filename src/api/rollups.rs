use crate::api::errors::ApiError;
use crate::api::state::AppState;
use crate::config::{SourceConfig, MAX_PERIODS};
use crate::rollup::breakdown::{breakdown, BreakdownRow};
use crate::rollup::bucket::BucketSeries;
use crate::rollup::calendar::{Granularity, PeriodKind, WeekStart};
use crate::rollup::rates::{ad_rates, RateSpec};
use crate::rollup::reconcile::{reconcile, Reconciliation};
use crate::rollup::summary::{summarize, Rollup};
use crate::rollup::yoy::{compare_recent, YoyComparison};
use crate::sheet::columns::SheetLayout;
use crate::sheet::extract::{extract_records, ParseReport};
use crate::sheet::RawRow;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

const MAX_BREAKDOWN_LIMIT: usize = 500;
const MAX_PREVIEW_ROWS: usize = 50_000;
/// Years accepted in request dates; the span sheet dates can take.
const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 9999;

/// Query parameters for `GET /api/rollups/{source}`.
#[derive(Debug, Deserialize)]
pub struct RollupParams {
    #[serde(default)]
    pub granularity: PeriodKind,
    pub periods: Option<usize>,
    /// Overrides the source's configured week start.
    pub week_starts_on: Option<WeekStart>,
    #[serde(default)]
    pub include_in_progress: bool,
    pub as_of: Option<String>,
}

/// Query parameters for `GET /api/rollups/{source}/yoy`.
#[derive(Debug, Deserialize)]
pub struct YoyParams {
    #[serde(default)]
    pub granularity: PeriodKind,
    pub periods: Option<usize>,
    pub as_of: Option<String>,
}

/// Query parameters for `GET /api/rollups/{source}/breakdown`.
#[derive(Debug, Deserialize)]
pub struct BreakdownParams {
    #[serde(default = "default_period")]
    pub period: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub as_of: Option<String>,
}

/// Query parameters for `GET /api/combined/weekly`.
#[derive(Debug, Deserialize)]
pub struct CombinedParams {
    pub weeks: Option<usize>,
    pub as_of: Option<String>,
}

/// Body of `POST /api/rollups/preview`: rows pasted straight from a sheet.
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub rows: Vec<Vec<serde_json::Value>>,
    pub layout: SheetLayout,
    #[serde(default)]
    pub granularity: PeriodKind,
    #[serde(default)]
    pub week_starts_on: WeekStart,
    pub periods: Option<usize>,
    pub rates: Option<Vec<RateSpec>>,
    #[serde(default)]
    pub include_in_progress: bool,
    pub as_of: Option<String>,
}

fn default_period() -> String {
    "30d".to_string()
}

fn default_sort_by() -> String {
    "clicks".to_string()
}

const fn default_limit() -> usize {
    10
}

#[derive(Debug, Serialize)]
struct RollupResponse<'a> {
    source: &'a str,
    #[serde(flatten)]
    rollup: Rollup,
    parse: ParseReport,
}

#[derive(Debug, Serialize)]
struct YoyResponse<'a> {
    source: &'a str,
    granularity: &'static str,
    as_of: NaiveDate,
    comparisons: Vec<YoyComparison>,
    parse: ParseReport,
}

#[derive(Debug, Serialize)]
struct BreakdownResponse<'a> {
    source: &'a str,
    key_column: Option<&'a str>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    sort_by: &'a str,
    rows: Vec<BreakdownRow>,
    parse: ParseReport,
}

#[derive(Debug, Serialize)]
struct CombinedResponse {
    #[serde(flatten)]
    reconciliation: Reconciliation,
    parse: BTreeMap<String, ParseReport>,
}

/// Resolve `as_of` (`YYYY-MM-DD`) or fall back to the current UTC date.
pub fn resolve_as_of(as_of: Option<&str>) -> Result<NaiveDate, ApiError> {
    as_of.map_or_else(
        || Ok(chrono::Utc::now().date_naive()),
        |value| parse_iso_date("as_of", value),
    )
}

fn parse_iso_date(field: &str, value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .filter(|date| (MIN_YEAR..=MAX_YEAR).contains(&date.year()))
        .ok_or_else(|| {
            ApiError::BadRequest(format!(
                "Invalid {field}: '{value}'. Expected YYYY-MM-DD between {MIN_YEAR} and {MAX_YEAR}."
            ))
        })
}

/// Validate a requested period count, defaulting to `default`.
pub fn validate_periods(requested: Option<usize>, default: usize) -> Result<usize, ApiError> {
    let periods = requested.unwrap_or(default);
    if (1..=MAX_PERIODS).contains(&periods) {
        Ok(periods)
    } else {
        Err(ApiError::BadRequest(format!(
            "periods must be between 1 and {MAX_PERIODS}, got {periods}"
        )))
    }
}

impl BreakdownParams {
    /// Inclusive date range: explicit dates, or the N whole days before `today`.
    pub fn date_range(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), ApiError> {
        if let (Some(start), Some(end)) = (&self.start_date, &self.end_date) {
            let start = parse_iso_date("start_date", start)?;
            let end = parse_iso_date("end_date", end)?;
            if start > end {
                return Err(ApiError::BadRequest(
                    "start_date must not be after end_date".to_string(),
                ));
            }
            return Ok((start, end));
        }

        let days = match self.period.as_str() {
            "7d" => 7,
            "30d" => 30,
            "90d" => 90,
            _ => {
                return Err(ApiError::BadRequest(format!(
                    "Invalid period: {}. Use '7d', '30d', '90d', or provide start_date and end_date.",
                    self.period
                )));
            }
        };
        today
            .checked_sub_days(Days::new(days))
            .zip(today.checked_sub_days(Days::new(1)))
            .ok_or_else(|| ApiError::BadRequest(format!("period {} is out of range", self.period)))
    }
}

fn json_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string(value)
        .map_err(|e| ApiError::Internal(format!("Failed to serialize response: {e}")))
}

fn join_error(e: &tokio::task::JoinError) -> ApiError {
    ApiError::Internal(format!("Rollup task panicked: {e}"))
}

/// Cell values as the sheet would export them. Numbers keep their JSON text,
/// booleans follow the spreadsheet's `TRUE`/`FALSE`.
fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(true) => "TRUE".to_string(),
        serde_json::Value::Bool(false) => "FALSE".to_string(),
        other => other.to_string(),
    }
}

/// GET /api/sources - Configured sources and their layouts.
pub async fn list_sources(State(state): State<Arc<AppState>>) -> Json<Vec<SourceConfig>> {
    Json(state.config.sources.clone())
}

/// GET /api/rollups/{source} - Last N complete weeks or months of one source.
pub async fn get_rollup(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<RollupParams>,
) -> Result<Response, ApiError> {
    let source = state.source(&name)?.clone();
    let today = resolve_as_of(params.as_of.as_deref())?;
    let periods = validate_periods(params.periods, state.config.default_periods)?;
    let granularity = Granularity::new(
        params.granularity,
        params.week_starts_on.unwrap_or(source.week_starts_on),
    );

    let cache_key = format!(
        "rollup:{}:{granularity:?}:{periods}:{}:{today}",
        source.name, params.include_in_progress
    );
    if let Some(cached) = state.cache.get(&cache_key) {
        return Ok(json_response(cached));
    }

    let state2 = Arc::clone(&state);
    let body = tokio::task::spawn_blocking(move || {
        let parsed = state2.load_source(&source)?;
        let series = BucketSeries::build(&parsed.records, granularity);
        let rollup = summarize(
            &series,
            today,
            periods,
            &source.rates,
            params.include_in_progress,
        );
        to_json(&RollupResponse {
            source: &source.name,
            rollup,
            parse: parsed.report,
        })
    })
    .await
    .map_err(|e| join_error(&e))??;

    state.cache.insert(cache_key, body.clone());
    Ok(json_response(body))
}

/// GET /api/rollups/{source}/yoy - Recent periods against the prior year.
pub async fn get_yoy(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<YoyParams>,
) -> Result<Response, ApiError> {
    let source = state.source(&name)?.clone();
    let today = resolve_as_of(params.as_of.as_deref())?;
    let periods = validate_periods(params.periods, state.config.default_periods)?;
    let granularity = Granularity::new(params.granularity, source.week_starts_on);

    let cache_key = format!("yoy:{}:{granularity:?}:{periods}:{today}", source.name);
    if let Some(cached) = state.cache.get(&cache_key) {
        return Ok(json_response(cached));
    }

    let state2 = Arc::clone(&state);
    let body = tokio::task::spawn_blocking(move || {
        let parsed = state2.load_source(&source)?;
        let series = BucketSeries::build(&parsed.records, granularity);
        to_json(&YoyResponse {
            source: &source.name,
            granularity: granularity.as_str(),
            as_of: today,
            comparisons: compare_recent(&series, today, periods),
            parse: parsed.report,
        })
    })
    .await
    .map_err(|e| join_error(&e))??;

    state.cache.insert(cache_key, body.clone());
    Ok(json_response(body))
}

/// GET /api/rollups/{source}/breakdown - Metrics per key column value.
pub async fn get_breakdown(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<BreakdownParams>,
) -> Result<Response, ApiError> {
    let source = state.source(&name)?.clone();
    let today = resolve_as_of(params.as_of.as_deref())?;
    let (start, end) = params.date_range(today)?;
    if !(1..=MAX_BREAKDOWN_LIMIT).contains(&params.limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {MAX_BREAKDOWN_LIMIT}"
        )));
    }
    if !source.layout.metrics.contains_key(&params.sort_by) {
        let known: Vec<&str> = source.layout.metrics.keys().map(String::as_str).collect();
        return Err(ApiError::BadRequest(format!(
            "Unknown sort_by metric '{}'. Use one of: {}",
            params.sort_by,
            known.join(", ")
        )));
    }

    let cache_key = format!(
        "breakdown:{}:{start}:{end}:{}:{}",
        source.name, params.sort_by, params.limit
    );
    if let Some(cached) = state.cache.get(&cache_key) {
        return Ok(json_response(cached));
    }

    let state2 = Arc::clone(&state);
    let body = tokio::task::spawn_blocking(move || {
        let parsed = state2.load_source(&source)?;
        let rows = breakdown(
            &parsed.records,
            start,
            end,
            &params.sort_by,
            params.limit,
            &source.rates,
        );
        to_json(&BreakdownResponse {
            source: &source.name,
            key_column: source.layout.key_column.as_deref(),
            start_date: start,
            end_date: end,
            sort_by: &params.sort_by,
            rows,
            parse: parsed.report,
        })
    })
    .await
    .map_err(|e| join_error(&e))??;

    state.cache.insert(cache_key, body.clone());
    Ok(json_response(body))
}

/// GET /api/combined/weekly - Weeks complete and present in every combined source.
///
/// Sources are read concurrently; any failed read fails the whole response.
pub async fn get_combined_weekly(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CombinedParams>,
) -> Result<Response, ApiError> {
    let combined = state.config.combined.clone();
    let today = resolve_as_of(params.as_of.as_deref())?;
    let weeks = validate_periods(params.weeks, combined.weeks)?;
    let granularity = Granularity::Week(combined.week_starts_on);

    let cache_key = format!("combined:{granularity:?}:{weeks}:{today}");
    if let Some(cached) = state.cache.get(&cache_key) {
        return Ok(json_response(cached));
    }

    let mut sources = Vec::with_capacity(combined.sources.len());
    for name in &combined.sources {
        let source = state.config.source(name).cloned().ok_or_else(|| {
            ApiError::Internal(format!("Combined view names unconfigured source '{name}'"))
        })?;
        sources.push(source);
    }

    let handles: Vec<_> = sources
        .into_iter()
        .map(|source| {
            let state2 = Arc::clone(&state);
            tokio::task::spawn_blocking(move || {
                let parsed = state2.load_source(&source)?;
                let series = BucketSeries::build(&parsed.records, granularity);
                Ok::<_, ApiError>((source.name, series, parsed.report))
            })
        })
        .collect();

    let mut series = Vec::with_capacity(handles.len());
    let mut reports = BTreeMap::new();
    for handle in handles {
        let (name, source_series, report) = handle.await.map_err(|e| join_error(&e))??;
        reports.insert(name.clone(), report);
        series.push((name, source_series));
    }

    let reconciliation = reconcile(&series, today, weeks, &combined.rates);
    tracing::debug!(
        status = ?reconciliation.status,
        weeks = reconciliation.weeks.len(),
        "Combined weekly view reconciled"
    );
    let body = to_json(&CombinedResponse {
        reconciliation,
        parse: reports,
    })?;

    state.cache.insert(cache_key, body.clone());
    Ok(json_response(body))
}

/// POST /api/rollups/preview - Roll up rows supplied in the request body.
pub async fn preview_rollup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PreviewRequest>,
) -> Result<Response, ApiError> {
    if request.rows.len() > MAX_PREVIEW_ROWS {
        return Err(ApiError::BadRequest(format!(
            "At most {MAX_PREVIEW_ROWS} rows may be previewed"
        )));
    }
    let today = resolve_as_of(request.as_of.as_deref())?;
    let periods = validate_periods(request.periods, state.config.default_periods)?;
    let granularity = Granularity::new(request.granularity, request.week_starts_on);

    let body = tokio::task::spawn_blocking(move || {
        let rows: Vec<RawRow> = request
            .rows
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect();
        let parsed = extract_records(&rows, &request.layout)?;
        let rates = request.rates.unwrap_or_else(ad_rates);
        let series = BucketSeries::build(&parsed.records, granularity);
        let rollup = summarize(
            &series,
            today,
            periods,
            &rates,
            request.include_in_progress,
        );
        to_json(&RollupResponse {
            source: "preview",
            rollup,
            parse: parsed.report,
        })
    })
    .await
    .map_err(|e| join_error(&e))??;

    Ok(json_response(body))
}
