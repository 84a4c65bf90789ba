use crate::api::cache::ResponseCache;
use crate::api::errors::ApiError;
use crate::config::{Config, SourceConfig};
use crate::sheet::extract::{extract_records, ParseReport, ParsedSheet};
use crate::sheet::source::SheetSource;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub sheets: Arc<dyn SheetSource>,
    pub cache: ResponseCache,
    pub requests_total: AtomicU64,
    pub rows_parsed_total: AtomicU64,
    pub rows_skipped_total: AtomicU64,
}

impl AppState {
    pub fn new(config: Config, sheets: Arc<dyn SheetSource>) -> Self {
        let cache = ResponseCache::new(config.cache_ttl_secs);
        Self {
            config,
            sheets,
            cache,
            requests_total: AtomicU64::new(0),
            rows_parsed_total: AtomicU64::new(0),
            rows_skipped_total: AtomicU64::new(0),
        }
    }

    /// Look up a configured source or fail with 404.
    pub fn source(&self, name: &str) -> Result<&SourceConfig, ApiError> {
        self.config
            .source(name)
            .ok_or_else(|| ApiError::NotFound(format!("Unknown source: {name}")))
    }

    /// Read and extract one source's range. Blocking.
    pub fn load_source(&self, source: &SourceConfig) -> Result<ParsedSheet, ApiError> {
        let rows = self.sheets.read_range(&source.range)?;
        let parsed = extract_records(&rows, &source.layout)?;
        self.record_report(&parsed.report);
        tracing::debug!(
            source = %source.name,
            rows_parsed = parsed.report.rows_parsed,
            rows_skipped = parsed.report.rows_skipped,
            "Loaded source"
        );
        Ok(parsed)
    }

    pub fn record_report(&self, report: &ParseReport) {
        self.rows_parsed_total
            .fetch_add(report.rows_parsed as u64, Ordering::Relaxed);
        self.rows_skipped_total
            .fetch_add(report.rows_skipped as u64, Ordering::Relaxed);
    }
}
