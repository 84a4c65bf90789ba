use crate::rollup::bucket::{Bucket, BucketSeries};
use crate::rollup::calendar::Granularity;
use crate::rollup::rates::{derive_rates, RateSpec};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// A bucket rendered for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub key: String,
    pub label: String,
    pub relative_label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub complete: bool,
    pub records: usize,
    pub metrics: BTreeMap<String, f64>,
    pub rates: BTreeMap<String, f64>,
}

impl PeriodSummary {
    pub fn from_bucket(
        bucket: &Bucket,
        granularity: Granularity,
        today: NaiveDate,
        rates: &[RateSpec],
    ) -> Self {
        Self {
            key: granularity.key(bucket.start),
            label: granularity.label(bucket.start),
            relative_label: granularity.relative_label(bucket.start, today),
            start: bucket.start,
            end: bucket.end,
            complete: granularity.is_complete(bucket.start, today),
            records: bucket.records,
            metrics: bucket.metrics.clone(),
            rates: derive_rates(&bucket.metrics, rates),
        }
    }
}

/// The last N complete periods of one source, plus the open period if asked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rollup {
    pub granularity: &'static str,
    pub as_of: NaiveDate,
    /// Complete periods, newest first.
    pub periods: Vec<PeriodSummary>,
    /// The period containing `as_of`; its totals are partial.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_progress: Option<PeriodSummary>,
}

pub fn summarize(
    series: &BucketSeries,
    today: NaiveDate,
    periods: usize,
    rates: &[RateSpec],
    include_in_progress: bool,
) -> Rollup {
    let granularity = series.granularity();
    let render = |bucket: &Bucket| PeriodSummary::from_bucket(bucket, granularity, today, rates);

    Rollup {
        granularity: granularity.as_str(),
        as_of: today,
        periods: series
            .last_complete(today, periods)
            .into_iter()
            .map(render)
            .collect(),
        in_progress: if include_in_progress {
            series.in_progress(today).map(render)
        } else {
            None
        },
    }
}
