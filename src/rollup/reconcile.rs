use crate::rollup::bucket::{Bucket, BucketSeries};
use crate::rollup::rates::{derive_rates, RateSpec};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// A period present and complete in every reconciled source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledWeek {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub label: String,
    pub relative_label: String,
    pub per_source: BTreeMap<String, Bucket>,
    /// Metric-wise sum across sources.
    pub totals: BTreeMap<String, f64>,
    /// Rates derived from `totals`.
    pub rates: BTreeMap<String, f64>,
}

/// Why a reconciliation produced the periods it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JoinStatus {
    /// At least one period is shared by every source.
    Joined,
    /// These sources produced no buckets at all, so nothing can be joined.
    EmptySources { sources: Vec<String> },
    /// Every source has data but no complete period is common to all yet.
    NoOverlap,
}

/// Output of [`reconcile`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    #[serde(flatten)]
    pub status: JoinStatus,
    pub as_of: NaiveDate,
    /// Newest first.
    pub weeks: Vec<ReconciledWeek>,
}

/// AND-join independently bucketed sources.
///
/// Only period starts present in every source and complete as of `today`
/// survive; the newest `limit` are returned. All series are expected to
/// share one granularity; the first source's granularity is used for labels.
pub fn reconcile(
    sources: &[(String, BucketSeries)],
    today: NaiveDate,
    limit: usize,
    rates: &[RateSpec],
) -> Reconciliation {
    let empty: Vec<String> = sources
        .iter()
        .filter(|(_, series)| series.is_empty())
        .map(|(name, _)| name.clone())
        .collect();
    if !empty.is_empty() {
        tracing::warn!(sources = ?empty, "Reconciliation skipped: sources returned no data");
        return Reconciliation {
            status: JoinStatus::EmptySources { sources: empty },
            as_of: today,
            weeks: Vec::new(),
        };
    }

    let Some((_, first)) = sources.first() else {
        return Reconciliation {
            status: JoinStatus::NoOverlap,
            as_of: today,
            weeks: Vec::new(),
        };
    };
    let granularity = first.granularity();

    let weeks: Vec<ReconciledWeek> = first
        .complete_desc(today)
        .filter_map(|bucket| {
            let per_source = sources
                .iter()
                .map(|(name, series)| Some((name.clone(), series.get(bucket.start)?.clone())))
                .collect::<Option<BTreeMap<_, _>>>()?;

            let mut totals: BTreeMap<String, f64> = BTreeMap::new();
            for source_bucket in per_source.values() {
                for (metric, value) in &source_bucket.metrics {
                    *totals.entry(metric.clone()).or_insert(0.0) += value;
                }
            }

            Some(ReconciledWeek {
                start: bucket.start,
                end: bucket.end,
                label: granularity.label(bucket.start),
                relative_label: granularity.relative_label(bucket.start, today),
                rates: derive_rates(&totals, rates),
                per_source,
                totals,
            })
        })
        .take(limit)
        .collect();

    let status = if weeks.is_empty() {
        JoinStatus::NoOverlap
    } else {
        JoinStatus::Joined
    };

    Reconciliation {
        status,
        as_of: today,
        weeks,
    }
}
