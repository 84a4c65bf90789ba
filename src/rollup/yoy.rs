use crate::rollup::bucket::BucketSeries;
use crate::rollup::rates::safe_ratio;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// One metric compared against the same period a year earlier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricDelta {
    pub current: f64,
    pub prior: f64,
    pub delta: f64,
    /// `delta / prior * 100`, or 0 when the prior value is not positive.
    pub delta_pct: f64,
}

impl MetricDelta {
    pub fn new(current: f64, prior: f64) -> Self {
        let delta = current - prior;
        let delta_pct = if prior > 0.0 {
            safe_ratio(delta, prior) * 100.0
        } else {
            0.0
        };
        Self {
            current,
            prior,
            delta,
            delta_pct,
        }
    }
}

/// A period next to its prior-year counterpart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YoyComparison {
    pub start: NaiveDate,
    pub label: String,
    pub prior_start: NaiveDate,
    pub prior_label: String,
    /// Whether the series had a bucket for the prior period.
    pub prior_found: bool,
    pub metrics: BTreeMap<String, MetricDelta>,
}

/// Compare the bucket starting at `start` with the same period a year earlier.
///
/// Returns `None` when `start` has no bucket. A missing prior bucket reads as
/// all zeros with `prior_found = false`.
pub fn compare_period(series: &BucketSeries, start: NaiveDate) -> Option<YoyComparison> {
    let granularity = series.granularity();
    let current = series.get(start)?;
    let prior_start = granularity.prior_year(start);
    let prior = series.get(prior_start);

    let mut names: Vec<&String> = current.metrics.keys().collect();
    if let Some(prior) = prior {
        names.extend(prior.metrics.keys());
    }
    names.sort();
    names.dedup();

    let metrics = names
        .into_iter()
        .map(|name| {
            let prior_value = prior.map_or(0.0, |b| b.metric(name));
            (name.clone(), MetricDelta::new(current.metric(name), prior_value))
        })
        .collect();

    Some(YoyComparison {
        start,
        label: granularity.label(start),
        prior_start,
        prior_label: granularity.label(prior_start),
        prior_found: prior.is_some(),
        metrics,
    })
}

/// Year-over-year comparisons for the last `n` complete periods, newest first.
pub fn compare_recent(series: &BucketSeries, today: NaiveDate, n: usize) -> Vec<YoyComparison> {
    series
        .last_complete(today, n)
        .into_iter()
        .filter_map(|bucket| compare_period(series, bucket.start))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rollup::calendar::{Granularity, WeekStart};
    use crate::sheet::extract::MetricRecord;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(date: NaiveDate, clicks: f64) -> MetricRecord {
        MetricRecord {
            date,
            source_key: String::new(),
            metrics: BTreeMap::from([("clicks".to_string(), clicks)]),
        }
    }

    #[test]
    fn test_weekly_yoy() {
        let records = vec![
            record(date(2026, 2, 3), 80.0),
            record(date(2027, 2, 2), 120.0),
        ];
        let series = BucketSeries::build(&records, Granularity::Week(WeekStart::Monday));
        let cmp = compare_period(&series, date(2027, 2, 1)).unwrap();

        assert_eq!(cmp.prior_start, date(2026, 2, 2));
        assert!(cmp.prior_found);
        let clicks = cmp.metrics["clicks"];
        assert!((clicks.delta - 40.0).abs() < f64::EPSILON);
        assert!((clicks.delta_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_prior_reads_zero() {
        let series = BucketSeries::build(
            &[record(date(2027, 2, 2), 120.0)],
            Granularity::Week(WeekStart::Monday),
        );
        let cmp = compare_period(&series, date(2027, 2, 1)).unwrap();
        assert!(!cmp.prior_found);
        let clicks = cmp.metrics["clicks"];
        assert!((clicks.delta - 120.0).abs() < f64::EPSILON);
        assert!(clicks.delta_pct.abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_current_is_none() {
        let series = BucketSeries::new(Granularity::Week(WeekStart::Monday));
        assert!(compare_period(&series, date(2027, 2, 1)).is_none());
    }

    #[test]
    fn test_monthly_yoy_and_recent() {
        let records = vec![
            record(date(2025, 1, 10), 50.0),
            record(date(2025, 2, 10), 0.0),
            record(date(2026, 1, 10), 25.0),
            record(date(2026, 2, 10), 10.0),
        ];
        let series = BucketSeries::build(&records, Granularity::Month);
        let recent = compare_recent(&series, date(2026, 3, 5), 2);
        assert_eq!(recent.len(), 2);

        assert_eq!(recent[0].start, date(2026, 2, 1));
        assert_eq!(recent[0].prior_start, date(2025, 2, 1));
        // Prior of zero: no percentage.
        assert!(recent[0].metrics["clicks"].delta_pct.abs() < f64::EPSILON);

        assert_eq!(recent[1].prior_label, "Jan 2025");
        assert!((recent[1].metrics["clicks"].delta_pct + 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_metric_delta_negative_prior() {
        let delta = MetricDelta::new(5.0, -5.0);
        assert!((delta.delta - 10.0).abs() < f64::EPSILON);
        assert!(delta.delta_pct.abs() < f64::EPSILON);
    }
}
