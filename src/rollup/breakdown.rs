use crate::rollup::rates::{derive_rates, RateSpec};
use crate::sheet::extract::MetricRecord;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Label used for records whose key cell was empty.
pub const UNSET_KEY: &str = "(not set)";

/// A breakdown row: key value + accumulated metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow {
    pub key: String,
    pub records: usize,
    pub metrics: BTreeMap<String, f64>,
    pub rates: BTreeMap<String, f64>,
}

/// Sum metrics per source key over `start..=end`, largest `sort_by` first.
pub fn breakdown(
    records: &[MetricRecord],
    start: NaiveDate,
    end: NaiveDate,
    sort_by: &str,
    limit: usize,
    rates: &[RateSpec],
) -> Vec<BreakdownRow> {
    let mut groups: BTreeMap<&str, (usize, BTreeMap<String, f64>)> = BTreeMap::new();
    for record in records.iter().filter(|r| r.date >= start && r.date <= end) {
        let key = if record.source_key.is_empty() {
            UNSET_KEY
        } else {
            record.source_key.as_str()
        };
        let (count, metrics) = groups.entry(key).or_default();
        *count += 1;
        for (name, value) in &record.metrics {
            *metrics.entry(name.clone()).or_insert(0.0) += value;
        }
    }

    let mut rows: Vec<BreakdownRow> = groups
        .into_iter()
        .map(|(key, (records, metrics))| BreakdownRow {
            key: key.to_string(),
            records,
            rates: derive_rates(&metrics, rates),
            metrics,
        })
        .collect();

    let sort_value = |row: &BreakdownRow| row.metrics.get(sort_by).copied().unwrap_or(0.0);
    rows.sort_by(|a, b| {
        sort_value(b)
            .total_cmp(&sort_value(a))
            .then_with(|| a.key.cmp(&b.key))
    });
    rows.truncate(limit);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rollup::rates::ad_rates;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(date: NaiveDate, key: &str, clicks: f64, cost: f64) -> MetricRecord {
        MetricRecord {
            date,
            source_key: key.to_string(),
            metrics: BTreeMap::from([("clicks".to_string(), clicks), ("cost".to_string(), cost)]),
        }
    }

    fn records() -> Vec<MetricRecord> {
        vec![
            record(date(2026, 2, 2), "/pricing", 10.0, 20.0),
            record(date(2026, 2, 3), "/pricing", 5.0, 10.0),
            record(date(2026, 2, 3), "/demo", 30.0, 15.0),
            record(date(2026, 2, 4), "", 1.0, 1.0),
            record(date(2026, 3, 1), "/demo", 100.0, 1.0),
        ]
    }

    #[test]
    fn test_breakdown_sorted_by_metric() {
        let rows = breakdown(
            &records(),
            date(2026, 2, 1),
            date(2026, 2, 28),
            "clicks",
            10,
            &ad_rates(),
        );
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].key, "/demo");
        assert!((rows[0].metrics["clicks"] - 30.0).abs() < f64::EPSILON);
        assert_eq!(rows[1].key, "/pricing");
        assert_eq!(rows[1].records, 2);
        assert!((rows[1].rates["cpc"] - 2.0).abs() < f64::EPSILON);
        assert_eq!(rows[2].key, UNSET_KEY);
    }

    #[test]
    fn test_breakdown_sort_by_cost_and_limit() {
        let rows = breakdown(&records(), date(2026, 2, 1), date(2026, 2, 28), "cost", 1, &[]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, "/pricing");
    }

    #[test]
    fn test_breakdown_range_is_inclusive() {
        let rows = breakdown(&records(), date(2026, 3, 1), date(2026, 3, 1), "clicks", 10, &[]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, "/demo");
    }

    #[test]
    fn test_breakdown_unknown_sort_metric_orders_by_key() {
        let rows = breakdown(&records(), date(2026, 2, 1), date(2026, 2, 28), "nope", 10, &[]);
        let keys: Vec<_> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["(not set)", "/demo", "/pricing"]);
    }
}
