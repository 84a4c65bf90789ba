use crate::rollup::calendar::Granularity;
use crate::sheet::extract::MetricRecord;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Running per-metric sums for one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Number of records accumulated.
    pub records: usize,
    pub metrics: BTreeMap<String, f64>,
}

impl Bucket {
    pub const fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            records: 0,
            metrics: BTreeMap::new(),
        }
    }

    /// Add every metric of `record` to the running sums.
    ///
    /// Metrics the record does not carry contribute nothing; zero and
    /// "not reported" are indistinguishable afterwards.
    pub fn accumulate(&mut self, record: &MetricRecord) {
        self.records += 1;
        for (name, value) in &record.metrics {
            *self.metrics.entry(name.clone()).or_insert(0.0) += value;
        }
    }

    /// Accumulated value of `name`, 0 if never reported.
    pub fn metric(&self, name: &str) -> f64 {
        self.metrics.get(name).copied().unwrap_or(0.0)
    }
}

/// Records bucketed by period start, in ascending order.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketSeries {
    granularity: Granularity,
    buckets: BTreeMap<NaiveDate, Bucket>,
}

impl BucketSeries {
    pub const fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            buckets: BTreeMap::new(),
        }
    }

    /// Bucket every record by the period containing its date.
    pub fn build(records: &[MetricRecord], granularity: Granularity) -> Self {
        let mut series = Self::new(granularity);
        for record in records {
            series.add(record);
        }
        series
    }

    pub fn add(&mut self, record: &MetricRecord) {
        let granularity = self.granularity;
        let start = granularity.period_start(record.date);
        self.buckets
            .entry(start)
            .or_insert_with(|| Bucket::new(start, granularity.period_end(start)))
            .accumulate(record);
    }

    pub const fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn get(&self, start: NaiveDate) -> Option<&Bucket> {
        self.buckets.get(&start)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Complete buckets, newest first.
    pub fn complete_desc(&self, today: NaiveDate) -> impl Iterator<Item = &Bucket> {
        let granularity = self.granularity;
        self.buckets
            .values()
            .rev()
            .filter(move |bucket| granularity.is_complete(bucket.start, today))
    }

    /// The most recent `n` complete buckets, newest first.
    ///
    /// The period still in progress is never included; see [`Self::in_progress`].
    pub fn last_complete(&self, today: NaiveDate, n: usize) -> Vec<&Bucket> {
        self.complete_desc(today).take(n).collect()
    }

    /// The bucket for the period containing `today`, if it has any records.
    pub fn in_progress(&self, today: NaiveDate) -> Option<&Bucket> {
        self.get(self.granularity.period_start(today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rollup::calendar::WeekStart;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(date: NaiveDate, a: f64, b: f64) -> MetricRecord {
        MetricRecord {
            date,
            source_key: String::new(),
            metrics: BTreeMap::from([("metricA".to_string(), a), ("metricB".to_string(), b)]),
        }
    }

    const MONDAY: Granularity = Granularity::Week(WeekStart::Monday);

    #[test]
    fn test_two_days_same_week() {
        let records = vec![
            record(date(2026, 2, 2), 100.0, 10.0),
            record(date(2026, 2, 3), 50.0, 5.0),
        ];
        let series = BucketSeries::build(&records, MONDAY);
        assert_eq!(series.len(), 1);
        let bucket = series.get(date(2026, 2, 2)).unwrap();
        assert_eq!(bucket.end, date(2026, 2, 8));
        assert_eq!(bucket.records, 2);
        assert!((bucket.metric("metricA") - 150.0).abs() < f64::EPSILON);
        assert!((bucket.metric("metricB") - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_absent_metric_reads_zero() {
        let mut bucket = Bucket::new(date(2026, 2, 2), date(2026, 2, 8));
        bucket.accumulate(&MetricRecord {
            date: date(2026, 2, 2),
            source_key: String::new(),
            metrics: BTreeMap::from([("clicks".to_string(), 3.0)]),
        });
        assert!(bucket.metric("conversions").abs() < f64::EPSILON);
        assert!(!bucket.metrics.contains_key("conversions"));
    }

    #[test]
    fn test_sunday_boundary_splits_weeks() {
        // Sunday 2026-02-08 belongs to the Monday week of Feb 2 but starts a
        // new Sunday week.
        let records = vec![
            record(date(2026, 2, 7), 1.0, 0.0),
            record(date(2026, 2, 8), 1.0, 0.0),
        ];
        assert_eq!(BucketSeries::build(&records, MONDAY).len(), 1);
        assert_eq!(
            BucketSeries::build(&records, Granularity::Week(WeekStart::Sunday)).len(),
            2
        );
    }

    #[test]
    fn test_monthly_buckets() {
        let records = vec![
            record(date(2026, 1, 31), 1.0, 0.0),
            record(date(2026, 2, 1), 2.0, 0.0),
            record(date(2026, 2, 28), 3.0, 0.0),
        ];
        let series = BucketSeries::build(&records, Granularity::Month);
        assert_eq!(series.len(), 2);
        let feb = series.get(date(2026, 2, 1)).unwrap();
        assert!((feb.metric("metricA") - 5.0).abs() < f64::EPSILON);
        assert_eq!(feb.end, date(2026, 2, 28));
    }

    #[test]
    fn test_last_complete_excludes_current_week() {
        let records: Vec<_> = (0..5)
            .map(|w| record(date(2026, 1, 5) + chrono::Days::new(7 * w), 1.0, 0.0))
            .collect();
        let series = BucketSeries::build(&records, MONDAY);
        // Today is Sunday 2026-02-08: the week of Feb 2 ends today.
        let today = date(2026, 2, 8);
        let last = series.last_complete(today, 10);
        assert_eq!(last.len(), 4);
        assert_eq!(last[0].start, date(2026, 1, 26));
        assert_eq!(last[3].start, date(2026, 1, 5));
        assert_eq!(series.in_progress(today).unwrap().start, date(2026, 2, 2));

        let last_two = series.last_complete(today, 2);
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[1].start, date(2026, 1, 19));
    }

    #[test]
    fn test_in_progress_absent() {
        let series = BucketSeries::build(&[record(date(2026, 1, 5), 1.0, 0.0)], MONDAY);
        assert!(series.in_progress(date(2026, 3, 1)).is_none());
    }
}
