use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// First day of a reporting week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Monday,
    Sunday,
}

/// Period length requested by a caller, before a week boundary is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    #[default]
    Week,
    Month,
}

/// Time granularity for bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Week(WeekStart),
    Month,
}

/// Start of the 7-day period containing `date`.
pub fn week_start(date: NaiveDate, starts_on: WeekStart) -> NaiveDate {
    let back = match starts_on {
        WeekStart::Monday => date.weekday().num_days_from_monday(),
        WeekStart::Sunday => date.weekday().num_days_from_sunday(),
    };
    date - Days::new(u64::from(back))
}

/// `YYYY-MM` key of the month containing `date`.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

impl Granularity {
    pub const fn new(kind: PeriodKind, starts_on: WeekStart) -> Self {
        match kind {
            PeriodKind::Week => Self::Week(starts_on),
            PeriodKind::Month => Self::Month,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Week(_) => "week",
            Self::Month => "month",
        }
    }

    /// First day of the period containing `date`.
    pub fn period_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Self::Week(starts_on) => week_start(date, starts_on),
            Self::Month => month_start(date),
        }
    }

    /// Last day (inclusive) of the period beginning at `start`.
    pub fn period_end(self, start: NaiveDate) -> NaiveDate {
        match self {
            Self::Week(_) => start + Days::new(6),
            Self::Month => start + Months::new(1) - Days::new(1),
        }
    }

    /// Whether the period beginning at `start` has fully elapsed before `today`.
    ///
    /// Weekly: `start + 6 days < today`, so a week ending today is still open.
    /// Monthly: the `YYYY-MM` key sorts strictly before today's.
    pub fn is_complete(self, start: NaiveDate, today: NaiveDate) -> bool {
        match self {
            Self::Week(_) => self.period_end(start) < today,
            Self::Month => month_key(start) < month_key(today),
        }
    }

    /// Stable identifier of the period (`2026-02-09` or `2026-02`).
    pub fn key(self, start: NaiveDate) -> String {
        match self {
            Self::Week(_) => start.format("%Y-%m-%d").to_string(),
            Self::Month => month_key(start),
        }
    }

    /// Display label: `Feb 9 - Feb 15` for weeks, `Feb 2026` for months.
    pub fn label(self, start: NaiveDate) -> String {
        match self {
            Self::Week(_) => format!(
                "{} - {}",
                start.format("%b %-d"),
                self.period_end(start).format("%b %-d")
            ),
            Self::Month => start.format("%b %Y").to_string(),
        }
    }

    /// Label relative to the period containing `today`.
    pub fn relative_label(self, start: NaiveDate, today: NaiveDate) -> String {
        let current = self.period_start(today);
        let (distance, unit) = match self {
            Self::Week(_) => ((current - start).num_days() / 7, "Week"),
            Self::Month => (months_between(start, current), "Month"),
        };
        match distance {
            0 => format!("This {unit}"),
            1 => format!("Last {unit}"),
            -1 => format!("Next {unit}"),
            n if n > 1 => format!("{n} {unit}s Ago"),
            n => format!("In {} {unit}s", -n),
        }
    }

    /// Start of the comparable period one year earlier.
    ///
    /// Weeks step back exactly 52 weeks (364 days), so the weekday is kept and
    /// the calendar date drifts by a day or two per year.
    pub fn prior_year(self, start: NaiveDate) -> NaiveDate {
        match self {
            Self::Week(starts_on) => week_start(start - Days::new(364), starts_on),
            Self::Month => month_start(start) - Months::new(12),
        }
    }
}

fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    let from = i64::from(from.year()) * 12 + i64::from(from.month0());
    let to = i64::from(to.year()) * 12 + i64::from(to.month0());
    to - from
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_start_monday() {
        // 2026-02-05 is a Thursday.
        assert_eq!(week_start(date(2026, 2, 5), WeekStart::Monday), date(2026, 2, 2));
        assert_eq!(week_start(date(2026, 2, 2), WeekStart::Monday), date(2026, 2, 2));
        assert_eq!(week_start(date(2026, 2, 8), WeekStart::Monday), date(2026, 2, 2));
    }

    #[test]
    fn test_week_start_sunday() {
        assert_eq!(week_start(date(2026, 2, 5), WeekStart::Sunday), date(2026, 2, 1));
        assert_eq!(week_start(date(2026, 2, 8), WeekStart::Sunday), date(2026, 2, 8));
    }

    #[test]
    fn test_week_start_crosses_year() {
        // 2026-01-01 is a Thursday.
        assert_eq!(week_start(date(2026, 1, 1), WeekStart::Monday), date(2025, 12, 29));
    }

    #[test]
    fn test_week_ending_today_is_incomplete() {
        let g = Granularity::Week(WeekStart::Monday);
        let start = date(2026, 2, 2);
        let end = date(2026, 2, 8);
        assert_eq!(g.period_end(start), end);
        assert!(!g.is_complete(start, end));
        assert!(g.is_complete(start, end + Days::new(1)));
        assert!(!g.is_complete(start, date(2026, 2, 4)));
    }

    #[test]
    fn test_month_completeness() {
        let g = Granularity::Month;
        assert!(g.is_complete(date(2026, 1, 1), date(2026, 2, 1)));
        assert!(!g.is_complete(date(2026, 2, 1), date(2026, 2, 28)));
        assert!(g.is_complete(date(2025, 12, 1), date(2026, 1, 15)));
    }

    #[test]
    fn test_month_bounds() {
        let g = Granularity::Month;
        assert_eq!(g.period_start(date(2024, 2, 17)), date(2024, 2, 1));
        assert_eq!(g.period_end(date(2024, 2, 1)), date(2024, 2, 29));
        assert_eq!(g.period_end(date(2026, 12, 1)), date(2026, 12, 31));
    }

    #[test]
    fn test_labels() {
        let week = Granularity::Week(WeekStart::Sunday);
        assert_eq!(week.label(date(2026, 2, 8)), "Feb 8 - Feb 14");
        assert_eq!(week.label(date(2025, 12, 28)), "Dec 28 - Jan 3");
        assert_eq!(week.key(date(2026, 2, 8)), "2026-02-08");
        assert_eq!(Granularity::Month.label(date(2026, 2, 1)), "Feb 2026");
        assert_eq!(Granularity::Month.key(date(2026, 2, 1)), "2026-02");
    }

    #[test]
    fn test_relative_labels() {
        let week = Granularity::Week(WeekStart::Monday);
        let today = date(2026, 2, 18);
        assert_eq!(week.relative_label(date(2026, 2, 16), today), "This Week");
        assert_eq!(week.relative_label(date(2026, 2, 9), today), "Last Week");
        assert_eq!(week.relative_label(date(2026, 1, 26), today), "3 Weeks Ago");
        assert_eq!(week.relative_label(date(2026, 2, 23), today), "Next Week");

        let month = Granularity::Month;
        assert_eq!(month.relative_label(date(2026, 1, 1), today), "Last Month");
        assert_eq!(month.relative_label(date(2025, 11, 1), today), "3 Months Ago");
    }

    #[test]
    fn test_prior_year_week_is_exactly_364_days() {
        let g = Granularity::Week(WeekStart::Monday);
        assert_eq!(g.prior_year(date(2027, 2, 1)), date(2026, 2, 2));
        assert_eq!((date(2027, 2, 1) - date(2026, 2, 2)).num_days(), 364);
    }

    #[test]
    fn test_prior_year_week_across_leap_day() {
        // 2024-03-04 (Monday) minus 364 days lands on 2023-03-06, also a Monday:
        // the leap day widens the calendar drift to two days.
        let g = Granularity::Week(WeekStart::Monday);
        assert_eq!(g.prior_year(date(2024, 3, 4)), date(2023, 3, 6));
    }

    #[test]
    fn test_prior_year_month() {
        assert_eq!(
            Granularity::Month.prior_year(date(2024, 2, 1)),
            date(2023, 2, 1)
        );
    }

    #[test]
    fn test_granularity_from_kind() {
        assert_eq!(
            Granularity::new(PeriodKind::Week, WeekStart::Sunday),
            Granularity::Week(WeekStart::Sunday)
        );
        assert_eq!(
            Granularity::new(PeriodKind::Month, WeekStart::Sunday),
            Granularity::Month
        );
        assert_eq!(Granularity::Month.as_str(), "month");
    }
}
