//! Derived views of the course table, one per report metric. All functions
//! are pure over the loaded records; drawing happens in `chart`.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDateTime};

use crate::dataset::{CourseRecord, Dataset};

pub const TOP_N: usize = 5;

/// Metric names, in display order. The first four are the default report
/// selection when the user lets the tool pick.
pub const METRIC_NAMES: [&str; 9] = [
    "Currently Enrolled",
    "Number of completions",
    "Completion variance to previous month",
    "Number of employees registered vs completed (monthly trend)",
    "Top 5 courses by completion",
    "Bottom 5 courses by completion",
    "Completion by Platform",
    "Completion by Employee Role",
    "Completion by Organization",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    CurrentlyEnrolled,
    MonthlyCompletions,
    CompletionVariance,
    RegisteredVsCompleted,
    TopCourses,
    BottomCourses,
    ByPlatform,
    ByRole,
    ByOrganization,
}

impl Metric {
    pub fn from_name(name: &str) -> Option<Self> {
        let index = METRIC_NAMES.iter().position(|m| *m == name.trim())?;
        Some(Self::ALL[index])
    }

    pub fn name(self) -> &'static str {
        let index = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        METRIC_NAMES[index]
    }

    pub const ALL: [Metric; 9] = [
        Metric::CurrentlyEnrolled,
        Metric::MonthlyCompletions,
        Metric::CompletionVariance,
        Metric::RegisteredVsCompleted,
        Metric::TopCourses,
        Metric::BottomCourses,
        Metric::ByPlatform,
        Metric::ByRole,
        Metric::ByOrganization,
    ];

    pub fn compute(self, dataset: &Dataset) -> MetricView {
        let records = dataset.records();
        match self {
            Self::CurrentlyEnrolled => MetricView::Single(currently_enrolled(records)),
            Self::MonthlyCompletions => MetricView::Single(monthly_completions(records)),
            Self::CompletionVariance => MetricView::Single(completion_variance(records)),
            Self::RegisteredVsCompleted => registered_vs_completed(records),
            Self::TopCourses => MetricView::Single(top_courses(records)),
            Self::BottomCourses => MetricView::Single(bottom_courses(records)),
            Self::ByPlatform => MetricView::Single(value_counts(records, |r| &r.platform)),
            Self::ByRole => MetricView::Single(value_counts(records, |r| &r.role)),
            Self::ByOrganization => MetricView::Single(value_counts(records, |r| &r.organization)),
        }
    }
}

/// An ordered label/value series ready for drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricView {
    Single(Series),
    /// The registered-vs-completed trend: two series aligned on the same
    /// year-month labels.
    Dual { registered: Series, completed: Series },
}

/// Full value-count distribution of one categorical column, descending by
/// count (ties break by label for deterministic output).
fn value_counts<F>(records: &[CourseRecord], key: F) -> Series
where
    F: Fn(&CourseRecord) -> &String,
{
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for record in records {
        *counts.entry(key(record).as_str()).or_insert(0) += 1;
    }

    let mut sorted: Vec<_> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    into_series(sorted)
}

fn top_courses(records: &[CourseRecord]) -> Series {
    let mut series = value_counts(records, |r| &r.course_name);
    series.labels.truncate(TOP_N);
    series.values.truncate(TOP_N);
    series
}

fn bottom_courses(records: &[CourseRecord]) -> Series {
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for record in records {
        *counts.entry(record.course_name.as_str()).or_insert(0) += 1;
    }

    let mut sorted: Vec<_> = counts.into_iter().collect();
    sorted.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    sorted.truncate(TOP_N);
    into_series(sorted)
}

/// A record with no completion date counts as currently enrolled, whatever
/// its registration date says.
fn currently_enrolled(records: &[CourseRecord]) -> Series {
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for record in records.iter().filter(|r| r.completion.is_none()) {
        *counts.entry(record.course_name.as_str()).or_insert(0) += 1;
    }

    let mut sorted: Vec<_> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    sorted.truncate(TOP_N);
    into_series(sorted)
}

/// Completion counts grouped by calendar month (1-12), ascending. This
/// metric groups by month-of-year, unlike the variance and trend metrics
/// which use year-month periods.
fn monthly_completions(records: &[CourseRecord]) -> Series {
    let mut counts: HashMap<u32, i64> = HashMap::new();
    for completion in records.iter().filter_map(|r| r.completion) {
        *counts.entry(completion.month()).or_insert(0) += 1;
    }

    let mut sorted: Vec<_> = counts.into_iter().collect();
    sorted.sort_by_key(|(month, _)| *month);
    Series {
        labels: sorted.iter().map(|(month, _)| month.to_string()).collect(),
        values: sorted.iter().map(|(_, count)| *count).collect(),
    }
}

/// First difference of the year-month completion series. The first month
/// has no prior to diff against and is reported as zero.
fn completion_variance(records: &[CourseRecord]) -> Series {
    let monthly = period_counts(records.iter().filter_map(|r| r.completion));
    let mut previous = None;
    let values = monthly
        .iter()
        .map(|(_, count)| {
            let diff = count - previous.unwrap_or(*count);
            previous = Some(*count);
            diff
        })
        .collect();

    Series {
        labels: monthly.into_iter().map(|(month, _)| month).collect(),
        values,
    }
}

/// Two monthly series over the union of year-month keys, zero-filled where
/// one side has no activity, so both lines share an x axis.
fn registered_vs_completed(records: &[CourseRecord]) -> MetricView {
    let registered = period_counts(records.iter().filter_map(|r| r.registration));
    let completed = period_counts(records.iter().filter_map(|r| r.completion));

    let mut months: Vec<String> = registered
        .iter()
        .chain(completed.iter())
        .map(|(month, _)| month.clone())
        .collect();
    months.sort();
    months.dedup();

    let fill = |counts: &[(String, i64)]| -> Series {
        Series {
            labels: months.clone(),
            values: months
                .iter()
                .map(|m| {
                    counts
                        .iter()
                        .find(|(month, _)| month == m)
                        .map_or(0, |(_, count)| *count)
                })
                .collect(),
        }
    };

    MetricView::Dual {
        registered: fill(&registered),
        completed: fill(&completed),
    }
}

/// Counts keyed by "YYYY-MM", ascending.
fn period_counts(dates: impl Iterator<Item = NaiveDateTime>) -> Vec<(String, i64)> {
    let mut counts: HashMap<String, i64> = HashMap::new();
    for date in dates {
        *counts.entry(date.format("%Y-%m").to_string()).or_insert(0) += 1;
    }

    let mut sorted: Vec<_> = counts.into_iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    sorted
}

fn into_series(pairs: Vec<(&str, i64)>) -> Series {
    Series {
        labels: pairs.iter().map(|(label, _)| (*label).to_string()).collect(),
        values: pairs.iter().map(|(_, count)| *count).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::parse_date;

    fn record(course: &str, platform: &str, reg: Option<&str>, comp: Option<&str>) -> CourseRecord {
        CourseRecord {
            employee_id: "E1".into(),
            organization: "Org".into(),
            country: "US".into(),
            platform: platform.into(),
            course_name: course.into(),
            course_level: "Beginner".into(),
            role: "Engineer".into(),
            registration: reg.and_then(parse_date),
            completion: comp.and_then(parse_date),
        }
    }

    #[test]
    fn test_metric_names_round_trip() {
        for name in METRIC_NAMES {
            assert_eq!(Metric::from_name(name).unwrap().name(), name);
        }
        assert!(Metric::from_name("Nonexistent metric").is_none());
    }

    #[test]
    fn test_currently_enrolled_filters_on_missing_completion_only() {
        let dataset = Dataset::from_records(vec![
            record("Rust", "A", Some("2024-01-01"), None),
            record("Rust", "A", None, None),
            record("Rust", "A", Some("2024-01-01"), Some("2024-02-01")),
            record("Go", "A", None, Some("2024-03-01")),
        ]);

        let MetricView::Single(series) = Metric::CurrentlyEnrolled.compute(&dataset) else {
            panic!("expected single series");
        };
        // Two Rust rows without a completion date; both completed rows are
        // excluded regardless of registration.
        assert_eq!(series.labels, vec!["Rust"]);
        assert_eq!(series.values, vec![2]);
    }

    #[test]
    fn test_variance_of_single_month_is_zero() {
        let dataset = Dataset::from_records(vec![
            record("Rust", "A", None, Some("2024-05-01")),
            record("Go", "A", None, Some("2024-05-20")),
        ]);

        let MetricView::Single(series) = Metric::CompletionVariance.compute(&dataset) else {
            panic!("expected single series");
        };
        assert_eq!(series.labels, vec!["2024-05"]);
        assert_eq!(series.values, vec![0]);
    }

    #[test]
    fn test_variance_is_first_difference() {
        let dataset = Dataset::from_records(vec![
            record("A", "P", None, Some("2024-01-10")),
            record("B", "P", None, Some("2024-02-10")),
            record("C", "P", None, Some("2024-02-20")),
            record("D", "P", None, Some("2024-03-05")),
        ]);

        let MetricView::Single(series) = Metric::CompletionVariance.compute(&dataset) else {
            panic!("expected single series");
        };
        assert_eq!(series.labels, vec!["2024-01", "2024-02", "2024-03"]);
        assert_eq!(series.values, vec![0, 1, -1]);
    }

    #[test]
    fn test_trend_series_are_aligned_and_zero_filled() {
        let dataset = Dataset::from_records(vec![
            record("A", "P", Some("2024-01-05"), None),
            record("B", "P", Some("2024-01-15"), Some("2024-03-01")),
            record("C", "P", Some("2024-02-10"), Some("2024-03-10")),
        ]);

        let MetricView::Dual { registered, completed } =
            Metric::RegisteredVsCompleted.compute(&dataset)
        else {
            panic!("expected dual series");
        };
        assert_eq!(registered.labels, vec!["2024-01", "2024-02", "2024-03"]);
        assert_eq!(registered.labels, completed.labels);
        assert_eq!(registered.values, vec![2, 1, 0]);
        assert_eq!(completed.values, vec![0, 0, 2]);
    }

    #[test]
    fn test_top_and_bottom_courses_truncate_to_five() {
        let mut records = Vec::new();
        for (i, course) in ["A", "B", "C", "D", "E", "F", "G"].iter().enumerate() {
            for _ in 0..=i {
                records.push(record(course, "P", None, Some("2024-01-01")));
            }
        }
        let dataset = Dataset::from_records(records);

        let MetricView::Single(top) = Metric::TopCourses.compute(&dataset) else {
            panic!("expected single series");
        };
        assert_eq!(top.labels, vec!["G", "F", "E", "D", "C"]);
        assert_eq!(top.values, vec![7, 6, 5, 4, 3]);

        let MetricView::Single(bottom) = Metric::BottomCourses.compute(&dataset) else {
            panic!("expected single series");
        };
        assert_eq!(bottom.labels, vec!["A", "B", "C", "D", "E"]);
        assert_eq!(bottom.values, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_platform_distribution_is_descending_with_label_tiebreak() {
        let dataset = Dataset::from_records(vec![
            record("A", "Udemy", None, None),
            record("B", "Coursera", None, None),
            record("C", "Coursera", None, None),
            record("D", "LinkedIn", None, None),
        ]);

        let MetricView::Single(series) = Metric::ByPlatform.compute(&dataset) else {
            panic!("expected single series");
        };
        assert_eq!(series.labels, vec!["Coursera", "LinkedIn", "Udemy"]);
        assert_eq!(series.values, vec![2, 1, 1]);
    }

    #[test]
    fn test_monthly_completions_group_by_calendar_month() {
        let dataset = Dataset::from_records(vec![
            record("A", "P", None, Some("2023-12-01")),
            record("B", "P", None, Some("2024-12-15")),
            record("C", "P", None, Some("2024-02-01")),
        ]);

        let MetricView::Single(series) = Metric::MonthlyCompletions.compute(&dataset) else {
            panic!("expected single series");
        };
        // December of different years lands in the same bucket.
        assert_eq!(series.labels, vec!["2", "12"]);
        assert_eq!(series.values, vec![1, 2]);
    }
}
