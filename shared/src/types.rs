//! Common types used across the pipeline

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// The independently owned services of the pipeline
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Orders,
    Kitchen,
    Inventory,
    Finance,
    Sales,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Orders => "orders",
            Component::Kitchen => "kitchen",
            Component::Inventory => "inventory",
            Component::Finance => "finance",
            Component::Sales => "sales",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "orders" => Some(Component::Orders),
            "kitchen" => Some(Component::Kitchen),
            "inventory" => Some(Component::Inventory),
            "finance" => Some(Component::Finance),
            "sales" => Some(Component::Sales),
            _ => None,
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monday of the ISO week containing `date`
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Whether `date` is a valid week identifier (a Monday)
pub fn is_week_start(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Mon
}

/// Exclusive end of the week starting at `week_start`
pub fn week_end(week_start: NaiveDate) -> NaiveDate {
    week_start + Duration::days(7)
}

/// Whether `date` falls in [week_start, week_start + 7 days)
pub fn in_week(week_start: NaiveDate, date: NaiveDate) -> bool {
    date >= week_start && date < week_end(week_start)
}

/// Whether a UTC timestamp falls inside the week starting at `week_start`
pub fn timestamp_in_week(week_start: NaiveDate, at: DateTime<Utc>) -> bool {
    in_week(week_start, at.date_naive())
}

/// Date range for queries, `end` exclusive
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn week(week_start: NaiveDate) -> Self {
        Self {
            start: Some(week_start),
            end: Some(week_end(week_start)),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date < e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_week_start_of() {
        assert_eq!(week_start_of(d("2024-01-02")), d("2024-01-01"));
        assert_eq!(week_start_of(d("2024-01-01")), d("2024-01-01"));
        assert_eq!(week_start_of(d("2024-01-07")), d("2024-01-01"));
        assert_eq!(week_start_of(d("2024-01-08")), d("2024-01-08"));
    }

    #[test]
    fn test_in_week_is_half_open() {
        let week = d("2024-01-01");
        assert!(in_week(week, d("2024-01-01")));
        assert!(in_week(week, d("2024-01-07")));
        assert!(!in_week(week, d("2024-01-08")));
        assert!(!in_week(week, d("2023-12-31")));
    }

    #[test]
    fn test_is_week_start() {
        assert!(is_week_start(d("2024-01-01")));
        assert!(!is_week_start(d("2024-01-02")));
    }

    #[test]
    fn test_component_round_trip_names() {
        for c in [
            Component::Orders,
            Component::Kitchen,
            Component::Inventory,
            Component::Finance,
            Component::Sales,
        ] {
            assert_eq!(Component::parse(c.as_str()), Some(c));
        }
        assert_eq!(Component::parse("billing"), None);
    }
}
