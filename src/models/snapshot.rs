//! Snapshots, lineages and the search filters that name them.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Record;

/// Listing category searched on the source site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tenders,
    Projects,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Tenders, Category::Projects];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Tenders => "tenders",
            Category::Projects => "projects",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tenders" => Ok(Category::Tenders),
            "projects" => Ok(Category::Projects),
            other => Err(AppError::validation(format!("unknown category '{other}'"))),
        }
    }
}

/// A named search: one lineage per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Lineage name, used in snapshot file names
    #[serde(default = "default_filter_name")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
}

fn default_filter_name() -> String {
    "unnamed".to_string()
}

impl FilterSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            country: None,
            status: None,
            sector: None,
        }
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }
}

/// Identity of one lineage of snapshots.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineageKey {
    pub category: Category,
    pub filter_name: String,
}

impl LineageKey {
    pub fn new(category: Category, filter_name: impl Into<String>) -> Self {
        Self {
            category,
            filter_name: filter_name.into(),
        }
    }
}

impl fmt::Display for LineageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.filter_name)
    }
}

/// Second-resolution local timestamp with a sortable string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// `YYYYMMDD_HHMMSS`
    pub const FORMAT: &'static str = "%Y%m%d_%H%M%S";
    /// Length of the formatted string.
    pub const LEN: usize = 15;

    pub fn now() -> Self {
        Self::from_datetime(Local::now().naive_local())
    }

    /// Truncates sub-second precision so the value survives a round trip.
    pub fn from_datetime(datetime: NaiveDateTime) -> Self {
        Self(datetime.trunc_subsecs(0))
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

impl FromStr for Timestamp {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        NaiveDateTime::parse_from_str(s, Self::FORMAT)
            .map(Self)
            .map_err(|e| AppError::validation(format!("invalid timestamp '{s}': {e}")))
    }
}

/// Records produced by one run for one lineage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub category: Category,
    pub filter_name: String,
    pub timestamp: Timestamp,
    pub records: Vec<Record>,
}

impl Snapshot {
    pub fn new(
        category: Category,
        filter_name: impl Into<String>,
        timestamp: Timestamp,
        records: Vec<Record>,
    ) -> Self {
        Self {
            category,
            filter_name: filter_name.into(),
            timestamp,
            records,
        }
    }

    pub fn lineage(&self) -> LineageKey {
        LineageKey::new(self.category, self.filter_name.clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn titles(&self) -> HashSet<&str> {
        self.records.iter().map(Record::title).collect()
    }

    /// Union of field names across records, in first-seen order.
    pub fn header(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut header = Vec::new();
        for name in self.records.iter().flat_map(Record::field_names) {
            if seen.insert(name) {
                header.push(name);
            }
        }
        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_round_trip_and_order() {
        let early: Timestamp = "20250101_090000".parse().unwrap();
        let late: Timestamp = "20250102_090000".parse().unwrap();
        assert!(early < late);
        assert_eq!(early.to_string(), "20250101_090000");
        assert_eq!(early.to_string().len(), Timestamp::LEN);
    }

    #[test]
    fn test_from_datetime_drops_subseconds() {
        let precise = chrono::NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_milli_opt(9, 0, 0, 999)
            .unwrap();
        let ts = Timestamp::from_datetime(precise);
        assert_eq!(ts, "20250101_090000".parse().unwrap());
        assert_eq!(ts.to_string().parse::<Timestamp>().unwrap(), ts);
    }

    #[test]
    fn test_timestamp_rejects_garbage() {
        assert!("2025-01-01".parse::<Timestamp>().is_err());
        assert!("".parse::<Timestamp>().is_err());
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("tenders".parse::<Category>().unwrap(), Category::Tenders);
        assert_eq!(Category::Projects.to_string(), "projects");
        assert!("grants".parse::<Category>().is_err());
    }

    #[test]
    fn test_header_is_union_in_first_seen_order() {
        let a = Record::new("A", "l", "s").unwrap().with_field("Country", "India");
        let b = Record::new("B", "l", "s").unwrap().with_field("Sector", "Water");
        let snapshot = Snapshot::new(
            Category::Tenders,
            "x",
            "20250101_090000".parse().unwrap(),
            vec![a, b],
        );
        assert_eq!(
            snapshot.header(),
            vec!["Title", "Link", "Status", "Country", "Sector"]
        );
    }
}
