use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::record::SimulationRecord;

pub const ALL: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedBucket {
    pub label: String,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Zone,
    Category,
    Hour,
    Weather,
    Weekday,
}

impl GroupBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::Zone => "zone",
            GroupBy::Category => "category",
            GroupBy::Hour => "hour",
            GroupBy::Weather => "weather",
            GroupBy::Weekday => "weekday",
        }
    }

    /// Column heading used when buckets are shown as a table or chart axis.
    pub fn heading(&self) -> &'static str {
        match self {
            GroupBy::Zone => "Zone",
            GroupBy::Category => "Category",
            GroupBy::Hour => "Hour",
            GroupBy::Weather => "Weather",
            GroupBy::Weekday => "Weekday",
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupBy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "zone" => Ok(GroupBy::Zone),
            "category" => Ok(GroupBy::Category),
            "hour" => Ok(GroupBy::Hour),
            "weather" => Ok(GroupBy::Weather),
            "weekday" => Ok(GroupBy::Weekday),
            other => Err(other.to_string()),
        }
    }
}

/// Exact-match filters; `None` and `"all"` both let every record through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilters {
    pub category: Option<String>,
    pub weekday: Option<String>,
    pub weather: Option<String>,
}

impl RecordFilters {
    pub fn matches(&self, record: &SimulationRecord) -> bool {
        filter_matches(self.category.as_deref(), record.category.as_str())
            && filter_matches(self.weekday.as_deref(), &record.weekday)
            && filter_matches(self.weather.as_deref(), &record.weather)
    }
}

fn filter_matches(filter: Option<&str>, value: &str) -> bool {
    match filter {
        None => true,
        Some(ALL) => true,
        Some(expected) => expected == value,
    }
}
