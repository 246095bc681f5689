use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parsed case-insensitively from both JSON and CSV; always written in its canonical spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Category {
    Entrance,
    Stores,
    Cinema,
    Restaurants,
    Exits,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Entrance,
        Category::Stores,
        Category::Cinema,
        Category::Restaurants,
        Category::Exits,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Entrance => "Entrance",
            Category::Stores => "Stores",
            Category::Cinema => "Cinema",
            Category::Restaurants => "Restaurants",
            Category::Exits => "Exits",
        }
    }

    pub fn zones(&self) -> &'static [&'static str] {
        match self {
            Category::Entrance => &["North", "South", "West", "Northeast"],
            Category::Stores => &["StoreA", "StoreB", "StoreC", "StoreD", "StoreE"],
            Category::Cinema => &["CinemaChainA", "CinemaChainB", "CinemaChainC"],
            Category::Restaurants => &[
                "RestaurantA",
                "RestaurantB",
                "RestaurantC",
                "RestaurantD",
                "RestaurantE",
            ],
            Category::Exits => &["North", "South", "West", "Northeast"],
        }
    }

    /// Inclusive visitor range before any time-of-day or factor scaling.
    pub fn base_range(&self) -> (f64, f64) {
        match self {
            Category::Entrance => (20.0, 100.0),
            Category::Stores => (5.0, 60.0),
            Category::Cinema => (10.0, 80.0),
            Category::Restaurants => (5.0, 50.0),
            Category::Exits => (5.0, 40.0),
        }
    }

    pub fn receives_discount(&self) -> bool {
        matches!(self, Category::Cinema | Category::Restaurants)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|category| category.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| value.to_string())
    }
}

impl TryFrom<String> for Category {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .parse()
            .map_err(|value| format!("unknown category: {value}"))
    }
}

/// Number of (category, zone) pairs emitted per timestamp.
pub fn zones_per_timestamp() -> usize {
    Category::ALL.iter().map(|category| category.zones().len()).sum()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRecord {
    pub timestamp: DateTime<Utc>,
    pub category: Category,
    pub zone: String,
    pub person_count: u32,
    pub weather: String,
    pub weekday: String,
    pub discount_percent: u32,
}
