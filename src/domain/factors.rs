use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

pub const WEEKDAY_ORDER: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Upper bounds that keep every scaled visitor count well inside `u32`.
pub const MAX_FACTOR: f64 = 100.0;
pub const MAX_DISCOUNT_PERCENT: u32 = 100;

const DEFAULT_WEATHER_FACTORS: [(&str, f64); 3] = [("Sunny", 1.0), ("Rainy", 0.7), ("Cloudy", 0.9)];

const DEFAULT_WEEKDAY_FACTORS: [(&str, f64); 7] = [
    ("Monday", 0.8),
    ("Tuesday", 0.9),
    ("Wednesday", 1.0),
    ("Thursday", 1.1),
    ("Friday", 1.2),
    ("Saturday", 1.5),
    ("Sunday", 1.3),
];

const DEFAULT_WEEKDAY_DISCOUNTS: [(&str, u32); 7] = [
    ("Monday", 0),
    ("Tuesday", 10),
    ("Wednesday", 0),
    ("Thursday", 15),
    ("Friday", 0),
    ("Saturday", 0),
    ("Sunday", 20),
];

#[derive(Error, Debug, PartialEq)]
pub enum FactorTableError {
    #[error("{0} table is empty")]
    EmptyTable(&'static str),
    #[error("invalid factor for {label}: {value}")]
    InvalidFactor { label: String, value: f64 },
    #[error("no discount defined for weekday {0}")]
    MissingDiscount(String),
    #[error("invalid discount for {label}: {value}%")]
    InvalidDiscount { label: String, value: u32 },
}

/// Weather and weekday multipliers plus weekday discounts used by one generation run.
///
/// Entries keep their order so that a seeded generator draws the same labels every run.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorTables {
    weather: Vec<(String, f64)>,
    weekday: Vec<(String, f64)>,
    discounts: Vec<(String, u32)>,
}

impl Default for FactorTables {
    fn default() -> Self {
        Self {
            weather: to_owned_pairs(&DEFAULT_WEATHER_FACTORS),
            weekday: to_owned_pairs(&DEFAULT_WEEKDAY_FACTORS),
            discounts: to_owned_pairs(&DEFAULT_WEEKDAY_DISCOUNTS),
        }
    }
}

impl FactorTables {
    /// Builds tables from optional overrides, falling back to the defaults for any
    /// table that is not supplied.
    pub fn with_overrides(
        weather: Option<BTreeMap<String, f64>>,
        weekday: Option<BTreeMap<String, f64>>,
        discounts: Option<BTreeMap<String, u32>>,
    ) -> Result<Self, FactorTableError> {
        let defaults = Self::default();
        let tables = Self {
            weather: weather.map(|t| t.into_iter().collect()).unwrap_or(defaults.weather),
            weekday: weekday.map(|t| t.into_iter().collect()).unwrap_or(defaults.weekday),
            discounts: discounts
                .map(|t| t.into_iter().collect())
                .unwrap_or(defaults.discounts),
        };
        tables.validate()?;
        Ok(tables)
    }

    fn validate(&self) -> Result<(), FactorTableError> {
        if self.weather.is_empty() {
            return Err(FactorTableError::EmptyTable("weather"));
        }
        if self.weekday.is_empty() {
            return Err(FactorTableError::EmptyTable("weekday"));
        }
        for (label, value) in self.weather.iter().chain(self.weekday.iter()) {
            if !value.is_finite() || *value < 0.0 || *value > MAX_FACTOR {
                return Err(FactorTableError::InvalidFactor {
                    label: label.clone(),
                    value: *value,
                });
            }
        }
        for (label, value) in &self.discounts {
            if *value > MAX_DISCOUNT_PERCENT {
                return Err(FactorTableError::InvalidDiscount {
                    label: label.clone(),
                    value: *value,
                });
            }
        }
        for (label, _) in &self.weekday {
            if self.discount(label).is_none() {
                return Err(FactorTableError::MissingDiscount(label.clone()));
            }
        }
        Ok(())
    }

    pub fn weather(&self) -> &[(String, f64)] {
        &self.weather
    }

    pub fn weekday(&self) -> &[(String, f64)] {
        &self.weekday
    }

    pub fn discount(&self, weekday: &str) -> Option<u32> {
        self.discounts
            .iter()
            .find(|(label, _)| label == weekday)
            .map(|(_, discount)| *discount)
    }
}

/// Optional replacements for the built-in tables, as read from a factors file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FactorOverrides {
    pub weather: Option<BTreeMap<String, f64>>,
    pub weekday: Option<BTreeMap<String, f64>>,
    pub discounts: Option<BTreeMap<String, u32>>,
}

fn to_owned_pairs<T: Copy>(pairs: &[(&str, T)]) -> Vec<(String, T)> {
    pairs
        .iter()
        .map(|(label, value)| (label.to_string(), *value))
        .collect()
}

/// Position of `label` in the Monday to Sunday week, if it is a canonical weekday.
pub fn weekday_index(label: &str) -> Option<usize> {
    WEEKDAY_ORDER.iter().position(|day| *day == label)
}
