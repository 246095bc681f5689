use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use rand::Rng;
use thiserror::Error;

use crate::domain::factors::FactorTables;
use crate::domain::record::{Category, SimulationRecord, zones_per_timestamp};

#[derive(Error, Debug, PartialEq)]
pub enum GenerationRequestError {
    #[error("invalid time of day: {0} (expected HH:MM)")]
    InvalidTime(String),
    #[error("invalid simulation date: {0} (expected YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("time interval must be a positive number of minutes")]
    InvalidInterval,
}

/// The sampled wall-clock window of one simulated day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub interval_minutes: u32,
}

impl SimulationWindow {
    pub fn parse(
        start_time: &str,
        end_time: &str,
        interval_minutes: u32,
        date: &str,
    ) -> Result<Self, GenerationRequestError> {
        if interval_minutes == 0 {
            return Err(GenerationRequestError::InvalidInterval);
        }
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|_| GenerationRequestError::InvalidDate(date.to_string()))?;
        let start = parse_time_of_day(start_time)?;
        let end = parse_time_of_day(end_time)?;

        Ok(Self {
            start: date.and_time(start).and_utc(),
            end: date.and_time(end).and_utc(),
            interval_minutes,
        })
    }

    /// Sample instants from `start` to `end` inclusive. Empty when `end < start`.
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        let step = Duration::minutes(i64::from(self.interval_minutes.max(1)));
        let mut timestamps = Vec::new();
        let mut time = self.start;
        while time <= self.end {
            timestamps.push(time);
            time += step;
        }
        timestamps
    }
}

fn parse_time_of_day(value: &str) -> Result<NaiveTime, GenerationRequestError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| GenerationRequestError::InvalidTime(value.to_string()))
}

pub fn generate_with_rng<R: Rng + ?Sized>(
    window: &SimulationWindow,
    tables: &FactorTables,
    rng: &mut R,
) -> Vec<SimulationRecord> {
    let timestamps = window.timestamps();
    let mut records = Vec::with_capacity(timestamps.len() * zones_per_timestamp());

    for timestamp in timestamps {
        // Weekday is drawn, not taken from the calendar date.
        let (weather, weather_factor) = draw_label(tables.weather(), rng);
        let (weekday, weekday_factor) = draw_label(tables.weekday(), rng);
        let discount = tables.discount(&weekday).unwrap_or(0);
        let hour_multiplier = time_of_day_multiplier(timestamp.hour());

        for category in Category::ALL {
            for zone in category.zones() {
                let (base_min, base_max) = category.base_range();
                let (min, max) = (base_min * hour_multiplier, base_max * hour_multiplier);
                let draw = (rng.gen_range(0.0..1.0) * (max - min + 1.0) + min).floor();

                let mut persons = draw * weather_factor * weekday_factor;
                if category.receives_discount() {
                    persons = (persons * (1.0 + f64::from(discount) / 100.0)).floor();
                }

                records.push(SimulationRecord {
                    timestamp,
                    category,
                    zone: (*zone).to_string(),
                    person_count: persons.floor().max(0.0) as u32,
                    weather: weather.clone(),
                    weekday: weekday.clone(),
                    discount_percent: discount,
                });
            }
        }
    }

    records
}

fn draw_label<R: Rng + ?Sized>(table: &[(String, f64)], rng: &mut R) -> (String, f64) {
    if table.is_empty() {
        return (String::new(), 1.0);
    }
    let (label, factor) = &table[rng.gen_range(0..table.len())];
    (label.clone(), *factor)
}

/// Rush hours (12-14, 18-21) scale the range up, the quiet morning (9-11) scales it down.
fn time_of_day_multiplier(hour: u32) -> f64 {
    match hour {
        12..=14 | 18..=21 => 1.5,
        9..=11 => 0.7,
        _ => 1.0,
    }
}
