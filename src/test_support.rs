use chrono::{DateTime, Utc};

use crate::domain::record::{Category, SimulationRecord};

pub fn at(timestamp: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(timestamp)
        .unwrap()
        .with_timezone(&Utc)
}

/// A sunny Monday record with no discount.
pub fn build_record(timestamp: &str, category: Category, zone: &str, person_count: u32) -> SimulationRecord {
    SimulationRecord {
        timestamp: at(timestamp),
        category,
        zone: zone.to_string(),
        person_count,
        weather: "Sunny".to_string(),
        weekday: "Monday".to_string(),
        discount_percent: 0,
    }
}

pub fn sample_records() -> Vec<SimulationRecord> {
    let mut tuesday_cinema = build_record("2024-02-23T13:00:00Z", Category::Cinema, "CinemaChainA", 42);
    tuesday_cinema.weekday = "Tuesday".to_string();
    tuesday_cinema.discount_percent = 10;
    tuesday_cinema.weather = "Rainy".to_string();

    vec![
        build_record("2024-02-23T09:00:00Z", Category::Entrance, "North", 17),
        build_record("2024-02-23T09:00:00Z", Category::Stores, "StoreB", 8),
        tuesday_cinema,
    ]
}
