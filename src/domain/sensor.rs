use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorKind {
    Motion,
    Presence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorStatus {
    Online,
    Warning,
    Offline,
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SensorStatus::Online => "online",
            SensorStatus::Warning => "warning",
            SensorStatus::Offline => "offline",
        };
        f.write_str(text)
    }
}

impl FromStr for SensorStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "online" => Ok(SensorStatus::Online),
            "warning" => Ok(SensorStatus::Warning),
            "offline" => Ok(SensorStatus::Offline),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    pub id: String,
    pub name: String,
    pub kind: SensorKind,
    pub status: SensorStatus,
    pub battery: u8,
    pub last_reading: DateTime<Utc>,
    pub temperature: f32,
    pub humidity: u8,
    pub people_count: u32,
    pub signal: u8,
    pub location: String,
    pub maintenance: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SensorStats {
    pub total: usize,
    pub online: usize,
    pub warning: usize,
    pub offline: usize,
}

/// Installation shipped with a fresh panel; readings are relative to `now`.
pub fn default_sensors(now: DateTime<Utc>) -> Vec<Sensor> {
    vec![
        Sensor {
            id: "sensor-001".to_string(),
            name: "North Entrance".to_string(),
            kind: SensorKind::Motion,
            status: SensorStatus::Online,
            battery: 87,
            last_reading: now - Duration::minutes(2),
            temperature: 23.5,
            humidity: 45,
            people_count: 124,
            signal: 92,
            location: "Main Entrance".to_string(),
            maintenance: date(2024, 6, 15),
        },
        Sensor {
            id: "sensor-002".to_string(),
            name: "Central Store".to_string(),
            kind: SensorKind::Presence,
            status: SensorStatus::Online,
            battery: 64,
            last_reading: now - Duration::minutes(5),
            temperature: 24.2,
            humidity: 50,
            people_count: 78,
            signal: 85,
            location: "Shopping Area".to_string(),
            maintenance: date(2024, 5, 20),
        },
        Sensor {
            id: "sensor-003".to_string(),
            name: "Food Court".to_string(),
            kind: SensorKind::Motion,
            status: SensorStatus::Warning,
            battery: 32,
            last_reading: now - Duration::minutes(15),
            temperature: 25.8,
            humidity: 55,
            people_count: 203,
            signal: 68,
            location: "Restaurant Zone".to_string(),
            maintenance: date(2024, 4, 10),
        },
        Sensor {
            id: "sensor-004".to_string(),
            name: "South Exit".to_string(),
            kind: SensorKind::Presence,
            status: SensorStatus::Offline,
            battery: 12,
            last_reading: now - Duration::hours(1),
            temperature: 22.1,
            humidity: 42,
            people_count: 56,
            signal: 0,
            location: "Secondary Exit".to_string(),
            maintenance: date(2024, 3, 25),
        },
    ]
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}
