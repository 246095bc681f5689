use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::sensor::{Sensor, SensorKind, SensorStats, SensorStatus, default_sensors};

const LOW_BATTERY: u8 = 15;
const LOW_SIGNAL: u8 = 30;
const RESTORED_SIGNAL: u8 = 85;
const MAINTENANCE_INTERVAL_DAYS: i64 = 90;
const ID_SPACE: u32 = 1000;

#[derive(Error, Debug, PartialEq)]
pub enum SensorError {
    #[error("sensor name and location are required")]
    MissingField,
    #[error("sensor {0} not found")]
    NotFound(String),
    #[error("signal must be between 0 and 100, got {0}")]
    InvalidSignal(u8),
    #[error("all {0} sensor ids are in use")]
    Full(u32),
}

/// Form input for a sensor added by hand.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NewSensor {
    pub name: String,
    pub kind: SensorKind,
    pub location: String,
    pub battery: u8,
    pub signal: u8,
}

impl Default for NewSensor {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: SensorKind::Motion,
            location: String::new(),
            battery: 100,
            signal: 100,
        }
    }
}

/// The in-memory sensor installation shown on the panel.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorFleet {
    sensors: Vec<Sensor>,
}

impl SensorFleet {
    pub fn new(sensors: Vec<Sensor>) -> Self {
        Self { sensors }
    }

    pub fn with_defaults(now: DateTime<Utc>) -> Self {
        Self::new(default_sensors(now))
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    /// Perturbs every reachable sensor. Offline sensors keep their last reading.
    pub fn refresh<R: Rng + ?Sized>(&mut self, rng: &mut R, now: DateTime<Utc>) {
        for sensor in self.sensors.iter_mut() {
            if sensor.status == SensorStatus::Offline {
                continue;
            }
            let previous_battery = sensor.battery;

            sensor.last_reading = now;
            sensor.battery = previous_battery.saturating_sub(rng.gen_range(0..5)).max(1);
            let temperature = sensor.temperature + rng.gen_range(-1.0..1.0);
            sensor.temperature = (temperature * 10.0).round() / 10.0;
            sensor.humidity = walk(sensor.humidity, rng.gen_range(-5..5));
            let people = i64::from(sensor.people_count) + rng.gen_range(-5..15);
            sensor.people_count = people.max(0) as u32;
            sensor.signal = walk(sensor.signal, rng.gen_range(-5..5));
            sensor.status = if previous_battery < LOW_BATTERY {
                SensorStatus::Warning
            } else {
                SensorStatus::Online
            };
        }
        tracing::debug!(sensors = self.sensors.len(), "refreshed sensor readings");
    }

    pub fn add<R: Rng + ?Sized>(
        &mut self,
        new_sensor: NewSensor,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<&Sensor, SensorError> {
        let name = new_sensor.name.trim();
        let location = new_sensor.location.trim();
        if name.is_empty() || location.is_empty() {
            return Err(SensorError::MissingField);
        }

        // Random starting number, then the next free one after it.
        let start = rng.gen_range(0..ID_SPACE);
        let id = (0..ID_SPACE)
            .map(|offset| format!("sensor-{:03}", (start + offset) % ID_SPACE))
            .find(|candidate| self.position(candidate).is_none())
            .ok_or(SensorError::Full(ID_SPACE))?;

        self.sensors.push(Sensor {
            id,
            name: name.to_string(),
            kind: new_sensor.kind,
            status: SensorStatus::Online,
            battery: new_sensor.battery.min(100),
            last_reading: now,
            temperature: f32::from(rng.gen_range(20u8..30)),
            humidity: rng.gen_range(40..70),
            people_count: rng.gen_range(0..100),
            signal: new_sensor.signal.min(100),
            location: location.to_string(),
            maintenance: (now + Duration::days(MAINTENANCE_INTERVAL_DAYS)).date_naive(),
        });
        let added = &self.sensors[self.sensors.len() - 1];
        tracing::info!(id = %added.id, name = %added.name, "added sensor");
        Ok(added)
    }

    pub fn remove(&mut self, id: &str) -> Result<Sensor, SensorError> {
        let index = self.position(id).ok_or_else(|| SensorError::NotFound(id.to_string()))?;
        Ok(self.sensors.remove(index))
    }

    /// Switches a sensor between offline and online.
    pub fn toggle(&mut self, id: &str, now: DateTime<Utc>) -> Result<&Sensor, SensorError> {
        let sensor = self.get_mut(id)?;
        if sensor.status == SensorStatus::Offline {
            sensor.status = SensorStatus::Online;
            sensor.signal = RESTORED_SIGNAL;
            sensor.last_reading = now;
        } else {
            sensor.status = SensorStatus::Offline;
            sensor.signal = 0;
        }
        Ok(sensor)
    }

    pub fn adjust_signal(&mut self, id: &str, value: u8, now: DateTime<Utc>) -> Result<&Sensor, SensorError> {
        if value > 100 {
            return Err(SensorError::InvalidSignal(value));
        }
        let sensor = self.get_mut(id)?;
        if value == 0 {
            sensor.status = SensorStatus::Offline;
        } else if value < LOW_SIGNAL {
            sensor.status = SensorStatus::Warning;
        } else if sensor.status == SensorStatus::Offline {
            sensor.status = SensorStatus::Online;
        }
        sensor.signal = value;
        if sensor.status == SensorStatus::Online {
            sensor.last_reading = now;
        }
        Ok(sensor)
    }

    /// Sensors with the given status, or all of them.
    pub fn filter(&self, status: Option<SensorStatus>) -> Vec<&Sensor> {
        self.sensors
            .iter()
            .filter(|sensor| status.is_none_or(|wanted| sensor.status == wanted))
            .collect()
    }

    pub fn stats(&self) -> SensorStats {
        let count = |status| self.sensors.iter().filter(|s| s.status == status).count();
        SensorStats {
            total: self.sensors.len(),
            online: count(SensorStatus::Online),
            warning: count(SensorStatus::Warning),
            offline: count(SensorStatus::Offline),
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.sensors.iter().position(|sensor| sensor.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Sensor, SensorError> {
        self.sensors
            .iter_mut()
            .find(|sensor| sensor.id == id)
            .ok_or_else(|| SensorError::NotFound(id.to_string()))
    }
}

fn walk(value: u8, delta: i16) -> u8 {
    (i16::from(value) + delta).clamp(0, 100) as u8
}
