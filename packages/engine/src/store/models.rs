// packages/engine/src/store/models.rs
//! Rows of the `cars` and `driving_events` tables

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Braking capacity assumed for cars that do not declare one (km/h per second)
pub const DEFAULT_BRAKING_CAPACITY: f64 = 10.0;

/// A virtual vehicle; reference data, never written by the simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub id: i64,
    pub name: String,
    pub model: String,

    /// km/h
    pub max_speed: f64,

    /// km/h gained per second at 100% throttle
    pub acceleration_capacity: f64,

    /// Fuel percentage burned per second at 100% throttle
    pub fuel_consumption_rate: f64,

    /// km/h shed per second at 100% braking
    pub braking_capacity: f64,
}

/// Kind of maneuver a driving event records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Acceleration,
    Braking,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Acceleration => "acceleration",
            EventType::Braking => "braking",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "acceleration" => Ok(EventType::Acceleration),
            "braking" => Ok(EventType::Braking),
            other => Err(format!("unknown event type: {}", other)),
        }
    }
}

/// A persisted acceleration or braking event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrivingEvent {
    pub id: i64,
    pub car_id: i64,
    pub event_type: EventType,
    pub initial_speed: f64,
    pub final_speed: f64,
    pub acceleration_percentage: i64,
    pub duration_seconds: f64,
    pub fuel_consumed: f64,
    pub distance_traveled: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// A driving event that has not been stored yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDrivingEvent {
    pub car_id: i64,
    pub event_type: EventType,
    pub initial_speed: f64,
    pub final_speed: f64,
    pub acceleration_percentage: i64,
    pub duration_seconds: f64,
    pub fuel_consumed: f64,
    pub distance_traveled: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// A car that has not been stored yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCar {
    pub name: String,
    pub model: String,
    pub max_speed: f64,
    pub acceleration_capacity: f64,
    pub fuel_consumption_rate: f64,
    pub braking_capacity: Option<f64>,
}

impl NewCar {
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        max_speed: f64,
        acceleration_capacity: f64,
        fuel_consumption_rate: f64,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            max_speed,
            acceleration_capacity,
            fuel_consumption_rate,
            braking_capacity: None,
        }
    }

    pub fn with_braking(mut self, braking_capacity: f64) -> Self {
        self.braking_capacity = Some(braking_capacity);
        self
    }
}

/// Cars inserted into an empty catalogue
pub fn default_cars() -> Vec<NewCar> {
    vec![
        NewCar::new("Citadine", "Compact 1.2", 160.0, 12.0, 3.0).with_braking(15.0),
        NewCar::new("Berline", "Sedan 2.0", 210.0, 18.0, 4.5).with_braking(20.0),
        NewCar::new("Sportive", "Coupe 3.0 Turbo", 280.0, 28.0, 7.0).with_braking(30.0),
        NewCar::new("Utilitaire", "Van 2.2 Diesel", 140.0, 8.0, 5.0),
    ]
}
