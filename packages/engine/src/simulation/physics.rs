// packages/engine/src/simulation/physics.rs
//! Linear vehicle formulas
//!
//! Speeds are km/h, durations seconds, fuel a percentage of a full tank.

use crate::store::models::Car;

/// Full tank
pub const FULL_TANK: f64 = 100.0;

/// Seconds per hour, for km/h × s → km
const SECS_PER_HOUR: f64 = 3600.0;

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Speed reached after accelerating at `percentage` for `duration` seconds
pub fn acceleration_final_speed(car: &Car, current_speed: f64, percentage: u8, duration: f64) -> f64 {
    let increase = car.acceleration_capacity * percentage as f64 * duration / 100.0;
    car.max_speed.min(current_speed + increase)
}

/// Fuel burned by accelerating at `percentage` for `duration` seconds
pub fn fuel_consumption(car: &Car, percentage: u8, duration: f64) -> f64 {
    car.fuel_consumption_rate * percentage as f64 / 100.0 * duration
}

/// Speed reached after braking at `percentage` for `duration` seconds,
/// rounded to 2 decimals
pub fn braking_final_speed(car: &Car, current_speed: f64, percentage: u8, duration: f64) -> f64 {
    let reduction = car.braking_capacity * percentage as f64 * duration / 100.0;
    round_to((current_speed - reduction).max(0.0), 2)
}

/// Distance covered at the average of both speeds, in km rounded to 4 decimals
pub fn distance_km(initial_speed: f64, final_speed: f64, duration_secs: f64) -> f64 {
    let average = (initial_speed + final_speed) / 2.0;
    round_to(average * duration_secs / SECS_PER_HOUR, 4)
}

/// Fuel left after burning `consumed`, never below empty
pub fn deduct_fuel(level: f64, consumed: f64) -> f64 {
    (level - consumed).clamp(0.0, FULL_TANK)
}

/// Command percentage for a digit key (1–9 → 10–90, 0 → 100)
pub fn percentage_for_digit(digit: u8) -> Option<u8> {
    match digit {
        0 => Some(100),
        1..=9 => Some(digit * 10),
        _ => None,
    }
}

/// Whether `percentage` is a valid command (10–100 in steps of 10)
pub fn is_valid_percentage(percentage: u8) -> bool {
    (10..=100).contains(&percentage) && percentage % 10 == 0
}
