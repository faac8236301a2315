// packages/engine/src/history.rs
//! History view
//!
//! Renders one page of a filtered event search as a table.

use crate::store::event_store::EventPage;
use crate::store::models::{Car, DrivingEvent, EventType};
use chrono::SecondsFormat;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

const HEADER: [&str; 10] = [
    "Car",
    "Type",
    "Initial speed",
    "Final speed",
    "Percentage",
    "Duration",
    "Fuel",
    "Distance",
    "Start",
    "End",
];

pub fn car_name(cars: &[Car], car_id: i64) -> &str {
    cars.iter()
        .find(|c| c.id == car_id)
        .map(|c| c.name.as_str())
        .unwrap_or("Unknown")
}

pub fn format_duration(seconds: f64) -> String {
    format!("{:.2}s", finite_or_zero(seconds))
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn event_label(event_type: EventType) -> &'static str {
    match event_type {
        EventType::Acceleration => "Acceleration",
        EventType::Braking => "Braking",
    }
}

/// Table cells for one event
pub fn event_row(cars: &[Car], event: &DrivingEvent) -> Vec<String> {
    vec![
        car_name(cars, event.car_id).to_string(),
        event_label(event.event_type).to_string(),
        format!("{:.1} km/h", finite_or_zero(event.initial_speed)),
        format!("{:.1} km/h", finite_or_zero(event.final_speed)),
        format!("{}%", event.acceleration_percentage),
        format_duration(event.duration_seconds),
        format!("{:.2} L", finite_or_zero(event.fuel_consumed)),
        format!("{:.4} km", finite_or_zero(event.distance_traveled)),
        event.start_time.to_rfc3339_opts(SecondsFormat::Secs, true),
        event.end_time.to_rfc3339_opts(SecondsFormat::Secs, true),
    ]
}

/// Render a page of events with its paging footer
pub fn render_page(cars: &[Car], page: &EventPage) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(HEADER.to_vec());

    if page.events.is_empty() {
        table.add_row(vec!["No events found"]);
    }
    for event in &page.events {
        table.add_row(event_row(cars, event));
    }

    format!(
        "{table}\nPage {} of {} ({} events)",
        page.page,
        page.pages.max(1),
        page.total
    )
}
