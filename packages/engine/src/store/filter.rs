// packages/engine/src/store/filter.rs
//! Search filters for `driving_events`
//!
//! Each optional filter maps to exactly one predicate fragment. The paged
//! query and the count query are both built from the same [`Predicate`], so
//! the reported total always describes the rows the pages are cut from.

use crate::store::event_store::encode_timestamp;
use crate::store::models::EventType;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;

/// Column list shared by every event query
pub(crate) const EVENT_COLUMNS: &str = "id, car_id, event_type, initial_speed, final_speed, \
     acceleration_percentage, duration_seconds, fuel_consumed, distance_traveled, \
     start_time, end_time";

/// Optional event filters, ANDed together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub car_id: Option<i64>,
    pub event_type: Option<EventType>,

    /// Events starting at or after this instant
    pub start_after: Option<DateTime<Utc>>,

    /// Events ending at or before this instant
    pub end_before: Option<DateTime<Utc>>,

    pub min_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub min_fuel: Option<f64>,
    pub max_fuel: Option<f64>,
}

/// A single `column op ?` condition with its bound value
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub sql: &'static str,
    pub value: Value,
}

impl Fragment {
    fn new(sql: &'static str, value: Value) -> Self {
        Self { sql, value }
    }
}

/// A rendered `WHERE` clause plus its positional parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    pub clause: String,
    pub params: Vec<Value>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn car(mut self, car_id: i64) -> Self {
        self.car_id = Some(car_id);
        self
    }

    pub fn event_type(mut self, event_type: EventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    pub fn started_after(mut self, at: DateTime<Utc>) -> Self {
        self.start_after = Some(at);
        self
    }

    pub fn ended_before(mut self, at: DateTime<Utc>) -> Self {
        self.end_before = Some(at);
        self
    }

    pub fn final_speed_between(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_speed = min;
        self.max_speed = max;
        self
    }

    pub fn fuel_between(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_fuel = min;
        self.max_fuel = max;
        self
    }

    /// Whether no filter is set
    pub fn is_empty(&self) -> bool {
        self.fragments().is_empty()
    }

    /// Conditions for every filter that is set, in a fixed order
    pub fn fragments(&self) -> Vec<Fragment> {
        let mut fragments = Vec::new();

        if let Some(car_id) = self.car_id {
            fragments.push(Fragment::new("car_id = ?", Value::Integer(car_id)));
        }
        if let Some(event_type) = self.event_type {
            fragments.push(Fragment::new(
                "event_type = ?",
                Value::Text(event_type.as_str().to_string()),
            ));
        }
        if let Some(at) = self.start_after {
            fragments.push(Fragment::new("start_time >= ?", Value::Text(encode_timestamp(&at))));
        }
        if let Some(at) = self.end_before {
            fragments.push(Fragment::new("end_time <= ?", Value::Text(encode_timestamp(&at))));
        }
        if let Some(min) = self.min_speed {
            fragments.push(Fragment::new("final_speed >= ?", Value::Real(min)));
        }
        if let Some(max) = self.max_speed {
            fragments.push(Fragment::new("final_speed <= ?", Value::Real(max)));
        }
        if let Some(min) = self.min_fuel {
            fragments.push(Fragment::new("fuel_consumed >= ?", Value::Real(min)));
        }
        if let Some(max) = self.max_fuel {
            fragments.push(Fragment::new("fuel_consumed <= ?", Value::Real(max)));
        }

        fragments
    }

    /// Render the filter as a `WHERE` clause (empty when no filter is set)
    pub fn predicate(&self) -> Predicate {
        let fragments = self.fragments();
        if fragments.is_empty() {
            return Predicate::default();
        }

        let clause = format!(
            " WHERE {}",
            fragments
                .iter()
                .map(|f| f.sql)
                .collect::<Vec<_>>()
                .join(" AND ")
        );
        let params = fragments.into_iter().map(|f| f.value).collect();

        Predicate { clause, params }
    }
}

impl Predicate {
    /// `SELECT COUNT(*)` over the predicate
    pub fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) FROM driving_events{}", self.clause)
    }

    /// Newest-first page over the predicate; binds LIMIT and OFFSET last
    pub fn page_sql(&self) -> String {
        format!(
            "SELECT {} FROM driving_events{} ORDER BY start_time DESC, id DESC LIMIT ? OFFSET ?",
            EVENT_COLUMNS, self.clause
        )
    }

    /// Parameters for [`Predicate::page_sql`]
    pub fn page_params(&self, limit: u32, offset: u64) -> Vec<Value> {
        let mut params = self.params.clone();
        params.push(Value::Integer(limit as i64));
        params.push(Value::Integer(offset as i64));
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_empty_filter_has_no_clause() {
        let predicate = EventFilter::new().predicate();
        assert!(predicate.clause.is_empty());
        assert!(predicate.params.is_empty());
        assert_eq!(predicate.count_sql(), "SELECT COUNT(*) FROM driving_events");
    }

    #[test]
    fn test_each_filter_maps_to_one_fragment() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

        let cases = vec![
            (EventFilter::new().car(3), "car_id = ?"),
            (EventFilter::new().event_type(EventType::Braking), "event_type = ?"),
            (EventFilter::new().started_after(at), "start_time >= ?"),
            (EventFilter::new().ended_before(at), "end_time <= ?"),
            (EventFilter::new().final_speed_between(Some(1.0), None), "final_speed >= ?"),
            (EventFilter::new().final_speed_between(None, Some(9.0)), "final_speed <= ?"),
            (EventFilter::new().fuel_between(Some(0.5), None), "fuel_consumed >= ?"),
            (EventFilter::new().fuel_between(None, Some(2.0)), "fuel_consumed <= ?"),
        ];

        for (filter, expected) in cases {
            let fragments = filter.fragments();
            assert_eq!(fragments.len(), 1);
            assert_eq!(fragments[0].sql, expected);
        }
    }

    #[test]
    fn test_fragments_are_anded_in_order() {
        let predicate = EventFilter::new()
            .car(1)
            .event_type(EventType::Braking)
            .final_speed_between(Some(0.0), Some(50.0))
            .predicate();

        assert_eq!(
            predicate.clause,
            " WHERE car_id = ? AND event_type = ? AND final_speed >= ? AND final_speed <= ?"
        );
        assert_eq!(
            predicate.params,
            vec![
                Value::Integer(1),
                Value::Text("braking".into()),
                Value::Real(0.0),
                Value::Real(50.0),
            ]
        );
    }

    #[test]
    fn test_count_and_page_share_clause() {
        let predicate = EventFilter::new().car(2).fuel_between(None, Some(3.0)).predicate();

        assert!(predicate.count_sql().ends_with(&predicate.clause));
        assert!(predicate.page_sql().contains(&predicate.clause));

        let params = predicate.page_params(10, 20);
        assert_eq!(params.len(), predicate.params.len() + 2);
        assert_eq!(params[params.len() - 2], Value::Integer(10));
        assert_eq!(params[params.len() - 1], Value::Integer(20));
    }
}
