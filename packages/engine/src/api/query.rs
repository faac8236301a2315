// packages/engine/src/api/query.rs
//! Query string decoding for `GET /api/events/search`
//!
//! Every parameter is optional and arrives as text. Values that do not parse
//! are dropped instead of rejected, so a bad `minSpeed` behaves exactly like
//! an absent one.

use crate::store::filter::EventFilter;
use crate::store::models::EventType;
use crate::utils::config::ApiConfig;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Raw search parameters, as sent by the history view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub car_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_speed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_speed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_fuel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fuel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
}

/// A decoded search: filters plus clamped paging
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub filter: EventFilter,
    pub page: u32,
    pub limit: u32,
}

impl SearchParams {
    /// Decode a raw query string (without the leading `?`)
    ///
    /// Unknown keys are ignored and a repeated key keeps its first value;
    /// a query that cannot be decoded at all yields no parameters.
    pub fn from_query(query: Option<&str>) -> Self {
        let Some(query) = query.filter(|q| !q.is_empty()) else {
            return Self::default();
        };

        let pairs: Vec<(String, String)> = match serde_urlencoded::from_str(query) {
            Ok(pairs) => pairs,
            Err(e) => {
                debug!("Ignoring undecodable query string {:?}: {}", query, e);
                return Self::default();
            }
        };

        let mut first_values = serde_json::Map::new();
        for (key, value) in pairs {
            first_values.entry(key).or_insert(Value::String(value));
        }

        serde_json::from_value(Value::Object(first_values)).unwrap_or_else(|e| {
            debug!("Ignoring undecodable query string {:?}: {}", query, e);
            Self::default()
        })
    }

    /// Encode back into a query string
    pub fn to_query(&self) -> String {
        serde_urlencoded::to_string(self).unwrap_or_default()
    }

    /// Coerce into a typed search, dropping anything that does not parse
    pub fn into_query(self, api: &ApiConfig) -> SearchQuery {
        let filter = EventFilter {
            car_id: parse_present(&self.car_id),
            event_type: parse_present::<EventType>(&self.event_type),
            start_after: self.start_date.as_deref().and_then(parse_date),
            end_before: self.end_date.as_deref().and_then(parse_date),
            min_speed: parse_number(&self.min_speed),
            max_speed: parse_number(&self.max_speed),
            min_fuel: parse_number(&self.min_fuel),
            max_fuel: parse_number(&self.max_fuel),
        };

        let page = parse_positive(&self.page).unwrap_or(1);
        let limit = parse_positive(&self.limit)
            .unwrap_or(api.default_page_size)
            .min(api.max_page_size);

        SearchQuery { filter, page, limit }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_present<T: std::str::FromStr>(value: &Option<String>) -> Option<T> {
    present(value).and_then(|v| v.parse().ok())
}

fn parse_number(value: &Option<String>) -> Option<f64> {
    parse_present::<f64>(value).filter(|v| v.is_finite())
}

fn parse_positive(value: &Option<String>) -> Option<u32> {
    parse_present::<u32>(value).filter(|v| *v >= 1)
}

/// Parse a date filter
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM[:SS]` (taken as UTC) and a bare
/// `YYYY-MM-DD` (midnight UTC).
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(at) = NaiveDateTime::parse_from_str(value, format) {
            return Some(at.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn api() -> ApiConfig {
        ApiConfig::default()
    }

    #[test]
    fn test_empty_query_uses_defaults() {
        let query = SearchParams::from_query(None).into_query(&api());
        assert!(query.filter.is_empty());
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 10);
    }

    #[test]
    fn test_full_query() {
        let params = SearchParams::from_query(Some(
            "carId=3&eventType=braking&startDate=2024-01-01&endDate=2024-01-31T18:30\
             &minSpeed=0&maxSpeed=50&minFuel=0.5&maxFuel=2&page=2&limit=20",
        ));
        let query = params.into_query(&api());

        assert_eq!(query.filter.car_id, Some(3));
        assert_eq!(query.filter.event_type, Some(EventType::Braking));
        assert_eq!(
            query.filter.start_after,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            query.filter.end_before,
            Some(Utc.with_ymd_and_hms(2024, 1, 31, 18, 30, 0).unwrap())
        );
        assert_eq!(query.filter.min_speed, Some(0.0));
        assert_eq!(query.filter.max_speed, Some(50.0));
        assert_eq!(query.filter.min_fuel, Some(0.5));
        assert_eq!(query.filter.max_fuel, Some(2.0));
        assert_eq!((query.page, query.limit), (2, 20));
    }

    #[test]
    fn test_invalid_values_are_ignored() {
        let params = SearchParams::from_query(Some(
            "carId=abc&eventType=drifting&startDate=yesterday&minSpeed=fast&maxFuel=&page=-2&limit=0",
        ));
        let query = params.into_query(&api());

        assert!(query.filter.is_empty());
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 10);
    }

    #[test]
    fn test_limit_is_capped() {
        let query = SearchParams::from_query(Some("limit=5000")).into_query(&api());
        assert_eq!(query.limit, 100);
    }

    #[test]
    fn test_repeated_key_keeps_first_value() {
        let query = SearchParams::from_query(Some("carId=1&eventType=braking&carId=2&unknown=x"))
            .into_query(&api());

        assert_eq!(query.filter.car_id, Some(1));
        assert_eq!(query.filter.event_type, Some(EventType::Braking));
    }

    #[test]
    fn test_date_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        assert_eq!(parse_date("2024-03-05T14:07:09Z"), Some(expected));
        assert_eq!(parse_date("2024-03-05T16:07:09+02:00"), Some(expected));
        assert_eq!(parse_date("2024-03-05T14:07:09"), Some(expected));
        assert_eq!(
            parse_date("2024-03-05T14:07"),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 0).unwrap())
        );
        assert_eq!(parse_date("03/05/2024"), None);
    }

    #[test]
    fn test_query_round_trip_skips_unset() {
        let params = SearchParams {
            car_id: Some("2".into()),
            page: Some("3".into()),
            ..Default::default()
        };
        assert_eq!(params.to_query(), "carId=2&page=3");
        assert_eq!(SearchParams::from_query(Some(&params.to_query())), params);
    }
}
