// packages/engine/src/api/handlers.rs
//! Events API request handlers
//!
//! Handlers never fail: every outcome, including storage errors, is turned
//! into a JSON response here so the server loop only deals with routing.

use crate::api::query::{parse_date, SearchParams};
use crate::store::event_store::{EventPage, EventStore};
use crate::store::models::{EventType, NewDrivingEvent};
use crate::utils::config::ApiConfig;
use crate::utils::errors::{EngineError, Result};
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Shared state behind every handler
pub struct ApiState {
    pub store: Arc<EventStore>,
    pub api: ApiConfig,
}

impl ApiState {
    pub fn new(store: Arc<EventStore>, api: ApiConfig) -> Self {
        Self { store, api }
    }
}

/// Serialize `body` as a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let (status, bytes) = match serde_json::to_vec(body) {
        Ok(bytes) => (status, bytes),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                br#"{"error":"Server error"}"#.to_vec(),
            )
        }
    };

    let mut response = Response::new(Full::new(Bytes::from(bytes)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// `{ "error": message }` with the status of `err`
pub fn error_response(err: &EngineError) -> Response<Full<Bytes>> {
    let status = err.status_code();
    let message = match err {
        EngineError::ValidationFailed(msg) | EngineError::NotFound(msg) => msg.clone(),
        other => other.to_string(),
    };
    json_response(status, &json!({ "error": message }))
}

/// `GET /api/cars`
pub async fn list_cars(state: &ApiState) -> Response<Full<Bytes>> {
    match state.store.list_cars().await {
        Ok(cars) => json_response(StatusCode::OK, &cars),
        Err(e) => {
            error!("Failed to list cars: {}", e);
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({ "error": "Server error" }),
            )
        }
    }
}

/// Body of a failed search: the error plus an empty first page
#[derive(Serialize)]
struct SearchFailure {
    error: String,
    #[serde(flatten)]
    page: EventPage,
}

/// `GET /api/events/search`
pub async fn search_events(state: &ApiState, query: Option<&str>) -> Response<Full<Bytes>> {
    let params = SearchParams::from_query(query);
    debug!("Search parameters: {:?}", params);
    let search = params.into_query(&state.api);

    match state
        .store
        .search_events(&search.filter, search.page, search.limit)
        .await
    {
        Ok(page) => json_response(StatusCode::OK, &page),
        Err(e) => {
            error!("Event search failed: {}", e);
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &SearchFailure {
                    error: e.to_string(),
                    page: EventPage::empty(),
                },
            )
        }
    }
}

/// `GET /api/events/:carId`
pub async fn events_for_car(state: &ApiState, car_id: &str) -> Response<Full<Bytes>> {
    let car_id = match car_id.parse::<i64>() {
        Ok(id) => id,
        Err(_) => {
            return error_response(&EngineError::ValidationFailed(format!(
                "Invalid car id: {}",
                car_id
            )))
        }
    };

    match state.store.list_events_for_car(car_id).await {
        Ok(events) => {
            debug!("Found {} events for car {}", events.len(), car_id);
            json_response(StatusCode::OK, &events)
        }
        Err(e) => {
            error!("Failed to load events for car {}: {}", car_id, e);
            error_response(&e)
        }
    }
}

/// `POST /api/events`
pub async fn create_event(state: &ApiState, body: &[u8]) -> Response<Full<Bytes>> {
    let event = match parse_event_payload(body) {
        Ok(event) => event,
        Err(e) => {
            warn!("Rejected event payload: {}", e);
            return error_response(&e);
        }
    };

    match state.store.insert_event(&event).await {
        Ok(stored) => {
            metrics::counter!("dashboard_events_created_total", "kind" => stored.event_type.as_str())
                .increment(1);
            info!(
                "Stored {} event {} for car {}",
                stored.event_type, stored.id, stored.car_id
            );
            json_response(StatusCode::OK, &stored)
        }
        Err(e) => {
            error!("Failed to store event: {}", e);
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({ "error": e.to_string() }),
            )
        }
    }
}

const MISSING_FIELDS: &str = "Missing required fields";

/// Decode a create-event body
///
/// Numbers may be sent as JSON numbers or numeric strings. A required field
/// that is absent, null, an empty string, or zero where zero is meaningless
/// (`car_id`, `duration_seconds`) counts as missing.
/// `acceleration_percentage` defaults to 0.
pub fn parse_event_payload(body: &[u8]) -> Result<NewDrivingEvent> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| EngineError::ValidationFailed(format!("Invalid JSON body: {}", e)))?;
    let fields = value
        .as_object()
        .ok_or_else(|| EngineError::ValidationFailed("Expected a JSON object".into()))?;

    let missing: Vec<&str> = [
        ("car_id", true),
        ("event_type", true),
        ("initial_speed", false),
        ("final_speed", false),
        ("duration_seconds", true),
        ("fuel_consumed", false),
        ("distance_traveled", false),
        ("start_time", true),
        ("end_time", true),
    ]
    .into_iter()
    .filter(|(name, zero_is_missing)| is_missing(fields.get(*name), *zero_is_missing))
    .map(|(name, _)| name)
    .collect();

    if !missing.is_empty() {
        debug!("Missing fields: {}", missing.join(", "));
        return Err(EngineError::ValidationFailed(MISSING_FIELDS.into()));
    }

    let event_type = text_field(fields, "event_type")?
        .parse::<EventType>()
        .map_err(EngineError::ValidationFailed)?;

    let acceleration_percentage = match fields.get("acceleration_percentage") {
        None | Some(Value::Null) => 0.0,
        Some(_) => number_field(fields, "acceleration_percentage")?,
    };

    Ok(NewDrivingEvent {
        car_id: number_field(fields, "car_id")? as i64,
        event_type,
        initial_speed: number_field(fields, "initial_speed")?,
        final_speed: number_field(fields, "final_speed")?,
        acceleration_percentage: acceleration_percentage.round() as i64,
        duration_seconds: number_field(fields, "duration_seconds")?,
        fuel_consumed: number_field(fields, "fuel_consumed")?,
        distance_traveled: number_field(fields, "distance_traveled")?,
        start_time: time_field(fields, "start_time")?,
        end_time: time_field(fields, "end_time")?,
    })
}

fn is_missing(value: Option<&Value>, zero_is_missing: bool) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => zero_is_missing && s.trim().is_empty(),
        Some(Value::Number(n)) => zero_is_missing && n.as_f64() == Some(0.0),
        Some(Value::Bool(b)) => zero_is_missing && !b,
        Some(_) => false,
    }
}

fn number_field(fields: &Map<String, Value>, name: &str) -> Result<f64> {
    let number = match fields.get(name) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    number
        .filter(|n| n.is_finite())
        .ok_or_else(|| EngineError::ValidationFailed(format!("Field {} must be numeric", name)))
}

fn text_field<'a>(fields: &'a Map<String, Value>, name: &str) -> Result<&'a str> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::ValidationFailed(format!("Field {} must be a string", name)))
}

fn time_field(fields: &Map<String, Value>, name: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    parse_date(text_field(fields, name)?)
        .ok_or_else(|| EngineError::ValidationFailed(format!("Field {} is not a valid date", name)))
}
