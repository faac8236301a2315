// packages/engine/src/store/event_store.rs
//! SQLite-backed event store
//!
//! Holds the `cars` reference table and the append-only `driving_events`
//! table. Events are inserted once and never updated or deleted.

use crate::store::filter::{EventFilter, EVENT_COLUMNS};
use crate::store::models::{
    default_cars, Car, DrivingEvent, NewCar, NewDrivingEvent, DEFAULT_BRAKING_CAPACITY,
};
use crate::utils::config::DatabaseConfig;
use crate::utils::errors::{EngineError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, ValueRef};
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS cars (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        model TEXT NOT NULL,
        max_speed REAL NOT NULL,
        acceleration_capacity REAL NOT NULL,
        fuel_consumption_rate REAL NOT NULL,
        braking_capacity REAL
    );

    CREATE TABLE IF NOT EXISTS driving_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        car_id INTEGER NOT NULL REFERENCES cars(id),
        event_type TEXT NOT NULL CHECK (event_type IN ('acceleration', 'braking')),
        initial_speed REAL NOT NULL,
        final_speed REAL NOT NULL,
        acceleration_percentage INTEGER NOT NULL DEFAULT 0,
        duration_seconds REAL NOT NULL,
        fuel_consumed REAL NOT NULL,
        distance_traveled REAL NOT NULL,
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_events_car_start ON driving_events(car_id, start_time);
    CREATE INDEX IF NOT EXISTS idx_events_start ON driving_events(start_time);
"#;

const CAR_COLUMNS: &str =
    "id, name, model, max_speed, acceleration_capacity, fuel_consumption_rate, braking_capacity";

/// Encode a timestamp so that text order matches chronological order
pub(crate) fn encode_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a numeric column, coercing text and NULL (anything unparsable is 0)
fn numeric(row: &Row<'_>, idx: usize) -> rusqlite::Result<f64> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(i) => i as f64,
        ValueRef::Real(f) => f,
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|f| f.is_finite())
            .unwrap_or(0.0),
        ValueRef::Null | ValueRef::Blob(_) => 0.0,
    })
}

fn integer(row: &Row<'_>, idx: usize) -> rusqlite::Result<i64> {
    numeric(row, idx).map(|f| f.trunc() as i64)
}

fn car_from_row(row: &Row<'_>) -> rusqlite::Result<Car> {
    let braking_capacity = match row.get_ref(6)? {
        ValueRef::Null => DEFAULT_BRAKING_CAPACITY,
        _ => numeric(row, 6)?,
    };

    Ok(Car {
        id: row.get(0)?,
        name: row.get(1)?,
        model: row.get(2)?,
        max_speed: numeric(row, 3)?,
        acceleration_capacity: numeric(row, 4)?,
        fuel_consumption_rate: numeric(row, 5)?,
        braking_capacity,
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<DrivingEvent> {
    let event_type: String = row.get(2)?;
    let event_type = event_type
        .parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.into()))?;

    Ok(DrivingEvent {
        id: row.get(0)?,
        car_id: row.get(1)?,
        event_type,
        initial_speed: numeric(row, 3)?,
        final_speed: numeric(row, 4)?,
        acceleration_percentage: integer(row, 5)?,
        duration_seconds: numeric(row, 6)?,
        fuel_consumed: numeric(row, 7)?,
        distance_traveled: numeric(row, 8)?,
        start_time: decode_timestamp(row, 9)?,
        end_time: decode_timestamp(row, 10)?,
    })
}

fn storage_err(context: &str) -> impl FnOnce(rusqlite::Error) -> EngineError + '_ {
    move |e| EngineError::StorageFailed(format!("{}: {}", context, e))
}

/// One page of a filtered event search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPage {
    pub events: Vec<DrivingEvent>,
    pub total: u64,
    pub page: u32,
    pub pages: u64,
}

impl EventPage {
    /// Shape returned when a search cannot be served
    pub fn empty() -> Self {
        Self {
            events: Vec::new(),
            total: 0,
            page: 1,
            pages: 1,
        }
    }
}

/// Row counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub cars: u64,
    pub events: u64,
}

/// Event store
pub struct EventStore {
    db: Arc<Mutex<Connection>>,
}

impl EventStore {
    /// Open (or create) the store described by `config`
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        let conn = if config.path.as_os_str() == ":memory:" {
            Connection::open_in_memory()
        } else {
            if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    EngineError::StorageFailed(format!("Failed to create directory: {}", e))
                })?;
            }
            Connection::open(&config.path)
        }
        .map_err(storage_err("Failed to open database"))?;

        let store = Self::from_connection(conn).await?;

        if config.seed_default_cars {
            store.seed_default_cars().await?;
        }

        info!("Event store initialized at {:?}", config.path);

        Ok(store)
    }

    /// Empty in-memory store with the schema applied and no cars
    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err("Failed to open database"))?;
        Self::from_connection(conn).await
    }

    async fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(storage_err("Failed to enable foreign keys"))?;

        let store = Self {
            db: Arc::new(Mutex::new(conn)),
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        let db = self.db.lock().await;
        db.execute_batch(SCHEMA)
            .map_err(storage_err("Schema creation failed"))?;
        Ok(())
    }

    /// Drop both tables and recreate an empty schema
    pub async fn reset_schema(&self) -> Result<()> {
        {
            let db = self.db.lock().await;
            db.execute_batch("DROP TABLE IF EXISTS driving_events; DROP TABLE IF EXISTS cars;")
                .map_err(storage_err("Failed to drop tables"))?;
        }
        info!("Event store schema reset");
        self.init_schema().await
    }

    /// Insert the default catalogue if no car exists yet; returns how many were added
    pub async fn seed_default_cars(&self) -> Result<usize> {
        if self.stats().await?.cars > 0 {
            return Ok(0);
        }

        let cars = default_cars();
        let count = cars.len();
        for car in cars {
            self.insert_car(&car).await?;
        }

        info!("Seeded {} default cars", count);
        Ok(count)
    }

    pub async fn insert_car(&self, car: &NewCar) -> Result<Car> {
        let db = self.db.lock().await;
        db.execute(
            r#"
            INSERT INTO cars (name, model, max_speed, acceleration_capacity, fuel_consumption_rate, braking_capacity)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                car.name,
                car.model,
                car.max_speed,
                car.acceleration_capacity,
                car.fuel_consumption_rate,
                car.braking_capacity,
            ],
        )
        .map_err(storage_err("Failed to insert car"))?;

        let id = db.last_insert_rowid();
        db.query_row(
            &format!("SELECT {} FROM cars WHERE id = ?", CAR_COLUMNS),
            params![id],
            car_from_row,
        )
        .map_err(storage_err("Failed to read inserted car"))
    }

    /// All cars, by id
    pub async fn list_cars(&self) -> Result<Vec<Car>> {
        let db = self.db.lock().await;
        let mut stmt = db
            .prepare(&format!("SELECT {} FROM cars ORDER BY id", CAR_COLUMNS))
            .map_err(storage_err("Query preparation failed"))?;

        let cars = stmt
            .query_map([], car_from_row)
            .map_err(storage_err("Query execution failed"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_err("Result collection failed"))?;

        Ok(cars)
    }

    /// Persist an event and return the stored row
    pub async fn insert_event(&self, event: &NewDrivingEvent) -> Result<DrivingEvent> {
        let db = self.db.lock().await;
        db.execute(
            r#"
            INSERT INTO driving_events
                (car_id, event_type, initial_speed, final_speed, acceleration_percentage,
                 duration_seconds, fuel_consumed, distance_traveled, start_time, end_time)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                event.car_id,
                event.event_type.as_str(),
                event.initial_speed,
                event.final_speed,
                event.acceleration_percentage,
                event.duration_seconds,
                event.fuel_consumed,
                event.distance_traveled,
                encode_timestamp(&event.start_time),
                encode_timestamp(&event.end_time),
            ],
        )
        .map_err(storage_err("Failed to insert event"))?;

        let id = db.last_insert_rowid();
        debug!("Stored {} event {} for car {}", event.event_type, id, event.car_id);

        db.query_row(
            &format!("SELECT {} FROM driving_events WHERE id = ?", EVENT_COLUMNS),
            params![id],
            event_from_row,
        )
        .map_err(storage_err("Failed to read inserted event"))
    }

    /// Every event of a car, oldest first
    pub async fn list_events_for_car(&self, car_id: i64) -> Result<Vec<DrivingEvent>> {
        let db = self.db.lock().await;
        let mut stmt = db
            .prepare(&format!(
                "SELECT {} FROM driving_events WHERE car_id = ? ORDER BY start_time ASC, id ASC",
                EVENT_COLUMNS
            ))
            .map_err(storage_err("Query preparation failed"))?;

        let events = stmt
            .query_map(params![car_id], event_from_row)
            .map_err(storage_err("Query execution failed"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_err("Result collection failed"))?;

        Ok(events)
    }

    /// Newest-first page of events matching `filter`
    ///
    /// `page` and `limit` must both be at least 1.
    pub async fn search_events(
        &self,
        filter: &EventFilter,
        page: u32,
        limit: u32,
    ) -> Result<EventPage> {
        let page = page.max(1);
        let limit = limit.max(1);
        let predicate = filter.predicate();
        let offset = (page as u64 - 1) * limit as u64;

        let db = self.db.lock().await;

        let total: i64 = db
            .query_row(
                &predicate.count_sql(),
                params_from_iter(predicate.params.iter()),
                |row| row.get(0),
            )
            .map_err(storage_err("Count query failed"))?;

        let mut stmt = db
            .prepare(&predicate.page_sql())
            .map_err(storage_err("Query preparation failed"))?;

        let events = stmt
            .query_map(
                params_from_iter(predicate.page_params(limit, offset).iter()),
                event_from_row,
            )
            .map_err(storage_err("Query execution failed"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_err("Result collection failed"))?;

        let total = total.max(0) as u64;
        debug!(
            "Search matched {} events, returning {} (page {})",
            total,
            events.len(),
            page
        );

        Ok(EventPage {
            events,
            total,
            page,
            pages: total.div_ceil(limit as u64),
        })
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let db = self.db.lock().await;

        let cars: i64 = db
            .query_row("SELECT COUNT(*) FROM cars", [], |row| row.get(0))
            .map_err(storage_err("Count query failed"))?;
        let events: i64 = db
            .query_row("SELECT COUNT(*) FROM driving_events", [], |row| row.get(0))
            .map_err(storage_err("Count query failed"))?;

        Ok(StoreStats {
            cars: cars as u64,
            events: events as u64,
        })
    }
}
