// packages/engine/src/simulation/backend.rs
//! Where a dashboard session reads cars and events and writes new events
//!
//! The session talks to the Events API over HTTP in production
//! ([`crate::api::client::EventsClient`]); the store itself implements the
//! same trait for in-process use.

use crate::store::{Car, DrivingEvent, EventStore, NewDrivingEvent};
use crate::utils::errors::Result;
use async_trait::async_trait;

#[async_trait]
pub trait EventsBackend: Send + Sync + 'static {
    async fn list_cars(&self) -> Result<Vec<Car>>;

    /// Events of one car, oldest first
    async fn events_for_car(&self, car_id: i64) -> Result<Vec<DrivingEvent>>;

    async fn create_event(&self, event: &NewDrivingEvent) -> Result<DrivingEvent>;
}

#[async_trait]
impl EventsBackend for EventStore {
    async fn list_cars(&self) -> Result<Vec<Car>> {
        EventStore::list_cars(self).await
    }

    async fn events_for_car(&self, car_id: i64) -> Result<Vec<DrivingEvent>> {
        self.list_events_for_car(car_id).await
    }

    async fn create_event(&self, event: &NewDrivingEvent) -> Result<DrivingEvent> {
        self.insert_event(event).await
    }
}
