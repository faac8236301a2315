// packages/engine/src/store/mod.rs
//! Event store
//!
//! - **Models**: `Car` reference rows and `DrivingEvent` records
//! - **Filter**: optional search filters rendered to one shared predicate
//! - **Event Store**: SQLite persistence behind an async mutex
//!
//! ```text
//! EventFilter → Predicate ─┬─ SELECT COUNT(*) ... WHERE ...      → total
//!                          └─ SELECT ... WHERE ... ORDER BY ...  → page
//! ```

pub mod event_store;
pub mod filter;
pub mod models;

pub use event_store::{EventPage, EventStore, StoreStats};
pub use filter::{EventFilter, Predicate};
pub use models::{Car, DrivingEvent, EventType, NewCar, NewDrivingEvent};
