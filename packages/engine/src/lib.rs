// packages/engine/src/lib.rs
//! Car Dashboard Engine Library
//!
//! Simulates a car dashboard driving acceleration and braking maneuvers for
//! a virtual vehicle, records every completed maneuver through a small
//! Events API, and replays recorded sessions.
//!
//! # Architecture
//!
//! - **store**: SQLite persistence for cars and driving events
//! - **api**: Events API server, handlers and HTTP client
//! - **simulation**: dashboard state machine, keyboard chords, timers, replay
//! - **history**: tabular rendering of event searches
//! - **observability**: tracing and Prometheus metrics
//! - **utils**: configuration and error types

pub mod api;
pub mod history;
pub mod observability;
pub mod simulation;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use api::{ApiServer, EventsClient};
pub use simulation::{DashboardSession, DashboardSnapshot, SimulationState};
pub use store::EventStore;
pub use utils::config::EngineConfig;
pub use utils::errors::{EngineError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
