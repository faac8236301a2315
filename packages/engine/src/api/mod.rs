// packages/engine/src/api/mod.rs
//! Events API
//!
//! - **Server**: hyper connection loop and routing
//! - **Handlers**: JSON in, JSON out, one function per route
//! - **Query**: lenient decoding of search parameters
//! - **Client**: the same API seen from the dashboard

pub mod client;
pub mod handlers;
pub mod query;
pub mod server;

pub use client::EventsClient;
pub use handlers::ApiState;
pub use query::{SearchParams, SearchQuery};
pub use server::{ApiServer, Route};
