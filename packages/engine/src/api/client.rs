// packages/engine/src/api/client.rs
//! Events API HTTP client
//!
//! Used by the dashboard session and the `history` command. Failed calls are
//! reported once and never retried.

use crate::api::query::SearchParams;
use crate::simulation::backend::EventsBackend;
use crate::store::event_store::EventPage;
use crate::store::models::{Car, DrivingEvent, NewDrivingEvent};
use crate::utils::errors::{EngineError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

/// Client for one Events API base URL
#[derive(Clone)]
pub struct EventsClient {
    base_url: String,
    http_client: Client<HttpConnector, Full<Bytes>>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl EventsClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        base_url
            .parse::<Uri>()
            .map_err(|e| EngineError::ConfigError(format!("Invalid API URL {}: {}", base_url, e)))?;

        let http_client = Client::builder(TokioExecutor::new()).build_http();

        Ok(Self {
            base_url,
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn list_cars(&self) -> Result<Vec<Car>> {
        self.send(Method::GET, "/api/cars", None).await
    }

    pub async fn events_for_car(&self, car_id: i64) -> Result<Vec<DrivingEvent>> {
        self.send(Method::GET, &format!("/api/events/{}", car_id), None)
            .await
    }

    pub async fn create_event(&self, event: &NewDrivingEvent) -> Result<DrivingEvent> {
        let body = serde_json::to_vec(event)
            .map_err(|e| EngineError::SerializationFailed(format!("Event encoding failed: {}", e)))?;
        self.send(Method::POST, "/api/events", Some(Bytes::from(body)))
            .await
    }

    pub async fn search_events(&self, params: &SearchParams) -> Result<EventPage> {
        let query = params.to_query();
        let path = if query.is_empty() {
            "/api/events/search".to_string()
        } else {
            format!("/api/events/search?{}", query)
        };
        self.send(Method::GET, &path, None).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
    ) -> Result<T> {
        let uri = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, uri);

        let mut builder = Request::builder().method(method.clone()).uri(&uri);
        if body.is_some() {
            builder = builder.header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        let request = builder
            .body(Full::new(body.unwrap_or_default()))
            .map_err(|e| EngineError::RequestFailed(format!("Request build error: {}", e)))?;

        let response = self
            .http_client
            .request(request)
            .await
            .map_err(|e| EngineError::RequestFailed(format!("{} {} failed: {}", method, uri, e)))?;

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| EngineError::RequestFailed(format!("Response body error: {}", e)))?
            .to_bytes();

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&bytes)
                .map(|b| b.error)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
            return Err(EngineError::RequestFailed(format!(
                "{} {} returned {}: {}",
                method, uri, status, message
            )));
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            EngineError::SerializationFailed(format!("Unexpected response from {}: {}", uri, e))
        })
    }
}

#[async_trait]
impl EventsBackend for EventsClient {
    async fn list_cars(&self) -> Result<Vec<Car>> {
        EventsClient::list_cars(self).await
    }

    async fn events_for_car(&self, car_id: i64) -> Result<Vec<DrivingEvent>> {
        EventsClient::events_for_car(self, car_id).await
    }

    async fn create_event(&self, event: &NewDrivingEvent) -> Result<DrivingEvent> {
        EventsClient::create_event(self, event).await
    }
}
