// packages/engine/src/api/server.rs
//! Events API HTTP server
//!
//! Routes:
//!
//! ```text
//! GET  /api/cars             → Car[]
//! GET  /api/events/search    → { events, total, page, pages }
//! GET  /api/events/:carId    → DrivingEvent[] (oldest first)
//! POST /api/events           → DrivingEvent
//! OPTIONS *                  → 204 (CORS preflight)
//! ```
//!
//! Every response allows any origin.

use crate::api::handlers::{self, json_response, ApiState};
use crate::store::event_store::EventStore;
use crate::utils::config::EngineConfig;
use crate::utils::errors::{EngineError, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// A resolved route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Preflight,
    ListCars,
    SearchEvents,
    EventsForCar(String),
    CreateEvent,
    NotFound,
}

impl Route {
    pub fn resolve(method: &Method, path: &str) -> Self {
        if method == Method::OPTIONS {
            return Route::Preflight;
        }

        let segments: Vec<&str> = path.trim_end_matches('/').split('/').skip(1).collect();
        match (method, segments.as_slice()) {
            (&Method::GET, ["api", "cars"]) => Route::ListCars,
            (&Method::GET, ["api", "events", "search"]) => Route::SearchEvents,
            (&Method::GET, ["api", "events", car_id]) if !car_id.is_empty() => {
                Route::EventsForCar(car_id.to_string())
            }
            (&Method::POST, ["api", "events"]) => Route::CreateEvent,
            _ => Route::NotFound,
        }
    }

    /// Low-cardinality label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            Route::Preflight => "preflight",
            Route::ListCars => "list_cars",
            Route::SearchEvents => "search_events",
            Route::EventsForCar(_) => "events_for_car",
            Route::CreateEvent => "create_event",
            Route::NotFound => "not_found",
        }
    }
}

/// Events API server bound to a listener
pub struct ApiServer {
    state: Arc<ApiState>,
    listener: TcpListener,
}

impl ApiServer {
    /// Bind the configured address
    pub async fn bind(config: &EngineConfig, store: Arc<EventStore>) -> Result<Self> {
        Self::bind_addr(config.listen_addr()?, config, store).await
    }

    /// Bind an explicit address (port 0 picks a free one)
    pub async fn bind_addr(
        addr: SocketAddr,
        config: &EngineConfig,
        store: Arc<EventStore>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| EngineError::ServerFailed(format!("Failed to bind {}: {}", addr, e)))?;

        Ok(Self {
            state: Arc::new(ApiState::new(store, config.api.clone())),
            listener,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| EngineError::ServerFailed(format!("Failed to read local address: {}", e)))
    }

    /// Serve until Ctrl-C
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve until `shutdown` completes; open connections finish on their own
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let addr = self.local_addr()?;
        info!("Events API listening on http://{}", addr);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down Events API");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let state = Arc::clone(&self.state);

                        tokio::spawn(async move {
                            debug!("Accepted connection from {}", peer);

                            let io = TokioIo::new(stream);

                            let service = service_fn(move |req| {
                                let state = Arc::clone(&state);
                                async move { Ok::<_, Infallible>(handle_request(&state, req).await) }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                debug!("Connection error from {}: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                }
            }
        }
    }
}

/// Route one request and decorate the response
pub async fn handle_request(state: &ApiState, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let started = Instant::now();
    let method = req.method().clone();
    let route = Route::resolve(&method, req.uri().path());
    let query = req.uri().query().map(str::to_string);

    debug!("{} {} -> {}", method, req.uri(), route.label());

    let mut response = match &route {
        Route::Preflight => preflight(),
        Route::ListCars => handlers::list_cars(state).await,
        Route::SearchEvents => handlers::search_events(state, query.as_deref()).await,
        Route::EventsForCar(car_id) => handlers::events_for_car(state, car_id).await,
        Route::CreateEvent => match req.into_body().collect().await {
            Ok(body) => handlers::create_event(state, &body.to_bytes()).await,
            Err(e) => json_response(
                StatusCode::BAD_REQUEST,
                &json!({ "error": format!("Failed to read body: {}", e) }),
            ),
        },
        Route::NotFound => json_response(StatusCode::NOT_FOUND, &json!({ "error": "Not found" })),
    };

    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));

    let status = response.status();
    metrics::counter!(
        "dashboard_http_requests_total",
        "route" => route.label(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    metrics::histogram!("dashboard_http_request_duration_seconds", "route" => route.label())
        .record(started.elapsed().as_secs_f64());

    debug!("{} {} -> {}", method, route.label(), status);
    response
}

fn preflight() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}
