//! Axum application builder.
//!
//! Routes declared here, logic in the route modules, bind configuration in
//! [`ServerConfig`].

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes::{forecasts, health, sessions};
use crate::state::ServerState;

/// Create the Axum application with all routes.
pub fn create_app(state: ServerState) -> Router {
    // Observers load from a different origin; the API surface is GET reads
    // and POST triggers with JSON bodies, nothing else.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health::health))
        // Forecasting pipeline
        .route(
            "/api/forecasts",
            post(forecasts::create_forecast).get(forecasts::list_forecasts),
        )
        .route("/api/forecasts/:id", get(forecasts::get_forecast))
        // Trading simulation
        .route("/api/sessions/run", post(sessions::run_session))
        .route("/api/sessions/:id/status", get(sessions::get_status))
        .route("/api/sessions/:id/stop", post(sessions::stop_session))
        .route("/api/sessions/:id/complete", post(sessions::complete_session))
        .route("/api/sessions/:id/orderbook", get(sessions::get_orderbook))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8001;

/// Where the HTTP server listens.
///
/// Host stays a string rather than a parsed address so a container
/// environment can hand in a hostname that binds via DNS lookup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Read `SERVER_HOST`/`SERVER_PORT`, falling back to 0.0.0.0:8001.
    /// An unparseable port falls back to the default.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("SERVER_HOST").unwrap_or_else(|_| DEFAULT_HOST.into()),
            port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DEFAULT_PORT),
        }
    }

    /// Address string for the TCP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
