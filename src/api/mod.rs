//! HTTP serving layer

pub mod error;
pub mod routes;

use crate::config::ServiceInfo;
use crate::models::FraudDetector;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Application state shared across handlers.
///
/// Can only be built from a loaded detector, so a router never exists
/// before the model is ready.
#[derive(Clone)]
pub struct AppState {
    detector: Arc<FraudDetector>,
    info: Arc<ServiceInfo>,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(detector: FraudDetector, info: ServiceInfo) -> Self {
        Self {
            detector: Arc::new(detector),
            info: Arc::new(info),
            started_at: Utc::now(),
        }
    }

    pub fn detector(&self) -> &FraudDetector {
        &self.detector
    }

    /// Owned handle for work moved off the async workers.
    pub fn detector_handle(&self) -> Arc<FraudDetector> {
        Arc::clone(&self.detector)
    }

    pub fn info(&self) -> &ServiceInfo {
        &self.info
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Build the service router with tracing and CORS middleware.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/predict", post(routes::predict))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
