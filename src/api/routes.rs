//! API route handlers

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::config::ServiceInfo;
use crate::error::{InferenceError, ValidationError};
use crate::types::{feature_index, Prediction, TransactionRecord};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, error, warn};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
    pub features: usize,
    pub started_at: String,
}

/// `GET /`: static service metadata.
pub async fn root(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(state.info().clone())
}

/// `GET /health`: only reachable once the model is loaded.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ready",
        model: state.detector().model_name().to_string(),
        features: state.detector().feature_count(),
        started_at: state.started_at().to_rfc3339(),
    })
}

/// `POST /predict`: validate one record and classify it.
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Prediction>, ApiError> {
    let start_time = Instant::now();

    let Json(body) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejected malformed request body");
        ValidationError::MalformedBody(rejection.body_text())
    })?;

    let record = TransactionRecord::from_json_value(&body).map_err(|e| {
        warn!(error = %e, "Rejected invalid transaction");
        e
    })?;

    if let Value::Object(object) = &body {
        let unknown: Vec<&str> = object
            .keys()
            .map(String::as_str)
            .filter(|k| feature_index(k).is_none())
            .collect();
        if !unknown.is_empty() {
            debug!(fields = ?unknown, "Ignoring fields outside the feature contract");
        }
    }

    // Inference can block on the ONNX session lock.
    let detector = state.detector_handle();
    let prediction = tokio::task::spawn_blocking(move || detector.predict_record(&record))
        .await
        .map_err(|e| InferenceError::Backend(format!("inference task failed: {}", e)))
        .and_then(|result| result)
        .map_err(|e| {
            error!(error = %e, "Inference failed");
            e
        })?;

    debug!(
        label = prediction.prediction.as_u8(),
        latency_us = start_time.elapsed().as_micros() as u64,
        "Transaction classified"
    );

    Ok(Json(prediction))
}
