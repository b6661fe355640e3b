//! HTTP surface tests, driving the router in-process.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use fraud_detection_api::config::ServiceInfo;
use fraud_detection_api::{
    router, AppState, Classifier, FeatureVector, FraudDetector, InferenceError, Label,
    FEATURE_NAMES,
};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tower::ServiceExt;

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/xgb_model.json")
}

fn fixture_app() -> Router {
    let detector = FraudDetector::from_path(fixture_path()).unwrap();
    router(AppState::new(detector, ServiceInfo::default()))
}

/// Every field zero except Amount.
fn neutral_body(amount: f64) -> Map<String, Value> {
    let mut body: Map<String, Value> = FEATURE_NAMES.iter().map(|n| (n.to_string(), json!(0.0))).collect();
    body.insert("Amount".to_string(), json!(amount));
    body
}

struct Counting {
    calls: Arc<AtomicUsize>,
}

impl Classifier for Counting {
    fn classify(&self, _: &FeatureVector) -> Result<Label, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Label::Legitimate)
    }

    fn name(&self) -> &str {
        "counting"
    }
}

struct Failing;

impl Classifier for Failing {
    fn classify(&self, _: &FeatureVector) -> Result<Label, InferenceError> {
        Err(InferenceError::Backend("tensor allocation failed".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Only answers once two calls are inside `classify` at the same time.
struct Rendezvous {
    arrived: Mutex<usize>,
    all_here: Condvar,
}

impl Classifier for Rendezvous {
    fn classify(&self, _: &FeatureVector) -> Result<Label, InferenceError> {
        let mut arrived = self.arrived.lock().unwrap();
        *arrived += 1;
        self.all_here.notify_all();
        let (arrived, wait) = self
            .all_here
            .wait_timeout_while(arrived, Duration::from_secs(2), |n| *n < 2)
            .unwrap();
        if wait.timed_out() && *arrived < 2 {
            return Err(InferenceError::Backend("ran alone".to_string()));
        }
        Ok(Label::Legitimate)
    }

    fn name(&self) -> &str {
        "rendezvous"
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn root_returns_metadata() {
    let (status, body) = send(fixture_app(), get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Credit Card Fraud Detection API");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["description"].as_str().unwrap().contains("fraudulent"));
}

#[tokio::test]
async fn root_is_independent_of_model_behavior() {
    let app = router(AppState::new(
        FraudDetector::with_classifier(Failing),
        ServiceInfo::default(),
    ));
    let (status, _) = send(app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_reports_loaded_model() {
    let (status, body) = send(fixture_app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["model"], "xgboost:xgb_model");
    assert_eq!(body["features"], 30);
}

#[tokio::test]
async fn predict_neutral_record() {
    let body = Value::Object(neutral_body(100.0)).to_string();
    let (status, body) = send(fixture_app(), post_json(&body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "prediction": 0 }));
}

#[tokio::test]
async fn predict_flags_fraud_pattern() {
    let mut record = neutral_body(900.0);
    record.insert("V14".to_string(), json!(-9.0));
    let (status, body) = send(fixture_app(), post_json(&Value::Object(record).to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "prediction": 1 }));
}

#[tokio::test]
async fn predict_ignores_extra_fields() {
    let mut record = neutral_body(100.0);
    record.insert("Class".to_string(), json!(1));
    record.insert("merchant".to_string(), json!("acme"));
    let (status, body) = send(fixture_app(), post_json(&Value::Object(record).to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prediction"], 0);
}

#[tokio::test]
async fn predict_accepts_numeric_strings() {
    let mut record = neutral_body(100.0);
    record.insert("Amount".to_string(), json!("100.0"));
    let (status, body) = send(fixture_app(), post_json(&Value::Object(record).to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prediction"], 0);
}

#[tokio::test]
async fn missing_field_is_rejected_before_inference() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = router(AppState::new(
        FraudDetector::with_classifier(Counting {
            calls: calls.clone(),
        }),
        ServiceInfo::default(),
    ));

    let mut record = neutral_body(100.0);
    record.remove("V14");
    let (status, body) = send(app, post_json(&Value::Object(record).to_string())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert!(body["detail"].as_str().unwrap().contains("V14"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_numeric_field_is_rejected() {
    let mut record = neutral_body(100.0);
    record.insert("V3".to_string(), json!("abc"));
    let (status, body) = send(fixture_app(), post_json(&Value::Object(record).to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("V3"));

    let mut record = neutral_body(100.0);
    record.insert("Time".to_string(), Value::Null);
    let (status, _) = send(fixture_app(), post_json(&Value::Object(record).to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_bodies_are_rejected() {
    let (status, body) = send(fixture_app(), post_json("{\"Time\": 0,")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = send(fixture_app(), post_json("[1, 2, 3]")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(fixture_app(), post_json("{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn inference_failure_is_a_server_error() {
    let app = router(AppState::new(
        FraudDetector::with_classifier(Failing),
        ServiceInfo::default(),
    ));
    let body = Value::Object(neutral_body(100.0)).to_string();
    let (status, body) = send(app, post_json(&body)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "inference_error");
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("tensor allocation failed"));
}

#[tokio::test]
async fn repeated_requests_agree() {
    let app = fixture_app();
    let body = Value::Object(neutral_body(750.0)).to_string();
    let (_, first) = send(app.clone(), post_json(&body)).await;
    let (_, second) = send(app, post_json(&body)).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn inference_does_not_block_the_async_worker() {
    // Single-threaded runtime: two requests can only overlap inside the
    // classifier if inference runs off the async worker.
    let app = router(AppState::new(
        FraudDetector::with_classifier(Rendezvous {
            arrived: Mutex::new(0),
            all_here: Condvar::new(),
        }),
        ServiceInfo::default(),
    ));
    let body = Value::Object(neutral_body(100.0)).to_string();

    let (first, second) = tokio::join!(
        send(app.clone(), post_json(&body)),
        send(app, post_json(&body))
    );
    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(second.0, StatusCode::OK);
}

#[tokio::test]
async fn onnx_label_outside_binary_domain_is_a_server_error() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/linear_bad_class.onnx");
    let app = router(AppState::new(
        FraudDetector::from_path(path).unwrap(),
        ServiceInfo::default(),
    ));

    let body = Value::Object(neutral_body(100.0)).to_string();
    let (status, body) = send(app.clone(), post_json(&body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "prediction": 0 }));

    let body = Value::Object(neutral_body(300.0)).to_string();
    let (status, body) = send(app, post_json(&body)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "inference_error");
    assert!(body["detail"].as_str().unwrap().contains("unexpected class 7"));
}
