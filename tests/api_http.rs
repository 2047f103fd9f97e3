use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use glyco::{
    api_router, A1cEstimator, ApiState, FeatureConfig, FeatureRow, LinearA1cModel,
    ScoringDiabetesClassifier,
};
use serde_json::{json, Value};
use tower::util::ServiceExt;

/// Estimator stub returning a constant regardless of input, so endpoint
/// behaviour can be asserted independently of the regression coefficients.
struct FixedEstimator(f64);

impl A1cEstimator for FixedEstimator {
    fn predict_row(&self, _row: &FeatureRow) -> f64 {
        self.0
    }
}

fn test_state(estimator: Arc<dyn A1cEstimator>) -> ApiState {
    ApiState {
        estimator,
        classifier: Arc::new(ScoringDiabetesClassifier::bundled_default()),
        features: FeatureConfig { window: 3 },
    }
}

async fn post_json(state: ApiState, uri: &str, body: Value) -> (StatusCode, Value) {
    let app = api_router(state);
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds");

    let response = app.oneshot(request).await.expect("router responds");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn screening_body(polyuria: &str, polydipsia: &str) -> Value {
    json!({
        "age": 48.0,
        "gender": "Male",
        "polyuria": polyuria,
        "polydipsia": polydipsia,
        "sudden_weight_loss": "No",
        "weakness": "No",
        "polyphagia": "No",
        "genital_thrush": "No",
        "visual_blurring": "No",
        "itching": "No",
        "irritability": "No",
        "delayed_healing": "No",
        "partial_paresis": "No",
        "muscle_stiffness": "No",
        "alopecia": "No",
        "obesity": "No"
    })
}

#[tokio::test]
async fn estimate_a1c_returns_stubbed_value() {
    let state = test_state(Arc::new(FixedEstimator(6.5)));
    let body = json!({
        "readings": [
            { "timestamp": "2024-01-01 08:00:00", "blood_glucose": 104.0 },
            { "timestamp": "2024-01-02 08:00:00", "blood_glucose": 121.0 }
        ]
    });

    let (status, payload) = post_json(state, "/estimate-a1c", body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["hba1c"], json!(6.5));
}

#[tokio::test]
async fn estimate_a1c_with_adag_model_tracks_mean_glucose() {
    let state = test_state(Arc::new(LinearA1cModel::adag_default()));
    let body = json!({
        "readings": [
            { "timestamp": "2024-01-01 08:00:00", "blood_glucose": 126.0 }
        ]
    });

    let (status, payload) = post_json(state, "/estimate-a1c", body).await;

    assert_eq!(status, StatusCode::OK);
    let expected = (46.7 + 126.0) / 28.7;
    let got = payload["hba1c"].as_f64().expect("numeric hba1c");
    assert!((got - expected).abs() < 1e-9, "got {got}, expected {expected}");
}

#[tokio::test]
async fn estimate_a1c_names_missing_fields() {
    let state = test_state(Arc::new(FixedEstimator(6.5)));
    let body = json!({
        "readings": [
            { "blood_glucose": 104.0 },
            { "timestamp": "2024-01-01 08:00:00" }
        ]
    });

    let (status, payload) = post_json(state, "/estimate-a1c", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = payload["error"].as_str().expect("error message");
    assert!(message.contains("timestamp"), "message: {message}");
    assert!(message.contains("blood_glucose"), "message: {message}");
}

#[tokio::test]
async fn estimate_a1c_rejects_unparseable_timestamp() {
    let state = test_state(Arc::new(FixedEstimator(6.5)));
    let body = json!({
        "readings": [
            { "timestamp": "yesterday", "blood_glucose": 104.0 }
        ]
    });

    let (status, payload) = post_json(state, "/estimate-a1c", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(payload["error"]
        .as_str()
        .expect("error message")
        .contains("yesterday"));
}

#[tokio::test]
async fn estimate_a1c_empty_batch_is_unprocessable() {
    let state = test_state(Arc::new(FixedEstimator(6.5)));
    let body = json!({ "readings": [] });

    let (status, payload) = post_json(state, "/estimate-a1c", body).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(payload["error"]
        .as_str()
        .expect("error message")
        .contains("insufficient history"));
}

#[tokio::test]
async fn predict_flags_cardinal_symptoms_positive() {
    let state = test_state(Arc::new(FixedEstimator(6.5)));

    let (status, payload) = post_json(state, "/predict", screening_body("Yes", "Yes")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["prediction"], json!("Positive"));
    assert!(payload["score"].as_f64().expect("numeric score") >= 0.0);
}

#[tokio::test]
async fn predict_without_symptoms_is_negative() {
    let state = test_state(Arc::new(FixedEstimator(6.5)));

    let (status, payload) = post_json(state, "/predict", screening_body("No", "No")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["prediction"], json!("Negative"));
    assert!(payload["score"].as_f64().expect("numeric score") < 0.0);
}

#[tokio::test]
async fn predict_rejects_malformed_answer_enum() {
    let state = test_state(Arc::new(FixedEstimator(6.5)));

    let (status, _payload) = post_json(state, "/predict", screening_body("maybe", "No")).await;

    assert!(
        status.is_client_error(),
        "expected a 4xx status, got {status}"
    );
}
