//! HTTP serving layer: diabetes-risk and HbA1c estimation endpoints.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::dataset::parse_timestamp;
use crate::features::{transform, FeatureConfig, GlucoseReading};
use crate::model::{A1cEstimator, DiabetesClassifier, RiskLabel, ScreeningRecord};

/// Live request batches carry no patient identity; the transform still needs
/// a grouping key.
pub const DEFAULT_PATIENT_ID: &str = "default";

#[derive(Clone)]
pub struct ApiState {
    pub estimator: Arc<dyn A1cEstimator>,
    pub classifier: Arc<dyn DiabetesClassifier>,
    pub features: FeatureConfig,
}

pub fn api_router(state: ApiState) -> Router {
    Router::new()
        .route("/estimate-a1c", post(post_estimate_a1c))
        .route("/predict", post(post_predict))
        .with_state(state)
}

#[derive(Debug, Clone, Deserialize)]
pub struct EstimateA1cRequest {
    pub readings: Vec<RawReading>,
}

/// Wire-level reading; required fields are checked explicitly so the error
/// can name exactly what is missing.
#[derive(Debug, Clone, Deserialize)]
pub struct RawReading {
    pub timestamp: Option<String>,
    pub blood_glucose: Option<f64>,
    pub hba1c: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EstimateA1cResponse {
    pub hba1c: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictResponse {
    pub prediction: RiskLabel,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn unprocessable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

async fn post_estimate_a1c(
    State(state): State<ApiState>,
    Json(request): Json<EstimateA1cRequest>,
) -> Result<Json<EstimateA1cResponse>, ApiError> {
    let readings = validate_readings(&request.readings)?;

    let rows = transform(&state.features, &readings)
        .map_err(|err| ApiError::bad_request(err.to_string()))?;

    let estimate = state
        .estimator
        .estimate(&rows)
        .ok_or_else(|| ApiError::unprocessable("insufficient history for estimation"))?;

    info!(
        component = "server",
        event = "http.estimate_a1c.request",
        readings = request.readings.len(),
        feature_rows = rows.len(),
        hba1c = estimate
    );

    Ok(Json(EstimateA1cResponse { hba1c: estimate }))
}

async fn post_predict(
    State(state): State<ApiState>,
    Json(record): Json<ScreeningRecord>,
) -> Json<PredictResponse> {
    let prediction = state.classifier.classify(&record);

    info!(
        component = "server",
        event = "http.predict.request",
        label = String::from(prediction.label),
        score = prediction.score
    );

    Json(PredictResponse {
        prediction: prediction.label,
        score: prediction.score,
    })
}

/// Checks every raw reading for its required fields and converts the batch
/// into transform input. Missing HbA1c labels default to 0.0 in the request
/// path; live callers never populate them and the placeholder only keeps the
/// aggregate rows alive through the NaN drop.
fn validate_readings(raw: &[RawReading]) -> Result<Vec<GlucoseReading>, ApiError> {
    let mut missing: Vec<&str> = Vec::new();
    for reading in raw {
        if reading.timestamp.is_none() && !missing.contains(&"timestamp") {
            missing.push("timestamp");
        }
        if reading.blood_glucose.is_none() && !missing.contains(&"blood_glucose") {
            missing.push("blood_glucose");
        }
    }
    if !missing.is_empty() {
        return Err(ApiError::bad_request(format!(
            "missing required reading field(s): {}",
            missing.join(", ")
        )));
    }

    raw.iter()
        .map(|reading| {
            let raw_ts = reading.timestamp.as_deref().unwrap_or_default();
            let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
                ApiError::bad_request(format!("unparseable timestamp '{raw_ts}'"))
            })?;
            Ok(GlucoseReading {
                patient_id: DEFAULT_PATIENT_ID.to_string(),
                timestamp,
                blood_glucose: reading.blood_glucose.unwrap_or_default(),
                hba1c: Some(reading.hba1c.unwrap_or(0.0)),
            })
        })
        .collect()
}
