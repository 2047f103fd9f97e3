//! Predictor collaborators for the serving layer.
//!
//! The original deployment loaded pickled models into process-wide globals;
//! here each predictor is an explicitly constructed dependency handed to the
//! router at startup. Artifacts are JSON coefficient files that record the
//! feature-schema version and fingerprint they were fitted against, and
//! loading refuses an artifact whose schema does not match the configured
//! feature pipeline.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::features::{
    assert_schema_compatible, build_feature_schema, FeatureConfig, FeatureError, FeatureRow,
};

/// ADAG regression constants relating mean glucose (mg/dL) to HbA1c (%).
const ADAG_OFFSET: f64 = 46.7;
const ADAG_SLOPE: f64 = 28.7;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("I/O error reading model artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed model artifact: {0}")]
    Json(#[from] serde_json::Error),
    #[error("model artifact incompatible with feature pipeline: {0}")]
    Schema(#[from] FeatureError),
    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),
}

/// Opaque HbA1c predictor consumed per feature row.
pub trait A1cEstimator: Send + Sync + 'static {
    fn predict_row(&self, row: &FeatureRow) -> f64;

    /// Serving-path estimate: mean of per-row predictions, `None` for an
    /// empty batch (insufficient history upstream).
    fn estimate(&self, rows: &[FeatureRow]) -> Option<f64> {
        if rows.is_empty() {
            return None;
        }
        let sum: f64 = rows.iter().map(|row| self.predict_row(row)).sum();
        Some(sum / rows.len() as f64)
    }
}

/// Linear regression over the three smoothed feature columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearA1cModel {
    pub intercept: f64,
    pub coefficients: [f64; 3],
}

impl LinearA1cModel {
    /// Fallback estimator derived from the ADAG relation
    /// HbA1c = (46.7 + mean_glucose) / 28.7, reading only `rolling_mean`.
    pub fn adag_default() -> Self {
        Self {
            intercept: ADAG_OFFSET / ADAG_SLOPE,
            coefficients: [1.0 / ADAG_SLOPE, 0.0, 0.0],
        }
    }
}

impl A1cEstimator for LinearA1cModel {
    fn predict_row(&self, row: &FeatureRow) -> f64 {
        let values = row.values();
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(values.iter())
                .map(|(coef, value)| coef * value)
                .sum::<f64>()
    }
}

/// Persisted form of [`LinearA1cModel`], pinned to a feature schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct A1cModelArtifact {
    pub schema_version: u32,
    pub schema_fingerprint: String,
    pub window: usize,
    pub intercept: f64,
    pub coefficients: [f64; 3],
}

impl A1cModelArtifact {
    pub fn from_model(model: &LinearA1cModel, cfg: &FeatureConfig) -> Self {
        let schema = build_feature_schema(cfg);
        Self {
            schema_version: schema.version,
            schema_fingerprint: schema.fingerprint,
            window: cfg.window,
            intercept: model.intercept,
            coefficients: model.coefficients,
        }
    }
}

/// Loads a linear HbA1c artifact and verifies it against the feature pipeline
/// it embeds. Returns the model together with the feature config it was
/// fitted for.
pub fn load_a1c_model(path: &Path) -> Result<(LinearA1cModel, FeatureConfig), ModelError> {
    let raw = fs::read_to_string(path)?;
    let artifact: A1cModelArtifact = serde_json::from_str(&raw)?;

    let cfg = FeatureConfig {
        window: artifact.window,
    };
    let schema = build_feature_schema(&cfg);
    assert_schema_compatible(artifact.schema_version, &artifact.schema_fingerprint, &schema)?;

    info!(
        component = "model",
        event = "model.a1c.loaded",
        path = %path.display(),
        window = artifact.window,
        schema_version = artifact.schema_version
    );

    Ok((
        LinearA1cModel {
            intercept: artifact.intercept,
            coefficients: artifact.coefficients,
        },
        cfg,
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Answer {
    Yes,
    No,
}

impl Answer {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "yes" | "1" | "true" => Some(Self::Yes),
            "no" | "0" | "false" => Some(Self::No),
            _ => None,
        }
    }

    pub fn is_yes(self) -> bool {
        matches!(self, Self::Yes)
    }
}

impl TryFrom<String> for Answer {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw).ok_or_else(|| format!("expected yes/no answer, got '{raw}'"))
    }
}

impl From<Answer> for String {
    fn from(answer: Answer) -> Self {
        match answer {
            Answer::Yes => "Yes".to_string(),
            Answer::No => "No".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "female" | "f" => Some(Self::Female),
            "male" | "m" => Some(Self::Male),
            _ => None,
        }
    }
}

impl TryFrom<String> for Gender {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw).ok_or_else(|| format!("expected Male/Female, got '{raw}'"))
    }
}

impl From<Gender> for String {
    fn from(gender: Gender) -> Self {
        match gender {
            Gender::Female => "Female".to_string(),
            Gender::Male => "Male".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RiskLabel {
    Negative,
    Positive,
}

impl RiskLabel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "positive" | "1" => Some(Self::Positive),
            "negative" | "0" => Some(Self::Negative),
            _ => None,
        }
    }
}

impl TryFrom<String> for RiskLabel {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw).ok_or_else(|| format!("expected Positive/Negative, got '{raw}'"))
    }
}

impl From<RiskLabel> for String {
    fn from(label: RiskLabel) -> Self {
        match label {
            RiskLabel::Negative => "Negative".to_string(),
            RiskLabel::Positive => "Positive".to_string(),
        }
    }
}

/// Early-stage diabetes screening questionnaire (UCI layout): age, gender and
/// fourteen yes/no symptom answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningRecord {
    pub age: f64,
    pub gender: Gender,
    pub polyuria: Answer,
    pub polydipsia: Answer,
    pub sudden_weight_loss: Answer,
    pub weakness: Answer,
    pub polyphagia: Answer,
    pub genital_thrush: Answer,
    pub visual_blurring: Answer,
    pub itching: Answer,
    pub irritability: Answer,
    pub delayed_healing: Answer,
    pub partial_paresis: Answer,
    pub muscle_stiffness: Answer,
    pub alopecia: Answer,
    pub obesity: Answer,
}

impl ScreeningRecord {
    pub fn symptom_answers(&self) -> [Answer; 14] {
        [
            self.polyuria,
            self.polydipsia,
            self.sudden_weight_loss,
            self.weakness,
            self.polyphagia,
            self.genital_thrush,
            self.visual_blurring,
            self.itching,
            self.irritability,
            self.delayed_healing,
            self.partial_paresis,
            self.muscle_stiffness,
            self.alopecia,
            self.obesity,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskPrediction {
    pub label: RiskLabel,
    pub score: f64,
}

/// Opaque diabetes-risk classifier over a screening record.
pub trait DiabetesClassifier: Send + Sync + 'static {
    fn classify(&self, record: &ScreeningRecord) -> RiskPrediction;
}

/// Weighted-symptom classifier: min-max scaled age, a male offset and one
/// weight per symptom, thresholded into Positive/Negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringDiabetesClassifier {
    pub bias: f64,
    pub age_weight: f64,
    pub age_min: f64,
    pub age_max: f64,
    pub male_weight: f64,
    pub symptom_weights: [f64; 14],
    pub threshold: f64,
}

impl ScoringDiabetesClassifier {
    /// Bundled coefficients approximating the dominant symptom signal of the
    /// early-stage screening dataset (polyuria and polydipsia carry most of
    /// the weight).
    pub fn bundled_default() -> Self {
        Self {
            bias: -1.1,
            age_weight: 0.6,
            age_min: 16.0,
            age_max: 90.0,
            male_weight: -0.9,
            symptom_weights: [
                1.6,  // polyuria
                1.5,  // polydipsia
                0.7,  // sudden_weight_loss
                0.3,  // weakness
                0.5,  // polyphagia
                0.25, // genital_thrush
                0.4,  // visual_blurring
                0.1,  // itching
                0.45, // irritability
                0.1,  // delayed_healing
                0.6,  // partial_paresis
                0.15, // muscle_stiffness
                -0.2, // alopecia
                0.05, // obesity
            ],
            threshold: 0.0,
        }
    }

    fn scaled_age(&self, age: f64) -> f64 {
        let span = self.age_max - self.age_min;
        if span <= 0.0 {
            return 0.0;
        }
        ((age - self.age_min) / span).clamp(0.0, 1.0)
    }
}

impl DiabetesClassifier for ScoringDiabetesClassifier {
    fn classify(&self, record: &ScreeningRecord) -> RiskPrediction {
        let mut score = self.bias + self.age_weight * self.scaled_age(record.age);
        if record.gender == Gender::Male {
            score += self.male_weight;
        }
        for (weight, answer) in self.symptom_weights.iter().zip(record.symptom_answers()) {
            if answer.is_yes() {
                score += weight;
            }
        }

        let label = if score >= self.threshold {
            RiskLabel::Positive
        } else {
            RiskLabel::Negative
        };

        RiskPrediction { label, score }
    }
}

pub fn load_diabetes_model(path: &Path) -> Result<ScoringDiabetesClassifier, ModelError> {
    let raw = fs::read_to_string(path)?;
    let model: ScoringDiabetesClassifier = serde_json::from_str(&raw)?;

    if model.age_max <= model.age_min {
        return Err(ModelError::InvalidArtifact(
            "age_max must be greater than age_min".to_string(),
        ));
    }

    info!(
        component = "model",
        event = "model.diabetes.loaded",
        path = %path.display(),
        threshold = model.threshold
    );

    Ok(model)
}
