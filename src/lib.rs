//! Glyco core crate.
//!
//! Health-prediction service pieces:
//! - glucose feature-engineering pipeline (daily aggregation + rolling smoothing)
//! - CSV dataset ingestion with schema validation
//! - HbA1c estimation and diabetes-risk predictor collaborators
//! - synthetic dataset generation
//! - HTTP serving layer

mod dataset;
mod features;
mod model;
mod observability;
mod server;
mod synthetic;

pub use dataset::{
    load_glucose_readings, load_screening_records, parse_timestamp, DatasetError,
    LabeledScreeningRecord, REQUIRED_READING_COLUMNS,
};
pub use features::{
    aggregate_daily, assert_schema_compatible, build_feature_schema, transform, DailyAggregate,
    FeatureColumn, FeatureConfig, FeatureDType, FeatureError, FeatureRow, FeatureSchema,
    GlucoseReading, FEATURE_COLUMNS, FEATURE_SCHEMA_VERSION,
};
pub use model::{
    load_a1c_model, load_diabetes_model, A1cEstimator, A1cModelArtifact, Answer,
    DiabetesClassifier, Gender, LinearA1cModel, ModelError, RiskLabel, RiskPrediction,
    ScoringDiabetesClassifier, ScreeningRecord,
};
pub use observability::{
    init_logging, log_app_bind, log_app_start, log_model_loaded, logging_config_from_env,
    LogFormat, LoggingConfig, LoggingInitError,
};
pub use server::{
    api_router, ApiState, EstimateA1cRequest, EstimateA1cResponse, PredictResponse, RawReading,
    DEFAULT_PATIENT_ID,
};
pub use synthetic::{
    generate, to_readings, write_csv, GlycemicCategory, SyntheticConfig, SyntheticError,
    SyntheticReading,
};
