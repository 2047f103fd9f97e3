//! Glucose feature-engineering pipeline.
//!
//! Turns irregular, timestamped glucose readings into per-day aggregates and
//! a compact three-column smoothed summary (`rolling_mean`, `rolling_median`,
//! `rolling_std`) consumed by the HbA1c estimator.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

pub const FEATURE_SCHEMA_VERSION: u32 = 1;

pub const FEATURE_COLUMNS: [&str; 3] = ["rolling_mean", "rolling_median", "rolling_std"];

/// The configured window is counted in readings; the pipeline assumes three
/// readings per day and converts it to a per-day rolling window.
const READINGS_PER_DAY: usize = 3;

const DAILY_STAT_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlucoseReading {
    pub patient_id: String,
    pub timestamp: NaiveDateTime,
    pub blood_glucose: f64,
    pub hba1c: Option<f64>,
}

/// Summary of all readings belonging to one patient on one calendar date.
///
/// `std` is the sample (N-1) estimator and is NaN for singleton groups;
/// `hba1c` is the first non-null label observed in the group, NaN when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub patient_id: String,
    pub date: NaiveDate,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub max: f64,
    pub min: f64,
    pub hba1c: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub patient_id: String,
    pub date: NaiveDate,
    pub rolling_mean: f64,
    pub rolling_median: f64,
    pub rolling_std: f64,
    pub hba1c: f64,
}

impl FeatureRow {
    pub fn values(&self) -> [f64; 3] {
        [self.rolling_mean, self.rolling_median, self.rolling_std]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Total number of readings to smooth over; divided by the three
    /// readings-per-day assumption to obtain the per-day window.
    pub window: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self { window: 21 }
    }
}

impl FeatureConfig {
    /// Per-day rolling window, never below one day.
    pub fn day_window(&self) -> usize {
        (self.window / READINGS_PER_DAY).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureDType {
    F64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub dtype: FeatureDType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub fingerprint: String,
    pub columns: Vec<FeatureColumn>,
}

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("invalid feature config: {0}")]
    InvalidConfig(String),
    #[error("schema version mismatch: expected {expected}, got {actual}")]
    SchemaVersionMismatch { expected: u32, actual: u32 },
    #[error("schema fingerprint mismatch: expected {expected}, got {actual}")]
    SchemaFingerprintMismatch { expected: String, actual: String },
}

pub fn build_feature_schema(cfg: &FeatureConfig) -> FeatureSchema {
    let columns: Vec<FeatureColumn> = FEATURE_COLUMNS
        .iter()
        .map(|name| FeatureColumn {
            name: (*name).to_string(),
            dtype: FeatureDType::F64,
        })
        .collect();

    let fingerprint = schema_fingerprint(cfg, &columns);

    FeatureSchema {
        version: FEATURE_SCHEMA_VERSION,
        fingerprint,
        columns,
    }
}

pub fn assert_schema_compatible(
    expected_version: u32,
    expected_fingerprint: &str,
    actual: &FeatureSchema,
) -> Result<(), FeatureError> {
    if expected_version != actual.version {
        return Err(FeatureError::SchemaVersionMismatch {
            expected: expected_version,
            actual: actual.version,
        });
    }

    if expected_fingerprint != actual.fingerprint {
        return Err(FeatureError::SchemaFingerprintMismatch {
            expected: expected_fingerprint.to_string(),
            actual: actual.fingerprint.clone(),
        });
    }

    Ok(())
}

/// Batch transform from raw readings to smoothed feature rows.
///
/// Pure function of its input and the configured window: grouping by
/// (patient, date), five daily statistics, trailing min-periods=1 rolling
/// mean/std per statistic, row-wise collapse into the three feature columns,
/// and a final drop of any row holding a NaN feature or label. Non-finite
/// glucose values invalidate their (patient, date) group and leave through
/// the same drop. Output is ordered by patient id, then date.
pub fn transform(
    cfg: &FeatureConfig,
    readings: &[GlucoseReading],
) -> Result<Vec<FeatureRow>, FeatureError> {
    validate_config(cfg)?;

    let daily = aggregate_daily(readings);
    let daily_groups = daily.len();
    let rows = smooth_daily(cfg.day_window(), daily);

    info!(
        component = "features",
        event = "features.transform.finish",
        input_readings = readings.len(),
        daily_groups = daily_groups,
        output_rows = rows.len(),
        dropped_rows = daily_groups - rows.len(),
        day_window = cfg.day_window()
    );

    Ok(rows)
}

/// Groups readings by (patient, calendar date) and computes the five daily
/// glucose statistics plus the first observed HbA1c label per group.
pub fn aggregate_daily(readings: &[GlucoseReading]) -> Vec<DailyAggregate> {
    let mut groups: BTreeMap<(String, NaiveDate), (Vec<f64>, Option<f64>)> = BTreeMap::new();

    for reading in readings {
        let key = (reading.patient_id.clone(), reading.timestamp.date());
        let entry = groups.entry(key).or_default();
        entry.0.push(reading.blood_glucose);
        if entry.1.is_none() {
            entry.1 = reading.hba1c.filter(|value| !value.is_nan());
        }
    }

    groups
        .into_iter()
        .map(|((patient_id, date), (values, hba1c))| {
            // A non-finite reading poisons its whole group; the row then
            // exits through the NaN drop.
            let (mean, median, std, max, min) = if values.iter().all(|v| v.is_finite()) {
                let mean = mean_of(&values);
                (
                    mean,
                    median_of(&values),
                    sample_std_of(&values, mean),
                    values.iter().copied().fold(f64::MIN, f64::max),
                    values.iter().copied().fold(f64::MAX, f64::min),
                )
            } else {
                (f64::NAN, f64::NAN, f64::NAN, f64::NAN, f64::NAN)
            };
            DailyAggregate {
                patient_id,
                date,
                mean,
                median,
                std,
                max,
                min,
                hba1c: hba1c.unwrap_or(f64::NAN),
            }
        })
        .collect()
}

fn smooth_daily(day_window: usize, daily: Vec<DailyAggregate>) -> Vec<FeatureRow> {
    let mut out = Vec::with_capacity(daily.len());

    let mut idx = 0;
    while idx < daily.len() {
        let mut end = idx + 1;
        while end < daily.len() && daily[end].patient_id == daily[idx].patient_id {
            end += 1;
        }
        smooth_patient(day_window, &daily[idx..end], &mut out);
        idx = end;
    }

    out
}

fn smooth_patient(day_window: usize, series: &[DailyAggregate], out: &mut Vec<FeatureRow>) {
    let stat_columns: [Vec<f64>; DAILY_STAT_COUNT] = [
        series.iter().map(|day| day.mean).collect(),
        series.iter().map(|day| day.median).collect(),
        series.iter().map(|day| day.std).collect(),
        series.iter().map(|day| day.max).collect(),
        series.iter().map(|day| day.min).collect(),
    ];

    let mut rolled_means = Vec::with_capacity(DAILY_STAT_COUNT);
    let mut rolled_stds = Vec::with_capacity(DAILY_STAT_COUNT);
    for column in &stat_columns {
        let (means, stds) = rolling_stats(column, day_window);
        rolled_means.push(means);
        rolled_stds.push(stds);
    }

    for (row_idx, day) in series.iter().enumerate() {
        let mean_cells: Vec<f64> = rolled_means.iter().map(|col| col[row_idx]).collect();
        let std_cells: Vec<f64> = rolled_stds.iter().map(|col| col[row_idx]).collect();

        let rolling_mean = collapse_mean(&mean_cells);
        // The median summary intentionally reads the rolling-mean columns,
        // matching the shipped pipeline; see DESIGN.md.
        let rolling_median = collapse_median(&mean_cells);
        let rolling_std = collapse_sample_std(&std_cells);

        if rolling_mean.is_nan()
            || rolling_median.is_nan()
            || rolling_std.is_nan()
            || day.hba1c.is_nan()
        {
            continue;
        }

        out.push(FeatureRow {
            patient_id: day.patient_id.clone(),
            date: day.date,
            rolling_mean,
            rolling_median,
            rolling_std,
            hba1c: day.hba1c,
        });
    }
}

/// Trailing rolling mean and sample std with min-periods=1 semantics.
///
/// NaN inputs do not count as observations. A window with zero finite
/// observations yields NaN; a window with exactly one yields that value for
/// the mean and 0.0 for the std, so early rows use a shrinking window instead
/// of being withheld until the window fills.
fn rolling_stats(values: &[f64], window: usize) -> (Vec<f64>, Vec<f64>) {
    let mut means = Vec::with_capacity(values.len());
    let mut stds = Vec::with_capacity(values.len());

    for idx in 0..values.len() {
        let start = (idx + 1).saturating_sub(window);
        let finite: Vec<f64> = values[start..=idx]
            .iter()
            .copied()
            .filter(|value| !value.is_nan())
            .collect();

        match finite.len() {
            0 => {
                means.push(f64::NAN);
                stds.push(f64::NAN);
            }
            1 => {
                means.push(finite[0]);
                stds.push(0.0);
            }
            _ => {
                let mean = mean_of(&finite);
                means.push(mean);
                stds.push(sample_std_of(&finite, mean));
            }
        }
    }

    (means, stds)
}

fn collapse_mean(cells: &[f64]) -> f64 {
    let finite: Vec<f64> = cells.iter().copied().filter(|v| !v.is_nan()).collect();
    if finite.is_empty() {
        f64::NAN
    } else {
        mean_of(&finite)
    }
}

fn collapse_median(cells: &[f64]) -> f64 {
    let finite: Vec<f64> = cells.iter().copied().filter(|v| !v.is_nan()).collect();
    if finite.is_empty() {
        f64::NAN
    } else {
        median_of(&finite)
    }
}

fn collapse_sample_std(cells: &[f64]) -> f64 {
    let finite: Vec<f64> = cells.iter().copied().filter(|v| !v.is_nan()).collect();
    if finite.len() < 2 {
        return f64::NAN;
    }
    sample_std_of(&finite, mean_of(&finite))
}

fn mean_of(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median_of(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Sample (N-1) standard deviation; NaN for fewer than two values.
fn sample_std_of(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let variance = values
        .iter()
        .map(|v| {
            let d = *v - mean;
            d * d
        })
        .sum::<f64>()
        / (values.len() as f64 - 1.0);
    variance.sqrt()
}

fn validate_config(cfg: &FeatureConfig) -> Result<(), FeatureError> {
    if cfg.window == 0 {
        return Err(FeatureError::InvalidConfig(
            "window must be > 0".to_string(),
        ));
    }
    Ok(())
}

fn schema_fingerprint(cfg: &FeatureConfig, columns: &[FeatureColumn]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("version:{};", FEATURE_SCHEMA_VERSION));
    hasher.update(format!("window:{};", cfg.window));
    hasher.update("columns:");
    for column in columns {
        hasher.update(column.name.as_bytes());
        hasher.update(":f64;");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_handles_odd_and_even_counts() {
        assert_eq!(median_of(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median_of(&[4.0, 1.0, 2.0, 3.0]), 2.5);
    }

    #[test]
    fn sample_std_matches_known_value() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mean = mean_of(&values);
        let std = sample_std_of(&values, mean);
        assert!((std - 2.138089935299395).abs() < 1e-12);
    }

    #[test]
    fn sample_std_of_singleton_is_nan() {
        assert!(sample_std_of(&[5.0], 5.0).is_nan());
    }

    #[test]
    fn rolling_uses_shrinking_window_before_fill() {
        let (means, stds) = rolling_stats(&[10.0, 20.0, 30.0, 40.0], 3);

        assert_eq!(means[0], 10.0);
        assert_eq!(means[1], 15.0);
        assert_eq!(means[2], 20.0);
        assert_eq!(means[3], 30.0);

        assert_eq!(stds[0], 0.0);
        assert!((stds[1] - sample_std_of(&[10.0, 20.0], 15.0)).abs() < 1e-12);
        assert!((stds[3] - sample_std_of(&[20.0, 30.0, 40.0], 30.0)).abs() < 1e-12);
    }

    #[test]
    fn rolling_skips_nan_observations() {
        let (means, stds) = rolling_stats(&[f64::NAN, 10.0, f64::NAN], 2);

        assert!(means[0].is_nan());
        assert!(stds[0].is_nan());
        assert_eq!(means[1], 10.0);
        assert_eq!(stds[1], 0.0);
        assert_eq!(means[2], 10.0);
        assert_eq!(stds[2], 0.0);
    }

    #[test]
    fn day_window_is_floor_division_with_floor_of_one() {
        assert_eq!(FeatureConfig { window: 21 }.day_window(), 7);
        assert_eq!(FeatureConfig { window: 3 }.day_window(), 1);
        assert_eq!(FeatureConfig { window: 2 }.day_window(), 1);
    }

    #[test]
    fn schema_fingerprint_is_deterministic_and_window_sensitive() {
        let schema_a = build_feature_schema(&FeatureConfig { window: 21 });
        let schema_b = build_feature_schema(&FeatureConfig { window: 21 });
        let schema_c = build_feature_schema(&FeatureConfig { window: 9 });

        assert_eq!(schema_a, schema_b);
        assert_eq!(schema_a.columns.len(), 3);
        assert_eq!(schema_a.columns[0].name, "rolling_mean");
        assert_ne!(schema_a.fingerprint, schema_c.fingerprint);
    }

    #[test]
    fn zero_window_is_rejected() {
        let err = transform(&FeatureConfig { window: 0 }, &[]).expect_err("must fail");
        assert!(matches!(err, FeatureError::InvalidConfig(_)));
    }
}
