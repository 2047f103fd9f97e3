//! Seeded synthetic glucose/HbA1c dataset generation.
//!
//! Offline replacement for real patient exports: per-patient demographics,
//! three readings a day drawn from category-dependent normal distributions
//! with meal, medication and exercise effects, and an ADAG-derived HbA1c
//! label shared by all of a patient's rows.

use std::path::Path;

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::features::GlucoseReading;
use crate::model::Gender;

const GLUCOSE_FLOOR: f64 = 50.0;
const READING_INTERVAL_HOURS: i64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlycemicCategory {
    NonDiabetic,
    PreDiabetic,
    Diabetic,
}

impl GlycemicCategory {
    fn base_level(self) -> (f64, f64) {
        match self {
            Self::NonDiabetic => (70.0, 10.0),
            Self::PreDiabetic => (110.0, 18.0),
            Self::Diabetic => (135.0, 24.0),
        }
    }

    fn max_threshold(self) -> f64 {
        match self {
            Self::NonDiabetic => 140.0,
            Self::PreDiabetic => 200.0,
            Self::Diabetic => 260.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub patients: usize,
    pub days: usize,
    pub readings_per_day: usize,
    pub seed: u64,
    pub start_date: NaiveDate,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            patients: 49,
            days: 90,
            readings_per_day: 3,
            seed: 42,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid default start date"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticReading {
    pub patient_id: u32,
    pub timestamp: NaiveDateTime,
    pub age: u32,
    pub gender: Gender,
    pub bmi: f64,
    pub blood_glucose: f64,
    pub hba1c: f64,
}

#[derive(Debug, Error)]
pub enum SyntheticError {
    #[error("invalid synthetic config: {0}")]
    InvalidConfig(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Generates the full dataset deterministically for a given seed.
pub fn generate(cfg: &SyntheticConfig) -> Result<Vec<SyntheticReading>, SyntheticError> {
    validate_config(cfg)?;

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let hba1c_noise = normal(0.0, 0.2)?;

    let mut rows = Vec::with_capacity(cfg.patients * cfg.days * cfg.readings_per_day);
    for patient_idx in 0..cfg.patients {
        let patient_id = patient_idx as u32 + 1;
        let age = rng.gen_range(18..82u32);
        let gender = if rng.gen_bool(0.5) {
            Gender::Female
        } else {
            Gender::Male
        };
        let bmi = round2(rng.gen_range(18.5..40.0));
        let category = sample_category(&mut rng);

        let readings = simulate_patient_readings(cfg, &mut rng, category, bmi, age, gender)?;

        let mean_glucose = readings.iter().sum::<f64>() / readings.len() as f64;
        let hba1c = round1((46.7 + mean_glucose) / 28.7 + hba1c_noise.sample(&mut rng));

        let base = cfg
            .start_date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid");
        for (reading_idx, glucose) in readings.into_iter().enumerate() {
            let timestamp =
                base + ChronoDuration::hours(READING_INTERVAL_HOURS * reading_idx as i64);
            rows.push(SyntheticReading {
                patient_id,
                timestamp,
                age,
                gender,
                bmi,
                blood_glucose: round2(glucose),
                hba1c,
            });
        }
    }

    info!(
        component = "synthetic",
        event = "synthetic.generate.finish",
        patients = cfg.patients,
        rows = rows.len(),
        seed = cfg.seed
    );

    Ok(rows)
}

/// Writes rows in the layout the readings loader consumes
/// (`Patient_ID, Timestamp, Age, Gender, BMI, Blood_Glucose, HbA1c`).
pub fn write_csv(path: &Path, rows: &[SyntheticReading]) -> Result<(), SyntheticError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "Patient_ID",
        "Timestamp",
        "Age",
        "Gender",
        "BMI",
        "Blood_Glucose",
        "HbA1c",
    ])?;

    for row in rows {
        writer.write_record([
            row.patient_id.to_string(),
            row.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            row.age.to_string(),
            String::from(row.gender),
            format!("{:.2}", row.bmi),
            format!("{:.2}", row.blood_glucose),
            format!("{:.1}", row.hba1c),
        ])?;
    }

    writer.flush()?;

    info!(
        component = "synthetic",
        event = "synthetic.csv.written",
        path = %path.display(),
        rows = rows.len()
    );

    Ok(())
}

/// Projects generated rows onto the feature pipeline's input record.
pub fn to_readings(rows: &[SyntheticReading]) -> Vec<GlucoseReading> {
    rows.iter()
        .map(|row| GlucoseReading {
            patient_id: row.patient_id.to_string(),
            timestamp: row.timestamp,
            blood_glucose: row.blood_glucose,
            hba1c: Some(row.hba1c),
        })
        .collect()
}

fn simulate_patient_readings(
    cfg: &SyntheticConfig,
    rng: &mut StdRng,
    category: GlycemicCategory,
    bmi: f64,
    age: u32,
    gender: Gender,
) -> Result<Vec<f64>, SyntheticError> {
    let (base_mean, base_std) = category.base_level();
    let base_dist = normal(base_mean, base_std)?;
    let variation_dist = normal(0.0, 5.0)?;
    let meal_dist = match category {
        GlycemicCategory::NonDiabetic => normal(10.0, 5.0)?,
        _ => normal(18.0, 10.0)?,
    };

    // Quadratic BMI effect, stronger for women and older patients.
    let mut bmi_factor = (bmi - 25.0).powi(2) * 0.01;
    if gender == Gender::Female {
        bmi_factor *= 1.1;
    }
    bmi_factor *= 1.0 + 0.01 * (age as f64 - 50.0);

    let mut readings = Vec::with_capacity(cfg.days * cfg.readings_per_day);
    for _day in 0..cfg.days {
        for reading in 0..cfg.readings_per_day {
            let mut value = base_dist.sample(rng);

            // First reading of the day is the fasting one.
            if reading == 0 {
                value += bmi_factor;
            } else {
                value += meal_dist.sample(rng);
            }

            value += variation_dist.sample(rng);

            if rng.gen_bool(0.4) {
                value -= 5.0; // medication effect
            }
            if rng.gen_bool(0.2) {
                value -= 5.0; // exercise effect
            }

            readings.push(value.clamp(GLUCOSE_FLOOR, category.max_threshold()));
        }
    }

    Ok(readings)
}

fn sample_category(rng: &mut StdRng) -> GlycemicCategory {
    let draw: f64 = rng.gen();
    if draw < 0.2 {
        GlycemicCategory::NonDiabetic
    } else if draw < 0.5 {
        GlycemicCategory::PreDiabetic
    } else {
        GlycemicCategory::Diabetic
    }
}

fn normal(mean: f64, std: f64) -> Result<Normal<f64>, SyntheticError> {
    Normal::new(mean, std)
        .map_err(|err| SyntheticError::InvalidConfig(format!("bad normal distribution: {err}")))
}

fn validate_config(cfg: &SyntheticConfig) -> Result<(), SyntheticError> {
    if cfg.patients == 0 {
        return Err(SyntheticError::InvalidConfig(
            "patients must be > 0".to_string(),
        ));
    }
    if cfg.days == 0 {
        return Err(SyntheticError::InvalidConfig("days must be > 0".to_string()));
    }
    if cfg.readings_per_day == 0 {
        return Err(SyntheticError::InvalidConfig(
            "readings_per_day must be > 0".to_string(),
        ));
    }
    Ok(())
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
