//! Offline CSV ingestion for glucose readings and screening records.

use std::collections::HashMap;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use thiserror::Error;
use tracing::info;

use crate::features::GlucoseReading;
use crate::model::{Answer, Gender, RiskLabel, ScreeningRecord};

pub const REQUIRED_READING_COLUMNS: [&str; 3] = ["Patient_ID", "Timestamp", "Blood_Glucose"];

const SCREENING_COLUMNS: [&str; 17] = [
    "age",
    "gender",
    "polyuria",
    "polydipsia",
    "sudden weight loss",
    "weakness",
    "polyphagia",
    "genital thrush",
    "visual blurring",
    "itching",
    "irritability",
    "delayed healing",
    "partial paresis",
    "muscle stiffness",
    "alopecia",
    "obesity",
    "class",
];

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required column(s): {}", columns.join(", "))]
    MissingColumns { columns: Vec<String> },
    #[error("failed to parse field {field} value '{value}' on line {line}")]
    ParseField {
        field: &'static str,
        value: String,
        line: u64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledScreeningRecord {
    pub record: ScreeningRecord,
    pub label: RiskLabel,
}

/// Loads a glucose-readings CSV (`Patient_ID, Timestamp, Blood_Glucose` plus
/// an optional `HbA1c` column). A missing required header fails with a schema
/// error naming every absent column; an unparseable or non-finite numeric
/// cell names the field.
pub fn load_glucose_readings(path: &Path) -> Result<Vec<GlucoseReading>, DatasetError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = header_index(reader.headers()?);

    let mut missing = Vec::new();
    for column in REQUIRED_READING_COLUMNS {
        if !headers.contains_key(&column.to_ascii_lowercase()) {
            missing.push(column.to_string());
        }
    }
    if !missing.is_empty() {
        return Err(DatasetError::MissingColumns { columns: missing });
    }

    let patient_idx = headers["patient_id"];
    let timestamp_idx = headers["timestamp"];
    let glucose_idx = headers["blood_glucose"];
    let hba1c_idx = headers.get("hba1c").copied();

    let mut readings = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();

        let patient_id = field(&record, patient_idx).to_string();
        let timestamp = parse_timestamp(field(&record, timestamp_idx)).ok_or_else(|| {
            DatasetError::ParseField {
                field: "Timestamp",
                value: field(&record, timestamp_idx).to_string(),
                line,
            }
        })?;
        let blood_glucose = parse_float(&record, glucose_idx, "Blood_Glucose", line)?;
        let hba1c = match hba1c_idx {
            Some(idx) if !field(&record, idx).trim().is_empty() => {
                Some(parse_float(&record, idx, "HbA1c", line)?)
            }
            _ => None,
        };

        readings.push(GlucoseReading {
            patient_id,
            timestamp,
            blood_glucose,
            hba1c,
        });
    }

    info!(
        component = "dataset",
        event = "dataset.readings.loaded",
        path = %path.display(),
        rows = readings.len()
    );

    Ok(readings)
}

/// Loads the early-stage diabetes screening CSV (UCI layout). Headers are
/// matched case-insensitively; answers, gender and class labels parse
/// case-insensitively as well.
pub fn load_screening_records(path: &Path) -> Result<Vec<LabeledScreeningRecord>, DatasetError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = header_index(reader.headers()?);

    let mut missing = Vec::new();
    for column in SCREENING_COLUMNS {
        if !headers.contains_key(column) {
            missing.push(column.to_string());
        }
    }
    if !missing.is_empty() {
        return Err(DatasetError::MissingColumns { columns: missing });
    }

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();

        let age = parse_float(&record, headers["age"], "age", line)?;
        let gender_raw = field(&record, headers["gender"]);
        let gender = Gender::parse(gender_raw).ok_or_else(|| DatasetError::ParseField {
            field: "gender",
            value: gender_raw.to_string(),
            line,
        })?;
        let label_raw = field(&record, headers["class"]);
        let label = RiskLabel::parse(label_raw).ok_or_else(|| DatasetError::ParseField {
            field: "class",
            value: label_raw.to_string(),
            line,
        })?;

        let mut answers = [Answer::No; 14];
        for (slot, column) in answers.iter_mut().zip(&SCREENING_COLUMNS[2..16]) {
            let raw = field(&record, headers[*column]);
            *slot = Answer::parse(raw).ok_or_else(|| DatasetError::ParseField {
                field: *column,
                value: raw.to_string(),
                line,
            })?;
        }

        records.push(LabeledScreeningRecord {
            record: ScreeningRecord {
                age,
                gender,
                polyuria: answers[0],
                polydipsia: answers[1],
                sudden_weight_loss: answers[2],
                weakness: answers[3],
                polyphagia: answers[4],
                genital_thrush: answers[5],
                visual_blurring: answers[6],
                itching: answers[7],
                irritability: answers[8],
                delayed_healing: answers[9],
                partial_paresis: answers[10],
                muscle_stiffness: answers[11],
                alopecia: answers[12],
                obesity: answers[13],
            },
            label,
        });
    }

    info!(
        component = "dataset",
        event = "dataset.screening.loaded",
        path = %path.display(),
        rows = records.len()
    );

    Ok(records)
}

/// Accepts `%Y-%m-%d %H:%M:%S`, the ISO `T` variant, and bare dates.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(ts);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Some(ts);
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

fn header_index(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().to_ascii_lowercase(), idx))
        .collect()
}

fn field<'a>(record: &'a StringRecord, idx: usize) -> &'a str {
    record.get(idx).unwrap_or_default()
}

fn parse_float(
    record: &StringRecord,
    idx: usize,
    name: &'static str,
    line: u64,
) -> Result<f64, DatasetError> {
    let raw = field(record, idx);
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| DatasetError::ParseField {
            field: name,
            value: raw.to_string(),
            line,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn timestamp_parser_accepts_common_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5)
            .and_then(|date| date.and_hms_opt(8, 30, 0))
            .expect("valid datetime");

        assert_eq!(parse_timestamp("2024-03-05 08:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T08:30:00"), Some(expected));

        let midnight = parse_timestamp("2024-03-05").expect("bare date accepted");
        assert_eq!(midnight.date(), expected.date());
        assert_eq!(midnight.hour(), 0);

        assert_eq!(parse_timestamp("05/03/2024"), None);
    }
}
