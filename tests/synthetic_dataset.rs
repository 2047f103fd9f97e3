use chrono::NaiveDate;
use glyco::{
    generate, load_glucose_readings, to_readings, transform, write_csv, FeatureConfig,
    SyntheticConfig,
};
use tempfile::NamedTempFile;

fn small_config() -> SyntheticConfig {
    SyntheticConfig {
        patients: 5,
        days: 7,
        readings_per_day: 3,
        seed: 42,
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid start date"),
    }
}

#[test]
fn same_seed_reproduces_identical_rows() {
    let cfg = small_config();
    let first = generate(&cfg).expect("first generation");
    let second = generate(&cfg).expect("second generation");
    assert_eq!(first, second);
}

#[test]
fn different_seeds_diverge() {
    let cfg = small_config();
    let other = SyntheticConfig {
        seed: 7,
        ..small_config()
    };
    let first = generate(&cfg).expect("first generation");
    let second = generate(&other).expect("second generation");
    assert_ne!(first, second);
}

#[test]
fn row_count_and_value_ranges_hold() {
    let cfg = small_config();
    let rows = generate(&cfg).expect("generation succeeds");

    assert_eq!(rows.len(), cfg.patients * cfg.days * cfg.readings_per_day);
    for row in &rows {
        assert!(row.patient_id >= 1 && row.patient_id as usize <= cfg.patients);
        assert!(
            (50.0..=260.0).contains(&row.blood_glucose),
            "glucose out of range: {}",
            row.blood_glucose
        );
        assert!((18..82).contains(&row.age));
        assert!((18.5..=40.0).contains(&row.bmi));
        // HbA1c labels are rounded to one decimal place.
        assert!((row.hba1c * 10.0 - (row.hba1c * 10.0).round()).abs() < 1e-9);
    }
}

#[test]
fn hba1c_is_constant_per_patient() {
    let rows = generate(&small_config()).expect("generation succeeds");
    for window in rows.windows(2) {
        if window[0].patient_id == window[1].patient_id {
            assert_eq!(window[0].hba1c, window[1].hba1c);
        }
    }
}

#[test]
fn written_csv_round_trips_through_the_readings_loader() {
    let cfg = small_config();
    let rows = generate(&cfg).expect("generation succeeds");

    let file = NamedTempFile::new().expect("temp csv file");
    write_csv(file.path(), &rows).expect("write succeeds");

    let readings = load_glucose_readings(file.path()).expect("load succeeds");
    assert_eq!(readings.len(), rows.len());
    assert_eq!(readings[0].patient_id, rows[0].patient_id.to_string());
    assert_eq!(readings[0].timestamp, rows[0].timestamp);
    assert_eq!(readings[0].hba1c, Some(rows[0].hba1c));
}

#[test]
fn generated_rows_feed_the_feature_pipeline_end_to_end() {
    let cfg = small_config();
    let rows = generate(&cfg).expect("generation succeeds");
    let readings = to_readings(&rows);

    let features =
        transform(&FeatureConfig::default(), &readings).expect("transform succeeds");

    // Every patient carries an HbA1c label, so every (patient, day) group
    // survives the NaN drop.
    assert_eq!(features.len(), cfg.patients * cfg.days);
    for row in &features {
        assert!(row.rolling_mean.is_finite());
        assert!(row.rolling_median.is_finite());
        assert!(row.rolling_std.is_finite());
        assert!(row.hba1c > 0.0);
    }
}
