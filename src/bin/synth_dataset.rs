use std::path::PathBuf;

use glyco::{generate, init_logging, logging_config_from_env, write_csv, SyntheticConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;

    let out: PathBuf = std::env::var("GLYCO_SYNTH_OUT")
        .unwrap_or_else(|_| "data/synthetic_glucose.csv".to_string())
        .into();

    let mut cfg = SyntheticConfig::default();
    if let Some(seed) = env_usize("GLYCO_SYNTH_SEED") {
        cfg.seed = seed as u64;
    }
    if let Some(patients) = env_usize("GLYCO_SYNTH_PATIENTS") {
        cfg.patients = patients;
    }
    if let Some(days) = env_usize("GLYCO_SYNTH_DAYS") {
        cfg.days = days;
    }

    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let rows = generate(&cfg)?;
    write_csv(&out, &rows)?;

    Ok(())
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|raw| raw.parse().ok())
}
