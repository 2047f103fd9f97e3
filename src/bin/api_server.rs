use std::{net::SocketAddr, path::Path, sync::Arc};

use glyco::{
    api_router, init_logging, load_a1c_model, load_diabetes_model, log_app_bind, log_app_start,
    log_model_loaded, logging_config_from_env, A1cEstimator, ApiState, DiabetesClassifier,
    FeatureConfig, LinearA1cModel, ScoringDiabetesClassifier,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start(&logging_cfg);

    let addr: SocketAddr = std::env::var("GLYCO_API_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
        .parse()?;

    let (estimator, features) = a1c_from_env()?;
    let classifier = classifier_from_env()?;

    let state = ApiState {
        estimator,
        classifier,
        features,
    };

    let app = api_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    log_app_bind(bound_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn a1c_from_env() -> Result<(Arc<dyn A1cEstimator>, FeatureConfig), Box<dyn std::error::Error>> {
    match std::env::var("GLYCO_A1C_MODEL") {
        Ok(path) => {
            let (model, features) = load_a1c_model(Path::new(&path))?;
            log_model_loaded("a1c", "artifact", Some(&path));
            Ok((Arc::new(model), features))
        }
        Err(_) => {
            log_model_loaded("a1c", "builtin_adag", None);
            Ok((
                Arc::new(LinearA1cModel::adag_default()),
                FeatureConfig::default(),
            ))
        }
    }
}

fn classifier_from_env() -> Result<Arc<dyn DiabetesClassifier>, Box<dyn std::error::Error>> {
    match std::env::var("GLYCO_DIABETES_MODEL") {
        Ok(path) => {
            let model = load_diabetes_model(Path::new(&path))?;
            log_model_loaded("diabetes", "artifact", Some(&path));
            Ok(Arc::new(model))
        }
        Err(_) => {
            log_model_loaded("diabetes", "builtin_default", None);
            Ok(Arc::new(ScoringDiabetesClassifier::bundled_default()))
        }
    }
}
