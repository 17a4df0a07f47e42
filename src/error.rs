use thiserror::Error;

use crate::engine::AssessmentError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Threshold file error: {0}")]
    Thresholds(#[from] toml::de::Error),

    #[error("Assessment error: {0}")]
    Assessment(#[from] AssessmentError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream fetch error: {0}")]
    Upstream(String),

    #[error("Narrative provider error: {0}")]
    Narrative(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
