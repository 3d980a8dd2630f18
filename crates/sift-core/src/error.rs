//! Error types for Sift

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("No categories supplied to the engine")]
    NoCategories,

    #[error("Model version mismatch: expected {expected}, found {found}")]
    ModelVersion { expected: String, found: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single prediction strategy
///
/// Strategy errors never escape the engine's prediction methods: the blender
/// treats them as "contributes nothing" and the rule table fills in.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("No AI backend configured")]
    Unavailable,

    #[error("AI backend error: {0}")]
    Backend(#[from] Error),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Model answered with no known category")]
    NoKnownCategory,
}
