//! AI backend request/response types
//!
//! These types are backend-agnostic and used across all AI implementations.

use serde::{Deserialize, Deserializer, Serialize};

/// A system + user message pair sent to a chat model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// One category choice from the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPick {
    /// Category name (or id) as the model wrote it
    #[serde(alias = "categoryName", alias = "category_name", alias = "name")]
    pub category: String,
    /// Either 0-1 or 0-100; normalized by the LLM strategy
    #[serde(default, deserialize_with = "lenient_number")]
    pub confidence: f64,
    #[serde(default, alias = "reason")]
    pub reasoning: String,
}

/// Categorization answer: a primary pick plus alternatives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub prediction: ModelPick,
    pub alternatives: Vec<ModelPick>,
}

/// Keyword refinement answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordResponse {
    pub keywords: Vec<String>,
}

/// Backend kind, host and model for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendInfo {
    pub kind: &'static str,
    pub host: String,
    pub model: String,
}

/// Accept `85`, `0.85`, or `"85"` for confidence
fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s
            .trim()
            .trim_end_matches('%')
            .parse::<f64>()
            .map_err(serde::de::Error::custom),
    }
}
