//! Sift Core Library
//!
//! Transaction categorization for the Sift personal finance tool:
//! - Pattern strategy trained from labeled history (keywords, amounts, merchants)
//! - LLM strategy over pluggable backends (Ollama, OpenAI-compatible, mock)
//! - Static keyword rule table used both as a strategy and as the fallback
//! - Blender that merges strategy outputs into a ranked, confidence-scored list
//! - Engine facade with batch categorization, training and model export
//! - Engine config and prompt library with user overrides
//! - CSV/JSON loaders for history, transactions and profiles

pub mod ai;
pub mod blend;
pub mod config;
pub mod engine;
pub mod error;
pub mod import;
pub mod llm;
pub mod models;
pub mod patterns;
pub mod prompts;
pub mod rules;

/// Test utilities including a mock Ollama server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIBackend, AIClient, MockBackend, MockMode, OllamaBackend, OpenAICompatibleBackend};
pub use blend::Blender;
pub use config::EngineConfig;
pub use engine::{CategorizationEngine, ExportedModel, MODEL_VERSION};
pub use error::{Error, Result, StrategyError};
pub use import::{load_training_csv, load_transactions_csv, Profile};
pub use llm::LlmStrategy;
pub use models::*;
pub use patterns::{match_patterns, PatternMap, PatternTrainer, Tokenizer};
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
pub use rules::{Rule, RuleTable};
