//! Engine configuration
//!
//! All tunable constants of the categorization engine (blend boost, ceilings,
//! thresholds, pattern caps, batch sizing) live here.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/sift/config/engine.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Keys missing from an override keep their built-in values.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/engine.toml");

/// Blending and ranking parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BlendConfig {
    /// Boost per additional agreeing strategy
    pub agreement_boost: f64,
    /// Upper bound of any blended confidence
    pub confidence_ceiling: f64,
    /// Top prediction at or above this is "high confidence"
    pub high_confidence_threshold: f64,
    /// Number of predictions returned
    pub top_n: usize,
    /// Confidence of the default category when no strategy matched
    pub default_confidence: f64,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            agreement_boost: 0.1,
            confidence_ceiling: 95.0,
            high_confidence_threshold: 80.0,
            top_n: 3,
            default_confidence: 10.0,
        }
    }
}

/// Pattern trainer and matcher parameters
#[derive(Debug, Clone, PartialEq)]
pub struct PatternConfig {
    /// Minimum matcher score for a pattern to emit a prediction
    pub min_score: f64,
    /// Raw frequency-ranked keyword candidates kept before refinement
    pub candidate_keywords: usize,
    /// Keywords kept after refinement (or raw fallback)
    pub max_keywords: usize,
    pub max_merchants: usize,
    /// Example descriptions retained for display
    pub max_examples: usize,
    /// Ceiling of a pattern's own confidence
    pub confidence_cap: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            min_score: 10.0,
            candidate_keywords: 20,
            max_keywords: 10,
            max_merchants: 10,
            max_examples: 5,
            confidence_cap: 80.0,
        }
    }
}

/// Training and evaluation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    /// Below this many examples accuracy is not evaluated
    pub min_examples: usize,
    /// Accuracy reported when the sample is too small to evaluate
    pub default_accuracy: f64,
    /// Most recent fraction of history held out for evaluation
    pub holdout_fraction: f64,
    /// New examples needed before `add_training_data` retrains
    pub retrain_threshold: usize,
    /// History rows kept by the engine (newest first)
    pub history_limit: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_examples: 10,
            default_accuracy: 60.0,
            holdout_fraction: 0.2,
            retrain_threshold: 10,
            history_limit: 200,
        }
    }
}

/// Batch categorization parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Transactions (and so LLM calls) in flight at once
    pub chunk_size: usize,
    /// Pause between chunks
    pub delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10,
            delay: Duration::from_millis(1000),
        }
    }
}

/// LLM strategy parameters
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    /// Confidence ceiling of the rule-based fallback answer
    pub fallback_confidence: f64,
    /// Request timeout; `None` leaves the HTTP client default
    pub timeout: Option<Duration>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            fallback_confidence: 50.0,
            timeout: None,
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineConfig {
    pub blend: BlendConfig,
    pub patterns: PatternConfig,
    pub training: TrainingConfig,
    pub batch: BatchConfig,
    pub llm: LlmConfig,
}

impl EngineConfig {
    /// Load from the default override location, falling back to embedded defaults
    pub fn load() -> Result<Self> {
        load_config(None)
    }

    /// Load from an explicit override path (embedded defaults if it doesn't exist)
    pub fn load_from(path: &Path) -> Result<Self> {
        load_config(Some(path))
    }

    /// Embedded defaults only
    pub fn embedded() -> Result<Self> {
        parse_config(DEFAULT_CONFIG)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("sift").join("config").join("engine.toml"))
}

/// Load configuration (override first, then default)
fn load_config(override_path: Option<&Path>) -> Result<EngineConfig> {
    let path = override_path
        .map(Path::to_path_buf)
        .or_else(default_config_path);

    let content = match path {
        Some(path) if path.exists() => fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?,
        _ => DEFAULT_CONFIG.to_string(),
    };

    parse_config(&content)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    blend: Option<RawBlend>,
    patterns: Option<RawPatterns>,
    training: Option<RawTraining>,
    batch: Option<RawBatch>,
    llm: Option<RawLlm>,
}

#[derive(Debug, Deserialize)]
struct RawBlend {
    agreement_boost: Option<f64>,
    confidence_ceiling: Option<f64>,
    high_confidence_threshold: Option<f64>,
    top_n: Option<usize>,
    default_confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawPatterns {
    min_score: Option<f64>,
    candidate_keywords: Option<usize>,
    max_keywords: Option<usize>,
    max_merchants: Option<usize>,
    max_examples: Option<usize>,
    confidence_cap: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawTraining {
    min_examples: Option<usize>,
    default_accuracy: Option<f64>,
    holdout_fraction: Option<f64>,
    retrain_threshold: Option<usize>,
    history_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawBatch {
    chunk_size: Option<usize>,
    delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawLlm {
    fallback_confidence: Option<f64>,
    timeout_secs: Option<u64>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<EngineConfig> {
    let raw: RawConfig =
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = EngineConfig::default();

    if let Some(blend) = raw.blend {
        let b = &mut config.blend;
        if let Some(v) = blend.agreement_boost {
            b.agreement_boost = v;
        }
        if let Some(v) = blend.confidence_ceiling {
            b.confidence_ceiling = v;
        }
        if let Some(v) = blend.high_confidence_threshold {
            b.high_confidence_threshold = v;
        }
        if let Some(v) = blend.top_n {
            b.top_n = v;
        }
        if let Some(v) = blend.default_confidence {
            b.default_confidence = v;
        }
    }

    if let Some(patterns) = raw.patterns {
        let p = &mut config.patterns;
        if let Some(v) = patterns.min_score {
            p.min_score = v;
        }
        if let Some(v) = patterns.candidate_keywords {
            p.candidate_keywords = v;
        }
        if let Some(v) = patterns.max_keywords {
            p.max_keywords = v;
        }
        if let Some(v) = patterns.max_merchants {
            p.max_merchants = v;
        }
        if let Some(v) = patterns.max_examples {
            p.max_examples = v;
        }
        if let Some(v) = patterns.confidence_cap {
            p.confidence_cap = v;
        }
    }

    if let Some(training) = raw.training {
        let t = &mut config.training;
        if let Some(v) = training.min_examples {
            t.min_examples = v;
        }
        if let Some(v) = training.default_accuracy {
            t.default_accuracy = v;
        }
        if let Some(v) = training.holdout_fraction {
            t.holdout_fraction = v;
        }
        if let Some(v) = training.retrain_threshold {
            t.retrain_threshold = v;
        }
        if let Some(v) = training.history_limit {
            t.history_limit = v;
        }
    }

    if let Some(batch) = raw.batch {
        if let Some(v) = batch.chunk_size {
            config.batch.chunk_size = v;
        }
        if let Some(v) = batch.delay_ms {
            config.batch.delay = Duration::from_millis(v);
        }
    }

    if let Some(llm) = raw.llm {
        if let Some(v) = llm.fallback_confidence {
            config.llm.fallback_confidence = v;
        }
        if let Some(v) = llm.timeout_secs {
            config.llm.timeout = Some(Duration::from_secs(v));
        }
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &EngineConfig) -> Result<()> {
    if config.batch.chunk_size == 0 {
        return Err(Error::Config("batch.chunk_size must be at least 1".into()));
    }
    if config.blend.top_n == 0 {
        return Err(Error::Config("blend.top_n must be at least 1".into()));
    }
    if !(0.0..1.0).contains(&config.training.holdout_fraction) {
        return Err(Error::Config(
            "training.holdout_fraction must be in [0, 1)".into(),
        ));
    }
    if !(0.0..=100.0).contains(&config.blend.confidence_ceiling) {
        return Err(Error::Config(
            "blend.confidence_ceiling must be in [0, 100]".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_config() {
        let config = parse_config(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = parse_config(
            r#"
[blend]
agreement_boost = 0.25

[batch]
delay_ms = 0
"#,
        )
        .unwrap();

        assert_eq!(config.blend.agreement_boost, 0.25);
        assert_eq!(config.blend.confidence_ceiling, 95.0);
        assert_eq!(config.batch.delay, Duration::ZERO);
        assert_eq!(config.batch.chunk_size, 10);
        assert!(config.llm.timeout.is_none());
    }

    #[test]
    fn test_llm_timeout() {
        let config = parse_config("[llm]\ntimeout_secs = 45\n").unwrap();
        assert_eq!(config.llm.timeout, Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(parse_config("[batch]\nchunk_size = 0\n").is_err());
        assert!(parse_config("[training]\nholdout_fraction = 1.5\n").is_err());
        assert!(parse_config("not toml at all [").is_err());
    }

    #[test]
    fn test_load_from_missing_path_uses_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_from(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_from_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        fs::write(&path, "[blend]\ntop_n = 5\n").unwrap();

        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.blend.top_n, 5);
    }
}
