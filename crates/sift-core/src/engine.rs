//! Categorization engine facade
//!
//! One engine per user/session. It owns the user's categories, a capped,
//! newest-first slice of labeled history, and the trained pattern map, and
//! runs the pattern, LLM and rule strategies for every prediction before
//! blending their outputs.
//!
//! The pattern map is a single immutable snapshot behind `RwLock<Arc<_>>`:
//! retraining swaps the whole snapshot, and in-flight predictions keep using
//! whichever snapshot they read.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ai::AIClient;
use crate::blend::Blender;
use crate::config::EngineConfig;
use crate::error::{Error, Result, StrategyError};
use crate::llm::LlmStrategy;
use crate::models::{CategorizationResult, Category, ModelStats, TrainingExample, Transaction};
use crate::patterns::{match_patterns, PatternMap, PatternTrainer};
use crate::prompts::PromptLibrary;
use crate::rules::RuleTable;

/// Schema version of exported models
pub const MODEL_VERSION: &str = "1";

/// Envelope written by `export_model` and read by `import_model`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedModel {
    pub version: String,
    pub patterns: PatternMap,
    pub stats: ModelStats,
}

pub struct CategorizationEngine {
    categories: Vec<Category>,
    history: RwLock<Vec<TrainingExample>>,
    patterns: RwLock<Arc<PatternMap>>,
    stats: RwLock<ModelStats>,
    trainer: PatternTrainer,
    rules: RuleTable,
    llm: LlmStrategy,
    blender: Blender,
    config: EngineConfig,
}

impl CategorizationEngine {
    /// Create an engine for one user's categories and history
    ///
    /// History is kept newest-first and capped at `training.history_limit`.
    /// Patterns start empty; call `train_model` (or `import_model`) to fill them.
    pub fn new(
        categories: Vec<Category>,
        history: Vec<TrainingExample>,
        client: Option<AIClient>,
        config: EngineConfig,
    ) -> Result<Self> {
        Self::with_prompts(categories, history, client, config, PromptLibrary::new())
    }

    /// Like `new`, with an explicit prompt library
    pub fn with_prompts(
        categories: Vec<Category>,
        history: Vec<TrainingExample>,
        client: Option<AIClient>,
        config: EngineConfig,
        prompts: PromptLibrary,
    ) -> Result<Self> {
        if categories.is_empty() {
            return Err(Error::NoCategories);
        }

        let rules = RuleTable::default();
        let blender = Blender::new(config.blend.clone());
        let llm = LlmStrategy::new(
            client,
            prompts,
            rules.clone(),
            blender.clone(),
            config.llm.clone(),
        );
        let history = newest_first(history, config.training.history_limit);

        Ok(Self {
            categories,
            history: RwLock::new(history),
            patterns: RwLock::new(Arc::new(PatternMap::new())),
            stats: RwLock::new(ModelStats {
                accuracy: config.training.default_accuracy,
                total_predictions: 0,
                correct_predictions: 0,
                last_trained: None,
                version: MODEL_VERSION.to_string(),
                pattern_count: 0,
            }),
            trainer: PatternTrainer::new(config.patterns.clone())?,
            rules,
            llm,
            blender,
            config,
        })
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn llm(&self) -> &LlmStrategy {
        &self.llm
    }

    /// Current pattern snapshot
    pub fn patterns(&self) -> Arc<PatternMap> {
        self.patterns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn history_len(&self) -> usize {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Run every strategy and blend their predictions
    ///
    /// Strategy failures never surface here: a failed LLM call contributes
    /// nothing and the rule table (or the default category) fills in.
    pub async fn categorize_transaction(&self, tx: &Transaction) -> Result<CategorizationResult> {
        let patterns = self.patterns();
        let from_patterns = match_patterns(&patterns, tx, &self.categories, &self.config.patterns);
        let from_rules = self.rules.match_rules(tx, &self.categories);

        let from_ai = match self.llm.try_predict(tx, &self.categories).await {
            Ok(predictions) => predictions,
            Err(StrategyError::Unavailable) => Vec::new(),
            Err(e) => {
                warn!(description = %tx.description, error = %e, "AI strategy failed");
                Vec::new()
            }
        };

        debug!(
            patterns = from_patterns.len(),
            ai = from_ai.len(),
            rules = from_rules.len(),
            "Strategy outputs"
        );

        let blended = self.blender.combine(vec![from_patterns, from_ai, from_rules]);
        self.blender
            .to_result(blended, &self.categories)
            .ok_or(Error::NoCategories)
    }

    /// Categorize many transactions, `batch.chunk_size` at a time
    ///
    /// Chunks run one after another with `batch.delay` between them; the
    /// transactions of a chunk run concurrently. Output order matches input.
    pub async fn batch_categorize_transactions(
        &self,
        transactions: &[Transaction],
    ) -> Result<Vec<CategorizationResult>> {
        let chunk_size = self.config.batch.chunk_size.max(1);
        let mut results = Vec::with_capacity(transactions.len());

        for (i, chunk) in transactions.chunks(chunk_size).enumerate() {
            if i > 0 && !self.config.batch.delay.is_zero() {
                tokio::time::sleep(self.config.batch.delay).await;
            }
            debug!(chunk = i, size = chunk.len(), "Categorizing batch chunk");

            let chunk_results =
                join_all(chunk.iter().map(|tx| self.categorize_transaction(tx))).await;
            for result in chunk_results {
                results.push(result?);
            }
        }

        Ok(results)
    }

    /// Rebuild all patterns from the current history and re-evaluate accuracy
    pub async fn train_model(&self) -> ModelStats {
        let history = self
            .history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let patterns = self
            .trainer
            .train(&history, &self.categories, Some(&self.llm))
            .await;
        let evaluation = self.evaluate(&history);
        let pattern_count = patterns.len();

        *self.patterns.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(patterns);

        let stats = {
            let mut stats = self.stats.write().unwrap_or_else(PoisonError::into_inner);
            stats.accuracy = evaluation.accuracy;
            stats.total_predictions = evaluation.total;
            stats.correct_predictions = evaluation.correct;
            stats.last_trained = Some(Utc::now());
            stats.version = MODEL_VERSION.to_string();
            stats.pattern_count = pattern_count;
            stats.clone()
        };

        info!(
            examples = history.len(),
            patterns = stats.pattern_count,
            accuracy = stats.accuracy,
            "Model trained"
        );
        stats
    }

    /// Merge new labeled examples into history
    ///
    /// Retrains (and returns the new stats) once at least
    /// `training.retrain_threshold` examples arrive in one call.
    pub async fn add_training_data(&self, examples: Vec<TrainingExample>) -> Option<ModelStats> {
        let added = examples.len();
        {
            let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
            let mut merged = examples;
            merged.append(&mut history);
            *history = newest_first(merged, self.config.training.history_limit);
        }

        if added >= self.config.training.retrain_threshold {
            Some(self.train_model().await)
        } else {
            debug!(added, "Not enough new examples to retrain");
            None
        }
    }

    pub fn get_model_stats(&self) -> ModelStats {
        self.stats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record whether a prediction the caller showed was accepted
    pub fn record_feedback(&self, predicted_category_id: &str, actual_category_id: &str) -> ModelStats {
        let mut stats = self.stats.write().unwrap_or_else(PoisonError::into_inner);
        stats.total_predictions += 1;
        if predicted_category_id == actual_category_id {
            stats.correct_predictions += 1;
        }
        stats.accuracy = percent(stats.correct_predictions, stats.total_predictions);
        stats.clone()
    }

    /// Serialize the trained patterns and stats
    pub fn export_model(&self) -> Result<String> {
        let exported = ExportedModel {
            version: MODEL_VERSION.to_string(),
            patterns: (*self.patterns()).clone(),
            stats: self.get_model_stats(),
        };
        Ok(serde_json::to_string_pretty(&exported)?)
    }

    /// Replace patterns and stats with a previously exported model
    ///
    /// Patterns for categories this engine doesn't know are dropped.
    pub fn import_model(&self, json: &str) -> Result<()> {
        let exported: ExportedModel = serde_json::from_str(json)?;
        if exported.version != MODEL_VERSION {
            return Err(Error::ModelVersion {
                expected: MODEL_VERSION.to_string(),
                found: exported.version,
            });
        }

        let total = exported.patterns.len();
        let patterns: PatternMap = exported
            .patterns
            .into_iter()
            .filter(|(id, _)| self.categories.iter().any(|c| &c.id == id))
            .collect();
        if patterns.len() < total {
            warn!(
                dropped = total - patterns.len(),
                "Imported model has patterns for unknown categories"
            );
        }

        let mut stats = exported.stats;
        stats.pattern_count = patterns.len();

        *self.patterns.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(patterns);
        *self.stats.write().unwrap_or_else(PoisonError::into_inner) = stats;
        Ok(())
    }

    /// Hold-out accuracy of the offline strategies (patterns + rules)
    ///
    /// The most recent `holdout_fraction` of history is predicted with
    /// patterns trained on the older remainder.
    fn evaluate(&self, history: &[TrainingExample]) -> Evaluation {
        let training = &self.config.training;
        if history.len() < training.min_examples.max(2) {
            return Evaluation {
                accuracy: training.default_accuracy,
                total: 0,
                correct: 0,
            };
        }

        let mut by_date: Vec<&TrainingExample> = history.iter().collect();
        by_date.sort_by(|a, b| a.date.cmp(&b.date));
        let n = by_date.len();
        let holdout = ((n as f64 * training.holdout_fraction).ceil() as usize).clamp(1, n - 1);
        let (older, recent) = by_date.split_at(n - holdout);

        let older: Vec<TrainingExample> = older.iter().map(|e| (*e).clone()).collect();
        let patterns = self.trainer.train_offline(&older, &self.categories);

        let correct = recent
            .iter()
            .copied()
            .filter(|example| {
                let tx = Transaction::from(*example);
                let blended = self.blender.combine(vec![
                    match_patterns(&patterns, &tx, &self.categories, &self.config.patterns),
                    self.rules.match_rules(&tx, &self.categories),
                ]);
                self.blender
                    .to_result(blended, &self.categories)
                    .is_some_and(|r| r.prediction.category_id == example.category_id)
            })
            .count() as u64;
        let total = recent.len() as u64;

        debug!(holdout = total, correct, "Hold-out evaluation");
        Evaluation {
            accuracy: percent(correct, total),
            total,
            correct,
        }
    }
}

struct Evaluation {
    accuracy: f64,
    total: u64,
    correct: u64,
}

/// Whole-number percentage
fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 100.0).round()
}

/// Sort newest-first (stable) and cap
fn newest_first(mut history: Vec<TrainingExample>, limit: usize) -> Vec<TrainingExample> {
    history.sort_by(|a, b| b.date.cmp(&a.date));
    history.truncate(limit);
    history
}
