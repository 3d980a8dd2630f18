//! Pattern strategy: per-category statistics learned from labeled history
//!
//! Training groups examples by category and derives, for each group, the
//! most frequent description keywords, quartile amount buckets, repeat
//! merchants and a confidence. Matching scores a transaction against every
//! pattern with keyword, amount and merchant signals.

use std::collections::{BTreeMap, HashMap, HashSet};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::PatternConfig;
use crate::error::Result;
use crate::llm::LlmStrategy;
use crate::models::{
    AmountRange, Category, CategoryPattern, Prediction, PredictionSource, TrainingExample,
    Transaction,
};

/// Trained pattern map, keyed by category id
pub type PatternMap = BTreeMap<String, CategoryPattern>;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "in",
    "into", "is", "it", "its", "of", "on", "or", "our", "that", "the", "this", "to", "was",
    "were", "will", "with", "you", "your", "www", "com",
];

/// Description tokenizer shared by training and evaluation
#[derive(Debug, Clone)]
pub struct Tokenizer {
    numeric: Regex,
    date: Regex,
    stop_words: HashSet<&'static str>,
}

impl Tokenizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            numeric: Regex::new(r"^[$#*]*\d[\d.,$#*]*$")?,
            date: Regex::new(r"^\d{1,4}[/-]\d{1,2}([/-]\d{1,4})?$")?,
            stop_words: STOP_WORDS.iter().copied().collect(),
        })
    }

    /// Lower-cased content words of a description
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.to_lowercase()
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|t| t.chars().count() >= 2)
            .filter(|t| !self.stop_words.contains(t))
            .filter(|t| !self.numeric.is_match(t) && !self.date.is_match(t))
            .map(str::to_string)
            .collect()
    }
}

/// Builds a `PatternMap` from labeled history
#[derive(Debug, Clone)]
pub struct PatternTrainer {
    config: PatternConfig,
    tokenizer: Tokenizer,
}

/// A pattern before keyword refinement
struct Draft {
    pattern: CategoryPattern,
    candidates: Vec<String>,
}

impl PatternTrainer {
    pub fn new(config: PatternConfig) -> Result<Self> {
        Ok(Self {
            config,
            tokenizer: Tokenizer::new()?,
        })
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// Train with optional LLM keyword refinement
    ///
    /// Refinement failures fall back to the raw frequency ranking; training
    /// itself never fails because of the model.
    pub async fn train(
        &self,
        examples: &[TrainingExample],
        categories: &[Category],
        llm: Option<&LlmStrategy>,
    ) -> PatternMap {
        let llm = llm.filter(|l| l.is_available());
        let mut patterns = PatternMap::new();

        for (category, group) in group_by_category(examples, categories) {
            let mut draft = self.draft(&category.id, &group);

            if let Some(llm) = llm {
                let samples: Vec<&str> = group
                    .iter()
                    .take(self.config.max_examples * 2)
                    .map(|e| e.description.as_str())
                    .collect();
                match llm
                    .refine_keywords(category, &samples, &draft.candidates, self.config.max_keywords)
                    .await
                {
                    Ok(refined) => {
                        debug!(category = %category.name, keywords = ?refined, "Refined keywords");
                        draft.pattern.keywords = refined;
                    }
                    Err(e) => {
                        warn!(category = %category.name, error = %e, "Keyword refinement failed, keeping raw keywords");
                    }
                }
            }

            patterns.insert(category.id.clone(), draft.pattern);
        }

        info!(
            examples = examples.len(),
            patterns = patterns.len(),
            refined = llm.is_some(),
            "Trained category patterns"
        );
        patterns
    }

    /// Train without any model calls
    pub fn train_offline(&self, examples: &[TrainingExample], categories: &[Category]) -> PatternMap {
        group_by_category(examples, categories)
            .into_iter()
            .map(|(category, group)| (category.id.clone(), self.draft(&category.id, &group).pattern))
            .collect()
    }

    fn draft(&self, category_id: &str, group: &[&TrainingExample]) -> Draft {
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut total_tokens = 0usize;
        for example in group {
            for token in self.tokenizer.tokenize(&example.description) {
                total_tokens += 1;
                *counts.entry(token).or_default() += 1;
            }
        }
        let unique_tokens = counts.len();

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let candidates: Vec<String> = ranked
            .into_iter()
            .take(self.config.candidate_keywords)
            .map(|(token, _)| token)
            .collect();

        let lexical = if total_tokens == 0 {
            0.0
        } else {
            unique_tokens as f64 / total_tokens as f64 * 100.0
        };
        let saturation = (group.len() as f64 / 10.0).min(1.0) * 100.0;
        let confidence = ((lexical + saturation) / 2.0).min(self.config.confidence_cap);

        let amounts: Vec<f64> = group.iter().map(|e| e.amount.abs()).collect();

        let pattern = CategoryPattern {
            category_id: category_id.to_string(),
            keywords: candidates.iter().take(self.config.max_keywords).cloned().collect(),
            amount_ranges: amount_buckets(&amounts),
            merchants: repeat_merchants(group, self.config.max_merchants),
            confidence,
            frequency: group.len(),
            examples: group
                .iter()
                .take(self.config.max_examples)
                .map(|e| e.description.clone())
                .collect(),
        };

        Draft { pattern, candidates }
    }
}

/// Group examples under known categories, in category order
///
/// Examples naming an unknown category are skipped with a warning.
fn group_by_category<'a>(
    examples: &'a [TrainingExample],
    categories: &'a [Category],
) -> Vec<(&'a Category, Vec<&'a TrainingExample>)> {
    let mut groups: HashMap<&str, Vec<&TrainingExample>> = HashMap::new();
    for example in examples {
        if categories.iter().any(|c| c.id == example.category_id) {
            groups.entry(example.category_id.as_str()).or_default().push(example);
        } else {
            warn!(category_id = %example.category_id, "Skipping example for unknown category");
        }
    }

    categories
        .iter()
        .filter_map(|c| groups.remove(c.id.as_str()).map(|g| (c, g)))
        .collect()
}

/// Quartile buckets Q0-Q1, Q1-Q2, Q2-Q3, Q3-max; empty buckets dropped
fn amount_buckets(amounts: &[f64]) -> Vec<AmountRange> {
    if amounts.is_empty() {
        return Vec::new();
    }
    let mut sorted = amounts.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let at = |fraction: f64| sorted[((n as f64 * fraction).floor() as usize).min(n - 1)];
    let bounds = [sorted[0], at(0.25), at(0.5), at(0.75), sorted[n - 1]];

    let mut counts = [0usize; 4];
    for &amount in &sorted {
        if let Some(i) = (0..4).find(|&i| amount >= bounds[i] && amount <= bounds[i + 1]) {
            counts[i] += 1;
        }
    }

    (0..4)
        .filter(|&i| counts[i] > 0)
        .map(|i| AmountRange {
            min: bounds[i],
            max: bounds[i + 1],
            frequency: counts[i] as f64 / n as f64,
        })
        .collect()
}

/// Normalized merchants seen more than once, most frequent first
fn repeat_merchants(group: &[&TrainingExample], limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for merchant in group.iter().filter_map(|e| e.merchant.as_deref()) {
        let normalized = merchant.trim().to_lowercase();
        if !normalized.is_empty() {
            *counts.entry(normalized).or_default() += 1;
        }
    }

    let mut repeated: Vec<(String, usize)> = counts.into_iter().filter(|(_, n)| *n > 1).collect();
    repeated.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    repeated.into_iter().take(limit).map(|(m, _)| m).collect()
}

/// Score a transaction against every pattern
///
/// Patterns for categories not in `categories` are ignored.
pub fn match_patterns(
    patterns: &PatternMap,
    tx: &Transaction,
    categories: &[Category],
    config: &PatternConfig,
) -> Vec<Prediction> {
    let description = tx.description.to_lowercase();
    let merchant = tx.merchant.as_deref().map(str::to_lowercase);
    let amount = tx.amount.abs();

    let mut predictions = Vec::new();
    for pattern in patterns.values() {
        let Some(category) = categories.iter().find(|c| c.id == pattern.category_id) else {
            continue;
        };

        let hits: Vec<&str> = pattern
            .keywords
            .iter()
            .filter(|k| description.contains(k.as_str()))
            .map(String::as_str)
            .collect();
        let range = pattern.amount_ranges.iter().find(|r| r.contains(amount));
        let merchant_hit = pattern.merchants.iter().find(|m| {
            merchant.as_deref().is_some_and(|tm| tm.contains(m.as_str()))
                || description.contains(m.as_str())
        });

        let mut raw = hits.len() as f64 * 30.0;
        if let Some(range) = range {
            raw += 20.0 * range.frequency;
        }
        if merchant_hit.is_some() {
            raw += 25.0;
        }
        let score = raw
            * (pattern.confidence / 100.0)
            * (pattern.frequency as f64 / 10.0).min(1.0);

        if score <= config.min_score {
            continue;
        }

        let mut signals = Vec::new();
        if !hits.is_empty() {
            signals.push(format!("keywords [{}]", hits.join(", ")));
        }
        if let Some(range) = range {
            signals.push(format!("amount in {:.2}-{:.2}", range.min, range.max));
        }
        if let Some(m) = merchant_hit {
            signals.push(format!("merchant \"{}\"", m));
        }

        predictions.push(Prediction::new(
            category,
            score,
            format!("Pattern: {}", signals.join(", ")),
            PredictionSource::Patterns,
        ));
    }

    debug!(
        description = %tx.description,
        matches = predictions.len(),
        "Pattern matcher evaluated"
    );
    predictions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AIClient, MockBackend};
    use crate::blend::Blender;
    use crate::config::{BlendConfig, LlmConfig};
    use crate::prompts::PromptLibrary;
    use crate::rules::RuleTable;
    use chrono::NaiveDate;

    fn example(description: &str, amount: f64, merchant: Option<&str>, category: &str) -> TrainingExample {
        TrainingExample {
            description: description.to_string(),
            amount,
            merchant: merchant.map(str::to_string),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            kind: Default::default(),
            category_id: category.to_string(),
        }
    }

    fn categories() -> Vec<Category> {
        vec![
            Category::new("coffee", "Coffee Shops"),
            Category::new("rent", "Housing"),
        ]
    }

    fn coffee_history() -> Vec<TrainingExample> {
        (0..10)
            .map(|i| {
                example(
                    &format!("BLUE BOTTLE COFFEE #{} 01/{:02}", 100 + i, i + 1),
                    4.0 + i as f64 * 0.5,
                    Some("Blue Bottle"),
                    "coffee",
                )
            })
            .collect()
    }

    fn trainer() -> PatternTrainer {
        PatternTrainer::new(PatternConfig::default()).unwrap()
    }

    #[test]
    fn test_tokenize_filters_noise() {
        let tokenizer = Tokenizer::new().unwrap();
        let tokens = tokenizer.tokenize("The COFFEE-shop #1234 $5.25 on 01/15 2024-01-15 at&t, x");
        assert_eq!(tokens, vec!["coffee-shop", "at&t"]);
    }

    #[test]
    fn test_train_offline_builds_pattern() {
        let patterns = trainer().train_offline(&coffee_history(), &categories());
        assert_eq!(patterns.len(), 1);
        let pattern = &patterns["coffee"];
        assert_eq!(pattern.frequency, 10);
        assert_eq!(pattern.keywords[..3], ["blue", "bottle", "coffee"]);
        assert_eq!(pattern.merchants, vec!["blue bottle"]);
        assert_eq!(pattern.examples.len(), 5);
        // 3 unique of 30 tokens: (10 + 100) / 2
        assert!((pattern.confidence - 55.0).abs() < 1e-9);
        let total: f64 = pattern.amount_ranges.iter().map(|r| r.frequency).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_is_capped() {
        let history: Vec<TrainingExample> = (0..12)
            .map(|i| example(&format!("word{} other{}", i, i), 10.0, None, "rent"))
            .collect();
        let patterns = trainer().train_offline(&history, &categories());
        assert_eq!(patterns["rent"].confidence, 80.0);
        assert!(patterns["rent"].keywords.len() <= 10);
    }

    #[test]
    fn test_unknown_categories_skipped() {
        let mut history = coffee_history();
        history.push(example("MYSTERY", 1.0, None, "ghost"));
        let patterns = trainer().train_offline(&history, &categories());
        assert_eq!(patterns.len(), 1);
        assert!(!patterns.contains_key("ghost"));
        assert!(trainer().train_offline(&[], &categories()).is_empty());
    }

    #[test]
    fn test_amount_buckets() {
        let buckets = amount_buckets(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        // bounds 1, 3, 5, 7, 8
        assert_eq!(buckets.len(), 4);
        assert_eq!((buckets[0].min, buckets[0].max), (1.0, 3.0));
        assert_eq!(buckets[0].frequency, 3.0 / 8.0);
        assert_eq!(buckets[3].frequency, 1.0 / 8.0);

        let same = amount_buckets(&[9.99, 9.99, 9.99]);
        assert_eq!(same.len(), 1);
        assert_eq!(same[0].frequency, 1.0);
        assert!(amount_buckets(&[]).is_empty());
    }

    #[test]
    fn test_match_patterns_scores_signals() {
        let config = PatternConfig::default();
        let patterns = trainer().train_offline(&coffee_history(), &categories());
        let tx = Transaction::new("BLUE BOTTLE COFFEE #999", 4.25).with_merchant("Blue Bottle");
        let predictions = match_patterns(&patterns, &tx, &categories(), &config);
        assert_eq!(predictions.len(), 1);
        let p = &predictions[0];
        assert_eq!(p.category_id, "coffee");
        assert!(p.has_source(PredictionSource::Patterns));
        assert!(p.reasoning.contains("keywords"));
        assert!(p.reasoning.contains("merchant \"blue bottle\""));
        assert!(p.confidence > 50.0 && p.confidence <= 100.0);
    }

    #[test]
    fn test_match_patterns_below_threshold() {
        let config = PatternConfig::default();
        let patterns = trainer().train_offline(&coffee_history(), &categories());
        let tx = Transaction::new("SHELL OIL 5521", 45.0);
        assert!(match_patterns(&patterns, &tx, &categories(), &config).is_empty());
    }

    #[test]
    fn test_small_patterns_are_discounted() {
        let config = PatternConfig::default();
        let history = vec![
            example("LANDLORD LLC", 1500.0, None, "rent"),
            example("LANDLORD LLC", 1500.0, None, "rent"),
        ];
        let patterns = trainer().train_offline(&history, &categories());
        let tx = Transaction::new("LANDLORD LLC", 1500.0);
        // 2 keyword hits + amount bucket = 80 raw, × 0.35 confidence × 0.2 frequency
        let predictions = match_patterns(&patterns, &tx, &categories(), &config);
        assert!(predictions.is_empty());
    }

    fn llm(client: AIClient) -> LlmStrategy {
        LlmStrategy::new(
            Some(client),
            PromptLibrary::embedded_only(),
            RuleTable::default(),
            Blender::new(BlendConfig::default()),
            LlmConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_train_refines_keywords() {
        let llm = llm(AIClient::mock());
        let patterns = trainer().train(&coffee_history(), &categories(), Some(&llm)).await;
        // Mock keeps the first five candidates
        assert_eq!(patterns["coffee"].keywords.len(), 3);
        assert_eq!(patterns["coffee"].keywords, vec!["blue", "bottle", "coffee"]);
    }

    #[tokio::test]
    async fn test_train_survives_refinement_failure() {
        let llm = llm(AIClient::Mock(MockBackend::failing()));
        let refined = trainer().train(&coffee_history(), &categories(), Some(&llm)).await;
        let offline = trainer().train_offline(&coffee_history(), &categories());
        assert_eq!(refined, offline);
    }
}
