//! Prediction blending
//!
//! Merges the per-strategy prediction lists into one ranked list. Predictions
//! for the same category are averaged, and agreement between different
//! strategies is rewarded with a multiplicative boost.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::BlendConfig;
use crate::models::{CategorizationResult, Category, Prediction, PredictionSource};

/// Category names treated as the catch-all default, in preference order
const DEFAULT_CATEGORY_NAMES: &[&str] = &["Other", "Uncategorized", "Miscellaneous", "General"];

#[derive(Default)]
struct Merged {
    category_name: String,
    confidences: Vec<f64>,
    reasons: Vec<String>,
    sources: BTreeSet<PredictionSource>,
}

#[derive(Debug, Clone)]
pub struct Blender {
    config: BlendConfig,
}

impl Blender {
    pub fn new(config: BlendConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BlendConfig {
        &self.config
    }

    /// Merge strategy outputs into a ranked, truncated list
    ///
    /// confidence = mean × (1 + (distinct_sources − 1) × agreement_boost),
    /// clamped to [0, ceiling]. Sorted descending, ties by category id.
    pub fn combine(&self, lists: Vec<Vec<Prediction>>) -> Vec<Prediction> {
        let mut merged: BTreeMap<String, Merged> = BTreeMap::new();

        for prediction in lists.into_iter().flatten() {
            let entry = merged.entry(prediction.category_id).or_default();
            entry.category_name = prediction.category_name;
            entry.confidences.push(prediction.confidence);
            if !prediction.reasoning.is_empty() && !entry.reasons.contains(&prediction.reasoning) {
                entry.reasons.push(prediction.reasoning);
            }
            entry.sources.extend(prediction.sources);
        }

        let mut blended: Vec<Prediction> = merged
            .into_iter()
            .map(|(category_id, m)| {
                let mean = m.confidences.iter().sum::<f64>() / m.confidences.len() as f64;
                let extra_sources = m.sources.len().saturating_sub(1) as f64;
                let boosted = mean * (1.0 + extra_sources * self.config.agreement_boost);
                Prediction {
                    category_id,
                    category_name: m.category_name,
                    confidence: boosted.clamp(0.0, self.config.confidence_ceiling),
                    reasoning: m.reasons.join("; "),
                    sources: m.sources,
                }
            })
            .collect();

        sort_predictions(&mut blended);
        blended.truncate(self.config.top_n);
        blended
    }

    /// True when the top prediction reaches the high-confidence threshold
    pub fn is_high_confidence(&self, predictions: &[Prediction]) -> bool {
        predictions
            .first()
            .is_some_and(|p| p.confidence >= self.config.high_confidence_threshold)
    }

    /// Catch-all prediction used when no strategy produced anything
    pub fn default_prediction(&self, categories: &[Category]) -> Option<Prediction> {
        let category = DEFAULT_CATEGORY_NAMES
            .iter()
            .find_map(|name| categories.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
            .or_else(|| categories.first())?;

        Some(Prediction::new(
            category,
            self.config.default_confidence,
            "No strategy matched; using default category",
            PredictionSource::Rules,
        ))
    }

    /// Split a blended list into primary + alternatives
    ///
    /// Falls back to the default category when `blended` is empty; returns
    /// None only when there are no categories at all.
    pub fn to_result(
        &self,
        blended: Vec<Prediction>,
        categories: &[Category],
    ) -> Option<CategorizationResult> {
        let blended = if blended.is_empty() {
            vec![self.default_prediction(categories)?]
        } else {
            blended
        };

        let is_high_confidence = self.is_high_confidence(&blended);
        let mut iter = blended.into_iter();
        let prediction = iter.next()?;
        Some(CategorizationResult {
            prediction,
            alternatives: iter.collect(),
            is_high_confidence,
        })
    }
}

/// Descending by confidence, ties by category id
pub(crate) fn sort_predictions(predictions: &mut [Prediction]) {
    predictions.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.category_id.cmp(&b.category_id))
    });
}
