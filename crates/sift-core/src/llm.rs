//! LLM prediction strategy
//!
//! Renders the `categorize_transaction` prompt, sends it to the configured
//! backend, and maps the model's JSON answer back onto the user's categories.
//! Also owns keyword refinement for the pattern trainer, since both share the
//! backend and the prompt library.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::ai::parsing::{parse_keyword_response, parse_model_response};
use crate::ai::{AIBackend, AIClient, ChatRequest};
use crate::blend::Blender;
use crate::config::LlmConfig;
use crate::error::StrategyError;
use crate::models::{Category, Prediction, PredictionSource, Transaction};
use crate::prompts::{PromptId, PromptLibrary};
use crate::rules::RuleTable;

#[derive(Clone)]
pub struct LlmStrategy {
    client: Option<AIClient>,
    prompts: Arc<Mutex<PromptLibrary>>,
    rules: RuleTable,
    blender: Blender,
    config: LlmConfig,
}

impl LlmStrategy {
    pub fn new(
        client: Option<AIClient>,
        prompts: PromptLibrary,
        rules: RuleTable,
        blender: Blender,
        config: LlmConfig,
    ) -> Self {
        let client = client.map(|c| c.with_timeout(config.timeout));
        Self {
            client,
            prompts: Arc::new(Mutex::new(prompts)),
            rules,
            blender,
            config,
        }
    }

    pub fn client(&self) -> Option<&AIClient> {
        self.client.as_ref()
    }

    pub fn is_available(&self) -> bool {
        self.client.is_some()
    }

    /// One model call; every failure is reported to the caller
    pub async fn try_predict(
        &self,
        tx: &Transaction,
        categories: &[Category],
    ) -> Result<Vec<Prediction>, StrategyError> {
        let client = self.client.as_ref().ok_or(StrategyError::Unavailable)?;
        let request = self.categorize_request(tx, categories)?;

        let text = client.chat(&request).await?;
        let parsed = parse_model_response(&text)
            .map_err(|e| StrategyError::MalformedResponse(e.to_string()))?;

        let mut seen = HashSet::new();
        let mut predictions = Vec::new();
        for pick in std::iter::once(parsed.prediction).chain(parsed.alternatives) {
            let Some(category) = resolve_category(&pick.category, categories) else {
                debug!(answer = %pick.category, "Model named an unknown category, dropping");
                continue;
            };
            if !seen.insert(category.id.clone()) {
                continue;
            }
            let reasoning = if pick.reasoning.trim().is_empty() {
                format!("AI: looks like {}", category.name)
            } else {
                format!("AI: {}", pick.reasoning.trim())
            };
            predictions.push(Prediction::new(
                category,
                normalize_confidence(pick.confidence),
                reasoning,
                PredictionSource::Ai,
            ));
        }

        if predictions.is_empty() {
            return Err(StrategyError::NoKnownCategory);
        }

        debug!(
            description = %tx.description,
            top = %predictions[0].category_name,
            confidence = predictions[0].confidence,
            "AI prediction"
        );
        Ok(predictions)
    }

    /// Like `try_predict`, but degrades to the rule table (capped) or the
    /// default category instead of failing
    pub async fn ask_model(&self, tx: &Transaction, categories: &[Category]) -> Vec<Prediction> {
        match self.try_predict(tx, categories).await {
            Ok(predictions) => predictions,
            Err(e) => {
                warn!(description = %tx.description, error = %e, "AI prediction failed, using rule fallback");
                self.fallback(tx, categories).into_iter().collect()
            }
        }
    }

    fn fallback(&self, tx: &Transaction, categories: &[Category]) -> Option<Prediction> {
        match self.rules.best_match(tx, categories) {
            Some(mut prediction) => {
                prediction.confidence = prediction.confidence.min(self.config.fallback_confidence);
                prediction.reasoning = format!("AI unavailable; {}", prediction.reasoning);
                Some(prediction)
            }
            None => self.blender.default_prediction(categories),
        }
    }

    /// Ask the model to keep the most discriminative keywords
    ///
    /// Returns lower-cased, de-duplicated keywords, at most `limit`.
    pub async fn refine_keywords(
        &self,
        category: &Category,
        samples: &[&str],
        candidates: &[String],
        limit: usize,
    ) -> Result<Vec<String>, StrategyError> {
        let client = self.client.as_ref().ok_or(StrategyError::Unavailable)?;

        let samples_text = samples
            .iter()
            .map(|s| format!("- {}", s))
            .collect::<Vec<_>>()
            .join("\n");
        let keywords_text = candidates.join(", ");
        let limit_text = limit.to_string();

        let mut vars = HashMap::new();
        vars.insert("category", category.name.as_str());
        vars.insert("description", category.description.as_deref().unwrap_or(""));
        vars.insert("samples", samples_text.as_str());
        vars.insert("keywords", keywords_text.as_str());
        vars.insert("limit", limit_text.as_str());
        let request = self.render(PromptId::RefineKeywords, &vars)?;

        let text = client.chat(&request).await?;
        let keywords =
            parse_keyword_response(&text).map_err(|e| StrategyError::MalformedResponse(e.to_string()))?;

        let mut seen = HashSet::new();
        let refined: Vec<String> = keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty() && seen.insert(k.clone()))
            .take(limit)
            .collect();

        if refined.is_empty() {
            return Err(StrategyError::MalformedResponse("empty keyword list".into()));
        }
        Ok(refined)
    }

    fn categorize_request(
        &self,
        tx: &Transaction,
        categories: &[Category],
    ) -> Result<ChatRequest, StrategyError> {
        let amount = format!("{:.2}", tx.amount);
        let date = tx.date.map(|d| d.to_string()).unwrap_or_default();
        let category_list = categories
            .iter()
            .map(|c| match &c.description {
                Some(d) if !d.trim().is_empty() => format!("- {}: {}", c.name, d.trim()),
                _ => format!("- {}", c.name),
            })
            .collect::<Vec<_>>()
            .join("\n");

        let mut vars = HashMap::new();
        vars.insert("description", tx.description.as_str());
        vars.insert("amount", amount.as_str());
        vars.insert("merchant", tx.merchant.as_deref().unwrap_or(""));
        vars.insert("date", date.as_str());
        vars.insert("account", tx.account.as_deref().unwrap_or(""));
        vars.insert("kind", tx.kind.map(|k| k.as_str()).unwrap_or(""));
        vars.insert("categories", category_list.as_str());

        self.render(PromptId::CategorizeTransaction, &vars)
    }

    fn render(&self, id: PromptId, vars: &HashMap<&str, &str>) -> Result<ChatRequest, StrategyError> {
        let mut library = self.prompts.lock().unwrap_or_else(|e| e.into_inner());
        let prompt = library.get(id).map_err(StrategyError::Backend)?;
        Ok(ChatRequest::new(prompt.render_system(), prompt.render_user(vars)))
    }
}

/// Map a model answer to a known category: exact id first, then name
fn resolve_category<'a>(answer: &str, categories: &'a [Category]) -> Option<&'a Category> {
    let answer = answer.trim();
    categories
        .iter()
        .find(|c| c.id == answer)
        .or_else(|| categories.iter().find(|c| c.name.eq_ignore_ascii_case(answer)))
}

/// Accept 0-1 or 0-100 and clamp to 0-100
fn normalize_confidence(raw: f64) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }
    let scaled = if raw > 0.0 && raw <= 1.0 { raw * 100.0 } else { raw };
    scaled.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;
    use crate::config::BlendConfig;

    fn categories() -> Vec<Category> {
        vec![
            Category::new("food", "Food & Dining").with_description("Restaurants, coffee, groceries"),
            Category::new("shop", "Shopping"),
            Category::new("other", "Other"),
        ]
    }

    fn strategy(client: Option<AIClient>) -> LlmStrategy {
        LlmStrategy::new(
            client,
            PromptLibrary::embedded_only(),
            RuleTable::default(),
            Blender::new(BlendConfig::default()),
            LlmConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_try_predict_with_mock() {
        let llm = strategy(Some(AIClient::mock()));
        let predictions = llm
            .try_predict(&Transaction::new("STARBUCKS #1234", 5.25), &categories())
            .await
            .unwrap();
        assert_eq!(predictions[0].category_id, "food");
        assert_eq!(predictions[0].confidence, 85.0);
        assert!(predictions[0].has_source(PredictionSource::Ai));
        assert!(predictions[0].reasoning.starts_with("AI: "));
        assert_eq!(predictions.len(), 3);
    }

    #[tokio::test]
    async fn test_try_predict_without_backend() {
        let llm = strategy(None);
        let err = llm
            .try_predict(&Transaction::new("x", 1.0), &categories())
            .await
            .unwrap_err();
        assert!(matches!(err, StrategyError::Unavailable));
    }

    #[tokio::test]
    async fn test_try_predict_maps_ids_and_fractional_confidence() {
        let reply = r#"{"prediction": {"category": "shop", "confidence": 0.7, "reasoning": "store"}, "alternatives": [{"category": "FOOD & DINING", "confidence": 250}]}"#;
        let llm = strategy(Some(AIClient::Mock(MockBackend::fixed(reply))));
        let predictions = llm
            .try_predict(&Transaction::new("x", 1.0), &categories())
            .await
            .unwrap();
        assert_eq!(predictions[0].category_id, "shop");
        assert!((predictions[0].confidence - 70.0).abs() < 1e-9);
        assert_eq!(predictions[1].category_id, "food");
        assert_eq!(predictions[1].confidence, 100.0);
    }

    #[tokio::test]
    async fn test_try_predict_unknown_category() {
        let reply = r#"{"prediction": {"category": "Pets", "confidence": 90}, "alternatives": []}"#;
        let llm = strategy(Some(AIClient::Mock(MockBackend::fixed(reply))));
        let err = llm
            .try_predict(&Transaction::new("x", 1.0), &categories())
            .await
            .unwrap_err();
        assert!(matches!(err, StrategyError::NoKnownCategory));
    }

    #[tokio::test]
    async fn test_try_predict_malformed() {
        let llm = strategy(Some(AIClient::Mock(MockBackend::fixed("groceries, probably"))));
        let err = llm
            .try_predict(&Transaction::new("x", 1.0), &categories())
            .await
            .unwrap_err();
        assert!(matches!(err, StrategyError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_ask_model_falls_back_to_capped_rule() {
        let llm = strategy(Some(AIClient::Mock(MockBackend::failing())));
        let predictions = llm
            .ask_model(&Transaction::new("Amazon Purchase", 25.0), &categories())
            .await;
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].category_id, "shop");
        assert_eq!(predictions[0].confidence, 50.0);
        assert!(!predictions[0].has_source(PredictionSource::Ai));
    }

    #[tokio::test]
    async fn test_ask_model_falls_back_to_default() {
        let llm = strategy(None);
        let predictions = llm
            .ask_model(&Transaction::new("ZXQ 99812", 12.0), &categories())
            .await;
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].category_id, "other");
        assert_eq!(predictions[0].confidence, 10.0);
    }

    #[tokio::test]
    async fn test_refine_keywords() {
        let llm = strategy(Some(AIClient::mock()));
        let candidates: Vec<String> = ["coffee", "starbucks", "latte", "main"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let refined = llm
            .refine_keywords(&categories()[0], &["STARBUCKS #1"], &candidates, 2)
            .await
            .unwrap();
        assert_eq!(refined, vec!["coffee", "starbucks"]);
    }

    #[tokio::test]
    async fn test_refine_keywords_empty_is_error() {
        let llm = strategy(Some(AIClient::Mock(MockBackend::fixed(r#"{"keywords": []}"#))));
        let result = llm
            .refine_keywords(&categories()[0], &[], &["coffee".to_string()], 10)
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_normalize_confidence() {
        assert_eq!(normalize_confidence(0.85), 85.0);
        assert_eq!(normalize_confidence(85.0), 85.0);
        assert_eq!(normalize_confidence(-3.0), 0.0);
        assert_eq!(normalize_confidence(f64::NAN), 0.0);
        assert_eq!(normalize_confidence(0.0), 0.0);
    }
}
