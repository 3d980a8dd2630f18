//! Domain models for Sift

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A user-defined category (read-only reference data)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Category {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

/// Direction of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    #[default]
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" | "credit" => Ok(Self::Income),
            "expense" | "debit" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction kind: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A historical transaction already labeled with a category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub description: String,
    pub amount: f64,
    #[serde(default)]
    pub merchant: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub kind: TransactionKind,
    pub category_id: String,
}

/// A transaction to categorize
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Transaction {
    pub description: String,
    pub amount: f64,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub kind: Option<TransactionKind>,
}

impl Transaction {
    pub fn new(description: &str, amount: f64) -> Self {
        Self {
            description: description.to_string(),
            amount,
            ..Default::default()
        }
    }

    pub fn with_merchant(mut self, merchant: &str) -> Self {
        self.merchant = Some(merchant.to_string());
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

impl From<&TrainingExample> for Transaction {
    fn from(example: &TrainingExample) -> Self {
        Self {
            description: example.description.clone(),
            amount: example.amount,
            merchant: example.merchant.clone(),
            date: Some(example.date),
            account: None,
            kind: Some(example.kind),
        }
    }
}

/// An amount bucket observed for a category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: f64,
    pub max: f64,
    /// Fraction (0..=1) of the category's examples that fell in this bucket
    pub frequency: f64,
}

impl AmountRange {
    pub fn contains(&self, amount: f64) -> bool {
        amount >= self.min && amount <= self.max
    }
}

/// Per-category statistical profile derived from labeled history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPattern {
    pub category_id: String,
    pub keywords: Vec<String>,
    pub amount_ranges: Vec<AmountRange>,
    pub merchants: Vec<String>,
    /// 0-100, capped by the trainer
    pub confidence: f64,
    /// Number of examples the pattern was built from
    pub frequency: usize,
    /// A handful of example descriptions, for display
    pub examples: Vec<String>,
}

/// Which strategy produced a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionSource {
    Patterns,
    Ai,
    Rules,
}

impl PredictionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patterns => "patterns",
            Self::Ai => "ai",
            Self::Rules => "rules",
        }
    }
}

impl std::fmt::Display for PredictionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single category prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub category_id: String,
    pub category_name: String,
    /// 0-100
    pub confidence: f64,
    pub reasoning: String,
    pub sources: BTreeSet<PredictionSource>,
}

impl Prediction {
    pub fn new(
        category: &Category,
        confidence: f64,
        reasoning: impl Into<String>,
        source: PredictionSource,
    ) -> Self {
        Self {
            category_id: category.id.clone(),
            category_name: category.name.clone(),
            confidence: confidence.clamp(0.0, 100.0),
            reasoning: reasoning.into(),
            sources: BTreeSet::from([source]),
        }
    }

    pub fn has_source(&self, source: PredictionSource) -> bool {
        self.sources.contains(&source)
    }
}

/// Result of categorizing one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizationResult {
    pub prediction: Prediction,
    pub alternatives: Vec<Prediction>,
    pub is_high_confidence: bool,
}

/// Aggregate model bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStats {
    /// Whole-number percent
    pub accuracy: f64,
    pub total_predictions: u64,
    pub correct_predictions: u64,
    pub last_trained: Option<DateTime<Utc>>,
    pub version: String,
    pub pattern_count: usize,
}
