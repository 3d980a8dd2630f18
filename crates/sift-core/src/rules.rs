//! Static keyword rule table
//!
//! The last line of defense: a fixed, ordered list of keyword → category
//! rules that needs no training and no network. Rules name categories, not
//! ids, and only fire when the user actually has a category of that name.

use std::collections::HashSet;

use tracing::debug;

use crate::models::{Category, Prediction, PredictionSource, Transaction};

/// One keyword rule
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Plain words match whole description tokens; phrases and punctuated
    /// keywords (`at&t`, `booking.com`) match as substrings
    pub keywords: Vec<String>,
    /// Category name, matched case-insensitively
    pub category: String,
    pub confidence: f64,
}

impl Rule {
    pub fn new(keywords: &[&str], category: &str, confidence: f64) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            category: category.to_string(),
            confidence,
        }
    }

    /// First keyword of this rule found in the transaction text
    fn first_hit(&self, text: &str, tokens: &HashSet<&str>) -> Option<&str> {
        self.keywords
            .iter()
            .find(|k| {
                if k.chars().all(char::is_alphanumeric) {
                    tokens.contains(k.as_str())
                } else {
                    text.contains(k.as_str())
                }
            })
            .map(String::as_str)
    }
}

/// Ordered rule list; earlier rules win when two name the same category
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Predictions from every rule whose keywords appear in the transaction
    ///
    /// At most one prediction per category; rules naming a category the user
    /// doesn't have are ignored.
    pub fn match_rules(&self, tx: &Transaction, categories: &[Category]) -> Vec<Prediction> {
        let text = match &tx.merchant {
            Some(merchant) => format!("{} {}", tx.description, merchant).to_lowercase(),
            None => tx.description.to_lowercase(),
        };
        let tokens: HashSet<&str> = text
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|t| !t.is_empty())
            .collect();

        let mut seen: HashSet<&str> = HashSet::new();
        let mut predictions = Vec::new();

        for rule in &self.rules {
            let Some(hit) = rule.first_hit(&text, &tokens) else {
                continue;
            };
            let Some(category) = categories
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(&rule.category))
            else {
                continue;
            };
            if !seen.insert(category.id.as_str()) {
                continue;
            }

            predictions.push(Prediction::new(
                category,
                rule.confidence,
                format!("Rule: \"{}\" suggests {}", hit, category.name),
                PredictionSource::Rules,
            ));
        }

        debug!(
            description = %tx.description,
            matches = predictions.len(),
            "Rule table evaluated"
        );
        predictions
    }

    /// Highest-confidence rule prediction, if any
    pub fn best_match(&self, tx: &Transaction, categories: &[Category]) -> Option<Prediction> {
        self.match_rules(tx, categories).into_iter().max_by(|a, b| {
            a.confidence
                .total_cmp(&b.confidence)
                .then_with(|| b.category_id.cmp(&a.category_id))
        })
    }
}

/// Built-in rules for common personal-finance categories
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            &["salary", "payroll", "paycheck", "direct deposit", "wages"],
            "Salary",
            90.0,
        ),
        Rule::new(&["rent", "mortgage", "landlord", "hoa"], "Housing", 80.0),
        Rule::new(
            &[
                "electric", "electricity", "water", "gas bill", "utility", "utilities",
                "internet", "comcast", "verizon", "at&t", "t-mobile", "phone bill",
            ],
            "Bills & Utilities",
            75.0,
        ),
        Rule::new(
            &[
                "grocery", "groceries", "supermarket", "restaurant", "coffee", "cafe",
                "starbucks", "mcdonald's", "mcdonalds", "pizza", "burger", "doordash",
                "grubhub", "uber eats", "bakery", "diner",
            ],
            "Food & Dining",
            75.0,
        ),
        Rule::new(
            &[
                "uber", "lyft", "taxi", "fuel", "gasoline", "shell", "chevron", "exxon",
                "parking", "toll", "transit", "metro",
            ],
            "Transportation",
            70.0,
        ),
        Rule::new(
            &[
                "pharmacy", "doctor", "dental", "dentist", "hospital", "clinic", "cvs",
                "walgreens", "medical",
            ],
            "Healthcare",
            70.0,
        ),
        Rule::new(
            &[
                "netflix", "spotify", "hulu", "disney+", "cinema", "movie", "theater",
                "steam", "concert", "tickets",
            ],
            "Entertainment",
            70.0,
        ),
        Rule::new(
            &[
                "airline", "airlines", "hotel", "airbnb", "expedia", "booking.com",
                "flight", "delta", "united",
            ],
            "Travel",
            70.0,
        ),
        Rule::new(
            &[
                "amazon", "walmart", "target", "costco", "ebay", "etsy", "best buy",
                "purchase", "store",
            ],
            "Shopping",
            65.0,
        ),
        Rule::new(
            &["transfer", "zelle", "venmo", "paypal", "withdrawal", "atm"],
            "Transfer",
            60.0,
        ),
        Rule::new(&["insurance", "geico", "allstate", "premium"], "Insurance", 70.0),
        Rule::new(&["tuition", "school", "university", "course"], "Education", 65.0),
        Rule::new(&["interest", "dividend", "refund", "cashback"], "Income", 60.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> Vec<Category> {
        vec![
            Category::new("food", "Food & Dining"),
            Category::new("shop", "Shopping"),
            Category::new("salary", "Salary"),
            Category::new("transport", "Transportation"),
            Category::new("other", "Other"),
        ]
    }

    #[test]
    fn test_coffee_matches_food() {
        let table = RuleTable::default();
        let predictions = table.match_rules(&Transaction::new("Starbucks Coffee", 5.25), &categories());
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].category_id, "food");
        assert_eq!(predictions[0].confidence, 75.0);
        assert!(predictions[0].has_source(PredictionSource::Rules));
        assert!(predictions[0].reasoning.contains("coffee") || predictions[0].reasoning.contains("starbucks"));
    }

    #[test]
    fn test_phrase_matches_as_substring() {
        let table = RuleTable::default();
        let tx = Transaction::new("ACME CORP DIRECT DEPOSIT", 2500.0);
        let best = table.best_match(&tx, &categories()).unwrap();
        assert_eq!(best.category_id, "salary");
        assert_eq!(best.confidence, 90.0);
    }

    #[test]
    fn test_single_word_needs_whole_token() {
        let table = RuleTable::default();
        // "targeted" must not fire the "target" rule
        let tx = Transaction::new("Targeted ads credit", 3.0);
        assert!(table.match_rules(&tx, &categories()).is_empty());
    }

    #[test]
    fn test_multiple_rules_can_match() {
        let table = RuleTable::default();
        let tx = Transaction::new("UBER EATS order", 18.0);
        let predictions = table.match_rules(&tx, &categories());
        let ids: Vec<&str> = predictions.iter().map(|p| p.category_id.as_str()).collect();
        assert!(ids.contains(&"food"));
        assert!(ids.contains(&"transport"));
    }

    #[test]
    fn test_missing_category_is_ignored() {
        let table = RuleTable::default();
        let tx = Transaction::new("NETFLIX.COM", 15.99);
        assert!(table.match_rules(&tx, &categories()).is_empty());
    }

    #[test]
    fn test_merchant_is_searched() {
        let table = RuleTable::default();
        let tx = Transaction::new("POS 4411", 40.0).with_merchant("Walmart");
        let best = table.best_match(&tx, &categories()).unwrap();
        assert_eq!(best.category_id, "shop");
    }

    #[test]
    fn test_first_rule_wins_per_category() {
        let table = RuleTable::new(vec![
            Rule::new(&["coffee"], "food & dining", 40.0),
            Rule::new(&["coffee"], "Food & Dining", 75.0),
        ]);
        let predictions = table.match_rules(&Transaction::new("coffee", 3.0), &categories());
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].confidence, 40.0);
    }

    #[test]
    fn test_punctuated_keywords_match_as_substrings() {
        let table = RuleTable::default();
        let categories = vec![
            Category::new("bills", "Bills & Utilities"),
            Category::new("fun", "Entertainment"),
            Category::new("travel", "Travel"),
        ];
        for (description, expected) in [
            ("AT&T WIRELESS", "bills"),
            ("T-MOBILE BILL", "bills"),
            ("DISNEY+ SUBSCRIPTION", "fun"),
            ("BOOKING.COM RESERVATION", "travel"),
        ] {
            let best = table
                .best_match(&Transaction::new(description, 50.0), &categories)
                .unwrap_or_else(|| panic!("no rule matched {}", description));
            assert_eq!(best.category_id, expected, "{}", description);
        }
    }
}
