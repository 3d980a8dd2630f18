//! Input loaders for categories, labeled history and transactions to categorize
//!
//! History CSV: `date,description,amount,merchant,kind,category_id`
//! Transactions CSV: `description,amount,merchant,date,account`
//!
//! Columns are found by header name, so order doesn't matter and optional
//! columns may be left out entirely.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Category, TrainingExample, Transaction, TransactionKind};

/// A user's categories plus their labeled history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub categories: Vec<Category>,
    #[serde(default)]
    pub history: Vec<TrainingExample>,
}

impl Profile {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let profile = Self::from_reader(file)?;
        debug!(
            categories = profile.categories.len(),
            history = profile.history.len(),
            "Loaded profile from {}",
            path.display()
        );
        Ok(profile)
    }
}

/// Header name → column index
struct Columns {
    headers: StringRecord,
}

impl Columns {
    fn new(headers: StringRecord) -> Self {
        Self { headers }
    }

    fn index(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    }

    fn optional<'r>(&self, record: &'r StringRecord, name: &str) -> Option<&'r str> {
        self.index(name)
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn required<'r>(&self, record: &'r StringRecord, name: &str, line: usize) -> Result<&'r str> {
        self.optional(record, name)
            .ok_or_else(|| Error::InvalidData(format!("Line {}: missing {}", line, name)))
    }
}

/// Parse labeled history
pub fn load_training_csv<R: Read>(reader: R) -> Result<Vec<TrainingExample>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let columns = Columns::new(rdr.headers()?.clone());

    let mut examples = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let line = i + 2;

        let kind = match columns.optional(&record, "kind") {
            Some(k) => k
                .parse::<TransactionKind>()
                .map_err(|e| Error::InvalidData(format!("Line {}: {}", line, e)))?,
            None => TransactionKind::default(),
        };

        examples.push(TrainingExample {
            date: parse_date(columns.required(&record, "date", line)?)?,
            description: columns.required(&record, "description", line)?.to_string(),
            amount: parse_amount(columns.required(&record, "amount", line)?)?,
            merchant: columns.optional(&record, "merchant").map(str::to_string),
            kind,
            category_id: columns.required(&record, "category_id", line)?.to_string(),
        });
    }

    debug!("Parsed {} training examples", examples.len());
    Ok(examples)
}

/// Parse transactions to categorize
pub fn load_transactions_csv<R: Read>(reader: R) -> Result<Vec<Transaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let columns = Columns::new(rdr.headers()?.clone());

    let mut transactions = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let line = i + 2;

        transactions.push(Transaction {
            description: columns.required(&record, "description", line)?.to_string(),
            amount: parse_amount(columns.required(&record, "amount", line)?)?,
            merchant: columns.optional(&record, "merchant").map(str::to_string),
            date: columns.optional(&record, "date").map(parse_date).transpose()?,
            account: columns.optional(&record, "account").map(str::to_string),
            kind: None,
        });
    }

    debug!("Parsed {} transactions", transactions.len());
    Ok(transactions)
}

/// Parse a date string in various common formats
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    let formats = [
        "%Y-%m-%d", // 2024-01-15
        "%m/%d/%y", // 01/15/24 (before %Y, which would read "24" as year 24)
        "%m/%d/%Y", // 01/15/2024
        "%m-%d-%Y", // 01-15-2024
    ];

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }

    Err(Error::InvalidData(format!("Unable to parse date: {}", s)))
}

/// Parse an amount string, handling currency symbols and commas
fn parse_amount(s: &str) -> Result<f64> {
    let cleaned: String = s
        .trim()
        .replace(['$', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    cleaned
        .parse::<f64>()
        .map_err(|_| Error::InvalidData(format!("Unable to parse amount: {}", s)))
}
