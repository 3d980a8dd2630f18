//! Mock backend for testing
//!
//! Answers prompts with predictable, keyword-driven JSON, can be scripted
//! with a fixed reply or forced to fail, and records how many calls were in
//! flight at once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::types::ChatRequest;
use super::AIBackend;

/// How the mock answers
#[derive(Debug, Clone, PartialEq)]
pub enum MockMode {
    /// Keyword heuristics over the prompt text
    Heuristic,
    /// Every call fails like a dropped connection
    Fail,
    /// Every call returns this text verbatim
    Fixed(String),
}

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    mode: MockMode,
    latency: Duration,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy, heuristic answers)
    pub fn new() -> Self {
        Self {
            healthy: true,
            mode: MockMode::Heuristic,
            latency: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A mock whose every call fails
    pub fn failing() -> Self {
        Self {
            healthy: false,
            mode: MockMode::Fail,
            ..Self::new()
        }
    }

    /// A mock that always replies with `response`
    pub fn fixed(response: &str) -> Self {
        Self {
            mode: MockMode::Fixed(response.to_string()),
            ..Self::new()
        }
    }

    /// Simulated per-call latency
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn mode(&self) -> &MockMode {
        &self.mode
    }

    /// Total calls made (shared across clones)
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were in flight at the same time
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn respond(&self, request: &ChatRequest) -> Result<String> {
        match &self.mode {
            MockMode::Fail => Err(Error::InvalidData(
                "Mock backend: simulated network error".into(),
            )),
            MockMode::Fixed(text) => Ok(text.clone()),
            MockMode::Heuristic => Ok(heuristic_response(&request.user)),
        }
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        } else {
            tokio::task::yield_now().await;
        }

        let result = self.respond(request);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

/// Answer a rendered prompt the way a cooperative model would
///
/// Shared with the mock HTTP server in `test_utils`.
pub(crate) fn heuristic_response(prompt: &str) -> String {
    if prompt.contains("Candidate keywords") {
        return refine_keywords_mock(prompt);
    }
    categorize_mock(prompt)
}

fn categorize_mock(prompt: &str) -> String {
    let description = quoted_after(prompt, "Description: \"").unwrap_or_default();
    let categories = categories_from_prompt(prompt);
    let d = description.to_uppercase();

    let guesses: &[&str] = if d.contains("STARBUCKS") || d.contains("COFFEE") || d.contains("CAFE")
    {
        &["Food & Dining", "Coffee Shops"]
    } else if d.contains("NETFLIX") || d.contains("SPOTIFY") || d.contains("HULU") {
        &["Entertainment", "Subscriptions"]
    } else if d.contains("AMAZON") || d.contains("TARGET") || d.contains("WALMART") {
        &["Shopping"]
    } else if d.contains("UBER") || d.contains("LYFT") || d.contains("SHELL") {
        &["Transportation"]
    } else if d.contains("PAYROLL") || d.contains("SALARY") {
        &["Salary", "Income"]
    } else if d.contains("RENT") || d.contains("MORTGAGE") {
        &["Housing"]
    } else {
        &[]
    };

    let primary = guesses
        .iter()
        .find_map(|g| categories.iter().find(|c| c.eq_ignore_ascii_case(g)))
        .or_else(|| categories.first());

    let Some(primary) = primary else {
        return r#"{"prediction": {"category": "Unknown", "confidence": 10, "reasoning": "No categories"}, "alternatives": []}"#.to_string();
    };

    let matched = guesses.iter().any(|g| primary.eq_ignore_ascii_case(g));
    let confidence = if matched { 85 } else { 30 };
    let alternatives: Vec<String> = categories
        .iter()
        .filter(|c| *c != primary)
        .take(2)
        .map(|c| {
            format!(
                r#"{{"category": {}, "confidence": 15, "reasoning": "Less likely"}}"#,
                serde_json::Value::String(c.clone())
            )
        })
        .collect();

    format!(
        r#"Here is my answer: {{"prediction": {{"category": {}, "confidence": {}, "reasoning": {}}}, "alternatives": [{}]}}"#,
        serde_json::Value::String(primary.clone()),
        confidence,
        serde_json::Value::String(format!("Description \"{}\" looks like {}", description, primary)),
        alternatives.join(", ")
    )
}

fn refine_keywords_mock(prompt: &str) -> String {
    let limit = prompt
        .split("Choose at most ")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(10);

    let keywords: Vec<serde_json::Value> = line_after(prompt, "Candidate keywords")
        .map(|line| {
            line.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .take(limit.min(5))
                .map(|k| serde_json::Value::String(k.to_string()))
                .collect()
        })
        .unwrap_or_default();

    serde_json::json!({ "keywords": keywords }).to_string()
}

/// Text between `marker` and the next double quote
fn quoted_after(prompt: &str, marker: &str) -> Option<String> {
    let start = prompt.find(marker)? + marker.len();
    let rest = &prompt[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

/// First non-empty line after the line containing `marker`
fn line_after<'a>(prompt: &'a str, marker: &str) -> Option<&'a str> {
    let start = prompt.find(marker)?;
    prompt[start..]
        .lines()
        .skip(1)
        .map(str::trim)
        .find(|l| !l.is_empty())
}

/// Category names from `- Name: description` lines
fn categories_from_prompt(prompt: &str) -> Vec<String> {
    let Some(start) = prompt.find("Available categories:") else {
        return Vec::new();
    };
    prompt[start..]
        .lines()
        .skip(1)
        .map(str::trim)
        .take_while(|l| l.starts_with("- "))
        .map(|l| {
            let entry = &l[2..];
            entry
                .split_once(": ")
                .map(|(name, _)| name)
                .unwrap_or(entry)
                .trim()
                .to_string()
        })
        .collect()
}
