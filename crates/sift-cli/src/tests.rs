//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use sift_core::test_utils::MockLlmServer;
use sift_core::{AIClient, Category, MockBackend, Profile, TrainingExample, TransactionKind};
use tempfile::TempDir;

use crate::commands::{self, truncate, Session};

fn example(description: &str, amount: f64, day: u32, category: &str) -> TrainingExample {
    TrainingExample {
        description: description.to_string(),
        amount,
        merchant: None,
        date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
        kind: TransactionKind::Expense,
        category_id: category.to_string(),
    }
}

fn write_profile(dir: &Path) -> PathBuf {
    let mut history = Vec::new();
    for day in 1..=12 {
        history.push(example("IRONWORKS GYM DUES", 49.0, day, "fitness"));
        history.push(example("CORNER ROAST CAFE", 4.5, day, "food"));
    }
    let profile = Profile {
        categories: vec![
            Category::new("food", "Food & Dining"),
            Category::new("fitness", "Fitness"),
            Category::new("shopping", "Shopping"),
            Category::new("other", "Other"),
        ],
        history,
    };
    let path = dir.join("profile.json");
    fs::write(&path, serde_json::to_string(&profile).unwrap()).unwrap();
    path
}

fn session(dir: &TempDir, client: Option<AIClient>) -> Session {
    Session {
        profile: write_profile(dir.path()),
        model: dir.path().join("model.json"),
        config: None,
        client,
    }
}

// ========== Training Command Tests ==========

#[tokio::test]
async fn test_cmd_train_writes_model() {
    let dir = TempDir::new().unwrap();
    let session = session(&dir, None);

    commands::cmd_train(&session, None).await.unwrap();
    assert!(session.model.exists());

    let engine = session.open_engine().unwrap();
    assert_eq!(engine.get_model_stats().pattern_count, 2);
}

#[tokio::test]
async fn test_cmd_train_with_history_csv() {
    let dir = TempDir::new().unwrap();
    let session = session(&dir, None);
    let csv = dir.path().join("extra.csv");
    fs::write(
        &csv,
        "date,description,amount,merchant,kind,category_id\n2024-04-01,AMAZON MKTPLACE,19.99,Amazon,expense,shopping\n",
    )
    .unwrap();

    commands::cmd_train(&session, Some(&csv)).await.unwrap();

    let engine = session.open_engine().unwrap();
    assert_eq!(engine.get_model_stats().pattern_count, 3);
}

#[tokio::test]
async fn test_cmd_train_missing_profile() {
    let dir = TempDir::new().unwrap();
    let session = Session {
        profile: dir.path().join("nope.json"),
        model: dir.path().join("model.json"),
        config: None,
        client: None,
    };
    let err = commands::cmd_train(&session, None).await.unwrap_err();
    assert!(err.to_string().contains("Failed to read profile"));
}

// ========== Categorize Command Tests ==========

#[tokio::test]
async fn test_cmd_categorize() {
    let dir = TempDir::new().unwrap();
    let session = session(&dir, None);
    commands::cmd_train(&session, None).await.unwrap();

    let result = commands::cmd_categorize(
        &session,
        "IRONWORKS GYM DUES",
        49.0,
        None,
        Some("2024-03-30"),
        false,
    )
    .await;
    assert!(result.is_ok());

    let json = commands::cmd_categorize(&session, "Starbucks Coffee", 5.25, None, None, true).await;
    assert!(json.is_ok());
}

#[tokio::test]
async fn test_cmd_categorize_bad_date() {
    let dir = TempDir::new().unwrap();
    let session = session(&dir, None);
    let result =
        commands::cmd_categorize(&session, "COFFEE", 3.0, None, Some("someday"), false).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_cmd_batch_writes_json() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("engine.toml");
    fs::write(&config, "[batch]\ndelay_ms = 0\n").unwrap();
    let mut session = session(&dir, Some(AIClient::Mock(MockBackend::new())));
    session.config = Some(config);

    let input = dir.path().join("input.csv");
    fs::write(
        &input,
        "description,amount,merchant,date,account\nCORNER ROAST CAFE,4.50,,2024-03-20,Visa\nAMAZON MKTPLACE,19.99,Amazon,,\n",
    )
    .unwrap();
    let output = dir.path().join("out.json");

    commands::cmd_batch(&session, &input, Some(&output)).await.unwrap();

    let rows: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["result"]["prediction"]["category_id"], "food");
    assert_eq!(rows[1]["result"]["prediction"]["category_id"], "shopping");
    assert_eq!(rows[1]["transaction"]["merchant"], "Amazon");
}

// ========== Stats / Feedback Command Tests ==========

#[tokio::test]
async fn test_cmd_stats_and_feedback() {
    let dir = TempDir::new().unwrap();
    let session = session(&dir, None);

    assert!(commands::cmd_stats(&session).is_ok());

    commands::cmd_train(&session, None).await.unwrap();
    commands::cmd_feedback(&session, "food", "food").unwrap();

    let before = session.open_engine().unwrap().get_model_stats();
    commands::cmd_feedback(&session, "food", "shopping").unwrap();
    let after = session.open_engine().unwrap().get_model_stats();
    assert_eq!(after.total_predictions, before.total_predictions + 1);
    assert_eq!(after.correct_predictions, before.correct_predictions);

    assert!(commands::cmd_feedback(&session, "food", "pets").is_err());
}

// ========== AI Command Tests ==========

#[tokio::test]
async fn test_cmd_ai_test_without_backend() {
    let dir = TempDir::new().unwrap();
    let session = session(&dir, None);
    assert!(commands::cmd_ai_test(&session, None).await.is_ok());
}

#[tokio::test]
async fn test_cmd_ai_test_against_mock_server() {
    let server = MockLlmServer::start().await;
    let dir = TempDir::new().unwrap();
    let session = session(&dir, Some(AIClient::ollama(&server.url(), "llama3.2")));

    commands::cmd_ai_test(&session, Some("CORNER ROAST CAFE")).await.unwrap();
    assert_eq!(server.request_count(), 1);
}

// ========== Prompts Command Tests ==========

#[test]
fn test_cmd_prompts() {
    assert!(commands::cmd_prompts_list().is_ok());
    assert!(commands::cmd_prompts_show("categorize_transaction").is_ok());
    let err = commands::cmd_prompts_show("no_such_prompt").unwrap_err();
    assert!(err.to_string().contains("refine_keywords"));
    assert!(commands::cmd_prompts_path().is_ok());
}

// ========== Helper Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a much longer description", 10), "a much ...");
    assert_eq!(truncate("café crème brûlée", 8), "café ...");
}
