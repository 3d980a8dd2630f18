//! Categorization command implementations

use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result};
use sift_core::import::parse_date;
use sift_core::{load_transactions_csv, CategorizationResult, Prediction, Transaction};

use super::{truncate, Session};

/// Categorize one transaction and print the ranked predictions
pub async fn cmd_categorize(
    session: &Session,
    description: &str,
    amount: f64,
    merchant: Option<&str>,
    date: Option<&str>,
    json: bool,
) -> Result<()> {
    let engine = session.open_engine()?;

    let mut tx = Transaction::new(description, amount);
    if let Some(merchant) = merchant {
        tx = tx.with_merchant(merchant);
    }
    if let Some(date) = date {
        tx = tx.with_date(parse_date(date).context("Invalid --date")?);
    }

    let result = engine.categorize_transaction(&tx).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{}  {:.2}", tx.description, tx.amount);
    print_prediction("→", &result.prediction);
    println!("    {}", result.prediction.reasoning);
    for alt in &result.alternatives {
        print_prediction(" ", alt);
    }
    if !result.is_high_confidence {
        println!();
        println!("⚠️  Low confidence: review this one");
    }

    Ok(())
}

/// Categorize every row of a CSV
pub async fn cmd_batch(session: &Session, input: &Path, output: Option<&Path>) -> Result<()> {
    let engine = session.open_engine()?;

    let file = File::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
    let transactions = load_transactions_csv(file)
        .with_context(|| format!("Failed to parse {}", input.display()))?;

    println!("📋 Categorizing {} transactions...", transactions.len());
    let results = engine.batch_categorize_transactions(&transactions).await?;

    match output {
        Some(path) => {
            let rows: Vec<BatchRow> = transactions
                .iter()
                .zip(&results)
                .map(|(tx, result)| BatchRow { transaction: tx, result })
                .collect();
            fs::write(path, serde_json::to_string_pretty(&rows)?)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✅ Wrote {} results to {}", rows.len(), path.display());
        }
        None => {
            println!();
            println!(
                "{:<40} {:>10}  {:<24} {:>5}  {}",
                "DESCRIPTION", "AMOUNT", "CATEGORY", "CONF", "SOURCES"
            );
            println!("{}", "-".repeat(95));
            for (tx, result) in transactions.iter().zip(&results) {
                let p = &result.prediction;
                println!(
                    "{:<40} {:>10.2}  {:<24} {:>4.0}%  {}",
                    truncate(&tx.description, 40),
                    tx.amount,
                    truncate(&p.category_name, 24),
                    p.confidence,
                    sources(p)
                );
            }
        }
    }

    let low = results.iter().filter(|r| !r.is_high_confidence).count();
    if low > 0 {
        println!();
        println!("⚠️  {} of {} need review (low confidence)", low, results.len());
    }

    Ok(())
}

#[derive(serde::Serialize)]
struct BatchRow<'a> {
    transaction: &'a Transaction,
    result: &'a CategorizationResult,
}

fn print_prediction(marker: &str, p: &Prediction) {
    println!(
        "  {} {:<24} {:>4.0}%  [{}]",
        marker,
        truncate(&p.category_name, 24),
        p.confidence,
        sources(p)
    );
}

fn sources(p: &Prediction) -> String {
    p.sources
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join("+")
}
