//! Training command implementation

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use sift_core::{load_training_csv, ModelStats};

use super::Session;

/// Train patterns from the profile history (plus an optional CSV) and save
pub async fn cmd_train(session: &Session, history_csv: Option<&Path>) -> Result<()> {
    println!("🧠 Training categorization model...");

    let engine = session.open_engine()?;

    let stats = match history_csv {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open history {}", path.display()))?;
            let examples = load_training_csv(file)
                .with_context(|| format!("Failed to parse history {}", path.display()))?;
            println!("   Loaded {} extra examples from {}", examples.len(), path.display());
            match engine.add_training_data(examples).await {
                Some(stats) => stats,
                None => engine.train_model().await,
            }
        }
        None => engine.train_model().await,
    };

    session.save_model(&engine)?;

    println!("   History: {} examples", engine.history_len());
    print_stats(&stats);
    println!("✅ Model saved to {}", session.model.display());

    Ok(())
}

pub fn print_stats(stats: &ModelStats) {
    println!("   Patterns:  {}", stats.pattern_count);
    println!("   Accuracy:  {:.0}%", stats.accuracy);
    println!(
        "   Evaluated: {}/{} correct",
        stats.correct_predictions, stats.total_predictions
    );
    println!(
        "   Trained:   {}",
        stats
            .last_trained
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".to_string())
    );
    println!("   Version:   {}", stats.version);
}
