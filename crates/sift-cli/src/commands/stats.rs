//! Model statistics and feedback commands

use anyhow::{bail, Result};

use super::{print_stats, Session};

pub fn cmd_stats(session: &Session) -> Result<()> {
    let engine = session.open_engine()?;

    println!("📊 Model statistics ({})", session.model.display());
    if !session.model.exists() {
        println!("   No trained model yet. Run `sift train` first.");
    }
    print_stats(&engine.get_model_stats());
    println!("   History:   {} examples", engine.history_len());
    println!("   Categories: {}", engine.categories().len());

    Ok(())
}

/// Record whether a prediction was accepted and persist the updated stats
pub fn cmd_feedback(session: &Session, predicted: &str, actual: &str) -> Result<()> {
    let engine = session.open_engine()?;

    for id in [predicted, actual] {
        if !engine.categories().iter().any(|c| c.id == id) {
            bail!("Unknown category id: {}", id);
        }
    }

    let stats = engine.record_feedback(predicted, actual);
    session.save_model(&engine)?;

    let verdict = if predicted == actual { "correct" } else { "corrected" };
    println!(
        "✅ Recorded {} prediction. Accuracy now {:.0}% ({}/{})",
        verdict, stats.accuracy, stats.correct_predictions, stats.total_predictions
    );

    Ok(())
}
