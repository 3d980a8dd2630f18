//! AI backend command implementations

use anyhow::Result;
use sift_core::{AIBackend, CategorizationEngine, Category, EngineConfig, Transaction};

use super::Session;

/// Check the configured backend and run a few categorizations through it
pub async fn cmd_ai_test(session: &Session, description: Option<&str>) -> Result<()> {
    println!("🔍 Testing AI backend...\n");

    let Some(client) = session.client.as_ref() else {
        println!("  ⚠️  No AI backend configured");
        println!();
        println!("To set up Ollama:");
        println!("  1. Install Ollama: https://ollama.ai/download");
        println!("  2. Start the server: ollama serve");
        println!("  3. Pull a model: ollama pull llama3.2");
        println!("  4. export OLLAMA_HOST=http://localhost:11434");
        println!();
        println!("Or point OPENAI_COMPATIBLE_HOST at any OpenAI-compatible server");
        println!("and set AI_BACKEND=openai_compatible.");
        return Ok(());
    };

    let info = client.info();
    println!("  Backend: {}", info.kind);
    println!("  Host:    {}", info.host);
    println!("  Model:   {}\n", info.model);

    print!("Checking availability... ");
    if client.health_check().await {
        println!("✅ Connected");
    } else {
        println!("❌ Failed");
        println!("\n⚠️  Could not reach {}", info.host);
        return Ok(());
    }

    // Use the profile's categories when there is one, otherwise a stock set
    let (categories, config) = match session.load_profile() {
        Ok(profile) if !profile.categories.is_empty() => {
            (profile.categories, session.load_config()?)
        }
        _ => (sample_categories(), EngineConfig::default()),
    };
    let engine = CategorizationEngine::new(categories, Vec::new(), Some(client.clone()), config)?;

    let samples: Vec<Transaction> = match description {
        Some(d) => vec![Transaction::new(d, 0.0)],
        None => vec![
            Transaction::new("STARBUCKS STORE 01234", 5.75),
            Transaction::new("NETFLIX.COM", 15.49),
            Transaction::new("SHELL OIL 57442", 48.10),
            Transaction::new("ACME CORP PAYROLL", 2500.00),
        ],
    };

    println!("\n📋 Testing categorization...\n");
    for tx in &samples {
        print!("  \"{}\" → ", tx.description);
        match engine.llm().try_predict(tx, engine.categories()).await {
            Ok(predictions) => {
                let top = &predictions[0];
                println!("{} ({:.0}%)", top.category_name, top.confidence);
                println!("      {}", top.reasoning);
            }
            Err(e) => println!("❌ Error: {}", e),
        }
    }

    Ok(())
}

fn sample_categories() -> Vec<Category> {
    vec![
        Category::new("food", "Food & Dining"),
        Category::new("entertainment", "Entertainment"),
        Category::new("transport", "Transportation"),
        Category::new("salary", "Salary"),
        Category::new("shopping", "Shopping"),
        Category::new("other", "Other"),
    ]
}
