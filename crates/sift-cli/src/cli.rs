//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Sift - Categorize bank transactions
#[derive(Parser)]
#[command(name = "sift")]
#[command(about = "Transaction categorizer: patterns, rules and a local LLM", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Profile JSON with categories and labeled history
    #[arg(long, default_value = "sift-profile.json", global = true)]
    pub profile: PathBuf,

    /// Trained model file (written by `train`, read by everything else)
    #[arg(long, default_value = "sift-model.json", global = true)]
    pub model: PathBuf,

    /// Engine config override (TOML); defaults to the data-dir override or built-ins
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Don't use an AI backend even if one is configured
    ///
    /// By default the backend comes from AI_BACKEND / OLLAMA_HOST /
    /// OPENAI_COMPATIBLE_HOST.
    #[arg(long, global = true)]
    pub no_ai: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train patterns from the profile's history and save the model
    Train {
        /// Extra labeled history CSV (date,description,amount,merchant,kind,category_id)
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Categorize a single transaction
    Categorize {
        /// Transaction description as it appears on the statement
        #[arg(short, long)]
        description: String,

        /// Amount
        #[arg(short, long, allow_hyphen_values = true)]
        amount: f64,

        /// Merchant name
        #[arg(short, long)]
        merchant: Option<String>,

        /// Transaction date (YYYY-MM-DD or MM/DD/YYYY)
        #[arg(long)]
        date: Option<String>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Categorize every row of a CSV (description,amount,merchant,date,account)
    Batch {
        /// CSV file to categorize
        #[arg(short, long)]
        input: PathBuf,

        /// Write results as JSON to this file instead of printing a table
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show model statistics
    Stats,

    /// Record whether a prediction was right (updates model accuracy)
    Feedback {
        /// Category id the engine predicted
        #[arg(long)]
        predicted: String,

        /// Category id the user chose
        #[arg(long)]
        actual: String,
    },

    /// Test the configured AI backend
    AiTest {
        /// Description to categorize (defaults to a few samples)
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Manage AI prompts
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all prompts and their override status
    List,
    /// Show the content of a prompt
    Show {
        /// Prompt ID (e.g., categorize_transaction)
        id: String,
    },
    /// Show the override directory path
    Path,
}
