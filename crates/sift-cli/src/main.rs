//! Sift CLI - Transaction categorizer
//!
//! Usage:
//!   sift train                          Train patterns from the profile history
//!   sift categorize -d DESC -a AMOUNT   Categorize one transaction
//!   sift batch --input CSV              Categorize a CSV of transactions
//!   sift stats                          Show model statistics

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use sift_core::AIClient;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;
use commands::Session;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let client = if cli.no_ai { None } else { AIClient::from_env() };
    let session = Session {
        profile: cli.profile,
        model: cli.model,
        config: cli.config,
        client,
    };

    match cli.command {
        Commands::Train { history } => commands::cmd_train(&session, history.as_deref()).await,
        Commands::Categorize {
            description,
            amount,
            merchant,
            date,
            json,
        } => {
            commands::cmd_categorize(
                &session,
                &description,
                amount,
                merchant.as_deref(),
                date.as_deref(),
                json,
            )
            .await
        }
        Commands::Batch { input, output } => {
            commands::cmd_batch(&session, &input, output.as_deref()).await
        }
        Commands::Stats => commands::cmd_stats(&session),
        Commands::Feedback { predicted, actual } => {
            commands::cmd_feedback(&session, &predicted, &actual)
        }
        Commands::AiTest { description } => {
            commands::cmd_ai_test(&session, description.as_deref()).await
        }
        Commands::Prompts { action } => match action {
            None | Some(PromptsAction::List) => commands::cmd_prompts_list(),
            Some(PromptsAction::Show { id }) => commands::cmd_prompts_show(&id),
            Some(PromptsAction::Path) => commands::cmd_prompts_path(),
        },
    }
}
