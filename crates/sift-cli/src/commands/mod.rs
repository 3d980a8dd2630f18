//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared session setup (profile, config, model file)
//! - `train` - Pattern training
//! - `categorize` - Single and batch categorization
//! - `stats` - Model statistics and feedback
//! - `ai` - AI backend test
//! - `prompts` - Prompt library management commands

pub mod ai;
pub mod categorize;
pub mod core;
pub mod prompts;
pub mod stats;
pub mod train;

// Re-export command functions for main.rs
pub use ai::*;
pub use categorize::*;
pub use core::*;
pub use prompts::*;
pub use stats::*;
pub use train::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
