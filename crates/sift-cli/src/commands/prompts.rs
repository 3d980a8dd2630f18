//! Prompt library commands

use anyhow::{anyhow, Result};
use sift_core::prompts::{default_prompts_dir, PromptId, PromptLibrary};

fn override_dir_display() -> String {
    default_prompts_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(no data directory on this system)".to_string())
}

fn find_prompt(name: &str) -> Result<PromptId> {
    PromptId::all()
        .iter()
        .copied()
        .find(|id| id.as_str() == name)
        .ok_or_else(|| {
            let known: Vec<&str> = PromptId::all().iter().map(|id| id.as_str()).collect();
            anyhow!("Unknown prompt '{}' (known: {})", name, known.join(", "))
        })
}

pub fn cmd_prompts_list() -> Result<()> {
    let mut library = PromptLibrary::new();

    println!("📝 Prompts used by the categorizer\n");
    for info in library.list() {
        let source = match &info.override_path {
            Some(path) if info.has_override => format!("override ({})", path.display()),
            _ => "built-in".to_string(),
        };
        println!("  {:<24} v{:<3} {}", info.id, info.version, source);
    }

    println!();
    println!("Overrides are read from {}", override_dir_display());
    println!("Start one with: sift prompts show <id> > <dir>/<id>.md");

    Ok(())
}

/// Print a prompt as a complete file, ready to copy into the override dir
pub fn cmd_prompts_show(name: &str) -> Result<()> {
    let id = find_prompt(name)?;
    let mut library = PromptLibrary::new();
    let prompt = library.get(id)?;

    if let Some(path) = &prompt.override_path {
        eprintln!("# using override {}", path.display());
    }
    println!("---");
    println!("id: {}", prompt.metadata.id);
    println!("version: {}", prompt.metadata.version);
    println!("task: {}", prompt.metadata.task);
    println!("---");
    println!("{}", prompt.content);

    Ok(())
}

pub fn cmd_prompts_path() -> Result<()> {
    let Some(dir) = default_prompts_dir() else {
        eprintln!("No data directory available for prompt overrides");
        return Ok(());
    };

    println!("{}", dir.display());
    if !dir.exists() {
        eprintln!("(not created yet)");
    }
    Ok(())
}
