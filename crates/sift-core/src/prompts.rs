//! Prompt library for customizable AI prompts
//!
//! Prompts are markdown files with YAML frontmatter and `# System` /
//! `# User` sections. Defaults are compiled into the binary; a file with the
//! same id in the override directory (~/.local/share/sift/prompts/overrides)
//! replaces the default.
//!
//! Templates support `{{var}}` substitution and `{{#if var}}...{{/if}}`
//! blocks that are dropped when the variable is missing or empty.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default prompts
mod defaults {
    pub const CATEGORIZE_TRANSACTION: &str =
        include_str!("../../../prompts/categorize_transaction.md");
    pub const REFINE_KEYWORDS: &str = include_str!("../../../prompts/refine_keywords.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Transaction + category list → prediction with alternatives
    CategorizeTransaction,
    /// Frequency-ranked keywords → discriminative subset
    RefineKeywords,
}

impl PromptId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CategorizeTransaction => "categorize_transaction",
            Self::RefineKeywords => "refine_keywords",
        }
    }

    pub fn all() -> &'static [PromptId] {
        &[Self::CategorizeTransaction, Self::RefineKeywords]
    }

    fn default_content(&self) -> &'static str {
        match self {
            Self::CategorizeTransaction => defaults::CATEGORIZE_TRANSACTION,
            Self::RefineKeywords => defaults::REFINE_KEYWORDS,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    pub id: String,
    /// Version number for tracking changes
    pub version: u32,
    pub task: String,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    /// The prompt content (system + user sections)
    pub content: String,
    /// Whether this came from an override file
    pub is_override: bool,
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    pub fn system_section(&self) -> Option<&str> {
        extract_section(&self.content, "# System")
    }

    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Render the system section (no variables)
    pub fn render_system(&self) -> String {
        self.system_section().unwrap_or_default().to_string()
    }

    /// Render just the user section with variables
    pub fn render_user(&self, vars: &HashMap<&str, &str>) -> String {
        let template = self.user_section().unwrap_or(&self.content);
        // Conditionals first so a value containing "{{" can't open a block
        let mut result = remove_unmatched_conditionals(template, vars);
        for (key, value) in vars {
            let pattern = format!("{{{{{}}}}}", key);
            result = result.replace(&pattern, value);
        }
        result
    }
}

/// Prompt library for loading and caching prompts
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
    cache: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Create a new prompt library with default paths
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
            cache: HashMap::new(),
        }
    }

    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
            cache: HashMap::new(),
        }
    }

    /// Embedded prompts only, no override lookup
    pub fn embedded_only() -> Self {
        Self {
            override_dir: None,
            cache: HashMap::new(),
        }
    }

    /// Get a prompt by ID, loading from override or default
    pub fn get(&mut self, id: PromptId) -> Result<&Prompt> {
        if !self.cache.contains_key(&id) {
            let prompt = self.load(id)?;
            self.cache.insert(id, prompt);
        }
        self.cache
            .get(&id)
            .ok_or_else(|| Error::InvalidData(format!("Prompt {} not loaded", id.as_str())))
    }

    fn load(&self, id: PromptId) -> Result<Prompt> {
        let Some(path) = self.override_path(id) else {
            let (metadata, content) = parse_prompt(id.default_content())?;
            return Ok(Prompt {
                metadata,
                content,
                is_override: false,
                override_path: None,
            });
        };

        let raw = fs::read_to_string(&path)?;
        let (metadata, content) = parse_prompt(&raw).map_err(|e| {
            Error::InvalidData(format!("{}: {}", path.display(), e))
        })?;
        Ok(Prompt {
            metadata,
            content,
            is_override: true,
            override_path: Some(path),
        })
    }

    /// List all prompts with their override status
    pub fn list(&mut self) -> Vec<PromptInfo> {
        PromptId::all()
            .iter()
            .map(|&id| {
                let override_path = self.override_path(id);
                let version = self.get(id).map(|p| p.metadata.version).unwrap_or(0);
                PromptInfo {
                    id: id.as_str().to_string(),
                    version,
                    has_override: override_path.is_some(),
                    override_path,
                }
            })
            .collect()
    }

    fn override_path(&self, id: PromptId) -> Option<PathBuf> {
        self.override_dir
            .as_ref()
            .map(|d| d.join(format!("{}.md", id.as_str())))
            .filter(|p| p.exists())
    }

    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Information about a prompt for listing
#[derive(Debug, Clone)]
pub struct PromptInfo {
    pub id: String,
    pub version: u32,
    pub has_override: bool,
    pub override_path: Option<PathBuf>,
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("sift").join("prompts").join("overrides"))
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    let rest = content.strip_prefix("---").ok_or_else(|| {
        Error::InvalidData("Prompt must start with YAML frontmatter (---)".into())
    })?;

    let end = rest.find("---").ok_or_else(|| {
        Error::InvalidData("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 3..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)
        .map_err(|e| Error::InvalidData(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, body.to_string()))
}

/// Extract a section from the prompt content
fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after_header = &content[start + header.len()..];
    let end = after_header.find("\n# ").unwrap_or(after_header.len());
    Some(after_header[..end].trim())
}

/// Resolve `{{#if var}}...{{/if}}` blocks (non-nested)
///
/// A block is kept (without its markers) when `var` is set and non-empty,
/// otherwise dropped. An unterminated block is left as-is.
fn remove_unmatched_conditionals(content: &str, vars: &HashMap<&str, &str>) -> String {
    const OPEN: &str = "{{#if ";
    const CLOSE: &str = "{{/if}}";

    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some((name, body_and_tail)) = after_open.split_once("}}") else {
            break;
        };
        let Some((body, tail)) = body_and_tail.split_once(CLOSE) else {
            break;
        };

        out.push_str(&rest[..start]);
        if vars.get(name.trim()).is_some_and(|v| !v.is_empty()) {
            out.push_str(body);
        }
        rest = tail;
    }

    out.push_str(rest);
    out
}
