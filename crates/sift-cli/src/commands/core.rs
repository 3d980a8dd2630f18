//! Shared session setup
//!
//! Every command works from the same inputs: a profile JSON (categories and
//! labeled history), an optional config override, an optional AI backend and
//! the model file that `train` writes.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sift_core::{AIClient, CategorizationEngine, EngineConfig, Profile};
use tracing::debug;

/// Inputs shared by all commands
pub struct Session {
    pub profile: PathBuf,
    pub model: PathBuf,
    pub config: Option<PathBuf>,
    pub client: Option<AIClient>,
}

impl Session {
    pub fn load_config(&self) -> Result<EngineConfig> {
        match &self.config {
            Some(path) => EngineConfig::load_from(path)
                .with_context(|| format!("Failed to load config {}", path.display())),
            None => EngineConfig::load().context("Failed to load engine config"),
        }
    }

    pub fn load_profile(&self) -> Result<Profile> {
        Profile::load(&self.profile)
            .with_context(|| format!("Failed to read profile {}", self.profile.display()))
    }

    /// Build the engine and restore the saved model if there is one
    pub fn open_engine(&self) -> Result<CategorizationEngine> {
        let profile = self.load_profile()?;
        let config = self.load_config()?;
        let engine = CategorizationEngine::new(
            profile.categories,
            profile.history,
            self.client.clone(),
            config,
        )
        .context("Failed to create categorization engine")?;

        if self.model.exists() {
            let json = fs::read_to_string(&self.model)
                .with_context(|| format!("Failed to read model {}", self.model.display()))?;
            engine
                .import_model(&json)
                .with_context(|| format!("Failed to load model {}", self.model.display()))?;
            debug!("Loaded model from {}", self.model.display());
        } else {
            debug!("No model at {}, using rules and AI only", self.model.display());
        }

        Ok(engine)
    }

    pub fn save_model(&self, engine: &CategorizationEngine) -> Result<()> {
        write_model(&self.model, engine)
    }
}

fn write_model(path: &Path, engine: &CategorizationEngine) -> Result<()> {
    let json = engine.export_model().context("Failed to serialize model")?;
    fs::write(path, json).with_context(|| format!("Failed to write model {}", path.display()))
}
