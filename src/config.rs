//! Configuration management
//!
//! Loads the external JSON configuration document supplying evidence
//! validation rules and the remote-submission target. Any load failure is
//! non-fatal: the system degrades to a built-in default identical in
//! shape, so a missing or broken config file can never block progress.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::warn;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Active learner profile id
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Evidence-of-work rules
    #[serde(default)]
    pub evidence: EvidenceConfig,
    /// Remote submission target; absent disables remote send entirely
    #[serde(default)]
    pub submission: Option<SubmissionConfig>,
}

fn default_profile() -> String {
    "local".to_string()
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            evidence: EvidenceConfig::default(),
            submission: None,
        }
    }
}

/// Validation rules for evidence submissions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceConfig {
    /// Module slugs whose lessons require evidence before completion
    #[serde(default = "default_required_modules")]
    pub required_modules: Vec<String>,
    /// Minimum character count for the free-text fields
    #[serde(default = "default_min_text_length")]
    pub min_text_length: usize,
    /// Shape a non-empty project URL must match
    #[serde(default = "default_project_url_pattern")]
    pub project_url_pattern: String,
}

fn default_required_modules() -> Vec<String> {
    vec!["m2-scratch".to_string(), "m3-scratch-control".to_string()]
}

fn default_min_text_length() -> usize {
    20
}

fn default_project_url_pattern() -> String {
    r"^https://scratch\.mit\.edu/projects/\d+/?$".to_string()
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            required_modules: default_required_modules(),
            min_text_length: default_min_text_length(),
            project_url_pattern: default_project_url_pattern(),
        }
    }
}

/// Remote form-submission target and its logical-field → form-field mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Form endpoint URL (e.g. a Google Forms formResponse URL)
    pub endpoint: String,
    /// Maps logical field names (what_learned, what_created, scratch_url,
    /// lesson, session) to form field names (entry.NNN)
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl HubConfig {
    /// Load configuration, degrading silently to defaults on any failure
    pub fn load() -> Self {
        match Self::try_load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Config unavailable ({}), using built-in defaults", e);
                HubConfig::default()
            }
        }
    }

    fn try_load() -> Result<Self> {
        let path = config_path()?;
        Self::load_from(&path)
    }

    /// Load from a specific path (tests and alternate deployments)
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents).context("Failed to parse config file")
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let path = config_path()?;
        let parent = path.parent().context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = serde_json::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("ro", "learninghub", "learninghub")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.json"))
}

/// Get the data directory path (holds the persisted state file)
pub fn data_dir() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("ro", "learninghub", "learninghub")
        .context("Failed to get project directories")?;
    Ok(base.data_dir().to_path_buf())
}
