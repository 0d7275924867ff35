//! Node configuration.
//!
//! One TOML file carries the data directory, logging options and the
//! engine configuration. Engine parameters only matter the first time a
//! data directory is opened; afterwards the persisted state is authoritative.

use agora_governance::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Data directory holding the committed state generations
    pub data_dir: PathBuf,
    pub logging: LoggingConfig,
    /// Governance, staking, reputation, treasury and genesis parameters
    pub engine: EngineConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            logging: LoggingConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        check_path(path)?;
        let contents = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        let config: NodeConfig = toml::from_str(&contents).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn to_file(&self, path: &Path) -> anyhow::Result<()> {
        check_path(path)?;
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|e| {
            anyhow::anyhow!("Failed to write config file '{}': {}", path.display(), e)
        })?;
        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            anyhow::bail!("data_dir cannot be empty");
        }
        self.logging.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

// Reject directory traversal in user-supplied paths.
fn check_path(path: &Path) -> anyhow::Result<()> {
    if path.to_string_lossy().contains("..") {
        anyhow::bail!("Invalid path: directory traversal detected");
    }
    Ok(())
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "agora_governance=debug"
    pub level: String,
    /// Log format (json|pretty)
    pub format: String,
    /// Append logs to this file instead of stderr
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "pretty".to_string(),
            log_file: None,
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format == "json"
    }

    fn validate(&self) -> anyhow::Result<()> {
        match self.format.as_str() {
            "json" | "pretty" => Ok(()),
            other => anyhow::bail!("Unknown log format '{}' (expected json or pretty)", other),
        }
    }
}
