//! Node home directory configuration
//!
//! `querynode init` writes `<home>/config/node.json`; `querynode start`
//! refuses to run without it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{NodeError, NodeResult};

pub const CONFIG_DIR: &str = "config";
pub const CONFIG_FILE: &str = "node.json";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NodeHomeConfig {
    pub chain_id: String,
    pub moniker: String,
    pub created_at: DateTime<Utc>,
}

impl NodeHomeConfig {
    pub fn new(chain_id: impl Into<String>, moniker: impl Into<String>) -> NodeResult<Self> {
        let config = Self {
            chain_id: chain_id.into(),
            moniker: moniker.into(),
            created_at: Utc::now(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Location of the config file inside a home directory
    pub fn path_in(home: &Path) -> PathBuf {
        home.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    pub fn validate(&self) -> NodeResult<()> {
        if self.chain_id.trim().is_empty() {
            return Err(NodeError::ConfigurationError {
                field: "chain_id must not be empty".to_string(),
            });
        }
        if self.moniker.trim().is_empty() {
            return Err(NodeError::ConfigurationError {
                field: "moniker must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Write the config into `home`, creating the directory layout
    pub fn save(&self, home: &Path, overwrite: bool) -> NodeResult<PathBuf> {
        let path = Self::path_in(home);
        if path.exists() && !overwrite {
            return Err(NodeError::HomeAlreadyInitialized {
                path: path.display().to_string(),
            });
        }

        std::fs::create_dir_all(home.join(CONFIG_DIR))?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    pub fn load(home: &Path) -> NodeResult<Self> {
        let path = Self::path_in(home);
        if !path.is_file() {
            return Err(NodeError::HomeNotInitialized {
                path: path.display().to_string(),
            });
        }

        let raw = std::fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }
}
