//! Declarative registry configuration
//!
//! A small YAML/JSON schema for constructing a registry: where its snapshot
//! lives, an optional fixed identifier, and an optional recipe file to
//! replay.
//!
//! # Example
//!
//! ```yaml
//! snapshot_path: runs/model.safetensors
//! identifier: experiment-7
//! recipe_path: runs/model.recipe.json
//! ```

use crate::factory::FactoryRegistry;
use crate::recipe::Recipe;
use crate::registry::Registry;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Snapshot file for variable values.
    pub snapshot_path: PathBuf,

    /// Fixed instance identifier; generated when absent.
    #[serde(default)]
    pub identifier: Option<String>,

    /// Recipe to replay on open. A configured path that does not exist yet
    /// simply yields an empty registry.
    #[serde(default)]
    pub recipe_path: Option<PathBuf>,
}

impl RegistryConfig {
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: snapshot_path.into(),
            identifier: None,
            recipe_path: None,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_recipe_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.recipe_path = Some(path.into());
        self
    }

    /// Parse a config from YAML.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::Serialization(format!("YAML deserialization failed: {e}")))
    }

    /// Parse a config from JSON.
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::Serialization(format!("JSON deserialization failed: {e}")))
    }

    /// Read a config file, YAML or JSON by extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            Some("json") => Self::from_json(&content),
            other => Err(Error::Serialization(format!(
                "unsupported config extension: {other:?}"
            ))),
        }
    }

    /// Build a registry from this config: replay the recipe when one exists,
    /// otherwise start empty.
    pub fn open(&self, factories: FactoryRegistry) -> Result<Registry> {
        let recipe = match &self.recipe_path {
            Some(path) if path.exists() => Some(Recipe::load(path)?),
            _ => None,
        };
        match (recipe, &self.identifier) {
            (Some(recipe), Some(id)) => {
                Registry::replay_with_identifier(&recipe, id.clone(), factories)
            }
            (Some(recipe), None) => Registry::replay(&recipe, factories),
            (None, Some(id)) => {
                Registry::with_identifier(self.snapshot_path.clone(), id.clone(), factories)
            }
            (None, None) => Registry::new(self.snapshot_path.clone(), factories),
        }
    }
}
