//! Recipe serialization and replay
//!
//! A registry's full state reduces to its snapshot path plus the ordered log
//! of sanitized registrations. Replaying the log into a fresh registry
//! re-executes every factory, rebuilding the object graph in a new process;
//! variable values are restored separately from a snapshot.

use crate::factory::FactoryRegistry;
use crate::registry::{CallToken, Registry, Token};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Schema version written into every recipe file.
pub const RECIPE_VERSION: u32 = 1;

/// One logged registration: everything needed to re-run it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeEntry {
    pub name: String,
    pub call: CallToken,
    pub args: Vec<Token>,
    pub kwargs: BTreeMap<String, Token>,
}

/// Serialization format for recipe files, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeFormat {
    Json,
    Yaml,
}

impl RecipeFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(RecipeFormat::Json),
            "yaml" | "yml" => Some(RecipeFormat::Yaml),
            _ => None,
        }
    }

    fn for_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| Error::Serialization("recipe file has no extension".to_string()))?;
        Self::from_extension(ext).ok_or_else(|| {
            Error::Serialization(format!("unsupported recipe extension: {ext}"))
        })
    }
}

/// The serialized construction state of a registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub version: u32,
    pub snapshot_path: PathBuf,
    pub entries: Vec<RecipeEntry>,
}

impl Recipe {
    /// Write the recipe to `path` as JSON or YAML by extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = match RecipeFormat::for_path(path)? {
            RecipeFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))?,
            RecipeFormat::Yaml => serde_yaml::to_string(self)
                .map_err(|e| Error::Serialization(format!("YAML serialization failed: {e}")))?,
        };
        fs::write(path, data)?;
        Ok(())
    }

    /// Read a recipe from `path`, rejecting unknown schema versions.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = RecipeFormat::for_path(path)?;
        let content = fs::read_to_string(path)?;
        let recipe: Recipe = match format {
            RecipeFormat::Json => serde_json::from_str(&content)
                .map_err(|e| Error::Serialization(format!("JSON deserialization failed: {e}")))?,
            RecipeFormat::Yaml => serde_yaml::from_str(&content)
                .map_err(|e| Error::Serialization(format!("YAML deserialization failed: {e}")))?,
        };
        if recipe.version != RECIPE_VERSION {
            return Err(Error::Serialization(format!(
                "unsupported recipe version {} (expected {RECIPE_VERSION})",
                recipe.version
            )));
        }
        Ok(recipe)
    }
}

impl Registry {
    /// The construction recipe of this registry.
    pub fn recipe(&self) -> Recipe {
        Recipe {
            version: RECIPE_VERSION,
            snapshot_path: self.snapshot_path().to_path_buf(),
            entries: self.recipe_entries().to_vec(),
        }
    }

    /// Rebuild a registry from a recipe with a freshly generated identifier.
    ///
    /// Every logged registration is re-run in log order, which re-executes
    /// its factory; side-effecting factories therefore run again on every
    /// replay.
    pub fn replay(recipe: &Recipe, factories: FactoryRegistry) -> Result<Registry> {
        let mut registry = Registry::new(recipe.snapshot_path.clone(), factories)?;
        registry.replay_entries(recipe)?;
        Ok(registry)
    }

    /// Rebuild a registry from a recipe under a caller-supplied identifier.
    pub fn replay_with_identifier(
        recipe: &Recipe,
        identifier: impl Into<String>,
        factories: FactoryRegistry,
    ) -> Result<Registry> {
        let mut registry =
            Registry::with_identifier(recipe.snapshot_path.clone(), identifier, factories)?;
        registry.replay_entries(recipe)?;
        Ok(registry)
    }

    fn replay_entries(&mut self, recipe: &Recipe) -> Result<()> {
        if !self.recipe_entries().is_empty() {
            return Err(Error::InvalidState(
                "recipes can only be replayed into an empty registry".to_string(),
            ));
        }
        for entry in &recipe.entries {
            self.add_entry(entry.clone())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Args;
    use tempfile::tempdir;

    fn sample_registry() -> Registry {
        let mut registry =
            Registry::with_identifier("model.safetensors", "alpha", FactoryRegistry::standard())
                .unwrap();
        registry
            .add("w", "variable", Args::new().kw("shape", vec![2i64]))
            .unwrap();
        let w = registry.component("w").unwrap().clone();
        registry
            .add("doubled", "scale", Args::new().with(&w).kw("factor", 2.0))
            .unwrap();
        registry
    }

    #[test]
    fn recipe_round_trips_through_json_and_yaml() {
        let recipe = sample_registry().recipe();
        let dir = tempdir().unwrap();

        for file in ["recipe.json", "recipe.yaml"] {
            let path = dir.path().join(file);
            recipe.save(&path).unwrap();
            let loaded = Recipe::load(&path).unwrap();
            assert_eq!(recipe, loaded);
        }
    }

    #[test]
    fn literal_tokens_survive_yaml() {
        use crate::registry::Literal;

        // Literals nest inside Token; the YAML representation must not stack
        // enum tags or serde_yaml refuses to serialize.
        let tokens = [
            Token::Literal(Literal::Int(42)),
            Token::Literal(Literal::Float(0.5)),
            Token::Literal(Literal::Str("ones".to_string())),
            Token::Literal(Literal::Ints(vec![2, 3])),
            Token::Literal(Literal::Floats(vec![1.0, -1.0])),
        ];
        for token in &tokens {
            let yaml = serde_yaml::to_string(token).unwrap();
            let back: Token = serde_yaml::from_str(&yaml).unwrap();
            assert_eq!(*token, back);
        }
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let recipe = sample_registry().recipe();
        let dir = tempdir().unwrap();
        let err = recipe.save(dir.path().join("recipe.bin")).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut recipe = sample_registry().recipe();
        recipe.version = 99;
        let dir = tempdir().unwrap();
        let path = dir.path().join("recipe.json");
        std::fs::write(&path, serde_json::to_string(&recipe).unwrap()).unwrap();
        let err = Recipe::load(&path).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn replay_rebuilds_components_under_new_identifier() {
        let original = sample_registry();
        let recipe = original.recipe();

        let rebuilt =
            Registry::replay_with_identifier(&recipe, "beta", FactoryRegistry::standard()).unwrap();
        assert_ne!(original.identifier(), rebuilt.identifier());
        assert_eq!(original.component_names(), rebuilt.component_names());
        assert_eq!(
            original.owned_variable_names(),
            rebuilt.owned_variable_names()
        );
    }

    #[test]
    fn replay_into_populated_registry_is_rejected() {
        let recipe = sample_registry().recipe();
        let mut populated = sample_registry();
        let err = populated.replay_entries(&recipe).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }
}
