//! Registry index (index.yaml at the root of the registry repository)

use serde::{Deserialize, Serialize};

use crate::error::AtkError;

/// A plugin listed in the registry
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RegistryEntry {
    pub name: String,
    /// Path of the plugin directory inside the registry repository
    pub path: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RegistryIndex {
    #[serde(default)]
    pub schema_version: Option<String>,

    #[serde(default)]
    pub plugins: Vec<RegistryEntry>,
}

impl RegistryIndex {
    pub fn from_str(content: &str) -> Result<Self, AtkError> {
        serde_yaml::from_str(content).map_err(|e| AtkError::Fetch(format!("Invalid registry index: {}", e)))
    }

    /// Look a plugin up by exact name
    pub fn lookup(&self, name: &str) -> Result<&RegistryEntry, AtkError> {
        self.plugins
            .iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| AtkError::PluginNotFound(format!("{} (not in registry)", name)))
    }

    /// Search for plugins matching a query
    pub fn search(&self, query: &str) -> Vec<&RegistryEntry> {
        let query_lower = query.to_lowercase();
        self.plugins
            .iter()
            .filter(|entry| {
                entry.name.to_lowercase().contains(&query_lower)
                    || entry.description.to_lowercase().contains(&query_lower)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"
schema_version: "2026-01-23"
plugins:
  - name: openmemory
    path: plugins/openmemory
    description: Persistent memory for agents
  - name: piper
    path: plugins/piper
    description: Local text to speech
"#;

    #[test]
    fn test_lookup() {
        let index = RegistryIndex::from_str(INDEX).unwrap();
        assert_eq!(index.lookup("piper").unwrap().path, "plugins/piper");
        assert!(matches!(index.lookup("missing"), Err(AtkError::PluginNotFound(_))));
    }

    #[test]
    fn test_search_matches_description() {
        let index = RegistryIndex::from_str(INDEX).unwrap();
        let hits = index.search("SPEECH");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "piper");
    }

    #[test]
    fn test_invalid_index() {
        assert!(RegistryIndex::from_str("plugins: 42").is_err());
    }
}
