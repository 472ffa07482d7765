//! Plugin loading
//!
//! Definitions are read fresh from disk on every call so external edits are
//! never masked by a stale copy.

use std::fs;
use std::path::{Path, PathBuf};

use super::definition::PluginDefinition;
use super::overrides::{load_overrides, merge};
use super::validate::validate;
use crate::error::{AtkError, IoContext};

const DEFINITION_FILES: [&str; 2] = ["plugin.yaml", "plugin.yml"];

/// Locate plugin.yaml (or plugin.yml) in a plugin directory
pub fn definition_path(plugin_dir: &Path) -> Option<PathBuf> {
    DEFINITION_FILES
        .iter()
        .map(|name| plugin_dir.join(name))
        .find(|path| path.is_file())
}

/// Load the upstream definition, without user overrides
pub fn load_definition(plugin_dir: &Path) -> Result<PluginDefinition, AtkError> {
    let path = definition_path(plugin_dir)
        .ok_or_else(|| AtkError::NoDefinitionFound(format!("no plugin.yaml in {}", plugin_dir.display())))?;

    let raw = fs::read(&path).io_context(|| format!("Failed to read {}", path.display()))?;
    let definition = validate(&raw)?;

    log::debug!("Loaded plugin definition '{}' from {}", definition.name, path.display());
    Ok(definition)
}

/// Load the effective definition: upstream merged with custom/plugin.yaml
pub fn load_plugin(plugin_dir: &Path) -> Result<PluginDefinition, AtkError> {
    let upstream = load_definition(plugin_dir)?;

    match load_overrides(plugin_dir)? {
        Some(overrides) => {
            log::debug!("Applying overrides for plugin '{}'", upstream.name);
            Ok(merge(&upstream, &overrides)?)
        }
        None => Ok(upstream),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::overrides::CUSTOM_DIR;
    use tempfile::tempdir;

    fn write_plugin(dir: &Path, file: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join(file),
            "schema_version: \"2026-01-23\"\nname: Loader Test\ndescription: upstream\n",
        )
        .unwrap();
    }

    #[test]
    fn test_load_plugin_yaml() {
        let temp = tempdir().unwrap();
        write_plugin(temp.path(), "plugin.yaml");
        let def = load_plugin(temp.path()).unwrap();
        assert_eq!(def.name, "Loader Test");
    }

    #[test]
    fn test_load_plugin_yml_fallback() {
        let temp = tempdir().unwrap();
        write_plugin(temp.path(), "plugin.yml");
        assert!(load_definition(temp.path()).is_ok());
    }

    #[test]
    fn test_missing_definition() {
        let temp = tempdir().unwrap();
        assert!(matches!(
            load_plugin(temp.path()),
            Err(AtkError::NoDefinitionFound(_))
        ));
    }

    #[test]
    fn test_overrides_applied_on_read() {
        let temp = tempdir().unwrap();
        write_plugin(temp.path(), "plugin.yaml");
        fs::create_dir_all(temp.path().join(CUSTOM_DIR)).unwrap();
        fs::write(temp.path().join(CUSTOM_DIR).join("plugin.yaml"), "description: customized\n").unwrap();

        assert_eq!(load_definition(temp.path()).unwrap().description, "upstream");
        assert_eq!(load_plugin(temp.path()).unwrap().description, "customized");
    }
}
