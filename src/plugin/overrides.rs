//! User overrides from the custom/ subtree
//!
//! Mappings merge key by key with the override winning. Lists are replaced
//! wholesale: overriding `env_vars` with one entry drops every upstream entry
//! the user did not repeat.

use serde_yaml::Value;
use std::fs;
use std::path::Path;

use super::definition::PluginDefinition;
use super::validate::check_invariants;
use crate::error::{AtkError, IoContext, ValidationError};

/// Name of the user-owned override directory inside each plugin directory
pub const CUSTOM_DIR: &str = "custom";

/// Partial definition inside the override directory
pub const OVERRIDE_FILE: &str = "plugin.yaml";

/// Merge an override document into an upstream definition
///
/// Neither input is modified.
pub fn merge(upstream: &PluginDefinition, overrides: &Value) -> Result<PluginDefinition, ValidationError> {
    if overrides.is_null() {
        return Ok(upstream.clone());
    }
    if !overrides.is_mapping() {
        return Err(ValidationError::single(format!(
            "'{}/{}': overrides must be a YAML mapping",
            CUSTOM_DIR, OVERRIDE_FILE
        )));
    }

    let base = serde_yaml::to_value(upstream)
        .map_err(|e| ValidationError::single(format!("failed to serialize upstream definition: {}", e)))?;
    let merged = deep_merge(&base, overrides);

    let definition: PluginDefinition = serde_yaml::from_value(merged)
        .map_err(|e| ValidationError::single(format!("invalid overrides: {}", e)))?;

    let problems = check_invariants(&definition);
    if problems.is_empty() {
        Ok(definition)
    } else {
        Err(ValidationError::new(problems))
    }
}

fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, overlay_value) in overlay_map {
                let value = match base_map.get(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value.clone(),
                };
                merged.insert(key.clone(), value);
            }
            Value::Mapping(merged)
        }
        // Scalars, sequences, and type mismatches: the override replaces
        _ => overlay.clone(),
    }
}

/// Read `custom/plugin.yaml` if the plugin has one
pub fn load_overrides(plugin_dir: &Path) -> Result<Option<Value>, AtkError> {
    let path = plugin_dir.join(CUSTOM_DIR).join(OVERRIDE_FILE);
    if !path.is_file() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path).io_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_yaml::from_str(&content).map_err(|e| {
        AtkError::Validation(ValidationError::single(format!("invalid YAML in {}: {}", path.display(), e)))
    })?;
    Ok(Some(value))
}

/// Whether the plugin directory carries a custom/ subtree
pub fn has_custom_dir(plugin_dir: &Path) -> bool {
    plugin_dir.join(CUSTOM_DIR).is_dir()
}
