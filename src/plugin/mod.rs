//! Plugin definitions and everything that reads them
//!
//! This module handles:
//! - Parsing and validating plugin definitions (plugin.yaml)
//! - Normalizing older schema versions
//! - Merging user overrides from custom/
//! - Running lifecycle commands through an injectable executor
//! - Reading the registry index

use std::fs;
use std::path::Path;

use crate::error::{AtkError, IoContext};

pub mod definition;
pub mod env;
pub mod executor;
pub mod loader;
pub mod overrides;
pub mod registry;
pub mod validate;

/// Directory names under plugins/, sorted
///
/// Hidden entries and plain files are skipped.
pub fn discover_directories(plugins_dir: &Path) -> Result<Vec<String>, AtkError> {
    let mut names = Vec::new();

    if !plugins_dir.exists() {
        return Ok(names);
    }

    let entries =
        fs::read_dir(plugins_dir).io_context(|| format!("Failed to read {}", plugins_dir.display()))?;
    for entry in entries {
        let entry = entry.io_context(|| format!("Failed to read {}", plugins_dir.display()))?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }

    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_discover_directories() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("plugin-b")).unwrap();
        fs::create_dir_all(temp.path().join("plugin-a")).unwrap();
        fs::create_dir_all(temp.path().join(".hidden")).unwrap();
        fs::write(temp.path().join("README.md"), "not a plugin").unwrap();

        let names = discover_directories(temp.path()).unwrap();
        assert_eq!(names, vec!["plugin-a", "plugin-b"]);
    }

    #[test]
    fn test_discover_missing_directory() {
        let temp = tempdir().unwrap();
        assert!(discover_directories(&temp.path().join("nope")).unwrap().is_empty());
    }
}
