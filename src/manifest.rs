//! Manifest store (manifest.yaml)
//!
//! The manifest is the only persisted state: one entry per installed plugin.
//! Mutations happen on an in-memory `Manifest`; nothing reaches disk until the
//! caller saves it explicitly.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{AtkError, IoContext};
use crate::sanitize::validate_directory;

pub const MANIFEST_FILE: &str = "manifest.yaml";

/// Schema version written into new manifests
pub const MANIFEST_SCHEMA_VERSION: &str = "2026-02-06";

/// Where a plugin came from
///
/// Replaced wholesale on upgrade, never edited field by field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceRef {
    Local,
    Registry {
        #[serde(rename = "ref")]
        reference: String,
    },
    Git {
        url: String,
        #[serde(rename = "ref")]
        reference: String,
    },
}

impl SourceRef {
    pub fn reference(&self) -> Option<&str> {
        match self {
            Self::Local => None,
            Self::Registry { reference } | Self::Git { reference, .. } => Some(reference),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Registry { .. } => "registry",
            Self::Git { .. } => "git",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ManifestEntry {
    /// Display name, free text
    pub name: String,
    /// Directory under plugins/, unique across the manifest
    pub directory: String,
    pub source: SourceRef,
    /// Whether a custom/ override subtree exists
    #[serde(default)]
    pub customized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ManifestConfig {
    #[serde(default = "default_auto_commit")]
    pub auto_commit: bool,
}

fn default_auto_commit() -> bool {
    true
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            auto_commit: default_auto_commit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Manifest {
    pub schema_version: String,

    #[serde(default)]
    pub config: ManifestConfig,

    #[serde(default)]
    pub plugins: Vec<ManifestEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
            config: ManifestConfig::default(),
            plugins: Vec::new(),
        }
    }
}

impl Manifest {
    pub fn from_str(content: &str) -> Result<Self, AtkError> {
        let manifest: Self = serde_yaml::from_str(content).map_err(|e| AtkError::Manifest(e.to_string()))?;
        manifest.check()?;
        Ok(manifest)
    }

    pub fn to_yaml(&self) -> Result<String, AtkError> {
        serde_yaml::to_string(self).map_err(|e| AtkError::Manifest(e.to_string()))
    }

    /// Find an entry by directory or display name
    pub fn find(&self, identifier: &str) -> Option<&ManifestEntry> {
        self.plugins
            .iter()
            .find(|p| p.directory == identifier)
            .or_else(|| self.plugins.iter().find(|p| p.name == identifier))
    }

    pub fn get(&self, directory: &str) -> Option<&ManifestEntry> {
        self.plugins.iter().find(|p| p.directory == directory)
    }

    /// Add a new entry; fails if the directory is already taken
    pub fn add_entry(&mut self, entry: ManifestEntry) -> Result<(), AtkError> {
        check_directory(&entry.directory)?;
        if self.get(&entry.directory).is_some() {
            return Err(AtkError::Manifest(format!(
                "directory '{}' is already registered",
                entry.directory
            )));
        }
        self.plugins.push(entry);
        Ok(())
    }

    /// Replace the entry with the same directory, or append it
    pub fn upsert_entry(&mut self, entry: ManifestEntry) -> Result<(), AtkError> {
        check_directory(&entry.directory)?;
        match self.plugins.iter_mut().find(|p| p.directory == entry.directory) {
            Some(existing) => *existing = entry,
            None => self.plugins.push(entry),
        }
        Ok(())
    }

    /// Replace an existing entry
    pub fn update_entry(&mut self, entry: ManifestEntry) -> Result<(), AtkError> {
        check_directory(&entry.directory)?;
        let existing = self
            .plugins
            .iter_mut()
            .find(|p| p.directory == entry.directory)
            .ok_or_else(|| AtkError::PluginNotFound(entry.directory.clone()))?;
        *existing = entry;
        Ok(())
    }

    /// Remove an entry by directory, returning it if it was present
    pub fn remove_entry(&mut self, directory: &str) -> Option<ManifestEntry> {
        let index = self.plugins.iter().position(|p| p.directory == directory)?;
        Some(self.plugins.remove(index))
    }

    /// Re-check every entry, catching hand-edited manifests
    pub fn check(&self) -> Result<(), AtkError> {
        let mut seen = std::collections::HashSet::new();
        for entry in &self.plugins {
            check_directory(&entry.directory)?;
            if !seen.insert(entry.directory.as_str()) {
                return Err(AtkError::Manifest(format!("duplicate directory '{}'", entry.directory)));
            }
        }
        Ok(())
    }
}

fn check_directory(directory: &str) -> Result<(), AtkError> {
    validate_directory(directory).map_err(|reason| AtkError::Manifest(format!("'{}': {}", directory, reason)))
}

/// Persistence for the manifest
pub trait ManifestStore {
    fn load(&self) -> Result<Manifest, AtkError>;
    fn save(&self, manifest: &Manifest) -> Result<(), AtkError>;
}

/// manifest.yaml on disk
#[derive(Debug, Clone)]
pub struct FileManifestStore {
    path: PathBuf,
}

impl FileManifestStore {
    pub fn new(home: &Path) -> Self {
        Self {
            path: home.join(MANIFEST_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ManifestStore for FileManifestStore {
    fn load(&self) -> Result<Manifest, AtkError> {
        let content =
            fs::read_to_string(&self.path).io_context(|| format!("Failed to read {}", self.path.display()))?;
        Manifest::from_str(&content)
            .map_err(|e| AtkError::Manifest(format!("{}: {}", self.path.display(), e)))
    }

    fn save(&self, manifest: &Manifest) -> Result<(), AtkError> {
        manifest.check()?;
        let yaml = manifest.to_yaml()?;

        // Write beside the target and rename so a crash never leaves half a file
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .io_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        temp.write_all(yaml.as_bytes())
            .io_context(|| "Failed to write manifest".to_string())?;
        temp.persist(&self.path)
            .map_err(|e| AtkError::io(format!("Failed to write {}", self.path.display()), e.error))?;

        log::debug!("Saved manifest with {} plugin(s)", manifest.plugins.len());
        Ok(())
    }
}
