//! Reporting and repairing drift between the manifest and plugins/

use serde::Serialize;
use std::fs;

use super::{BulkReport, Engine, source_kind, write_ref};
use crate::error::{AtkError, IoContext};
use crate::fetch::STAGING_PREFIX;
use crate::manifest::ManifestEntry;
use crate::plugin::discover_directories;
use crate::plugin::loader::{definition_path, load_plugin};
use crate::plugin::overrides::CUSTOM_DIR;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    MissingDirectory,
    MissingDefinition,
    InvalidDefinition(String),
    /// A directory under plugins/ with no manifest entry
    Orphaned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginHealth {
    pub name: String,
    pub directory: String,
    pub source: Option<String>,
    pub status: HealthStatus,
}

impl Engine<'_> {
    /// Check every manifest entry against the filesystem
    ///
    /// Inconsistent state is reported, never an error.
    pub fn inspect(&self) -> Result<Vec<PluginHealth>, AtkError> {
        let manifest = self.load_manifest()?;
        let mut report: Vec<PluginHealth> = manifest.plugins.iter().map(|entry| self.health(entry)).collect();

        for directory in discover_directories(&self.home.plugins_dir())? {
            if manifest.get(&directory).is_none() {
                report.push(PluginHealth {
                    name: directory.clone(),
                    directory,
                    source: None,
                    status: HealthStatus::Orphaned,
                });
            }
        }
        Ok(report)
    }

    fn health(&self, entry: &ManifestEntry) -> PluginHealth {
        let plugin_dir = self.home.plugin_dir(&entry.directory);
        let status = if !plugin_dir.is_dir() {
            HealthStatus::MissingDirectory
        } else if definition_path(&plugin_dir).is_none() {
            HealthStatus::MissingDefinition
        } else {
            match load_plugin(&plugin_dir) {
                Ok(_) => HealthStatus::Ok,
                Err(e) => HealthStatus::InvalidDefinition(e.to_string()),
            }
        };
        PluginHealth {
            name: entry.name.clone(),
            directory: entry.directory.clone(),
            source: Some(entry.source.kind().to_string()),
            status,
        }
    }

    /// Fetch registry and git plugins whose files are missing, at their pinned ref
    ///
    /// A custom/ directory already on disk (e.g. from a fresh clone of ATK
    /// Home) is kept. Local plugins cannot be fetched and are reported failed.
    pub fn restore_missing(&self) -> Result<BulkReport, AtkError> {
        let manifest = self.load_manifest()?;
        let mut report = BulkReport::default();

        for entry in &manifest.plugins {
            let plugin_dir = self.home.plugin_dir(&entry.directory);
            if definition_path(&plugin_dir).is_some() {
                report.skipped.push(entry.directory.clone());
                continue;
            }
            match self.restore(entry) {
                Ok(()) => report.succeeded.push(entry.directory.clone()),
                Err(e) => {
                    log::warn!("Failed to restore '{}': {}", entry.directory, e);
                    report.failed.push((entry.directory.clone(), e.to_string()));
                }
            }
        }
        Ok(report)
    }

    fn restore(&self, entry: &ManifestEntry) -> Result<(), AtkError> {
        let (Some(kind), Some(reference)) = (source_kind(&entry.directory, &entry.source), entry.source.reference())
        else {
            return Err(AtkError::Fetch(format!(
                "'{}' is a local plugin and its files are missing; restore them manually",
                entry.name
            )));
        };

        let scratch = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(self.home.root())
            .io_context(|| format!("Failed to create staging directory in {}", self.home.root().display()))?;
        let staged = scratch.path().join("fetched");

        log::debug!("restore: fetching '{}' at {}", entry.directory, reference);
        let fetched = self.fetcher.fetch_at(&kind, Some(reference), &staged)?;
        write_ref(&staged, fetched.reference.as_deref().unwrap_or(reference))?;

        let plugin_dir = self.home.plugin_dir(&entry.directory);
        if !plugin_dir.exists() {
            fs::rename(&staged, &plugin_dir)
                .io_context(|| format!("Failed to move fetched files to {}", plugin_dir.display()))?;
        } else {
            // Directory survives with only user state in it; fill in around it
            let items = fs::read_dir(&staged).io_context(|| format!("Failed to read {}", staged.display()))?;
            for item in items {
                let item = item.io_context(|| format!("Failed to read {}", staged.display()))?;
                let name = item.file_name();
                if name == CUSTOM_DIR {
                    continue;
                }
                let target = plugin_dir.join(&name);
                if target.is_dir() {
                    fs::remove_dir_all(&target).io_context(|| format!("Failed to remove {}", target.display()))?;
                } else if target.exists() {
                    fs::remove_file(&target).io_context(|| format!("Failed to remove {}", target.display()))?;
                }
                fs::rename(item.path(), &target).io_context(|| format!("Failed to move {}", target.display()))?;
            }
        }

        log::info!("Restored plugin '{}' at {}", entry.name, reference);
        Ok(())
    }
}
