//! Plugin state convergence
//!
//! The engine turns `add`, `upgrade` and `remove` requests into a consistent
//! plugins/ tree, manifest and git commit. Ordering is always files, then
//! manifest, then commit; a failure anywhere after files are touched rolls
//! everything back.

use std::fs;
use std::path::Path;

use crate::error::{AtkError, IoContext};
use crate::fetch::Fetch;
use crate::git::{CommitOutcome, Git};
use crate::home::AtkHome;
use crate::manifest::{Manifest, ManifestStore, SourceRef};
use crate::plugin::definition::{LifecycleCommand, PluginDefinition};
use crate::plugin::env::plugin_env;
use crate::plugin::executor::LifecycleExecutor;
use crate::source::SourceKind;

pub mod add;
pub mod inspect;
pub mod remove;
mod transaction;
pub mod upgrade;

pub use add::AddOutcome;
pub use inspect::{HealthStatus, PluginHealth};
pub use remove::{RemoveMode, RemoveOutcome};
pub use upgrade::{UpgradeOutcome, UpgradeStatus};

/// Records the fetched commit inside a plugin directory
pub const REF_FILE: &str = ".atk-ref";

pub struct Engine<'a> {
    home: AtkHome,
    store: &'a dyn ManifestStore,
    fetcher: &'a dyn Fetch,
    executor: &'a dyn LifecycleExecutor,
    git: &'a Git<'a>,
}

/// Outcome of a bulk operation; one item failing never stops the rest
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BulkReport {
    pub succeeded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BulkReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl<'a> Engine<'a> {
    pub fn new(
        home: AtkHome,
        store: &'a dyn ManifestStore,
        fetcher: &'a dyn Fetch,
        executor: &'a dyn LifecycleExecutor,
        git: &'a Git<'a>,
    ) -> Self {
        Self {
            home,
            store,
            fetcher,
            executor,
            git,
        }
    }

    pub fn home(&self) -> &AtkHome {
        &self.home
    }

    fn load_manifest(&self) -> Result<Manifest, AtkError> {
        self.home.require_initialized()?;
        self.store.load()
    }

    /// Run a lifecycle command if the plugin defines one; None when it doesn't
    fn run_lifecycle(
        &self,
        plugin_dir: &Path,
        definition: &PluginDefinition,
        command: LifecycleCommand,
    ) -> Result<Option<i32>, AtkError> {
        let Some(command_line) = definition.command(command) else {
            log::debug!("Plugin '{}' defines no {} command", definition.name, command);
            return Ok(None);
        };
        let env = plugin_env(plugin_dir)?;
        let code = self.executor.invoke(plugin_dir, &env, command, &command_line)?;
        Ok(Some(code))
    }

    /// Run `install`; a non-zero exit is an error
    fn install(&self, plugin_dir: &Path, definition: &PluginDefinition) -> Result<Option<i32>, AtkError> {
        let code = self.run_lifecycle(plugin_dir, definition, LifecycleCommand::Install)?;
        if let Some(code) = code
            && code != 0
        {
            return Err(AtkError::Lifecycle {
                plugin: definition.name.clone(),
                command: LifecycleCommand::Install.to_string(),
                code,
            });
        }
        Ok(code)
    }

    fn commit(&self, manifest: &Manifest, message: &str) -> Result<Option<CommitOutcome>, AtkError> {
        if !manifest.config.auto_commit {
            log::debug!("auto_commit disabled, not committing '{}'", message);
            return Ok(None);
        }
        self.git.commit_all(self.home.root(), message).map(Some)
    }

    pub fn add_all(&self, sources: &[String]) -> BulkReport {
        let mut report = BulkReport::default();
        for source in sources {
            match self.add(source) {
                Ok(outcome) => report.succeeded.push(outcome.directory),
                Err(e) => {
                    log::warn!("Failed to add '{}': {}", source, e);
                    report.failed.push((source.clone(), e.to_string()));
                }
            }
        }
        report
    }

    pub fn upgrade_all(&self) -> Result<BulkReport, AtkError> {
        let manifest = self.load_manifest()?;
        let mut report = BulkReport::default();

        for entry in &manifest.plugins {
            if entry.source == SourceRef::Local {
                report.skipped.push(entry.directory.clone());
                continue;
            }
            match self.upgrade(&entry.directory) {
                Ok(outcome) if outcome.status == UpgradeStatus::Upgraded => {
                    report.succeeded.push(entry.directory.clone())
                }
                Ok(_) => report.skipped.push(entry.directory.clone()),
                Err(e) => {
                    log::warn!("Failed to upgrade '{}': {}", entry.directory, e);
                    report.failed.push((entry.directory.clone(), e.to_string()));
                }
            }
        }
        Ok(report)
    }

    pub fn remove_all(&self, mode: RemoveMode) -> Result<BulkReport, AtkError> {
        let manifest = self.load_manifest()?;
        let mut report = BulkReport::default();

        for entry in &manifest.plugins {
            match self.remove(&entry.directory, mode) {
                Ok(outcome) if outcome.removed => report.succeeded.push(entry.directory.clone()),
                Ok(_) => report.skipped.push(entry.directory.clone()),
                Err(e) => {
                    log::warn!("Failed to remove '{}': {}", entry.directory, e);
                    report.failed.push((entry.directory.clone(), e.to_string()));
                }
            }
        }
        Ok(report)
    }
}

/// Source to fetch from for an installed plugin; None for local plugins
///
/// Registry plugins are looked up by their directory name.
pub(crate) fn source_kind(directory: &str, source: &SourceRef) -> Option<SourceKind> {
    match source {
        SourceRef::Local => None,
        SourceRef::Registry { .. } => Some(SourceKind::Registry {
            name: directory.to_string(),
        }),
        SourceRef::Git { url, .. } => Some(SourceKind::Git { url: url.clone() }),
    }
}

/// SourceRef to record after fetching `kind`
pub(crate) fn source_ref(kind: &SourceKind, reference: Option<String>) -> Result<SourceRef, AtkError> {
    let missing = || AtkError::Fetch(format!("no commit recorded while fetching '{}'", kind));
    Ok(match kind {
        SourceKind::Local(_) => SourceRef::Local,
        SourceKind::Registry { .. } => SourceRef::Registry {
            reference: reference.ok_or_else(missing)?,
        },
        SourceKind::Git { url } => SourceRef::Git {
            url: crate::source::normalize_git_url(url),
            reference: reference.ok_or_else(missing)?,
        },
    })
}

pub fn read_ref(plugin_dir: &Path) -> Option<String> {
    fs::read_to_string(plugin_dir.join(REF_FILE))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub(crate) fn write_ref(plugin_dir: &Path, reference: &str) -> Result<(), AtkError> {
    let path = plugin_dir.join(REF_FILE);
    fs::write(&path, format!("{}\n", reference)).io_context(|| format!("Failed to write {}", path.display()))
}
