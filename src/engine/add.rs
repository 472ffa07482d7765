//! Adding plugins

use std::fs;
use std::path::{Path, PathBuf};

use super::transaction::Transaction;
use super::{Engine, source_ref, write_ref};
use crate::error::{AtkError, IoContext};
use crate::git::CommitOutcome;
use crate::manifest::{Manifest, ManifestEntry, SourceRef};
use crate::plugin::env::ENV_FILE;
use crate::plugin::loader::{load_definition, load_plugin};
use crate::plugin::overrides::{CUSTOM_DIR, has_custom_dir};
use crate::sanitize::sanitize;
use crate::source::{SourceKind, resolve};

/// User state that survives re-adding a registry or git plugin
pub(crate) const PRESERVED: [&str; 2] = [CUSTOM_DIR, ENV_FILE];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    pub name: String,
    pub directory: String,
    pub source: SourceRef,
    /// An existing plugin directory was replaced
    pub replaced: bool,
    /// Exit code of the install command, if one ran
    pub install_exit: Option<i32>,
    pub commit: Option<CommitOutcome>,
}

impl Engine<'_> {
    /// Add (or re-add) a plugin from a local path, git URL or registry name
    pub fn add(&self, source: &str) -> Result<AddOutcome, AtkError> {
        log::debug!("add: resolving '{}'", source);
        let kind = resolve(source)?;
        let mut manifest = self.load_manifest()?;

        let mut tx = Transaction::begin(self.home.root(), self.store, &manifest)?;
        match self.add_in(&kind, &mut manifest, &mut tx) {
            Ok(outcome) => {
                tx.finish();
                log::info!("Added plugin '{}' ({})", outcome.name, outcome.directory);
                Ok(outcome)
            }
            Err(e) => {
                log::warn!("Adding '{}' failed: {}", source, e);
                tx.rollback();
                Err(e)
            }
        }
    }

    fn add_in(
        &self,
        kind: &SourceKind,
        manifest: &mut Manifest,
        tx: &mut Transaction,
    ) -> Result<AddOutcome, AtkError> {
        if let SourceKind::Local(path) = kind
            && let Some(directory) = self.adoptable(path)?
        {
            return self.adopt(&directory, manifest, tx);
        }

        log::debug!("add: fetching {} source '{}'", kind.kind(), kind);
        let staged = tx.scratch().join("fetched");
        let fetched = self.fetcher.fetch(kind, &staged)?;

        log::debug!("add: validating");
        let definition = load_definition(&staged)?;
        let directory = sanitize(&definition.name)?;
        let source = source_ref(kind, fetched.reference)?;

        log::debug!("add: placing files in plugins/{}", directory);
        let target = self.home.plugin_dir(&directory);
        if let Some(reference) = source.reference() {
            write_ref(&staged, reference)?;
        }
        let previous = tx.move_aside(&target, "previous")?;
        let replaced = previous.is_some();
        if let Some(previous) = &previous
            && source != SourceRef::Local
        {
            carry_over(tx, previous, &staged)?;
        }
        tx.rename(&staged, &target)?;

        self.register(&definition.name, &directory, source, &target, manifest, tx, replaced)
    }

    /// Directory name when `path` already is `plugins/<name>` for its own definition
    fn adoptable(&self, path: &Path) -> Result<Option<String>, AtkError> {
        let (Ok(path), Ok(plugins)) = (path.canonicalize(), self.home.plugins_dir().canonicalize()) else {
            return Ok(None);
        };
        if !path.is_dir() || path.parent() != Some(plugins.as_path()) {
            return Ok(None);
        }

        let definition = load_definition(&path)?;
        let directory = sanitize(&definition.name)?;
        let in_place = path.file_name().is_some_and(|name| name == directory.as_str());
        Ok(in_place.then_some(directory))
    }

    fn adopt(&self, directory: &str, manifest: &mut Manifest, tx: &mut Transaction) -> Result<AddOutcome, AtkError> {
        log::debug!("add: adopting plugins/{} in place", directory);
        let target = self.home.plugin_dir(directory);
        let definition = load_definition(&target)?;
        let replaced = manifest.get(directory).is_some();
        self.register(&definition.name, directory, SourceRef::Local, &target, manifest, tx, replaced)
    }

    /// Manifest, gitignore, install and commit for a plugin already placed at `target`
    #[allow(clippy::too_many_arguments)]
    fn register(
        &self,
        name: &str,
        directory: &str,
        source: SourceRef,
        target: &Path,
        manifest: &mut Manifest,
        tx: &mut Transaction,
        replaced: bool,
    ) -> Result<AddOutcome, AtkError> {
        log::debug!("add: updating manifest");
        manifest.upsert_entry(ManifestEntry {
            name: name.to_string(),
            directory: directory.to_string(),
            source: source.clone(),
            customized: has_custom_dir(target),
        })?;
        tx.save_manifest(manifest)?;

        if source == SourceRef::Local {
            tx.add_gitignore_exemption(directory)?;
        } else {
            tx.remove_gitignore_exemption(directory)?;
        }

        log::debug!("add: running install");
        let effective = load_plugin(target)?;
        let install_exit = self.install(target, &effective)?;

        log::debug!("add: committing");
        let verb = if replaced { "Update" } else { "Add" };
        let commit = self.commit(manifest, &format!("{} plugin '{}'", verb, name))?;

        Ok(AddOutcome {
            name: name.to_string(),
            directory: directory.to_string(),
            source,
            replaced,
            install_exit,
            commit,
        })
    }
}

/// Move preserved user state from the previous directory into the new one
///
/// Fetched copies of the same paths are dropped; the user's win.
pub(crate) fn carry_over(tx: &mut Transaction, previous: &Path, staged: &Path) -> Result<(), AtkError> {
    for name in PRESERVED {
        let from = previous.join(name);
        if !from.exists() {
            continue;
        }
        let to: PathBuf = staged.join(name);
        if to.is_dir() {
            fs::remove_dir_all(&to).io_context(|| format!("Failed to remove {}", to.display()))?;
        } else if to.exists() {
            fs::remove_file(&to).io_context(|| format!("Failed to remove {}", to.display()))?;
        }
        tx.rename(&from, &to)?;
    }
    Ok(())
}
