//! Undo journal for a single engine operation
//!
//! Directory changes are renames only, so every step can be reversed. Moved
//! aside content lives in a scratch directory inside ATK Home (ignored by git)
//! and disappears once the operation finishes. Single files written in place
//! keep their previous bytes in the journal.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::error::{AtkError, IoContext};
use crate::fetch::STAGING_PREFIX;
use crate::gitignore::GitignoreFile;
use crate::manifest::{Manifest, ManifestStore};

/// One reversible filesystem change
enum Step {
    Rename { from: PathBuf, to: PathBuf },
    Write { path: PathBuf, before: Option<Vec<u8>> },
}

pub(crate) struct Transaction<'a> {
    store: &'a dyn ManifestStore,
    gitignore: GitignoreFile,
    manifest_before: Manifest,
    gitignore_before: Option<String>,
    manifest_touched: bool,
    steps: Vec<Step>,
    scratch: TempDir,
}

impl<'a> Transaction<'a> {
    pub fn begin(home: &Path, store: &'a dyn ManifestStore, manifest: &Manifest) -> Result<Self, AtkError> {
        let scratch = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(home)
            .io_context(|| format!("Failed to create staging directory in {}", home.display()))?;

        Ok(Self {
            store,
            gitignore: GitignoreFile::new(home),
            manifest_before: manifest.clone(),
            gitignore_before: None,
            manifest_touched: false,
            steps: Vec::new(),
            scratch,
        })
    }

    /// Scratch space that is deleted when the transaction ends
    pub fn scratch(&self) -> &Path {
        self.scratch.path()
    }

    /// Rename `from` to `to`, remembering how to undo it
    pub fn rename(&mut self, from: &Path, to: &Path) -> Result<(), AtkError> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).io_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::rename(from, to).io_context(|| format!("Failed to move {} to {}", from.display(), to.display()))?;
        log::debug!("Moved {} -> {}", from.display(), to.display());
        self.steps.push(Step::Rename {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
        Ok(())
    }

    /// Overwrite a file in place; rollback puts the old bytes back or deletes it
    pub fn write_file(&mut self, path: &Path, contents: &[u8]) -> Result<(), AtkError> {
        let before = match fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(AtkError::io(format!("Failed to read {}", path.display()), e)),
        };
        fs::write(path, contents).io_context(|| format!("Failed to write {}", path.display()))?;
        self.steps.push(Step::Write {
            path: path.to_path_buf(),
            before,
        });
        Ok(())
    }

    /// Move `path` into scratch if it exists; returns where it went
    pub fn move_aside(&mut self, path: &Path, label: &str) -> Result<Option<PathBuf>, AtkError> {
        if !path.exists() {
            return Ok(None);
        }
        let aside = self.scratch().join(label);
        self.rename(path, &aside)?;
        Ok(Some(aside))
    }

    pub fn save_manifest(&mut self, manifest: &Manifest) -> Result<(), AtkError> {
        self.manifest_touched = true;
        self.store.save(manifest)
    }

    pub fn add_gitignore_exemption(&mut self, directory: &str) -> Result<(), AtkError> {
        self.snapshot_gitignore()?;
        self.gitignore.add_exemption(directory)?;
        Ok(())
    }

    pub fn remove_gitignore_exemption(&mut self, directory: &str) -> Result<(), AtkError> {
        self.snapshot_gitignore()?;
        self.gitignore.remove_exemption(directory)?;
        Ok(())
    }

    fn snapshot_gitignore(&mut self) -> Result<(), AtkError> {
        if self.gitignore_before.is_none() {
            self.gitignore_before = Some(self.gitignore.read()?);
        }
        Ok(())
    }

    /// Keep every change; scratch content is discarded
    pub fn finish(self) {
        log::debug!("Transaction finished ({} step(s))", self.steps.len());
    }

    /// Undo in reverse: manifest, then .gitignore, then files and directories
    ///
    /// Each step is attempted even if an earlier one failed.
    pub fn rollback(mut self) {
        log::warn!("Rolling back");

        if self.manifest_touched
            && let Err(e) = self.store.save(&self.manifest_before)
        {
            log::warn!("Failed to restore manifest: {}", e);
        }

        if let Some(content) = self.gitignore_before.take()
            && let Err(e) = self.gitignore.write(&content)
        {
            log::warn!("Failed to restore .gitignore: {}", e);
        }

        while let Some(step) = self.steps.pop() {
            match step {
                Step::Rename { from, to } => undo_rename(&from, &to),
                Step::Write { path, before } => undo_write(&path, before),
            }
        }
    }
}

fn undo_rename(from: &Path, to: &Path) {
    if !to.exists() {
        return;
    }
    if from.exists()
        && let Err(e) = fs::remove_dir_all(from)
    {
        log::warn!("Failed to clear {}: {}", from.display(), e);
        return;
    }
    if let Err(e) = fs::rename(to, from) {
        log::warn!("Failed to restore {}: {}", from.display(), e);
    }
}

fn undo_write(path: &Path, before: Option<Vec<u8>>) {
    let result = match before {
        Some(bytes) => fs::write(path, bytes),
        None => fs::remove_file(path),
    };
    if let Err(e) = result {
        log::warn!("Failed to restore {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitignore;
    use crate::manifest::{FileManifestStore, ManifestEntry, SourceRef};
    use tempfile::tempdir;

    #[test]
    fn test_rollback_restores_everything() {
        let temp = tempdir().unwrap();
        let home = temp.path();
        let store = FileManifestStore::new(home);
        let manifest = Manifest::default();
        store.save(&manifest).unwrap();
        fs::write(home.join(".gitignore"), gitignore::default_content()).unwrap();

        let original = home.join("plugins").join("tool");
        fs::create_dir_all(&original).unwrap();
        fs::write(original.join("plugin.yaml"), "old").unwrap();

        let mut tx = Transaction::begin(home, &store, &manifest).unwrap();
        tx.move_aside(&original, "previous").unwrap();

        let staged = tx.scratch().join("fetched");
        fs::create_dir_all(&staged).unwrap();
        fs::write(staged.join("plugin.yaml"), "new").unwrap();
        tx.rename(&staged, &original).unwrap();

        let mut changed = manifest.clone();
        changed
            .add_entry(ManifestEntry {
                name: "Tool".into(),
                directory: "tool".into(),
                source: SourceRef::Local,
                customized: false,
            })
            .unwrap();
        tx.save_manifest(&changed).unwrap();
        tx.add_gitignore_exemption("tool").unwrap();

        tx.rollback();

        assert_eq!(fs::read_to_string(original.join("plugin.yaml")).unwrap(), "old");
        assert!(store.load().unwrap().plugins.is_empty());
        assert_eq!(
            fs::read_to_string(home.join(".gitignore")).unwrap(),
            gitignore::default_content()
        );
        // Scratch directory is gone
        let leftovers = fs::read_dir(home)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_finish_discards_moved_aside_content() {
        let temp = tempdir().unwrap();
        let store = FileManifestStore::new(temp.path());
        let dir = temp.path().join("old");
        fs::create_dir_all(&dir).unwrap();

        let mut tx = Transaction::begin(temp.path(), &store, &Manifest::default()).unwrap();
        let aside = tx.move_aside(&dir, "previous").unwrap().unwrap();
        assert!(aside.exists());
        tx.finish();

        assert!(!dir.exists());
        assert!(!aside.exists());
    }

    #[test]
    fn test_rollback_restores_written_files() {
        let temp = tempdir().unwrap();
        let store = FileManifestStore::new(temp.path());
        let existing = temp.path().join("kept.txt");
        let created = temp.path().join("created.txt");
        fs::write(&existing, "before").unwrap();

        let mut tx = Transaction::begin(temp.path(), &store, &Manifest::default()).unwrap();
        tx.write_file(&existing, b"after").unwrap();
        tx.write_file(&existing, b"after again").unwrap();
        tx.write_file(&created, b"new").unwrap();
        assert_eq!(fs::read_to_string(&existing).unwrap(), "after again");
        tx.rollback();

        assert_eq!(fs::read_to_string(&existing).unwrap(), "before");
        assert!(!created.exists());
    }

    #[test]
    fn test_move_aside_missing_path() {
        let temp = tempdir().unwrap();
        let store = FileManifestStore::new(temp.path());
        let mut tx = Transaction::begin(temp.path(), &store, &Manifest::default()).unwrap();
        assert!(tx.move_aside(&temp.path().join("nope"), "x").unwrap().is_none());
    }
}
