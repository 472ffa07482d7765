//! Removing plugins

use super::Engine;
use super::transaction::Transaction;
use crate::error::AtkError;
use crate::git::CommitOutcome;
use crate::plugin::definition::LifecycleCommand;
use crate::plugin::loader::load_plugin;

/// How to treat an identifier that is not in the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoveMode {
    /// Unknown plugins are an error
    #[default]
    Direct,
    /// Unknown plugins are already gone, which is success
    Cleanup,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoveOutcome {
    pub name: Option<String>,
    pub directory: Option<String>,
    pub removed: bool,
    /// Exit code of a stop command that failed; removal went ahead anyway
    pub stop_failed: Option<i32>,
    pub commit: Option<CommitOutcome>,
}

impl Engine<'_> {
    pub fn remove(&self, identifier: &str, mode: RemoveMode) -> Result<RemoveOutcome, AtkError> {
        let mut manifest = self.load_manifest()?;

        let Some(entry) = manifest.find(identifier).cloned() else {
            return match mode {
                RemoveMode::Direct => Err(AtkError::PluginNotFound(identifier.to_string())),
                RemoveMode::Cleanup => {
                    log::debug!("remove: '{}' is not installed, nothing to do", identifier);
                    Ok(RemoveOutcome::default())
                }
            };
        };

        let plugin_dir = self.home.plugin_dir(&entry.directory);
        let stop_failed = if plugin_dir.is_dir() { self.stop_best_effort(&plugin_dir) } else { None };

        let mut tx = Transaction::begin(self.home.root(), self.store, &manifest)?;
        let result = (|| -> Result<Option<CommitOutcome>, AtkError> {
            log::debug!("remove: deleting plugins/{}", entry.directory);
            tx.move_aside(&plugin_dir, "removed")?;
            tx.remove_gitignore_exemption(&entry.directory)?;
            manifest.remove_entry(&entry.directory);
            tx.save_manifest(&manifest)?;
            self.commit(&manifest, &format!("Remove plugin '{}'", entry.name))
        })();

        match result {
            Ok(commit) => {
                tx.finish();
                log::info!("Removed plugin '{}'", entry.name);
                Ok(RemoveOutcome {
                    name: Some(entry.name),
                    directory: Some(entry.directory),
                    removed: true,
                    stop_failed,
                    commit,
                })
            }
            Err(e) => {
                log::warn!("Removing '{}' failed: {}", identifier, e);
                tx.rollback();
                Err(e)
            }
        }
    }

    /// Stop the plugin before deleting it; failures only warn
    fn stop_best_effort(&self, plugin_dir: &std::path::Path) -> Option<i32> {
        let definition = match load_plugin(plugin_dir) {
            Ok(definition) => definition,
            Err(e) => {
                log::warn!("Not stopping {}: {}", plugin_dir.display(), e);
                return None;
            }
        };
        match self.run_lifecycle(plugin_dir, &definition, LifecycleCommand::Stop) {
            Ok(Some(code)) if code != 0 => {
                log::warn!("Stop command for '{}' exited with {}", definition.name, code);
                Some(code)
            }
            Ok(_) => None,
            Err(e) => {
                log::warn!("Stop command for '{}' failed: {}", definition.name, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::*;
    use super::*;
    use crate::git::Git;
    use crate::gitignore;
    use crate::manifest::{FileManifestStore, ManifestStore};
    use std::cell::Cell;
    use std::fs;

    #[test]
    fn test_remove_unknown_direct_vs_cleanup() {
        let (_temp, home) = setup_home();
        let store = home.manifest_store();
        let fetcher = FakeFetcher::default();
        let executor = RecordingExecutor::default();
        let runner = NoopRunner;
        let git = Git::new(&runner);
        let engine = Engine::new(home.clone(), &store, &fetcher, &executor, &git);

        assert!(matches!(
            engine.remove("ghost", RemoveMode::Direct),
            Err(AtkError::PluginNotFound(_))
        ));
        let outcome = engine.remove("ghost", RemoveMode::Cleanup).unwrap();
        assert!(!outcome.removed);
    }

    #[test]
    fn test_remove_local_plugin() {
        let (temp, home) = setup_home();
        let src = temp.path().join("src");
        write_plugin(&src, "Local Tool", "lifecycle:\n  stop: ./stop.sh\n");

        let store = home.manifest_store();
        let fetcher = FakeFetcher::default();
        let executor = RecordingExecutor::default();
        executor.exit_codes.borrow_mut().insert("./stop.sh".into(), 1);
        let runner = NoopRunner;
        let git = Git::new(&runner);
        let engine = Engine::new(home.clone(), &store, &fetcher, &executor, &git);

        engine.add(&src.display().to_string()).unwrap();

        // Display name works as an identifier too
        let outcome = engine.remove("Local Tool", RemoveMode::Direct).unwrap();
        assert!(outcome.removed);
        assert_eq!(outcome.stop_failed, Some(1));
        assert!(!home.plugin_dir("local-tool").exists());
        assert!(store.load().unwrap().plugins.is_empty());
        let ignore = fs::read_to_string(home.root().join(".gitignore")).unwrap();
        assert!(gitignore::exemptions(&ignore).is_empty());
    }

    #[test]
    fn test_remove_entry_without_directory() {
        let (temp, home) = setup_home();
        let src = temp.path().join("src");
        write_plugin(&src, "Gone", "");

        let store = home.manifest_store();
        let fetcher = FakeFetcher::default();
        let executor = RecordingExecutor::default();
        let runner = NoopRunner;
        let git = Git::new(&runner);
        let engine = Engine::new(home.clone(), &store, &fetcher, &executor, &git);

        engine.add(&src.display().to_string()).unwrap();
        fs::remove_dir_all(home.plugin_dir("gone")).unwrap();

        assert!(engine.remove("gone", RemoveMode::Direct).unwrap().removed);
        assert!(executor.calls.borrow().is_empty());
    }

    #[test]
    fn test_failed_save_keeps_plugin() {
        let (temp, home) = setup_home();
        let src = temp.path().join("src");
        write_plugin(&src, "Keeper", "");

        let store = FlakyStore {
            inner: FileManifestStore::new(home.root()),
            fail_saves: Cell::new(0),
        };
        let fetcher = FakeFetcher::default();
        let executor = RecordingExecutor::default();
        let runner = NoopRunner;
        let git = Git::new(&runner);
        let engine = Engine::new(home.clone(), &store, &fetcher, &executor, &git);

        engine.add(&src.display().to_string()).unwrap();
        store.fail_saves.set(1);

        assert!(engine.remove("keeper", RemoveMode::Direct).is_err());
        assert!(home.plugin_dir("keeper").join("plugin.yaml").exists());
        assert_eq!(store.load().unwrap().plugins.len(), 1);
        let ignore = fs::read_to_string(home.root().join(".gitignore")).unwrap();
        assert_eq!(gitignore::exemptions(&ignore), vec!["keeper"]);
    }

    #[test]
    fn test_remove_all_cleanup() {
        let (temp, home) = setup_home();
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        write_plugin(&a, "Alpha", "");
        write_plugin(&b, "Beta", "");

        let store = home.manifest_store();
        let fetcher = FakeFetcher::default();
        let executor = RecordingExecutor::default();
        let runner = NoopRunner;
        let git = Git::new(&runner);
        let engine = Engine::new(home.clone(), &store, &fetcher, &executor, &git);

        engine.add(&a.display().to_string()).unwrap();
        engine.add(&b.display().to_string()).unwrap();

        let report = engine.remove_all(RemoveMode::Cleanup).unwrap();
        assert_eq!(report.succeeded, vec!["alpha", "beta"]);
        assert!(report.is_success());
        assert!(store.load().unwrap().plugins.is_empty());
    }
}
