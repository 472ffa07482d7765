//! Upgrading registry and git plugins

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::add::{PRESERVED, carry_over};
use super::transaction::Transaction;
use super::{Engine, REF_FILE, read_ref, source_kind, source_ref, write_ref};
use crate::error::{AtkError, IoContext};
use crate::git::CommitOutcome;
use crate::manifest::{Manifest, ManifestEntry, SourceRef};
use crate::plugin::loader::{load_definition, load_plugin};
use crate::plugin::overrides::has_custom_dir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeStatus {
    UpToDate,
    /// Remote moved but the plugin's files did not; only the ref was updated
    RefRefreshed,
    Upgraded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeOutcome {
    pub name: String,
    pub directory: String,
    pub status: UpgradeStatus,
    pub old_ref: Option<String>,
    pub new_ref: Option<String>,
    /// Env vars declared by the new version that the old one lacked
    pub new_env_vars: Vec<String>,
    pub commit: Option<CommitOutcome>,
}

impl Engine<'_> {
    pub fn upgrade(&self, identifier: &str) -> Result<UpgradeOutcome, AtkError> {
        let mut manifest = self.load_manifest()?;
        let entry = manifest
            .find(identifier)
            .cloned()
            .ok_or_else(|| AtkError::PluginNotFound(identifier.to_string()))?;

        let Some(kind) = source_kind(&entry.directory, &entry.source) else {
            return Err(AtkError::LocalNotUpgradable(entry.name));
        };

        let plugin_dir = self.home.plugin_dir(&entry.directory);
        let current_ref = read_ref(&plugin_dir).or_else(|| entry.source.reference().map(str::to_string));
        let outcome = |status: UpgradeStatus,
                       new_ref: Option<String>,
                       new_env_vars: Vec<String>,
                       commit: Option<CommitOutcome>| UpgradeOutcome {
            name: entry.name.clone(),
            directory: entry.directory.clone(),
            status,
            old_ref: current_ref.clone(),
            new_ref,
            new_env_vars,
            commit,
        };

        log::debug!("upgrade: checking remote for '{}'", entry.directory);
        if let Some(head) = self.fetcher.remote_head(&kind)?
            && current_ref.as_deref() == Some(head.as_str())
        {
            log::info!("Plugin '{}' is up to date", entry.name);
            return Ok(outcome(UpgradeStatus::UpToDate, Some(head), Vec::new(), None));
        }

        let mut tx = Transaction::begin(self.home.root(), self.store, &manifest)?;
        let staged = tx.scratch().join("fetched");

        let result = (|| -> Result<UpgradeOutcome, AtkError> {
            log::debug!("upgrade: fetching '{}'", kind);
            let fetched = self.fetcher.fetch(&kind, &staged)?;
            let source = source_ref(&kind, fetched.reference)?;
            let new_ref = source.reference().map(str::to_string);
            let new_definition = load_definition(&staged)?;

            if plugin_dir.is_dir() && !content_changed(&plugin_dir, &staged)? {
                if new_ref == current_ref {
                    return Ok(outcome(UpgradeStatus::UpToDate, new_ref, Vec::new(), None));
                }
                log::debug!("upgrade: content unchanged, refreshing ref");
                if let Some(reference) = &new_ref {
                    tx.write_file(&plugin_dir.join(REF_FILE), format!("{}\n", reference).as_bytes())?;
                }
                let message = format!("Refresh plugin '{}'", entry.name);
                let commit = self.record(&mut manifest, &entry, source, &mut tx, &message, false)?;
                return Ok(outcome(UpgradeStatus::RefRefreshed, new_ref, Vec::new(), commit));
            }

            let new_env_vars = match load_definition(&plugin_dir) {
                Ok(old) => {
                    let old_names = old.env_var_names();
                    new_definition
                        .env_var_names()
                        .into_iter()
                        .filter(|name| !old_names.contains(name))
                        .map(str::to_string)
                        .collect()
                }
                Err(_) => new_definition.env_var_names().into_iter().map(str::to_string).collect(),
            };

            log::debug!("upgrade: replacing plugins/{}", entry.directory);
            if let Some(reference) = &new_ref {
                write_ref(&staged, reference)?;
            }
            if let Some(previous) = tx.move_aside(&plugin_dir, "previous")? {
                carry_over(&mut tx, &previous, &staged)?;
            }
            tx.rename(&staged, &plugin_dir)?;

            let message = format!("Upgrade plugin '{}'", entry.name);
            let commit = self.record(&mut manifest, &entry, source, &mut tx, &message, true)?;
            Ok(outcome(UpgradeStatus::Upgraded, new_ref, new_env_vars, commit))
        })();

        match result {
            Ok(outcome) => {
                tx.finish();
                if outcome.status == UpgradeStatus::Upgraded {
                    log::info!("Upgraded plugin '{}' to {:?}", outcome.name, outcome.new_ref);
                }
                Ok(outcome)
            }
            Err(e) => {
                log::warn!("Upgrading '{}' failed: {}", identifier, e);
                tx.rollback();
                Err(e)
            }
        }
    }

    /// Replace the SourceRef, save, optionally run install, and commit
    fn record(
        &self,
        manifest: &mut Manifest,
        entry: &ManifestEntry,
        source: SourceRef,
        tx: &mut Transaction,
        message: &str,
        run_install: bool,
    ) -> Result<Option<CommitOutcome>, AtkError> {
        let plugin_dir = self.home.plugin_dir(&entry.directory);
        manifest.update_entry(ManifestEntry {
            source,
            customized: has_custom_dir(&plugin_dir),
            ..entry.clone()
        })?;
        tx.save_manifest(manifest)?;

        if run_install {
            let effective = load_plugin(&plugin_dir)?;
            self.install(&plugin_dir, &effective)?;
        }

        self.commit(manifest, message)
    }
}

/// Whether two plugin trees differ, ignoring user state and the ref file
pub(crate) fn content_changed(current: &Path, staged: &Path) -> Result<bool, AtkError> {
    Ok(snapshot(current)? != snapshot(staged)?)
}

fn snapshot(root: &Path) -> Result<BTreeMap<PathBuf, Vec<u8>>, AtkError> {
    let mut files = BTreeMap::new();
    let walker = WalkDir::new(root).min_depth(1).into_iter().filter_entry(|entry| {
        let top_level = entry.depth() == 1;
        let name = entry.file_name().to_str().unwrap_or_default();
        !(top_level && (PRESERVED.contains(&name) || name == REF_FILE))
    });

    for entry in walker {
        let entry = entry.map_err(|e| AtkError::Fetch(format!("Failed to walk {}: {}", root.display(), e)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| AtkError::Fetch(e.to_string()))?
            .to_path_buf();
        let content = fs::read(entry.path()).io_context(|| format!("Failed to read {}", entry.path().display()))?;
        files.insert(relative, content);
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::super::tests::*;
    use super::*;
    use crate::git::Git;
    use crate::manifest::ManifestStore;
    use crate::plugin::env::ENV_FILE;
    use crate::plugin::overrides::CUSTOM_DIR;
    use tempfile::tempdir;

    struct Fixture {
        _temp: tempfile::TempDir,
        home: crate::home::AtkHome,
        upstream: PathBuf,
    }

    fn fixture() -> Fixture {
        let (temp, home) = setup_home();
        let upstream = temp.path().join("upstream-piper");
        write_plugin(&upstream, "Piper", "env_vars:\n  - name: VOICE\n");
        Fixture {
            _temp: temp,
            home,
            upstream,
        }
    }

    #[test]
    fn test_upgrade_preserves_custom_byte_for_byte() {
        let f = fixture();
        let store = f.home.manifest_store();
        let fetcher = FakeFetcher::default();
        fetcher.serve("piper", &f.upstream, "ref-1");
        let executor = RecordingExecutor::default();
        let runner = NoopRunner;
        let git = Git::new(&runner);
        let engine = Engine::new(f.home.clone(), &store, &fetcher, &executor, &git);

        engine.add("piper").unwrap();
        let dir = f.home.plugin_dir("piper");
        fs::create_dir_all(dir.join(CUSTOM_DIR)).unwrap();
        fs::write(dir.join(CUSTOM_DIR).join("note.txt"), "keep me").unwrap();
        fs::write(dir.join(ENV_FILE), "VOICE=amy\n").unwrap();

        // New upstream version with an extra env var
        write_plugin(
            &f.upstream,
            "Piper",
            "env_vars:\n  - name: VOICE\n  - name: SPEED\n",
        );
        fetcher.serve("piper", &f.upstream, "ref-2");

        let outcome = engine.upgrade("piper").unwrap();
        assert_eq!(outcome.status, UpgradeStatus::Upgraded);
        assert_eq!(outcome.old_ref.as_deref(), Some("ref-1"));
        assert_eq!(outcome.new_ref.as_deref(), Some("ref-2"));
        assert_eq!(outcome.new_env_vars, vec!["SPEED"]);

        assert_eq!(fs::read(dir.join(CUSTOM_DIR).join("note.txt")).unwrap(), b"keep me");
        assert_eq!(fs::read_to_string(dir.join(ENV_FILE)).unwrap(), "VOICE=amy\n");
        assert_eq!(read_ref(&dir).as_deref(), Some("ref-2"));

        let entry = store.load().unwrap().plugins[0].clone();
        assert_eq!(
            entry.source,
            SourceRef::Registry {
                reference: "ref-2".into()
            }
        );
        assert!(entry.customized);
    }

    #[test]
    fn test_remote_head_match_skips_fetch() {
        let f = fixture();
        let store = f.home.manifest_store();
        let fetcher = FakeFetcher::default();
        fetcher.serve("piper", &f.upstream, "ref-1");
        let executor = RecordingExecutor::default();
        let runner = NoopRunner;
        let git = Git::new(&runner);
        let engine = Engine::new(f.home.clone(), &store, &fetcher, &executor, &git);

        engine.add("piper").unwrap();
        fetcher.remote_heads.borrow_mut().insert("piper".into(), "ref-1".into());
        let fetches = fetcher.fetches.get();

        let outcome = engine.upgrade("piper").unwrap();
        assert_eq!(outcome.status, UpgradeStatus::UpToDate);
        assert_eq!(fetcher.fetches.get(), fetches);
    }

    #[test]
    fn test_unchanged_content_only_refreshes_ref() {
        let f = fixture();
        let store = f.home.manifest_store();
        let fetcher = FakeFetcher::default();
        fetcher.serve("piper", &f.upstream, "ref-1");
        let executor = RecordingExecutor::default();
        let runner = NoopRunner;
        let git = Git::new(&runner);
        let engine = Engine::new(f.home.clone(), &store, &fetcher, &executor, &git);

        engine.add("piper").unwrap();
        fetcher.serve("piper", &f.upstream, "ref-2");

        let outcome = engine.upgrade("piper").unwrap();
        assert_eq!(outcome.status, UpgradeStatus::RefRefreshed);
        assert_eq!(read_ref(&f.home.plugin_dir("piper")).as_deref(), Some("ref-2"));
        assert_eq!(store.load().unwrap().plugins[0].source.reference(), Some("ref-2"));
    }

    #[test]
    fn test_failed_save_keeps_old_ref_on_refresh() {
        let f = fixture();
        let store = FlakyStore {
            inner: f.home.manifest_store(),
            fail_saves: std::cell::Cell::new(0),
        };
        let fetcher = FakeFetcher::default();
        fetcher.serve("piper", &f.upstream, "ref-1");
        let executor = RecordingExecutor::default();
        let runner = NoopRunner;
        let git = Git::new(&runner);
        let engine = Engine::new(f.home.clone(), &store, &fetcher, &executor, &git);

        engine.add("piper").unwrap();
        fetcher.serve("piper", &f.upstream, "ref-2");
        store.fail_saves.set(1);

        assert!(matches!(engine.upgrade("piper"), Err(AtkError::Manifest(_))));

        let dir = f.home.plugin_dir("piper");
        assert_eq!(read_ref(&dir).as_deref(), Some("ref-1"));
        assert_eq!(store.load().unwrap().plugins[0].source.reference(), Some("ref-1"));

        // Next run still sees the pending refresh
        fetcher.remote_heads.borrow_mut().insert("piper".into(), "ref-2".into());
        let outcome = engine.upgrade("piper").unwrap();
        assert_eq!(outcome.status, UpgradeStatus::RefRefreshed);
        assert_eq!(read_ref(&dir).as_deref(), Some("ref-2"));
        assert_eq!(store.load().unwrap().plugins[0].source.reference(), Some("ref-2"));
    }

    #[test]
    fn test_same_ref_same_content_is_up_to_date() {
        let f = fixture();
        let store = f.home.manifest_store();
        let fetcher = FakeFetcher::default();
        fetcher.serve("piper", &f.upstream, "ref-1");
        let executor = RecordingExecutor::default();
        let runner = NoopRunner;
        let git = Git::new(&runner);
        let engine = Engine::new(f.home.clone(), &store, &fetcher, &executor, &git);

        engine.add("piper").unwrap();
        assert_eq!(engine.upgrade("piper").unwrap().status, UpgradeStatus::UpToDate);
    }

    #[test]
    fn test_local_plugin_cannot_upgrade() {
        let f = fixture();
        let store = f.home.manifest_store();
        let fetcher = FakeFetcher::default();
        let executor = RecordingExecutor::default();
        let runner = NoopRunner;
        let git = Git::new(&runner);
        let engine = Engine::new(f.home.clone(), &store, &fetcher, &executor, &git);

        engine.add(&f.upstream.display().to_string()).unwrap();
        assert!(matches!(engine.upgrade("piper"), Err(AtkError::LocalNotUpgradable(_))));
        assert!(matches!(engine.upgrade("nope"), Err(AtkError::PluginNotFound(_))));
    }

    #[test]
    fn test_failed_install_rolls_back_upgrade() {
        let f = fixture();
        let store = f.home.manifest_store();
        let fetcher = FakeFetcher::default();
        fetcher.serve("piper", &f.upstream, "ref-1");
        let executor = RecordingExecutor::default();
        let runner = NoopRunner;
        let git = Git::new(&runner);
        let engine = Engine::new(f.home.clone(), &store, &fetcher, &executor, &git);

        engine.add("piper").unwrap();
        let dir = f.home.plugin_dir("piper");
        fs::create_dir_all(dir.join(CUSTOM_DIR)).unwrap();
        fs::write(dir.join(CUSTOM_DIR).join("note.txt"), "keep me").unwrap();

        write_plugin(
            &f.upstream,
            "Piper",
            "lifecycle:\n  install: make install\n  uninstall: make uninstall\n",
        );
        fetcher.serve("piper", &f.upstream, "ref-2");
        executor.exit_codes.borrow_mut().insert("make install".into(), 1);

        assert!(matches!(engine.upgrade("piper"), Err(AtkError::Lifecycle { .. })));

        assert_eq!(read_ref(&dir).as_deref(), Some("ref-1"));
        assert_eq!(fs::read(dir.join(CUSTOM_DIR).join("note.txt")).unwrap(), b"keep me");
        assert!(!fs::read_to_string(dir.join("plugin.yaml")).unwrap().contains("lifecycle"));
        assert_eq!(store.load().unwrap().plugins[0].source.reference(), Some("ref-1"));
    }

    #[test]
    fn test_content_changed_ignores_user_state() {
        let temp = tempdir().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        write_plugin(&a, "Same", "");
        write_plugin(&b, "Same", "");
        fs::create_dir_all(a.join(CUSTOM_DIR)).unwrap();
        fs::write(a.join(CUSTOM_DIR).join("x"), "y").unwrap();
        fs::write(a.join(REF_FILE), "abc").unwrap();
        fs::write(a.join(ENV_FILE), "K=V").unwrap();
        assert!(!content_changed(&a, &b).unwrap());

        fs::write(b.join("extra.sh"), "echo").unwrap();
        assert!(content_changed(&a, &b).unwrap());
    }
}
