//! Registry sources
//!
//! The registry is a git repository with an index.yaml at its root. Only the
//! index and the requested plugin subtree are ever checked out.

use std::fs;
use std::path::Path;

use super::{FetchResult, copy_tree, into_fetch_error, stage};
use crate::error::{AtkError, IoContext};
use crate::git::Git;
use crate::plugin::registry::RegistryIndex;

const INDEX_FILE: &str = "index.yaml";

pub fn fetch(
    git: &Git,
    registry_url: &str,
    name: &str,
    reference: Option<&str>,
    destination: &Path,
) -> Result<FetchResult, AtkError> {
    stage(destination, |staging, out| {
        let clone = staging.join("registry");
        git.sparse_clone(registry_url, &clone).map_err(into_fetch_error)?;

        if let Some(reference) = reference {
            git.checkout(&clone, reference).map_err(into_fetch_error)?;
        }

        git.sparse_checkout(&clone, &[&format!("/{}", INDEX_FILE)])
            .map_err(into_fetch_error)?;

        let index_path = clone.join(INDEX_FILE);
        if !index_path.is_file() {
            return Err(AtkError::Fetch(format!("registry {} has no {}", registry_url, INDEX_FILE)));
        }
        let content =
            fs::read_to_string(&index_path).io_context(|| format!("Failed to read {}", index_path.display()))?;
        let index = RegistryIndex::from_str(&content)?;
        let entry = index.lookup(name)?;

        let subtree = entry.path.trim_matches('/');
        git.sparse_checkout(&clone, &[&format!("/{}/*", subtree)])
            .map_err(into_fetch_error)?;

        let plugin_src = clone.join(subtree);
        if !plugin_src.is_dir() {
            return Err(AtkError::Fetch(format!(
                "plugin directory '{}' is listed in the index but missing from the registry",
                entry.path
            )));
        }

        let head = git.head(&clone).map_err(into_fetch_error)?;
        copy_tree(&plugin_src, out, None)?;

        log::info!("Fetched '{}' from registry at {}", name, head);
        Ok(FetchResult { reference: Some(head) })
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::git::CommitOutcome;
    use crate::plugin::executor::SystemRunner;
    use tempfile::tempdir;

    /// Build a registry repository with one plugin; returns its file:// URL and first commit
    pub fn make_registry(root: &Path) -> (String, String) {
        let git = Git::new(&SystemRunner);
        let repo = root.join("registry-src");
        let plugin = repo.join("plugins").join("piper");
        fs::create_dir_all(&plugin).unwrap();
        fs::write(
            repo.join(INDEX_FILE),
            "plugins:\n  - name: piper\n    path: plugins/piper\n    description: Text to speech\n",
        )
        .unwrap();
        fs::write(
            plugin.join("plugin.yaml"),
            "schema_version: \"2026-01-23\"\nname: Piper\ndescription: Text to speech\n",
        )
        .unwrap();
        git.init(&repo).unwrap();
        let hash = match git.commit_all(&repo, "initial").unwrap() {
            CommitOutcome::Committed { hash } => hash,
            CommitOutcome::NothingToCommit => panic!("expected a commit"),
        };
        (format!("file://{}", repo.display()), hash)
    }

    #[test]
    fn test_fetch_from_registry() {
        if !Git::is_available() {
            return;
        }
        let temp = tempdir().unwrap();
        let (url, hash) = make_registry(temp.path());
        let git = Git::new(&SystemRunner);

        let dest = temp.path().join("home").join("plugins").join("piper");
        let result = fetch(&git, &url, "piper", None, &dest).unwrap();

        assert_eq!(result.reference.as_deref(), Some(hash.as_str()));
        assert!(dest.join("plugin.yaml").exists());
        assert!(!dest.join(INDEX_FILE).exists());
    }

    #[test]
    fn test_unknown_plugin_in_registry() {
        if !Git::is_available() {
            return;
        }
        let temp = tempdir().unwrap();
        let (url, _) = make_registry(temp.path());
        let git = Git::new(&SystemRunner);

        let dest = temp.path().join("out");
        let result = fetch(&git, &url, "missing", None, &dest);
        assert!(matches!(result, Err(AtkError::PluginNotFound(_))));
        assert!(!dest.exists());
    }

    #[test]
    fn test_unreachable_registry_is_fetch_error() {
        if !Git::is_available() {
            return;
        }
        let temp = tempdir().unwrap();
        let git = Git::new(&SystemRunner);
        let url = format!("file://{}", temp.path().join("nowhere").display());
        let result = fetch(&git, &url, "piper", None, &temp.path().join("out"));
        assert!(matches!(result, Err(AtkError::Fetch(_))));
    }
}
