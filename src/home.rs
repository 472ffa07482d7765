//! ATK Home: the git-backed directory holding the manifest and plugins

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AtkError, IoContext};
use crate::git::{CommitOutcome, Git};
use crate::gitignore::{self, GITIGNORE_FILE};
use crate::manifest::{FileManifestStore, MANIFEST_FILE, Manifest, ManifestStore};

pub const PLUGINS_DIR: &str = "plugins";
pub const ATK_HOME_ENV: &str = "ATK_HOME";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Created,
    AlreadyInitialized,
}

#[derive(Debug, Clone)]
pub struct AtkHome {
    root: PathBuf,
}

impl AtkHome {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// ATK_HOME if set, otherwise ~/.atk
    pub fn default_root() -> PathBuf {
        match std::env::var(ATK_HOME_ENV) {
            Ok(value) if !value.is_empty() => PathBuf::from(shellexpand::tilde(&value).as_ref()),
            _ => dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".atk"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.root.join(PLUGINS_DIR)
    }

    pub fn plugin_dir(&self, directory: &str) -> PathBuf {
        self.plugins_dir().join(directory)
    }

    pub fn manifest_store(&self) -> FileManifestStore {
        FileManifestStore::new(&self.root)
    }

    /// Problems that keep this directory from being a usable ATK Home
    pub fn problems(&self) -> Vec<String> {
        if !self.root.exists() {
            return vec![format!("path does not exist: {}", self.root.display())];
        }
        if !self.root.is_dir() {
            return vec![format!("path is not a directory: {}", self.root.display())];
        }

        let mut problems = Vec::new();
        if !self.root.join(MANIFEST_FILE).is_file() {
            problems.push(format!("missing {}", MANIFEST_FILE));
        }
        if !self.plugins_dir().is_dir() {
            problems.push(format!("missing {}/ directory", PLUGINS_DIR));
        }
        if !self.root.join(".git").is_dir() {
            problems.push("missing .git directory (not a git repository)".to_string());
        }
        problems
    }

    pub fn is_initialized(&self) -> bool {
        self.problems().is_empty()
    }

    pub fn require_initialized(&self) -> Result<(), AtkError> {
        let problems = self.problems();
        if problems.is_empty() {
            return Ok(());
        }
        Err(AtkError::HomeNotInitialized {
            path: self.root.clone(),
            problems,
        })
    }

    /// Create the layout, git repository and initial commit
    ///
    /// Idempotent on an existing home; refuses a non-empty directory that is
    /// not one.
    pub fn init(&self, git: &Git) -> Result<InitOutcome, AtkError> {
        if self.root.exists() {
            if self.is_initialized() {
                return Ok(InitOutcome::AlreadyInitialized);
            }
            if self.root.is_file() {
                return Err(AtkError::HomeNotInitialized {
                    path: self.root.clone(),
                    problems: vec!["path exists but is a file".to_string()],
                });
            }
            let non_empty = fs::read_dir(&self.root)
                .io_context(|| format!("Failed to read {}", self.root.display()))?
                .next()
                .is_some();
            if non_empty {
                let mut problems = vec!["directory exists but is not an ATK Home".to_string()];
                problems.extend(self.problems());
                return Err(AtkError::HomeNotInitialized {
                    path: self.root.clone(),
                    problems,
                });
            }
        }

        let plugins = self.plugins_dir();
        fs::create_dir_all(&plugins).io_context(|| format!("Failed to create {}", plugins.display()))?;

        self.manifest_store().save(&Manifest::default())?;

        let gitignore_path = self.root.join(GITIGNORE_FILE);
        fs::write(&gitignore_path, gitignore::default_content())
            .io_context(|| format!("Failed to write {}", gitignore_path.display()))?;

        git.init(&self.root)?;
        if let CommitOutcome::Committed { hash } = git.commit_all(&self.root, "Initialize ATK Home")? {
            log::info!("Initialized ATK Home at {} ({})", self.root.display(), hash);
        }
        Ok(InitOutcome::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::executor::SystemRunner;
    use tempfile::tempdir;

    #[test]
    fn test_problems_for_missing_path() {
        let temp = tempdir().unwrap();
        let home = AtkHome::new(temp.path().join("nope"));
        assert_eq!(home.problems().len(), 1);
        assert!(matches!(
            home.require_initialized(),
            Err(AtkError::HomeNotInitialized { .. })
        ));
    }

    #[test]
    fn test_problems_list_each_missing_part() {
        let temp = tempdir().unwrap();
        let home = AtkHome::new(temp.path());
        let problems = home.problems();
        assert_eq!(problems.len(), 3);
        assert!(problems.iter().any(|p| p.contains("manifest.yaml")));
        assert!(problems.iter().any(|p| p.contains("plugins/")));
        assert!(problems.iter().any(|p| p.contains(".git")));
    }

    #[test]
    fn test_init_creates_layout_and_is_idempotent() {
        if !Git::is_available() {
            return;
        }
        let temp = tempdir().unwrap();
        let home = AtkHome::new(temp.path().join("home"));
        let git = Git::new(&SystemRunner);

        assert_eq!(home.init(&git).unwrap(), InitOutcome::Created);
        assert!(home.is_initialized());
        let manifest = home.manifest_store().load().unwrap();
        assert!(manifest.plugins.is_empty());
        assert!(manifest.config.auto_commit);

        assert_eq!(home.init(&git).unwrap(), InitOutcome::AlreadyInitialized);
    }

    #[test]
    fn test_init_refuses_foreign_directory() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("notes.txt"), "mine").unwrap();
        let home = AtkHome::new(temp.path());
        let git = Git::new(&SystemRunner);
        assert!(matches!(home.init(&git), Err(AtkError::HomeNotInitialized { .. })));
        assert!(!temp.path().join(MANIFEST_FILE).exists());
    }

    #[test]
    fn test_plugin_dir_paths() {
        let home = AtkHome::new("/tmp/atk");
        assert_eq!(home.plugin_dir("piper"), PathBuf::from("/tmp/atk/plugins/piper"));
    }
}
