//! Git operations for ATK Home and remote sources
//!
//! Every subprocess goes through the injected `CommandRunner`, so tests can
//! script git's answers without a repository.

use indexmap::IndexMap;
use std::path::Path;

use crate::error::AtkError;
use crate::plugin::executor::CommandRunner;

pub const DEFAULT_AUTHOR_NAME: &str = "ATK";
pub const DEFAULT_AUTHOR_EMAIL: &str = "atk@localhost";

/// Result of a commit attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { hash: String },
    NothingToCommit,
}

pub struct Git<'a> {
    runner: &'a dyn CommandRunner,
    author_name: String,
    author_email: String,
}

impl<'a> Git<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            author_name: DEFAULT_AUTHOR_NAME.to_string(),
            author_email: DEFAULT_AUTHOR_EMAIL.to_string(),
        }
    }

    pub fn with_author(mut self, name: &str, email: &str) -> Self {
        self.author_name = name.to_string();
        self.author_email = email.to_string();
        self
    }

    /// Whether a git binary is on PATH
    pub fn is_available() -> bool {
        which::which("git").is_ok()
    }

    pub fn is_repo(&self, dir: &Path) -> bool {
        dir.join(".git").exists()
    }

    pub fn init(&self, dir: &Path) -> Result<(), AtkError> {
        self.checked(dir, &["init"])?;
        log::info!("Initialized git repository in {}", dir.display());
        Ok(())
    }

    /// Stage everything (honouring .gitignore) and commit if anything changed
    pub fn commit_all(&self, repo: &Path, message: &str) -> Result<CommitOutcome, AtkError> {
        self.checked(repo, &["add", "-A"])?;

        // diff --cached --quiet exits 1 when something is staged
        let diff = self.run(repo, &["diff", "--cached", "--quiet"])?;
        match diff.code {
            0 => {
                log::debug!("Nothing to commit for '{}'", message);
                return Ok(CommitOutcome::NothingToCommit);
            }
            1 => {}
            code => {
                return Err(AtkError::Git(format!(
                    "git diff --cached failed with exit code {}: {}",
                    code,
                    diff.stderr.trim()
                )));
            }
        }

        let env = self.author_env();
        let output = self.runner.run(repo, &env, "git", &["commit", "-m", message])?;
        if !output.success() {
            return Err(AtkError::Git(format!("git commit failed: {}", output.stderr.trim())));
        }

        let hash = self.head(repo)?;
        log::info!("Committed {}: {}", short(&hash), message);
        Ok(CommitOutcome::Committed { hash })
    }

    /// Blobless clone with sparse checkout enabled (top-level files only)
    pub fn sparse_clone(&self, url: &str, destination: &Path) -> Result<(), AtkError> {
        let parent = destination.parent().unwrap_or_else(|| Path::new("."));
        let dest = destination.to_string_lossy();
        self.checked(parent, &["clone", "--filter=blob:none", "--sparse", url, &dest])?;
        Ok(())
    }

    /// Restrict the working tree to the given non-cone patterns
    pub fn sparse_checkout(&self, repo: &Path, patterns: &[&str]) -> Result<(), AtkError> {
        let mut args = vec!["sparse-checkout", "set", "--no-cone"];
        args.extend_from_slice(patterns);
        self.checked(repo, &args)?;
        Ok(())
    }

    pub fn checkout(&self, repo: &Path, reference: &str) -> Result<(), AtkError> {
        self.checked(repo, &["checkout", "--quiet", reference])?;
        Ok(())
    }

    pub fn head(&self, repo: &Path) -> Result<String, AtkError> {
        let stdout = self.checked(repo, &["rev-parse", "HEAD"])?;
        Ok(stdout.trim().to_string())
    }

    /// Hash of the remote HEAD, without cloning
    pub fn ls_remote(&self, url: &str) -> Result<String, AtkError> {
        let cwd = std::env::temp_dir();
        let stdout = self.checked(&cwd, &["ls-remote", url, "HEAD"])?;
        stdout
            .split_whitespace()
            .next()
            .map(str::to_string)
            .ok_or_else(|| AtkError::Git(format!("git ls-remote returned no HEAD for {}", url)))
    }

    fn author_env(&self) -> IndexMap<String, String> {
        IndexMap::from([
            ("GIT_AUTHOR_NAME".to_string(), self.author_name.clone()),
            ("GIT_AUTHOR_EMAIL".to_string(), self.author_email.clone()),
            ("GIT_COMMITTER_NAME".to_string(), self.author_name.clone()),
            ("GIT_COMMITTER_EMAIL".to_string(), self.author_email.clone()),
        ])
    }

    fn run(&self, dir: &Path, args: &[&str]) -> Result<crate::plugin::executor::CommandOutput, AtkError> {
        self.runner
            .run(dir, &IndexMap::new(), "git", args)
            .map_err(|e| AtkError::Git(format!("failed to run git {}: {}", args.join(" "), e)))
    }

    fn checked(&self, dir: &Path, args: &[&str]) -> Result<String, AtkError> {
        let output = self.run(dir, args)?;
        if !output.success() {
            return Err(AtkError::Git(format!(
                "git {} failed with exit code {}: {}",
                args.first().unwrap_or(&""),
                output.code,
                output.stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

/// Abbreviated commit hash for display
pub fn short(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}
