//! Fetching plugin files from their source
//!
//! Every backend writes into a staging directory beside the destination and
//! renames it into place on success, so the destination is either complete
//! or absent.

use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::error::{AtkError, IoContext};
use crate::git::Git;
use crate::source::SourceKind;

pub mod git_source;
pub mod local;
pub mod registry;

/// Prefix of staging directories inside ATK Home (ignored by git)
pub const STAGING_PREFIX: &str = ".atk-staging-";

/// Default registry repository
pub const DEFAULT_REGISTRY_URL: &str = "https://github.com/Svtoo/atk-registry";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchResult {
    /// Commit hash the files came from; None for local sources
    pub reference: Option<String>,
}

pub trait Fetch {
    /// Fetch `kind` into `destination`, optionally pinned to a commit
    fn fetch_at(&self, kind: &SourceKind, reference: Option<&str>, destination: &Path)
    -> Result<FetchResult, AtkError>;

    fn fetch(&self, kind: &SourceKind, destination: &Path) -> Result<FetchResult, AtkError> {
        self.fetch_at(kind, None, destination)
    }

    /// Commit the remote currently points at, if the source has one
    fn remote_head(&self, _kind: &SourceKind) -> Result<Option<String>, AtkError> {
        Ok(None)
    }
}

/// Dispatches to the local, registry and git backends
pub struct Fetcher<'a> {
    git: &'a Git<'a>,
    registry_url: String,
}

impl<'a> Fetcher<'a> {
    pub fn new(git: &'a Git<'a>, registry_url: &str) -> Self {
        Self {
            git,
            registry_url: registry_url.to_string(),
        }
    }
}

impl Fetch for Fetcher<'_> {
    fn fetch_at(
        &self,
        kind: &SourceKind,
        reference: Option<&str>,
        destination: &Path,
    ) -> Result<FetchResult, AtkError> {
        log::debug!("Fetching {} source '{}' into {}", kind.kind(), kind, destination.display());
        match kind {
            SourceKind::Local(path) => local::fetch(path, destination),
            SourceKind::Registry { name } => {
                registry::fetch(self.git, &self.registry_url, name, reference, destination)
            }
            SourceKind::Git { url } => git_source::fetch(self.git, url, reference, destination),
        }
    }

    fn remote_head(&self, kind: &SourceKind) -> Result<Option<String>, AtkError> {
        let url = match kind {
            SourceKind::Local(_) => return Ok(None),
            SourceKind::Registry { .. } => self.registry_url.as_str(),
            SourceKind::Git { url } => url.as_str(),
        };
        self.git.ls_remote(url).map(Some).map_err(into_fetch_error)
    }
}

/// Run `fill` against a fresh staging directory, then move it to `destination`
///
/// `fill` receives the path it must create; the staging root beside it is
/// free for scratch work such as clones.
pub(crate) fn stage<F>(destination: &Path, fill: F) -> Result<FetchResult, AtkError>
where
    F: FnOnce(&Path, &Path) -> Result<FetchResult, AtkError>,
{
    if destination.exists() {
        return Err(AtkError::Fetch(format!("destination {} already exists", destination.display())));
    }

    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).io_context(|| format!("Failed to create {}", parent.display()))?;

    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(parent)
        .io_context(|| format!("Failed to create staging directory in {}", parent.display()))?;

    let out = staging.path().join("out");
    let result = fill(staging.path(), &out)?;

    fs::rename(&out, destination).io_context(|| format!("Failed to move fetched files to {}", destination.display()))?;
    Ok(result)
}

/// Recursively copy `src` into `dst`, skipping .git and anything under `exclude`
pub(crate) fn copy_tree(src: &Path, dst: &Path, exclude: Option<&Path>) -> Result<(), AtkError> {
    fs::create_dir_all(dst).io_context(|| format!("Failed to create {}", dst.display()))?;

    let walker = WalkDir::new(src).min_depth(1).into_iter().filter_entry(|entry| {
        entry.file_name() != ".git" && exclude.is_none_or(|ex| !entry.path().starts_with(ex))
    });

    for entry in walker {
        let entry = entry.map_err(|e| AtkError::Fetch(format!("Failed to walk {}: {}", src.display(), e)))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| AtkError::Fetch(e.to_string()))?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).io_context(|| format!("Failed to create {}", target.display()))?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target).io_context(|| format!("Failed to copy {}", entry.path().display()))?;
        } else {
            log::warn!("Skipping non-regular file {}", entry.path().display());
        }
    }
    Ok(())
}

/// Subprocess failures while fetching surface as fetch errors
pub(crate) fn into_fetch_error(err: AtkError) -> AtkError {
    match err {
        AtkError::Git(msg) => AtkError::Fetch(msg),
        other => other,
    }
}
