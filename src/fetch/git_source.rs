//! Git repository sources
//!
//! A repository provides a plugin through an `.atk/` directory at its root.
//! Only that directory is checked out; its contents become the plugin.

use std::path::Path;

use super::{FetchResult, copy_tree, into_fetch_error, stage};
use crate::error::AtkError;
use crate::git::Git;
use crate::plugin::loader::definition_path;
use crate::source::normalize_git_url;

pub const ATK_DIR: &str = ".atk";

pub fn fetch(git: &Git, url: &str, reference: Option<&str>, destination: &Path) -> Result<FetchResult, AtkError> {
    let url = normalize_git_url(url);

    stage(destination, |staging, out| {
        let clone = staging.join("repo");
        git.sparse_clone(&url, &clone).map_err(into_fetch_error)?;

        if let Some(reference) = reference {
            git.checkout(&clone, reference).map_err(into_fetch_error)?;
        }

        git.sparse_checkout(&clone, &[&format!("/{}/", ATK_DIR)])
            .map_err(into_fetch_error)?;

        let atk_dir = clone.join(ATK_DIR);
        if !atk_dir.is_dir() {
            return Err(AtkError::NoDefinitionFound(format!(
                "repository {} does not contain an '{}/' directory",
                url, ATK_DIR
            )));
        }
        if definition_path(&atk_dir).is_none() {
            return Err(AtkError::NoDefinitionFound(format!(
                "'{}/' in {} does not contain plugin.yaml",
                ATK_DIR, url
            )));
        }

        let head = git.head(&clone).map_err(into_fetch_error)?;
        copy_tree(&atk_dir, out, None)?;

        log::info!("Fetched {} at {}", url, head);
        Ok(FetchResult { reference: Some(head) })
    })
}
