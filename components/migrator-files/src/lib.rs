extern crate serde;

#[macro_use]
extern crate serde_derive;

mod network_manifest;
mod project_manifest;

pub use network_manifest::{
    NetworkId, NetworkProfile, NetworkProfileFile, DEFAULT_CONFIRMATION_POLL_INTERVAL_MS,
    DEFAULT_GAS_LIMIT,
};
pub use project_manifest::{
    CompilerConfig, ProjectConfig, ProjectManifest, ProjectManifestFile, MANIFEST_FILE_NAME,
};

use std::path::{Path, PathBuf};

/// Walks up from `start` until a `Migrator.toml` is found.
pub fn find_manifest_path(start: &Path) -> Option<PathBuf> {
    let mut current_dir = start.to_path_buf();
    loop {
        current_dir.push(MANIFEST_FILE_NAME);
        if current_dir.exists() {
            return Some(current_dir);
        }
        current_dir.pop();
        if !current_dir.pop() {
            return None;
        }
    }
}
