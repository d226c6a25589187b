//! Best-effort filesystem discovery for the optional frontend and `.env` file

use std::path::{Path, PathBuf};

/// First candidate directory under `root` that contains `marker`.
///
/// An empty `marker` accepts the first existing directory. Returns `None`
/// when no candidate matches; a missing frontend is not an error.
pub fn discover_frontend(root: &Path, candidates: &[PathBuf], marker: &str) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|c| root.join(c))
        .find(|dir| dir.is_dir() && (marker.is_empty() || dir.join(marker).is_file()))
}

/// First existing env file among `candidates`, resolved against `root`
pub fn discover_env_file(root: &Path, candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().map(|c| root.join(c)).find(|path| path.is_file())
}
