//! One-time project source loading.

use std::path::Path;

use tracing::debug;

use crate::error::{DbkitError, DbkitResult};

/// Prepares a project before its configuration and connections are used.
///
/// The resolver calls [`SourceLoader::start`] at most once per instance.
pub trait SourceLoader: Send + Sync {
    /// Prepare the project rooted at `root`.
    fn start(&self, root: &Path) -> DbkitResult<()>;
}

/// Loads `<project>/.env` into the process environment.
///
/// Variables already set are not overridden, and a missing file is not an
/// error.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvFileLoader;

impl SourceLoader for EnvFileLoader {
    fn start(&self, root: &Path) -> DbkitResult<()> {
        let path = root.join(".env");
        match dotenvy::from_path(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Loaded environment file");
                Ok(())
            }
            Err(e) if e.not_found() => Ok(()),
            Err(e) => Err(DbkitError::config(format!(
                "Failed to load {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
