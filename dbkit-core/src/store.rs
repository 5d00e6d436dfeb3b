//! Configuration stores.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::config::{CONFIG_FILE, ConnectionConfig, ProjectConfigFile};
use crate::error::{DbkitError, DbkitResult};

/// Source of raw connection configurations.
///
/// Path patterns in returned configurations may be relative.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the configuration named `name`.
    async fn get(&self, name: &str) -> DbkitResult<ConnectionConfig>;
}

/// Reads `ormconfig.toml` from a project directory.
#[derive(Debug, Clone)]
pub struct TomlConfigStore {
    root: PathBuf,
}

impl TomlConfigStore {
    /// Create a store for the project rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the configuration file.
    pub fn path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }
}

#[async_trait]
impl ConfigStore for TomlConfigStore {
    async fn get(&self, name: &str) -> DbkitResult<ConnectionConfig> {
        let path = self.path();
        debug!(path = %path.display(), connection = name, "Loading connection configuration");

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DbkitError::config(format!(
                    "{} not found in {}",
                    CONFIG_FILE,
                    self.root.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let mut file = ProjectConfigFile::parse(&content)?;
        file.connections
            .remove(name)
            .ok_or_else(|| DbkitError::ConnectionNotFound(name.to_string()))
    }
}
