//! Project configuration resolver.
//!
//! A [`ProjectResolver`] is scoped to one project directory. It turns a
//! connection name into a ready-to-use [`ConnectionConfig`] and opens
//! connections on behalf of the operations.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::config::{ConnectionConfig, DEFAULT_CONNECTION};
use crate::connection::{Connection, ConnectionManager};
use crate::error::DbkitResult;
use crate::loader::{EnvFileLoader, SourceLoader};
use crate::logger::Logger;
use crate::query_logger::QueryLogger;
use crate::store::{ConfigStore, TomlConfigStore};

/// What to connect to: a connection name or a resolved configuration.
#[derive(Debug, Clone)]
pub enum ConnectionTarget {
    /// Connection name; `None` means `"default"`.
    Named(Option<String>),
    /// Fully resolved configuration.
    Config(ConnectionConfig),
}

impl From<&str> for ConnectionTarget {
    fn from(name: &str) -> Self {
        Self::Named(Some(name.to_string()))
    }
}

impl From<Option<&str>> for ConnectionTarget {
    fn from(name: Option<&str>) -> Self {
        Self::Named(name.map(str::to_string))
    }
}

impl From<ConnectionConfig> for ConnectionTarget {
    fn from(config: ConnectionConfig) -> Self {
        Self::Config(config)
    }
}

/// Resolves configurations and opens connections for one project.
pub struct ProjectResolver {
    root: PathBuf,
    store: Arc<dyn ConfigStore>,
    connections: Arc<dyn ConnectionManager>,
    loader: Arc<dyn SourceLoader>,
    loader_started: OnceCell<()>,
    logger: Logger,
}

impl ProjectResolver {
    /// Create a resolver reading `ormconfig.toml` under `root`.
    pub fn new(root: impl Into<PathBuf>, connections: Arc<dyn ConnectionManager>) -> Self {
        let root = root.into();
        Self {
            store: Arc::new(TomlConfigStore::new(root.clone())),
            root,
            connections,
            loader: Arc::new(EnvFileLoader),
            loader_started: OnceCell::new(),
            logger: Logger::silent(),
        }
    }

    /// Use another configuration store.
    pub fn with_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.store = store;
        self
    }

    /// Use another source loader.
    pub fn with_loader(mut self, loader: Arc<dyn SourceLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Use `logger` for query logging.
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Project directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Logger handed to query loggers.
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Load the configuration named `name` (default `"default"`).
    ///
    /// Relative path patterns are rooted at the absolute project directory
    /// and a [`QueryLogger`] is attached.
    pub async fn get_options(&self, name: Option<&str>) -> DbkitResult<ConnectionConfig> {
        self.ensure_loader()?;

        let name = name.unwrap_or(DEFAULT_CONNECTION);
        let raw = self.store.get(name).await?;
        Ok(self.prepare(raw))
    }

    /// Open a connection.
    ///
    /// The source loader is started before the connection manager is asked
    /// to connect.
    pub async fn create_connection(
        &self,
        target: impl Into<ConnectionTarget>,
    ) -> DbkitResult<Box<dyn Connection>> {
        let config = match target.into() {
            ConnectionTarget::Named(name) => self.get_options(name.as_deref()).await?,
            ConnectionTarget::Config(config) => config,
        };

        self.ensure_loader()?;

        debug!(
            connection = %config.name,
            engine = %config.engine,
            database = config.database.as_deref().unwrap_or(""),
            "Opening connection"
        );
        self.connections.connect(&config).await
    }

    fn ensure_loader(&self) -> DbkitResult<()> {
        self.loader_started
            .get_or_try_init(|| {
                debug!(root = %self.root.display(), "Starting project source loader");
                self.loader.start(&self.root)
            })
            .map(|_| ())
    }

    fn prepare(&self, raw: ConnectionConfig) -> ConnectionConfig {
        let root = std::path::absolute(&self.root).unwrap_or_else(|_| self.root.clone());

        let mut config = raw;
        config.entities = rebase_patterns(&root, &config.entities);
        config.migrations = rebase_patterns(&root, &config.migrations);
        config.subscribers = rebase_patterns(&root, &config.subscribers);
        config.query_logger = Some(QueryLogger::new(
            config.logging.clone(),
            self.logger.clone(),
        ));
        config
    }
}

impl fmt::Debug for ProjectResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectResolver")
            .field("root", &self.root)
            .field("loader_started", &self.loader_started.get().is_some())
            .finish()
    }
}

/// Root relative patterns at `root`; absolute patterns are kept.
pub fn rebase_patterns(root: &Path, patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .map(|pattern| {
            let path = Path::new(pattern);
            if path.is_absolute() {
                return pattern.clone();
            }

            root.join(path)
                .components()
                .filter(|c| !matches!(c, Component::CurDir))
                .collect::<PathBuf>()
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

/// Builds the resolver of a project.
pub trait ResolverFactory: Send + Sync {
    /// Create a resolver for the project rooted at `root`.
    fn resolver(&self, root: &Path, logger: &Logger) -> ProjectResolver;
}

/// Resolvers reading `ormconfig.toml` and `.env` from the project directory.
#[derive(Clone)]
pub struct ProjectResolverFactory {
    connections: Arc<dyn ConnectionManager>,
}

impl ProjectResolverFactory {
    /// Create a factory opening connections through `connections`.
    pub fn new(connections: Arc<dyn ConnectionManager>) -> Self {
        Self { connections }
    }
}

impl ResolverFactory for ProjectResolverFactory {
    fn resolver(&self, root: &Path, logger: &Logger) -> ProjectResolver {
        ProjectResolver::new(root, self.connections.clone()).with_logger(logger.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        ConnectionEvent, ConnectionJournal, CountingLoader, MemoryConfigStore,
        MockConnectionManager,
    };
    use pretty_assertions::assert_eq;

    fn resolver(root: &str) -> (ProjectResolver, ConnectionJournal, CountingLoader) {
        let journal = ConnectionJournal::default();
        let loader = CountingLoader::new(journal.clone());
        let manager = MockConnectionManager::new(journal.clone());

        let mut config = ConnectionConfig::new("postgres").database("test");
        config.entities = vec!["./src/entities/*.sql".to_string()];
        config.migrations = vec!["/abs/migrations/*.migration".to_string()];
        config.subscribers = vec!["subscribers/*.sql".to_string()];

        let store = MemoryConfigStore::new().with(config);
        let resolver = ProjectResolver::new(root, Arc::new(manager))
            .with_store(Arc::new(store))
            .with_loader(Arc::new(loader.clone()));
        (resolver, journal, loader)
    }

    #[tokio::test]
    async fn test_get_options_rewrites_relative_patterns() {
        let (resolver, _, _) = resolver("/work/apps/api");
        let config = resolver.get_options(None).await.unwrap();

        assert_eq!(
            config.entities,
            vec!["/work/apps/api/src/entities/*.sql".to_string()]
        );
        assert_eq!(
            config.migrations,
            vec!["/abs/migrations/*.migration".to_string()]
        );
        assert_eq!(
            config.subscribers,
            vec!["/work/apps/api/subscribers/*.sql".to_string()]
        );
        assert!(config.query_logger.is_some());
    }

    #[tokio::test]
    async fn test_get_options_unknown_name() {
        let (resolver, _, _) = resolver("/work/apps/api");
        assert!(resolver.get_options(Some("missing")).await.is_err());
    }

    #[tokio::test]
    async fn test_loader_started_once_before_connect() {
        let (resolver, journal, loader) = resolver("/work/apps/api");

        let first = resolver.create_connection(None).await.unwrap();
        first.close().await.unwrap();
        let config = resolver.get_options(Some("default")).await.unwrap();
        let second = resolver.create_connection(config).await.unwrap();
        second.close().await.unwrap();

        assert_eq!(loader.starts(), 1);
        let events = journal.events();
        assert_eq!(events[0], ConnectionEvent::LoaderStarted);
        assert!(matches!(events[1], ConnectionEvent::Connect { .. }));
    }

    #[test]
    fn test_rebase_patterns_drops_current_dir() {
        let rebased = rebase_patterns(
            Path::new("/repo/app"),
            &["./a/./b/*.sql".to_string(), "/etc/x.sql".to_string()],
        );
        assert_eq!(rebased, vec!["/repo/app/a/b/*.sql", "/etc/x.sql"]);
    }
}
