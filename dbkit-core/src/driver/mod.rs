//! Driver registry and the administrative drivers.
//!
//! A driver wraps a connection to the engine's administrative database (one
//! that exists on every fresh server) and knows how to probe for and create
//! the target database. The registry maps engine types to driver
//! descriptors and runs the provisioning pipeline in [`DriverRegistry::connect`].

pub mod mysql;
pub mod postgres;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::engine::EngineType;
use crate::error::{DbkitError, DbkitResult};
use crate::resolver::{ConnectionTarget, ProjectResolver};

pub use mysql::MysqlDriver;
pub use postgres::PostgresDriver;

/// Engine-specific provisioning capabilities.
#[async_trait]
pub trait Driver: Send {
    /// Engine handled by the driver.
    fn engine(&self) -> &EngineType;

    /// Administrative configuration the driver is connected with.
    fn options(&self) -> &ConnectionConfig;

    /// Whether a database named `name` exists.
    async fn database_exists(&mut self, name: &str) -> DbkitResult<bool>;

    /// Create the database `name`.
    async fn create_database(&mut self, name: &str) -> DbkitResult<()>;

    /// Release the administrative connection.
    async fn close(self: Box<Self>) -> DbkitResult<()>;
}

/// Builds a driver around an administrative connection.
pub type DriverConstructor = fn(Box<dyn Connection>) -> Box<dyn Driver>;

/// Registry entry for one engine type.
#[derive(Clone)]
pub struct DriverDescriptor {
    /// Engine type.
    pub engine: EngineType,
    /// Database guaranteed to exist on a fresh server.
    pub admin_database: &'static str,
    /// Driver constructor.
    pub constructor: DriverConstructor,
}

impl fmt::Debug for DriverDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverDescriptor")
            .field("engine", &self.engine)
            .field("admin_database", &self.admin_database)
            .finish_non_exhaustive()
    }
}

/// Engine type to driver descriptor mapping.
#[derive(Debug, Default)]
pub struct DriverRegistry {
    drivers: HashMap<EngineType, DriverDescriptor>,
}

static GLOBAL: OnceCell<Arc<DriverRegistry>> = OnceCell::new();

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in drivers.
    pub fn with_defaults() -> DbkitResult<Self> {
        let mut registry = Self::new();
        postgres::register(&mut registry)?;
        mysql::register(&mut registry)?;
        Ok(registry)
    }

    /// Process-wide registry of the built-in drivers, built on first use.
    pub fn global() -> DbkitResult<Arc<DriverRegistry>> {
        GLOBAL
            .get_or_try_init(|| Self::with_defaults().map(Arc::new))
            .map(Arc::clone)
    }

    /// Register a driver.
    ///
    /// Fails with [`DbkitError::DriverAlreadyRegistered`] when the engine
    /// already has one.
    pub fn register(&mut self, descriptor: DriverDescriptor) -> DbkitResult<&DriverDescriptor> {
        use std::collections::hash_map::Entry;

        match self.drivers.entry(descriptor.engine.clone()) {
            Entry::Occupied(entry) => Err(DbkitError::DriverAlreadyRegistered(
                entry.key().to_string(),
            )),
            Entry::Vacant(entry) => {
                debug!(engine = %descriptor.engine, "Registered driver");
                Ok(entry.insert(descriptor))
            }
        }
    }

    /// Whether a driver is registered for `engine`.
    pub fn is_supported(&self, engine: &EngineType) -> bool {
        self.drivers.contains_key(engine)
    }

    /// Registered engine types.
    pub fn engines(&self) -> impl Iterator<Item = &EngineType> {
        self.drivers.keys()
    }

    /// Descriptor registered for `engine`.
    pub fn descriptor(&self, engine: &EngineType) -> DbkitResult<&DriverDescriptor> {
        self.drivers
            .get(engine)
            .ok_or_else(|| DbkitError::UnsupportedDatabaseType(engine.to_string()))
    }

    /// Copy of `config` pointing at the engine's administrative database.
    pub fn admin_options(&self, config: &ConnectionConfig) -> DbkitResult<ConnectionConfig> {
        let descriptor = self.descriptor(&config.engine)?;
        Ok(config.with_database(descriptor.admin_database))
    }

    /// Wrap an administrative connection in the driver for its engine.
    pub fn build_driver(&self, connection: Box<dyn Connection>) -> DbkitResult<Box<dyn Driver>> {
        let descriptor = self.descriptor(&connection.config().engine)?;
        Ok((descriptor.constructor)(connection))
    }

    /// Connect a driver to the administrative database of `target`.
    ///
    /// Fails without opening any connection when the engine has no driver.
    pub async fn connect(
        &self,
        resolver: &ProjectResolver,
        target: impl Into<ConnectionTarget>,
    ) -> DbkitResult<Box<dyn Driver>> {
        let config = match target.into() {
            ConnectionTarget::Named(name) => resolver.get_options(name.as_deref()).await?,
            ConnectionTarget::Config(config) => config,
        };

        let admin = self.admin_options(&config)?;
        debug!(
            engine = %admin.engine,
            database = admin.database.as_deref().unwrap_or(""),
            "Connecting to administrative database"
        );

        let connection = resolver.create_connection(admin).await?;
        self.build_driver(connection)
    }
}
