//! Test doubles for the trait seams.
//!
//! Enabled with the `testing` feature. Connections, loaders and stores share
//! a [`ConnectionJournal`] so a test can assert on the exact order of side
//! effects an operation produced.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::config::ConnectionConfig;
use crate::connection::{
    AppliedMigration, Connection, ConnectionManager, Row, SqlInMemory, SqlParam, TransactionMode,
};
use crate::error::{DbkitError, DbkitResult};
use crate::generator::{FileEmitter, MigrationRecord};
use crate::loader::SourceLoader;
use crate::logger::{LogLevel, Logger, SpinnerBackend};
use crate::resolver::{ProjectResolver, ResolverFactory};
use crate::store::ConfigStore;

/// Side effect recorded by the test doubles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The source loader ran.
    LoaderStarted,
    /// A connection was opened to `database`.
    Connect {
        /// Database of the configuration used.
        database: Option<String>,
    },
    /// A query ran.
    Query {
        /// SQL text.
        sql: String,
        /// Bound parameters.
        params: Vec<SqlParam>,
    },
    /// Migrations ran.
    RunMigrations(TransactionMode),
    /// A schema diff was computed.
    SchemaDiff,
    /// A connection was closed.
    Close,
}

/// Shared, ordered record of side effects.
#[derive(Debug, Clone, Default)]
pub struct ConnectionJournal {
    events: Arc<Mutex<Vec<ConnectionEvent>>>,
}

impl ConnectionJournal {
    /// Append an event.
    pub fn record(&self, event: ConnectionEvent) {
        self.events.lock().push(event);
    }

    /// All events, oldest first.
    pub fn events(&self) -> Vec<ConnectionEvent> {
        self.events.lock().clone()
    }

    /// Databases connections were opened to.
    pub fn connected_databases(&self) -> Vec<Option<String>> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ConnectionEvent::Connect { database } => Some(database.clone()),
                _ => None,
            })
            .collect()
    }

    /// Queries that ran, with their parameters.
    pub fn queries(&self) -> Vec<(String, Vec<SqlParam>)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ConnectionEvent::Query { sql, params } => Some((sql.clone(), params.clone())),
                _ => None,
            })
            .collect()
    }

    /// Number of events equal to `event`.
    pub fn count(&self, event: &ConnectionEvent) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }

    /// Number of closed connections.
    pub fn closes(&self) -> usize {
        self.count(&ConnectionEvent::Close)
    }
}

/// Scripted behaviour of mock connections.
#[derive(Debug, Clone, Default)]
pub struct MockScript {
    count: i64,
    count_as_text: bool,
    fail_on: Option<String>,
    fail_connect: bool,
    fail_migrations: bool,
    fail_close: bool,
    migrations: Vec<AppliedMigration>,
    schema: SqlInMemory,
}

impl MockScript {
    /// Value returned by `count(...)` queries.
    pub fn count(mut self, count: i64) -> Self {
        self.count = count;
        self
    }

    /// Report counts as text, like some clients do.
    pub fn count_as_text(mut self) -> Self {
        self.count_as_text = true;
        self
    }

    /// Fail queries whose SQL contains `fragment`.
    pub fn fail_on(mut self, fragment: impl Into<String>) -> Self {
        self.fail_on = Some(fragment.into());
        self
    }

    /// Refuse to connect.
    pub fn fail_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Fail migration runs.
    pub fn fail_migrations(mut self) -> Self {
        self.fail_migrations = true;
        self
    }

    /// Fail when closing.
    pub fn fail_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Migrations reported as applied.
    pub fn migrations(mut self, migrations: Vec<AppliedMigration>) -> Self {
        self.migrations = migrations;
        self
    }

    /// Schema diff returned by the connection.
    pub fn schema_diff(mut self, diff: SqlInMemory) -> Self {
        self.schema = diff;
        self
    }

    fn count_rows(&self) -> Vec<Row> {
        let value = if self.count_as_text {
            Value::String(self.count.to_string())
        } else {
            Value::from(self.count)
        };
        let mut row = Row::new();
        row.insert("count".to_string(), value);
        vec![row]
    }
}

/// Connection answering from a [`MockScript`].
#[derive(Debug)]
pub struct MockConnection {
    config: ConnectionConfig,
    script: MockScript,
    journal: ConnectionJournal,
}

impl MockConnection {
    /// Create a connection; nothing is recorded until it is used.
    pub fn new(config: ConnectionConfig, script: MockScript, journal: ConnectionJournal) -> Self {
        Self {
            config,
            script,
            journal,
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    async fn query(&mut self, sql: &str, params: &[SqlParam]) -> DbkitResult<Vec<Row>> {
        self.journal.record(ConnectionEvent::Query {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        self.config.log_query(sql, params, Duration::ZERO);

        if let Some(fragment) = &self.script.fail_on {
            if sql.contains(fragment.as_str()) {
                let err = DbkitError::query(format!("scripted failure for '{}'", fragment));
                self.config.log_query_error(&err, sql, params);
                return Err(err);
            }
        }

        if sql.contains("count(") {
            Ok(self.script.count_rows())
        } else {
            Ok(Vec::new())
        }
    }

    async fn run_migrations(
        &mut self,
        mode: TransactionMode,
    ) -> DbkitResult<Vec<AppliedMigration>> {
        self.journal.record(ConnectionEvent::RunMigrations(mode));
        if self.script.fail_migrations {
            return Err(DbkitError::query("scripted migration failure"));
        }
        Ok(self.script.migrations.clone())
    }

    async fn schema_diff(&mut self) -> DbkitResult<SqlInMemory> {
        self.journal.record(ConnectionEvent::SchemaDiff);
        Ok(self.script.schema.clone())
    }

    async fn close(self: Box<Self>) -> DbkitResult<()> {
        self.journal.record(ConnectionEvent::Close);
        if self.script.fail_close {
            return Err(DbkitError::connection("scripted close failure"));
        }
        Ok(())
    }
}

/// Connection manager handing out [`MockConnection`]s.
#[derive(Debug, Clone, Default)]
pub struct MockConnectionManager {
    journal: ConnectionJournal,
    script: MockScript,
}

impl MockConnectionManager {
    /// Create a manager recording into `journal`.
    pub fn new(journal: ConnectionJournal) -> Self {
        Self {
            journal,
            script: MockScript::default(),
        }
    }

    /// Script used by every connection.
    pub fn with_script(mut self, script: MockScript) -> Self {
        self.script = script;
        self
    }

    /// Journal shared with the connections.
    pub fn journal(&self) -> &ConnectionJournal {
        &self.journal
    }
}

#[async_trait]
impl ConnectionManager for MockConnectionManager {
    async fn connect(&self, config: &ConnectionConfig) -> DbkitResult<Box<dyn Connection>> {
        if self.script.fail_connect {
            return Err(DbkitError::connection("connection refused"));
        }

        self.journal.record(ConnectionEvent::Connect {
            database: config.database.clone(),
        });
        Ok(Box::new(MockConnection::new(
            config.clone(),
            self.script.clone(),
            self.journal.clone(),
        )))
    }
}

/// Configuration store backed by a map.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    configs: Mutex<HashMap<String, ConnectionConfig>>,
}

impl MemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `config` under its name.
    pub fn with(self, config: ConnectionConfig) -> Self {
        self.insert(config);
        self
    }

    /// Add `config` under its name.
    pub fn insert(&self, config: ConnectionConfig) {
        self.configs.lock().insert(config.name.clone(), config);
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get(&self, name: &str) -> DbkitResult<ConnectionConfig> {
        self.configs
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| DbkitError::ConnectionNotFound(name.to_string()))
    }
}

/// Loader counting its starts.
#[derive(Debug, Clone, Default)]
pub struct CountingLoader {
    starts: Arc<AtomicUsize>,
    journal: ConnectionJournal,
}

impl CountingLoader {
    /// Create a loader recording into `journal`.
    pub fn new(journal: ConnectionJournal) -> Self {
        Self {
            starts: Arc::default(),
            journal,
        }
    }

    /// Number of starts.
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

impl SourceLoader for CountingLoader {
    fn start(&self, _root: &Path) -> DbkitResult<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.journal.record(ConnectionEvent::LoaderStarted);
        Ok(())
    }
}

/// Spinner backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpinnerEvent {
    /// Spinner started.
    Start(String),
    /// Spinner stopped silently.
    Stop,
    /// Line persisted.
    Persist(LogLevel, String),
}

/// Spinner backend recording every call.
#[derive(Debug, Clone, Default)]
pub struct RecordingSpinner {
    events: Arc<Mutex<Vec<SpinnerEvent>>>,
}

impl RecordingSpinner {
    /// All calls, oldest first.
    pub fn events(&self) -> Vec<SpinnerEvent> {
        self.events.lock().clone()
    }

    /// Persisted lines.
    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SpinnerEvent::Persist(level, line) => Some((*level, line.clone())),
                _ => None,
            })
            .collect()
    }

    /// Whether a persisted line at `level` contains `text`.
    pub fn has_line(&self, level: LogLevel, text: &str) -> bool {
        self.lines()
            .iter()
            .any(|(l, line)| *l == level && line.contains(text))
    }
}

impl SpinnerBackend for RecordingSpinner {
    fn start(&mut self, text: &str) {
        self.events.lock().push(SpinnerEvent::Start(text.to_string()));
    }

    fn stop(&mut self) {
        self.events.lock().push(SpinnerEvent::Stop);
    }

    fn persist(&mut self, level: LogLevel, line: &str) {
        self.events
            .lock()
            .push(SpinnerEvent::Persist(level, line.to_string()));
    }
}

/// A file the [`RecordingEmitter`] was asked to write.
#[derive(Debug, Clone)]
pub struct EmittedFile {
    /// Target directory.
    pub directory: PathBuf,
    /// Template name.
    pub template: String,
    /// Emitted record.
    pub record: MigrationRecord,
}

/// Emitter that records instead of writing.
#[derive(Debug, Clone, Default)]
pub struct RecordingEmitter {
    emitted: Arc<Mutex<Vec<EmittedFile>>>,
}

impl RecordingEmitter {
    /// Recorded files.
    pub fn emitted(&self) -> Vec<EmittedFile> {
        self.emitted.lock().clone()
    }
}

#[async_trait]
impl FileEmitter for RecordingEmitter {
    async fn emit(
        &self,
        directory: &Path,
        template: &str,
        record: &MigrationRecord,
    ) -> DbkitResult<PathBuf> {
        self.emitted.lock().push(EmittedFile {
            directory: directory.to_path_buf(),
            template: template.to_string(),
            record: record.clone(),
        });
        Ok(directory.join(record.file_name()))
    }
}

/// Resolver factory wiring the in-memory doubles together.
#[derive(Clone)]
pub struct MemoryResolverFactory {
    store: Arc<MemoryConfigStore>,
    connections: Arc<MockConnectionManager>,
    loader: Arc<CountingLoader>,
}

impl MemoryResolverFactory {
    /// Create a factory; the loader records into the manager's journal.
    pub fn new(store: MemoryConfigStore, connections: MockConnectionManager) -> Self {
        let loader = CountingLoader::new(connections.journal().clone());
        Self {
            store: Arc::new(store),
            connections: Arc::new(connections),
            loader: Arc::new(loader),
        }
    }

    /// Loader shared by every resolver.
    pub fn loader(&self) -> &CountingLoader {
        &self.loader
    }
}

impl ResolverFactory for MemoryResolverFactory {
    fn resolver(&self, root: &Path, logger: &Logger) -> ProjectResolver {
        ProjectResolver::new(root, self.connections.clone())
            .with_store(self.store.clone())
            .with_loader(self.loader.clone())
            .with_logger(logger.clone())
    }
}
