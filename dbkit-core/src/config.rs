//! Connection configuration (`ormconfig.toml`).
//!
//! A project declares its connections as `[connections.<name>]` tables:
//!
//! ```toml
//! [connections.default]
//! type = "postgres"
//! host = "localhost"
//! port = 5432
//! username = "postgres"
//! password = "${POSTGRES_PASSWORD}"
//! database = "app"
//! migrations = ["migrations/*.migration"]
//! logging = ["query", "error"]
//!
//! [connections.default.cli]
//! migrations_dir = "migrations"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::connection::SqlParam;
use crate::engine::EngineType;
use crate::error::{DbkitError, DbkitResult};
use crate::query_logger::QueryLogger;

/// Name used when no connection name is given.
pub const DEFAULT_CONNECTION: &str = "default";

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "ormconfig.toml";

/// Default name of the table recording applied migrations.
pub const DEFAULT_MIGRATIONS_TABLE: &str = "migrations";

/// Connection configuration for one named connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Connection name (key of the `[connections.<name>]` table).
    #[serde(default = "default_name")]
    pub name: String,

    /// Engine type.
    #[serde(rename = "type")]
    pub engine: EngineType,

    /// Connection URL; discrete fields below take precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Server host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Server port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// User name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Target database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Entity definition file patterns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<String>,

    /// Migration file patterns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub migrations: Vec<String>,

    /// Subscriber file patterns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subscribers: Vec<String>,

    /// Table recording applied migrations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrations_table_name: Option<String>,

    /// Queries slower than this many milliseconds are logged as warnings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_query_execution_time: Option<u64>,

    /// Options used by the migration generator.
    #[serde(default)]
    pub cli: CliOptions,

    /// Query logging options.
    #[serde(default)]
    pub logging: LoggingOptions,

    /// Query logger attached by the resolver.
    #[serde(skip)]
    pub query_logger: Option<QueryLogger>,
}

fn default_name() -> String {
    DEFAULT_CONNECTION.to_string()
}

impl ConnectionConfig {
    /// Create a configuration for `engine` with every other field unset.
    pub fn new(engine: impl Into<EngineType>) -> Self {
        Self {
            name: default_name(),
            engine: engine.into(),
            url: None,
            host: None,
            port: None,
            username: None,
            password: None,
            database: None,
            entities: Vec::new(),
            migrations: Vec::new(),
            subscribers: Vec::new(),
            migrations_table_name: None,
            max_query_execution_time: None,
            cli: CliOptions::default(),
            logging: LoggingOptions::default(),
            query_logger: None,
        }
    }

    /// Set the connection name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the target database.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the user credentials.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the migrations output directory.
    pub fn migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cli.migrations_dir = Some(dir.into());
        self
    }

    /// Derived copy pointing at another database.
    ///
    /// When the configuration uses a URL, its path is replaced as well so
    /// both forms agree.
    pub fn with_database(&self, database: impl Into<String>) -> Self {
        let database = database.into();
        let mut derived = self.clone();
        if let Some(url) = &self.url {
            if let Ok(mut parsed) = url::Url::parse(url) {
                parsed.set_path(&format!("/{}", database));
                derived.url = Some(parsed.to_string());
            }
        }
        derived.database = Some(database);
        derived
    }

    /// Name of the target database.
    ///
    /// Falls back to the path of `url` when `database` is unset.
    pub fn target_database(&self) -> DbkitResult<String> {
        if let Some(database) = &self.database {
            return Ok(database.clone());
        }

        self.url
            .as_deref()
            .and_then(|url| url::Url::parse(url).ok())
            .map(|url| url.path().trim_start_matches('/').to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| DbkitError::MissingDatabaseName(self.name.clone()))
    }

    /// Log `query` through the attached query logger, if any.
    ///
    /// Warns when `elapsed` exceeds `max_query_execution_time`.
    pub fn log_query(&self, query: &str, params: &[SqlParam], elapsed: Duration) {
        let Some(query_logger) = &self.query_logger else {
            return;
        };

        query_logger.log_query(query, params);
        if let Some(max) = self.max_query_execution_time {
            if elapsed > Duration::from_millis(max) {
                query_logger.log_query_slow(elapsed, query, params);
            }
        }
    }

    /// Log a failed query through the attached query logger, if any.
    pub fn log_query_error(&self, error: &dyn fmt::Display, query: &str, params: &[SqlParam]) {
        if let Some(query_logger) = &self.query_logger {
            query_logger.log_query_error(error, query, params);
        }
    }

    /// Name of the table recording applied migrations.
    pub fn migrations_table(&self) -> &str {
        self.migrations_table_name
            .as_deref()
            .unwrap_or(DEFAULT_MIGRATIONS_TABLE)
    }
}

/// Options for the migration generator (the `cli` sub table).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliOptions {
    /// Directory receiving generated migrations, relative to the project root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrations_dir: Option<PathBuf>,
}

/// Query log categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryLogLevel {
    /// Executed queries.
    Query,
    /// Failed queries.
    Error,
    /// Schema build messages.
    Schema,
    /// Warnings from the connection.
    Warn,
    /// Informational messages from the connection.
    Info,
    /// Generic messages from the connection.
    Log,
    /// Migration messages.
    Migration,
}

/// The `logging` option of a connection.
///
/// Accepts `true`/`false`, `"all"`, or a list of [`QueryLogLevel`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoggingOptions {
    /// Everything on or off.
    Flag(bool),
    /// `"all"`.
    Named(String),
    /// Selected categories.
    Levels(Vec<QueryLogLevel>),
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self::Flag(false)
    }
}

impl LoggingOptions {
    /// Whether `level` is enabled.
    ///
    /// `true` only enables queries and errors.
    pub fn has_level(&self, level: QueryLogLevel) -> bool {
        match self {
            Self::Flag(enabled) => {
                *enabled && matches!(level, QueryLogLevel::Query | QueryLogLevel::Error)
            }
            Self::Named(name) => name == "all",
            Self::Levels(levels) => levels.contains(&level),
        }
    }
}

/// Contents of `ormconfig.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectConfigFile {
    /// Connections keyed by name.
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,
}

impl ProjectConfigFile {
    /// Parse `ormconfig.toml` contents, expanding `${VAR}` references from
    /// the process environment.
    pub fn parse(content: &str) -> DbkitResult<Self> {
        Self::parse_with(content, |name| std::env::var(name).ok())
    }

    /// Parse `ormconfig.toml` contents, expanding `${VAR}` references with
    /// `lookup`.
    ///
    /// Expansion happens inside string values after the document is parsed,
    /// so substituted text never changes the structure of the file.
    pub fn parse_with(
        content: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> DbkitResult<Self> {
        let mut document: toml::Value = toml::from_str(content)?;
        expand_strings(&mut document, &lookup);

        let mut file: Self = document.try_into()?;
        for (name, connection) in file.connections.iter_mut() {
            connection.name = name.clone();
        }
        Ok(file)
    }
}

fn expand_strings(value: &mut toml::Value, lookup: &dyn Fn(&str) -> Option<String>) {
    match value {
        toml::Value::String(text) => {
            if text.contains("${") {
                *text = expand_with(text, lookup);
            }
        }
        toml::Value::Array(items) => {
            for item in items {
                expand_strings(item, lookup);
            }
        }
        toml::Value::Table(table) => {
            for (_, item) in table.iter_mut() {
                expand_strings(item, lookup);
            }
        }
        _ => {}
    }
}

static ENV_VAR: Lazy<regex_lite::Regex> =
    Lazy::new(|| regex_lite::Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

/// Expand `${VAR}` references using `lookup`.
///
/// Unset variables are left verbatim.
pub fn expand_with(content: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    ENV_VAR
        .replace_all(content, |caps: &regex_lite::Captures<'_>| {
            lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
