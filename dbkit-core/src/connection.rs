//! Database connection seam.
//!
//! The provisioning pipeline never talks to a database client directly. It
//! goes through [`Connection`] handles opened by a [`ConnectionManager`], so
//! engine crates (and test doubles) plug in behind the same interface.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ConnectionConfig;
use crate::engine::EngineType;
use crate::error::{DbkitError, DbkitResult};

/// A result row, keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// A bound query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SqlParam {
    /// Text value.
    Text(String),
    /// Integer value.
    Int(i64),
    /// Identifier, for engines with identifier placeholders (`??` on MySQL).
    Ident(String),
}

impl SqlParam {
    /// Text parameter.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Identifier parameter.
    pub fn ident(value: impl Into<String>) -> Self {
        Self::Ident(value.into())
    }
}

impl fmt::Display for SqlParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(value) | Self::Ident(value) => f.write_str(value),
            Self::Int(value) => write!(f, "{}", value),
        }
    }
}

/// Transaction boundary used when running migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    /// All pending migrations in one transaction.
    #[default]
    All,
    /// No transaction.
    None,
    /// One transaction per migration.
    Each,
}

/// A migration applied by [`Connection::run_migrations`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedMigration {
    /// Migration name (class name of the generated record).
    pub name: String,
    /// Creation timestamp in milliseconds.
    pub timestamp: i64,
}

impl AppliedMigration {
    /// Create an applied migration entry.
    pub fn new(name: impl Into<String>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            timestamp,
        }
    }
}

/// Statements reconciling declared entities with the live schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlInMemory {
    /// Forward statements, in execution order.
    pub up_queries: Vec<String>,
    /// Backward statements, in execution order.
    pub down_queries: Vec<String>,
}

impl SqlInMemory {
    /// Whether the schema is up to date.
    pub fn is_empty(&self) -> bool {
        self.up_queries.is_empty()
    }
}

/// A live database connection.
#[async_trait]
pub trait Connection: Send {
    /// Configuration the connection was opened with.
    fn config(&self) -> &ConnectionConfig;

    /// Execute a query and return its rows.
    async fn query(&mut self, sql: &str, params: &[SqlParam]) -> DbkitResult<Vec<Row>>;

    /// Run pending migrations and return the ones applied.
    async fn run_migrations(&mut self, mode: TransactionMode)
    -> DbkitResult<Vec<AppliedMigration>>;

    /// Compute the statements needed to bring the schema up to date.
    async fn schema_diff(&mut self) -> DbkitResult<SqlInMemory>;

    /// Close the connection.
    async fn close(self: Box<Self>) -> DbkitResult<()>;
}

/// Opens connections.
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    /// Open a connection described by `config`.
    async fn connect(&self, config: &ConnectionConfig) -> DbkitResult<Box<dyn Connection>>;
}

/// Connection manager dispatching on the engine type.
#[derive(Default, Clone)]
pub struct ConnectorSet {
    connectors: HashMap<EngineType, Arc<dyn ConnectionManager>>,
}

impl ConnectorSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connector for `engine`, replacing any previous one.
    pub fn with(mut self, engine: EngineType, connector: impl ConnectionManager + 'static) -> Self {
        self.connectors.insert(engine, Arc::new(connector));
        self
    }

    /// Whether a connector is known for `engine`.
    pub fn supports(&self, engine: &EngineType) -> bool {
        self.connectors.contains_key(engine)
    }
}

impl fmt::Debug for ConnectorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorSet")
            .field("engines", &self.connectors.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl ConnectionManager for ConnectorSet {
    async fn connect(&self, config: &ConnectionConfig) -> DbkitResult<Box<dyn Connection>> {
        let connector = self
            .connectors
            .get(&config.engine)
            .ok_or_else(|| DbkitError::UnsupportedDatabaseType(config.engine.to_string()))?;
        connector.connect(config).await
    }
}

/// Read the `count` column of the first row as a number.
///
/// Engines report counts as integers or as numeric text depending on the
/// client; both are accepted.
pub fn count_value(rows: &[Row]) -> DbkitResult<i64> {
    let value = rows
        .first()
        .and_then(|row| row.get("count"))
        .ok_or_else(|| DbkitError::query("count query returned no rows"))?;

    match value {
        Value::Number(number) => number
            .as_i64()
            .ok_or_else(|| DbkitError::query(format!("invalid count {}", number))),
        Value::String(text) => text
            .trim()
            .parse()
            .map_err(|_| DbkitError::query(format!("invalid count '{}'", text))),
        other => Err(DbkitError::query(format!("invalid count {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Vec<Row> {
        let mut row = Row::new();
        row.insert("count".to_string(), value);
        vec![row]
    }

    #[test]
    fn test_count_value_numeric_and_text() {
        assert_eq!(count_value(&row(json!(0))).unwrap(), 0);
        assert_eq!(count_value(&row(json!(1))).unwrap(), 1);
        assert_eq!(count_value(&row(json!("0"))).unwrap(), 0);
        assert_eq!(count_value(&row(json!("2"))).unwrap(), 2);
    }

    #[test]
    fn test_count_value_rejects_garbage() {
        assert!(count_value(&[]).is_err());
        assert!(count_value(&row(json!("zero"))).is_err());
        assert!(count_value(&row(Value::Null)).is_err());
    }

    #[tokio::test]
    async fn test_connector_set_unknown_engine() {
        let set = ConnectorSet::new();
        let config = ConnectionConfig::new("unsupported-engine");
        let err = set.connect(&config).await.err().unwrap();
        assert!(matches!(err, DbkitError::UnsupportedDatabaseType(t) if t == "unsupported-engine"));
    }

    #[test]
    fn test_param_display() {
        assert_eq!(SqlParam::text("a").to_string(), "a");
        assert_eq!(SqlParam::Int(3).to_string(), "3");
    }
}
