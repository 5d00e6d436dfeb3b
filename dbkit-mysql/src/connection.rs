//! MySQL connection.

use std::collections::HashSet;
use std::time::Instant;

use async_trait::async_trait;
use dbkit_core::schema::{load_entities, missing_tables};
use dbkit_core::{
    AppliedMigration, Connection, ConnectionConfig, ConnectionManager, DbkitResult,
    QueryLogLevel, Row, SqlInMemory, SqlParam, TransactionMode, migration_file,
};
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Params, TxOpts};
use serde_json::Value;
use tracing::debug;

use crate::config::MysqlConfig;
use crate::error::{MysqlError, MysqlResult};
use crate::migrations;
use crate::params::{escape_identifier, expand_placeholders};
use crate::row::row_to_json;

/// Tables of the connected database.
pub const EXISTING_TABLES_QUERY: &str = "SELECT TABLE_NAME AS table_name FROM information_schema.TABLES WHERE TABLE_SCHEMA = DATABASE()";

/// A MySQL connection.
pub struct MysqlConnection {
    config: ConnectionConfig,
    conn: Conn,
}

impl MysqlConnection {
    /// Open a connection described by `config`.
    pub async fn connect(config: &ConnectionConfig) -> MysqlResult<Self> {
        let mysql_config = MysqlConfig::from_connection(config)?;
        debug!(
            host = %mysql_config.host,
            port = mysql_config.port,
            database = %mysql_config.database,
            "Connecting to MySQL"
        );

        let conn = tokio::time::timeout(
            mysql_config.connect_timeout,
            Conn::new(mysql_config.to_opts_builder()),
        )
        .await
        .map_err(|_| {
            MysqlError::timeout(format!(
                "connecting to {}:{} timed out",
                mysql_config.host, mysql_config.port
            ))
        })?
        .map_err(|e| MysqlError::connection(e.to_string()))?;

        Ok(Self {
            config: config.clone(),
            conn,
        })
    }

    async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> MysqlResult<Vec<Row>> {
        let expanded = expand_placeholders(sql, params)?;
        debug!(sql = %expanded.sql, "Executing query");

        let rows: Vec<mysql_async::Row> = if expanded.values.is_empty() {
            self.conn.query(expanded.sql).await?
        } else {
            self.conn
                .exec(expanded.sql, Params::Positional(expanded.values))
                .await?
        };
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn migrate(&mut self, mode: TransactionMode) -> MysqlResult<Vec<AppliedMigration>> {
        let Self { config, conn } = self;

        migrations::ensure_table(&mut *conn, config).await?;
        let applied = migrations::applied(&mut *conn, config).await?;
        let loaded = migration_file::load_all(&config.migrations).await?;
        let total = loaded.len();
        let pending = migration_file::pending(loaded, &applied);

        if let Some(query_logger) = &config.query_logger {
            query_logger.log_schema_build(&format!(
                "{} migrations are already loaded in the database.",
                applied.len()
            ));
            query_logger.log_schema_build(&format!(
                "{} migrations were found in the source code.",
                total
            ));
            if let Some(notice) = implicit_commit_notice(mode, pending.len()) {
                query_logger.log(QueryLogLevel::Warn, notice);
            }
        }

        let mut executed = Vec::with_capacity(pending.len());
        match mode {
            TransactionMode::All if !pending.is_empty() => {
                let mut transaction = conn.start_transaction(TxOpts::default()).await?;
                for migration in &pending {
                    executed.push(migrations::apply(&mut transaction, config, migration).await?);
                }
                transaction.commit().await?;
            }
            TransactionMode::Each => {
                for migration in &pending {
                    let mut transaction = conn.start_transaction(TxOpts::default()).await?;
                    executed.push(migrations::apply(&mut transaction, config, migration).await?);
                    transaction.commit().await?;
                }
            }
            _ => {
                for migration in &pending {
                    executed.push(migrations::apply(&mut *conn, config, migration).await?);
                }
            }
        }
        Ok(executed)
    }

    async fn diff(&mut self) -> MysqlResult<SqlInMemory> {
        let entities = load_entities(&self.config.entities).await?;
        let rows = self.execute(EXISTING_TABLES_QUERY, &[]).await?;
        let existing: HashSet<String> = rows
            .iter()
            .filter_map(|row| row.get("table_name").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        if let Some(query_logger) = &self.config.query_logger {
            query_logger.log_schema_build(&format!(
                "{} entity tables, {} existing tables",
                entities.len(),
                rows.len()
            ));
        }
        Ok(missing_tables(&entities, &existing, escape_identifier))
    }
}

/// Warning for transactional runs: DDL commits implicitly, so only data
/// statements and bookkeeping are rolled back on failure.
pub fn implicit_commit_notice(mode: TransactionMode, pending: usize) -> Option<&'static str> {
    match mode {
        TransactionMode::None => None,
        _ if pending == 0 => None,
        _ => Some("DDL statements commit implicitly; a failed migration may be partially applied."),
    }
}

#[async_trait]
impl Connection for MysqlConnection {
    fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    async fn query(&mut self, sql: &str, params: &[SqlParam]) -> DbkitResult<Vec<Row>> {
        let started = Instant::now();
        match self.execute(sql, params).await {
            Ok(rows) => {
                self.config.log_query(sql, params, started.elapsed());
                Ok(rows)
            }
            Err(e) => {
                self.config.log_query_error(&e, sql, params);
                Err(e.into())
            }
        }
    }

    async fn run_migrations(
        &mut self,
        mode: TransactionMode,
    ) -> DbkitResult<Vec<AppliedMigration>> {
        Ok(self.migrate(mode).await?)
    }

    async fn schema_diff(&mut self) -> DbkitResult<SqlInMemory> {
        Ok(self.diff().await?)
    }

    async fn close(self: Box<Self>) -> DbkitResult<()> {
        self.conn.disconnect().await.map_err(MysqlError::from)?;
        debug!("Closed MySQL connection");
        Ok(())
    }
}

/// Opens [`MysqlConnection`]s for MySQL and MariaDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlConnector;

#[async_trait]
impl ConnectionManager for MysqlConnector {
    async fn connect(&self, config: &ConnectionConfig) -> DbkitResult<Box<dyn Connection>> {
        let connection = MysqlConnection::connect(config).await?;
        Ok(Box::new(connection))
    }
}
