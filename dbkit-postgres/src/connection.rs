//! PostgreSQL connection.

use std::collections::HashSet;
use std::time::Instant;

use async_trait::async_trait;
use dbkit_core::driver::postgres::quote_identifier;
use dbkit_core::schema::{load_entities, missing_tables};
use dbkit_core::{
    AppliedMigration, Connection, ConnectionConfig, ConnectionManager, DbkitResult, Row,
    SqlInMemory, SqlParam, TransactionMode, migration_file,
};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, warn};

use crate::config::PgConfig;
use crate::error::{PgError, PgResult};
use crate::migrations;
use crate::row::{row_to_json, simple_rows};

/// Tables of the current schema.
pub const EXISTING_TABLES_QUERY: &str =
    "SELECT table_name FROM information_schema.tables WHERE table_schema = current_schema()";

/// A connection to a PostgreSQL server.
pub struct PgConnection {
    config: ConnectionConfig,
    client: Client,
    driver: JoinHandle<()>,
}

impl PgConnection {
    /// Open a connection described by `config`.
    pub async fn connect(config: &ConnectionConfig) -> PgResult<Self> {
        let pg_config = PgConfig::from_connection(config)?;
        debug!(
            host = %pg_config.host,
            port = pg_config.port,
            database = %pg_config.database,
            "Connecting to PostgreSQL"
        );

        let (client, connection) = pg_config
            .to_pg_config()
            .connect(NoTls)
            .await
            .map_err(|e| PgError::connection(e.to_string()))?;

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "PostgreSQL connection closed with an error");
            }
        });

        Ok(Self {
            config: config.clone(),
            client,
            driver,
        })
    }

    async fn execute(&self, sql: &str, params: &[SqlParam]) -> PgResult<Vec<Row>> {
        debug!(sql = %sql, "Executing query");

        // Statements without parameters go through the simple protocol so
        // utility commands like CREATE DATABASE run outside a transaction
        if params.is_empty() {
            let messages = self.client.simple_query(sql).await?;
            return Ok(simple_rows(messages));
        }

        let bound = bind_params(params)?;
        let refs: Vec<&(dyn ToSql + Sync)> = bound
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();
        let rows = self.client.query(sql, &refs).await?;
        rows.iter().map(row_to_json).collect()
    }

    async fn migrate(&mut self, mode: TransactionMode) -> PgResult<Vec<AppliedMigration>> {
        let Self { config, client, .. } = self;

        migrations::ensure_table(&*client, config).await?;
        let applied = migrations::applied(&*client, config).await?;
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
        }

        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let mut executed = Vec::with_capacity(pending.len());
        match mode {
            TransactionMode::All => {
                let transaction = client.transaction().await?;
                for migration in &pending {
                    executed.push(migrations::apply(&transaction, config, migration).await?);
                }
                transaction.commit().await?;
            }
            TransactionMode::Each => {
                for migration in &pending {
                    let transaction = client.transaction().await?;
                    executed.push(migrations::apply(&transaction, config, migration).await?);
                    transaction.commit().await?;
                }
            }
            TransactionMode::None => {
                for migration in &pending {
                    executed.push(migrations::apply(&*client, config, migration).await?);
                }
            }
        }
        Ok(executed)
    }

    async fn diff(&self) -> PgResult<SqlInMemory> {
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
        Ok(missing_tables(&entities, &existing, quote_identifier))
    }
}

#[async_trait]
impl Connection for PgConnection {
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
        let Self { client, driver, .. } = *self;
        drop(client);
        driver
            .await
            .map_err(|e| PgError::connection(format!("connection task failed: {}", e)))?;
        debug!("Closed PostgreSQL connection");
        Ok(())
    }
}

/// Opens [`PgConnection`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

#[async_trait]
impl ConnectionManager for PgConnector {
    async fn connect(&self, config: &ConnectionConfig) -> DbkitResult<Box<dyn Connection>> {
        let connection = PgConnection::connect(config).await?;
        Ok(Box::new(connection))
    }
}

/// Bind positional parameters.
///
/// Identifiers have no placeholder form in PostgreSQL and must be quoted
/// into the statement instead.
pub fn bind_params(params: &[SqlParam]) -> PgResult<Vec<Box<dyn ToSql + Sync + Send>>> {
    params
        .iter()
        .map(|param| match param {
            SqlParam::Text(text) => Ok(Box::new(text.clone()) as Box<dyn ToSql + Sync + Send>),
            SqlParam::Int(value) => Ok(Box::new(*value) as Box<dyn ToSql + Sync + Send>),
            SqlParam::Ident(name) => Err(PgError::query(format!(
                "identifier parameter '{}' is not supported, quote it into the statement",
                name
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_params() {
        let bound = bind_params(&[SqlParam::text("app"), SqlParam::Int(3)]).unwrap();
        assert_eq!(bound.len(), 2);
    }

    #[test]
    fn test_bind_params_rejects_identifiers() {
        let err = bind_params(&[SqlParam::ident("app")]).err().unwrap();
        assert!(err.to_string().contains("identifier parameter 'app'"));
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_config() {
        let config = ConnectionConfig::new("postgres").host("localhost");
        let err = PgConnector.connect(&config).await.err().unwrap();
        assert!(matches!(err, dbkit_core::DbkitError::Config(_)));
    }
}
