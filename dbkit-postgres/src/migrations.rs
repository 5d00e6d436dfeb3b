//! Migration bookkeeping for PostgreSQL.

use std::collections::HashSet;
use std::time::Instant;

use dbkit_core::driver::postgres::quote_identifier;
use dbkit_core::migration_file::MigrationFile;
use dbkit_core::{AppliedMigration, ConnectionConfig};
use tokio_postgres::GenericClient;
use tracing::debug;

use crate::error::PgResult;

/// Statement creating the migrations table.
pub fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\"id\" SERIAL NOT NULL, \"timestamp\" bigint NOT NULL, \"name\" character varying NOT NULL, PRIMARY KEY (\"id\"))",
        quote_identifier(table)
    )
}

/// Query listing applied migration names.
pub fn select_applied_sql(table: &str) -> String {
    format!("SELECT \"name\" FROM {}", quote_identifier(table))
}

/// Statement recording an applied migration.
pub fn insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {} (\"timestamp\", \"name\") VALUES ($1, $2)",
        quote_identifier(table)
    )
}

/// Create the migrations table if needed.
pub async fn ensure_table<C>(client: &C, config: &ConnectionConfig) -> PgResult<()>
where
    C: GenericClient + Sync,
{
    let sql = create_table_sql(config.migrations_table());
    execute_logged(client, config, &sql).await
}

/// Names of the applied migrations.
pub async fn applied<C>(client: &C, config: &ConnectionConfig) -> PgResult<HashSet<String>>
where
    C: GenericClient + Sync,
{
    let sql = select_applied_sql(config.migrations_table());
    let rows = client.query(sql.as_str(), &[]).await?;
    rows.iter()
        .map(|row| row.try_get::<_, String>("name").map_err(Into::into))
        .collect()
}

/// Run the `up` statements of `migration` and record it.
pub async fn apply<C>(
    client: &C,
    config: &ConnectionConfig,
    migration: &MigrationFile,
) -> PgResult<AppliedMigration>
where
    C: GenericClient + Sync,
{
    for statement in &migration.up {
        execute_logged(client, config, statement).await?;
    }

    let insert = insert_sql(config.migrations_table());
    client
        .execute(insert.as_str(), &[&migration.timestamp, &migration.name])
        .await?;

    debug!(name = %migration.name, "Applied migration");
    if let Some(query_logger) = &config.query_logger {
        query_logger.log_migration(&format!(
            "Migration {} has been executed successfully.",
            migration.name
        ));
    }
    Ok(AppliedMigration::new(&migration.name, migration.timestamp))
}

async fn execute_logged<C>(client: &C, config: &ConnectionConfig, sql: &str) -> PgResult<()>
where
    C: GenericClient + Sync,
{
    let started = Instant::now();
    match client.batch_execute(sql).await {
        Ok(()) => {
            config.log_query(sql, &[], started.elapsed());
            Ok(())
        }
        Err(e) => {
            config.log_query_error(&e, sql, &[]);
            Err(e.into())
        }
    }
}
