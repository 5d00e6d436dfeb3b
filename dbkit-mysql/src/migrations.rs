//! Migration bookkeeping for MySQL.
//!
//! DDL commits implicitly on MySQL, so a transaction around a migration only
//! covers its data statements and the bookkeeping insert.

use std::collections::HashSet;
use std::time::Instant;

use dbkit_core::migration_file::MigrationFile;
use dbkit_core::{AppliedMigration, ConnectionConfig};
use mysql_async::prelude::Queryable;
use tracing::debug;

use crate::error::MysqlResult;
use crate::params::escape_identifier;

/// Statement creating the migrations table.
pub fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (`id` int NOT NULL AUTO_INCREMENT, `timestamp` bigint NOT NULL, `name` varchar(255) NOT NULL, PRIMARY KEY (`id`)) ENGINE=InnoDB",
        escape_identifier(table)
    )
}

/// Query listing applied migration names.
pub fn select_applied_sql(table: &str) -> String {
    format!("SELECT `name` FROM {}", escape_identifier(table))
}

/// Statement recording an applied migration.
pub fn insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {} (`timestamp`, `name`) VALUES (?, ?)",
        escape_identifier(table)
    )
}

/// Create the migrations table if needed.
pub async fn ensure_table<Q: Queryable>(conn: &mut Q, config: &ConnectionConfig) -> MysqlResult<()> {
    let sql = create_table_sql(config.migrations_table());
    execute_logged(conn, config, &sql).await
}

/// Names of the applied migrations.
pub async fn applied<Q: Queryable>(
    conn: &mut Q,
    config: &ConnectionConfig,
) -> MysqlResult<HashSet<String>> {
    let sql = select_applied_sql(config.migrations_table());
    let names: Vec<String> = conn.query(sql).await?;
    Ok(names.into_iter().collect())
}

/// Run the `up` statements of `migration` and record it.
pub async fn apply<Q: Queryable>(
    conn: &mut Q,
    config: &ConnectionConfig,
    migration: &MigrationFile,
) -> MysqlResult<AppliedMigration> {
    for statement in &migration.up {
        execute_logged(conn, config, statement).await?;
    }

    conn.exec_drop(
        insert_sql(config.migrations_table()),
        (migration.timestamp, migration.name.clone()),
    )
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

async fn execute_logged<Q: Queryable>(
    conn: &mut Q,
    config: &ConnectionConfig,
    sql: &str,
) -> MysqlResult<()> {
    let started = Instant::now();
    match conn.query_drop(sql).await {
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

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bookkeeping_sql_quotes_table() {
        assert_eq!(
            select_applied_sql("schema_history"),
            "SELECT `name` FROM `schema_history`"
        );
        assert_eq!(
            insert_sql("migrations"),
            "INSERT INTO `migrations` (`timestamp`, `name`) VALUES (?, ?)"
        );
        assert!(create_table_sql("migrations").contains("AUTO_INCREMENT"));
    }
}
