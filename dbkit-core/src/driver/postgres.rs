//! PostgreSQL administrative driver.

use async_trait::async_trait;
use tracing::debug;

use super::{Driver, DriverDescriptor, DriverRegistry};
use crate::config::ConnectionConfig;
use crate::connection::{Connection, SqlParam, count_value};
use crate::engine::EngineType;
use crate::error::DbkitResult;

/// Administrative database of a PostgreSQL server.
pub const ADMIN_DATABASE: &str = "postgres";

const EXISTS_QUERY: &str =
    "select count(distinct datname) as count from pg_database where datname = $1";

/// Register the PostgreSQL driver.
pub fn register(registry: &mut DriverRegistry) -> DbkitResult<()> {
    registry.register(DriverDescriptor {
        engine: EngineType::Postgres,
        admin_database: ADMIN_DATABASE,
        constructor: PostgresDriver::boxed,
    })?;
    Ok(())
}

/// Quote an identifier, doubling embedded double quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Driver bound to the `postgres` database.
pub struct PostgresDriver {
    connection: Box<dyn Connection>,
}

impl PostgresDriver {
    /// Wrap an administrative connection.
    pub fn new(connection: Box<dyn Connection>) -> Self {
        Self { connection }
    }

    fn boxed(connection: Box<dyn Connection>) -> Box<dyn Driver> {
        Box::new(Self::new(connection))
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    fn engine(&self) -> &EngineType {
        &self.connection.config().engine
    }

    fn options(&self) -> &ConnectionConfig {
        self.connection.config()
    }

    async fn database_exists(&mut self, name: &str) -> DbkitResult<bool> {
        let rows = self
            .connection
            .query(EXISTS_QUERY, &[SqlParam::text(name)])
            .await?;
        Ok(count_value(&rows)? != 0)
    }

    async fn create_database(&mut self, name: &str) -> DbkitResult<()> {
        debug!(database = name, "Creating database");
        let sql = format!("CREATE DATABASE {}", quote_identifier(name));
        self.connection.query(&sql, &[]).await?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> DbkitResult<()> {
        self.connection.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ConnectionEvent, ConnectionJournal, MockConnection, MockScript};

    fn admin_driver(script: MockScript, journal: &ConnectionJournal) -> PostgresDriver {
        let config = ConnectionConfig::new("postgres").database(ADMIN_DATABASE);
        PostgresDriver::new(Box::new(MockConnection::new(config, script, journal.clone())))
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("test"), "\"test\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[tokio::test]
    async fn test_database_exists_reads_count() {
        let journal = ConnectionJournal::default();
        let mut driver = admin_driver(MockScript::default().count(1), &journal);
        assert!(driver.database_exists("test").await.unwrap());

        let mut driver = admin_driver(MockScript::default().count(0).count_as_text(), &journal);
        assert!(!driver.database_exists("test").await.unwrap());

        assert_eq!(
            journal.queries()[0],
            (EXISTS_QUERY.to_string(), vec![SqlParam::text("test")])
        );
    }

    #[tokio::test]
    async fn test_create_database_quotes_name() {
        let journal = ConnectionJournal::default();
        let mut driver = admin_driver(MockScript::default(), &journal);
        driver.create_database("test").await.unwrap();
        Box::new(driver).close().await.unwrap();

        assert_eq!(
            journal.events(),
            vec![
                ConnectionEvent::Query {
                    sql: "CREATE DATABASE \"test\"".to_string(),
                    params: vec![],
                },
                ConnectionEvent::Close,
            ]
        );
    }
}
