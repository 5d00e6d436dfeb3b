//! MySQL and MariaDB administrative driver.

use async_trait::async_trait;
use tracing::debug;

use super::{Driver, DriverDescriptor, DriverRegistry};
use crate::config::ConnectionConfig;
use crate::connection::{Connection, SqlParam, count_value};
use crate::engine::EngineType;
use crate::error::DbkitResult;

/// Administrative database of a MySQL server.
pub const ADMIN_DATABASE: &str = "mysql";

const EXISTS_QUERY: &str = "select count(distinct SCHEMA_NAME) as count from information_schema.SCHEMATA where SCHEMA_NAME = ?";

// `??` is an identifier placeholder, escaped by the connection.
const CREATE_QUERY: &str = "CREATE DATABASE ??";

/// Register the driver for MySQL and MariaDB.
pub fn register(registry: &mut DriverRegistry) -> DbkitResult<()> {
    for engine in [EngineType::Mysql, EngineType::Mariadb] {
        registry.register(DriverDescriptor {
            engine,
            admin_database: ADMIN_DATABASE,
            constructor: MysqlDriver::boxed,
        })?;
    }
    Ok(())
}

/// Driver bound to the `mysql` database.
pub struct MysqlDriver {
    connection: Box<dyn Connection>,
}

impl MysqlDriver {
    /// Wrap an administrative connection.
    pub fn new(connection: Box<dyn Connection>) -> Self {
        Self { connection }
    }

    fn boxed(connection: Box<dyn Connection>) -> Box<dyn Driver> {
        Box::new(Self::new(connection))
    }
}

#[async_trait]
impl Driver for MysqlDriver {
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
        self.connection
            .query(CREATE_QUERY, &[SqlParam::ident(name)])
            .await?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> DbkitResult<()> {
        self.connection.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ConnectionJournal, MockConnection, MockScript};

    #[tokio::test]
    async fn test_create_uses_identifier_placeholder() {
        let journal = ConnectionJournal::default();
        let config = ConnectionConfig::new("mariadb").database(ADMIN_DATABASE);
        let mut driver = MysqlDriver::new(Box::new(MockConnection::new(
            config,
            MockScript::default().count(0),
            journal.clone(),
        )));

        assert_eq!(driver.engine(), &EngineType::Mariadb);
        assert!(!driver.database_exists("shop").await.unwrap());
        driver.create_database("shop").await.unwrap();

        let queries = journal.queries();
        assert_eq!(queries[0].0, EXISTS_QUERY);
        assert_eq!(
            queries[1],
            (CREATE_QUERY.to_string(), vec![SqlParam::ident("shop")])
        );
    }
}
