//! `db-create`: make sure the target database exists.

use std::sync::Arc;

use futures::FutureExt;

use super::{DatabaseOptions, settle};
use crate::driver::Driver;
use crate::error::DbkitResult;
use crate::executor::{DbContext, Execution, Outcome};
use crate::logger::Logger;

/// Create the database of connection `database` unless it exists.
///
/// The probe and the creation go through the administrative database; the
/// driver is closed whatever happens.
pub async fn create_database(ctx: &DbContext, database: Option<&str>) -> DbkitResult<Outcome> {
    let resolver = ctx.resolver()?;
    let logger = ctx.logger();

    let config = resolver.get_options(database).await?;
    let target = config.target_database()?;

    logger.spin(format!("Creating database {} ...", target));
    let mut driver = ctx.registry().connect(resolver, config).await?;

    let result = provision(driver.as_mut(), logger, &target).await;
    let closed = driver.close().await;
    settle(result, closed)?;

    Ok(Outcome::success())
}

async fn provision(driver: &mut dyn Driver, logger: &Logger, target: &str) -> DbkitResult<()> {
    if driver.database_exists(target).await? {
        logger.stop();
        logger.info(format!("Database {} already exists", target));
    } else {
        logger.debug(format!("Database {} does not exist", target));
        driver.create_database(target).await?;
        logger.succeed(format!("Database {} created", target));
    }
    Ok(())
}

/// `db-create` operation.
pub fn db_create(options: DatabaseOptions, ctx: Arc<DbContext>) -> Execution {
    Execution::Single(async move { create_database(&ctx, options.database.as_deref()).await }.boxed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::connection::SqlParam;
    use crate::error::DbkitError;
    use crate::logger::LogLevel;
    use crate::ops::fixtures::fixture;
    use crate::testing::{ConnectionEvent, MockScript};

    #[tokio::test]
    async fn test_creates_missing_database() {
        let f = fixture(
            ConnectionConfig::new("postgres").database("test"),
            MockScript::default().count(0),
        );

        let outcome = create_database(&f.context, None).await.unwrap();
        assert_eq!(outcome, Outcome::success());

        let creates: Vec<_> = f
            .journal
            .queries()
            .into_iter()
            .filter(|(sql, _)| sql.starts_with("CREATE DATABASE"))
            .collect();
        assert_eq!(creates, vec![("CREATE DATABASE \"test\"".to_string(), vec![])]);
        assert_eq!(f.journal.closes(), 1);
        assert!(f.spinner.has_line(LogLevel::Success, "Database test created"));
    }

    #[tokio::test]
    async fn test_existing_database_is_left_alone() {
        let f = fixture(
            ConnectionConfig::new("mysql").database("shop"),
            MockScript::default().count(1).count_as_text(),
        );

        create_database(&f.context, Some("default")).await.unwrap();

        assert_eq!(f.journal.queries().len(), 1);
        assert_eq!(
            f.journal.queries()[0].1,
            vec![SqlParam::text("shop")]
        );
        assert_eq!(f.journal.closes(), 1);
        assert!(f.spinner.has_line(LogLevel::Info, "Database shop already exists"));
    }

    #[tokio::test]
    async fn test_driver_closed_when_probe_fails() {
        let f = fixture(
            ConnectionConfig::new("postgres").database("test"),
            MockScript::default().fail_on("pg_database"),
        );

        let err = create_database(&f.context, None).await.unwrap_err();
        assert!(err.is_database_error());
        assert_eq!(f.journal.closes(), 1);
    }

    #[tokio::test]
    async fn test_driver_closed_when_create_fails() {
        let f = fixture(
            ConnectionConfig::new("postgres").database("test"),
            MockScript::default().fail_on("CREATE DATABASE").fail_close(),
        );

        let err = create_database(&f.context, None).await.unwrap_err();
        assert!(matches!(err, DbkitError::Query(_)));
        assert_eq!(f.journal.count(&ConnectionEvent::Close), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_nothing_to_close() {
        let f = fixture(
            ConnectionConfig::new("postgres").database("test"),
            MockScript::default().fail_connect(),
        );

        let err = create_database(&f.context, None).await.unwrap_err();
        assert!(matches!(err, DbkitError::Connection(_)));
        assert!(f.journal.queries().is_empty());
        assert_eq!(f.journal.closes(), 0);
    }

    #[tokio::test]
    async fn test_missing_database_name() {
        let f = fixture(ConnectionConfig::new("postgres"), MockScript::default());

        let err = create_database(&f.context, None).await.unwrap_err();
        assert!(matches!(err, DbkitError::MissingDatabaseName(_)));
        assert!(f.journal.connected_databases().is_empty());
    }
}
