//! `db-migrate`: apply pending migrations.

use std::sync::Arc;

use futures::FutureExt;

use super::{DatabaseOptions, settle};
use crate::connection::TransactionMode;
use crate::error::DbkitResult;
use crate::executor::{DbContext, Execution, Outcome};

/// Run the pending migrations of connection `database`, one transaction each.
pub async fn migrate_database(ctx: &DbContext, database: Option<&str>) -> DbkitResult<Outcome> {
    let resolver = ctx.resolver()?;
    let logger = ctx.logger();

    let config = resolver.get_options(database).await?;
    let target = config
        .target_database()
        .unwrap_or_else(|_| config.name.clone());

    logger.spin(format!("Migrating database {} ...", target));
    let mut connection = resolver.create_connection(config).await?;

    let result = connection.run_migrations(TransactionMode::Each).await;
    let closed = connection.close().await;
    let migrations = settle(result, closed)?;

    if migrations.is_empty() {
        logger.stop();
        logger.info("Nothing to do");
    } else {
        logger.succeed(format!("{} migrations executed:", migrations.len()));
        for migration in &migrations {
            logger.succeed(format!("- {}", migration.name));
        }
    }

    Ok(Outcome::success())
}

/// `db-migrate` operation.
pub fn db_migrate(options: DatabaseOptions, ctx: Arc<DbContext>) -> Execution {
    Execution::Single(async move { migrate_database(&ctx, options.database.as_deref()).await }.boxed())
}
