//! `migration`: generate a migration from the schema diff.

use std::sync::Arc;

use futures::FutureExt;

use super::{MigrationOptions, settle};
use crate::error::{DbkitError, DbkitResult};
use crate::executor::{DbContext, Execution, Outcome};
use crate::generator::{MIGRATION_TEMPLATE, MigrationRecord, count_migration_files};

/// Generate migration `name` for connection `database`.
///
/// Nothing is written when the schema is up to date.
pub async fn generate_migration(
    ctx: &DbContext,
    name: &str,
    database: Option<&str>,
) -> DbkitResult<Outcome> {
    let resolver = ctx.resolver()?;
    let logger = ctx.logger();

    let config = resolver.get_options(database).await?;
    let migrations_dir = config
        .cli
        .migrations_dir
        .clone()
        .ok_or_else(|| DbkitError::MissingMigrationsDirConfig(config.name.clone()))?;
    let engine = config.engine.clone();

    logger.spin(format!("Generating migration {} ...", name));
    let mut connection = resolver.create_connection(config).await?;

    let result = connection.schema_diff().await;
    let closed = connection.close().await;
    let diff = settle(result, closed)?;

    if diff.is_empty() {
        logger.stop();
        logger.info("No missing migration");
        return Ok(Outcome::success());
    }

    let directory = resolver.root().join(migrations_dir);
    let existing = count_migration_files(&directory).await?;
    let timestamp = chrono::Utc::now().timestamp_millis();
    let record = MigrationRecord::new(existing, name, timestamp, engine, &diff);

    let path = ctx
        .emitter()
        .emit(&directory, MIGRATION_TEMPLATE, &record)
        .await?;
    logger.succeed(format!("Migration {} generated", path.display()));

    Ok(Outcome::success())
}

/// `migration` operation.
pub fn migration_generate(options: MigrationOptions, ctx: Arc<DbContext>) -> Execution {
    Execution::Single(
        async move { generate_migration(&ctx, &options.name, options.database.as_deref()).await }
            .boxed(),
    )
}
