//! `db-setup`: create then migrate, reporting each step.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use super::DatabaseOptions;
use super::create::create_database;
use super::migrate::migrate_database;
use crate::executor::{DbContext, Execution};

#[derive(Debug, Clone, Copy)]
enum Step {
    Create,
    Migrate,
}

/// `db-setup` operation; yields one outcome per step.
///
/// Steps run lazily, so a failing create stops the sequence before migrate.
pub fn db_setup(options: DatabaseOptions, ctx: Arc<DbContext>) -> Execution {
    let database = options.database;

    let steps = stream::iter([Step::Create, Step::Migrate]).then(move |step| {
        let ctx = ctx.clone();
        let database = database.clone();
        async move {
            match step {
                Step::Create => create_database(&ctx, database.as_deref()).await,
                Step::Migrate => migrate_database(&ctx, database.as_deref()).await,
            }
        }
    });

    Execution::Stream(steps.boxed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::executor::Outcome;
    use crate::ops::fixtures::fixture;
    use crate::testing::{ConnectionEvent, MockScript};

    #[tokio::test]
    async fn test_runs_create_then_migrate() {
        let f = fixture(
            ConnectionConfig::new("postgres").database("test"),
            MockScript::default().count(0),
        );

        let Execution::Stream(steps) = db_setup(DatabaseOptions::default(), Arc::new(f.context))
        else {
            panic!("expected a stream");
        };
        let outcomes: Vec<_> = steps.collect().await;

        assert!(outcomes.iter().all(|o| matches!(o, Ok(outcome) if *outcome == Outcome::success())));
        assert_eq!(outcomes.len(), 2);
        assert_eq!(
            f.journal.connected_databases(),
            vec![Some("postgres".to_string()), Some("test".to_string())]
        );
        assert_eq!(f.journal.closes(), 2);
    }

    #[tokio::test]
    async fn test_steps_are_lazy() {
        let f = fixture(
            ConnectionConfig::new("postgres").database("test"),
            MockScript::default().count(1),
        );

        let Execution::Stream(mut steps) =
            db_setup(DatabaseOptions::default(), Arc::new(f.context))
        else {
            panic!("expected a stream");
        };
        assert!(steps.next().await.is_some());
        drop(steps);

        assert_eq!(
            f.journal
                .count(&ConnectionEvent::RunMigrations(crate::connection::TransactionMode::Each)),
            0
        );
    }
}
