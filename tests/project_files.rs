//! Operations against a project laid out on disk.

use std::fs;
use std::sync::Arc;

use dbkit::migration_file;
use dbkit::testing::{ConnectionJournal, MockConnectionManager, MockScript, RecordingSpinner};
use dbkit::{
    DriverRegistry, ExecutorContext, LogLevel, Logger, Outcome, ProjectResolverFactory, Services,
    SqlInMemory, WorkspaceConfig, db_executor, ops,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const ORMCONFIG: &str = r#"
[connections.default]
type = "postgres"
host = "localhost"
database = "api_dev"

[connections.default.cli]
migrations_dir = "db/migrations"

[connections.reporting]
type = "mysql"
database = "reports"
"#;

fn project(ormconfig: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    let api = dir.path().join("apps/api");
    fs::create_dir_all(&api).unwrap();
    fs::write(api.join("ormconfig.toml"), ormconfig).unwrap();
    dir
}

fn services(script: MockScript) -> (Services, ConnectionJournal, RecordingSpinner) {
    let journal = ConnectionJournal::default();
    let spinner = RecordingSpinner::default();
    let connections = MockConnectionManager::new(journal.clone()).with_script(script);

    let services = Services::new(
        Logger::new(spinner.clone()),
        Arc::new(DriverRegistry::with_defaults().unwrap()),
        Arc::new(ProjectResolverFactory::new(Arc::new(connections))),
    );
    (services, journal, spinner)
}

fn context(dir: &TempDir) -> ExecutorContext {
    ExecutorContext {
        root: dir.path().to_path_buf(),
        project_name: Some("api".to_string()),
        workspace: WorkspaceConfig::default().with_project("api", "apps/api"),
        cwd: dir.path().to_path_buf(),
        is_verbose: false,
    }
}

#[tokio::test]
async fn test_named_connection_is_read_from_ormconfig() {
    let dir = project(ORMCONFIG);
    let (services, journal, spinner) = services(MockScript::default().count(0));

    let create = db_executor(ops::db_create);
    let options = ops::DatabaseOptions {
        database: Some("reporting".to_string()),
        ..Default::default()
    };
    let outcomes = create(options, context(&dir), &services).outcomes().await;

    assert_eq!(outcomes, vec![Outcome::success()]);
    assert_eq!(journal.connected_databases(), vec![Some("mysql".to_string())]);
    assert!(spinner.has_line(LogLevel::Success, "Database reports created"));
}

#[tokio::test]
async fn test_unknown_connection_name_fails() {
    let dir = project(ORMCONFIG);
    let (services, journal, spinner) = services(MockScript::default());

    let migrate = db_executor(ops::db_migrate);
    let options = ops::DatabaseOptions {
        database: Some("archive".to_string()),
        ..Default::default()
    };
    let outcomes = migrate(options, context(&dir), &services).outcomes().await;

    assert_eq!(outcomes, vec![Outcome::failure()]);
    assert!(journal.connected_databases().is_empty());
    assert!(spinner.has_line(
        LogLevel::Error,
        "Connection 'archive' was not found in the configuration"
    ));
}

#[tokio::test]
async fn test_generated_migration_is_written_and_parses_back() {
    let dir = project(ORMCONFIG);
    let migrations = dir.path().join("apps/api/db/migrations");
    fs::create_dir_all(&migrations).unwrap();
    fs::write(migrations.join("0001-create-person.migration"), "").unwrap();

    let diff = SqlInMemory {
        up_queries: vec!["CREATE TABLE \"task\" (\"id\" SERIAL NOT NULL)".to_string()],
        down_queries: vec!["DROP TABLE \"task\"".to_string()],
    };
    let (services, journal, _spinner) = services(MockScript::default().schema_diff(diff));

    let generate = db_executor(ops::migration_generate);
    let options = ops::MigrationOptions {
        name: "create-task".to_string(),
        ..Default::default()
    };
    let outcomes = generate(options, context(&dir), &services).outcomes().await;

    assert_eq!(outcomes, vec![Outcome::success()]);
    assert_eq!(journal.connected_databases(), vec![Some("api_dev".to_string())]);

    let written = migrations.join("0002-create-task.migration");
    let parsed = migration_file::parse(&fs::read_to_string(&written).unwrap()).unwrap();
    assert_eq!(parsed.number, "0002");
    assert!(parsed.name.starts_with("CreateTask"));
    assert_eq!(
        parsed.up,
        vec!["CREATE TABLE \"task\" (\"id\" SERIAL NOT NULL)".to_string()]
    );
    assert_eq!(parsed.down, vec!["DROP TABLE \"task\"".to_string()]);
}

#[tokio::test]
async fn test_up_to_date_schema_writes_nothing() {
    let dir = project(ORMCONFIG);
    let (services, _journal, spinner) = services(MockScript::default());

    let generate = db_executor(ops::migration_generate);
    let options = ops::MigrationOptions {
        name: "noop".to_string(),
        ..Default::default()
    };
    let outcomes = generate(options, context(&dir), &services).outcomes().await;

    assert_eq!(outcomes, vec![Outcome::success()]);
    assert!(spinner.has_line(LogLevel::Info, "No missing migration"));
    assert!(!dir.path().join("apps/api/db/migrations").exists());
}
