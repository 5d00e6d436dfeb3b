//! Migration records and the files they are written to.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use convert_case::{Case, Casing};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::connection::SqlInMemory;
use crate::engine::EngineType;
use crate::error::{DbkitError, DbkitResult};
use crate::migration_file::{self, quote_statement};

/// Template producing migration files.
pub const MIGRATION_TEMPLATE: &str = "migration";

/// Extension of migration files.
pub const MIGRATION_EXTENSION: &str = ".migration";

/// A generated migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    /// Sequential number, zero padded to at least four digits.
    pub number: String,
    /// Name given by the user.
    pub name: String,
    /// Name recorded once the migration is applied.
    pub class_name: String,
    /// Creation timestamp in milliseconds.
    pub timestamp: i64,
    /// Engine the statements are written for.
    pub engine: EngineType,
    /// Forward statements, quoted for the dialect.
    pub up_statements: Vec<String>,
    /// Backward statements, quoted for the dialect.
    pub down_statements: Vec<String>,
}

impl MigrationRecord {
    /// Build the record numbered after `existing` migrations.
    pub fn new(
        existing: usize,
        name: &str,
        timestamp: i64,
        engine: EngineType,
        diff: &SqlInMemory,
    ) -> Self {
        let quote = |statements: &[String]| {
            statements
                .iter()
                .map(|sql| quote_statement(&engine, sql))
                .collect::<Vec<_>>()
        };

        Self {
            number: next_migration_number(existing),
            name: name.to_string(),
            class_name: format!("{}{}", name.to_case(Case::Pascal), timestamp),
            timestamp,
            up_statements: quote(&diff.up_queries),
            down_statements: quote(&diff.down_queries),
            engine,
        }
    }

    /// File name, e.g. `0002-create-task.migration`.
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}{}",
            self.number,
            self.name.to_case(Case::Kebab),
            MIGRATION_EXTENSION
        )
    }

    /// File contents.
    pub fn render(&self) -> String {
        migration_file::render(self)
    }
}

/// Number of the migration following `existing` ones.
///
/// Padded to four digits; larger numbers are never truncated.
pub fn next_migration_number(existing: usize) -> String {
    format!("{:04}", existing + 1)
}

/// Count migration files in `dir`; a missing directory holds none.
pub async fn count_migration_files(dir: &Path) -> DbkitResult<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut count = 0;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name().to_string_lossy().ends_with(MIGRATION_EXTENSION) {
            count += 1;
        }
    }
    Ok(count)
}

/// Writes generated files.
#[async_trait]
pub trait FileEmitter: Send + Sync {
    /// Write `record` into `directory` using `template`; returns the file path.
    async fn emit(
        &self,
        directory: &Path,
        template: &str,
        record: &MigrationRecord,
    ) -> DbkitResult<PathBuf>;
}

/// Emitter writing migration files to disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateEmitter;

#[async_trait]
impl FileEmitter for TemplateEmitter {
    async fn emit(
        &self,
        directory: &Path,
        template: &str,
        record: &MigrationRecord,
    ) -> DbkitResult<PathBuf> {
        if template != MIGRATION_TEMPLATE {
            return Err(DbkitError::Template(template.to_string()));
        }

        tokio::fs::create_dir_all(directory).await?;
        let path = directory.join(record.file_name());

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(DbkitError::invalid_migration(format!(
                    "{} already exists",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(record.render().as_bytes()).await?;
        file.flush().await?;

        debug!(path = %path.display(), "Wrote migration file");
        Ok(path)
    }
}
