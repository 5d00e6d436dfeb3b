//! Migration file format.
//!
//! A migration file holds a small header followed by the `up` and `down`
//! statements, one quoted literal per line:
//!
//! ```text
//! -- migration: 0001
//! -- name: CreatePerson1617571274912
//! -- timestamp: 1617571274912
//!
//! -- up
//! "CREATE TABLE `person` (`id` int NOT NULL)"
//!
//! -- down
//! "DROP TABLE `person`"
//! ```
//!
//! Statements for MySQL-family engines are delimited by double quotes, every
//! other engine uses back-ticks, so the delimiter rarely collides with the
//! identifier quoting of the dialect.

use std::collections::HashSet;
use std::path::Path;

use crate::engine::EngineType;
use crate::error::{DbkitError, DbkitResult};
use crate::generator::MigrationRecord;
use crate::pattern::collect_files;

/// Quote `sql` for the dialect of `engine`.
pub fn quote_statement(engine: &EngineType, sql: &str) -> String {
    let delimiter = if engine.is_mysql_family() { '"' } else { '`' };

    let mut quoted = String::with_capacity(sql.len() + 2);
    quoted.push(delimiter);
    for c in sql.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            c if c == delimiter => {
                quoted.push('\\');
                quoted.push(c);
            }
            c => quoted.push(c),
        }
    }
    quoted.push(delimiter);
    quoted
}

/// Reverse of [`quote_statement`]; either delimiter is accepted.
pub fn unquote_statement(literal: &str) -> DbkitResult<String> {
    let mut chars = literal.chars();
    let delimiter = match chars.next() {
        Some(c @ ('"' | '`')) => c,
        _ => {
            return Err(DbkitError::invalid_migration(format!(
                "statement is not quoted: {}",
                literal
            )));
        }
    };

    let mut sql = String::with_capacity(literal.len());
    let mut closed = false;
    while let Some(c) = chars.next() {
        if closed {
            return Err(DbkitError::invalid_migration(format!(
                "unexpected text after statement: {}",
                literal
            )));
        }

        match c {
            '\\' => match chars.next() {
                Some('\\') => sql.push('\\'),
                Some('n') => sql.push('\n'),
                Some('r') => sql.push('\r'),
                Some(c) if c == delimiter => sql.push(c),
                other => {
                    return Err(DbkitError::invalid_migration(format!(
                        "invalid escape {:?} in {}",
                        other, literal
                    )));
                }
            },
            c if c == delimiter => closed = true,
            c => sql.push(c),
        }
    }

    if !closed {
        return Err(DbkitError::invalid_migration(format!(
            "unterminated statement: {}",
            literal
        )));
    }
    Ok(sql)
}

/// Render a record as a migration file.
pub fn render(record: &MigrationRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("-- migration: {}\n", record.number));
    out.push_str(&format!("-- name: {}\n", record.class_name));
    out.push_str(&format!("-- timestamp: {}\n", record.timestamp));

    out.push_str("\n-- up\n");
    for statement in &record.up_statements {
        out.push_str(statement);
        out.push('\n');
    }

    out.push_str("\n-- down\n");
    for statement in &record.down_statements {
        out.push_str(statement);
        out.push('\n');
    }
    out
}

/// A parsed migration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// Sequential number.
    pub number: String,
    /// Migration name, recorded once applied.
    pub name: String,
    /// Creation timestamp in milliseconds.
    pub timestamp: i64,
    /// Forward statements, unquoted.
    pub up: Vec<String>,
    /// Backward statements, unquoted.
    pub down: Vec<String>,
}

#[derive(Clone, Copy)]
enum Section {
    Header,
    Up,
    Down,
}

/// Parse migration file contents.
pub fn parse(content: &str) -> DbkitResult<MigrationFile> {
    let mut number = None;
    let mut name = None;
    let mut timestamp = None;
    let mut up = Vec::new();
    let mut down = Vec::new();
    let mut section = Section::Header;

    for line in content.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }

        if let Some(comment) = line.strip_prefix("--") {
            let comment = comment.trim();
            match comment {
                "up" => section = Section::Up,
                "down" => section = Section::Down,
                _ => {
                    if let Some((key, value)) = comment.split_once(':') {
                        let value = value.trim().to_string();
                        match key.trim() {
                            "migration" => number = Some(value),
                            "name" => name = Some(value),
                            "timestamp" => {
                                timestamp = Some(value.parse::<i64>().map_err(|_| {
                                    DbkitError::invalid_migration(format!(
                                        "invalid timestamp '{}'",
                                        value
                                    ))
                                })?)
                            }
                            _ => {}
                        }
                    }
                }
            }
            continue;
        }

        match section {
            Section::Header => {
                return Err(DbkitError::invalid_migration(format!(
                    "statement outside of a section: {}",
                    line
                )));
            }
            Section::Up => up.push(unquote_statement(line)?),
            Section::Down => down.push(unquote_statement(line)?),
        }
    }

    Ok(MigrationFile {
        number: number.ok_or_else(|| DbkitError::invalid_migration("missing migration number"))?,
        name: name.ok_or_else(|| DbkitError::invalid_migration("missing migration name"))?,
        timestamp: timestamp
            .ok_or_else(|| DbkitError::invalid_migration("missing migration timestamp"))?,
        up,
        down,
    })
}

/// Read and parse a migration file.
pub async fn load(path: &Path) -> DbkitResult<MigrationFile> {
    let content = tokio::fs::read_to_string(path).await?;
    parse(&content).map_err(|e| match e {
        DbkitError::InvalidMigration(msg) => {
            DbkitError::invalid_migration(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

/// Load every migration file matching `patterns`, oldest first.
pub async fn load_all(patterns: &[String]) -> DbkitResult<Vec<MigrationFile>> {
    let mut migrations = Vec::new();
    for path in collect_files(patterns)? {
        migrations.push(load(&path).await?);
    }
    migrations.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(migrations)
}

/// Migrations whose name is not in `applied`, keeping their order.
pub fn pending(migrations: Vec<MigrationFile>, applied: &HashSet<String>) -> Vec<MigrationFile> {
    migrations
        .into_iter()
        .filter(|migration| !applied.contains(&migration.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::SqlInMemory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quote_mysql_family() {
        let sql = "CREATE TABLE `person` (`name` varchar(255) DEFAULT \"n/a\")";
        assert_eq!(
            quote_statement(&EngineType::Mysql, sql),
            "\"CREATE TABLE `person` (`name` varchar(255) DEFAULT \\\"n/a\\\")\""
        );
        assert!(quote_statement(&EngineType::Mariadb, "x").starts_with('"'));
    }

    #[test]
    fn test_quote_other_engines() {
        let sql = "CREATE TABLE \"person\" (\"id\" SERIAL NOT NULL)";
        assert_eq!(
            quote_statement(&EngineType::Postgres, sql),
            "`CREATE TABLE \"person\" (\"id\" SERIAL NOT NULL)`"
        );
        assert_eq!(
            quote_statement(&EngineType::Postgres, "a`b\\c\nd"),
            "`a\\`b\\\\c\\nd`"
        );
    }

    #[test]
    fn test_unquote_reverses_quote() {
        let sql = "INSERT INTO t VALUES ('a\\b', \"c\", `d`)\nRETURNING *";
        for engine in [EngineType::Mysql, EngineType::Postgres] {
            let quoted = quote_statement(&engine, sql);
            assert_eq!(unquote_statement(&quoted).unwrap(), sql);
        }
    }

    #[test]
    fn test_unquote_rejects_malformed() {
        assert!(unquote_statement("CREATE TABLE x").is_err());
        assert!(unquote_statement("`unterminated").is_err());
        assert!(unquote_statement("`a` trailing").is_err());
        assert!(unquote_statement("`bad \\q escape`").is_err());
    }

    #[test]
    fn test_render_and_parse() {
        let diff = SqlInMemory {
            up_queries: vec!["CREATE TABLE \"task\" (\"id\" SERIAL NOT NULL)".to_string()],
            down_queries: vec!["DROP TABLE \"task\"".to_string()],
        };
        let record = MigrationRecord::new(0, "task", 1617571274912, EngineType::Postgres, &diff);

        let rendered = render(&record);
        assert!(rendered.starts_with("-- migration: 0001\n-- name: Task1617571274912\n"));

        let parsed = parse(&rendered).unwrap();
        assert_eq!(
            parsed,
            MigrationFile {
                number: "0001".to_string(),
                name: "Task1617571274912".to_string(),
                timestamp: 1617571274912,
                up: diff.up_queries.clone(),
                down: diff.down_queries.clone(),
            }
        );
    }

    #[test]
    fn test_parse_requires_header() {
        let err = parse("-- up\n`SELECT 1`\n").unwrap_err();
        assert!(err.to_string().contains("missing migration number"));
        assert!(parse("`SELECT 1`\n").is_err());
    }

    #[tokio::test]
    async fn test_load_all_sorts_by_timestamp() {
        let dir = tempfile::TempDir::new().unwrap();
        let diff = SqlInMemory {
            up_queries: vec!["SELECT 1".to_string()],
            down_queries: vec![],
        };
        let newer = MigrationRecord::new(0, "task", 2000, EngineType::Postgres, &diff);
        let older = MigrationRecord::new(1, "person", 1000, EngineType::Postgres, &diff);
        for record in [&newer, &older] {
            std::fs::write(dir.path().join(record.file_name()), render(record)).unwrap();
        }

        let patterns = vec![format!("{}/*.migration", dir.path().display())];
        let migrations = load_all(&patterns).await.unwrap();
        let names: Vec<_> = migrations.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Person1000", "Task2000"]);

        let applied: HashSet<String> = ["Person1000".to_string()].into_iter().collect();
        let pending = pending(migrations, &applied);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].name, "Task2000");
    }
}
