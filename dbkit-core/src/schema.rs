//! Table-level schema diff.
//!
//! Entities are declared as `CREATE TABLE` statements in SQL files matched by
//! the connection's `entities` patterns. Tables missing from the live schema
//! become the `up` statements; `down` drops them again in reverse order.
//! Column changes are not detected.

use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::connection::SqlInMemory;
use crate::error::DbkitResult;
use crate::pattern::collect_files;

static CREATE_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)^\s*create\s+table\s+(?:if\s+not\s+exists\s+)?([`"\w.]+)"#)
        .expect("valid create table pattern")
});

/// A table declared by an entity file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTable {
    /// Unquoted table name.
    pub name: String,
    /// `CREATE TABLE` statement, without the trailing `;`.
    pub create: String,
}

/// Extract the `CREATE TABLE` statements of a SQL script.
///
/// Statements are separated by `;` outside quoted literals; other
/// statements and `--` comment lines are ignored.
pub fn parse_entities(sql: &str) -> Vec<EntityTable> {
    let sql = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    split_statements(&sql)
        .into_iter()
        .map(str::trim)
        .filter_map(|statement| {
            let caps = CREATE_TABLE.captures(statement)?;
            let qualified = caps[1].replace(['`', '"'], "");
            let name = qualified.rsplit('.').next().unwrap_or(&qualified).to_string();
            Some(EntityTable {
                name,
                create: statement.to_string(),
            })
        })
        .collect()
}

/// Split `sql` on the `;` separators that are not inside a quoted span.
pub fn split_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in sql.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q != '`' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' | '`' => quote = Some(c),
            ';' => {
                statements.push(&sql[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    statements.push(&sql[start..]);
    statements
}

/// Load the tables declared by the files matching `patterns`.
pub async fn load_entities(patterns: &[String]) -> DbkitResult<Vec<EntityTable>> {
    let mut tables = Vec::new();
    for file in collect_files(patterns)? {
        tables.extend(load_file(&file).await?);
    }
    Ok(tables)
}

async fn load_file(path: &Path) -> DbkitResult<Vec<EntityTable>> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(parse_entities(&content))
}

/// Statements creating the tables absent from `existing`.
///
/// `quote` quotes a table name for the `DROP TABLE` statements.
pub fn missing_tables(
    entities: &[EntityTable],
    existing: &HashSet<String>,
    quote: impl Fn(&str) -> String,
) -> SqlInMemory {
    let missing: Vec<&EntityTable> = entities
        .iter()
        .filter(|table| !existing.contains(&table.name))
        .collect();

    SqlInMemory {
        up_queries: missing.iter().map(|table| table.create.clone()).collect(),
        down_queries: missing
            .iter()
            .rev()
            .map(|table| format!("DROP TABLE {}", quote(&table.name)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ENTITIES: &str = r#"
        -- people
        CREATE TABLE "person" ("id" SERIAL NOT NULL, "name" varchar NOT NULL);
        create table if not exists public.task (id serial primary key);
        CREATE INDEX idx_task ON task (id);
    "#;

    #[test]
    fn test_parse_entities() {
        let tables = parse_entities(ENTITIES);
        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["person", "task"]);
        assert!(tables[0].create.ends_with("\"name\" varchar NOT NULL)"));
    }

    #[test]
    fn test_semicolons_inside_literals_do_not_split() {
        let sql = "CREATE TABLE \"note\" (\"body\" varchar DEFAULT 'a;b', \"tag\" varchar DEFAULT 'it\\'s;x');\n\
                   CREATE TABLE `task` (`a;b` int);";
        let tables = parse_entities(sql);

        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["note", "task"]);
        assert!(tables[0].create.ends_with("DEFAULT 'it\\'s;x')"));
        assert_eq!(split_statements("select ';'; select 2").len(), 2);
    }

    #[test]
    fn test_missing_tables() {
        let tables = parse_entities(ENTITIES);
        let existing: HashSet<String> = HashSet::new();
        let diff = missing_tables(&tables, &existing, |name| format!("\"{}\"", name));

        assert_eq!(diff.up_queries.len(), 2);
        assert_eq!(
            diff.down_queries,
            vec!["DROP TABLE \"task\"".to_string(), "DROP TABLE \"person\"".to_string()]
        );

        let existing: HashSet<String> = ["person", "task"].iter().map(|s| s.to_string()).collect();
        assert!(missing_tables(&tables, &existing, |n| n.to_string()).is_empty());
    }
}
