//! Database engine identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Engine type of a connection configuration (the `type` key in `ormconfig.toml`).
///
/// Unknown engine names are kept verbatim in [`EngineType::Other`] so that
/// lookups can report them as unsupported instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EngineType {
    /// PostgreSQL.
    Postgres,
    /// MySQL.
    Mysql,
    /// MariaDB.
    Mariadb,
    /// SQLite.
    Sqlite,
    /// Microsoft SQL Server.
    Mssql,
    /// Any other engine name.
    Other(String),
}

impl EngineType {
    /// Canonical name of the engine.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Mariadb => "mariadb",
            Self::Sqlite => "sqlite",
            Self::Mssql => "mssql",
            Self::Other(name) => name,
        }
    }

    /// Engines speaking the MySQL dialect.
    pub fn is_mysql_family(&self) -> bool {
        matches!(self, Self::Mysql | Self::Mariadb)
    }
}

impl From<&str> for EngineType {
    fn from(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Self::Postgres,
            "mysql" => Self::Mysql,
            "mariadb" => Self::Mariadb,
            "sqlite" | "sqlite3" => Self::Sqlite,
            "mssql" | "sqlserver" => Self::Mssql,
            _ => Self::Other(value.to_string()),
        }
    }
}

impl From<String> for EngineType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<EngineType> for String {
    fn from(value: EngineType) -> Self {
        value.as_str().to_string()
    }
}

impl FromStr for EngineType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(EngineType::from("postgresql"), EngineType::Postgres);
        assert_eq!(EngineType::from("Postgres"), EngineType::Postgres);
        assert_eq!(EngineType::from("sqlite3"), EngineType::Sqlite);
        assert_eq!(
            EngineType::from("unsupported-engine"),
            EngineType::Other("unsupported-engine".to_string())
        );
    }

    #[test]
    fn test_mysql_family() {
        assert!(EngineType::Mysql.is_mysql_family());
        assert!(EngineType::Mariadb.is_mysql_family());
        assert!(!EngineType::Postgres.is_mysql_family());
    }

    #[test]
    fn test_display_keeps_unknown_name() {
        assert_eq!(EngineType::from("cockroach").to_string(), "cockroach");
        assert_eq!(EngineType::Postgres.to_string(), "postgres");
    }
}
