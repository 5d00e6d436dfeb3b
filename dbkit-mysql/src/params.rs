//! Placeholder expansion.
//!
//! Statements use `?` for values and `??` for identifiers. Identifiers are
//! escaped into the statement text, values stay positional and are bound by
//! the server.

use dbkit_core::SqlParam;
use mysql_async::Value;

use crate::error::{MysqlError, MysqlResult};

/// Quote an identifier with back-ticks.
pub fn escape_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// A statement ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Expanded {
    /// Statement text with identifiers inlined.
    pub sql: String,
    /// Values for the remaining `?` placeholders.
    pub values: Vec<Value>,
}

/// Inline identifier parameters and collect value parameters.
///
/// Placeholders inside quoted literals are left alone.
pub fn expand_placeholders(sql: &str, params: &[SqlParam]) -> MysqlResult<Expanded> {
    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut params = params.iter();
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' && q != '`' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                out.push(c);
            }
            '?' => {
                let identifier = chars.peek() == Some(&'?');
                if identifier {
                    chars.next();
                }

                let param = params.next().ok_or_else(|| {
                    MysqlError::query(format!("not enough parameters for: {}", sql))
                })?;

                match (identifier, param) {
                    (true, SqlParam::Ident(name)) | (true, SqlParam::Text(name)) => {
                        out.push_str(&escape_identifier(name));
                    }
                    (true, SqlParam::Int(_)) => {
                        return Err(MysqlError::query(format!(
                            "integer bound to identifier placeholder in: {}",
                            sql
                        )));
                    }
                    (false, SqlParam::Text(text)) => {
                        out.push('?');
                        values.push(Value::from(text.as_str()));
                    }
                    (false, SqlParam::Int(value)) => {
                        out.push('?');
                        values.push(Value::from(*value));
                    }
                    (false, SqlParam::Ident(name)) => {
                        return Err(MysqlError::query(format!(
                            "identifier '{}' bound to value placeholder in: {}",
                            name, sql
                        )));
                    }
                }
            }
            c => out.push(c),
        }
    }

    if params.next().is_some() {
        return Err(MysqlError::query(format!(
            "too many parameters for: {}",
            sql
        )));
    }

    Ok(Expanded { sql: out, values })
}
