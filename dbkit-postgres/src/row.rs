//! Conversion of PostgreSQL rows into JSON rows.

use dbkit_core::Row;
use serde_json::{Number, Value};
use tokio_postgres::SimpleQueryMessage;
use tokio_postgres::types::{FromSql, Type};

use crate::error::{PgError, PgResult};

/// Convert a row returned by the extended query protocol.
pub fn row_to_json(row: &tokio_postgres::Row) -> PgResult<Row> {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = column_value(row, idx, column.type_()).map_err(|e| {
            PgError::deserialization(format!("failed to get column '{}': {}", column.name(), e))
        })?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

/// Convert the rows of a simple query; every value arrives as text.
pub fn simple_rows(messages: Vec<SimpleQueryMessage>) -> Vec<Row> {
    messages
        .into_iter()
        .filter_map(|message| match message {
            SimpleQueryMessage::Row(row) => Some(row),
            _ => None,
        })
        .map(|row| {
            row.columns()
                .iter()
                .enumerate()
                .map(|(idx, column)| {
                    let value = row
                        .get(idx)
                        .map(|text| Value::String(text.to_string()))
                        .unwrap_or(Value::Null);
                    (column.name().to_string(), value)
                })
                .collect()
        })
        .collect()
}

fn get<'a, T>(row: &'a tokio_postgres::Row, idx: usize) -> Result<Option<T>, tokio_postgres::Error>
where
    T: FromSql<'a>,
{
    row.try_get::<_, Option<T>>(idx)
}

fn column_value(
    row: &tokio_postgres::Row,
    idx: usize,
    ty: &Type,
) -> Result<Value, tokio_postgres::Error> {
    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx)?.map(Value::Bool),
        Type::INT2 => get::<i16>(row, idx)?.map(Value::from),
        Type::INT4 => get::<i32>(row, idx)?.map(Value::from),
        Type::INT8 => get::<i64>(row, idx)?.map(Value::from),
        Type::OID => get::<u32>(row, idx)?.map(Value::from),
        Type::FLOAT4 => get::<f32>(row, idx)?.and_then(|f| float(f64::from(f))),
        Type::FLOAT8 => get::<f64>(row, idx)?.and_then(float),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            get::<String>(row, idx)?.map(Value::String)
        }
        Type::JSON | Type::JSONB => get::<Value>(row, idx)?,
        Type::DATE => get::<chrono::NaiveDate>(row, idx)?.map(|d| Value::String(d.to_string())),
        Type::TIMESTAMP => {
            get::<chrono::NaiveDateTime>(row, idx)?.map(|d| Value::String(d.to_string()))
        }
        Type::TIMESTAMPTZ => get::<chrono::DateTime<chrono::Utc>>(row, idx)?
            .map(|d| Value::String(d.to_rfc3339())),
        Type::UUID => get::<uuid::Uuid>(row, idx)?.map(|u| Value::String(u.to_string())),
        // Anything else is surfaced as text when the driver can decode it
        _ => get::<String>(row, idx).ok().flatten().map(Value::String),
    };
    Ok(value.unwrap_or(Value::Null))
}

fn float(f: f64) -> Option<Value> {
    Number::from_f64(f).map(Value::Number)
}
