//! Conversion of MySQL rows into JSON rows.

use dbkit_core::Row;
use mysql_async::Value;
use serde_json::{Number, Value as JsonValue};

/// Convert a MySQL row.
///
/// Text arrives as bytes and is kept as a string; the text protocol also
/// returns numbers that way.
pub fn row_to_json(row: &mysql_async::Row) -> Row {
    row.columns_ref()
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let value = row.as_ref(i).map(value_to_json).unwrap_or(JsonValue::Null);
            (column.name_str().to_string(), value)
        })
        .collect()
}

/// Convert a single value.
pub fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::NULL => JsonValue::Null,
        Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => JsonValue::String(s.to_string()),
            Err(_) => JsonValue::String(format!("<binary {} bytes>", bytes.len())),
        },
        Value::Int(i) => JsonValue::Number((*i).into()),
        Value::UInt(u) => JsonValue::Number((*u).into()),
        Value::Float(f) => float(f64::from(*f)),
        Value::Double(d) => float(*d),
        Value::Date(year, month, day, hour, minute, second, micro) => JsonValue::String(format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:06}",
            year, month, day, hour, minute, second, micro
        )),
        Value::Time(is_neg, days, hours, minutes, seconds, micro) => {
            let sign = if *is_neg { "-" } else { "" };
            JsonValue::String(format!(
                "{}{}:{:02}:{:02}.{:06}",
                sign,
                days * 24 + u32::from(*hours),
                minutes,
                seconds,
                micro
            ))
        }
    }
}

fn float(f: f64) -> JsonValue {
    Number::from_f64(f)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}
