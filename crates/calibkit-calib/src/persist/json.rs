use crate::{PersistError, ResultValue};
use nalgebra::DMatrix;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::fs;
use std::path::Path;

pub(crate) fn write_json(entries: &[(String, ResultValue)], path: &Path) -> Result<(), PersistError> {
    let mut object = Map::new();
    for (key, value) in entries {
        object.insert(key.clone(), to_json(key, value)?);
    }
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    Value::Object(object).serialize(&mut ser)?;
    fs::write(path, buf)?;
    Ok(())
}

pub(crate) fn read_json(path: &Path) -> Result<Vec<(String, ResultValue)>, PersistError> {
    let raw = fs::read_to_string(path)?;
    let Value::Object(object) = serde_json::from_str::<Value>(&raw)? else {
        return Err(invalid("<root>", "expected a JSON object"));
    };
    object
        .into_iter()
        .map(|(key, value)| {
            let parsed = from_json(&key, value)?;
            Ok((key, parsed))
        })
        .collect()
}

fn number(key: &str, v: f64) -> Result<Value, PersistError> {
    Number::from_f64(v)
        .map(Value::Number)
        .ok_or_else(|| invalid(key, &format!("{v} cannot be stored in JSON")))
}

fn to_json(key: &str, value: &ResultValue) -> Result<Value, PersistError> {
    Ok(match value {
        ResultValue::Scalar(v) => number(key, *v)?,
        ResultValue::Text(s) => Value::String(s.clone()),
        ResultValue::Matrix(m) => Value::Array(
            m.row_iter()
                .map(|row| {
                    row.iter()
                        .map(|v| number(key, *v))
                        .collect::<Result<Vec<_>, _>>()
                        .map(Value::Array)
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
    })
}

fn from_json(key: &str, value: Value) -> Result<ResultValue, PersistError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(ResultValue::Scalar)
            .ok_or_else(|| invalid(key, "number out of range")),
        Value::String(s) => Ok(ResultValue::Text(s)),
        Value::Array(items) => {
            let rows: Vec<Vec<f64>> = if items.iter().all(Value::is_number) {
                // 1-D list: one row.
                if items.is_empty() {
                    Vec::new()
                } else {
                    vec![flatten_row(key, &items)?]
                }
            } else {
                items
                    .iter()
                    .map(|row| match row {
                        Value::Array(cells) => flatten_row(key, cells),
                        _ => Err(invalid(key, "mixed scalars and lists")),
                    })
                    .collect::<Result<_, _>>()?
            };
            let ncols = rows.first().map_or(0, Vec::len);
            if rows.iter().any(|r| r.len() != ncols) {
                return Err(invalid(key, "ragged rows"));
            }
            let flat: Vec<f64> = rows.iter().flatten().copied().collect();
            Ok(ResultValue::Matrix(DMatrix::from_row_slice(
                rows.len(),
                ncols,
                &flat,
            )))
        }
        _ => Err(invalid(key, "expected a number, string or nested list")),
    }
}

/// Numbers of one row; single-element lists (`[[x], [y], [z]]`) count as
/// numbers.
fn flatten_row(key: &str, cells: &[Value]) -> Result<Vec<f64>, PersistError> {
    cells
        .iter()
        .map(|cell| match cell {
            Value::Number(n) => n.as_f64(),
            Value::Array(inner) if inner.len() == 1 => inner[0].as_f64(),
            _ => None,
        })
        .map(|v| v.ok_or_else(|| invalid(key, "expected numbers")))
        .collect()
}

fn invalid(key: &str, reason: &str) -> PersistError {
    PersistError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_lists_become_matrices() {
        let value = serde_json::json!([[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        let ResultValue::Matrix(m) = from_json("k", value).unwrap() else {
            panic!("expected matrix");
        };
        assert_eq!(m.shape(), (3, 2));
        assert_eq!(m[(2, 0)], 5.0);

        let flat = from_json("k", serde_json::json!([0.1, 0.2, 0.3])).unwrap();
        assert_eq!(
            flat,
            ResultValue::Matrix(DMatrix::from_row_slice(1, 3, &[0.1, 0.2, 0.3]))
        );

        // Column vectors as written by NumPy for OpenCV rvecs.
        let column = from_json("k", serde_json::json!([[[0.1], [0.2], [0.3]]])).unwrap();
        assert_eq!(
            column,
            ResultValue::Matrix(DMatrix::from_row_slice(1, 3, &[0.1, 0.2, 0.3]))
        );
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(from_json("k", serde_json::json!([[1.0, 2.0], [3.0]])).is_err());
        assert!(from_json("k", serde_json::json!([1.0, [2.0]])).is_err());
        assert!(from_json("k", serde_json::json!(true)).is_err());
        assert!(to_json("k", &ResultValue::Scalar(f64::NAN)).is_err());
    }
}
