//! Human-readable result files:
//!
//! ```text
//! RET:
//! 0.2345
//!
//! MATRIX:
//! 800.5000000000 0.0000000000 320.2500000000
//! ...
//! ```
//!
//! Matrices are written with ten decimals, scalars in their shortest
//! round-trip form and text as one double-quoted line with JSON escapes.
//! A section with one number reads back as a scalar, an empty section as an
//! empty matrix. Unquoted sections that do not parse as numbers read back as
//! text.

use crate::{PersistError, ResultValue};
use nalgebra::DMatrix;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub(crate) fn write_text(entries: &[(String, ResultValue)], path: &Path) -> Result<(), PersistError> {
    let mut out = String::new();
    for (key, value) in entries {
        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(PersistError::InvalidValue {
                key: key.clone(),
                reason: "text headers cannot be empty or contain whitespace".to_string(),
            });
        }
        // Writing into a String cannot fail.
        let _ = writeln!(out, "{}:", key.to_uppercase());
        match value {
            ResultValue::Matrix(m) if m.is_empty() => {}
            ResultValue::Text(text) => {
                let _ = writeln!(out, "{}", serde_json::to_string(text)?);
            }
            other => {
                let _ = writeln!(out, "{other}");
            }
        }
        out.push('\n');
    }
    fs::write(path, out)?;
    Ok(())
}

pub(crate) fn read_text(path: &Path) -> Result<Vec<(String, ResultValue)>, PersistError> {
    parse_text(&fs::read_to_string(path)?)
}

fn parse_text(raw: &str) -> Result<Vec<(String, ResultValue)>, PersistError> {
    let mut entries = Vec::new();
    let mut section: Option<(String, usize, Vec<&str>)> = None;

    for (idx, line) in raw.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if let Some((key, start, lines)) = section.take() {
                entries.push((key, parse_section(&lines, start)?));
            }
            continue;
        }
        if let Some((_, _, lines)) = section.as_mut() {
            lines.push(line);
            continue;
        }
        let key = trimmed
            .strip_suffix(':')
            .filter(|k| !k.is_empty() && !k.contains(char::is_whitespace))
            .ok_or_else(|| PersistError::Text {
                line: line_no,
                reason: format!("expected a `KEY:` header, found `{trimmed}`"),
            })?;
        section = Some((key.to_string(), line_no, Vec::new()));
    }
    if let Some((key, start, lines)) = section.take() {
        entries.push((key, parse_section(&lines, start)?));
    }
    Ok(entries)
}

fn parse_section(lines: &[&str], header_line: usize) -> Result<ResultValue, PersistError> {
    if let [line] = lines {
        let quoted = line.trim();
        if quoted.starts_with('"') {
            return serde_json::from_str(quoted)
                .map(ResultValue::Text)
                .map_err(|err| PersistError::Text {
                    line: header_line + 1,
                    reason: format!("bad quoted text: {err}"),
                });
        }
    }
    let numeric: Option<Vec<Vec<f64>>> = lines
        .iter()
        .map(|l| {
            l.split_whitespace()
                .map(|cell| cell.parse::<f64>().ok())
                .collect::<Option<Vec<f64>>>()
        })
        .collect();
    let Some(rows) = numeric else {
        return Ok(ResultValue::Text(lines.join("\n")));
    };
    if let [row] = rows.as_slice() {
        if let [v] = row.as_slice() {
            return Ok(ResultValue::Scalar(*v));
        }
    }
    let ncols = rows.first().map_or(0, Vec::len);
    if let Some(bad) = rows.iter().position(|r| r.len() != ncols) {
        return Err(PersistError::Text {
            line: header_line + bad + 1,
            reason: format!("expected {ncols} values, found {}", rows[bad].len()),
        });
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Ok(ResultValue::Matrix(DMatrix::from_row_slice(
        rows.len(),
        ncols,
        &flat,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_parse_by_shape() {
        let raw = "RET:\n0.25\n\nMATRIX:\n1.0000000000 0.0000000000\n0.0000000000 2.0000000000\n\nNOTE:\nleft camera\n\nRVECS:\n\nSERIAL:\n\"42\"\n\n";
        let entries = parse_text(raw).unwrap();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0], ("RET".to_string(), ResultValue::Scalar(0.25)));
        assert_eq!(
            entries[1].1,
            ResultValue::Matrix(DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 2.0]))
        );
        assert_eq!(entries[2].1, ResultValue::Text("left camera".to_string()));
        assert_eq!(entries[3].1, ResultValue::Matrix(DMatrix::zeros(0, 0)));
        assert_eq!(entries[4].1, ResultValue::Text("42".to_string()));
    }

    #[test]
    fn writer_uses_uppercase_headers_and_fixed_decimals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.txt");
        let entries = vec![
            ("ret".to_string(), ResultValue::Scalar(0.5)),
            (
                "distortion".to_string(),
                ResultValue::Matrix(DMatrix::from_row_slice(1, 2, &[0.1, -0.25])),
            ),
            ("note".to_string(), ResultValue::Text("a\n\nb".to_string())),
        ];
        write_text(&entries, &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "RET:\n0.5\n\nDISTORTION:\n0.1000000000 -0.2500000000\n\nNOTE:\n\"a\\n\\nb\"\n\n"
        );

        let bad_key = vec![("two words".to_string(), ResultValue::Scalar(1.0))];
        assert!(matches!(
            write_text(&bad_key, &path),
            Err(PersistError::InvalidValue { .. })
        ));
    }

    #[test]
    fn ragged_rows_and_stray_lines_fail() {
        assert!(matches!(
            parse_text("M:\n1 2\n3\n"),
            Err(PersistError::Text { line: 3, .. })
        ));
        assert!(matches!(
            parse_text("just some words\n"),
            Err(PersistError::Text { line: 1, .. })
        ));
        assert!(matches!(
            parse_text("NOTE:\n\"unterminated\n"),
            Err(PersistError::Text { line: 2, .. })
        ));
    }
}
