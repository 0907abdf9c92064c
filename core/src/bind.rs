//! Placeholder compilation.
//!
//! Statements leave the preparer with `:name` markers (or, for raw
//! passthrough, bare `?` markers). Before a driver can run them the markers
//! must become the dialect's native form and the values must be laid out in
//! bind order. [`compile`] does both.
//!
//! Markers inside single-quoted strings, double-quoted or back-quoted
//! identifiers, `--` and `/* */` comments are left alone, as is the
//! PostgreSQL cast operator `::`.
//!
//! ```
//! use sqlmill_core::bind::compile;
//! use sqlmill_core::{Bindings, Params, PlaceholderStyle, Value};
//!
//! let mut params = Params::new();
//! params.insert("id".to_string(), Value::Int(7));
//! let compiled = compile(
//!     "SELECT * FROM u WHERE id = :id OR parent = :id",
//!     &Bindings::Named(params),
//!     PlaceholderStyle::Dollar,
//! )
//! .unwrap();
//! assert_eq!(compiled.sql, "SELECT * FROM u WHERE id = $1 OR parent = $1");
//! assert_eq!(compiled.values, vec![Value::Int(7)]);
//! ```

use std::collections::HashMap;

use crate::database::{Bindings, DriverError, PlaceholderStyle};
use crate::value::{Params, Value};

/// SQL in driver-native placeholder form plus the values in bind order.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub sql: String,
    pub values: Vec<Value>,
}

enum Marker<'a> {
    Question,
    Named(&'a str),
}

/// Rewrites `sql` for a driver using `style`.
///
/// # Errors
///
/// Fails when a `:name` marker has no value in named bindings.
pub fn compile(
    sql: &str,
    bindings: &Bindings,
    style: PlaceholderStyle,
) -> Result<Compiled, DriverError> {
    match bindings {
        Bindings::Named(params) => compile_named(sql, params, style),
        Bindings::Positional(values) => {
            if values.is_empty() || style == PlaceholderStyle::Question {
                return Ok(Compiled {
                    sql: sql.to_string(),
                    values: values.clone(),
                });
            }
            let mut position = 0usize;
            let sql = rewrite(sql, |marker| {
                Ok(match marker {
                    Marker::Question => {
                        position += 1;
                        Some(format!("${position}"))
                    }
                    Marker::Named(_) => None,
                })
            })?;
            Ok(Compiled {
                sql,
                values: values.clone(),
            })
        }
    }
}

fn compile_named(
    sql: &str,
    params: &Params,
    style: PlaceholderStyle,
) -> Result<Compiled, DriverError> {
    let mut values = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    let sql = rewrite(sql, |marker| {
        let Marker::Named(name) = marker else {
            return Ok(None);
        };
        let value = lookup(params, name)
            .ok_or_else(|| DriverError::other(format!("missing parameter '{name}'")))?;
        match style {
            PlaceholderStyle::Question => {
                values.push(value.clone());
                Ok(Some("?".to_string()))
            }
            PlaceholderStyle::Dollar => {
                let position = match positions.get(name) {
                    Some(position) => *position,
                    None => {
                        values.push(value.clone());
                        positions.insert(name, values.len());
                        values.len()
                    }
                };
                Ok(Some(format!("${position}")))
            }
        }
    })?;

    Ok(Compiled { sql, values })
}

fn lookup<'p>(params: &'p Params, name: &str) -> Option<&'p Value> {
    params
        .get(name)
        .or_else(|| params.get(&name.to_lowercase()))
}

/// Walks `sql`, handing every placeholder marker outside quotes and
/// comments to `replace`. `Ok(None)` keeps the marker as written.
fn rewrite<'a, F>(sql: &'a str, mut replace: F) -> Result<String, DriverError>
where
    F: FnMut(Marker<'a>) -> Result<Option<String>, DriverError>,
{
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        let next = bytes.get(i + 1).copied();
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => i = skip_quoted(bytes, i, quote),
            b'-' if next == Some(b'-') => i = skip_until(bytes, i, b"\n"),
            b'/' if next == Some(b'*') => i = skip_until(bytes, i + 2, b"*/"),
            b':' if next == Some(b':') => i += 2,
            b':' if next.is_some_and(|c| c.is_ascii_alphabetic() || c == b'_') => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                if let Some(replacement) = replace(Marker::Named(&sql[start..end]))? {
                    out.push_str(&sql[last..i]);
                    out.push_str(&replacement);
                    last = end;
                }
                i = end;
            }
            b'?' => {
                if let Some(replacement) = replace(Marker::Question)? {
                    out.push_str(&sql[last..i]);
                    out.push_str(&replacement);
                    last = i + 1;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }

    out.push_str(&sql[last..]);
    Ok(out)
}

/// Index just past the closing quote; a doubled quote is an escape.
fn skip_quoted(bytes: &[u8], open: usize, quote: u8) -> usize {
    let mut j = open + 1;
    while j < bytes.len() {
        if bytes[j] == quote {
            if bytes.get(j + 1) == Some(&quote) {
                j += 2;
                continue;
            }
            return j + 1;
        }
        j += 1;
    }
    bytes.len()
}

/// Index just past the first occurrence of `terminator` at or after `from`.
fn skip_until(bytes: &[u8], from: usize, terminator: &[u8]) -> usize {
    bytes[from.min(bytes.len())..]
        .windows(terminator.len())
        .position(|w| w == terminator)
        .map_or(bytes.len(), |pos| from + pos + terminator.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(pairs: &[(&str, Value)]) -> Bindings {
        Bindings::Named(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_named_to_question_repeats_values() {
        let bindings = named(&[("id", Value::Int(1)), ("name", Value::from("a"))]);
        let compiled = compile(
            "SELECT :name, :id, :name",
            &bindings,
            PlaceholderStyle::Question,
        )
        .unwrap();
        assert_eq!(compiled.sql, "SELECT ?, ?, ?");
        assert_eq!(
            compiled.values,
            vec![Value::from("a"), Value::Int(1), Value::from("a")]
        );
    }

    #[test]
    fn test_named_to_dollar_reuses_positions() {
        let bindings = named(&[("a", Value::Int(1)), ("b", Value::Int(2))]);
        let compiled =
            compile("VALUES (:b, :a, :b)", &bindings, PlaceholderStyle::Dollar).unwrap();
        assert_eq!(compiled.sql, "VALUES ($1, $2, $1)");
        assert_eq!(compiled.values, vec![Value::Int(2), Value::Int(1)]);
    }

    #[test]
    fn test_quotes_comments_and_casts_are_skipped() {
        let bindings = named(&[("id", Value::Int(1))]);
        let sql = "SELECT ':x', \":y\", a::text -- :z\n/* :w */ FROM t WHERE id = :id";
        let compiled = compile(sql, &bindings, PlaceholderStyle::Question).unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT ':x', \":y\", a::text -- :z\n/* :w */ FROM t WHERE id = ?"
        );
    }

    #[test]
    fn test_escaped_quote_stays_inside_string() {
        let bindings = named(&[("id", Value::Int(1))]);
        let compiled = compile(
            "SELECT 'it''s :not' WHERE id = :id",
            &bindings,
            PlaceholderStyle::Question,
        )
        .unwrap();
        assert_eq!(compiled.sql, "SELECT 'it''s :not' WHERE id = ?");
    }

    #[test]
    fn test_missing_parameter_is_reported() {
        let err = compile(
            "SELECT :missing",
            &named(&[]),
            PlaceholderStyle::Question,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "missing parameter 'missing'");
    }

    #[test]
    fn test_parameter_lookup_is_case_insensitive() {
        let bindings = named(&[("firstname", Value::from("a"))]);
        let compiled =
            compile("SELECT :FirstName", &bindings, PlaceholderStyle::Question).unwrap();
        assert_eq!(compiled.values, vec![Value::from("a")]);
    }

    #[test]
    fn test_positional_passthrough() {
        let bindings = Bindings::Positional(vec![Value::Int(1), Value::Int(2)]);
        let question = compile("a = ? AND b = ?", &bindings, PlaceholderStyle::Question).unwrap();
        assert_eq!(question.sql, "a = ? AND b = ?");

        let dollar = compile("a = ? AND b = '?' AND c = ?", &bindings, PlaceholderStyle::Dollar)
            .unwrap();
        assert_eq!(dollar.sql, "a = $1 AND b = '?' AND c = $2");
    }

    #[test]
    fn test_empty_positional_is_verbatim() {
        let sql = "CREATE TABLE a(id INT);\nSELECT data ? 'key' FROM b;";
        let compiled = compile(sql, &Bindings::none(), PlaceholderStyle::Dollar).unwrap();
        assert_eq!(compiled.sql, sql);
        assert!(compiled.values.is_empty());
    }
}
