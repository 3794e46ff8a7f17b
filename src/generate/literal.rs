//! Python literal rendering for context values.
//!
//! Every value that reaches a generated script goes through [`serialize`]; all
//! quoting and escaping rules live here.

use crate::value::Value;
use std::fmt;

/// Target form of an embedded value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralForm {
    /// Bare display text, safe inside comments and prose
    Text,
    /// Double-quoted string literal
    String,
    /// Structured literal (dict/list/str/number), optionally pretty-printed
    Json { indent: Option<usize> },
}

impl LiteralForm {
    pub fn name(&self) -> &'static str {
        match self {
            LiteralForm::Text => "text",
            LiteralForm::String => "str",
            LiteralForm::Json { .. } => "tojson",
        }
    }
}

/// A value that has no literal representation in the requested form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedValue {
    pub type_name: &'static str,
    /// Location inside the serialized value, empty for the value itself
    pub path: String,
    pub form: &'static str,
}

impl fmt::Display for UnsupportedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{} value cannot be rendered as {}", self.type_name, self.form)
        } else {
            write!(f, "{} value at {} cannot be rendered as {}", self.type_name, self.path, self.form)
        }
    }
}

/// Render `value` as source text in the requested form.
pub fn serialize(value: &Value, form: LiteralForm) -> Result<String, UnsupportedValue> {
    let mut out = String::new();
    match form {
        LiteralForm::Text => write_text(value, &mut out)?,
        LiteralForm::String => {
            let text = display_scalar(value).ok_or_else(|| unsupported(value, "", form))?;
            write_quoted(&text, &mut out);
        }
        LiteralForm::Json { indent } => {
            let mut writer = JsonWriter { out: &mut out, indent, path: String::new() };
            writer.write(value, 0)?;
        }
    }
    Ok(out)
}

/// Double-quoted literal, valid both as a Python and as a JSON string.
fn write_quoted(text: &str, out: &mut String) {
    out.push('"');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn write_text(value: &Value, out: &mut String) -> Result<(), UnsupportedValue> {
    let text = display_scalar(value).ok_or_else(|| unsupported(value, "", LiteralForm::Text))?;
    let mut previous_blank = false;
    for ch in text.chars() {
        if ch.is_control() {
            // Collapse runs like "\r\n" into one space
            if !previous_blank {
                out.push(' ');
            }
            previous_blank = true;
        } else {
            out.push(ch);
            previous_blank = false;
        }
    }
    Ok(())
}

/// Display text of scalars; `None` for containers and blobs.
fn display_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some("None".to_string()),
        Value::Bool(true) => Some("True".to_string()),
        Value::Bool(false) => Some("False".to_string()),
        Value::Int(n) => Some(n.to_string()),
        Value::UInt(n) => Some(n.to_string()),
        Value::Float(f) if f.is_finite() => Some(float_literal(*f)),
        Value::String(s) => Some(s.clone()),
        Value::Geometry(g) => Some(g.to_wkt()),
        Value::Float(_) | Value::List(_) | Value::Map(_) | Value::Bytes(_) => None,
    }
}

/// Float text that Python reads back as a float (`1.0`, not `1`).
fn float_literal(f: f64) -> String {
    format!("{:?}", f)
}

fn unsupported(value: &Value, path: &str, form: LiteralForm) -> UnsupportedValue {
    let type_name = match value {
        Value::Float(_) => "non-finite float",
        other => other.type_name(),
    };
    UnsupportedValue { type_name, path: path.to_string(), form: form.name() }
}

struct JsonWriter<'a> {
    out: &'a mut String,
    indent: Option<usize>,
    path: String,
}

impl JsonWriter<'_> {
    fn write(&mut self, value: &Value, depth: usize) -> Result<(), UnsupportedValue> {
        match value {
            Value::Null => self.out.push_str("None"),
            Value::Bool(true) => self.out.push_str("True"),
            Value::Bool(false) => self.out.push_str("False"),
            Value::Int(n) => self.out.push_str(&n.to_string()),
            Value::UInt(n) => self.out.push_str(&n.to_string()),
            Value::Float(f) if f.is_finite() => self.out.push_str(&float_literal(*f)),
            Value::String(s) => write_quoted(s, self.out),
            Value::Geometry(g) => write_quoted(&g.to_wkt(), self.out),
            Value::List(items) => self.write_list(items, depth)?,
            Value::Map(map) => {
                if map.is_empty() {
                    self.out.push_str("{}");
                    return Ok(());
                }
                self.out.push('{');
                for (i, (key, item)) in map.iter().enumerate() {
                    self.separator(i, depth + 1);
                    write_quoted(key, self.out);
                    self.out.push_str(": ");
                    let saved = self.path.len();
                    self.path.push('.');
                    self.path.push_str(key);
                    self.write(item, depth + 1)?;
                    self.path.truncate(saved);
                }
                self.close(depth);
                self.out.push('}');
            }
            Value::Float(_) | Value::Bytes(_) => {
                let path = self.path.trim_start_matches('.').to_string();
                return Err(unsupported(value, &path, LiteralForm::Json { indent: self.indent }));
            }
        }
        Ok(())
    }

    fn write_list(&mut self, items: &[Value], depth: usize) -> Result<(), UnsupportedValue> {
        if items.is_empty() {
            self.out.push_str("[]");
            return Ok(());
        }
        self.out.push('[');
        for (i, item) in items.iter().enumerate() {
            self.separator(i, depth + 1);
            let saved = self.path.len();
            self.path.push_str(&format!("[{}]", i));
            self.write(item, depth + 1)?;
            self.path.truncate(saved);
        }
        self.close(depth);
        self.out.push(']');
        Ok(())
    }

    /// Emit what goes before the `index`-th element of a container.
    fn separator(&mut self, index: usize, depth: usize) {
        if index > 0 {
            self.out.push(',');
        }
        match self.indent {
            Some(width) => {
                self.out.push('\n');
                self.out.push_str(&" ".repeat(width * depth));
            }
            None if index > 0 => self.out.push(' '),
            None => {}
        }
    }

    fn close(&mut self, depth: usize) {
        if let Some(width) = self.indent {
            self.out.push('\n');
            self.out.push_str(&" ".repeat(width * depth));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Geometry, Mapping};

    fn compact(value: &Value) -> String {
        serialize(value, LiteralForm::Json { indent: None }).unwrap()
    }

    #[test]
    fn test_string_escapes() {
        let value = Value::from("He said \"go\"\\now\n");
        let literal = serialize(&value, LiteralForm::String).unwrap();
        assert_eq!(literal, r#""He said \"go\"\\now\n""#);
    }

    #[test]
    fn test_string_control_characters() {
        let literal = serialize(&Value::from("a\u{1}b\u{7f}"), LiteralForm::String).unwrap();
        assert_eq!(literal, r#""a\u0001b\u007f""#);
    }

    #[test]
    fn test_string_round_trips_through_json_parser() {
        for original in ["plain", "quote \" and \\ backslash", "tab\tnewline\n\r", "unicode é 👋", "\u{0}"] {
            let literal = serialize(&Value::from(original), LiteralForm::String).unwrap();
            let parsed: String = serde_json::from_str(&literal).unwrap();
            assert_eq!(parsed, original);
        }
    }

    #[test]
    fn test_string_form_quotes_scalars() {
        assert_eq!(serialize(&Value::Int(42), LiteralForm::String).unwrap(), "\"42\"");
        assert_eq!(serialize(&Value::Float(2.5), LiteralForm::String).unwrap(), "\"2.5\"");
    }

    #[test]
    fn test_string_form_rejects_containers() {
        let err = serialize(&Value::List(vec![]), LiteralForm::String).unwrap_err();
        assert_eq!(err.type_name, "sequence");
        assert_eq!(err.form, "str");
    }

    #[test]
    fn test_text_collapses_line_breaks() {
        let text = serialize(&Value::from("line one\r\nline two\n\nthree"), LiteralForm::Text).unwrap();
        assert_eq!(text, "line one line two three");
    }

    #[test]
    fn test_json_compact() {
        let mut inner = Mapping::new();
        inner.insert("b", 1i64);
        inner.insert("a", Value::List(vec![Value::Bool(true), Value::Null, Value::Float(1.0)]));
        let mut map = Mapping::new();
        map.insert("z", "x\"y");
        map.insert("inner", inner);

        assert_eq!(
            compact(&Value::Map(map)),
            r#"{"z": "x\"y", "inner": {"b": 1, "a": [True, None, 1.0]}}"#
        );
    }

    #[test]
    fn test_json_indented() {
        let mut map = Mapping::new();
        map.insert("productType", "S2_MSI_L1C");
        map.insert("bands", Value::from(vec!["B01", "B02"]));
        map.insert("extra", Mapping::new());

        let literal = serialize(&Value::Map(map), LiteralForm::Json { indent: Some(4) }).unwrap();
        assert_eq!(
            literal,
            "{\n    \"productType\": \"S2_MSI_L1C\",\n    \"bands\": [\n        \"B01\",\n        \"B02\"\n    ],\n    \"extra\": {}\n}"
        );
    }

    #[test]
    fn test_json_empty_containers() {
        assert_eq!(compact(&Value::List(vec![])), "[]");
        assert_eq!(compact(&Value::Map(Mapping::new())), "{}");
    }

    #[test]
    fn test_json_geometry_is_quoted_wkt() {
        let geometry = Geometry::Polygon {
            exterior: vec![(1.0, 43.0), (2.0, 43.0), (2.0, 44.0), (1.0, 43.0)],
            holes: vec![],
        };
        assert_eq!(compact(&Value::Geometry(geometry)), "\"POLYGON ((1 43, 2 43, 2 44, 1 43))\"");
    }

    #[test]
    fn test_json_reports_path_of_unsupported_value() {
        let mut item = Mapping::new();
        item.insert("productType", "P1");
        item.insert("thumbnail", Value::Bytes(vec![0, 1, 2]));
        let value = Value::List(vec![Value::Map(Mapping::new()), Value::Map(item)]);

        let err = serialize(&value, LiteralForm::Json { indent: None }).unwrap_err();
        assert_eq!(err.type_name, "binary");
        assert_eq!(err.path, "[1].thumbnail");
    }

    #[test]
    fn test_non_finite_float_is_unsupported() {
        let err = serialize(&Value::Float(f64::NAN), LiteralForm::Json { indent: None }).unwrap_err();
        assert_eq!(err.type_name, "non-finite float");
        assert!(serialize(&Value::Float(f64::INFINITY), LiteralForm::Text).is_err());
    }

    #[test]
    fn test_integer_above_i64_keeps_its_digits() {
        let value = Value::from(serde_json::json!({"orbit": 18446744073709551615u64}));
        assert_eq!(compact(&value), "{\"orbit\": 18446744073709551615}");
        assert_eq!(serialize(&Value::UInt(u64::MAX), LiteralForm::String).unwrap(), "\"18446744073709551615\"");
    }
}
