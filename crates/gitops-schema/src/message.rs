//! # Violation Messages
//!
//! Messages follow the wording the hook has always printed, with values
//! rendered as literals (`'text'`, `True`, `None`, `['a', 'b']`). The
//! wording is a contract: the ignore table matches messages byte for byte,
//! and `is too long` messages are enriched downstream.
//!
//! Values that a message needs (the pattern, the limit, the enum) are read
//! from the schema node that owns the failing keyword. When that node
//! cannot be located, the `jsonschema` message is used as is.

use jsonschema::error::ValidationErrorKind;
use jsonschema::ValidationError;
use serde_json::Value;

/// Render `value` as a message literal: single-quoted strings, `True`,
/// `False`, `None`, `[..]` lists and `{..}` mappings.
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote_str(s),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(literal).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", quote_str(k), literal(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

/// Quote a string: single quotes unless the text contains a single quote
/// and no double quote.
pub fn quote_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn joined_reprs<'a>(items: impl IntoIterator<Item = &'a str>) -> String {
    items
        .into_iter()
        .map(quote_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render the message for one `jsonschema` error.
///
/// `owner` is the schema node holding the failing keyword.
pub fn render(error: &ValidationError<'_>, owner: Option<&Value>) -> String {
    render_kind(&error.kind, &error.instance, owner).unwrap_or_else(|| error.to_string())
}

fn render_kind(kind: &ValidationErrorKind, instance: &Value, owner: Option<&Value>) -> Option<String> {
    let keyword = |name: &str| owner.and_then(|node| node.get(name));
    let found = literal(instance);

    let message = match kind {
        ValidationErrorKind::MaxLength { .. } | ValidationErrorKind::MaxItems { .. } => {
            format!("{found} is too long")
        }
        ValidationErrorKind::MinLength { .. } | ValidationErrorKind::MinItems { .. } => {
            format!("{found} is too short")
        }
        ValidationErrorKind::Pattern { .. } => {
            format!("{found} does not match {}", literal(keyword("pattern")?))
        }
        ValidationErrorKind::Required { property } => {
            format!("{} is a required property", literal(property))
        }
        ValidationErrorKind::Enum { .. } => {
            format!("{found} is not one of {}", literal(keyword("enum")?))
        }
        ValidationErrorKind::Constant { .. } => {
            format!("{} was expected", literal(keyword("const")?))
        }
        ValidationErrorKind::Type { .. } => {
            let types = match keyword("type")? {
                Value::String(t) => quote_str(t),
                Value::Array(ts) => joined_reprs(ts.iter().filter_map(Value::as_str)),
                _ => return None,
            };
            format!("{found} is not of type {types}")
        }
        ValidationErrorKind::Minimum { .. } => {
            format!("{found} is less than the minimum of {}", literal(keyword("minimum")?))
        }
        ValidationErrorKind::Maximum { .. } => {
            format!("{found} is greater than the maximum of {}", literal(keyword("maximum")?))
        }
        ValidationErrorKind::ExclusiveMinimum { .. } => format!(
            "{found} is less than or equal to the minimum of {}",
            literal(keyword("exclusiveMinimum")?)
        ),
        ValidationErrorKind::ExclusiveMaximum { .. } => format!(
            "{found} is greater than or equal to the maximum of {}",
            literal(keyword("exclusiveMaximum")?)
        ),
        ValidationErrorKind::AdditionalProperties { unexpected } => {
            additional_properties(unexpected, keyword("patternProperties"))
        }
        _ => return None,
    };
    Some(message)
}

fn additional_properties(unexpected: &[String], pattern_properties: Option<&Value>) -> String {
    match pattern_properties.and_then(Value::as_object) {
        Some(patterns) if !patterns.is_empty() => {
            let mut extras: Vec<&str> = unexpected.iter().map(String::as_str).collect();
            extras.sort_unstable();
            let mut regexes: Vec<&str> = patterns.keys().map(String::as_str).collect();
            regexes.sort_unstable();
            let verb = if extras.len() == 1 { "does" } else { "do" };
            format!(
                "{} {verb} not match any of the regexes: {}",
                joined_reprs(extras),
                joined_reprs(regexes)
            )
        }
        _ => {
            let verb = if unexpected.len() == 1 { "was" } else { "were" };
            format!(
                "Additional properties are not allowed ({} {verb} unexpected)",
                joined_reprs(unexpected.iter().map(String::as_str))
            )
        }
    }
}
