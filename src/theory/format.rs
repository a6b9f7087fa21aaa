//! Display names for theory data rows.
use std::fmt::Write;

use crate::metadata::{ArgValue, ParameterInfo};
use crate::utils::{escape_literal, extract_last_segment, truncate_chars};

pub const MAX_STRING_LENGTH: usize = 50;
pub const MAX_ARRAY_ITEMS: usize = 5;
pub const MAX_DEPTH: usize = 3;

const ELLIPSIS: &str = "...";
const MISSING: &str = "???";

/// Formats `base(name: value, ...)`. Parameters without a value render as
/// `name: ???`, surplus values as `???: value`. A parameterless method with
/// an empty row keeps the bare base.
pub fn format_arguments(base: &str, parameters: &[ParameterInfo], values: &[ArgValue]) -> String {
    if parameters.is_empty() && values.is_empty() {
        return base.to_string();
    }

    let count = parameters.len().max(values.len());
    let mut out = String::with_capacity(base.len() + 16 * count);
    out.push_str(base);
    out.push('(');
    for i in 0..count {
        if i > 0 {
            out.push_str(", ");
        }
        let name = parameters.get(i).map_or(MISSING, |p| p.name.as_str());
        out.push_str(name);
        out.push_str(": ");
        match values.get(i) {
            Some(value) => write_value(&mut out, value, 1),
            None => out.push_str(MISSING),
        }
    }
    out.push(')');
    out
}

pub fn format_value(value: &ArgValue) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 1);
    out
}

fn write_value(out: &mut String, value: &ArgValue, depth: usize) {
    match value {
        ArgValue::Null => out.push_str("null"),
        ArgValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        ArgValue::Int(i) => {
            let _ = write!(out, "{i}");
        }
        ArgValue::Float(f) => {
            let _ = write!(out, "{f:?}");
        }
        ArgValue::String(s) => {
            let (head, truncated) = truncate_chars(s, MAX_STRING_LENGTH);
            out.push('"');
            out.push_str(&escape_literal(head));
            out.push('"');
            if truncated {
                out.push_str(ELLIPSIS);
            }
        }
        ArgValue::Enum { variant, .. } => out.push_str(variant),
        ArgValue::Array(items) => {
            if depth > MAX_DEPTH {
                out.push_str("[...]");
                return;
            }
            out.push('[');
            for (i, item) in items.iter().take(MAX_ARRAY_ITEMS).enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item, depth + 1);
            }
            if items.len() > MAX_ARRAY_ITEMS {
                out.push_str(", ");
                out.push_str(ELLIPSIS);
            }
            out.push(']');
        }
        ArgValue::Object { type_name, fields } => {
            out.push_str(&extract_last_segment(type_name));
            if fields.is_empty() || depth > MAX_DEPTH {
                out.push_str(" { ... }");
                return;
            }
            out.push_str(" { ");
            for (i, (name, field)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(name);
                out.push_str(" = ");
                write_value(out, field, depth + 1);
            }
            out.push_str(" }");
        }
    }
}
