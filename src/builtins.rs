// File: src/builtins.rs
//
// Built-in filters available to every template.
// Filters receive the piped value plus the resolved arguments and return a new value.

use crate::errors::{Result, TemplateError};
use crate::render::Value;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

/// A filter implementation
pub type FilterFn = Arc<dyn Fn(&Value, &[Value]) -> Result<Value> + Send + Sync>;

static BUILTIN_FILTERS: Lazy<HashMap<&'static str, FilterFn>> = Lazy::new(|| {
    let mut filters: HashMap<&'static str, FilterFn> = HashMap::new();
    filters.insert("default", Arc::new(default));
    filters.insert("upper", Arc::new(upper));
    filters.insert("lower", Arc::new(lower));
    filters.insert("capitalize", Arc::new(capitalize));
    filters.insert("join", Arc::new(join));
    filters.insert("count", Arc::new(count));
    filters
});

/// The built-in filter table, keyed by filter name
pub fn builtin_filters() -> HashMap<String, FilterFn> {
    BUILTIN_FILTERS.iter().map(|(name, filter)| (name.to_string(), filter.clone())).collect()
}

fn expect_args(name: &str, args: &[Value], count: usize) -> Result<()> {
    if args.len() != count {
        return Err(TemplateError::resolution(format!(
            "'{}' filter expects {} argument(s), got {}",
            name,
            count,
            args.len()
        )));
    }
    Ok(())
}

/// `value|default:fallback` yields fallback for null or empty strings
fn default(value: &Value, args: &[Value]) -> Result<Value> {
    expect_args("default", args, 1)?;
    match value {
        Value::Null => Ok(args[0].clone()),
        Value::Str(s) if s.is_empty() => Ok(args[0].clone()),
        other => Ok(other.clone()),
    }
}

fn upper(value: &Value, args: &[Value]) -> Result<Value> {
    expect_args("upper", args, 0)?;
    Ok(Value::str(value.to_string().to_uppercase()))
}

fn lower(value: &Value, args: &[Value]) -> Result<Value> {
    expect_args("lower", args, 0)?;
    Ok(Value::str(value.to_string().to_lowercase()))
}

fn capitalize(value: &Value, args: &[Value]) -> Result<Value> {
    expect_args("capitalize", args, 0)?;
    let text = value.to_string();
    let mut chars = text.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    Ok(Value::str(capitalized))
}

/// `items|join:", "` concatenates array elements
fn join(value: &Value, args: &[Value]) -> Result<Value> {
    if args.len() > 1 {
        return Err(TemplateError::resolution("'join' filter expects at most 1 argument"));
    }
    let separator = args.first().map(|sep| sep.to_string()).unwrap_or_default();
    match value {
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(|item| item.to_string()).collect();
            Ok(Value::str(parts.join(&separator)))
        }
        other => Ok(other.clone()),
    }
}

fn count(value: &Value, args: &[Value]) -> Result<Value> {
    expect_args("count", args, 0)?;
    Ok(value.len().map(Value::from).unwrap_or(Value::Null))
}
