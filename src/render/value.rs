// File: src/render/value.rs
//
// Runtime values seen by templates.
// Every piece of data entering a render is converted once into a `Value`;
// structured data becomes a `Record` whose fields are enumerated by the
// type that owns the schema (via `Fields` or serde), never by reflection.

use crate::errors::{Result, TemplateError};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Runtime values available to templates
#[derive(Clone, Debug)]
pub enum Value {
    /// Absent value; renders as the empty string
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// String value (reference-counted for cheap cloning)
    Str(Arc<String>),
    /// Ordered sequence
    Array(Arc<Vec<Value>>),
    /// String-keyed associative map, iteration order unspecified
    Dict(Arc<HashMap<String, Value>>),
    /// Integer range, `start..end` or `start..=end`
    Range { start: i64, end: i64, inclusive: bool },
    /// Structured value with ordered fields and an optional supertype
    Record(Arc<Record>),
}

/// A structured value: named type, fields in declaration order and the
/// record of its supertype, if any.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub type_name: String,
    pub fields: Vec<(String, Value)>,
    pub supertype: Option<Arc<Record>>,
}

impl Record {
    pub fn new(type_name: impl Into<String>, fields: Vec<(String, Value)>) -> Self {
        Record { type_name: type_name.into(), fields, supertype: None }
    }

    pub fn with_supertype(mut self, supertype: Record) -> Self {
        self.supertype = Some(Arc::new(supertype));
        self
    }

    /// Own fields followed by each supertype's fields, nearest ancestor first
    pub fn all_fields(&self) -> Vec<(String, Value)> {
        let mut fields = self.fields.clone();
        let mut current = self.supertype.as_deref();
        while let Some(record) = current {
            fields.extend(record.fields.iter().cloned());
            current = record.supertype.as_deref();
        }
        fields
    }

    /// Look up a field, searching own fields before the supertype chain
    pub fn field(&self, name: &str) -> Option<&Value> {
        let mut current = Some(self);
        while let Some(record) = current {
            if let Some((_, value)) = record.fields.iter().find(|(field, _)| field == name) {
                return Some(value);
            }
            current = record.supertype.as_deref();
        }
        None
    }
}

/// Field enumeration for Rust types exposed to templates as records.
///
/// Implementors list their own fields in declaration order and may point at
/// the value playing the role of their supertype.
///
/// ```ignore
/// struct Base { name: String }
/// struct Child { base: Base, age: i64 }
///
/// impl Fields for Child {
///     fn type_name(&self) -> &str { "Child" }
///     fn fields(&self) -> Vec<(String, Value)> { vec![("age".into(), self.age.into())] }
///     fn supertype(&self) -> Option<&dyn Fields> { Some(&self.base) }
/// }
/// ```
pub trait Fields {
    fn type_name(&self) -> &str;

    fn fields(&self) -> Vec<(String, Value)>;

    fn supertype(&self) -> Option<&dyn Fields> {
        None
    }

    fn to_record(&self) -> Record {
        Record {
            type_name: self.type_name().to_string(),
            fields: self.fields(),
            supertype: self.supertype().map(|parent| Arc::new(parent.to_record())),
        }
    }
}

impl Value {
    /// Helper to create a Str value from anything string-like
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(Arc::new(s.into()))
    }

    /// Helper to create an Array value from a Vec<Value>
    pub fn array(vec: Vec<Value>) -> Self {
        Value::Array(Arc::new(vec))
    }

    /// Helper to create a Dict value from a HashMap<String, Value>
    pub fn dict(map: HashMap<String, Value>) -> Self {
        Value::Dict(Arc::new(map))
    }

    /// Helper to create a Record value from a type implementing `Fields`
    pub fn record<T: Fields + ?Sized>(value: &T) -> Self {
        Value::Record(Arc::new(value.to_record()))
    }

    /// Convert a serializable struct into a Record, preserving field order.
    ///
    /// Flattened members (`#[serde(flatten)]`) land where they are declared,
    /// so a flattened "base" placed last yields subtype-first ordering.
    pub fn record_from_serialize<T: Serialize>(type_name: &str, value: &T) -> Result<Self> {
        let json = serde_json::to_value(value)
            .map_err(|e| TemplateError::resolution(format!("Cannot convert '{}': {}", type_name, e)))?;
        match json {
            serde_json::Value::Object(map) => {
                let fields = map.into_iter().map(|(key, value)| (key, Value::from(value))).collect();
                Ok(Value::Record(Arc::new(Record::new(type_name, fields))))
            }
            other => Ok(Value::from(other)),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Template truthiness: empty collections, zero and null are false
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Dict(map) => !map.is_empty(),
            Value::Range { .. } => self.len().unwrap_or(0) > 0,
            Value::Record(_) => true,
        }
    }

    /// Number of elements for sized values
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::Array(items) => Some(items.len()),
            Value::Dict(map) => Some(map.len()),
            Value::Range { start, end, inclusive } => {
                let upper = if *inclusive { end.saturating_add(1) } else { *end };
                Some(upper.saturating_sub(*start).max(0) as usize)
            }
            Value::Record(record) => Some(record.all_fields().len()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Ordering used by comparison operators; None when incomparable
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.as_str().cmp(b.as_str())),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }

    /// Membership test used by the `in` operator
    pub fn contains(&self, needle: &Value) -> bool {
        match self {
            Value::Array(items) => items.iter().any(|item| item == needle),
            Value::Dict(map) => needle.as_str().map(|key| map.contains_key(key)).unwrap_or(false),
            Value::Str(haystack) => needle.as_str().map(|s| haystack.contains(s)).unwrap_or(false),
            Value::Range { start, end, inclusive } => match needle {
                Value::Int(n) => *n >= *start && if *inclusive { *n <= *end } else { *n < *end },
                _ => false,
            },
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (
                Value::Range { start: s1, end: e1, inclusive: i1 },
                Value::Range { start: s2, end: e2, inclusive: i2 },
            ) => s1 == s2 && e1 == e2 && i1 == i2,
            (Value::Record(a), Value::Record(b)) => a == b,
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

fn write_nested(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Str(s) => write!(f, "\"{}\"", s),
        other => write!(f, "{}", other),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write_nested(f, item)?;
                }
                write!(f, "]")
            }
            Value::Dict(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                write!(f, "[")?;
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{}\": ", key)?;
                    write_nested(f, &map[*key])?;
                }
                if keys.is_empty() {
                    write!(f, ":")?;
                }
                write!(f, "]")
            }
            Value::Range { start, end, inclusive } => {
                if *inclusive {
                    write!(f, "{}...{}", start, end)
                } else {
                    write!(f, "{}..<{}", start, end)
                }
            }
            Value::Record(record) => {
                write!(f, "{}(", record.type_name)?;
                for (i, (name, value)) in record.all_fields().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: ", name)?;
                    write_nested(f, value)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<HashMap<String, T>> for Value {
    fn from(map: HashMap<String, T>) -> Self {
        Value::dict(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<std::ops::Range<i64>> for Value {
    fn from(range: std::ops::Range<i64>) -> Self {
        Value::Range { start: range.start, end: range.end, inclusive: false }
    }
}

impl From<std::ops::RangeInclusive<i64>> for Value {
    fn from(range: std::ops::RangeInclusive<i64>) -> Self {
        Value::Range { start: *range.start(), end: *range.end(), inclusive: true }
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(Arc::new(record))
    }
}

/// Convert serde_json::Value to a template Value
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => Value::str(s),
            serde_json::Value::Array(arr) => Value::array(arr.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(obj) => {
                Value::dict(obj.into_iter().map(|(key, val)| (key, Value::from(val))).collect())
            }
        }
    }
}
