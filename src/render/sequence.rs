// File: src/render/sequence.rs
//
// Normalizes a resolved value into the uniform item sequence a loop iterates.

use super::value::Value;

/// One element of a normalized sequence
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Single(Value),
    /// Key/value pair from a dict, or field name/value from a record
    Pair(Value, Value),
}

impl Item {
    /// Value bound to the first loop variable
    pub fn first(&self) -> &Value {
        match self {
            Item::Single(value) => value,
            Item::Pair(key, _) => key,
        }
    }

    /// Value bound to the second loop variable, if the item has one
    pub fn second(&self) -> Option<&Value> {
        match self {
            Item::Single(_) => None,
            Item::Pair(_, value) => Some(value),
        }
    }
}

/// Convert `value` into an ordered list of items.
///
/// Non-empty dicts yield key/value pairs, arrays their elements, ranges their
/// integers and records their fields (own fields first, then each supertype's).
/// Everything else, including an empty dict, yields nothing.
pub fn normalize(value: &Value) -> Vec<Item> {
    match value {
        Value::Dict(map) if !map.is_empty() => map
            .iter()
            .map(|(key, value)| Item::Pair(Value::str(key.as_str()), value.clone()))
            .collect(),
        Value::Array(items) => items.iter().cloned().map(Item::Single).collect(),
        Value::Range { start, end, inclusive: true } => {
            (*start..=*end).map(|n| Item::Single(Value::Int(n))).collect()
        }
        Value::Range { start, end, inclusive: false } => {
            (*start..*end).map(|n| Item::Single(Value::Int(n))).collect()
        }
        Value::Record(record) => record
            .all_fields()
            .into_iter()
            .map(|(name, value)| Item::Pair(Value::str(name), value))
            .collect(),
        _ => Vec::new(),
    }
}
