use std::collections::HashSet;

use ordered_float::OrderedFloat;
use serde_json::Value;

use super::Schema;
use super::num::integral;
use crate::error::{ErrorKind, ValidationError};

#[derive(Clone, Debug)]
pub struct ListRules {
    pub item: Box<Schema>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub unique_items: bool,
}

#[derive(Clone, Debug)]
pub struct DictRules {
    pub value: Box<Schema>,
    pub min_properties: Option<usize>,
    pub max_properties: Option<usize>,
}

impl ListRules {
    pub(crate) fn new(item: Schema) -> Self {
        ListRules { item: Box::new(item), min_items: None, max_items: None, unique_items: false }
    }

    pub(crate) fn check_len(&self, len: usize, err: &mut ValidationError) {
        check_count(len, self.min_items, self.max_items, "items", ErrorKind::MinItems, ErrorKind::MaxItems, err);
    }
}

impl DictRules {
    pub(crate) fn new(value: Schema) -> Self {
        DictRules { value: Box::new(value), min_properties: None, max_properties: None }
    }

    pub(crate) fn check_len(&self, len: usize, err: &mut ValidationError) {
        check_count(
            len,
            self.min_properties,
            self.max_properties,
            "properties",
            ErrorKind::MinProperties,
            ErrorKind::MaxProperties,
            err,
        );
    }
}

fn check_count(
    len: usize,
    min: Option<usize>,
    max: Option<usize>,
    noun: &str,
    min_kind: ErrorKind,
    max_kind: ErrorKind,
    err: &mut ValidationError,
) {
    if let Some(min) = min {
        if len < min {
            err.push_msg(min_kind, format!("The number of {noun} must be greater than or equal to {min}."));
        }
    }
    if let Some(max) = max {
        if len > max {
            err.push_msg(max_kind, format!("The number of {noun} must be less than or equal to {max}."));
        }
    }
}

// ----------------------------- Uniqueness -------------------------------- //

/// Hashable image of a represented value. Numbers compare by value, so `1`
/// and `1.0` collide; object keys are sorted.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum UniqueKey {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Num(OrderedFloat<f64>),
    Str(String),
    List(Vec<UniqueKey>),
    Map(Vec<(String, UniqueKey)>),
}

fn unique_key(v: &Value) -> UniqueKey {
    match v {
        Value::Null => UniqueKey::Null,
        Value::Bool(b) => UniqueKey::Bool(*b),
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => UniqueKey::Int(i),
            (None, Some(u)) => UniqueKey::UInt(u),
            // `1.0` and `1` are the same value
            _ => {
                let x = n.as_f64().unwrap_or(f64::NAN);
                integral(x).map_or(UniqueKey::Num(OrderedFloat(x)), UniqueKey::Int)
            }
        },
        Value::String(s) => UniqueKey::Str(s.clone()),
        Value::Array(xs) => UniqueKey::List(xs.iter().map(unique_key).collect()),
        Value::Object(m) => {
            let mut entries: Vec<_> = m.iter().map(|(k, v)| (k.clone(), unique_key(v))).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            UniqueKey::Map(entries)
        }
    }
}

/// Value equality on represented forms.
pub(crate) fn same_value(a: &Value, b: &Value) -> bool {
    unique_key(a) == unique_key(b)
}

/// Index of the first element whose represented form already appeared.
/// `None` entries could not be represented and never collide.
pub(crate) fn first_duplicate(represented: &[Option<Value>]) -> Option<usize> {
    let mut seen = HashSet::new();
    for (i, v) in represented.iter().enumerate() {
        let Some(v) = v else { continue };
        if !seen.insert(unique_key(v)) {
            return Some(i);
        }
    }
    None
}
