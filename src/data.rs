//! Typed in-memory values produced by deserialization and consumed by
//! serialization.
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// What a password is rendered as everywhere outside the deserializer.
pub const PASSWORD_MASK: &str = "********";

#[derive(Clone)]
pub enum Data {
    Null,
    /// Not sent, no default.
    Absent,
    /// Sent as the field's clear sentinel.
    Cleared,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
    DateTime(Timestamp),
    Password(Secret),
    File(Upload),
    List(Vec<Data>),
    Map(IndexMap<String, Data>),
    /// Model output, keyed by attribute name.
    Record(Record),
    /// Passthrough for `any` schemas and included unknown fields.
    Any(Value),
    /// Attribute-style source for serialization.
    Object(Arc<dyn Attributes>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timestamp {
    Naive(NaiveDateTime),
    Aware(DateTime<FixedOffset>),
}

/// A password value. `Debug`, `Display` and `Serialize` all print the mask.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upload {
    pub filename: String,
    pub content_type: Option<String>,
    pub size: Option<u64>,
}

/// Ordered attribute → value table built by a model.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<String, Data>,
}

/// Named-attribute read access, the seam between serialization and the
/// application's own types.
pub trait Attributes: fmt::Debug + Send + Sync {
    fn attr(&self, name: &str) -> Option<Data>;
}

// --------------------------------- Data ---------------------------------- //

impl Data {
    pub fn type_name(&self) -> &'static str {
        match self {
            Data::Null => "null",
            Data::Absent => "absent",
            Data::Cleared => "cleared",
            Data::Bool(_) => "boolean",
            Data::Int(_) => "integer",
            Data::Float(_) => "float",
            Data::Str(_) => "string",
            Data::Date(_) => "date",
            Data::DateTime(_) => "datetime",
            Data::Password(_) => "password",
            Data::File(_) => "file",
            Data::List(_) => "list",
            Data::Map(_) => "map",
            Data::Record(_) => "record",
            Data::Any(_) => "any",
            Data::Object(_) => "object",
        }
    }

    pub fn is_absent(&self) -> bool { matches!(self, Data::Absent) }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Data::Str(s) => Some(s),
            Data::Any(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Data::Int(i) => Some(*i),
            Data::Any(v) => v.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Data::Int(i) => Some(*i as f64),
            Data::Float(f) => Some(*f),
            Data::Any(v) => v.as_f64(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Data]> {
        match self {
            Data::List(xs) => Some(xs),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Data::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            Data::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Attribute view of containers that can act as a serialization source.
    pub fn as_attributes(&self) -> Option<&dyn Attributes> {
        match self {
            Data::Record(r) => Some(r),
            Data::Map(m) => Some(m),
            Data::Any(Value::Object(m)) => Some(m),
            Data::Object(o) => Some(o.as_ref()),
            _ => None,
        }
    }

    pub fn object(value: impl Attributes + 'static) -> Self {
        Data::Object(Arc::new(value))
    }
}

impl From<Value> for Data {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Data::Null,
            Value::Bool(b) => Data::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Data::Int(i),
                None => Data::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Data::Str(s),
            Value::Array(xs) => Data::List(xs.into_iter().map(Data::from).collect()),
            Value::Object(m) => Data::Map(m.into_iter().map(|(k, v)| (k, Data::from(v))).collect()),
        }
    }
}

impl From<bool> for Data {
    fn from(value: bool) -> Self { Data::Bool(value) }
}

impl From<i64> for Data {
    fn from(value: i64) -> Self { Data::Int(value) }
}

impl From<i32> for Data {
    fn from(value: i32) -> Self { Data::Int(value as i64) }
}

impl From<f64> for Data {
    fn from(value: f64) -> Self { Data::Float(value) }
}

impl From<&str> for Data {
    fn from(value: &str) -> Self { Data::Str(value.to_string()) }
}

impl From<String> for Data {
    fn from(value: String) -> Self { Data::Str(value) }
}

impl From<Record> for Data {
    fn from(value: Record) -> Self { Data::Record(value) }
}

impl<T: Into<Data>> From<Vec<T>> for Data {
    fn from(value: Vec<T>) -> Self { Data::List(value.into_iter().map(Into::into).collect()) }
}

impl PartialEq for Data {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Data::Null, Data::Null)
            | (Data::Absent, Data::Absent)
            | (Data::Cleared, Data::Cleared) => true,
            (Data::Bool(a), Data::Bool(b)) => a == b,
            (Data::Int(a), Data::Int(b)) => a == b,
            (Data::Float(a), Data::Float(b)) => a == b,
            (Data::Str(a), Data::Str(b)) => a == b,
            (Data::Date(a), Data::Date(b)) => a == b,
            (Data::DateTime(a), Data::DateTime(b)) => a == b,
            (Data::Password(a), Data::Password(b)) => a == b,
            (Data::File(a), Data::File(b)) => a == b,
            (Data::List(a), Data::List(b)) => a == b,
            (Data::Map(a), Data::Map(b)) => a == b,
            (Data::Record(a), Data::Record(b)) => a == b,
            (Data::Any(a), Data::Any(b)) => a == b,
            (Data::Object(a), Data::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Data::Null => write!(f, "Null"),
            Data::Absent => write!(f, "Absent"),
            Data::Cleared => write!(f, "Cleared"),
            Data::Bool(b) => write!(f, "Bool({b})"),
            Data::Int(i) => write!(f, "Int({i})"),
            Data::Float(x) => write!(f, "Float({x})"),
            Data::Str(s) => write!(f, "Str({s:?})"),
            Data::Date(d) => write!(f, "Date({d})"),
            Data::DateTime(t) => write!(f, "DateTime({t})"),
            Data::Password(p) => write!(f, "Password({p:?})"),
            Data::File(u) => f.debug_tuple("File").field(u).finish(),
            Data::List(xs) => f.debug_list().entries(xs).finish(),
            Data::Map(m) => f.debug_map().entries(m.iter()).finish(),
            Data::Record(r) => fmt::Debug::fmt(r, f),
            Data::Any(v) => write!(f, "Any({v})"),
            Data::Object(o) => f.debug_tuple("Object").field(o).finish(),
        }
    }
}

// ------------------------------- Timestamp ------------------------------- //

impl Timestamp {
    pub fn is_aware(&self) -> bool { matches!(self, Timestamp::Aware(_)) }

    /// Calendar date as written, before any offset is applied.
    pub fn date(&self) -> NaiveDate {
        match self {
            Timestamp::Naive(t) => t.date(),
            Timestamp::Aware(t) => t.date_naive(),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Naive(t) => write!(f, "{}", t.format("%Y-%m-%dT%H:%M:%S%.f")),
            Timestamp::Aware(t) => write!(f, "{}", t.format("%Y-%m-%dT%H:%M:%S%.f%:z")),
        }
    }
}

// -------------------------------- Secret --------------------------------- //

impl Secret {
    pub fn new(value: impl Into<String>) -> Self { Secret(value.into()) }

    /// The real value. Only code that checks credentials should call this.
    pub fn expose(&self) -> &str { &self.0 }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(PASSWORD_MASK) }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(PASSWORD_MASK) }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(PASSWORD_MASK)
    }
}

// -------------------------------- Record --------------------------------- //

impl Record {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, attr: &str) -> Option<&Data> { self.fields.get(attr) }

    pub fn insert(&mut self, attr: impl Into<String>, value: impl Into<Data>) -> Option<Data> {
        self.fields.insert(attr.into(), value.into())
    }

    pub fn remove(&mut self, attr: &str) -> Option<Data> { self.fields.shift_remove(attr) }

    pub fn contains(&self, attr: &str) -> bool { self.fields.contains_key(attr) }

    pub fn len(&self) -> usize { self.fields.len() }

    pub fn is_empty(&self) -> bool { self.fields.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Data)> { self.fields.iter() }

    pub fn into_inner(self) -> IndexMap<String, Data> { self.fields }
}

impl FromIterator<(String, Data)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Data)>>(iter: T) -> Self {
        Record { fields: iter.into_iter().collect() }
    }
}

impl Attributes for Record {
    fn attr(&self, name: &str) -> Option<Data> { self.fields.get(name).cloned() }
}

impl Attributes for IndexMap<String, Data> {
    fn attr(&self, name: &str) -> Option<Data> { self.get(name).cloned() }
}

impl Attributes for Map<String, Value> {
    fn attr(&self, name: &str) -> Option<Data> { self.get(name).cloned().map(Data::from) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_never_prints_its_value() {
        let s = Secret::new("secret");
        assert_eq!(format!("{s}"), PASSWORD_MASK);
        assert_eq!(format!("{s:?}"), PASSWORD_MASK);
        assert_eq!(serde_json::to_value(&s).unwrap(), Value::String(PASSWORD_MASK.into()));
        assert_eq!(format!("{:?}", Data::Password(s.clone())), format!("Password({PASSWORD_MASK})"));
        assert_eq!(s.expose(), "secret");
    }

    #[test]
    fn json_objects_act_as_attribute_sources() {
        let v = serde_json::json!({"title": "ok", "pages": 5});
        let data = Data::Any(v);
        let attrs = data.as_attributes().unwrap();
        assert_eq!(attrs.attr("pages"), Some(Data::Int(5)));
        assert_eq!(attrs.attr("missing"), None);
    }

    #[test]
    fn record_keeps_insertion_order() {
        let mut r = Record::new();
        r.insert("b", 1);
        r.insert("a", 2);
        let keys: Vec<_> = r.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }
}
