//! Raw value → typed value.
//!
//! Every container collects all of its failures before returning, so one call
//! reports the complete defect set. Nested failures are pushed under the key
//! or index where they happened, which keeps the full path depth.
use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::trace;

use crate::data::{Data, Record, Secret, Upload};
use crate::error::{ErrorKind, Loc, ValidationError};
use crate::model::{Field, Model, RequiredFields, UnknownFields};
use crate::schema::arr::{first_duplicate, same_value};
use crate::schema::{num, str, temporal, DictRules, Kind, ListRules, Origin, Schema};

const TRUE_TOKENS: [&str; 4] = ["true", "1", "yes", "on"];
const FALSE_TOKENS: [&str; 4] = ["false", "0", "no", "off"];

impl Schema {
    /// Validate `raw` and convert it into a typed value.
    pub fn deserialize(&self, raw: &Value, origin: Origin) -> Result<Data, ValidationError> {
        if raw.is_null() {
            if self.nullable {
                return Ok(Data::Null);
            }
            // a union may still have a nullable variant
            if !matches!(self.kind, Kind::AnyOf(_)) {
                return Err(ValidationError::null());
            }
        }

        let data = self.deserialize_kind(raw, origin)?;

        let mut err = ValidationError::new();
        if !self.choices.is_empty() {
            let matched = comparable(self, &data)
                .map(|v| self.choices.iter().any(|c| same_value(c, &v)))
                .unwrap_or(false);
            if !matched {
                let choices = Value::Array(self.choices.clone());
                err.push_msg(ErrorKind::Choices, format!("The value must be one of {choices}."));
                return Err(err);
            }
        }
        for validator in &self.validators {
            if let Err(e) = validator(&data) {
                err.absorb(e);
            }
        }
        err.into_result(data)
    }

    fn deserialize_kind(&self, raw: &Value, origin: Origin) -> Result<Data, ValidationError> {
        match &self.kind {
            Kind::String(rules) | Kind::Path(rules) => {
                let s = str::coerce(raw)?;
                let mut err = ValidationError::new();
                rules.check(&s, &mut err);
                err.into_result(Data::Str(s))
            }
            Kind::Password(rules) => {
                let s = str::coerce(raw)?;
                let mut err = ValidationError::new();
                rules.check(&s, &mut err);
                err.into_result(Data::Password(Secret::new(s)))
            }
            Kind::Integer(rules) => {
                let i = num::coerce_int(raw)?;
                let mut err = ValidationError::new();
                rules.check(i as f64, &mut err);
                err.into_result(Data::Int(i))
            }
            Kind::Float(rules) => {
                let x = num::coerce_float(raw)?;
                let mut err = ValidationError::new();
                rules.check(x, &mut err);
                err.into_result(Data::Float(x))
            }
            Kind::Boolean => coerce_bool(raw, origin).map(Data::Bool),
            Kind::Date => temporal::coerce_date(raw).map(Data::Date),
            Kind::DateTime { with_tz } => temporal::coerce_datetime(raw, *with_tz).map(Data::DateTime),
            Kind::File => coerce_file(raw).map(Data::File),
            Kind::Any => Ok(Data::Any(raw.clone())),
            Kind::List(rules) => deserialize_list(rules, raw, origin),
            Kind::Dict(rules) => deserialize_dict(rules, raw, origin),
            Kind::AnyOf(variants) => deserialize_any_of(variants, raw, origin),
            Kind::Model(usage) => {
                let model = usage.target.resolve();
                deserialize_record(&model, usage.required.as_ref(), raw, origin).map(Data::Record)
            }
        }
    }
}

impl Model {
    /// Validate a raw mapping against this model.
    pub fn deserialize(&self, raw: &Value, origin: Origin) -> Result<Record, ValidationError> {
        deserialize_record(self, None, raw, origin)
    }
}

// ------------------------------- Scalars --------------------------------- //

fn coerce_bool(raw: &Value, origin: Origin) -> Result<bool, ValidationError> {
    match (raw, origin) {
        (Value::Bool(b), _) => Ok(*b),
        (Value::String(s), Origin::Text) => {
            let t = s.trim().to_ascii_lowercase();
            if TRUE_TOKENS.contains(&t.as_str()) {
                Ok(true)
            } else if FALSE_TOKENS.contains(&t.as_str()) {
                Ok(false)
            } else {
                Err(ValidationError::invalid("Not a valid boolean."))
            }
        }
        _ => Err(ValidationError::invalid("Not a valid boolean.")),
    }
}

fn coerce_file(raw: &Value) -> Result<Upload, ValidationError> {
    let invalid = || ValidationError::invalid("Not a valid file.");
    let obj = raw.as_object().ok_or_else(invalid)?;
    let filename = obj.get("filename").and_then(Value::as_str).ok_or_else(invalid)?;
    Ok(Upload {
        filename: filename.to_string(),
        content_type: obj.get("content_type").and_then(Value::as_str).map(String::from),
        size: obj.get("size").and_then(Value::as_u64),
    })
}

/// The form choices and uniqueness compare against. Passwords compare by
/// their real value, not the mask.
fn comparable(schema: &Schema, data: &Data) -> Option<Value> {
    match data {
        Data::Password(s) => Some(Value::String(s.expose().to_string())),
        other => schema.serialize(other).ok(),
    }
}

// ------------------------------ Containers ------------------------------- //

fn deserialize_list(rules: &ListRules, raw: &Value, origin: Origin) -> Result<Data, ValidationError> {
    let Value::Array(items) = raw else {
        return Err(ValidationError::invalid("Not a valid list."));
    };
    let mut err = ValidationError::new();
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match rules.item.deserialize(item, origin) {
            Ok(d) => out.push(d),
            Err(e) => err.push_child(Loc::Index(i), e),
        }
    }
    rules.check_len(items.len(), &mut err);
    if err.is_empty() && rules.unique_items {
        let represented: Vec<Option<Value>> = out.iter().map(|d| comparable(&rules.item, d)).collect();
        if let Some(i) = first_duplicate(&represented) {
            err.push_msg(ErrorKind::UniqueItems, format!("Duplicate item at index {i}."));
        }
    }
    err.into_result(Data::List(out))
}

fn deserialize_dict(rules: &DictRules, raw: &Value, origin: Origin) -> Result<Data, ValidationError> {
    let Value::Object(entries) = raw else {
        return Err(ValidationError::invalid("Not a valid dict object."));
    };
    let mut err = ValidationError::new();
    let mut out = indexmap::IndexMap::with_capacity(entries.len());
    for (k, v) in entries {
        match rules.value.deserialize(v, origin) {
            Ok(d) => { out.insert(k.clone(), d); }
            Err(e) => err.push_child(k.as_str(), e),
        }
    }
    rules.check_len(entries.len(), &mut err);
    err.into_result(Data::Map(out))
}

fn deserialize_any_of(variants: &[Schema], raw: &Value, origin: Origin) -> Result<Data, ValidationError> {
    let mut err = ValidationError::new();
    for (i, variant) in variants.iter().enumerate() {
        match variant.deserialize(raw, origin) {
            Ok(d) => {
                trace!(variant = i, "union variant matched");
                return Ok(d);
            }
            Err(e) => err.push_variant(e),
        }
    }
    if err.is_empty() {
        err.push_msg(ErrorKind::Invalid, "Deserialization failure.");
    }
    Err(err)
}

// -------------------------------- Models --------------------------------- //

pub(crate) fn deserialize_record(
    model: &Model,
    usage: Option<&RequiredFields>,
    raw: &Value,
    origin: Origin,
) -> Result<Record, ValidationError> {
    let Value::Object(input) = raw else {
        return Err(ValidationError::invalid("Not a valid object."));
    };

    let mut record = Record::new();
    let mut err = ValidationError::new();
    let mut claimed: HashSet<&str> = HashSet::new();

    for field in model.fields() {
        claimed.insert(field.wire_name());
        if field.is_read_only() {
            continue;
        }
        let required = model.is_required(field, usage);
        match resolve_field(model, field, required, input.get(field.wire_name()), &record, origin) {
            Ok(value) => {
                record.insert(field.attr_name(), value);
            }
            Err(mut e) => {
                e.override_messages(&field.error_messages);
                err.push_child(field.wire_name(), e);
            }
        }
    }

    collect_unknown(model, input, &claimed, &mut record, &mut err);

    if !err.is_empty() {
        return Err(err);
    }
    model.run_post(record)
}

/// Absent → default, required error, or the absent marker. Present → clear
/// sentinel, erase, type validation, then hooks.
fn resolve_field(
    model: &Model,
    field: &Field,
    required: bool,
    raw: Option<&Value>,
    partial: &Record,
    origin: Origin,
) -> Result<Data, ValidationError> {
    if let (Some(v), Some(sentinel)) = (raw, field.clear_sentinel()) {
        if v == sentinel {
            trace!(model = model.name(), field = field.name(), "cleared");
            return Ok(Data::Cleared);
        }
    }

    let Some(raw) = raw.filter(|v| !field.is_erased(v)) else {
        if let Some(default) = field.default_value() {
            trace!(model = model.name(), field = field.name(), "absent, using default");
            return Ok(default.produce());
        }
        if required {
            return Err(ValidationError::required());
        }
        return Ok(Data::Absent);
    };

    let value = field.schema().deserialize(raw, origin)?;
    if matches!(value, Data::Null) {
        return Ok(value);
    }
    model.run_hooks(field.name(), value, partial)
}

fn collect_unknown(
    model: &Model,
    input: &Map<String, Value>,
    claimed: &HashSet<&str>,
    record: &mut Record,
    err: &mut ValidationError,
) {
    let policy = model.unknown_fields();
    if policy == UnknownFields::Exclude {
        return;
    }
    for (key, value) in input {
        if claimed.contains(key.as_str()) {
            continue;
        }
        match policy {
            UnknownFields::Include => {
                record.insert(key.clone(), Data::Any(value.clone()));
            }
            UnknownFields::Error => {
                err.push_child(key.as_str(), ValidationError::with_kind(ErrorKind::UnknownField, "Unknown field."));
            }
            UnknownFields::Exclude => {}
        }
    }
}
