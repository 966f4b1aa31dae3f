//! Typed value → wire value.
//!
//! No hooks run here. Failures are declaration or application bugs (a null
//! where none is allowed, a missing required attribute, a value of the wrong
//! type) and come back as [`SerializeError`] with the path that failed.
use serde_json::{Map, Number, Value};

use crate::data::{Data, PASSWORD_MASK};
use crate::error::SerializeError;
use crate::model::{Model, RequiredFields};
use crate::schema::temporal::{format_date, parse_date, parse_datetime};
use crate::schema::{Kind, Schema};

impl Schema {
    pub fn serialize(&self, data: &Data) -> Result<Value, SerializeError> {
        if matches!(data, Data::Null | Data::Absent | Data::Cleared) {
            return if self.nullable || matches!(self.kind, Kind::Any | Kind::AnyOf(_)) {
                Ok(Value::Null)
            } else {
                Err(SerializeError::Null { path: vec![] })
            };
        }
        match &self.kind {
            // the mask, whatever the source holds
            Kind::Password(_) => Ok(Value::String(PASSWORD_MASK.to_string())),
            Kind::String(_) | Kind::Path(_) => match data {
                Data::Str(s) => Ok(Value::String(s.clone())),
                Data::Any(Value::String(s)) => Ok(Value::String(s.clone())),
                // scalars render as their text
                Data::Int(_) | Data::Float(_) | Data::Bool(_) | Data::Date(_) | Data::DateTime(_) => {
                    match data_to_json(data)? {
                        Value::String(s) => Ok(Value::String(s)),
                        Value::Null => Err(mismatch("string", data)),
                        v => Ok(Value::String(v.to_string())),
                    }
                }
                Data::Any(v @ (Value::Number(_) | Value::Bool(_))) => Ok(Value::String(v.to_string())),
                other => Err(mismatch("string", other)),
            },
            Kind::Integer(_) => match data {
                Data::Int(i) => Ok(Value::from(*i)),
                Data::Float(x) if x.fract() == 0.0 && x.is_finite() => Ok(Value::from(*x as i64)),
                Data::Any(v @ Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(v.clone()),
                other => Err(mismatch("integer", other)),
            },
            Kind::Float(_) => match data.as_f64().and_then(Number::from_f64) {
                Some(n) => Ok(Value::Number(n)),
                None => Err(mismatch("float", data)),
            },
            Kind::Boolean => match data {
                Data::Bool(b) => Ok(Value::Bool(*b)),
                Data::Any(Value::Bool(b)) => Ok(Value::Bool(*b)),
                other => Err(mismatch("boolean", other)),
            },
            Kind::Date => match data {
                Data::Date(d) => Ok(Value::String(format_date(d))),
                other => match other.as_str().and_then(parse_date) {
                    Some(d) => Ok(Value::String(format_date(&d))),
                    None => Err(mismatch("date", other)),
                },
            },
            Kind::DateTime { .. } => match data {
                Data::DateTime(ts) => Ok(Value::String(ts.to_string())),
                other => match other.as_str().and_then(parse_datetime) {
                    Some(ts) => Ok(Value::String(ts.to_string())),
                    None => Err(mismatch("datetime", other)),
                },
            },
            Kind::File => Err(SerializeError::Unsupported { path: vec![], kind: "file" }),
            Kind::Any => data_to_json(data),
            Kind::List(rules) => {
                let items: Vec<Data> = match data {
                    Data::List(xs) => xs.clone(),
                    Data::Any(Value::Array(xs)) => xs.iter().cloned().map(Data::from).collect(),
                    other => return Err(mismatch("list", other)),
                };
                items
                    .iter()
                    .enumerate()
                    .map(|(i, d)| rules.item.serialize(d).map_err(|e| e.at(i)))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            Kind::Dict(rules) => {
                let entries: Vec<(String, Data)> = match data {
                    Data::Map(m) => m.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                    Data::Record(r) => r.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                    Data::Any(Value::Object(m)) => m.iter().map(|(k, v)| (k.clone(), Data::from(v.clone()))).collect(),
                    other => return Err(mismatch("dict", other)),
                };
                let mut out = Map::new();
                for (k, v) in entries {
                    let value = rules.value.serialize(&v).map_err(|e| e.at(k.as_str()))?;
                    out.insert(k, value);
                }
                Ok(Value::Object(out))
            }
            Kind::AnyOf(variants) => {
                let mut last = None;
                for variant in variants {
                    // only secrets and plain text may come out masked
                    if matches!(variant.kind, Kind::Password(_)) && !matches!(data, Data::Password(_) | Data::Str(_)) {
                        continue;
                    }
                    match variant.serialize(data) {
                        Ok(v) => return Ok(v),
                        Err(e) => last = Some(e),
                    }
                }
                Err(last.unwrap_or_else(|| mismatch("anyOf", data)))
            }
            Kind::Model(usage) => serialize_record(&usage.target.resolve(), usage.required.as_ref(), data),
        }
    }
}

impl Model {
    /// Represent a record, mapping, JSON object or attribute object.
    pub fn serialize(&self, data: &Data) -> Result<Value, SerializeError> {
        serialize_record(self, None, data)
    }
}

pub(crate) fn serialize_record(
    model: &Model,
    usage: Option<&RequiredFields>,
    data: &Data,
) -> Result<Value, SerializeError> {
    let Some(source) = data.as_attributes() else {
        return Err(mismatch("object", data));
    };
    let mut out = Map::new();
    for field in model.fields() {
        if field.is_write_only() {
            continue;
        }
        let wire = field.wire_name();
        let value = match model.getter(field.name()) {
            Some(get) => get(source),
            None => match source.attr(field.attr_name()) {
                Some(v) => v,
                None if model.is_required(field, usage) => {
                    return Err(SerializeError::MissingAttribute {
                        path: vec![],
                        attr: field.attr_name().to_string(),
                    }
                    .at(wire));
                }
                None => continue,
            },
        };
        let represented = match value {
            Data::Absent => continue,
            Data::Cleared => field.clear_sentinel().cloned().unwrap_or(Value::Null),
            v => field.schema().serialize(&v).map_err(|e| e.at(wire))?,
        };
        out.insert(wire.to_string(), represented);
    }
    Ok(Value::Object(out))
}

/// Schema-less representation, for `any`.
fn data_to_json(data: &Data) -> Result<Value, SerializeError> {
    Ok(match data {
        Data::Null | Data::Absent | Data::Cleared => Value::Null,
        Data::Bool(b) => Value::Bool(*b),
        Data::Int(i) => Value::from(*i),
        Data::Float(x) => Number::from_f64(*x).map(Value::Number).unwrap_or(Value::Null),
        Data::Str(s) => Value::String(s.clone()),
        Data::Date(d) => Value::String(format_date(d)),
        Data::DateTime(ts) => Value::String(ts.to_string()),
        Data::Password(_) => Value::String(PASSWORD_MASK.to_string()),
        Data::File(_) => return Err(SerializeError::Unsupported { path: vec![], kind: "file" }),
        Data::List(xs) => Value::Array(
            xs.iter()
                .enumerate()
                .map(|(i, d)| data_to_json(d).map_err(|e| e.at(i)))
                .collect::<Result<_, _>>()?,
        ),
        Data::Map(m) => map_to_json(m.iter())?,
        Data::Record(r) => map_to_json(r.iter())?,
        Data::Any(v) => v.clone(),
        Data::Object(_) => return Err(SerializeError::Unsupported { path: vec![], kind: "attribute object" }),
    })
}

fn map_to_json<'a>(entries: impl Iterator<Item = (&'a String, &'a Data)>) -> Result<Value, SerializeError> {
    let mut out = Map::new();
    for (k, v) in entries {
        if v.is_absent() { continue; }
        out.insert(k.clone(), data_to_json(v).map_err(|e| e.at(k.as_str()))?);
    }
    Ok(Value::Object(out))
}

fn mismatch(expected: &'static str, found: &Data) -> SerializeError {
    SerializeError::TypeMismatch { path: vec![], expected, found: found.type_name() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Record, Secret};
    use crate::error::path_string;
    use crate::model::Field;
    use serde_json::json;

    #[test]
    fn passwords_always_emit_the_mask() {
        let s = Schema::password();
        assert_eq!(s.serialize(&Data::Password(Secret::new("secret"))).unwrap(), json!(PASSWORD_MASK));
        assert_eq!(s.serialize(&Data::Str("secret".into())).unwrap(), json!(PASSWORD_MASK));
        assert_eq!(Schema::any().serialize(&Data::Password(Secret::new("secret"))).unwrap(), json!(PASSWORD_MASK));
    }

    #[test]
    fn strings_render_scalars_as_text() {
        let s = Schema::string();
        assert_eq!(s.serialize(&Data::Int(42)).unwrap(), json!("42"));
        assert_eq!(s.serialize(&Data::Float(1.5)).unwrap(), json!("1.5"));
        assert_eq!(s.serialize(&Data::Bool(true)).unwrap(), json!("true"));
        assert_eq!(s.serialize(&Data::Any(json!(7))).unwrap(), json!("7"));
        assert!(matches!(s.serialize(&Data::Float(f64::NAN)), Err(SerializeError::TypeMismatch { .. })));
        assert!(matches!(s.serialize(&Data::List(vec![])), Err(SerializeError::TypeMismatch { .. })));
    }

    #[test]
    fn any_of_masks_only_text_through_a_password_variant() {
        let s = Schema::any_of([Schema::password(), Schema::integer()]);
        assert_eq!(s.serialize(&Data::Int(3)).unwrap(), json!(3));
        assert_eq!(s.serialize(&Data::Str("hunter2".into())).unwrap(), json!(PASSWORD_MASK));
        assert_eq!(s.serialize(&Data::Password(Secret::new("hunter2"))).unwrap(), json!(PASSWORD_MASK));
        assert!(s.serialize(&Data::Bool(true)).is_err());
    }

    #[test]
    fn null_for_non_nullable_is_an_error() {
        let err = Schema::string().serialize(&Data::Null).unwrap_err();
        assert!(matches!(err, SerializeError::Null { .. }));
        assert_eq!(Schema::string().nullable().serialize(&Data::Null).unwrap(), Value::Null);
    }

    #[test]
    fn nested_errors_carry_their_path() {
        let m = Model::builder("Author").field(Field::new("name", Schema::string())).build().unwrap();
        let s = Schema::list(Schema::model(&m));
        let mut bad = Record::new();
        bad.insert("name", Data::List(vec![]));
        let err = s.serialize(&Data::List(vec![Data::Record(bad)])).unwrap_err();
        assert_eq!(path_string(err.path()), "[0].name");
    }

    #[test]
    fn write_only_and_absent_fields_are_omitted() {
        let m = Model::builder("User")
            .field(Field::new("name", Schema::string()))
            .field(Field::new("secret", Schema::string()).write_only())
            .field(Field::new("nick", Schema::string()).required(false))
            .build()
            .unwrap();
        let mut r = Record::new();
        r.insert("name", "ann");
        r.insert("secret", "x");
        r.insert("nick", Data::Absent);
        assert_eq!(m.serialize(&Data::Record(r)).unwrap(), json!({"name": "ann"}));
    }

    #[test]
    fn missing_required_attribute_is_reported() {
        let m = Model::builder("User").field(Field::new("name", Schema::string())).build().unwrap();
        let err = m.serialize(&Data::Record(Record::new())).unwrap_err();
        assert!(matches!(err, SerializeError::MissingAttribute { .. }));
    }

    #[test]
    fn temporal_values_render_iso() {
        assert_eq!(Schema::date().serialize(&Data::Str("2000-01-02".into())).unwrap(), json!("2000-01-02"));
        let ts = parse_datetime("2000-01-01 00:00:00").unwrap();
        assert_eq!(Schema::datetime().serialize(&Data::DateTime(ts)).unwrap(), json!("2000-01-01T00:00:00"));
    }
}
