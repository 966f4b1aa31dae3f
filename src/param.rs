//! Request parameter groups.
//!
//! A [`Parameters`] group is a model whose fields are individual query,
//! header, cookie or path parameters, each with its own [`Style`]. Bodies are
//! either a [`JsonBody`] (any schema) or a [`FormBody`] (a model fed from
//! form fields and uploaded files).
pub mod raw;
pub mod style;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::trace;

use crate::data::{Data, Record, Upload};
use crate::error::{CodecError, DefinitionError, ValidationError};
use crate::model::{Field, Model};
use crate::schema::{Origin, Schema};

pub use raw::RawParams;
pub use style::{Location, Shape, Style, StyleKind, Wire};

pub const JSON: &str = "application/json";
pub const MULTIPART: &str = "multipart/form-data";
pub const URLENCODED: &str = "application/x-www-form-urlencoded";

// ------------------------------ Parameters ------------------------------- //

#[derive(Clone, Debug)]
pub struct Parameters {
    location: Location,
    model: Model,
    styles: IndexMap<String, Style>,
}

impl Parameters {
    pub fn new(location: Location, model: Model) -> Self {
        Parameters { location, model, styles: IndexMap::new() }
    }

    pub fn query(model: Model) -> Self { Self::new(Location::Query, model) }
    pub fn header(model: Model) -> Self { Self::new(Location::Header, model) }
    pub fn cookie(model: Model) -> Self { Self::new(Location::Cookie, model) }

    /// Override the location's default style for one field.
    pub fn style(mut self, field: impl Into<String>, style: Style) -> Self {
        self.styles.insert(field.into(), style);
        self
    }

    pub fn location(&self) -> Location { self.location }
    pub fn model(&self) -> &Model { &self.model }

    pub fn style_for(&self, field: &Field) -> Style {
        self.styles
            .get(field.name())
            .copied()
            .unwrap_or_else(|| self.location.default_style())
    }

    /// Every style must name a field and fit the location and the field's shape.
    pub fn check(&self) -> Result<(), DefinitionError> {
        if let Some(name) = self.styles.keys().find(|n| self.model.field(n).is_none()) {
            return Err(DefinitionError::UnknownField {
                model: self.model.name().to_string(),
                field: name.clone(),
            });
        }
        for field in self.model.fields() {
            style::check(field.wire_name(), self.location, self.style_for(field), &Shape::of(field.schema()))?;
        }
        Ok(())
    }

    /// Split every declared parameter out of `raw` and validate the lot as
    /// text.
    pub fn decode(&self, raw: &RawParams) -> Result<Record, ValidationError> {
        let mut input = Map::new();
        for field in self.model.fields() {
            let wire = field.wire_name();
            let decoded = style::decode(wire, self.style_for(field), &Shape::of(field.schema()), raw);
            trace!(location = %self.location, param = wire, found = decoded.is_some(), "decode parameter");
            if let Some(w) = decoded {
                input.insert(wire.to_string(), w.into_value());
            }
        }
        self.model.deserialize(&Value::Object(input), Origin::Text)
    }

    /// The inverse of [`Self::decode`].
    pub fn encode(&self, data: &Data) -> Result<RawParams, CodecError> {
        let represented = self.model.serialize(data)?;
        let mut out = match self.location {
            Location::Header => RawParams::headers(),
            _ => RawParams::new(),
        };
        for field in self.model.fields() {
            let wire = field.wire_name();
            let Some(value) = represented.get(wire) else { continue };
            let Some(w) = Wire::from_value(wire, value)? else { continue };
            for (k, v) in style::encode(wire, self.style_for(field), &w)? {
                out.push(k, v);
            }
        }
        Ok(out)
    }
}

// --------------------------------- Bodies -------------------------------- //

#[derive(Clone, Debug)]
pub struct JsonBody {
    schema: Schema,
}

impl JsonBody {
    pub fn new(schema: Schema) -> Self { JsonBody { schema } }
    pub fn schema(&self) -> &Schema { &self.schema }

    pub fn decode(&self, body: &Value) -> Result<Data, ValidationError> {
        self.schema.deserialize(body, Origin::Body)
    }
}

#[derive(Clone, Debug)]
pub struct FormBody {
    model: Model,
}

impl FormBody {
    pub fn new(model: Model) -> Self { FormBody { model } }
    pub fn model(&self) -> &Model { &self.model }

    /// Multipart when any field takes files.
    pub fn content_type(&self) -> &'static str {
        if self.model.fields().any(|f| f.schema().is_file_like()) { MULTIPART } else { URLENCODED }
    }

    pub fn decode(&self, form: &RawParams, files: &IndexMap<String, Vec<Upload>>) -> Result<Record, ValidationError> {
        let mut input = Map::new();
        for field in self.model.fields() {
            let wire = field.wire_name();
            let is_list = field.schema().data_type() == "array";
            let value = if field.schema().is_file_like() {
                let uploads = files.get(wire).map(Vec::as_slice).unwrap_or_default();
                match (is_list, uploads.first()) {
                    (_, None) => None,
                    (true, Some(_)) => Some(Value::Array(uploads.iter().map(upload_value).collect())),
                    (false, Some(first)) => Some(upload_value(first)),
                }
            } else if is_list {
                let all = form.get_all(wire);
                (!all.is_empty()).then(|| Value::Array(all.into_iter().map(Value::from).collect()))
            } else {
                form.get(wire).map(Value::from)
            };
            if let Some(v) = value {
                input.insert(wire.to_string(), v);
            }
        }
        self.model.deserialize(&Value::Object(input), Origin::Text)
    }
}

fn upload_value(u: &Upload) -> Value {
    let mut obj = Map::new();
    obj.insert("filename".into(), Value::from(u.filename.as_str()));
    if let Some(ct) = &u.content_type {
        obj.insert("content_type".into(), Value::from(ct.as_str()));
    }
    if let Some(size) = u.size {
        obj.insert("size".into(), Value::from(size));
    }
    Value::Object(obj)
}

// --------------------------------- Groups -------------------------------- //

/// One named mount point of an operation.
#[derive(Clone, Debug)]
pub enum Param {
    Params(Parameters),
    Json(JsonBody),
    Form(FormBody),
}

impl Param {
    pub fn is_body(&self) -> bool { !matches!(self, Param::Params(_)) }
}

impl From<Parameters> for Param {
    fn from(p: Parameters) -> Self { Param::Params(p) }
}

impl From<JsonBody> for Param {
    fn from(b: JsonBody) -> Self { Param::Json(b) }
}

impl From<FormBody> for Param {
    fn from(b: FormBody) -> Self { Param::Form(b) }
}
