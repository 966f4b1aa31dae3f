//! OpenAPI 3.0.3 synthesis.
//!
//! Every model reachable from the registered operations becomes one named
//! component, registered by identity the first time it is met and referenced
//! with `$ref` afterwards. Registration happens before the model's fields are
//! expanded, which is what lets self- and mutually-recursive graphs terminate.
//! Everything else expands inline.
pub mod document;

use std::collections::HashMap;

use serde_json::{Map, Value, json};
use tracing::trace;

use crate::error::SpecError;
use crate::model::{Field, FieldDefault, Model, ModelId, RequiredFields};
use crate::operation::Operation;
use crate::param::{Param, Parameters};
use crate::schema::num::NumRules;
use crate::schema::{Kind, Schema};

pub use document::{Info, OpenApi, OpenApiBuilder};

pub const OPENAPI_VERSION: &str = "3.0.3";

#[derive(Debug, Default)]
pub(crate) struct Synthesizer {
    components: Map<String, Value>,
    names: HashMap<ModelId, String>,
    /// Bodies of same-name models met after the first, checked in `finish`.
    homonyms: Vec<(String, Value)>,
}

impl Synthesizer {
    pub fn new() -> Self { Self::default() }

    // ------------------------------- Schemas ----------------------------- //

    pub fn schema(&mut self, schema: &Schema) -> Value {
        let mut out = match &schema.kind {
            Kind::Model(usage) => {
                let target = usage.target.resolve();
                self.model_use(&target, usage.required.as_ref())
            }
            Kind::AnyOf(variants) => {
                let vs: Vec<Value> = variants.iter().map(|v| self.schema(v)).collect();
                obj([("anyOf", Value::Array(vs))])
            }
            _ => self.inline(schema),
        };
        if let Value::Object(map) = &mut out {
            if schema.nullable {
                wrap_ref(map);
                map.insert("nullable".into(), Value::Bool(true));
            }
            if !schema.choices.is_empty() {
                wrap_ref(map);
                map.insert("enum".into(), Value::Array(schema.choices.clone()));
            }
            if let Some(default) = &schema.default {
                wrap_ref(map);
                map.insert("default".into(), default.clone());
            }
            if let Some(desc) = &schema.description {
                wrap_ref(map);
                map.insert("description".into(), Value::from(desc.as_str()));
            }
        }
        clean(out)
    }

    fn inline(&mut self, schema: &Schema) -> Value {
        let mut m = Map::new();
        if !matches!(schema.kind, Kind::Any) {
            m.insert("type".into(), Value::from(schema.data_type()));
        }
        if let Some(format) = schema.format() {
            m.insert("format".into(), Value::from(format));
        }
        match &schema.kind {
            Kind::String(r) | Kind::Password(r) | Kind::Path(r) => {
                if let Some(p) = &r.pattern {
                    m.insert("pattern".into(), Value::from(p.source()));
                }
                put_usize(&mut m, "minLength", r.min_length);
                put_usize(&mut m, "maxLength", r.max_length);
            }
            Kind::Integer(r) => num_keywords(&mut m, r, true),
            Kind::Float(r) => num_keywords(&mut m, r, false),
            Kind::List(r) => {
                m.insert("items".into(), self.schema(&r.item));
                put_usize(&mut m, "minItems", r.min_items);
                put_usize(&mut m, "maxItems", r.max_items);
                if r.unique_items {
                    m.insert("uniqueItems".into(), Value::Bool(true));
                }
            }
            Kind::Dict(r) => {
                m.insert("additionalProperties".into(), self.schema(&r.value));
                put_usize(&mut m, "minProperties", r.min_properties);
                put_usize(&mut m, "maxProperties", r.max_properties);
            }
            _ => {}
        }
        Value::Object(m)
    }

    /// Reference to `model`, with the use site's required list attached.
    fn model_use(&mut self, model: &Model, usage: Option<&RequiredFields>) -> Value {
        let name = self.register(model);
        let reference = json!({ "$ref": format!("#/components/schemas/{name}") });
        let required = model.required_wire_names(usage);
        if required.is_empty() {
            reference
        } else {
            json!({ "allOf": [reference, { "required": required }] })
        }
    }

    fn register(&mut self, model: &Model) -> String {
        if let Some(name) = self.names.get(&model.id()) {
            return name.clone();
        }
        let name = model.name().to_string();
        self.names.insert(model.id(), name.clone());
        if self.components.contains_key(&name) {
            let body = self.model_body(model);
            self.homonyms.push((name.clone(), body));
        } else {
            trace!(component = %name, "register component");
            self.components.insert(name.clone(), Value::Null);
            let body = self.model_body(model);
            self.components.insert(name.clone(), body);
        }
        name
    }

    fn model_body(&mut self, model: &Model) -> Value {
        let mut props = Map::new();
        for field in model.fields() {
            props.insert(field.wire_name().to_string(), self.field(field));
        }
        clean(json!({
            "type": "object",
            "title": model.name(),
            "description": model.description(),
            "properties": props,
        }))
    }

    fn field(&mut self, field: &Field) -> Value {
        let mut out = self.schema(field.schema());
        if let Value::Object(map) = &mut out {
            let extra = [
                ("readOnly", field.is_read_only()),
                ("writeOnly", field.is_write_only()),
            ];
            for (key, on) in extra {
                if on {
                    wrap_ref(map);
                    map.insert(key.into(), Value::Bool(true));
                }
            }
            if let Some(desc) = field.description.as_deref() {
                wrap_ref(map);
                map.insert("description".into(), Value::from(desc));
            }
            if let Some(d) = field_default(field) {
                wrap_ref(map);
                map.insert("default".into(), d);
            }
        }
        out
    }

    // ------------------------------ Operations --------------------------- //

    fn parameters(&mut self, params: &Parameters, always_required: bool) -> Vec<Value> {
        let model = params.model();
        model
            .fields()
            .filter(|f| !f.is_read_only())
            .map(|f| {
                let style = params.style_for(f);
                let mut schema = self.schema(f.schema());
                if let (Value::Object(map), Some(d)) = (&mut schema, field_default(f)) {
                    wrap_ref(map);
                    map.insert("default".into(), d);
                }
                clean(json!({
                    "name": f.wire_name(),
                    "in": params.location().as_str(),
                    "required": always_required || model.is_required(f, None),
                    "description": f.get_description(),
                    "schema": schema,
                    "style": style.kind.as_str(),
                    "explode": style.explode,
                }))
            })
            .collect()
    }

    pub fn operation(&mut self, op: &Operation) -> Value {
        let mut parameters = Vec::new();
        if let Some(path) = &op.path_params {
            parameters.extend(self.parameters(path, true));
        }
        let mut body = Value::Null;
        for (_, group) in op.groups() {
            match group {
                Param::Params(p) => parameters.extend(self.parameters(p, false)),
                Param::Json(b) => body = request_body(crate::param::JSON, self.schema(b.schema())),
                Param::Form(b) => {
                    let schema = self.schema(&Schema::model(b.model()));
                    body = request_body(b.content_type(), schema);
                }
            }
        }

        let mut responses = Map::new();
        let main = match &op.response {
            Some(s) => json!({
                "description": reason_phrase(op.status),
                "content": { "application/json": { "schema": self.schema(s) } },
            }),
            None => json!({ "description": reason_phrase(op.status) }),
        };
        responses.insert(op.status.to_string(), main);
        for (code, r) in &op.responses {
            let description = r.description.clone().unwrap_or_else(|| reason_phrase(*code).to_string());
            let mut entry = json!({ "description": description });
            if let Some(s) = &r.schema {
                entry["content"] = json!({ "application/json": { "schema": self.schema(s) } });
            }
            responses.insert(code.to_string(), entry);
        }

        clean(json!({
            "summary": op.summary,
            "description": op.description,
            "operationId": op.operation_id,
            "tags": op.tags,
            "deprecated": op.deprecated.then_some(true),
            "parameters": parameters,
            "requestBody": body,
            "responses": responses,
        }))
    }

    /// The `components.schemas` map, after checking same-name models agree.
    pub fn finish(self) -> Result<Map<String, Value>, SpecError> {
        for (name, body) in &self.homonyms {
            if self.components.get(name) != Some(body) {
                return Err(SpecError::ComponentNameConflict { name: name.clone() });
            }
        }
        Ok(self.components)
    }
}

/// A literal field default in wire form. Factories have no static value.
fn field_default(field: &Field) -> Option<Value> {
    match field.default_value()? {
        FieldDefault::Value(d) => field.schema().serialize(d).ok(),
        FieldDefault::Factory(_) => None,
    }
}

fn request_body(content_type: &str, schema: Value) -> Value {
    json!({ "required": true, "content": { content_type: { "schema": schema } } })
}

/// Sibling keywords next to `$ref` are ignored in 3.0, so move the
/// reference under `allOf` first.
fn wrap_ref(map: &mut Map<String, Value>) {
    if let Some(reference) = map.remove("$ref") {
        map.insert("allOf".into(), json!([{ "$ref": reference }]));
    }
}

fn num_keywords(m: &mut Map<String, Value>, r: &NumRules, integer: bool) {
    let num = |x: f64| -> Value {
        if integer && x.fract() == 0.0 && x.is_finite() {
            Value::from(x as i64)
        } else {
            serde_json::Number::from_f64(x).map(Value::Number).unwrap_or(Value::Null)
        }
    };
    if let Some(x) = r.minimum {
        m.insert("minimum".into(), num(x));
        if r.exclusive_minimum {
            m.insert("exclusiveMinimum".into(), Value::Bool(true));
        }
    }
    if let Some(x) = r.maximum {
        m.insert("maximum".into(), num(x));
        if r.exclusive_maximum {
            m.insert("exclusiveMaximum".into(), Value::Bool(true));
        }
    }
    if let Some(x) = r.multiple_of {
        m.insert("multipleOf".into(), num(x));
    }
}

fn put_usize(m: &mut Map<String, Value>, key: &str, n: Option<usize>) {
    if let Some(n) = n {
        m.insert(key.into(), Value::from(n));
    }
}

fn obj<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::Object(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

/// Drop null, `{}` and `[]` members of an object.
fn clean(v: Value) -> Value {
    match v {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| match v {
                    Value::Null => false,
                    Value::Object(m) => !m.is_empty(),
                    Value::Array(xs) => !xs.is_empty(),
                    _ => true,
                })
                .collect(),
        ),
        other => other,
    }
}

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        409 => "Conflict",
        410 => "Gone",
        412 => "Precondition Failed",
        413 => "Request Entity Too Large",
        415 => "Unsupported Media Type",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown Status Code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelSlot, RequiredFields};
    use pretty_assertions::assert_eq;

    #[test]
    fn primitives_expand_inline_without_false_flags() {
        let mut syn = Synthesizer::new();
        let s = Schema::string().min_length(1).max_length(8);
        assert_eq!(syn.schema(&s), json!({"type": "string", "minLength": 1, "maxLength": 8}));
        assert_eq!(syn.schema(&Schema::any()), json!({}));
        let n = Schema::integer().minimum(0.0).exclusive_minimum().nullable();
        assert_eq!(
            syn.schema(&n),
            json!({"type": "integer", "minimum": 0, "exclusiveMinimum": true, "nullable": true})
        );
        assert_eq!(syn.schema(&Schema::float()), json!({"type": "number", "format": "float"}));
    }

    #[test]
    fn models_are_referenced_with_use_site_required() {
        let m = Model::builder("Pet")
            .field(Field::new("name", Schema::string()))
            .field(Field::new("age", Schema::integer()).required(false))
            .build()
            .unwrap();
        let mut syn = Synthesizer::new();
        assert_eq!(
            syn.schema(&Schema::model(&m)),
            json!({"allOf": [{"$ref": "#/components/schemas/Pet"}, {"required": ["name"]}]})
        );
        let optional = Schema::model(&m).required_fields(RequiredFields::none());
        assert_eq!(syn.schema(&optional), json!({"$ref": "#/components/schemas/Pet"}));
        let components = syn.finish().unwrap();
        assert_eq!(
            components["Pet"],
            json!({
                "type": "object",
                "title": "Pet",
                "properties": {"name": {"type": "string"}, "age": {"type": "integer"}},
            })
        );
    }

    #[test]
    fn recursion_terminates_through_references() {
        let slot = ModelSlot::new("Node");
        let node = Model::builder("Node")
            .field(Field::new("children", Schema::list(Schema::lazy(&slot))).required(false))
            .build()
            .unwrap();
        slot.bind(&node).unwrap();
        let mut syn = Synthesizer::new();
        syn.schema(&Schema::model(&node));
        let components = syn.finish().unwrap();
        assert_eq!(
            components["Node"]["properties"]["children"]["items"],
            json!({"$ref": "#/components/schemas/Node"})
        );
    }

    #[test]
    fn same_name_models_merge_or_conflict() {
        let a = || Model::builder("Tag").field(Field::new("x", Schema::string())).build().unwrap();
        let mut syn = Synthesizer::new();
        syn.schema(&Schema::model(&a()));
        syn.schema(&Schema::model(&a()));
        assert_eq!(syn.finish().unwrap().len(), 1);

        let b = Model::builder("Tag").field(Field::new("x", Schema::integer())).build().unwrap();
        let mut syn = Synthesizer::new();
        syn.schema(&Schema::model(&a()));
        syn.schema(&Schema::model(&b));
        assert!(matches!(syn.finish(), Err(SpecError::ComponentNameConflict { .. })));
    }

    #[test]
    fn nullable_references_move_under_all_of() {
        let m = Model::builder("Pet").field(Field::new("name", Schema::string()).required(false)).build().unwrap();
        let mut syn = Synthesizer::new();
        assert_eq!(
            syn.schema(&Schema::model(&m).nullable()),
            json!({"allOf": [{"$ref": "#/components/schemas/Pet"}], "nullable": true})
        );
    }

    #[test]
    fn enum_and_default_beside_a_reference_move_under_all_of() {
        let m = Model::builder("Pet").field(Field::new("name", Schema::string()).required(false)).build().unwrap();
        let rex = json!({"name": "Rex"});
        let mut syn = Synthesizer::new();
        assert_eq!(
            syn.schema(&Schema::model(&m).choices([rex.clone()]).default_value(rex.clone())),
            json!({"allOf": [{"$ref": "#/components/schemas/Pet"}], "enum": [rex.clone()], "default": rex})
        );
    }
}
