use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use super::{OPENAPI_VERSION, Synthesizer};
use crate::error::{DefinitionError, SpecError};
use crate::operation::{Method, Operation};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A set of operations and the document describing them. The document is
/// synthesized once, by [`OpenApiBuilder::build`], and shared by every reader.
#[derive(Debug)]
pub struct OpenApi {
    info: Info,
    operations: Vec<Operation>,
    document: OnceCell<Value>,
}

impl OpenApi {
    pub fn builder(title: impl Into<String>, version: impl Into<String>) -> OpenApiBuilder {
        OpenApiBuilder {
            info: Info { title: title.into(), version: version.into(), description: None },
            operations: Vec::new(),
        }
    }

    pub fn info(&self) -> &Info { &self.info }
    pub fn operations(&self) -> &[Operation] { &self.operations }

    pub fn find(&self, method: Method, path: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.method() == method && op.path() == path)
    }

    pub fn document(&self) -> Result<&Value, SpecError> {
        self.document.get_or_try_init(|| synthesize(&self.info, &self.operations))
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, SpecError> {
        let doc = self.document()?;
        let out = if pretty { serde_json::to_string_pretty(doc)? } else { serde_json::to_string(doc)? };
        Ok(out)
    }
}

pub struct OpenApiBuilder {
    info: Info,
    operations: Vec<Operation>,
}

impl OpenApiBuilder {
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.info.description = Some(text.into());
        self
    }

    pub fn info(mut self, info: Info) -> Self {
        self.info = info;
        self
    }

    pub fn operation(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    pub fn build(self) -> Result<OpenApi, DefinitionError> {
        for (i, op) in self.operations.iter().enumerate() {
            let dup = self.operations[..i]
                .iter()
                .any(|o| o.method() == op.method() && o.path() == op.path());
            if dup {
                return Err(DefinitionError::DuplicateOperation {
                    method: op.method().to_string(),
                    path: op.path().to_string(),
                });
            }
        }
        let document = match synthesize(&self.info, &self.operations) {
            Ok(doc) => OnceCell::with_value(doc),
            Err(SpecError::ComponentNameConflict { name }) => {
                return Err(DefinitionError::ComponentNameConflict { name });
            }
            // rendering failures resurface from `document()`
            Err(SpecError::Render(_)) => OnceCell::new(),
        };
        Ok(OpenApi { info: self.info, operations: self.operations, document })
    }
}

fn synthesize(info: &Info, operations: &[Operation]) -> Result<Value, SpecError> {
    let mut syn = Synthesizer::new();
    let mut paths = Map::new();
    for op in operations {
        let entry = syn.operation(op);
        let item = paths.entry(op.path().to_string()).or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(methods) = item {
            methods.insert(op.method().as_str().to_string(), entry);
        }
    }
    let schemas = syn.finish()?;
    debug!(paths = paths.len(), components = schemas.len(), "document synthesized");

    let mut doc = json!({
        "openapi": OPENAPI_VERSION,
        "info": info,
        "paths": paths,
    });
    if !schemas.is_empty() {
        doc["components"] = json!({ "schemas": schemas });
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, Model};
    use crate::schema::Schema;
    use pretty_assertions::assert_eq;

    fn api() -> OpenApi {
        let pet = Model::builder("Pet").field(Field::new("name", Schema::string())).build().unwrap();
        OpenApi::builder("Pets", "1.0.0")
            .operation(
                Operation::builder(Method::Get, "/pets/{id}")
                    .path_schema("id", Schema::integer())
                    .response(Schema::model(&pet))
                    .build()
                    .unwrap(),
            )
            .operation(Operation::builder(Method::Delete, "/pets/{id}").status(204).build().unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn document_groups_methods_under_paths() {
        let doc = api().document().unwrap().clone();
        assert_eq!(doc["openapi"], json!("3.0.3"));
        assert_eq!(doc["info"], json!({"title": "Pets", "version": "1.0.0"}));
        assert_eq!(
            doc["paths"]["/pets/{id}"]["get"]["parameters"],
            json!([{
                "name": "id", "in": "path", "required": true,
                "schema": {"type": "integer"}, "style": "simple", "explode": false,
            }])
        );
        assert_eq!(doc["paths"]["/pets/{id}"]["delete"]["responses"], json!({"204": {"description": "No Content"}}));
        assert_eq!(
            doc["paths"]["/pets/{id}"]["get"]["responses"]["200"]["content"]["application/json"]["schema"],
            json!({"allOf": [{"$ref": "#/components/schemas/Pet"}, {"required": ["name"]}]})
        );
    }

    #[test]
    fn document_is_cached_and_rendering_is_stable() {
        let api = api();
        let first = api.document().unwrap() as *const Value;
        let second = api.document().unwrap() as *const Value;
        assert_eq!(first, second);
        assert_eq!(api.to_json(false).unwrap(), api.to_json(false).unwrap());
        assert_eq!(api.to_json(false).unwrap(), serde_json::to_string(&synthesize(api.info(), api.operations()).unwrap()).unwrap());
    }

    #[test]
    fn duplicate_operations_are_rejected() {
        let op = || Operation::builder(Method::Get, "/x").build().unwrap();
        let err = OpenApi::builder("t", "1").operation(op()).operation(op()).build().unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateOperation { .. }));
    }

    #[test]
    fn build_fills_the_document() {
        let api = api();
        assert!(api.document.get().is_some());
    }

    #[test]
    fn same_name_models_fail_the_build() {
        let tag = |schema| Model::builder("Tag").field(Field::new("x", schema)).build().unwrap();
        let (a, b) = (tag(Schema::string()), tag(Schema::integer()));
        let result = OpenApi::builder("Tags", "1")
            .operation(Operation::builder(Method::Get, "/a").response(Schema::model(&a)).build().unwrap())
            .operation(Operation::builder(Method::Get, "/b").response(Schema::model(&b)).build().unwrap())
            .build();
        assert!(result.is_err());
        assert!(matches!(result, Err(DefinitionError::ComponentNameConflict { ref name }) if name == "Tag"));
    }
}
