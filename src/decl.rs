//! Declaration documents: models and operations described in JSON.
//!
//! ```json
//! {
//!   "info": {"title": "Books", "version": "1.0.0"},
//!   "models": {
//!     "Book": {"fields": {"title": {"type": "string", "max_length": 80}}}
//!   },
//!   "operations": [
//!     {"method": "post", "path": "/books", "body": {"json": {"model": "Book"}}}
//!   ]
//! }
//! ```
//!
//! Model references resolve by name through [`ModelSlot`]s, so models may
//! refer to themselves or to models declared later. `extends` is resolved in
//! dependency order.
pub mod doc;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::data::Data;
use crate::error::{DefinitionError, ErrorKind};
use crate::model::{Erase, Field, Model, ModelBuilder, ModelSlot, RequiredFields, UnknownFields};
use crate::operation::{Method, Operation, OperationBuilder};
use crate::param::{FormBody, JsonBody, Location, Parameters, Style, StyleKind};
use crate::schema::{Kind, Origin, Schema};
use crate::spec::OpenApi;
use doc::{
    BodyDecl, DeclDoc, EraseDecl, FieldDecl, GroupDecl, ModelDecl, OperationDecl, SchemaDecl, StyleDecl, TypeName,
    UnknownPolicy,
};

#[derive(Debug, Error)]
pub enum DeclError {
    #[error("cannot read `{path}`: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("at JSON path {path} → {message}")]
    Parse { path: String, message: String },
    #[error("unknown model `{0}`")]
    UnknownModel(String),
    #[error("inheritance cycle through model `{0}`")]
    InheritanceCycle(String),
    #[error("{context}: {message}")]
    Invalid { context: String, message: String },
    #[error(transparent)]
    Definition(#[from] DefinitionError),
}

fn invalid(context: impl Into<String>, message: impl Into<String>) -> DeclError {
    DeclError::Invalid { context: context.into(), message: message.into() }
}

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, DeclError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| DeclError::Parse {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

/// Everything a declaration document defines.
#[derive(Debug)]
pub struct Declarations {
    pub models: IndexMap<String, Model>,
    pub api: OpenApi,
}

impl Declarations {
    pub fn model(&self, name: &str) -> Result<&Model, DeclError> {
        self.models.get(name).ok_or_else(|| DeclError::UnknownModel(name.to_string()))
    }
}

pub fn load(path: &Path) -> Result<Declarations, DeclError> {
    let src = std::fs::read_to_string(path).map_err(|source| DeclError::Io { path: path.to_path_buf(), source })?;
    from_str(&src)
}

pub fn from_str(src: &str) -> Result<Declarations, DeclError> {
    let doc: DeclDoc = from_str_with_path(src)?;
    Loader::new(&doc).run(doc)
}

// -------------------------------- Loader --------------------------------- //

struct Loader {
    slots: IndexMap<String, ModelSlot>,
    built: IndexMap<String, Model>,
}

impl Loader {
    fn new(doc: &DeclDoc) -> Self {
        let slots = doc.models.keys().map(|name| (name.clone(), ModelSlot::new(name.clone()))).collect();
        Loader { slots, built: IndexMap::new() }
    }

    fn run(mut self, doc: DeclDoc) -> Result<Declarations, DeclError> {
        for name in build_order(&doc.models)? {
            let model = self.model(&name, &doc.models[&name])?;
            self.slots[&name].bind(&model)?;
            self.built.insert(name, model);
        }
        // keep declaration order
        let mut models = IndexMap::new();
        for name in doc.models.keys() {
            if let Some(m) = self.built.get(name) {
                models.insert(name.clone(), m.clone());
            }
        }

        let mut api = OpenApi::builder(doc.info.title.clone(), doc.info.version.clone()).info(doc.info);
        for (i, op) in doc.operations.iter().enumerate() {
            api = api.operation(self.operation(i, op)?);
        }
        let api = api.build()?;
        debug!(models = models.len(), operations = api.operations().len(), "declarations loaded");
        Ok(Declarations { models, api })
    }

    fn model(&self, name: &str, decl: &ModelDecl) -> Result<Model, DeclError> {
        let mut b = Model::builder(name);
        for parent in &decl.extends {
            let p = self.built.get(parent).ok_or_else(|| DeclError::UnknownModel(parent.clone()))?;
            b = b.extends(p);
        }
        if let Some(d) = &decl.description {
            b = b.description(d.clone());
        }
        if let Some(policy) = decl.unknown_fields {
            b = b.unknown_fields(match policy {
                UnknownPolicy::Exclude => UnknownFields::Exclude,
                UnknownPolicy::Include => UnknownFields::Include,
                UnknownPolicy::Error => UnknownFields::Error,
            });
        }
        if let Some(names) = &decl.required_fields {
            b = b.required_fields(RequiredFields::only(names.iter().cloned()));
        }
        for removed in &decl.without {
            b = b.without(removed.clone());
        }
        self.fields(b, name, &decl.fields)?.build().map_err(Into::into)
    }

    fn fields(
        &self,
        mut b: ModelBuilder,
        owner: &str,
        fields: &IndexMap<String, FieldDecl>,
    ) -> Result<ModelBuilder, DeclError> {
        for (name, decl) in fields {
            b = b.field(self.field(owner, name, decl)?);
        }
        Ok(b)
    }

    fn field(&self, owner: &str, name: &str, decl: &FieldDecl) -> Result<Field, DeclError> {
        let context = format!("{owner}.{name}");
        let schema = self.schema(&context, &decl.schema)?;
        let mut f = Field::new(name, schema.clone());
        if let Some(a) = &decl.alias { f = f.alias(a.clone()); }
        if let Some(a) = &decl.attr { f = f.attr(a.clone()); }
        if let Some(r) = decl.required { f = f.required(r); }
        if let Some(raw) = &decl.default {
            // model-typed defaults are kept as written: their slot may not be bound yet
            let value = if mentions_model(&schema) {
                Data::from(raw.clone())
            } else {
                schema
                    .deserialize(raw, Origin::Body)
                    .map_err(|e| invalid(&context, format!("invalid default: {e}")))?
            };
            f = f.default(value);
        }
        if let Some(v) = &decl.clear_value { f = f.clear_value(v.clone()); }
        if let Some(e) = decl.erase {
            f = f.erase(match e {
                EraseDecl::Blank => Erase::Blank,
                EraseDecl::Empty => Erase::Empty,
                EraseDecl::Never => Erase::Never,
            });
        }
        if decl.read_only { f = f.read_only(); }
        if decl.write_only { f = f.write_only(); }
        for (kind, text) in &decl.error_messages {
            let kind = ErrorKind::parse(kind).ok_or_else(|| invalid(&context, format!("unknown error kind `{kind}`")))?;
            f = f.error_message(kind, text.clone());
        }
        Ok(f)
    }

    fn schema(&self, context: &str, decl: &SchemaDecl) -> Result<Schema, DeclError> {
        let kind = match (decl.kind, &decl.model) {
            (Some(k), _) => k,
            (None, Some(_)) => TypeName::Model,
            (None, None) => TypeName::Any,
        };
        let nested = |d: &Option<Box<SchemaDecl>>| -> Result<Schema, DeclError> {
            match d {
                Some(d) => self.schema(context, d),
                None => Ok(Schema::any()),
            }
        };
        let mut s = match kind {
            TypeName::String => Schema::string(),
            TypeName::Password => Schema::password(),
            TypeName::Path => Schema::path(),
            TypeName::Integer => Schema::integer(),
            TypeName::Float => Schema::float(),
            TypeName::Boolean => Schema::boolean(),
            TypeName::Date => Schema::date(),
            TypeName::Datetime => Schema::datetime(),
            TypeName::File => Schema::file(),
            TypeName::Any => Schema::any(),
            TypeName::List => Schema::list(nested(&decl.item)?),
            TypeName::Dict => Schema::dict(nested(&decl.value)?),
            TypeName::AnyOf => {
                let variants = decl.any_of.as_deref().unwrap_or_default();
                if variants.is_empty() {
                    return Err(invalid(context, "`any_of` needs at least one variant"));
                }
                Schema::any_of(variants.iter().map(|v| self.schema(context, v)).collect::<Result<Vec<_>, _>>()?)
            }
            TypeName::Model => {
                let name = decl.model.as_deref().ok_or_else(|| invalid(context, "`model` is missing"))?;
                let slot = self.slots.get(name).ok_or_else(|| DeclError::UnknownModel(name.to_string()))?;
                Schema::lazy(slot)
            }
        };

        if let Some(p) = &decl.pattern { s = s.pattern(p)?; }
        if let Some(n) = decl.min_length { s = s.min_length(n); }
        if let Some(n) = decl.max_length { s = s.max_length(n); }
        if let Some(x) = decl.minimum { s = s.minimum(x); }
        if let Some(x) = decl.maximum { s = s.maximum(x); }
        if decl.exclusive_minimum { s = s.exclusive_minimum(); }
        if decl.exclusive_maximum { s = s.exclusive_maximum(); }
        if let Some(x) = decl.multiple_of { s = s.multiple_of(x); }
        if let Some(n) = decl.min_items { s = s.min_items(n); }
        if let Some(n) = decl.max_items { s = s.max_items(n); }
        if decl.unique_items { s = s.unique_items(); }
        if let Some(n) = decl.min_properties { s = s.min_properties(n); }
        if let Some(n) = decl.max_properties { s = s.max_properties(n); }
        if let Some(tz) = decl.with_tz { s = s.with_tz(tz); }
        if let Some(names) = &decl.required_fields {
            s = s.required_fields(RequiredFields::only(names.iter().cloned()));
        }
        if decl.nullable { s = s.nullable(); }
        if let Some(c) = &decl.choices { s = s.choices(c.iter().cloned()); }
        if let Some(d) = &decl.description { s = s.description(d.clone()); }
        Ok(s)
    }

    // ------------------------------ Operations --------------------------- //

    fn operation(&self, index: usize, decl: &OperationDecl) -> Result<Operation, DeclError> {
        let context = format!("operations[{index}] {} {}", decl.method, decl.path);
        let method: Method = decl.method.parse().map_err(|e: String| invalid(&context, e))?;
        let mut b = OperationBuilder::new(method, decl.path.clone());

        for (name, p) in &decl.path_params {
            b = b.path_schema(name.clone(), self.schema(&context, &p.schema)?);
            if let Some(style) = &p.style {
                b = b.path_style(name.clone(), style_of(&context, Location::Path, style)?);
            }
        }
        let prefix = inline_prefix(decl);
        let groups = [
            ("query", Location::Query, &decl.query),
            ("header", Location::Header, &decl.header),
            ("cookie", Location::Cookie, &decl.cookie),
        ];
        for (name, location, group) in groups {
            if let Some(g) = group {
                let model = self.group_model(&context, &format!("{prefix}{}", pascal(name)), g)?;
                let mut params = Parameters::new(location, model);
                for (field, style) in &g.styles {
                    params = params.style(field.clone(), style_of(&context, location, style)?);
                }
                b = b.param(name, params);
            }
        }
        match &decl.body {
            Some(BodyDecl::Json(s)) => b = b.param("body", JsonBody::new(self.schema(&context, s)?)),
            Some(BodyDecl::Form(g)) => {
                let model = self.group_model(&context, &format!("{prefix}Form"), g)?;
                b = b.param("body", FormBody::new(model));
            }
            None => {}
        }

        if let Some(s) = &decl.summary { b = b.summary(s.clone()); }
        if let Some(d) = &decl.description { b = b.description(d.clone()); }
        if let Some(id) = &decl.operation_id { b = b.operation_id(id.clone()); }
        for t in &decl.tags { b = b.tag(t.clone()); }
        if decl.deprecated { b = b.deprecated(); }
        if let Some(r) = &decl.response { b = b.response(self.schema(&context, r)?); }
        if let Some(code) = decl.status { b = b.status(code); }
        for (code, r) in &decl.responses {
            let code: u16 = code.parse().map_err(|_| invalid(&context, format!("`{code}` is not a status code")))?;
            let schema = r.schema.as_ref().map(|s| self.schema(&context, s)).transpose()?;
            b = b.extra_response(code, r.description.as_deref(), schema);
        }
        Ok(b.build()?)
    }

    /// A group's model: a declared one by name, or one named `inline_name`
    /// built from inline fields.
    fn group_model(&self, context: &str, inline_name: &str, decl: &GroupDecl) -> Result<Model, DeclError> {
        match &decl.model {
            Some(name) if decl.fields.is_empty() => {
                self.built.get(name).cloned().ok_or_else(|| DeclError::UnknownModel(name.clone()))
            }
            Some(_) => Err(invalid(context, format!("{inline_name}: give either `model` or `fields`"))),
            None => {
                let b = self.fields(Model::builder(inline_name), inline_name, &decl.fields)?;
                Ok(b.build()?)
            }
        }
    }
}

/// Component-safe name stem for inline group models: the operation id, or
/// method and literal path segments (`post /shelves/{id}/books` → `PostShelvesBooks`).
fn inline_prefix(decl: &OperationDecl) -> String {
    match &decl.operation_id {
        Some(id) => pascal(id),
        None => {
            let mut out = pascal(&decl.method);
            for seg in decl.path.split('/').filter(|s| !s.is_empty() && !s.starts_with('{')) {
                out.push_str(&pascal(seg));
            }
            out
        }
    }
}

fn pascal(s: &str) -> String {
    s.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut cs = w.chars();
            match cs.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &cs.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect()
}

fn mentions_model(s: &Schema) -> bool {
    match s.kind() {
        Kind::Model(_) => true,
        Kind::List(r) => mentions_model(&r.item),
        Kind::Dict(r) => mentions_model(&r.value),
        Kind::AnyOf(vs) => vs.iter().any(mentions_model),
        _ => false,
    }
}

fn style_of(context: &str, location: Location, decl: &StyleDecl) -> Result<Style, DeclError> {
    let kind = StyleKind::parse(&decl.style).ok_or_else(|| invalid(context, format!("unknown style `{}`", decl.style)))?;
    let default = location.default_style();
    let explode = decl.explode.unwrap_or(match kind {
        StyleKind::DeepObject => true,
        k if k == default.kind => default.explode,
        _ => false,
    });
    Ok(Style::new(kind, explode))
}

/// Parents before children. Unknown parents and cycles are errors.
fn build_order(models: &IndexMap<String, ModelDecl>) -> Result<Vec<String>, DeclError> {
    fn visit(
        name: &str,
        models: &IndexMap<String, ModelDecl>,
        done: &mut HashSet<String>,
        active: &mut Vec<String>,
        out: &mut Vec<String>,
    ) -> Result<(), DeclError> {
        if done.contains(name) {
            return Ok(());
        }
        if active.iter().any(|a| a == name) {
            return Err(DeclError::InheritanceCycle(name.to_string()));
        }
        let decl = models.get(name).ok_or_else(|| DeclError::UnknownModel(name.to_string()))?;
        active.push(name.to_string());
        for parent in &decl.extends {
            visit(parent, models, done, active, out)?;
        }
        active.pop();
        done.insert(name.to_string());
        out.push(name.to_string());
        Ok(())
    }

    let (mut done, mut active, mut out) = (HashSet::new(), Vec::new(), Vec::new());
    for name in models.keys() {
        visit(name, models, &mut done, &mut active, &mut out)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LIBRARY: &str = r#"{
        "info": {"title": "Library", "version": "2.1.0"},
        "models": {
            "Book": {
                "extends": ["Item"],
                "fields": {
                    "title": {"type": "string", "max_length": 20},
                    "author": {"model": "Author"},
                    "tags": {"type": "list", "item": {"type": "string"}, "required": false}
                }
            },
            "Item": {"fields": {"id": {"type": "integer", "read_only": true, "required": false}}},
            "Author": {
                "fields": {
                    "name": {"type": "string"},
                    "mentor": {"model": "Author", "nullable": true, "required": false}
                }
            }
        },
        "operations": [
            {
                "method": "get",
                "path": "/books",
                "query": {
                    "fields": {"tags": {"type": "list", "item": {"type": "string"}, "required": false}},
                    "styles": {"tags": {"style": "form", "explode": false}}
                },
                "response": {"type": "list", "item": {"model": "Book"}}
            },
            {"method": "post", "path": "/books", "body": {"json": {"model": "Book"}}, "status": 201}
        ]
    }"#;

    #[test]
    fn loads_models_in_dependency_order() {
        let decls = from_str(LIBRARY).unwrap();
        let names: Vec<_> = decls.models.keys().cloned().collect();
        assert_eq!(names, vec!["Book", "Item", "Author"]);
        let book = decls.model("Book").unwrap();
        let fields: Vec<_> = book.fields().map(|f| f.name()).collect();
        assert_eq!(fields, vec!["id", "title", "author", "tags"]);
    }

    #[test]
    fn recursive_references_validate() {
        let decls = from_str(LIBRARY).unwrap();
        let author = decls.model("Author").unwrap();
        let err = author
            .deserialize(&json!({"name": "A", "mentor": {"name": "B", "mentor": {}}}), Origin::Body)
            .unwrap_err();
        assert_eq!(err.to_string(), "mentor.mentor.name: This field is required.");
    }

    #[test]
    fn query_styles_are_honoured() {
        let decls = from_str(LIBRARY).unwrap();
        let op = decls.api.find(Method::Get, "/books").unwrap();
        let parsed = op
            .parse_request(&crate::operation::RawRequest::new().query_string("tags=red,blue"))
            .unwrap();
        let query = parsed.get("query").and_then(Data::as_record).unwrap();
        assert_eq!(query.get("tags"), Some(&Data::from(vec!["red", "blue"])));
    }

    #[test]
    fn parse_errors_carry_the_json_path() {
        let err = from_str(r#"{"info": {"title": "t", "version": "1"}, "models": {"A": {"fields": {"x": {"type": "strin"}}}}}"#)
            .unwrap_err();
        match err {
            DeclError::Parse { path, .. } => assert!(path.starts_with("models.A.fields.x"), "{path}"),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn inheritance_cycles_are_rejected() {
        let err = from_str(
            r#"{"info": {"title": "t", "version": "1"},
                "models": {"A": {"extends": ["B"]}, "B": {"extends": ["A"]}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DeclError::InheritanceCycle(_)), "{err}");
    }

    #[test]
    fn unknown_model_references_are_rejected() {
        let err = from_str(
            r#"{"info": {"title": "t", "version": "1"},
                "models": {"A": {"fields": {"b": {"model": "Ghost"}}}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DeclError::UnknownModel(ref n) if n == "Ghost"));
    }

    #[test]
    fn inline_groups_get_component_safe_names() {
        let decls = from_str(
            r#"{"info": {"title": "t", "version": "1"},
                "operations": [{"method": "post", "path": "/shelves/{id}/books",
                                "body": {"form": {"fields": {"title": {"type": "string"}}}}}]}"#,
        )
        .unwrap();
        let doc = decls.api.document().unwrap();
        assert!(doc["components"]["schemas"].get("PostShelvesBooksForm").is_some());
        assert_eq!(pascal("list_books"), "ListBooks");
    }

    #[test]
    fn explicit_styles_default_their_explode_flag() {
        let s = StyleDecl { style: "form".into(), explode: None };
        assert_eq!(style_of("t", Location::Query, &s).unwrap(), Style::form(true));
        assert_eq!(style_of("t", Location::Cookie, &s).unwrap(), Style::form(false));
        let d = StyleDecl { style: "deepObject".into(), explode: None };
        assert_eq!(style_of("t", Location::Query, &d).unwrap(), Style::deep_object());
    }
}
