//! Operations: a path template, a method, named parameter groups and a
//! response schema.
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::data::{Data, Record, Upload};
use crate::error::{DefinitionError, SerializeError, ValidationError};
use crate::model::{Field, Model};
use crate::param::{self, FormBody, JsonBody, Location, Param, Parameters, RawParams, Style};
use crate::schema::Schema;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Put => "put",
            Method::Post => "post",
            Method::Delete => "delete",
            Method::Options => "options",
            Method::Head => "head",
            Method::Patch => "patch",
            Method::Trace => "trace",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let m = match s.to_ascii_lowercase().as_str() {
            "get" => Method::Get,
            "put" => Method::Put,
            "post" => Method::Post,
            "delete" => Method::Delete,
            "options" => Method::Options,
            "head" => Method::Head,
            "patch" => Method::Patch,
            "trace" => Method::Trace,
            other => return Err(format!("unknown HTTP method `{other}`")),
        };
        Ok(m)
    }
}

/// A declared non-default response.
#[derive(Clone, Debug)]
pub struct Response {
    pub description: Option<String>,
    pub schema: Option<Schema>,
}

// ------------------------------- Requests -------------------------------- //

/// Request data after transport parsing: parameter multimaps, the path
/// parameters the router extracted, and the body.
#[derive(Clone, Debug, Default)]
pub struct RawRequest {
    pub query: RawParams,
    pub headers: RawParams,
    pub cookies: RawParams,
    pub path: RawParams,
    pub content_type: Option<String>,
    pub body: Option<Value>,
    pub form: RawParams,
    pub files: IndexMap<String, Vec<Upload>>,
}

impl RawRequest {
    pub fn new() -> Self {
        RawRequest { headers: RawParams::headers(), ..Default::default() }
    }

    pub fn query_string(mut self, query: &str) -> Self {
        self.query.extend(RawParams::parse_query(query));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(name, value);
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push(name, value);
        self
    }

    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path.push(name, value);
        self
    }

    pub fn content_type(mut self, media_type: impl Into<String>) -> Self {
        self.content_type = Some(media_type.into());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.content_type.get_or_insert_with(|| param::JSON.to_string());
        self.body = Some(body);
        self
    }

    pub fn form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.content_type.get_or_insert_with(|| param::URLENCODED.to_string());
        self.form.push(name, value);
        self
    }

    pub fn file(mut self, field: impl Into<String>, upload: Upload) -> Self {
        self.content_type = Some(param::MULTIPART.to_string());
        self.files.entry(field.into()).or_default().push(upload);
        self
    }

    /// Media type without parameters (`; charset=...`).
    fn media_type(&self) -> Option<&str> {
        self.content_type.as_deref().map(|ct| ct.split(';').next().unwrap_or(ct).trim())
    }
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid {location} data:\n{error}")]
    Validation { location: &'static str, error: ValidationError },
    #[error("unsupported media type {found:?}, expected `{expected}`")]
    UnsupportedMediaType { expected: &'static str, found: Option<String> },
    #[error("not found")]
    NotFound,
}

impl RequestError {
    /// HTTP status a front-end should answer with.
    pub fn status(&self) -> u16 {
        match self {
            RequestError::Validation { .. } => 422,
            RequestError::UnsupportedMediaType { .. } => 415,
            RequestError::NotFound => 404,
        }
    }
}

/// Typed request values: the path parameters plus one value per named group.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedRequest {
    pub path: Record,
    pub values: IndexMap<String, Data>,
}

impl ParsedRequest {
    pub fn get(&self, group: &str) -> Option<&Data> { self.values.get(group) }
}

// ------------------------------- Operation ------------------------------- //

#[derive(Clone, Debug)]
pub struct Operation {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) path_params: Option<Parameters>,
    pub(crate) groups: IndexMap<String, Param>,
    pub(crate) summary: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) tags: Vec<String>,
    pub(crate) deprecated: bool,
    pub(crate) operation_id: Option<String>,
    pub(crate) response: Option<Schema>,
    pub(crate) status: u16,
    pub(crate) responses: IndexMap<u16, Response>,
}

impl Operation {
    pub fn builder(method: Method, path: impl Into<String>) -> OperationBuilder {
        OperationBuilder::new(method, path)
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn groups(&self) -> impl Iterator<Item = (&str, &Param)> { self.groups.iter().map(|(k, v)| (k.as_str(), v)) }

    pub fn parse_request(&self, req: &RawRequest) -> Result<ParsedRequest, RequestError> {
        let mut out = ParsedRequest::default();
        if let Some(path) = &self.path_params {
            out.path = path.decode(&req.path).map_err(|_| RequestError::NotFound)?;
        }
        for (name, group) in &self.groups {
            let value = match group {
                Param::Params(p) => p
                    .decode(select(req, p.location()))
                    .map(Data::Record)
                    .map_err(|error| RequestError::Validation { location: p.location().as_str(), error })?,
                Param::Json(body) => {
                    expect_media(req, param::JSON)?;
                    let raw = req.body.clone().unwrap_or(Value::Null);
                    body.decode(&raw).map_err(|error| RequestError::Validation { location: "body", error })?
                }
                Param::Form(body) => {
                    expect_media(req, body.content_type())?;
                    body.decode(&req.form, &req.files)
                        .map(Data::Record)
                        .map_err(|error| RequestError::Validation { location: "body", error })?
                }
            };
            out.values.insert(name.clone(), value);
        }
        Ok(out)
    }

    pub fn serialize_response(&self, data: &Data) -> Result<Value, SerializeError> {
        match &self.response {
            Some(schema) => schema.serialize(data),
            None => Ok(Value::Null),
        }
    }
}

/// Names of the `{name}` segments, in order.
fn template_params(path: &str) -> Result<Vec<String>, &'static str> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find(['{', '}']) {
        if rest[open..].starts_with('}') {
            return Err("unbalanced `}`");
        }
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or("unclosed `{`")?;
        let name = &after[..close];
        if name.is_empty() || name.contains('{') {
            return Err("malformed parameter segment");
        }
        names.push(name.to_string());
        rest = &after[close + 1..];
    }
    Ok(names)
}

fn select(req: &RawRequest, location: Location) -> &RawParams {
    match location {
        Location::Query => &req.query,
        Location::Header => &req.headers,
        Location::Cookie => &req.cookies,
        Location::Path => &req.path,
    }
}

fn expect_media(req: &RawRequest, expected: &'static str) -> Result<(), RequestError> {
    match req.media_type() {
        Some(found) if found.eq_ignore_ascii_case(expected) => Ok(()),
        found => Err(RequestError::UnsupportedMediaType { expected, found: found.map(String::from) }),
    }
}

// -------------------------------- Builder -------------------------------- //

pub struct OperationBuilder {
    method: Method,
    path: String,
    path_schemas: IndexMap<String, Schema>,
    path_styles: IndexMap<String, Style>,
    groups: IndexMap<String, Param>,
    summary: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
    deprecated: bool,
    operation_id: Option<String>,
    response: Option<Schema>,
    status: u16,
    responses: IndexMap<u16, Response>,
}

impl OperationBuilder {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        OperationBuilder {
            method,
            path: path.into(),
            path_schemas: IndexMap::new(),
            path_styles: IndexMap::new(),
            groups: IndexMap::new(),
            summary: None,
            description: None,
            tags: Vec::new(),
            deprecated: false,
            operation_id: None,
            response: None,
            status: 200,
            responses: IndexMap::new(),
        }
    }

    /// Type of a `{name}` segment. Undeclared segments are strings.
    pub fn path_schema(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.path_schemas.insert(name.into(), schema);
        self
    }

    pub fn path_style(mut self, name: impl Into<String>, style: Style) -> Self {
        self.path_styles.insert(name.into(), style);
        self
    }

    pub fn param(mut self, name: impl Into<String>, group: impl Into<Param>) -> Self {
        self.groups.insert(name.into(), group.into());
        self
    }

    pub fn query(self, name: impl Into<String>, model: Model) -> Self { self.param(name, Parameters::query(model)) }
    pub fn json_body(self, name: impl Into<String>, schema: Schema) -> Self { self.param(name, JsonBody::new(schema)) }
    pub fn form_body(self, name: impl Into<String>, model: Model) -> Self { self.param(name, FormBody::new(model)) }

    pub fn summary(mut self, text: impl Into<String>) -> Self {
        self.summary = Some(text.into());
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    pub fn response(mut self, schema: Schema) -> Self {
        self.response = Some(schema);
        self
    }

    pub fn status(mut self, code: u16) -> Self {
        self.status = code;
        self
    }

    pub fn extra_response(mut self, code: u16, description: Option<&str>, schema: Option<Schema>) -> Self {
        self.responses.insert(code, Response { description: description.map(String::from), schema });
        self
    }

    pub fn build(self) -> Result<Operation, DefinitionError> {
        let (method, path) = (self.method, self.path);
        let invalid_path = |reason: String| DefinitionError::InvalidPath { path: path.clone(), reason };
        if !path.starts_with('/') {
            return Err(invalid_path("the path must start with a \"/\"".into()));
        }

        let names = template_params(&path).map_err(|reason| invalid_path(reason.into()))?;
        for declared in self.path_schemas.keys().chain(self.path_styles.keys()) {
            if !names.contains(declared) {
                return Err(invalid_path(format!("`{declared}` is not a parameter of the template")));
            }
        }

        let path_params = if names.is_empty() {
            None
        } else {
            let mut model = Model::builder(format!("{} {} path", method, path));
            for name in &names {
                let schema = self.path_schemas.get(name).cloned().unwrap_or_else(Schema::string);
                model = model.field(Field::new(name.clone(), schema).required(true));
            }
            let mut params = Parameters::new(Location::Path, model.build()?);
            for (name, style) in self.path_styles {
                params = params.style(name, style);
            }
            params.check()?;
            Some(params)
        };

        let conflict = |reason: &str| DefinitionError::BodyConflict {
            method: method.to_string(),
            path: path.clone(),
            reason: reason.to_string(),
        };
        let jsons = self.groups.values().filter(|g| matches!(g, Param::Json(_))).count();
        let forms = self.groups.values().filter(|g| matches!(g, Param::Form(_))).count();
        if jsons > 0 && forms > 0 {
            return Err(conflict("form and JSON bodies cannot be combined"));
        }
        if jsons + forms > 1 {
            return Err(conflict("more than one request body"));
        }
        for group in self.groups.values() {
            if let Param::Params(p) = group {
                if p.location() == Location::Path {
                    return Err(invalid_path("path parameters are declared through the template".into()));
                }
                p.check()?;
            }
        }

        debug!(%method, %path, groups = self.groups.len(), "operation built");
        Ok(Operation {
            method,
            path,
            path_params,
            groups: self.groups,
            summary: self.summary,
            description: self.description,
            tags: self.tags,
            deprecated: self.deprecated,
            operation_id: self.operation_id,
            response: self.response,
            status: self.status,
            responses: self.responses,
        })
    }
}
