//! Serde shape of a declaration document.
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::spec::Info;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeclDoc {
    pub info: Info,
    #[serde(default)]
    pub models: IndexMap<String, ModelDecl>,
    #[serde(default)]
    pub operations: Vec<OperationDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDecl {
    #[serde(default)]
    pub extends: Vec<String>,
    pub description: Option<String>,
    pub unknown_fields: Option<UnknownPolicy>,
    /// Names of the required fields; `[]` makes every field optional.
    pub required_fields: Option<Vec<String>>,
    #[serde(default)]
    pub without: Vec<String>,
    #[serde(default)]
    pub fields: IndexMap<String, FieldDecl>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownPolicy {
    Exclude,
    Include,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeName {
    String,
    Password,
    Path,
    Integer,
    Float,
    Boolean,
    Date,
    Datetime,
    File,
    Any,
    List,
    Dict,
    AnyOf,
    Model,
}

/// A type node. `type` may be left out when `model` is given.
#[derive(Debug, Default, Deserialize)]
pub struct SchemaDecl {
    #[serde(rename = "type")]
    pub kind: Option<TypeName>,
    pub model: Option<String>,
    pub item: Option<Box<SchemaDecl>>,
    pub value: Option<Box<SchemaDecl>>,
    pub any_of: Option<Vec<SchemaDecl>>,
    #[serde(default)]
    pub nullable: bool,
    pub choices: Option<Vec<Value>>,
    pub description: Option<String>,
    pub pattern: Option<String>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    #[serde(default)]
    pub exclusive_minimum: bool,
    #[serde(default)]
    pub exclusive_maximum: bool,
    pub multiple_of: Option<f64>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    #[serde(default)]
    pub unique_items: bool,
    pub min_properties: Option<usize>,
    pub max_properties: Option<usize>,
    pub with_tz: Option<bool>,
    pub required_fields: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct FieldDecl {
    #[serde(flatten)]
    pub schema: SchemaDecl,
    pub alias: Option<String>,
    pub attr: Option<String>,
    pub required: Option<bool>,
    pub default: Option<Value>,
    pub clear_value: Option<Value>,
    pub erase: Option<EraseDecl>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub write_only: bool,
    /// Error kind name → replacement text.
    #[serde(default)]
    pub error_messages: IndexMap<String, String>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EraseDecl {
    Blank,
    Empty,
    Never,
}

#[derive(Debug, Deserialize)]
pub struct StyleDecl {
    pub style: String,
    pub explode: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupDecl {
    /// A declared model, or inline `fields`.
    pub model: Option<String>,
    #[serde(default)]
    pub fields: IndexMap<String, FieldDecl>,
    #[serde(default)]
    pub styles: IndexMap<String, StyleDecl>,
}

#[derive(Debug, Deserialize)]
pub struct PathParamDecl {
    #[serde(flatten)]
    pub schema: SchemaDecl,
    pub style: Option<StyleDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyDecl {
    Json(SchemaDecl),
    Form(GroupDecl),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseDecl {
    pub description: Option<String>,
    pub schema: Option<SchemaDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationDecl {
    pub method: String,
    pub path: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub operation_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub path_params: IndexMap<String, PathParamDecl>,
    pub query: Option<GroupDecl>,
    pub header: Option<GroupDecl>,
    pub cookie: Option<GroupDecl>,
    pub body: Option<BodyDecl>,
    pub response: Option<SchemaDecl>,
    pub status: Option<u16>,
    /// Status code → extra response.
    #[serde(default)]
    pub responses: IndexMap<String, ResponseDecl>,
}
