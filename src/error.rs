//! Error types.
//!
//! - [`ValidationError`] is the per-call, path-qualified aggregation of every
//!   failure one deserialization produced. It never aborts a call.
//! - [`DefinitionError`] is raised while models, parameters and operations are
//!   declared. Treat it as fatal at startup.
//! - [`SerializeError`] and [`CodecError`] are programmer defects discovered
//!   while producing wire values.
//! - [`SpecError`] surfaces when a document is synthesized or rendered.
use std::fmt;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use thiserror::Error;

// ------------------------------- Location -------------------------------- //

/// One path segment: an object key (wire name) or a list index.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Loc {
    Key(String),
    Index(usize),
}

impl Loc {
    pub fn to_json(&self) -> Value {
        match self {
            Loc::Key(k) => Value::String(k.clone()),
            Loc::Index(i) => Value::from(*i),
        }
    }
}

impl From<&str> for Loc {
    fn from(value: &str) -> Self { Loc::Key(value.to_string()) }
}

impl From<String> for Loc {
    fn from(value: String) -> Self { Loc::Key(value) }
}

impl From<usize> for Loc {
    fn from(value: usize) -> Self { Loc::Index(value) }
}

/// Render a path the way humans read it: `items[2].author.name`.
pub fn path_string(path: &[Loc]) -> String {
    let mut out = String::new();
    for seg in path {
        match seg {
            Loc::Key(k) => {
                if !out.is_empty() { out.push('.'); }
                out.push_str(k);
            }
            Loc::Index(i) => {
                out.push('[');
                out.push_str(&i.to_string());
                out.push(']');
            }
        }
    }
    if out.is_empty() { "$".to_string() } else { out }
}

// ------------------------------ Error kinds ------------------------------ //

/// Category of a single validation message. Field-level overrides
/// (`Field::error_message`) replace message text by kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Required,
    Null,
    Invalid,
    Choices,
    Pattern,
    MinLength,
    MaxLength,
    Minimum,
    Maximum,
    MultipleOf,
    MinItems,
    MaxItems,
    UniqueItems,
    MinProperties,
    MaxProperties,
    UnknownField,
    Timezone,
    Custom,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Required => "required",
            ErrorKind::Null => "null",
            ErrorKind::Invalid => "invalid",
            ErrorKind::Choices => "choices",
            ErrorKind::Pattern => "pattern",
            ErrorKind::MinLength => "min_length",
            ErrorKind::MaxLength => "max_length",
            ErrorKind::Minimum => "minimum",
            ErrorKind::Maximum => "maximum",
            ErrorKind::MultipleOf => "multiple_of",
            ErrorKind::MinItems => "min_items",
            ErrorKind::MaxItems => "max_items",
            ErrorKind::UniqueItems => "unique_items",
            ErrorKind::MinProperties => "min_properties",
            ErrorKind::MaxProperties => "max_properties",
            ErrorKind::UnknownField => "unknown_field",
            ErrorKind::Timezone => "timezone",
            ErrorKind::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        const ALL: [ErrorKind; 18] = [
            ErrorKind::Required, ErrorKind::Null, ErrorKind::Invalid, ErrorKind::Choices,
            ErrorKind::Pattern, ErrorKind::MinLength, ErrorKind::MaxLength, ErrorKind::Minimum,
            ErrorKind::Maximum, ErrorKind::MultipleOf, ErrorKind::MinItems, ErrorKind::MaxItems,
            ErrorKind::UniqueItems, ErrorKind::MinProperties, ErrorKind::MaxProperties,
            ErrorKind::UnknownField, ErrorKind::Timezone, ErrorKind::Custom,
        ];
        ALL.into_iter().find(|k| k.as_str() == s)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub kind: ErrorKind,
    pub text: String,
}

// ---------------------------- ValidationError ---------------------------- //

/// Recursive validation failure.
///
/// `loc` is relative to the parent. A leaf carries messages and no children;
/// containers carry one child per failing key or index. Union failures are
/// stored as one child per variant with an empty `loc`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationError {
    loc: Vec<Loc>,
    msgs: Vec<Message>,
    children: Vec<ValidationError>,
}

impl ValidationError {
    /// An empty accumulator. Push into it, then check [`Self::is_empty`].
    pub fn new() -> Self { Self::default() }

    pub fn with_kind(kind: ErrorKind, text: impl Into<String>) -> Self {
        let mut out = Self::default();
        out.push_msg(kind, text);
        out
    }

    /// A custom message, the usual way hooks report failures.
    pub fn msg(text: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Custom, text)
    }

    pub fn required() -> Self {
        Self::with_kind(ErrorKind::Required, "This field is required.")
    }

    pub fn null() -> Self {
        Self::with_kind(ErrorKind::Null, "The value cannot be null.")
    }

    pub fn invalid(text: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Invalid, text)
    }

    pub fn is_empty(&self) -> bool {
        self.msgs.is_empty() && self.children.is_empty()
    }

    pub fn loc(&self) -> &[Loc] { &self.loc }
    pub fn children(&self) -> &[ValidationError] { &self.children }
    pub fn messages(&self) -> impl Iterator<Item = &Message> { self.msgs.iter() }

    pub fn push_msg(&mut self, kind: ErrorKind, text: impl Into<String>) {
        self.msgs.push(Message { kind, text: text.into() });
    }

    /// Nest `child` under `seg`. A second child under the same segment is
    /// merged into the first one.
    pub fn push_child(&mut self, seg: impl Into<Loc>, mut child: ValidationError) {
        if child.is_empty() { return; }
        child.loc.insert(0, seg.into());
        match self.children.iter_mut().find(|c| c.loc == child.loc) {
            Some(existing) => existing.absorb(child),
            None => self.children.push(child),
        }
    }

    /// One union variant's failure; kept as its own child, never merged.
    pub fn push_variant(&mut self, child: ValidationError) {
        self.children.push(child);
    }

    /// Merge `other`'s messages and children into `self` at the same location.
    pub fn absorb(&mut self, other: ValidationError) {
        self.msgs.extend(other.msgs);
        for child in other.children {
            match self.children.iter_mut().find(|c| !c.loc.is_empty() && c.loc == child.loc) {
                Some(existing) => existing.absorb(child),
                None => self.children.push(child),
            }
        }
    }

    /// Replace the text of this node's own messages by kind. Children keep
    /// their messages.
    pub fn override_messages(&mut self, overrides: &IndexMap<ErrorKind, String>) {
        if overrides.is_empty() { return; }
        for m in &mut self.msgs {
            if let Some(text) = overrides.get(&m.kind) {
                m.text = text.clone();
            }
        }
    }

    pub fn into_result<T>(self, ok: T) -> Result<T, ValidationError> {
        if self.is_empty() { Ok(ok) } else { Err(self) }
    }

    /// One `(absolute path, message)` pair per underlying failure.
    pub fn flatten(&self) -> Vec<(Vec<Loc>, String)> {
        let mut out = Vec::new();
        self.flatten_into(&[], &mut out);
        out
    }

    fn flatten_into(&self, prefix: &[Loc], out: &mut Vec<(Vec<Loc>, String)>) {
        let mut here = prefix.to_vec();
        here.extend(self.loc.iter().cloned());
        for m in &self.msgs {
            out.push((here.clone(), m.text.clone()));
        }
        for c in &self.children {
            c.flatten_into(&here, out);
        }
    }

    /// Grouped `[{"msgs": [...], "loc": [...]}]` view; `loc` is omitted at the
    /// root.
    pub fn format_errors(&self) -> Value {
        let mut grouped: IndexMap<Vec<Loc>, Vec<String>> = IndexMap::new();
        for (loc, msg) in self.flatten() {
            grouped.entry(loc).or_default().push(msg);
        }
        let entries = grouped
            .into_iter()
            .map(|(loc, msgs)| {
                let mut obj = Map::new();
                obj.insert("msgs".into(), Value::from(msgs));
                if !loc.is_empty() {
                    obj.insert("loc".into(), Value::Array(loc.iter().map(Loc::to_json).collect()));
                }
                Value::Object(obj)
            })
            .collect();
        Value::Array(entries)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (loc, msg) in self.flatten() {
            if !first { writeln!(f)?; }
            first = false;
            if loc.is_empty() {
                write!(f, "{msg}")?;
            } else {
                write!(f, "{}: {msg}", path_string(&loc))?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------- DefinitionError ---------------------------- //

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("model `{model}` declares field `{field}` more than once")]
    DuplicateField { model: String, field: String },
    #[error("model `{model}` declares more than one hook for field `{field}`")]
    DuplicateHook { model: String, field: String },
    #[error("model `{model}` cannot hook field `{field}`: already hooked by ancestor `{ancestor}`")]
    HookOverride { model: String, field: String, ancestor: String },
    #[error("model `{model}` declares more than one getter for field `{field}`")]
    DuplicateGetter { model: String, field: String },
    #[error("model `{model}` has no field `{field}`")]
    UnknownField { model: String, field: String },
    #[error("model `{model}` overrides field `{field}` of type `{ancestor_type}` with incompatible type `{new_type}`")]
    IncompatibleOverride { model: String, field: String, ancestor_type: String, new_type: String },
    #[error("field `{field}` cannot be both read-only and write-only")]
    ReadWriteConflict { field: String },
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern { pattern: String, #[source] source: regex::Error },
    #[error("model slot `{name}` is already bound")]
    SlotAlreadyBound { name: String },
    #[error("parameter `{name}`: style {style}/explode={explode} is not supported for {location} {shape} values")]
    InvalidStyle { name: String, location: String, style: String, explode: bool, shape: String },
    #[error("invalid path template `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("operation {method} {path}: {reason}")]
    BodyConflict { method: String, path: String, reason: String },
    #[error("operation {method} {path} is declared twice")]
    DuplicateOperation { method: String, path: String },
    #[error("two different models are both named `{name}` and their schemas differ")]
    ComponentNameConflict { name: String },
}

// ----------------------------- SerializeError ---------------------------- //

#[derive(Clone, Debug, Error, PartialEq)]
pub enum SerializeError {
    #[error("at `{}`: null value for a non-nullable schema", path_string(.path))]
    Null { path: Vec<Loc> },
    #[error("at `{}`: missing attribute `{attr}`", path_string(.path))]
    MissingAttribute { path: Vec<Loc>, attr: String },
    #[error("at `{}`: expected {expected}, found {found}", path_string(.path))]
    TypeMismatch { path: Vec<Loc>, expected: &'static str, found: &'static str },
    #[error("at `{}`: {kind} values cannot be serialized", path_string(.path))]
    Unsupported { path: Vec<Loc>, kind: &'static str },
}

impl SerializeError {
    pub fn path(&self) -> &[Loc] {
        match self {
            SerializeError::Null { path }
            | SerializeError::MissingAttribute { path, .. }
            | SerializeError::TypeMismatch { path, .. }
            | SerializeError::Unsupported { path, .. } => path,
        }
    }

    /// Prefix the error path with `seg` while unwinding out of a container.
    pub(crate) fn at(mut self, seg: impl Into<Loc>) -> Self {
        let path = match &mut self {
            SerializeError::Null { path }
            | SerializeError::MissingAttribute { path, .. }
            | SerializeError::TypeMismatch { path, .. }
            | SerializeError::Unsupported { path, .. } => path,
        };
        path.insert(0, seg.into());
        self
    }
}

// ------------------------------- CodecError ------------------------------ //

#[derive(Clone, Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("parameter `{name}`: value `{value}` contains the delimiter `{delimiter}`")]
    ContainsDelimiter { name: String, value: String, delimiter: char },
    #[error("parameter `{name}`: a single empty element cannot be encoded with a joined style")]
    LoneEmptyElement { name: String },
    #[error("parameter `{name}`: {style} cannot encode {shape} values")]
    ShapeMismatch { name: String, style: String, shape: String },
    #[error("parameter `{name}`: nested value at `{key}` cannot be encoded as text")]
    NotText { name: String, key: String },
    #[error(transparent)]
    Serialize(#[from] SerializeError),
}

// ------------------------------- SpecError ------------------------------- //

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("two different models are both named `{name}` and their schemas differ")]
    ComponentNameConflict { name: String },
    #[error("cannot render document: {0}")]
    Render(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_children_keep_full_depth() {
        let mut name = ValidationError::new();
        name.push_child("name", ValidationError::required());
        let mut author = ValidationError::new();
        author.push_child("author", name);
        let mut root = ValidationError::new();
        root.push_child(Loc::Index(2), author);
        let mut top = ValidationError::new();
        top.push_child("items", root);

        let flat = top.flatten();
        assert_eq!(flat.len(), 1);
        assert_eq!(path_string(&flat[0].0), "items[2].author.name");
        assert_eq!(top.to_string(), "items[2].author.name: This field is required.");
    }

    #[test]
    fn same_segment_merges() {
        let mut e = ValidationError::new();
        e.push_child("a", ValidationError::msg("one"));
        e.push_child("a", ValidationError::msg("two"));
        assert_eq!(e.children().len(), 1);
        assert_eq!(
            e.format_errors(),
            json!([{"msgs": ["one", "two"], "loc": ["a"]}])
        );
    }

    #[test]
    fn root_messages_have_no_loc() {
        let e = ValidationError::invalid("Deserialization failure.");
        assert_eq!(e.format_errors(), json!([{"msgs": ["Deserialization failure."]}]));
        assert_eq!(e.to_string(), "Deserialization failure.");
    }

    #[test]
    fn overrides_replace_by_kind_only() {
        let mut e = ValidationError::required();
        e.push_msg(ErrorKind::Custom, "kept");
        let mut overrides = IndexMap::new();
        overrides.insert(ErrorKind::Required, "Please fill in.".to_string());
        e.override_messages(&overrides);
        let texts: Vec<_> = e.messages().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["Please fill in.", "kept"]);
    }

    #[test]
    fn serialize_error_paths_prefix_outward() {
        let e = SerializeError::Null { path: vec![] }.at("name").at(Loc::Index(0)).at("items");
        assert_eq!(path_string(e.path()), "items[0].name");
    }

    #[test]
    fn error_kind_names_round_trip() {
        for kind in [ErrorKind::Required, ErrorKind::MaxLength, ErrorKind::Custom] {
            assert_eq!(ErrorKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ErrorKind::parse("nope"), None);
    }
}
