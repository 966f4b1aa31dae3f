//! OpenAPI parameter styles: `(location, style, explode, shape)` to text and
//! back.
//!
//! Decoding works on a [`RawParams`] multimap and produces a [`Wire`] value,
//! which the parameter layer hands to the schema as text. Encoding is the
//! exact inverse for every value it accepts; values that cannot survive the
//! trip are rejected with a [`CodecError`].
use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;

use super::raw::RawParams;
use crate::error::{CodecError, DefinitionError};
use crate::schema::{Kind, Schema};

// ------------------------------- Location -------------------------------- //

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Location {
    Query,
    Header,
    Cookie,
    Path,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Query => "query",
            Location::Header => "header",
            Location::Cookie => "cookie",
            Location::Path => "path",
        }
    }

    pub fn default_style(&self) -> Style {
        match self {
            Location::Query => Style::form(true),
            Location::Cookie => Style::form(false),
            Location::Header | Location::Path => Style::simple(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

// --------------------------------- Style --------------------------------- //

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StyleKind {
    Form,
    Simple,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
}

impl StyleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StyleKind::Form => "form",
            StyleKind::Simple => "simple",
            StyleKind::SpaceDelimited => "spaceDelimited",
            StyleKind::PipeDelimited => "pipeDelimited",
            StyleKind::DeepObject => "deepObject",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            StyleKind::Form,
            StyleKind::Simple,
            StyleKind::SpaceDelimited,
            StyleKind::PipeDelimited,
            StyleKind::DeepObject,
        ]
        .into_iter()
        .find(|k| k.as_str() == s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Style {
    pub kind: StyleKind,
    pub explode: bool,
}

impl Style {
    pub const fn new(kind: StyleKind, explode: bool) -> Self { Style { kind, explode } }
    pub const fn form(explode: bool) -> Self { Self::new(StyleKind::Form, explode) }
    pub const fn simple() -> Self { Self::new(StyleKind::Simple, false) }
    pub const fn space_delimited() -> Self { Self::new(StyleKind::SpaceDelimited, false) }
    pub const fn pipe_delimited() -> Self { Self::new(StyleKind::PipeDelimited, false) }
    pub const fn deep_object() -> Self { Self::new(StyleKind::DeepObject, true) }

    /// Separator of the single-value encodings. `None` for the exploded ones.
    pub fn delimiter(&self) -> Option<char> {
        match (self.kind, self.explode) {
            (StyleKind::Simple, _) | (StyleKind::Form, false) => Some(','),
            (StyleKind::SpaceDelimited, _) => Some(' '),
            (StyleKind::PipeDelimited, _) => Some('|'),
            (StyleKind::Form, true) | (StyleKind::DeepObject, _) => None,
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/explode={}", self.kind.as_str(), self.explode)
    }
}

// --------------------------------- Shape --------------------------------- //

/// What a parameter value looks like once split out of its text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Shape {
    Primitive,
    Array,
    /// Declared property names for models, `None` for free-form mappings.
    Object(Option<Vec<String>>),
}

impl Shape {
    pub fn of(schema: &Schema) -> Shape {
        match &schema.kind {
            Kind::List(_) => Shape::Array,
            Kind::Dict(_) => Shape::Object(None),
            Kind::Model(_) => {
                let props = schema
                    .as_model()
                    .map(|m| m.fields().map(|f| f.wire_name().to_string()).collect())
                    .unwrap_or_default();
                Shape::Object(Some(props))
            }
            _ => Shape::Primitive,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Primitive => "primitive",
            Shape::Array => "array",
            Shape::Object(_) => "object",
        }
    }
}

/// A parameter value split out of (or ready to be joined into) text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Wire {
    Primitive(String),
    Array(Vec<String>),
    Object(IndexMap<String, String>),
}

impl Wire {
    /// The JSON form handed to [`Schema::deserialize`] with text origin.
    pub fn into_value(self) -> Value {
        match self {
            Wire::Primitive(s) => Value::String(s),
            Wire::Array(xs) => Value::Array(xs.into_iter().map(Value::String).collect()),
            Wire::Object(m) => Value::Object(m.into_iter().map(|(k, v)| (k, Value::String(v))).collect()),
        }
    }

    /// Text form of a represented value. `None` for null.
    pub fn from_value(name: &str, value: &Value) -> Result<Option<Wire>, CodecError> {
        Ok(Some(match value {
            Value::Null => return Ok(None),
            Value::Array(xs) => Wire::Array(
                xs.iter()
                    .enumerate()
                    .map(|(i, x)| text(x).ok_or_else(|| not_text(name, &i.to_string())))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(m) => Wire::Object(
                m.iter()
                    .map(|(k, x)| text(x).map(|t| (k.clone(), t)).ok_or_else(|| not_text(name, k)))
                    .collect::<Result<_, _>>()?,
            ),
            scalar => Wire::Primitive(text(scalar).ok_or_else(|| not_text(name, name))?),
        }))
    }

    fn shape_name(&self) -> &'static str {
        match self {
            Wire::Primitive(_) => "primitive",
            Wire::Array(_) => "array",
            Wire::Object(_) => "object",
        }
    }
}

fn text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn not_text(name: &str, key: &str) -> CodecError {
    CodecError::NotText { name: name.to_string(), key: key.to_string() }
}

// ------------------------------- Validity -------------------------------- //

/// Reject combinations the location does not define.
pub fn check(name: &str, location: Location, style: Style, shape: &Shape) -> Result<(), DefinitionError> {
    use StyleKind::*;
    let ok = match (location, style.kind, style.explode, shape) {
        // top-level keys cannot be told apart from other parameters
        (Location::Query, Form, true, Shape::Object(None)) => false,
        (Location::Query, Form, _, _) => true,
        (Location::Query, SpaceDelimited | PipeDelimited, false, Shape::Array) => true,
        (Location::Query, DeepObject, true, Shape::Object(_)) => true,
        (Location::Cookie, Form, false, _) => true,
        (Location::Header | Location::Path, Simple, _, _) => true,
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(DefinitionError::InvalidStyle {
            name: name.to_string(),
            location: location.to_string(),
            style: style.kind.as_str().to_string(),
            explode: style.explode,
            shape: shape.as_str().to_string(),
        })
    }
}

// ------------------------------- Decoding -------------------------------- //

/// Pull parameter `name` out of `raw`. `None` means absent.
pub fn decode(name: &str, style: Style, shape: &Shape, raw: &RawParams) -> Option<Wire> {
    match (shape, style.kind, style.explode) {
        (Shape::Primitive, _, _) => raw.get(name).map(|s| Wire::Primitive(s.to_string())),

        (Shape::Array, StyleKind::Form, true) => {
            let all = raw.get_all(name);
            (!all.is_empty()).then(|| Wire::Array(all.into_iter().map(String::from).collect()))
        }
        (Shape::Array, _, _) => {
            let delim = style.delimiter()?;
            raw.get(name).map(|s| Wire::Array(split(s, delim)))
        }

        (Shape::Object(props), StyleKind::Form, true) => {
            let mut out = IndexMap::new();
            for p in props.iter().flatten() {
                if let Some(v) = raw.get(p) {
                    out.insert(p.clone(), v.to_string());
                }
            }
            (!out.is_empty()).then_some(Wire::Object(out))
        }
        (Shape::Object(_), StyleKind::DeepObject, _) => {
            let prefix = format!("{name}[");
            let mut out = IndexMap::new();
            for (k, v) in raw.iter() {
                let prop = k.strip_prefix(prefix.as_str()).and_then(|rest| rest.strip_suffix(']'));
                if let Some(prop) = prop {
                    out.entry(prop.to_string()).or_insert_with(|| v.to_string());
                }
            }
            (!out.is_empty()).then_some(Wire::Object(out))
        }
        (Shape::Object(_), _, _) => {
            let delim = style.delimiter()?;
            raw.get(name).map(|s| {
                let parts = split(s, delim);
                // a key without its value: hand the text on untouched so the
                // object check rejects it under this parameter's name
                if parts.len() % 2 != 0 {
                    return Wire::Primitive(s.to_string());
                }
                Wire::Object(
                    parts
                        .chunks_exact(2)
                        .map(|kv| (kv[0].clone(), kv[1].clone()))
                        .collect(),
                )
            })
        }
    }
}

/// `""` is the empty collection, never a single empty element.
fn split(s: &str, delim: char) -> Vec<String> {
    if s.is_empty() { Vec::new() } else { s.split(delim).map(String::from).collect() }
}

// ------------------------------- Encoding -------------------------------- //

/// Produce the `(key, text)` entries that [`decode`] turns back into `wire`.
/// Exploded encodings of an empty collection produce no entries.
pub fn encode(name: &str, style: Style, wire: &Wire) -> Result<Vec<(String, String)>, CodecError> {
    let mismatch = || CodecError::ShapeMismatch {
        name: name.to_string(),
        style: style.to_string(),
        shape: wire.shape_name().to_string(),
    };
    match (wire, style.kind, style.explode) {
        (Wire::Primitive(s), StyleKind::Form | StyleKind::Simple, _) => Ok(vec![(name.to_string(), s.clone())]),
        (Wire::Primitive(_), _, _) => Err(mismatch()),

        (Wire::Array(xs), StyleKind::Form, true) => {
            Ok(xs.iter().map(|x| (name.to_string(), x.clone())).collect())
        }
        (Wire::Array(_), StyleKind::DeepObject, _) => Err(mismatch()),
        (Wire::Array(xs), _, _) => {
            let delim = style.delimiter().ok_or_else(mismatch)?;
            if xs.len() == 1 && xs[0].is_empty() {
                return Err(CodecError::LoneEmptyElement { name: name.to_string() });
            }
            check_delims(name, xs.iter(), delim)?;
            Ok(vec![(name.to_string(), join(xs.iter(), delim))])
        }

        (Wire::Object(m), StyleKind::Form, true) => {
            Ok(m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        }
        (Wire::Object(m), StyleKind::DeepObject, _) => {
            Ok(m.iter().map(|(k, v)| (format!("{name}[{k}]"), v.clone())).collect())
        }
        (Wire::Object(m), StyleKind::Form | StyleKind::Simple, _) => {
            let delim = style.delimiter().ok_or_else(mismatch)?;
            let flat: Vec<&String> = m.iter().flat_map(|(k, v)| [k, v]).collect();
            check_delims(name, flat.iter().copied(), delim)?;
            Ok(vec![(name.to_string(), join(flat.into_iter(), delim))])
        }
        (Wire::Object(_), _, _) => Err(mismatch()),
    }
}

fn check_delims<'a>(name: &str, values: impl Iterator<Item = &'a String>, delim: char) -> Result<(), CodecError> {
    for v in values {
        if v.contains(delim) {
            return Err(CodecError::ContainsDelimiter { name: name.to_string(), value: v.clone(), delimiter: delim });
        }
    }
    Ok(())
}

fn join<'a>(values: impl Iterator<Item = &'a String>, delim: char) -> String {
    let mut out = String::new();
    for (i, v) in values.enumerate() {
        if i > 0 { out.push(delim); }
        out.push_str(v);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arr(xs: &[&str]) -> Wire { Wire::Array(xs.iter().map(|s| s.to_string()).collect()) }

    fn obj(kvs: &[(&str, &str)]) -> Wire {
        Wire::Object(kvs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn form_unexploded_arrays_are_comma_joined() {
        let raw = RawParams::parse_query("tags=red,blue");
        let wire = decode("tags", Style::form(false), &Shape::Array, &raw).unwrap();
        assert_eq!(wire, arr(&["red", "blue"]));
        assert_eq!(
            encode("tags", Style::form(false), &wire).unwrap(),
            vec![("tags".to_string(), "red,blue".to_string())]
        );
    }

    #[test]
    fn form_exploded_arrays_repeat_the_key() {
        let raw = RawParams::parse_query("id=3&id=4&id=5");
        assert_eq!(decode("id", Style::form(true), &Shape::Array, &raw), Some(arr(&["3", "4", "5"])));
        assert_eq!(decode("other", Style::form(true), &Shape::Array, &raw), None);
    }

    #[test]
    fn exploded_objects_use_declared_top_level_keys() {
        let raw = RawParams::parse_query("R=100&G=200&page=1");
        let shape = Shape::Object(Some(vec!["R".into(), "G".into(), "B".into()]));
        assert_eq!(decode("color", Style::form(true), &shape, &raw), Some(obj(&[("R", "100"), ("G", "200")])));
    }

    #[test]
    fn deep_objects_use_bracketed_keys() {
        let raw = RawParams::parse_query("color%5BR%5D=100&color[G]=200");
        let shape = Shape::Object(None);
        let wire = decode("color", Style::deep_object(), &shape, &raw).unwrap();
        assert_eq!(wire, obj(&[("R", "100"), ("G", "200")]));
        let entries = encode("color", Style::deep_object(), &wire).unwrap();
        assert_eq!(entries[0], ("color[R]".to_string(), "100".to_string()));
    }

    #[test]
    fn simple_ignores_explode() {
        let raw = RawParams::from_pairs([("color", "R,100,G,200")]);
        let shape = Shape::Object(None);
        let a = decode("color", Style::new(StyleKind::Simple, false), &shape, &raw);
        let b = decode("color", Style::new(StyleKind::Simple, true), &shape, &raw);
        assert_eq!(a, b);
        assert_eq!(a, Some(obj(&[("R", "100"), ("G", "200")])));
    }

    #[test]
    fn unpaired_object_text_is_not_an_object() {
        let raw = RawParams::parse_query("color=R,100,G");
        let shape = Shape::Object(None);
        assert_eq!(decode("color", Style::form(false), &shape, &raw), Some(Wire::Primitive("R,100,G".into())));
        assert_eq!(decode("color", Style::simple(), &shape, &raw), Some(Wire::Primitive("R,100,G".into())));
    }

    #[test]
    fn delimited_styles_split_on_their_separator() {
        let raw = RawParams::from_pairs([("a", "1 2"), ("b", "1|2")]);
        assert_eq!(decode("a", Style::space_delimited(), &Shape::Array, &raw), Some(arr(&["1", "2"])));
        assert_eq!(decode("b", Style::pipe_delimited(), &Shape::Array, &raw), Some(arr(&["1", "2"])));
    }

    #[test]
    fn empty_text_is_an_empty_collection() {
        let raw = RawParams::from_pairs([("tags", "")]);
        assert_eq!(decode("tags", Style::form(false), &Shape::Array, &raw), Some(arr(&[])));
        assert_eq!(encode("tags", Style::form(false), &arr(&[])).unwrap(), vec![("tags".into(), "".into())]);
    }

    #[test]
    fn unencodable_values_are_rejected() {
        let err = encode("tags", Style::form(false), &arr(&["a,b"])).unwrap_err();
        assert!(matches!(err, CodecError::ContainsDelimiter { delimiter: ',', .. }));
        let err = encode("tags", Style::pipe_delimited(), &arr(&[""])).unwrap_err();
        assert_eq!(err, CodecError::LoneEmptyElement { name: "tags".into() });
        let err = encode("q", Style::deep_object(), &Wire::Primitive("x".into())).unwrap_err();
        assert!(matches!(err, CodecError::ShapeMismatch { .. }));
    }

    #[test]
    fn validity_follows_the_location_table() {
        let model_obj = Shape::Object(Some(vec!["a".into()]));
        assert!(check("p", Location::Query, Style::deep_object(), &model_obj).is_ok());
        assert!(check("p", Location::Query, Style::form(true), &Shape::Object(None)).is_err());
        assert!(check("p", Location::Query, Style::space_delimited(), &Shape::Primitive).is_err());
        assert!(check("p", Location::Cookie, Style::form(true), &Shape::Array).is_err());
        assert!(check("p", Location::Header, Style::form(false), &Shape::Primitive).is_err());
        assert!(check("p", Location::Path, Style::new(StyleKind::Simple, true), &Shape::Array).is_ok());
        assert!(check("p", Location::Path, Style::deep_object(), &model_obj).is_err());
    }
}
