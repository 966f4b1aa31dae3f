use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::data::Data;
use crate::error::ErrorKind;
use crate::schema::{Kind, Schema};

pub type DefaultFactory = Arc<dyn Fn() -> Data + Send + Sync>;
pub type ErasePredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Typed default, used as-is when the field is absent.
#[derive(Clone)]
pub enum FieldDefault {
    Value(Data),
    Factory(DefaultFactory),
}

impl FieldDefault {
    pub fn produce(&self) -> Data {
        match self {
            FieldDefault::Value(d) => d.clone(),
            FieldDefault::Factory(f) => f(),
        }
    }
}

/// Which present raw values count as "not sent".
#[derive(Clone)]
pub enum Erase {
    /// Empty or whitespace-only strings. The default for most kinds.
    Blank,
    /// Only the empty string. The default for passwords.
    Empty,
    Never,
    Custom(ErasePredicate),
}

impl Erase {
    pub fn custom<F: Fn(&Value) -> bool + Send + Sync + 'static>(f: F) -> Self {
        Erase::Custom(Arc::new(f))
    }

    pub fn applies(&self, raw: &Value) -> bool {
        match self {
            Erase::Blank => matches!(raw, Value::String(s) if s.trim().is_empty()),
            Erase::Empty => matches!(raw, Value::String(s) if s.is_empty()),
            Erase::Never => false,
            Erase::Custom(f) => f(raw),
        }
    }
}

/// A named slot inside a model.
///
/// `alias` is the wire name, `attr` the key in the typed [`crate::Record`];
/// both default to the declared name.
#[derive(Clone)]
pub struct Field {
    pub(crate) name: String,
    pub(crate) alias: Option<String>,
    pub(crate) attr: Option<String>,
    pub(crate) schema: Schema,
    pub(crate) required: Option<bool>,
    pub(crate) default: Option<FieldDefault>,
    pub(crate) clear_value: Option<Value>,
    pub(crate) erase: Option<Erase>,
    pub(crate) read_only: bool,
    pub(crate) write_only: bool,
    pub(crate) description: Option<String>,
    pub(crate) error_messages: IndexMap<ErrorKind, String>,
}

impl Field {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Field {
            name: name.into(),
            alias: None,
            attr: None,
            schema,
            required: None,
            default: None,
            clear_value: None,
            erase: None,
            read_only: false,
            write_only: false,
            description: None,
            error_messages: IndexMap::new(),
        }
    }

    pub fn alias(mut self, wire_name: impl Into<String>) -> Self {
        self.alias = Some(wire_name.into());
        self
    }

    pub fn attr(mut self, attr: impl Into<String>) -> Self {
        self.attr = Some(attr.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    pub fn default(mut self, value: impl Into<Data>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    pub fn default_with<F: Fn() -> Data + Send + Sync + 'static>(mut self, factory: F) -> Self {
        self.default = Some(FieldDefault::Factory(Arc::new(factory)));
        self
    }

    /// Sentinel that marks "explicitly cleared", distinct from absent.
    pub fn clear_value(mut self, sentinel: impl Into<Value>) -> Self {
        self.clear_value = Some(sentinel.into());
        self
    }

    pub fn erase(mut self, erase: Erase) -> Self {
        self.erase = Some(erase);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn error_message(mut self, kind: ErrorKind, text: impl Into<String>) -> Self {
        self.error_messages.insert(kind, text.into());
        self
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn wire_name(&self) -> &str { self.alias.as_deref().unwrap_or(&self.name) }
    pub fn attr_name(&self) -> &str { self.attr.as_deref().unwrap_or(&self.name) }
    pub fn schema(&self) -> &Schema { &self.schema }
    pub fn is_read_only(&self) -> bool { self.read_only }
    pub fn is_write_only(&self) -> bool { self.write_only }
    pub fn default_value(&self) -> Option<&FieldDefault> { self.default.as_ref() }
    pub fn clear_sentinel(&self) -> Option<&Value> { self.clear_value.as_ref() }

    /// Field description, falling back to the schema's.
    pub fn get_description(&self) -> Option<&str> {
        self.description.as_deref().or(self.schema.get_description())
    }

    /// Required as declared on the field: the explicit flag, else "required
    /// unless a default exists". Model and use-site overrides win over this.
    pub fn declares_required(&self) -> bool {
        self.required.unwrap_or(self.default.is_none())
    }

    pub(crate) fn is_erased(&self, raw: &Value) -> bool {
        match &self.erase {
            Some(e) => e.applies(raw),
            None if matches!(self.schema.kind, Kind::Password(_)) => Erase::Empty.applies(raw),
            None => Erase::Blank.applies(raw),
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("wire_name", &self.wire_name())
            .field("attr", &self.attr_name())
            .field("schema", &self.schema)
            .field("required", &self.declares_required())
            .finish()
    }
}
