//! Type nodes.
//!
//! A [`Schema`] is a kind plus the options every kind shares (nullability,
//! choices, description, documentation default, extra validators). Kinds that
//! wrap other schemas own them, so a list, mapping or union node is always
//! well formed. Composite kinds point at a [`Model`] either directly or through
//! a [`ModelSlot`] bound later, which is how recursive graphs are declared.
//!
//! Per-kind rules live in the submodules:
//! - `str`: string-like kinds (`string`, `password`, `path`)
//! - `num`: `integer` and `float`
//! - `temporal`: `date` and `datetime`
//! - `arr`: `list` and `dict`
pub mod str;
pub mod num;
pub mod temporal;
pub mod arr;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::data::Data;
use crate::error::{DefinitionError, ValidationError};
use crate::model::{Model, ModelSlot, ModelTarget, ModelUse, RequiredFields};

pub use arr::{DictRules, ListRules};
pub use num::NumRules;
pub use str::{Pattern, StrRules};

/// Extra schema-level check, run after the kind's own checks pass.
pub type Validator = Arc<dyn Fn(&Data) -> Result<(), ValidationError> + Send + Sync>;

/// Where a raw value came from. Text sources (query, header, cookie, path,
/// form) carry every scalar as a string and get token coercion for booleans.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Origin {
    #[default]
    Body,
    Text,
}

#[derive(Clone)]
pub struct Schema {
    pub(crate) kind: Kind,
    pub(crate) nullable: bool,
    pub(crate) choices: Vec<Value>,
    pub(crate) description: Option<String>,
    pub(crate) default: Option<Value>,
    pub(crate) validators: Vec<Validator>,
}

#[derive(Clone, Debug)]
pub enum Kind {
    String(StrRules),
    Password(StrRules),
    Path(StrRules),
    Integer(NumRules),
    Float(NumRules),
    Boolean,
    Date,
    DateTime { with_tz: Option<bool> },
    File,
    Any,
    List(ListRules),
    Dict(DictRules),
    AnyOf(Vec<Schema>),
    Model(ModelUse),
}

// ------------------------------ Constructors ----------------------------- //

impl Schema {
    fn of(kind: Kind) -> Self {
        Schema {
            kind,
            nullable: false,
            choices: Vec::new(),
            description: None,
            default: None,
            validators: Vec::new(),
        }
    }

    pub fn string() -> Self { Self::of(Kind::String(StrRules::default())) }
    pub fn password() -> Self { Self::of(Kind::Password(StrRules::default())) }
    /// A string that may contain `/`, for path templates.
    pub fn path() -> Self { Self::of(Kind::Path(StrRules::default())) }
    pub fn integer() -> Self { Self::of(Kind::Integer(NumRules::default())) }
    pub fn float() -> Self { Self::of(Kind::Float(NumRules::default())) }
    pub fn boolean() -> Self { Self::of(Kind::Boolean) }
    pub fn date() -> Self { Self::of(Kind::Date) }
    pub fn datetime() -> Self { Self::of(Kind::DateTime { with_tz: None }) }
    pub fn file() -> Self { Self::of(Kind::File) }
    pub fn any() -> Self { Self::of(Kind::Any) }

    pub fn list(item: Schema) -> Self {
        Self::of(Kind::List(ListRules::new(item)))
    }

    pub fn dict(value: Schema) -> Self {
        Self::of(Kind::Dict(DictRules::new(value)))
    }

    pub fn any_of(variants: impl IntoIterator<Item = Schema>) -> Self {
        Self::of(Kind::AnyOf(variants.into_iter().collect()))
    }

    pub fn model(model: &Model) -> Self {
        Self::of(Kind::Model(ModelUse::new(ModelTarget::Model(model.clone()))))
    }

    /// Forward reference to a model bound later through `slot`.
    pub fn lazy(slot: &ModelSlot) -> Self {
        Self::of(Kind::Model(ModelUse::new(ModelTarget::Slot(slot.clone()))))
    }
}

// ---------------------------- Common options ----------------------------- //

impl Schema {
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn choices<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.choices = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Default shown in documentation for standalone schemas. Field defaults
    /// live on [`crate::Field`].
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Data) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(f));
        self
    }

    pub fn kind(&self) -> &Kind { &self.kind }
    pub fn is_nullable(&self) -> bool { self.nullable }
    pub fn get_description(&self) -> Option<&str> { self.description.as_deref() }
}

// ------------------------- Kind-specific options ------------------------- //

impl Schema {
    /// Full-match regular expression for string-like kinds.
    pub fn pattern(mut self, pattern: &str) -> Result<Self, DefinitionError> {
        let compiled = Pattern::new(pattern)?;
        let ty = self.data_type();
        match self.str_rules_mut() {
            Some(rules) => rules.pattern = Some(compiled),
            None => warn!(kind = ty, "`pattern` ignored on a non-string schema"),
        }
        Ok(self)
    }

    pub fn min_length(self, n: usize) -> Self {
        self.with_str_rules("min_length", |r| r.min_length = Some(n))
    }

    pub fn max_length(self, n: usize) -> Self {
        self.with_str_rules("max_length", |r| r.max_length = Some(n))
    }

    pub fn minimum(self, x: f64) -> Self { self.with_num_rules("minimum", |r| r.minimum = Some(x)) }
    pub fn maximum(self, x: f64) -> Self { self.with_num_rules("maximum", |r| r.maximum = Some(x)) }
    pub fn exclusive_minimum(self) -> Self { self.with_num_rules("exclusive_minimum", |r| r.exclusive_minimum = true) }
    pub fn exclusive_maximum(self) -> Self { self.with_num_rules("exclusive_maximum", |r| r.exclusive_maximum = true) }
    pub fn multiple_of(self, x: f64) -> Self { self.with_num_rules("multiple_of", |r| r.multiple_of = Some(x)) }

    pub fn min_items(mut self, n: usize) -> Self {
        let ty = self.data_type();
        match &mut self.kind {
            Kind::List(rules) => rules.min_items = Some(n),
            _ => warn!(kind = ty, "`min_items` ignored on a non-list schema"),
        }
        self
    }

    pub fn max_items(mut self, n: usize) -> Self {
        let ty = self.data_type();
        match &mut self.kind {
            Kind::List(rules) => rules.max_items = Some(n),
            _ => warn!(kind = ty, "`max_items` ignored on a non-list schema"),
        }
        self
    }

    pub fn unique_items(mut self) -> Self {
        let ty = self.data_type();
        match &mut self.kind {
            Kind::List(rules) => rules.unique_items = true,
            _ => warn!(kind = ty, "`unique_items` ignored on a non-list schema"),
        }
        self
    }

    pub fn min_properties(mut self, n: usize) -> Self {
        let ty = self.data_type();
        match &mut self.kind {
            Kind::Dict(rules) => rules.min_properties = Some(n),
            _ => warn!(kind = ty, "`min_properties` ignored on a non-dict schema"),
        }
        self
    }

    pub fn max_properties(mut self, n: usize) -> Self {
        let ty = self.data_type();
        match &mut self.kind {
            Kind::Dict(rules) => rules.max_properties = Some(n),
            _ => warn!(kind = ty, "`max_properties` ignored on a non-dict schema"),
        }
        self
    }

    /// `Some(true)` requires an offset, `Some(false)` forbids one.
    pub fn with_tz(mut self, aware: bool) -> Self {
        let ty = self.data_type();
        match &mut self.kind {
            Kind::DateTime { with_tz } => *with_tz = Some(aware),
            _ => warn!(kind = ty, "`with_tz` ignored on a non-datetime schema"),
        }
        self
    }

    /// Override which fields of the referenced model are required at this
    /// use site.
    pub fn required_fields(mut self, required: RequiredFields) -> Self {
        let ty = self.data_type();
        match &mut self.kind {
            Kind::Model(usage) => usage.required = Some(required),
            _ => warn!(kind = ty, "`required_fields` ignored on a non-model schema"),
        }
        self
    }

    fn str_rules_mut(&mut self) -> Option<&mut StrRules> {
        match &mut self.kind {
            Kind::String(r) | Kind::Password(r) | Kind::Path(r) => Some(r),
            _ => None,
        }
    }

    fn with_str_rules(mut self, option: &str, apply: impl FnOnce(&mut StrRules)) -> Self {
        let ty = self.data_type();
        match self.str_rules_mut() {
            Some(rules) => apply(rules),
            None => warn!(kind = ty, option, "option ignored on a non-string schema"),
        }
        self
    }

    fn with_num_rules(mut self, option: &str, apply: impl FnOnce(&mut NumRules)) -> Self {
        let ty = self.data_type();
        match &mut self.kind {
            Kind::Integer(r) | Kind::Float(r) => apply(r),
            _ => warn!(kind = ty, option, "option ignored on a non-numeric schema"),
        }
        self
    }
}

// ------------------------------ Introspection ---------------------------- //

impl Schema {
    /// OpenAPI data type. `any` and `anyOf` have none and report a pseudo
    /// name used for override compatibility checks.
    pub fn data_type(&self) -> &'static str {
        match &self.kind {
            Kind::String(_) | Kind::Password(_) | Kind::Path(_) => "string",
            Kind::Date | Kind::DateTime { .. } | Kind::File => "string",
            Kind::Integer(_) => "integer",
            Kind::Float(_) => "number",
            Kind::Boolean => "boolean",
            Kind::List(_) => "array",
            Kind::Dict(_) | Kind::Model(_) => "object",
            Kind::AnyOf(_) => "anyOf",
            Kind::Any => "any",
        }
    }

    pub fn format(&self) -> Option<&'static str> {
        match &self.kind {
            Kind::Float(_) => Some("float"),
            Kind::Date => Some("date"),
            Kind::DateTime { .. } => Some("date-time"),
            Kind::Password(_) => Some("password"),
            Kind::File => Some("binary"),
            _ => None,
        }
    }

    /// The model this schema refers to, if it is composite.
    pub fn as_model(&self) -> Option<Model> {
        match &self.kind {
            Kind::Model(usage) => Some(usage.target.resolve()),
            _ => None,
        }
    }

    pub(crate) fn is_file_like(&self) -> bool {
        match &self.kind {
            Kind::File => true,
            Kind::List(rules) => matches!(rules.item.kind, Kind::File),
            _ => false,
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Schema");
        d.field("kind", &self.kind);
        if self.nullable { d.field("nullable", &true); }
        if !self.choices.is_empty() { d.field("choices", &self.choices); }
        if let Some(text) = &self.description { d.field("description", text); }
        if !self.validators.is_empty() { d.field("validators", &self.validators.len()); }
        d.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_options_apply_to_matching_kinds_only() {
        let s = Schema::string().max_length(50).minimum(3.0);
        match s.kind() {
            Kind::String(r) => assert_eq!(r.max_length, Some(50)),
            other => panic!("unexpected kind {other:?}"),
        }
        let n = Schema::integer().minimum(1.0).max_length(2);
        match n.kind() {
            Kind::Integer(r) => assert_eq!(r.minimum, Some(1.0)),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn bad_pattern_is_a_definition_error() {
        let err = Schema::string().pattern("(").unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidPattern { .. }));
    }

    #[test]
    fn data_types_follow_openapi() {
        assert_eq!(Schema::float().data_type(), "number");
        assert_eq!(Schema::float().format(), Some("float"));
        assert_eq!(Schema::datetime().format(), Some("date-time"));
        assert_eq!(Schema::dict(Schema::any()).data_type(), "object");
        assert_eq!(Schema::list(Schema::file()).data_type(), "array");
        assert!(Schema::list(Schema::file()).is_file_like());
    }
}
