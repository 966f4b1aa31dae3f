//! Composite types.
//!
//! A [`Model`] is built once through [`ModelBuilder`] and is immutable after
//! that. Inheritance is resolved at build time: ancestor field tables, hook
//! tables and getter tables are flattened into the descendant so the
//! pipelines only ever look at one resolved table.
pub mod field;
pub(crate) mod hooks;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::data::{Attributes, Data, Record};
use crate::error::{DefinitionError, ValidationError};
use hooks::{GetterFn, HookFn, PostFn, Registry, Role};

pub use field::{Erase, Field, FieldDefault};

static NEXT_MODEL_ID: AtomicUsize = AtomicUsize::new(1);

/// Identity of a built model. Two models with the same name and fields are
/// still different models.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(usize);

impl ModelId {
    pub(crate) fn fresh() -> Self { ModelId(NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed)) }
}

/// What to do with input keys no field claims.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownFields {
    #[default]
    Exclude,
    Include,
    Error,
}

/// Overrides per-field `required` flags, on a model or at a use site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequiredFields {
    All,
    /// Exactly these declared names; an empty list makes every field optional.
    Only(Vec<String>),
}

impl RequiredFields {
    pub fn none() -> Self { RequiredFields::Only(Vec::new()) }

    pub fn only<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        RequiredFields::Only(names.into_iter().map(Into::into).collect())
    }

    fn includes(&self, name: &str) -> bool {
        match self {
            RequiredFields::All => true,
            RequiredFields::Only(names) => names.iter().any(|n| n == name),
        }
    }
}

#[derive(Clone)]
pub struct Model(Arc<ModelInner>);

struct ModelInner {
    id: ModelId,
    name: String,
    description: Option<String>,
    parents: Vec<Model>,
    fields: IndexMap<String, Field>,
    hooks: Registry<HookFn>,
    getters: Registry<GetterFn>,
    post: Vec<(ModelId, PostFn)>,
    unknown_fields: UnknownFields,
    required_fields: Option<RequiredFields>,
}

impl Model {
    pub fn builder(name: impl Into<String>) -> ModelBuilder { ModelBuilder::new(name) }

    pub fn id(&self) -> ModelId { self.0.id }
    pub fn name(&self) -> &str { &self.0.name }
    pub fn description(&self) -> Option<&str> { self.0.description.as_deref() }
    pub fn parents(&self) -> &[Model] { &self.0.parents }
    pub fn unknown_fields(&self) -> UnknownFields { self.0.unknown_fields }

    /// Resolved fields in table order: inherited first, then own.
    pub fn fields(&self) -> impl Iterator<Item = &Field> { self.0.fields.values() }

    pub fn field(&self, name: &str) -> Option<&Field> { self.0.fields.get(name) }

    /// Whether `field` is required, given an optional use-site override.
    pub fn is_required(&self, field: &Field, usage: Option<&RequiredFields>) -> bool {
        match usage.or(self.0.required_fields.as_ref()) {
            Some(over) => over.includes(&field.name),
            None => field.declares_required(),
        }
    }

    /// Wire names of the required fields, in table order.
    pub fn required_wire_names(&self, usage: Option<&RequiredFields>) -> Vec<String> {
        self.fields()
            .filter(|f| self.is_required(f, usage))
            .map(|f| f.wire_name().to_string())
            .collect()
    }

    pub(crate) fn run_hooks(&self, field: &str, mut value: Data, partial: &Record) -> Result<Data, ValidationError> {
        for entry in self.0.hooks.for_field(field) {
            value = (entry.func)(value, partial)?;
        }
        Ok(value)
    }

    pub(crate) fn getter(&self, field: &str) -> Option<&GetterFn> {
        self.0.getters.for_field(field).next().map(|e| &e.func)
    }

    pub(crate) fn run_post(&self, mut record: Record) -> Result<Record, ValidationError> {
        for (_, f) in &self.0.post {
            record = f(record)?;
        }
        Ok(record)
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool { self.0.id == other.0.id }
}

impl Eq for Model {}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.0.name)
            .field("fields", &self.0.fields.keys().collect::<Vec<_>>())
            .field("hooks", &self.0.hooks)
            .finish()
    }
}

// --------------------------------- Slots --------------------------------- //

/// A model declared before it exists, for self- and mutually-recursive
/// graphs. Bind it exactly once, before the first validation.
#[derive(Clone)]
pub struct ModelSlot {
    name: String,
    cell: Arc<OnceCell<Model>>,
}

impl ModelSlot {
    pub fn new(name: impl Into<String>) -> Self {
        ModelSlot { name: name.into(), cell: Arc::new(OnceCell::new()) }
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn bind(&self, model: &Model) -> Result<(), DefinitionError> {
        self.cell
            .set(model.clone())
            .map_err(|_| DefinitionError::SlotAlreadyBound { name: self.name.clone() })
    }

    pub fn get(&self) -> Option<&Model> { self.cell.get() }
}

#[derive(Clone)]
pub enum ModelTarget {
    Model(Model),
    Slot(ModelSlot),
}

impl ModelTarget {
    /// # Panics
    /// If the target is a slot that was never bound. That is a declaration
    /// bug, not bad input.
    pub fn resolve(&self) -> Model {
        match self {
            ModelTarget::Model(m) => m.clone(),
            ModelTarget::Slot(slot) => match slot.get() {
                Some(m) => m.clone(),
                None => panic!("model slot `{}` used before it was bound", slot.name),
            },
        }
    }
}

impl fmt::Debug for ModelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelTarget::Model(m) => write!(f, "Model({})", m.name()),
            ModelTarget::Slot(s) => write!(f, "Slot({})", s.name),
        }
    }
}

/// A composite reference inside a schema plus its use-site overrides.
#[derive(Clone, Debug)]
pub struct ModelUse {
    pub(crate) target: ModelTarget,
    pub(crate) required: Option<RequiredFields>,
}

impl ModelUse {
    pub(crate) fn new(target: ModelTarget) -> Self { ModelUse { target, required: None } }
}

// -------------------------------- Builder -------------------------------- //

pub struct ModelBuilder {
    name: String,
    description: Option<String>,
    parents: Vec<Model>,
    fields: Vec<Field>,
    removed: Vec<String>,
    hooks: Vec<(String, HookFn)>,
    getters: Vec<(String, GetterFn)>,
    post: Option<PostFn>,
    unknown_fields: Option<UnknownFields>,
    required_fields: Option<RequiredFields>,
}

impl ModelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        ModelBuilder {
            name: name.into(),
            description: None,
            parents: Vec::new(),
            fields: Vec::new(),
            removed: Vec::new(),
            hooks: Vec::new(),
            getters: Vec::new(),
            post: None,
            unknown_fields: None,
            required_fields: None,
        }
    }

    /// Inherit from `parent`. With several parents, the first one that
    /// declares a field name wins.
    pub fn extends(mut self, parent: &Model) -> Self {
        self.parents.push(parent.clone());
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Drop an inherited field, together with its hooks and getter.
    pub fn without(mut self, name: impl Into<String>) -> Self {
        self.removed.push(name.into());
        self
    }

    pub fn hook<F>(mut self, field: impl Into<String>, f: F) -> Self
    where
        F: Fn(Data, &Record) -> Result<Data, ValidationError> + Send + Sync + 'static,
    {
        self.hooks.push((field.into(), Arc::new(f)));
        self
    }

    pub fn getter<F>(mut self, field: impl Into<String>, f: F) -> Self
    where
        F: Fn(&dyn Attributes) -> Data + Send + Sync + 'static,
    {
        self.getters.push((field.into(), Arc::new(f)));
        self
    }

    pub fn post_transform<F>(mut self, f: F) -> Self
    where
        F: Fn(Record) -> Result<Record, ValidationError> + Send + Sync + 'static,
    {
        self.post = Some(Arc::new(f));
        self
    }

    pub fn unknown_fields(mut self, policy: UnknownFields) -> Self {
        self.unknown_fields = Some(policy);
        self
    }

    pub fn required_fields(mut self, required: RequiredFields) -> Self {
        self.required_fields = Some(required);
        self
    }

    pub fn build(self) -> Result<Model, DefinitionError> {
        let id = ModelId::fresh();
        let name = self.name;

        // 1) inherited tables, first parent wins per field name
        let mut fields: IndexMap<String, Field> = IndexMap::new();
        let mut hooks = Registry::new(Role::Hook);
        let mut getters = Registry::new(Role::Getter);
        for parent in &self.parents {
            for f in parent.fields() {
                if fields.contains_key(&f.name) { continue; }
                fields.insert(f.name.clone(), f.clone());
                hooks.adopt(&parent.0.hooks, &f.name);
                getters.adopt(&parent.0.getters, &f.name);
            }
        }

        // 2) removals
        for removed in &self.removed {
            if fields.shift_remove(removed).is_none() {
                return Err(DefinitionError::UnknownField { model: name, field: removed.clone() });
            }
            hooks.drop_field(removed);
            getters.drop_field(removed);
        }

        // 3) own fields replace inherited ones in place
        let mut own = HashSet::new();
        for f in self.fields {
            if !own.insert(f.name.clone()) {
                return Err(DefinitionError::DuplicateField { model: name, field: f.name });
            }
            if f.read_only && f.write_only {
                return Err(DefinitionError::ReadWriteConflict { field: f.name });
            }
            if f.read_only && f.default.is_some() {
                warn!(model = %name, field = %f.name, "default on a read-only field is never used");
            }
            if let Some(old) = fields.get(&f.name) {
                let (was, now) = (old.schema.data_type(), f.schema.data_type());
                if was != now && was != "any" {
                    return Err(DefinitionError::IncompatibleOverride {
                        model: name,
                        field: f.name,
                        ancestor_type: was.to_string(),
                        new_type: now.to_string(),
                    });
                }
                hooks.drop_field(&f.name);
                getters.drop_field(&f.name);
            }
            fields.insert(f.name.clone(), f);
        }

        // 4) own hooks and getters
        for (field, func) in self.hooks {
            if !fields.contains_key(&field) {
                return Err(DefinitionError::UnknownField { model: name, field });
            }
            hooks.register(id, &name, &field, func)?;
        }
        for (field, func) in self.getters {
            if !fields.contains_key(&field) {
                return Err(DefinitionError::UnknownField { model: name, field });
            }
            getters.register(id, &name, &field, func)?;
        }

        // 5) post transforms: ancestors' (once each), then own
        let mut post: Vec<(ModelId, PostFn)> = Vec::new();
        for parent in &self.parents {
            for (owner, f) in &parent.0.post {
                if !post.iter().any(|(o, _)| o == owner) {
                    post.push((*owner, f.clone()));
                }
            }
        }
        if let Some(f) = self.post {
            post.push((id, f));
        }

        // 6) options, inherited from the first parent that sets them
        let unknown_fields = self
            .unknown_fields
            .or_else(|| self.parents.first().map(|p| p.0.unknown_fields))
            .unwrap_or_default();
        let required_fields = self
            .required_fields
            .or_else(|| self.parents.iter().find_map(|p| p.0.required_fields.clone()));
        if let Some(RequiredFields::Only(names)) = &required_fields {
            if let Some(missing) = names.iter().find(|n| !fields.contains_key(n.as_str())) {
                return Err(DefinitionError::UnknownField { model: name, field: missing.clone() });
            }
        }

        debug!(
            model = %name,
            fields = fields.len(),
            hooks = hooks.len(),
            parents = self.parents.len(),
            "model built"
        );

        Ok(Model(Arc::new(ModelInner {
            id,
            name,
            description: self.description,
            parents: self.parents,
            fields,
            hooks,
            getters,
            post,
            unknown_fields,
            required_fields,
        })))
    }
}
