//! Per-model registries of field-bound functions.
//!
//! An entry is `(owner model, field name) -> function`. Tables are flattened
//! when a model is built: the descendant adopts its ancestors' entries for the
//! fields it keeps, then registers its own. Lookup during the pipelines is an
//! explicit scan, never dynamic dispatch on the model type.
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::data::{Attributes, Data, Record};
use crate::error::{DefinitionError, ValidationError};
use super::ModelId;

/// Runs after a field's own validation succeeded. Receives the typed value
/// and the record built so far.
pub(crate) type HookFn = Arc<dyn Fn(Data, &Record) -> Result<Data, ValidationError> + Send + Sync>;
/// Replaces the plain attribute read during serialization.
pub(crate) type GetterFn = Arc<dyn Fn(&dyn Attributes) -> Data + Send + Sync>;
/// Runs once over the assembled record.
pub(crate) type PostFn = Arc<dyn Fn(Record) -> Result<Record, ValidationError> + Send + Sync>;

static NEXT_ORDER: AtomicUsize = AtomicUsize::new(0);

#[derive(Clone)]
pub(crate) struct Entry<F> {
    pub owner: ModelId,
    pub owner_name: String,
    pub field: String,
    pub order: usize,
    pub func: F,
}

/// What a registry holds, for error messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Role {
    Hook,
    Getter,
}

#[derive(Clone)]
pub(crate) struct Registry<F> {
    role: Role,
    entries: Vec<Entry<F>>,
}

impl<F: Clone> Registry<F> {
    pub fn new(role: Role) -> Self { Registry { role, entries: Vec::new() } }

    /// Take over `parent`'s entries for `field`.
    pub fn adopt(&mut self, parent: &Registry<F>, field: &str) {
        for e in parent.entries.iter().filter(|e| e.field == field) {
            if !self.entries.iter().any(|x| x.owner == e.owner && x.field == e.field) {
                self.entries.push(e.clone());
            }
        }
    }

    /// Forget every entry bound to `field` (the field was replaced or removed).
    pub fn drop_field(&mut self, field: &str) {
        self.entries.retain(|e| e.field != field);
    }

    pub fn register(&mut self, owner: ModelId, owner_name: &str, field: &str, func: F) -> Result<(), DefinitionError> {
        if let Some(existing) = self.entries.iter().find(|e| e.field == field) {
            let (model, field) = (owner_name.to_string(), field.to_string());
            return Err(match (self.role, existing.owner == owner) {
                (Role::Hook, true) => DefinitionError::DuplicateHook { model, field },
                (Role::Getter, true) => DefinitionError::DuplicateGetter { model, field },
                (Role::Hook, false) => DefinitionError::HookOverride {
                    model,
                    field,
                    ancestor: existing.owner_name.clone(),
                },
                // a descendant getter replaces the inherited one
                (Role::Getter, false) => {
                    self.drop_field(&field);
                    return self.register(owner, owner_name, &field, func);
                }
            });
        }
        self.entries.push(Entry {
            owner,
            owner_name: owner_name.to_string(),
            field: field.to_string(),
            order: NEXT_ORDER.fetch_add(1, Ordering::Relaxed),
            func,
        });
        Ok(())
    }

    /// Entries for `field` in declaration order, ancestors first.
    pub fn for_field<'a>(&'a self, field: &str) -> impl Iterator<Item = &'a Entry<F>> + use<'a, F> {
        let mut hits: Vec<&Entry<F>> = self.entries.iter().filter(|e| e.field == field).collect();
        hits.sort_by_key(|e| e.order);
        hits.into_iter()
    }

    pub fn len(&self) -> usize { self.entries.len() }
}

impl<F> fmt::Debug for Registry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| format!("{}.{}", e.owner_name, e.field)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> HookFn { Arc::new(|v, _| Ok(v)) }

    #[test]
    fn second_hook_on_same_field_is_rejected() {
        let mut reg = Registry::new(Role::Hook);
        let owner = ModelId::fresh();
        reg.register(owner, "A", "x", noop()).unwrap();
        let err = reg.register(owner, "A", "x", noop()).unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateHook { .. }));
    }

    #[test]
    fn descendant_cannot_rehook_an_ancestor_field() {
        let mut parent = Registry::new(Role::Hook);
        parent.register(ModelId::fresh(), "A", "x", noop()).unwrap();
        let mut child = Registry::new(Role::Hook);
        child.adopt(&parent, "x");
        let err = child.register(ModelId::fresh(), "B", "x", noop()).unwrap_err();
        match err {
            DefinitionError::HookOverride { ancestor, .. } => assert_eq!(ancestor, "A"),
            other => panic!("unexpected {other:?}"),
        }
        child.drop_field("x");
        assert!(child.register(ModelId::fresh(), "B", "x", noop()).is_ok());
    }

    #[test]
    fn descendant_getter_replaces_inherited_one() {
        let mut parent: Registry<GetterFn> = Registry::new(Role::Getter);
        parent.register(ModelId::fresh(), "A", "x", Arc::new(|_| Data::Int(1))).unwrap();
        let mut child = Registry::new(Role::Getter);
        child.adopt(&parent, "x");
        child.register(ModelId::fresh(), "B", "x", Arc::new(|_| Data::Int(2))).unwrap();
        let hits: Vec<_> = child.for_field("x").collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].owner_name, "B");
    }
}
