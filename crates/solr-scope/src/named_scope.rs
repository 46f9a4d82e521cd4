//! Scope hosts and their named-scope registries.
//!
//! A [`ScopeHost`] stands for a searchable record type: it knows the type
//! name, how its attributes map to wire fields, which fields to back-fill
//! on hydration, and a set of reusable query fragments registered by name.
//!
//! ```
//! use std::sync::Arc;
//! use solr_scope::{AttributeMapping, FieldType, Predicate, ScopeHost};
//!
//! let offers = Arc::new(
//!     ScopeHost::new("Offer")
//!         .attribute_mapping(AttributeMapping::new().field("popularity", FieldType::Integer))
//!         .unwrap()
//!         .named_search_scope("popular", |scope, _args| {
//!             scope.with("popularity_i:[100 TO *]").order("popularity desc")
//!         }),
//! );
//!
//! let scope = offers.search_scope().search("cheap").call("popular", &[]).unwrap();
//! assert_eq!(scope.search_options().order, vec!["popularity desc"]);
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::backend::SearchBackend;
use crate::criteria::Criteria;
use crate::error::{Result, ScopeError};
use crate::field_mapper::AttributeMapping;
use crate::value::FilterValue;

/// Fragment builder: receives a fresh scope of the host and the call arguments.
pub type ScopeFn = Arc<dyn Fn(Criteria, &[FilterValue]) -> Criteria + Send + Sync>;

/// A searchable type with a registry of named scopes.
#[derive(Clone)]
pub struct ScopeHost {
    name: String,
    attribute_mapping: AttributeMapping,
    select_fields: Vec<String>,
    scopes: IndexMap<String, ScopeFn>,
    backend: Option<Arc<dyn SearchBackend>>,
}

impl ScopeHost {
    /// A host with no mapping, scopes or backend.
    pub fn new(name: impl Into<String>) -> Self {
        ScopeHost {
            name: name.into(),
            attribute_mapping: AttributeMapping::default(),
            select_fields: Vec::new(),
            scopes: IndexMap::new(),
            backend: None,
        }
    }

    /// Declares the attribute mapping.
    ///
    /// Fails when a type is unknown or two attributes share a wire field,
    /// since reverse lookups on hydration would be ambiguous.
    pub fn attribute_mapping(mut self, mapping: AttributeMapping) -> Result<Self> {
        mapping.check_unambiguous()?;
        self.attribute_mapping = mapping;
        Ok(self)
    }

    /// Fields back-filled on hydrated records when a scope selects nothing.
    pub fn select_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Backend used by scopes created from this host.
    pub fn backend(mut self, backend: Arc<dyn SearchBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Registers a named scope. A later registration under the same name replaces it.
    pub fn named_search_scope<F>(mut self, name: impl Into<String>, build: F) -> Self
    where
        F: Fn(Criteria, &[FilterValue]) -> Criteria + Send + Sync + 'static,
    {
        self.scopes.insert(name.into(), Arc::new(build));
        self
    }

    /// Host type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared attribute mapping.
    pub fn mapping(&self) -> &AttributeMapping {
        &self.attribute_mapping
    }

    /// Fields back-filled on records when nothing is selected.
    pub fn declared_select_fields(&self) -> &[String] {
        &self.select_fields
    }

    /// Backend set with [`ScopeHost::backend`].
    pub fn search_backend(&self) -> Option<&Arc<dyn SearchBackend>> {
        self.backend.as_ref()
    }

    /// Whether a named scope is registered.
    pub fn defines_scope(&self, name: &str) -> bool {
        self.scopes.contains_key(name)
    }

    /// Names of the registered scopes, in registration order.
    pub fn defined_named_search_scopes(&self) -> impl Iterator<Item = &str> {
        self.scopes.keys().map(String::as_str)
    }

    /// A fresh scope typed to this host.
    pub fn search_scope(self: &Arc<Self>) -> Criteria {
        let mut scope = Criteria::for_type(self.name.clone());
        if !self.attribute_mapping.is_empty() {
            scope = scope.attribute_mapping(&self.attribute_mapping);
        }
        scope = scope.named_scope_class(Arc::clone(self));
        if let Some(backend) = &self.backend {
            scope = scope.with_backend(Arc::clone(backend));
        }
        scope
    }

    /// Builds the named fragment on a fresh scope.
    pub fn call(self: &Arc<Self>, name: &str, args: &[FilterValue]) -> Result<Criteria> {
        let build = self
            .scopes
            .get(name)
            .ok_or_else(|| ScopeError::unknown_operation(name))?;
        debug!(host = %self.name, scope = name, args = args.len(), "building named scope");
        Ok(build(self.search_scope(), args))
    }
}

impl fmt::Debug for ScopeHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeHost")
            .field("name", &self.name)
            .field("attribute_mapping", &self.attribute_mapping)
            .field("select_fields", &self.select_fields)
            .field("scopes", &self.scopes.keys().collect::<Vec<_>>())
            .field("backend", &self.backend)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_mapper::FieldType;

    #[test]
    fn rejects_ambiguous_mapping() {
        let mapping = AttributeMapping::new()
            .field("title", FieldType::String)
            .field("title_s", FieldType::Raw);
        assert!(ScopeHost::new("Offer").attribute_mapping(mapping).is_err());
    }

    #[test]
    fn search_scope_carries_type_and_mapping() {
        let host = Arc::new(
            ScopeHost::new("Offer")
                .attribute_mapping(AttributeMapping::new().field("title", FieldType::String))
                .unwrap(),
        );
        let scope = host.search_scope();
        assert_eq!(scope.clazz().as_deref(), Some("Offer"));
        assert_eq!(
            scope.search_options().mapping().wire_field("title").unwrap(),
            "title_s"
        );
        assert!(scope.search_options().named_scope_class.is_some());
    }

    #[test]
    fn unknown_scope_fails() {
        let host = Arc::new(ScopeHost::new("Offer"));
        assert!(matches!(
            host.call("nope", &[]),
            Err(ScopeError::UnknownOperation(name)) if name == "nope"
        ));
    }

    #[test]
    fn scope_receives_arguments() {
        let host = Arc::new(ScopeHost::new("Offer").named_search_scope(
            "for_user",
            |scope, args| match args.first() {
                Some(id) => scope.with(format!("user_id:{}", id)),
                None => scope,
            },
        ));
        assert!(host.defines_scope("for_user"));
        let scope = host.call("for_user", &[7.into()]).unwrap();
        assert_eq!(scope.search_options().with.len(), 1);
    }
}
