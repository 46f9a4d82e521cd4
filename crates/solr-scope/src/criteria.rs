//! The composable search scope.
//!
//! A [`Criteria`] is a handle on scope state. Builder methods take `&self`
//! and return a `Criteria`:
//!
//! - **mutable** scopes (the default) change in place and return a handle
//!   on the same state, so `a.with(..)` is visible through `a`;
//! - **immutable** scopes are never changed; each builder call returns a
//!   structural copy carrying the change.
//!
//! Whether a new scope is immutable is decided once, from
//! [`config::immutable_by_default`](crate::config::immutable_by_default),
//! when it is constructed.
//!
//! ```
//! use solr_scope::{Condition, Criteria, Predicate};
//!
//! let scope = Criteria::new()
//!     .search("title:blade")
//!     .with(Predicate::map().set(Condition::gte("year"), 1982))
//!     .order("year desc")
//!     .paginate((2, 10));
//!
//! assert_eq!(scope.current_page(), 2);
//! assert_eq!(scope.per_page(), 10);
//! ```
//!
//! Execution is lazy. The first call to a result operation ([`count`],
//! [`first`], [`documents`], ...) executes the scope through its backend and
//! caches the collection; later calls reuse it.
//!
//! [`count`]: Criteria::count
//! [`first`]: Criteria::first
//! [`documents`]: Criteria::documents

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::backend::{CollectionCallback, SearchBackend, SolrBackend};
use crate::collection::Collection;
use crate::config;
use crate::error::{Result, ScopeError};
use crate::field_mapper::AttributeMapping;
use crate::hydrate::{Document, RawDoc};
use crate::named_scope::ScopeHost;
use crate::options::{
    DocBuilder, Filters, OptionKey, Pagination, SearchOptions, DEFAULT_PER_PAGE, FIRST_PAGE,
};
use crate::params::WireParams;
use crate::predicate::{Predicate, WithKey};
use crate::value::{Coordinate, Distance, FilterValue};

struct ScopeState {
    clazz: Option<String>,
    filters: Filters,
    search_options: SearchOptions,
    immutable: bool,
    backend: Option<Arc<dyn SearchBackend>>,
    results: Option<Arc<Collection>>,
}

/// Composable, cloneable search scope.
pub struct Criteria {
    state: Arc<RwLock<ScopeState>>,
}

impl Criteria {
    /// Creates an untyped scope.
    pub fn new() -> Self {
        Criteria::build(None)
    }

    /// Creates a scope filtered to, and hydrating as, the given type.
    pub fn for_type(clazz: impl Into<String>) -> Self {
        Criteria::build(Some(clazz.into()))
    }

    /// Creates an untyped scope compiled and executed by a default [`SolrBackend`].
    pub fn solr() -> Self {
        let scope = Criteria::new();
        scope.state.write().backend = Some(Arc::new(SolrBackend::new()));
        scope
    }

    fn build(clazz: Option<String>) -> Self {
        Criteria {
            state: Arc::new(RwLock::new(ScopeState {
                clazz,
                filters: Filters::default(),
                search_options: SearchOptions::default(),
                immutable: config::immutable_by_default(),
                backend: None,
                results: None,
            })),
        }
    }

    // ========================================================================
    // Copy and mutation plumbing
    // ========================================================================

    /// Another handle on the same state.
    fn share(&self) -> Criteria {
        Criteria {
            state: Arc::clone(&self.state),
        }
    }

    fn self_or_clone(&self) -> Criteria {
        if self.is_immutable() {
            self.clone()
        } else {
            self.share()
        }
    }

    /// Applies `f` to the receiver, or to a copy when immutable.
    fn update<F>(&self, f: F) -> Criteria
    where
        F: FnOnce(&mut ScopeState),
    {
        let target = self.self_or_clone();
        f(&mut *target.state.write());
        target
    }

    /// Returns `true` when both handles point at the same state.
    pub fn same_scope(&self, other: &Criteria) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Marks this scope immutable from now on.
    pub fn immutable(&self) -> Criteria {
        self.state.write().immutable = true;
        self.share()
    }

    /// Whether builders return copies.
    pub fn is_immutable(&self) -> bool {
        self.state.read().immutable
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Type this scope searches, if any.
    pub fn clazz(&self) -> Option<String> {
        self.state.read().clazz.clone()
    }

    /// Copy of the filter groups.
    pub fn filters(&self) -> Filters {
        self.state.read().filters.clone()
    }

    /// Copy of the search options.
    pub fn search_options(&self) -> SearchOptions {
        self.state.read().search_options.clone()
    }

    /// The backend attached to this scope or, failing that, to its host.
    pub fn backend(&self) -> Option<Arc<dyn SearchBackend>> {
        let state = self.state.read();
        state.backend.clone().or_else(|| {
            state
                .search_options
                .named_scope_class
                .as_ref()
                .and_then(|host| host.search_backend().cloned())
        })
    }

    /// Requested page, or 1 when unset or not positive.
    pub fn current_page(&self) -> u64 {
        self.state
            .read()
            .search_options
            .pagination
            .and_then(|p| p.page)
            .filter(|page| *page > 0)
            .unwrap_or(FIRST_PAGE)
    }

    /// Requested page size, or 25 when unset. Zero is kept.
    pub fn per_page(&self) -> u64 {
        self.state
            .read()
            .search_options
            .pagination
            .and_then(|p| p.per_page)
            .unwrap_or(DEFAULT_PER_PAGE)
    }

    /// Fields back-filled on hydrated records: the scope's own selection,
    /// or the host's declared fields when nothing is selected.
    pub fn select_fields(&self) -> Vec<String> {
        let state = self.state.read();
        let options = &state.search_options;
        if !options.select.is_empty() {
            return options.select.clone();
        }
        options
            .named_scope_class
            .as_ref()
            .map(|host| host.declared_select_fields().to_vec())
            .unwrap_or_default()
    }

    // ========================================================================
    // Builders
    // ========================================================================

    /// Adds sort clauses, e.g. `"title asc"` or `"title asc, year desc"`.
    pub fn order(&self, order: impl Into<String>) -> Criteria {
        let order = order.into();
        self.update(|s| s.search_options.add_order([order]))
    }

    /// Adds a free-text term. Terms are AND-joined.
    pub fn search(&self, term: impl Into<String>) -> Criteria {
        let term = term.into();
        self.update(|s| s.search_options.add_search([term]))
    }

    /// Adds a filter predicate. Blank predicates are ignored.
    pub fn with(&self, predicate: impl Into<Predicate>) -> Criteria {
        let predicate = predicate.into();
        self.update(|s| {
            s.search_options.add_with(predicate);
        })
    }

    /// Adds several filter predicates.
    pub fn with_all<I, P>(&self, predicates: I) -> Criteria
    where
        I: IntoIterator<Item = P>,
        P: Into<Predicate>,
    {
        let predicates: Vec<Predicate> = predicates.into_iter().map(Into::into).collect();
        self.update(|s| {
            for predicate in predicates {
                s.search_options.add_with(predicate);
            }
        })
    }

    /// Excludes documents whose attribute has the given value.
    pub fn without(&self, attribute: impl Into<String>, value: impl Into<FilterValue>) -> Criteria {
        let (attribute, value) = (attribute.into(), value.into());
        self.update(|s| s.filters.add_without(attribute, value))
    }

    /// Restricts the returned fields. The identifier is always returned.
    pub fn select<I, S>(&self, fields: I) -> Criteria
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        self.update(|s| s.search_options.add_select(fields))
    }

    /// Requests facet counts for the given attributes.
    pub fn facet_fields<I, S>(&self, fields: I) -> Criteria
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        self.update(|s| s.search_options.add_facets(fields))
    }

    /// Adds named facet queries (label to raw query).
    pub fn facet_queries<I, K, V>(&self, queries: I) -> Criteria
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let queries: IndexMap<String, String> = queries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.update(|s| s.search_options.add_facet_queries(&queries))
    }

    /// Sets page and page size.
    pub fn paginate(&self, pagination: impl Into<Pagination>) -> Criteria {
        let pagination = pagination.into();
        self.update(|s| s.search_options.paginate(pagination))
    }

    /// Explicit row count; wins over pagination.
    pub fn rows(&self, rows: u64) -> Criteria {
        self.update(|s| s.search_options.rows = Some(rows))
    }

    /// Explicit offset; wins over pagination.
    pub fn start(&self, start: u64) -> Criteria {
        self.update(|s| s.search_options.start = Some(start))
    }

    /// Sets the geo search center.
    pub fn near(&self, center: impl Into<Coordinate>) -> Criteria {
        let center = center.into();
        self.update(|s| s.search_options.geo_center = Some(center))
    }

    /// Sets the geo search radius.
    pub fn within(&self, distance: Distance) -> Criteria {
        self.update(|s| s.search_options.geo_distance = Some(distance))
    }

    /// Adds custom options; the argument wins on collision.
    pub fn options<I, K, V>(&self, options: I) -> Criteria
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FilterValue>,
    {
        let options: IndexMap<String, FilterValue> = options
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.update(|s| s.search_options.add_custom_options(&options))
    }

    /// Declares attribute types; entries replace existing ones of the same name.
    pub fn attribute_mapping(&self, mapping: &AttributeMapping) -> Criteria {
        self.update(|s| s.search_options.overwrite_mapping(mapping))
    }

    /// Adds condition filters, compiled like a `with` map.
    pub fn conditions<I, K, V>(&self, conditions: I) -> Criteria
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<WithKey>,
        V: Into<FilterValue>,
    {
        let conditions: IndexMap<WithKey, FilterValue> = conditions
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.update(|s| s.filters.add_conditions(&conditions))
    }

    /// Restricts results to any of the given types.
    pub fn for_classes<I, S>(&self, classes: I) -> Criteria
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let classes: Vec<String> = classes.into_iter().map(Into::into).collect();
        self.update(|s| s.filters.add_classes(classes))
    }

    /// Attaches the host whose named scopes and mapping apply.
    pub fn named_scope_class(&self, host: Arc<ScopeHost>) -> Criteria {
        self.update(|s| s.search_options.named_scope_class = Some(host))
    }

    /// Sets the response writer (`wt`).
    pub fn format(&self, format: impl Into<String>) -> Criteria {
        let format = format.into();
        self.update(|s| s.search_options.format = Some(format))
    }

    /// Replaces record construction for every returned document.
    pub fn build_doc_method<F>(&self, build: F) -> Criteria
    where
        F: Fn(&RawDoc) -> Document + Send + Sync + 'static,
    {
        let builder = DocBuilder::new(build);
        self.update(|s| s.search_options.doc_builder = Some(builder))
    }

    /// Sets the backend used for execution.
    pub fn with_backend(&self, backend: Arc<dyn SearchBackend>) -> Criteria {
        self.update(|s| s.backend = Some(backend))
    }

    /// Removes one search option.
    pub fn except(&self, key: OptionKey) -> Criteria {
        self.update(|s| s.search_options.remove(key))
    }

    /// The same scope, returning identifiers only.
    pub fn only_ids(&self) -> Criteria {
        self.except(OptionKey::Select).select([crate::compiler::ID_FIELD])
    }

    // ========================================================================
    // Merge and named scopes
    // ========================================================================

    /// Folds `other`'s filters, then its search options, into this scope.
    ///
    /// Lists keep this scope's entries first. Plain maps let `other` win on
    /// collision. Scalars are taken from `other` only when unset here.
    pub fn merge(&self, other: &Criteria) -> Criteria {
        let (filters, options) = {
            let theirs = other.state.read();
            (theirs.filters.clone(), theirs.search_options.clone())
        };
        self.update(|s| {
            s.filters.merge_from(&filters);
            s.search_options.merge_from(&options);
        })
    }

    /// Returns `true` if the host of this scope registered `name`.
    pub fn named_scope_defined(&self, name: &str) -> bool {
        self.state
            .read()
            .search_options
            .named_scope_class
            .as_ref()
            .is_some_and(|host| host.defines_scope(name))
    }

    /// Invokes a named scope of the host and merges it into this scope.
    pub fn call(&self, name: &str, args: &[FilterValue]) -> Result<Criteria> {
        let host = self
            .state
            .read()
            .search_options
            .named_scope_class
            .clone()
            .filter(|host| host.defines_scope(name))
            .ok_or_else(|| ScopeError::unknown_operation(name))?;
        debug!(host = %host.name(), scope = name, "merging named scope");
        let fragment = host.call(name, args)?;
        Ok(self.merge(&fragment))
    }

    // ========================================================================
    // Compilation and execution
    // ========================================================================

    /// Compiles the wire parameters.
    pub fn to_params(&self) -> Result<WireParams> {
        self.backend()
            .ok_or(ScopeError::ImplementInSubclass("to_params"))?
            .to_params(self)
    }

    /// Executes the scope, bypassing the result cache.
    pub fn execute(&self) -> Result<Collection> {
        self.backend()
            .ok_or(ScopeError::ImplementInSubclass("execute"))?
            .execute(self)
    }

    /// Executes the scope and hands the collection to `callback`.
    pub fn execute_async<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce(Result<Collection>) + Send + 'static,
    {
        let callback: CollectionCallback = Box::new(callback);
        self.backend()
            .ok_or(ScopeError::ImplementInSubclass("execute_async"))?
            .execute_async(self, callback)
    }

    /// Executes once and caches the results.
    pub fn populate(&self) -> Result<Criteria> {
        if !self.populated() {
            let collection = Arc::new(self.execute()?);
            let mut state = self.state.write();
            if state.results.is_none() {
                state.results = Some(collection);
            }
        }
        Ok(self.share())
    }

    /// Whether results are cached.
    pub fn populated(&self) -> bool {
        self.state.read().results.is_some()
    }

    /// The cached results, executing first if needed.
    pub fn results(&self) -> Result<Arc<Collection>> {
        self.populate()?;
        self.state
            .read()
            .results
            .clone()
            .ok_or(ScopeError::ImplementInSubclass("populate"))
    }

    // ========================================================================
    // Result operations
    // ========================================================================

    /// Number of documents on the current page.
    pub fn count(&self) -> Result<usize> {
        Ok(self.results()?.len())
    }

    /// First document of the cached page.
    pub fn first(&self) -> Result<Option<Document>> {
        Ok(self.results()?.first().cloned())
    }

    /// Last document of the cached page.
    pub fn last(&self) -> Result<Option<Document>> {
        Ok(self.results()?.last().cloned())
    }

    /// Every document of the cached page.
    pub fn documents(&self) -> Result<Vec<Document>> {
        Ok(self.results()?.documents().to_vec())
    }

    /// Runs `f` over each document of the cached page.
    pub fn for_each<F>(&self, f: F) -> Result<()>
    where
        F: FnMut(&Document),
    {
        self.results()?.iter().for_each(f);
        Ok(())
    }

    /// Total number of matches reported by the engine.
    pub fn total_entries(&self) -> Result<u64> {
        Ok(self.results()?.total_entries())
    }

    /// Identifiers of the matching documents, fetched with [`only_ids`](Self::only_ids)
    /// on a copy so the receiver keeps its selection.
    pub fn ids(&self) -> Result<Vec<String>> {
        Ok(self.clone().only_ids().execute()?.ids().to_vec())
    }
}

impl Default for Criteria {
    fn default() -> Self {
        Criteria::new()
    }
}

/// Structural copy: filters and options are deep-copied, the immutability
/// flag and backend are kept, and the copy is not populated.
impl Clone for Criteria {
    fn clone(&self) -> Self {
        let state = self.state.read();
        Criteria {
            state: Arc::new(RwLock::new(ScopeState {
                clazz: state.clazz.clone(),
                filters: state.filters.clone(),
                search_options: state.search_options.clone(),
                immutable: state.immutable,
                backend: state.backend.clone(),
                results: None,
            })),
        }
    }
}

impl fmt::Debug for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Criteria")
            .field("clazz", &state.clazz)
            .field("filters", &state.filters)
            .field("search_options", &state.search_options)
            .field("immutable", &state.immutable)
            .field("populated", &state.results.is_some())
            .finish()
    }
}
