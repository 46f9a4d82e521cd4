//! Filters and search options held by a criteria.
//!
//! Every key has its own accumulation rule. The rules live here so that
//! direct builder calls and [`merge_from`](SearchOptions::merge_from) use
//! the same code:
//!
//! | Key | Direct call | Merge |
//! |-----|-------------|-------|
//! | `order`, `search`, `select`, `facets`, `classes` | append, skip present | same, target first |
//! | `with` | append non-blank | concatenate, target first |
//! | `without` | append per key, skip present | same |
//! | `facet_queries`, `custom_options`, `conditions` | argument wins on collision | argument wins |
//! | `attribute_mapping` | argument overwrites entries | receiver wins, missing entries grafted |
//! | `pagination` fields, scalars | last write wins | receiver wins when set |

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::field_mapper::AttributeMapping;
use crate::hydrate::{Document, RawDoc};
use crate::named_scope::ScopeHost;
use crate::predicate::{Predicate, WithKey};
use crate::value::{Coordinate, Distance, FilterValue};

/// Number of documents per page when none was requested.
pub const DEFAULT_PER_PAGE: u64 = 25;
/// Pages are 1-based.
pub const FIRST_PAGE: u64 = 1;

/// Filter groups: type filters, condition maps and exclusions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    pub classes: Vec<String>,
    pub conditions: IndexMap<WithKey, FilterValue>,
    /// Attribute to excluded values.
    pub without: IndexMap<String, Vec<FilterValue>>,
}

impl Filters {
    /// Returns `true` if no filter group holds anything.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.conditions.is_empty() && self.without.is_empty()
    }

    pub(crate) fn add_classes<I, S>(&mut self, classes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        push_unique(&mut self.classes, classes.into_iter().map(Into::into));
    }

    pub(crate) fn add_conditions(&mut self, conditions: &IndexMap<WithKey, FilterValue>) {
        for (key, value) in conditions {
            self.conditions.insert(key.clone(), value.clone());
        }
    }

    pub(crate) fn add_without(&mut self, attribute: String, value: FilterValue) {
        let values = self.without.entry(attribute).or_default();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    /// Folds `other` into `self`.
    pub fn merge_from(&mut self, other: &Filters) {
        self.add_classes(other.classes.iter().cloned());
        self.add_conditions(&other.conditions);
        for (attribute, values) in &other.without {
            for value in values {
                self.add_without(attribute.clone(), value.clone());
            }
        }
    }
}

/// Requested page and page size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl Pagination {
    /// Page and page size.
    pub fn new(page: u64, per_page: u64) -> Self {
        Pagination {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    /// Page only; size defaults later.
    pub fn page(page: u64) -> Self {
        Pagination {
            page: Some(page),
            per_page: None,
        }
    }

    /// Page size only.
    pub fn per_page(per_page: u64) -> Self {
        Pagination {
            page: None,
            per_page: Some(per_page),
        }
    }

    /// Takes every field set in `other`.
    fn overwrite_from(&mut self, other: Pagination) {
        if other.page.is_some() {
            self.page = other.page;
        }
        if other.per_page.is_some() {
            self.per_page = other.per_page;
        }
    }

    /// Takes the fields of `other` that are unset here.
    fn fill_from(&mut self, other: Pagination) {
        self.page = self.page.or(other.page);
        self.per_page = self.per_page.or(other.per_page);
    }
}

impl From<(u64, u64)> for Pagination {
    fn from((page, per_page): (u64, u64)) -> Self {
        Pagination::new(page, per_page)
    }
}

/// Caller-supplied document builder, replacing record construction.
#[derive(Clone)]
pub struct DocBuilder(Arc<dyn Fn(&RawDoc) -> Document + Send + Sync>);

impl DocBuilder {
    /// Wraps a builder closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&RawDoc) -> Document + Send + Sync + 'static,
    {
        DocBuilder(Arc::new(f))
    }

    /// Builds one document.
    pub fn build(&self, doc: &RawDoc) -> Document {
        (self.0)(doc)
    }
}

impl fmt::Debug for DocBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DocBuilder(..)")
    }
}

/// Names of the search options, for [`Criteria::except`](crate::Criteria::except).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKey {
    Order,
    Search,
    With,
    Select,
    Facets,
    FacetQueries,
    AttributeMapping,
    Pagination,
    Rows,
    Start,
    GeoCenter,
    GeoDistance,
    NamedScopeClass,
    CustomOptions,
    Format,
    DocBuilder,
}

/// Structured query intent.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Raw `field dir` strings, parsed at compile time.
    pub order: Vec<String>,
    /// Free-text terms, AND-joined.
    pub search: Vec<String>,
    pub with: Vec<Predicate>,
    pub select: Vec<String>,
    pub facets: Vec<String>,
    /// Label to raw facet query.
    pub facet_queries: IndexMap<String, String>,
    pub attribute_mapping: Option<AttributeMapping>,
    pub pagination: Option<Pagination>,
    pub rows: Option<u64>,
    pub start: Option<u64>,
    pub geo_center: Option<Coordinate>,
    pub geo_distance: Option<Distance>,
    pub named_scope_class: Option<Arc<ScopeHost>>,
    pub custom_options: IndexMap<String, FilterValue>,
    /// Response writer (`wt`).
    pub format: Option<String>,
    pub doc_builder: Option<DocBuilder>,
}

impl SearchOptions {
    /// The attribute mapping, or an empty one.
    pub fn mapping(&self) -> AttributeMapping {
        self.attribute_mapping.clone().unwrap_or_default()
    }

    pub(crate) fn add_order<I: IntoIterator<Item = String>>(&mut self, orders: I) {
        push_unique(&mut self.order, orders);
    }

    pub(crate) fn add_search<I: IntoIterator<Item = String>>(&mut self, terms: I) {
        push_unique(&mut self.search, terms);
    }

    pub(crate) fn add_select<I: IntoIterator<Item = String>>(&mut self, fields: I) {
        push_unique(&mut self.select, fields);
    }

    pub(crate) fn add_facets<I: IntoIterator<Item = String>>(&mut self, fields: I) {
        push_unique(&mut self.facets, fields);
    }

    /// Appends a predicate unless it is blank. Returns whether it was kept.
    pub(crate) fn add_with(&mut self, predicate: Predicate) -> bool {
        if predicate.is_blank() {
            return false;
        }
        self.with.push(predicate);
        true
    }

    pub(crate) fn add_facet_queries(&mut self, queries: &IndexMap<String, String>) {
        for (label, query) in queries {
            self.facet_queries.insert(label.clone(), query.clone());
        }
    }

    pub(crate) fn add_custom_options(&mut self, options: &IndexMap<String, FilterValue>) {
        for (key, value) in options {
            self.custom_options.insert(key.clone(), value.clone());
        }
    }

    pub(crate) fn overwrite_mapping(&mut self, mapping: &AttributeMapping) {
        self.attribute_mapping
            .get_or_insert_with(AttributeMapping::default)
            .overwrite_from(mapping);
    }

    pub(crate) fn paginate(&mut self, pagination: Pagination) {
        self.pagination
            .get_or_insert_with(Pagination::default)
            .overwrite_from(pagination);
    }

    /// Removes one option.
    pub fn remove(&mut self, key: OptionKey) {
        match key {
            OptionKey::Order => self.order.clear(),
            OptionKey::Search => self.search.clear(),
            OptionKey::With => self.with.clear(),
            OptionKey::Select => self.select.clear(),
            OptionKey::Facets => self.facets.clear(),
            OptionKey::FacetQueries => self.facet_queries.clear(),
            OptionKey::AttributeMapping => self.attribute_mapping = None,
            OptionKey::Pagination => self.pagination = None,
            OptionKey::Rows => self.rows = None,
            OptionKey::Start => self.start = None,
            OptionKey::GeoCenter => self.geo_center = None,
            OptionKey::GeoDistance => self.geo_distance = None,
            OptionKey::NamedScopeClass => self.named_scope_class = None,
            OptionKey::CustomOptions => self.custom_options.clear(),
            OptionKey::Format => self.format = None,
            OptionKey::DocBuilder => self.doc_builder = None,
        }
    }

    /// Folds `other` into `self`.
    ///
    /// Lists keep `self`'s entries first, plain maps let `other` win, and
    /// scalars are taken from `other` only when unset here.
    pub fn merge_from(&mut self, other: &SearchOptions) {
        self.add_order(other.order.iter().cloned());
        self.add_search(other.search.iter().cloned());
        self.with.extend(other.with.iter().cloned());
        self.add_select(other.select.iter().cloned());
        self.add_facets(other.facets.iter().cloned());
        self.add_facet_queries(&other.facet_queries);
        self.add_custom_options(&other.custom_options);

        if let Some(theirs) = &other.attribute_mapping {
            self.attribute_mapping
                .get_or_insert_with(AttributeMapping::default)
                .graft_from(theirs);
        }
        if let Some(theirs) = other.pagination {
            self.pagination
                .get_or_insert_with(Pagination::default)
                .fill_from(theirs);
        }

        fill(&mut self.rows, &other.rows);
        fill(&mut self.start, &other.start);
        fill(&mut self.geo_center, &other.geo_center);
        fill(&mut self.geo_distance, &other.geo_distance);
        fill(&mut self.named_scope_class, &other.named_scope_class);
        fill(&mut self.format, &other.format);
        fill(&mut self.doc_builder, &other.doc_builder);
    }
}

fn fill<T: Clone>(mine: &mut Option<T>, theirs: &Option<T>) {
    if mine.is_none() {
        mine.clone_from(theirs);
    }
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, items: impl IntoIterator<Item = T>) {
    for item in items {
        if !list.contains(&item) {
            list.push(item);
        }
    }
}
