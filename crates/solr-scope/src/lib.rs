//! solr-scope - Composable search scopes compiled to Solr query parameters.
//!
//! solr-scope provides a fluent API for describing a search, compiling it
//! into the engine's wire parameters and turning the response back into
//! typed records. It supports:
//!
//! - Typed attribute mappings: logical names become suffixed wire fields
//! - Operator conditions: negation, comparisons, membership, ranges, geo shapes
//! - Scope algebra: mutable or copy-on-write builders, merges, named scopes
//! - Facets, named facet queries, pagination and geo search
//! - Lazy execution through a pluggable transport, with cached results
//! - The index side: row to document conversion and bulk update bodies
//!
//! # Quick Start
//!
//! ```rust
//! use solr_scope::{AttributeMapping, Condition, Criteria, FieldType, Predicate, QueryCompiler};
//!
//! let mapping = AttributeMapping::new()
//!     .field("title", FieldType::String)
//!     .field("year", FieldType::Integer);
//!
//! let scope = Criteria::for_type("Movie")
//!     .attribute_mapping(&mapping)
//!     .search("blade")
//!     .with(Predicate::map().set(Condition::gte("year"), 1982))
//!     .order("year desc")
//!     .select(["title"])
//!     .paginate((2, 10));
//!
//! let params = QueryCompiler::new(&scope).to_params().unwrap();
//! assert_eq!(params.text("q"), Some("(blade)"));
//! assert_eq!(params.list("fq").unwrap(), ["year_i:[1982 TO *]", "type:Movie"]);
//! assert_eq!(params.text("sort"), Some("year_i desc"));
//! assert_eq!(params.text("fl"), Some("title_s,id"));
//! assert_eq!(params.get("rows").unwrap().as_int(), Some(10));
//! assert_eq!(params.get("start").unwrap().as_int(), Some(10));
//! ```
//!
//! # Scope Semantics
//!
//! Builders take `&self` and return a [`Criteria`]. A mutable scope (the
//! default) is changed in place; an immutable one is copied and the copy
//! changed. Whether new scopes are immutable is read from
//! [`config::immutable_by_default`] at construction.
//!
//! Merging folds another scope into the receiver:
//!
//! - **Lists** (`with`, `order`, `search`, `select`, ...): receiver first, then argument
//! - **Plain maps** (`facet_queries`, options, conditions): argument wins on collision
//! - **Scalars** (`rows`, `format`, ...): taken from the argument only when unset
//!
//! # Execution
//!
//! Result operations ([`Criteria::count`], [`Criteria::first`], ...) execute
//! the scope once through its [`SearchBackend`] and cache the
//! [`Collection`]. The stock [`SolrBackend`] needs a [`Transport`] supplied
//! by the caller.
//!
//! # Field Types
//!
//! | Type | Suffix |
//! |------|--------|
//! | `raw` | none |
//! | `string` | `_s` |
//! | `text` | `_t` |
//! | `int`, `integer` | `_i` |
//! | `sint` | `_si` |
//! | `float` | `_f` |
//! | `double` | `_d` |
//! | `date` | `_dt` |
//! | `boolean` | `_b` |
//! | `location` | `_p` |
//! | `string_array` | `_ms` |

mod backend;
mod collection;
mod compiler;
mod condition;
pub mod config;
mod criteria;
mod error;
mod field_mapper;
mod hydrate;
mod indexer;
mod named_scope;
mod op;
mod options;
mod ordering;
mod params;
mod predicate;
mod value;

// Re-export public API
pub use backend::{
    qtime_from_body, BodyCallback, CollectionCallback, Method, SearchBackend, SearchRequest,
    SolrBackend, Transport,
};
pub use collection::{Collection, FacetCounts};
pub use compiler::{QueryCompiler, DEFAULT_GEO_FIELD, DEFAULT_Q, ID_FIELD, TYPE_FIELD};
pub use condition::{Condition, GEOFILT};
pub use criteria::Criteria;
pub use error::{BoxError, Result, ScopeError};
pub use field_mapper::{AttributeMapping, FieldDefinition, FieldType};
pub use hydrate::{Document, RawDoc, Record, RecordTypes, ResultHydrator};
pub use indexer::{normalize_date, validate_lat, validate_lng, BulkEncoder, IndexDefinition};
pub use named_scope::{ScopeFn, ScopeHost};
pub use op::Operator;
pub use options::{
    DocBuilder, Filters, OptionKey, Pagination, SearchOptions, DEFAULT_PER_PAGE, FIRST_PAGE,
};
pub use ordering::{sort_clause, Dir, OrderBy};
pub use params::{ParamValue, WireParams};
pub use predicate::{Predicate, WithKey};
pub use value::{
    fmt_float, iso_date, iso_time, BoundingBox, Circle, Coordinate, Distance, FilterValue, LatLng,
    KM_TO_METER,
};
