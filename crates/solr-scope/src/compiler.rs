//! Solr query compilation.
//!
//! [`QueryCompiler`] takes a snapshot of a criteria and renders it into
//! [`WireParams`]:
//!
//! | Param | Source |
//! |-------|--------|
//! | `q` | search terms, each parenthesized, AND-joined; `*:*` when none |
//! | `fq` | `with` predicates, conditions, `without` exclusions, geo filter, type filters |
//! | `sort` | orders, fields remapped |
//! | `facet`, `facet.field`, `facet.query` | facets and named facet queries |
//! | `fl` | selected fields plus `id` |
//! | `rows`, `start` | explicit values, else pagination |
//! | `pt`, `d`, `sfield` | geo center, radius in km, spatial field |
//! | `wt` | response format |
//!
//! Compilation has no side effects, so compiling the same scope twice gives
//! identical parameters.

use tracing::debug;

use crate::condition::{self, Condition, GEOFILT};
use crate::criteria::Criteria;
use crate::error::Result;
use crate::field_mapper::AttributeMapping;
use crate::options::{Filters, SearchOptions, DEFAULT_PER_PAGE, FIRST_PAGE};
use crate::ordering::sort_clause;
use crate::params::WireParams;
use crate::predicate::{Predicate, WithKey};
use crate::value::{Circle, Coordinate, FilterValue, KM_TO_METER};

/// Main query when no search term was given.
pub const DEFAULT_Q: &str = "*:*";
/// Identifier field, always returned.
pub const ID_FIELD: &str = "id";
/// Type discriminator field.
pub const TYPE_FIELD: &str = "type";
/// Spatial field used when the geo constraint does not name one.
pub const DEFAULT_GEO_FIELD: &str = "location";

/// Renders one criteria into wire parameters.
#[derive(Debug, Clone)]
pub struct QueryCompiler {
    clazz: Option<String>,
    filters: Filters,
    options: SearchOptions,
    mapping: AttributeMapping,
}

impl QueryCompiler {
    /// Snapshots a criteria for compilation.
    pub fn new(criteria: &Criteria) -> Self {
        QueryCompiler::from_parts(
            criteria.clazz(),
            criteria.filters(),
            criteria.search_options(),
        )
    }

    /// Builds a compiler from already-copied parts.
    pub fn from_parts(clazz: Option<String>, filters: Filters, options: SearchOptions) -> Self {
        let mapping = options.mapping();
        QueryCompiler {
            clazz,
            filters,
            options,
            mapping,
        }
    }

    /// Resolves an attribute to its wire field.
    pub fn wire_field(&self, attribute: &str) -> Result<String> {
        self.mapping.wire_field(attribute)
    }

    /// Search terms AND-joined, or `*:*` when none.
    pub fn q(&self) -> String {
        if self.options.search.is_empty() {
            return DEFAULT_Q.to_string();
        }
        self.options
            .search
            .iter()
            .map(|term| format!("({})", term))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Filter clauses, in order: `with`, conditions, `without`, geo, types.
    pub fn fq(&self) -> Result<Vec<String>> {
        let mut fq = Vec::new();
        for predicate in &self.options.with {
            match predicate {
                Predicate::Raw(raw) => fq.push(raw.clone()),
                Predicate::Map(map) => {
                    for (key, value) in map {
                        fq.extend(self.filters_for(key, value)?);
                    }
                }
            }
        }
        for (key, value) in &self.filters.conditions {
            fq.extend(self.filters_for(key, value)?);
        }
        for (attribute, values) in &self.filters.without {
            let field = self.wire_field(attribute)?;
            let not = Condition::not(attribute.as_str());
            fq.extend(values.iter().map(|v| not.render(&field, v)));
        }
        if self.geo_search() && !fq.iter().any(|f| f == GEOFILT) {
            fq.push(GEOFILT.to_string());
        }
        if let Some(clazz) = &self.clazz {
            fq.push(format!("{}:{}", TYPE_FIELD, clazz));
        }
        if !self.filters.classes.is_empty() {
            fq.push(
                self.filters
                    .classes
                    .iter()
                    .map(|c| format!("{}:{}", TYPE_FIELD, c))
                    .collect::<Vec<_>>()
                    .join(" OR "),
            );
        }
        Ok(fq)
    }

    /// Clauses for one map entry.
    ///
    /// Lists under a plain key become one clause per element; lists under an
    /// `in`/`nin` condition stay one clause.
    fn filters_for(&self, key: &WithKey, value: &FilterValue) -> Result<Vec<String>> {
        match key {
            WithKey::Condition(c) => {
                let field = self.wire_field(&c.attribute)?;
                let values = match value {
                    FilterValue::List(_) if c.operator.is_membership() => vec![value.clone()],
                    other => other.flatten(),
                };
                Ok(values.iter().map(|v| c.render(&field, v)).collect())
            }
            WithKey::Attribute(attribute) => {
                let field = self.wire_field(attribute)?;
                Ok(value.flatten().iter().map(|v| plain_filter(&field, v)).collect())
            }
        }
    }

    /// The `sort` parameter with fields remapped.
    pub fn sort(&self) -> Result<Option<String>> {
        sort_clause(&self.options.order, &self.mapping)
    }

    /// Whether any facet field or facet query was requested.
    pub fn include_facets(&self) -> bool {
        !self.options.facets.is_empty() || !self.options.facet_queries.is_empty()
    }

    /// Facet attributes as wire fields.
    pub fn facet_fields(&self) -> Result<Option<Vec<String>>> {
        if self.options.facets.is_empty() {
            return Ok(None);
        }
        let fields = self
            .options
            .facets
            .iter()
            .map(|f| self.wire_field(f))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(fields))
    }

    /// Raw facet queries, labels dropped.
    pub fn facet_query_values(&self) -> Option<Vec<String>> {
        if self.options.facet_queries.is_empty() {
            return None;
        }
        Some(self.options.facet_queries.values().cloned().collect())
    }

    /// Selected wire fields, comma-joined, always including the identifier.
    pub fn fl(&self) -> Result<Option<String>> {
        if self.options.select.is_empty() {
            return Ok(None);
        }
        let mut fields = self.options.select.clone();
        if !fields.iter().any(|f| f == ID_FIELD) {
            fields.push(ID_FIELD.to_string());
        }
        let wire = fields
            .iter()
            .map(|f| self.wire_field(f))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(wire.join(",")))
    }

    /// Requested page, defaulting to the first.
    pub fn current_page(&self) -> u64 {
        self.options
            .pagination
            .and_then(|p| p.page)
            .filter(|page| *page > 0)
            .unwrap_or(FIRST_PAGE)
    }

    /// Requested page size, defaulting to [`DEFAULT_PER_PAGE`].
    pub fn per_page(&self) -> u64 {
        self.options
            .pagination
            .and_then(|p| p.per_page)
            .unwrap_or(DEFAULT_PER_PAGE)
    }

    fn use_pagination(&self) -> bool {
        self.options.pagination.is_some()
            || self.options.rows.is_some()
            || self.options.start.is_some()
    }

    /// Explicit rows, else the page size. `None` without pagination.
    pub fn rows(&self) -> Option<u64> {
        if !self.use_pagination() {
            return None;
        }
        Some(self.options.rows.unwrap_or_else(|| self.per_page()))
    }

    /// Explicit start, else the offset of the current page. Saturates on huge pages.
    pub fn start(&self) -> Option<u64> {
        let rows = self.rows()?;
        Some(
            self.options
                .start
                .unwrap_or_else(|| (self.current_page() - 1).saturating_mul(rows)),
        )
    }

    fn circle_from_with(&self) -> Option<(&str, &Circle)> {
        self.options.with.iter().find_map(Predicate::geo_circle)
    }

    /// Center from `near`, else from a circle in `with`.
    pub fn geo_center(&self) -> Option<Coordinate> {
        self.options
            .geo_center
            .or_else(|| self.circle_from_with().map(|(_, c)| c.center))
    }

    /// Radius from `within`, else from a circle in `with`.
    pub fn geo_distance_in_meters(&self) -> Option<f64> {
        self.options
            .geo_distance
            .map(|d| d.in_meters())
            .or_else(|| self.circle_from_with().map(|(_, c)| c.radius_in_meters))
    }

    /// Geo search needs both a center and a distance.
    pub fn geo_search(&self) -> bool {
        self.geo_center().is_some() && self.geo_distance_in_meters().is_some()
    }

    /// Geo center as `lat,lng`.
    pub fn pt(&self) -> Option<String> {
        if !self.geo_search() {
            return None;
        }
        self.geo_center().map(|c| c.to_string())
    }

    /// Distance in kilometres.
    pub fn d(&self) -> Option<f64> {
        if !self.geo_search() {
            return None;
        }
        self.geo_distance_in_meters().map(|m| m / KM_TO_METER)
    }

    /// Spatial wire field: the circle's attribute, else the default location field.
    pub fn sfield(&self) -> Result<Option<String>> {
        if !self.geo_search() {
            return Ok(None);
        }
        let attribute = self
            .circle_from_with()
            .map(|(attribute, _)| attribute)
            .unwrap_or(DEFAULT_GEO_FIELD);
        Ok(Some(self.wire_field(attribute)?))
    }

    /// Compiles every parameter, dropping absent ones. `fq` is always present.
    pub fn to_params(&self) -> Result<WireParams> {
        let mut params = WireParams::new();
        params.insert("q", self.q());
        params.insert("fq", self.fq()?);
        params.insert_opt("sort", self.sort()?);
        params.insert_opt("facet", self.include_facets().then_some(true));
        params.insert_opt("facet.field", self.facet_fields()?);
        params.insert_opt("facet.query", self.facet_query_values());
        params.insert_opt("fl", self.fl()?);
        params.insert_opt("rows", self.rows());
        params.insert_opt("start", self.start());
        params.insert_opt("pt", self.pt());
        params.insert_opt("d", self.d());
        params.insert_opt("sfield", self.sfield()?);
        params.insert_opt("wt", self.options.format.clone());
        debug!(
            clazz = ?self.clazz,
            params = ?params.keys().collect::<Vec<_>>(),
            "compiled search parameters"
        );
        Ok(params)
    }
}

/// `field:value` for a plain key. Null means "has no value"; ranges and
/// shapes render like an `in` condition.
fn plain_filter(field: &str, value: &FilterValue) -> String {
    match value {
        FilterValue::Null => format!("!{}", condition::exists(field)),
        FilterValue::Range(..) | FilterValue::BoundingBox(_) | FilterValue::Circle(_) => {
            Condition::in_set(field).render(field, value)
        }
        v => format!("{}:{}", field, v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_mapper::FieldType;
    use crate::options::Pagination;
    use crate::value::Distance;

    fn compiler(options: SearchOptions) -> QueryCompiler {
        QueryCompiler::from_parts(None, Filters::default(), options)
    }

    #[test]
    fn default_q() {
        assert_eq!(compiler(SearchOptions::default()).q(), "*:*");
    }

    #[test]
    fn search_terms_are_and_joined() {
        let opts = SearchOptions {
            search: vec!["a b".into(), "c".into()],
            ..Default::default()
        };
        assert_eq!(compiler(opts).q(), "(a b) AND (c)");
    }

    #[test]
    fn plain_values() {
        assert_eq!(plain_filter("f", &FilterValue::Null), "!f:[* TO *]");
        assert_eq!(plain_filter("f", &FilterValue::from(1..=3)), "f:[1 TO 3]");
        assert_eq!(plain_filter("f", &"x".into()), "f:x");
    }

    #[test]
    fn plain_list_flattens() {
        let opts = SearchOptions {
            with: vec![Predicate::map().set("user_id", vec![1, 2])],
            ..Default::default()
        };
        assert_eq!(compiler(opts).fq().unwrap(), vec!["user_id:1", "user_id:2"]);
    }

    #[test]
    fn membership_lists_stay_whole() {
        let opts = SearchOptions {
            with: vec![Predicate::map().set(Condition::in_set("user_id"), vec![1, 2])],
            ..Default::default()
        };
        assert_eq!(
            compiler(opts).fq().unwrap(),
            vec!["user_id:1 OR user_id:2"]
        );
    }

    #[test]
    fn fields_are_mapped() {
        let opts = SearchOptions {
            with: vec![Predicate::map().set(Condition::gt("year"), 2000)],
            attribute_mapping: Some(AttributeMapping::new().field("year", FieldType::Integer)),
            ..Default::default()
        };
        assert_eq!(compiler(opts).fq().unwrap(), vec!["year_i:{2000 TO *}"]);
    }

    #[test]
    fn rows_and_start_need_pagination() {
        let c = compiler(SearchOptions::default());
        assert_eq!(c.rows(), None);
        assert_eq!(c.start(), None);
    }

    #[test]
    fn start_from_page() {
        let c = compiler(SearchOptions {
            pagination: Some(Pagination::new(3, 20)),
            ..Default::default()
        });
        assert_eq!(c.rows(), Some(20));
        assert_eq!(c.start(), Some(40));
    }

    #[test]
    fn geo_from_near_and_within() {
        let c = compiler(SearchOptions {
            geo_center: Some(Coordinate::new(47.0, 11.0)),
            geo_distance: Some(Distance::meters(10_000.0)),
            ..Default::default()
        });
        assert!(c.geo_search());
        assert_eq!(c.pt().unwrap(), "47.0,11.0");
        assert_eq!(c.d(), Some(10.0));
        assert_eq!(c.sfield().unwrap().as_deref(), Some("location"));
        assert_eq!(c.fq().unwrap(), vec![GEOFILT]);
    }

    #[test]
    fn center_without_distance_is_not_geo() {
        let c = compiler(SearchOptions {
            geo_center: Some(Coordinate::new(47.0, 11.0)),
            ..Default::default()
        });
        assert!(!c.geo_search());
        assert_eq!(c.pt(), None);
    }

    #[test]
    fn geo_from_circle_uses_its_field() {
        let circle = Circle::new((47.0, 11.0), Distance::kms(2.0));
        let c = compiler(SearchOptions {
            with: vec![Predicate::map().set(Condition::inside("place"), circle)],
            attribute_mapping: Some(AttributeMapping::new().field("place", FieldType::Location)),
            ..Default::default()
        });
        assert_eq!(c.sfield().unwrap().as_deref(), Some("place_p"));
        assert_eq!(c.d(), Some(2.0));
        assert_eq!(c.fq().unwrap(), vec![GEOFILT]);
    }

    #[test]
    fn type_and_classes() {
        let filters = Filters {
            classes: vec!["Offer".into(), "Deal".into()],
            ..Default::default()
        };
        let c = QueryCompiler::from_parts(Some("Offer".into()), filters, SearchOptions::default());
        assert_eq!(
            c.fq().unwrap(),
            vec!["type:Offer", "type:Offer OR type:Deal"]
        );
    }

    #[test]
    fn without_negates() {
        let mut filters = Filters::default();
        filters.add_without("user_id".into(), 1.into());
        filters.add_without("user_id".into(), FilterValue::Null);
        let c = QueryCompiler::from_parts(None, filters, SearchOptions::default());
        assert_eq!(c.fq().unwrap(), vec!["!user_id:1", "user_id:[* TO *]"]);
    }

    #[test]
    fn unknown_type_surfaces_at_compile_time() {
        let opts = SearchOptions {
            select: vec!["title".into()],
            attribute_mapping: Some(AttributeMapping::new().field("title", "strng")),
            ..Default::default()
        };
        assert!(compiler(opts).to_params().is_err());
    }
}
