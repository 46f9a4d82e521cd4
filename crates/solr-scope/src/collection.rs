//! One page of hydrated results.

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::criteria::Criteria;
use crate::hydrate::Document;

/// Term to count.
pub type FacetCounts = IndexMap<String, u64>;

/// Hydrated documents plus page metadata and facets.
///
/// Named facet queries and identifiers are derived on first access and
/// memoized.
#[derive(Debug)]
pub struct Collection {
    documents: Vec<Document>,
    total_count: u64,
    current_page: u64,
    per_page: u64,
    facets: Option<IndexMap<String, FacetCounts>>,
    original_criteria: Criteria,
    original_response: Value,
    facet_queries: OnceCell<IndexMap<String, u64>>,
    ids: OnceCell<Vec<String>>,
}

impl Collection {
    /// Wraps one hydrated page of results.
    pub fn new(
        documents: Vec<Document>,
        total_count: u64,
        current_page: u64,
        per_page: u64,
        facets: Option<IndexMap<String, FacetCounts>>,
        original_criteria: Criteria,
        original_response: Value,
    ) -> Self {
        Collection {
            documents,
            total_count,
            current_page,
            per_page,
            facets,
            original_criteria,
            original_response,
            facet_queries: OnceCell::new(),
            ids: OnceCell::new(),
        }
    }

    /// Documents on this page.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Number of documents on this page.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns `true` if the page holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Iterates the documents in engine order.
    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.documents.iter()
    }

    /// First document on the page.
    pub fn first(&self) -> Option<&Document> {
        self.documents.first()
    }

    /// Last document on the page.
    pub fn last(&self) -> Option<&Document> {
        self.documents.last()
    }

    /// Document at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Document> {
        self.documents.get(index)
    }

    /// Number of matches across all pages.
    pub fn total_entries(&self) -> u64 {
        self.total_count
    }

    /// One-based page number.
    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    /// Requested page size.
    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    /// Pages needed for every match; 0 when the page size is 0.
    pub fn total_pages(&self) -> u64 {
        if self.per_page == 0 {
            return 0;
        }
        self.total_count.div_ceil(self.per_page)
    }

    /// Facet field histograms keyed by logical attribute.
    pub fn facets(&self) -> Option<&IndexMap<String, FacetCounts>> {
        self.facets.as_ref()
    }

    /// The criteria this page was compiled from.
    pub fn original_criteria(&self) -> &Criteria {
        &self.original_criteria
    }

    /// The parsed response body.
    pub fn original_response(&self) -> &Value {
        &self.original_response
    }

    /// The `facet_counts` section, or an empty map.
    pub fn raw_facet_counts(&self) -> serde_json::Map<String, Value> {
        self.original_response
            .get("facet_counts")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    /// Facet query counts keyed by the raw query string.
    pub fn raw_facet_queries(&self) -> IndexMap<String, u64> {
        self.original_response
            .get("facet_counts")
            .and_then(|c| c.get("facet_queries"))
            .and_then(Value::as_object)
            .map(|queries| {
                queries
                    .iter()
                    .map(|(query, count)| (query.clone(), count.as_u64().unwrap_or(0)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Facet query counts keyed by the labels given to
    /// [`Criteria::facet_queries`]. Queries without a label keep their raw
    /// string.
    pub fn facet_queries(&self) -> &IndexMap<String, u64> {
        self.facet_queries.get_or_init(|| {
            let labels = self.original_criteria.search_options().facet_queries;
            self.raw_facet_queries()
                .into_iter()
                .map(|(raw, count)| {
                    let label = labels
                        .iter()
                        .find(|(_, query)| **query == raw)
                        .map(|(label, _)| label.clone())
                        .unwrap_or(raw);
                    (label, count)
                })
                .collect()
        })
    }

    /// Identifiers of the documents, without namespace prefix.
    pub fn ids(&self) -> &[String] {
        self.ids
            .get_or_init(|| self.documents.iter().filter_map(Document::id).collect())
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}
