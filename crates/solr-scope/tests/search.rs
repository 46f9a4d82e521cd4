//! End-to-end: scopes executed through the Solr backend over a canned transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use serial_test::serial;
use solr_scope::config::{self, ScopeConfig};
use solr_scope::{
    BoxError, BulkEncoder, Criteria, Document, FieldType, FilterValue, IndexDefinition,
    Predicate, ScopeError, ScopeHost, SearchRequest, SolrBackend, Transport,
};

// ============================================================================
// Test helpers
// ============================================================================

const OFFERS: &str = r#"{
  "responseHeader": {"status": 0, "QTime": 4},
  "response": {"numFound": 2, "start": 0, "docs": [
    {"id": "offers/1", "type": "Offer", "popularity_i": 10, "text_t": "Hans Meyer", "location_p": "47,11"},
    {"id": "offers/2", "type": "Offer", "popularity_i": 1, "text_t": "Marek Mintal"}
  ]},
  "facet_counts": {
    "facet_queries": {"popularity_i:[* TO 1]": 1, "popularity_i:[* TO 10]": 2},
    "facet_fields": {"text_t": ["han", 1, "marek", 1, "meyer", 1, "mintal", 1]}
  }
}"#;

/// Returns the same body for every request and counts calls.
#[derive(Debug)]
struct Canned {
    body: &'static str,
    calls: AtomicUsize,
}

impl Canned {
    fn new(body: &'static str) -> Arc<Self> {
        Arc::new(Canned {
            body,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for Canned {
    fn execute(&self, _request: &SearchRequest) -> Result<String, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.to_string())
    }
}

const OFFER_CONFIG: &str = "\
url: http://localhost:8983/solr/
mappings:
  Offer:
    popularity: { type: integer }
    text: { type: text }
    location: { type: location }
";

fn offer_host(transport: Arc<Canned>) -> Arc<ScopeHost> {
    let config = ScopeConfig::from_yaml_str(OFFER_CONFIG).unwrap();
    let backend = SolrBackend::new()
        .with_url("http://localhost:8983/solr")
        .with_transport(transport);
    Arc::new(
        config
            .host("Offer")
            .unwrap()
            .select_fields(["popularity", "text", "user_id"])
            .backend(Arc::new(backend))
            .named_search_scope("popular", |scope, args| {
                let min = args.first().cloned().unwrap_or(FilterValue::Int(5));
                scope.with(Predicate::map().set(solr_scope::Condition::gte("popularity"), min))
            })
            .named_search_scope("by_text", |scope, _| scope.order("text asc")),
    )
}

// ============================================================================
// Execution and hydration
// ============================================================================

#[test]
fn hydrates_records_with_logical_names() {
    let host = offer_host(Canned::new(OFFERS));
    let scope = host.search_scope();

    assert_eq!(scope.count().unwrap(), 2);
    assert_eq!(scope.total_entries().unwrap(), 2);

    let first = scope.first().unwrap().unwrap();
    let record = first.as_record().unwrap();
    assert_eq!(record.type_name(), "Offer");
    assert_eq!(record.id(), Some("1"));
    assert_eq!(record.get("popularity"), Some(&json!(10)));
    assert_eq!(record.get("text"), Some(&json!("Hans Meyer")));
    assert_eq!(record.get("location"), Some(&json!("47,11")));
    assert_eq!(record.get("user_id"), Some(&Value::Null));

    let last = scope.last().unwrap().unwrap();
    assert_eq!(last.id().as_deref(), Some("2"));
}

#[test]
fn results_are_cached_after_first_execution() {
    let transport = Canned::new(OFFERS);
    let scope = offer_host(Arc::clone(&transport)).search_scope();

    assert!(!scope.populated());
    scope.count().unwrap();
    scope.documents().unwrap();
    scope.for_each(|_| {}).unwrap();
    assert!(scope.populated());
    assert_eq!(transport.calls(), 1);

    scope.execute().unwrap();
    assert_eq!(transport.calls(), 2);
}

#[test]
fn copies_are_not_populated() {
    let transport = Canned::new(OFFERS);
    let scope = offer_host(Arc::clone(&transport)).search_scope();
    scope.populate().unwrap();
    let copy = scope.clone();
    assert!(!copy.populated());
    copy.count().unwrap();
    assert_eq!(transport.calls(), 2);
}

#[test]
fn facets_are_reverse_mapped_and_relabelled() {
    let scope = offer_host(Canned::new(OFFERS))
        .search_scope()
        .facet_fields(["text"])
        .facet_queries([("one", "popularity_i:[* TO 1]"), ("ten", "popularity_i:[* TO 10]")]);
    let collection = scope.results().unwrap();

    let facets = collection.facets().unwrap();
    assert_eq!(facets["text"]["marek"], 1);
    assert_eq!(facets["text"].len(), 4);

    let queries = collection.facet_queries();
    assert_eq!(queries["one"], 1);
    assert_eq!(queries["ten"], 2);
    assert_eq!(collection.raw_facet_queries()["popularity_i:[* TO 10]"], 2);
}

#[test]
fn collection_pages() {
    let scope = offer_host(Canned::new(OFFERS)).search_scope().paginate((2, 1));
    let collection = scope.results().unwrap();
    assert_eq!(collection.current_page(), 2);
    assert_eq!(collection.per_page(), 1);
    assert_eq!(collection.total_pages(), 2);
    assert_eq!(collection.original_criteria().current_page(), 2);
}

#[test]
fn ids_strip_namespace() {
    let scope = offer_host(Canned::new(OFFERS)).search_scope().select(["text"]);
    assert_eq!(scope.ids().unwrap(), vec!["1", "2"]);
    assert_eq!(scope.search_options().select, vec!["text"]);
}

#[test]
fn custom_doc_builder_replaces_records() {
    let scope = offer_host(Canned::new(OFFERS))
        .search_scope()
        .build_doc_method(|raw| {
            let mut doc = raw.clone();
            doc.insert("seen".to_string(), json!(true));
            Document::Raw(doc)
        });
    let docs = scope.documents().unwrap();
    assert!(docs.iter().all(|d| d.as_raw().is_some()));
    assert_eq!(docs[0].get("seen"), Some(&json!(true)));
}

#[test]
fn records_decode_into_caller_types() {
    #[derive(Debug, Deserialize)]
    struct Offer {
        id: String,
        popularity: u32,
        text: String,
    }

    let scope = offer_host(Canned::new(OFFERS)).search_scope();
    let offers: Vec<Offer> = scope
        .documents()
        .unwrap()
        .iter()
        .filter_map(Document::as_record)
        .map(|r| r.deserialize().unwrap())
        .collect();
    assert_eq!(offers[1].id, "2");
    assert_eq!(offers[1].popularity, 1);
    assert_eq!(offers[0].text, "Hans Meyer");
}

#[test]
fn untyped_documents_stay_raw() {
    let backend = SolrBackend::new().with_transport(Canned::new(OFFERS));
    let scope = Criteria::new().with_backend(Arc::new(backend));
    let first = scope.first().unwrap().unwrap();
    assert!(first.as_raw().is_some());
    assert_eq!(first.get("popularity_i"), Some(&json!(10)));

    let backend = SolrBackend::new()
        .with_transport(Canned::new(OFFERS))
        .with_record_type("Offer");
    let scope = Criteria::new().with_backend(Arc::new(backend));
    assert!(scope.first().unwrap().unwrap().as_record().is_some());
}

#[test]
fn malformed_payload_is_reported() {
    let backend = SolrBackend::new().with_transport(Canned::new("<html>oops</html>"));
    let scope = Criteria::new().with_backend(Arc::new(backend));
    match scope.count() {
        Err(ScopeError::PayloadParse { payload, .. }) => assert_eq!(payload, "<html>oops</html>"),
        other => panic!("unexpected: {:?}", other),
    }
    assert!(!scope.populated());
}

// ============================================================================
// Named scopes
// ============================================================================

#[test]
fn named_scopes_merge_into_caller() {
    let host = offer_host(Canned::new(OFFERS));
    assert_eq!(
        host.defined_named_search_scopes().collect::<Vec<_>>(),
        vec!["popular", "by_text"]
    );

    let scope = host
        .search_scope()
        .with("enabled_b:true")
        .call("popular", &[FilterValue::Int(7)])
        .unwrap()
        .call("by_text", &[])
        .unwrap();
    let params = scope.to_params().unwrap();
    assert_eq!(
        params.list("fq").unwrap(),
        ["enabled_b:true", "popularity_i:[7 TO *]", "type:Offer"]
    );
    assert_eq!(params.text("sort"), Some("text_t asc"));
}

#[test]
fn unknown_named_scope() {
    let scope = offer_host(Canned::new(OFFERS)).search_scope();
    assert!(!scope.named_scope_defined("cheap"));
    assert!(matches!(
        scope.call("cheap", &[]),
        Err(ScopeError::UnknownOperation(name)) if name == "cheap"
    ));
}

#[test]
fn ambiguous_host_mapping_is_rejected() {
    let mapping = solr_scope::AttributeMapping::new()
        .field("title", FieldType::String)
        .field("title_s", FieldType::Raw);
    assert!(matches!(
        ScopeHost::new("Offer").attribute_mapping(mapping),
        Err(ScopeError::Configuration(_))
    ));
}

// ============================================================================
// Process-wide settings
// ============================================================================

#[test]
#[serial]
fn immutable_by_default_applies_to_new_scopes_only() {
    config::reset();
    let before = Criteria::new();
    ScopeConfig::from_yaml_str("immutable_by_default: true\n")
        .unwrap()
        .install()
        .unwrap();
    let after = Criteria::new();

    assert!(!before.is_immutable());
    assert!(after.is_immutable());

    let changed = after.with("a:1");
    assert!(after.search_options().with.is_empty());
    assert_eq!(changed.search_options().with.len(), 1);

    before.with("a:1");
    assert_eq!(before.search_options().with.len(), 1);
    config::reset();
}

#[test]
#[serial]
fn backend_reads_configured_url() {
    config::reset();
    ScopeConfig::from_yaml_str("url: http://main/solr/\nread_url: http://replica/solr/\n")
        .unwrap()
        .install()
        .unwrap();
    assert_eq!(
        SolrBackend::new().select_url().as_deref(),
        Some("http://replica/solr/select")
    );
    assert_eq!(
        BulkEncoder::update_url().as_deref(),
        Some("http://main/solr/update/json?commit=true")
    );
    config::reset();
    assert_eq!(SolrBackend::new().select_url(), None);
}

// ============================================================================
// Index side
// ============================================================================

#[test]
fn indexed_documents_are_found_with_the_same_mapping() {
    let offers = IndexDefinition::new("Offer")
        .field("popularity", FieldType::Integer)
        .field("text", FieldType::Text)
        .field("location", FieldType::Location);

    let rows = [
        json!({"id": "offers/1", "popularity": 10, "text": "Hans Meyer", "location": "47,11"}),
        json!({"id": "offers/2", "popularity": 1, "text": "", "location": "95,11"}),
    ];
    let rows: Vec<_> = rows.iter().filter_map(Value::as_object).collect();
    let body = offers.encode_rows(rows.iter().copied()).unwrap();

    assert!(body.starts_with("{\n\"add\":{\"doc\":"));
    assert!(body.ends_with("\n}\n"));
    assert!(body.contains("\"popularity_i\":10"));
    assert!(body.contains("\"location_p\":\"47.0,11.0\""));
    assert!(!body.contains("95"));
    assert!(!body.contains("\"text_t\":\"\""));

    let params = offers
        .search_scope()
        .with(Predicate::map().set("popularity", 10))
        .order("text asc");
    let params = solr_scope::QueryCompiler::new(&params).to_params().unwrap();
    assert_eq!(params.list("fq").unwrap(), ["popularity_i:10", "type:Offer"]);
    assert_eq!(params.text("sort"), Some("text_t asc"));
}

#[test]
fn empty_batches_are_rejected() {
    let offers = IndexDefinition::new("Offer");
    assert!(matches!(
        offers.encode_rows(std::iter::empty()),
        Err(ScopeError::EmptyBatch)
    ));
}
