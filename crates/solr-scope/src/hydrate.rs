//! Turning engine responses into collections.
//!
//! A response body looks like:
//!
//! ```json
//! {
//!   "responseHeader": {"QTime": 3},
//!   "response": {"numFound": 2, "docs": [{"id": "offers/1", "type": "Offer", "title_s": "x"}]},
//!   "facet_counts": {
//!     "facet_fields": {"title_s": ["x", 1, "y", 2]},
//!     "facet_queries": {"price_f:[* TO 10]": 4}
//!   }
//! }
//! ```
//!
//! Documents whose `type` is a known record type become [`Record`]s with
//! logical attribute names; everything else stays a raw map.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::collection::{Collection, FacetCounts};
use crate::compiler::{ID_FIELD, TYPE_FIELD};
use crate::criteria::Criteria;
use crate::error::{Result, ScopeError};
use crate::field_mapper::AttributeMapping;
use crate::options::DocBuilder;

/// A document as returned by the engine.
pub type RawDoc = serde_json::Map<String, Value>;

/// Names of the types documents may be hydrated into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordTypes(HashSet<String>);

impl RecordTypes {
    /// An empty set.
    pub fn new() -> Self {
        RecordTypes::default()
    }

    /// Adds a type name.
    pub fn insert(&mut self, name: impl Into<String>) {
        self.0.insert(name.into());
    }

    /// Whether the type is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// Returns `true` if no type is registered.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for RecordTypes {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        RecordTypes(iter.into_iter().map(Into::into).collect())
    }
}

/// A typed record: logical attribute names, identifier without namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_name: String,
    attributes: RawDoc,
    raw: RawDoc,
}

impl Record {
    /// Type the record was hydrated as.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Attributes under their logical names.
    pub fn attributes(&self) -> &RawDoc {
        &self.attributes
    }

    /// The document as the engine returned it.
    pub fn raw(&self) -> &RawDoc {
        &self.raw
    }

    /// One attribute by logical name.
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute)
    }

    /// Identifier without the type namespace.
    pub fn id(&self) -> Option<&str> {
        self.attributes.get(ID_FIELD).and_then(Value::as_str)
    }

    /// Decodes the attributes into a caller type.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.attributes.clone()))
            .map_err(ScopeError::RecordDecode)
    }
}

/// One hydrated document.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Record(Record),
    Raw(RawDoc),
}

impl Document {
    /// The record, unless the document stayed raw.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Document::Record(r) => Some(r),
            Document::Raw(_) => None,
        }
    }

    /// The raw map, unless the document became a record.
    pub fn as_raw(&self) -> Option<&RawDoc> {
        match self {
            Document::Raw(doc) => Some(doc),
            Document::Record(_) => None,
        }
    }

    /// Value of a field: an attribute for records, a wire key for raw maps.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Document::Record(r) => r.get(key),
            Document::Raw(doc) => doc.get(key),
        }
    }

    /// Identifier without namespace prefix.
    pub fn id(&self) -> Option<String> {
        self.get(ID_FIELD).and_then(id_segment)
    }
}

/// Last `/` segment of an identifier value.
pub(crate) fn id_segment(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(s) => s.clone(),
        Value::Null => return None,
        other => other.to_string(),
    };
    id.rsplit('/').next().map(str::to_string)
}

#[derive(Debug, Deserialize)]
struct Payload {
    response: ResponseSection,
    #[serde(default)]
    facet_counts: Option<FacetSection>,
}

#[derive(Debug, Deserialize)]
struct ResponseSection {
    #[serde(rename = "numFound")]
    num_found: u64,
    #[serde(default)]
    docs: Vec<RawDoc>,
}

#[derive(Debug, Default, Deserialize)]
struct FacetSection {
    #[serde(default)]
    facet_fields: Option<IndexMap<String, Vec<Value>>>,
}

/// Builds collections for one compiled criteria.
#[derive(Debug, Clone)]
pub struct ResultHydrator {
    criteria: Criteria,
    mapping: AttributeMapping,
    record_types: RecordTypes,
    doc_builder: Option<DocBuilder>,
}

impl ResultHydrator {
    /// `record_types` is extended with the criteria's own type and its host's name.
    pub fn new(criteria: &Criteria, mut record_types: RecordTypes) -> Self {
        let options = criteria.search_options();
        if let Some(clazz) = criteria.clazz() {
            record_types.insert(clazz);
        }
        if let Some(host) = &options.named_scope_class {
            record_types.insert(host.name());
        }
        ResultHydrator {
            criteria: criteria.clone(),
            mapping: options.mapping(),
            record_types,
            doc_builder: options.doc_builder.clone(),
        }
    }

    /// Parses a raw body. Malformed bodies fail with the payload attached.
    pub fn hydrate(&self, body: &str) -> Result<Collection> {
        let json: Value = serde_json::from_str(body).map_err(|e| {
            warn!(error = %e, "unable to parse search response");
            ScopeError::payload_parse(body, e)
        })?;
        self.hydrate_value(json)
    }

    /// Builds a collection from an already parsed response.
    pub fn hydrate_value(&self, json: Value) -> Result<Collection> {
        let payload = Payload::deserialize(&json).map_err(|e| {
            warn!(error = %e, "search response has an unexpected shape");
            ScopeError::payload_parse(json.to_string(), e)
        })?;
        let per_page = match self.criteria.per_page() {
            0 => 1,
            n => n,
        };
        let facets = match payload.facet_counts.and_then(|f| f.facet_fields) {
            Some(fields) => Some(self.facets_from(fields)?),
            None => None,
        };
        let documents = payload
            .response
            .docs
            .iter()
            .map(|doc| self.build_doc_with_method(doc))
            .collect::<Result<Vec<_>>>()?;
        Ok(Collection::new(
            documents,
            payload.response.num_found,
            self.criteria.current_page(),
            per_page,
            facets,
            self.criteria.clone(),
            json,
        ))
    }

    fn build_doc_with_method(&self, doc: &RawDoc) -> Result<Document> {
        match &self.doc_builder {
            Some(builder) => Ok(builder.build(doc)),
            None => self.build_doc(doc),
        }
    }

    /// Instantiates a record when the document's type is known.
    pub fn build_doc(&self, doc: &RawDoc) -> Result<Document> {
        let type_name = match doc.get(TYPE_FIELD).and_then(Value::as_str) {
            Some(name) if self.record_types.contains(name) => name.to_string(),
            _ => return Ok(Document::Raw(doc.clone())),
        };
        Ok(Document::Record(Record {
            type_name,
            attributes: self.convert_doc_attributes(doc)?,
            raw: doc.clone(),
        }))
    }

    /// Reverse-maps keys, strips the identifier namespace and back-fills
    /// selected attributes with null.
    pub fn convert_doc_attributes(&self, doc: &RawDoc) -> Result<RawDoc> {
        let mut converted = RawDoc::new();
        for (key, value) in doc {
            if key == ID_FIELD {
                let id = id_segment(value).map(Value::String).unwrap_or(Value::Null);
                converted.insert(ID_FIELD.to_string(), id);
            } else {
                converted.insert(self.mapping.reverse_field(key)?, value.clone());
            }
        }
        for field in self.criteria.select_fields() {
            converted.entry(field).or_insert(Value::Null);
        }
        Ok(converted)
    }

    fn facets_from(&self, fields: IndexMap<String, Vec<Value>>) -> Result<IndexMap<String, FacetCounts>> {
        let mut facets = IndexMap::with_capacity(fields.len());
        for (field, pairs) in fields {
            let counts = pairs
                .chunks(2)
                .filter_map(|pair| match pair {
                    [term, count] => Some((term_string(term), count.as_u64().unwrap_or(0))),
                    _ => None,
                })
                .collect();
            facets.insert(self.mapping.reverse_field(&field)?, counts);
        }
        Ok(facets)
    }
}

fn term_string(term: &Value) -> String {
    match term {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
