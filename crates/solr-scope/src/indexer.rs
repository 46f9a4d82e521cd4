//! Index side: source rows to wire documents, and bulk update bodies.
//!
//! An [`IndexDefinition`] shares the suffix table with the query side, so a
//! field indexed through it is found again by a [`Criteria`] carrying the
//! same mapping:
//!
//! ```
//! use serde_json::json;
//! use solr_scope::{FieldType, IndexDefinition};
//!
//! let offers = IndexDefinition::new("Offer")
//!     .field("title", FieldType::String)
//!     .field("created_at", FieldType::Date);
//!
//! let row = json!({"id": "offers/1", "title": "Bike", "created_at": "2011-02-03 04:05:06"});
//! let doc = offers.to_document(row.as_object().unwrap()).unwrap();
//!
//! assert_eq!(doc["type"], "Offer");
//! assert_eq!(doc["title_s"], "Bike");
//! assert_eq!(doc["created_at_dt"], "2011-02-03T04:05:06Z");
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::warn;

use crate::compiler::{ID_FIELD, TYPE_FIELD};
use crate::config;
use crate::criteria::Criteria;
use crate::error::{Result, ScopeError};
use crate::field_mapper::{AttributeMapping, FieldDefinition, FieldType};
use crate::hydrate::RawDoc;
use crate::value::{iso_date, iso_time, Coordinate};

const MAX_LAT: f64 = 90.0;
const MAX_LNG: f64 = 180.0;

/// A type name plus the attribute mapping its documents are indexed with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDefinition {
    clazz: Option<String>,
    mapping: AttributeMapping,
}

impl IndexDefinition {
    /// A definition tagging documents with `clazz`.
    pub fn new(clazz: impl Into<String>) -> Self {
        IndexDefinition {
            clazz: Some(clazz.into()),
            mapping: AttributeMapping::new(),
        }
    }

    /// A definition whose documents carry no type discriminator.
    pub fn untyped() -> Self {
        IndexDefinition::default()
    }

    /// Declares one source field.
    pub fn field(mut self, name: impl Into<String>, definition: impl Into<FieldDefinition>) -> Self {
        self.mapping.insert(name, definition);
        self
    }

    /// Declares every field of a mapping, overwriting existing ones.
    pub fn with_mapping(mut self, mapping: &AttributeMapping) -> Self {
        self.mapping.overwrite_from(mapping);
        self
    }

    /// Type discriminator written to each document.
    pub fn clazz(&self) -> Option<&str> {
        self.clazz.as_deref()
    }

    /// Declared fields.
    pub fn mapping(&self) -> &AttributeMapping {
        &self.mapping
    }

    /// Attributes read from the source, i.e. every non-virtual field.
    pub fn source_fields(&self) -> Vec<&str> {
        self.mapping
            .iter()
            .filter(|(_, def)| !def.is_virtual)
            .map(|(name, _)| name)
            .collect()
    }

    /// A scope typed to this definition and carrying its mapping.
    pub fn search_scope(&self) -> Criteria {
        let scope = match &self.clazz {
            Some(clazz) => Criteria::for_type(clazz.clone()),
            None => Criteria::new(),
        };
        scope.attribute_mapping(&self.mapping)
    }

    /// Converts one source row into a wire document.
    ///
    /// Mapped attributes get their type suffix, unmapped keys pass through,
    /// blank values are dropped. Mapped types without a suffix are a
    /// configuration error.
    pub fn to_document(&self, row: &RawDoc) -> Result<RawDoc> {
        let mut doc = RawDoc::new();
        if let Some(clazz) = &self.clazz {
            doc.insert(TYPE_FIELD.to_string(), Value::String(clazz.clone()));
        }
        for (key, value) in row {
            if is_blank(value) {
                continue;
            }
            let Some(definition) = self.mapping.get(key) else {
                doc.insert(key.clone(), value.clone());
                continue;
            };
            let field_type = definition.resolve_type()?;
            let wire = format!("{}_{}", key, field_type.required_suffix()?);
            match index_value(field_type, value) {
                Some(value) => {
                    doc.insert(wire, value);
                }
                None => warn!(field = %wire, value = %value, "dropping invalid index value"),
            }
        }
        if !doc.contains_key(ID_FIELD) {
            return Err(ScopeError::configuration("source row has no id"));
        }
        Ok(doc)
    }

    /// Converts every row and encodes the bulk update body.
    pub fn encode_rows<'a, I>(&self, rows: I) -> Result<String>
    where
        I: IntoIterator<Item = &'a RawDoc>,
    {
        let docs = rows
            .into_iter()
            .map(|row| self.to_document(row))
            .collect::<Result<Vec<_>>>()?;
        BulkEncoder::encode(&docs)
    }
}

fn index_value(field_type: FieldType, value: &Value) -> Option<Value> {
    match field_type {
        FieldType::Date => Some(match value {
            Value::String(s) => Value::String(normalize_date(s)),
            other => other.clone(),
        }),
        FieldType::Location => location(value).map(|c| Value::String(c.to_string())),
        _ => Some(value.clone()),
    }
}

/// Normalizes a source date to UTC ISO-8601 with a trailing `Z`.
///
/// `2011-02-03 04:05:06` becomes `2011-02-03T04:05:06Z`. Values carrying an
/// offset are converted to UTC. Anything unrecognized has its space
/// separator replaced and `Z` appended.
pub fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return iso_time(time.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(time) = NaiveDateTime::parse_from_str(raw, format) {
            return iso_time(time.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return iso_date(date);
    }
    let replaced = raw.replace(' ', "T");
    if replaced.ends_with('Z') {
        replaced
    } else {
        format!("{}Z", replaced)
    }
}

fn location(value: &Value) -> Option<Coordinate> {
    let (lat, lng) = match value {
        Value::String(s) => {
            let (lat, lng) = s.split_once(',')?;
            (Value::from(lat.trim()), Value::from(lng.trim()))
        }
        Value::Array(items) if items.len() == 2 => (items[0].clone(), items[1].clone()),
        Value::Object(map) => (
            map.get("lat").cloned().unwrap_or(Value::Null),
            map.get("lng").cloned().unwrap_or(Value::Null),
        ),
        _ => return None,
    };
    Some(Coordinate::new(validate_lat(&lat)?, validate_lng(&lng)?))
}

/// Latitude as a float, or `None` when blank, unparsable or beyond 90.
pub fn validate_lat(value: &Value) -> Option<f64> {
    float_within(value, MAX_LAT)
}

/// Longitude as a float, or `None` when blank, unparsable or beyond 180.
pub fn validate_lng(value: &Value) -> Option<f64> {
    float_within(value, MAX_LNG)
}

fn float_within(value: &Value, border: f64) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) if !s.trim().is_empty() => s.trim().parse().ok()?,
        _ => return None,
    };
    (n.abs() <= border).then_some(n)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Writes JSON update bodies for the engine's update handler.
pub struct BulkEncoder;

impl BulkEncoder {
    /// `{"add":{"doc":{..}},\n"add":{"doc":{..}}}` with blank values removed.
    ///
    /// The body repeats the `add` key, which the update handler accepts.
    pub fn encode(docs: &[RawDoc]) -> Result<String> {
        if docs.is_empty() {
            return Err(ScopeError::EmptyBatch);
        }
        let mut body = String::from("{\n");
        for (i, doc) in docs.iter().enumerate() {
            if i > 0 {
                body.push_str(",\n");
            }
            let filtered: RawDoc = doc
                .iter()
                .filter(|(_, value)| !is_blank(value))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            let add = serde_json::json!({ "doc": filtered });
            body.push_str("\"add\":");
            body.push_str(&add.to_string());
        }
        body.push_str("\n}\n");
        Ok(body)
    }

    /// `<url>/update/json?commit=true`, from the configured write URL.
    pub fn update_url() -> Option<String> {
        config::url().map(|url| format!("{}/update/json?commit=true", url))
    }
}
