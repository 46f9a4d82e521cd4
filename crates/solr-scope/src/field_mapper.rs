//! Attribute to wire-field mapping.
//!
//! Solr schemas commonly declare dynamic fields by suffix (`*_s`, `*_i`,
//! `*_dt`, ...). An [`AttributeMapping`] records the semantic type of each
//! logical attribute, and the mapper turns `title` + `string` into
//! `title_s` on the way out and back again when results come in.
//!
//! | Type | Suffix |
//! |------|--------|
//! | `raw` | none |
//! | `string` | `s` |
//! | `text` | `t` |
//! | `int`, `integer` | `i` |
//! | `sint` | `si` |
//! | `float` | `f` |
//! | `double` | `d` |
//! | `date` | `dt` |
//! | `boolean` | `b` |
//! | `location` | `p` |
//! | `string_array` | `ms` |
//!
//! The same table drives the index side (see [`crate::indexer`]).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScopeError};

/// Semantic type of an attribute, as declared in a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Stored under the attribute name, no suffix.
    Raw,
    String,
    Text,
    Integer,
    SmallInt,
    Float,
    Double,
    Date,
    Boolean,
    Location,
    StringArray,
}

impl FieldType {
    /// Returns the dynamic-field suffix for this type, if it has one.
    pub fn suffix(self) -> Option<&'static str> {
        match self {
            FieldType::Raw => None,
            FieldType::String => Some("s"),
            FieldType::Text => Some("t"),
            FieldType::Integer => Some("i"),
            FieldType::SmallInt => Some("si"),
            FieldType::Float => Some("f"),
            FieldType::Double => Some("d"),
            FieldType::Date => Some("dt"),
            FieldType::Boolean => Some("b"),
            FieldType::Location => Some("p"),
            FieldType::StringArray => Some("ms"),
        }
    }

    /// Returns the suffix, failing for types that have none.
    pub fn required_suffix(self) -> Result<&'static str> {
        self.suffix()
            .ok_or_else(|| ScopeError::configuration(format!("no suffix for {} defined", self)))
    }

    /// Returns the canonical type name.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Raw => "raw",
            FieldType::String => "string",
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::SmallInt => "sint",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Date => "date",
            FieldType::Boolean => "boolean",
            FieldType::Location => "location",
            FieldType::StringArray => "string_array",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "raw" => Ok(FieldType::Raw),
            "string" => Ok(FieldType::String),
            "text" => Ok(FieldType::Text),
            "int" | "integer" => Ok(FieldType::Integer),
            "sint" => Ok(FieldType::SmallInt),
            "float" => Ok(FieldType::Float),
            "double" => Ok(FieldType::Double),
            "date" => Ok(FieldType::Date),
            "boolean" => Ok(FieldType::Boolean),
            "location" => Ok(FieldType::Location),
            "string_array" => Ok(FieldType::StringArray),
            other => Err(ScopeError::configuration(format!(
                "unknown field type '{}'",
                other
            ))),
        }
    }
}

/// Declaration of one mapped attribute.
///
/// The type is kept as written so that mappings can be loaded from config
/// files verbatim; it is resolved (and typos rejected) when a wire name is
/// computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    #[serde(rename = "type")]
    pub field_type: String,
    /// Virtual fields are computed by the indexer rather than read from the source.
    #[serde(default, rename = "virtual", skip_serializing_if = "std::ops::Not::not")]
    pub is_virtual: bool,
}

impl FieldDefinition {
    /// A stored field of the given type.
    pub fn new(field_type: impl Into<String>) -> Self {
        FieldDefinition {
            field_type: field_type.into(),
            is_virtual: false,
        }
    }

    /// A field computed by the indexer.
    pub fn virtual_field(field_type: impl Into<String>) -> Self {
        FieldDefinition {
            field_type: field_type.into(),
            is_virtual: true,
        }
    }

    /// Resolves the declared type name.
    pub fn resolve_type(&self) -> Result<FieldType> {
        self.field_type.parse()
    }
}

impl From<FieldType> for FieldDefinition {
    fn from(t: FieldType) -> Self {
        FieldDefinition::new(t.as_str())
    }
}

impl From<&str> for FieldDefinition {
    fn from(t: &str) -> Self {
        FieldDefinition::new(t)
    }
}

/// Attribute name to declared type, in declaration order.
///
/// # Example
///
/// ```
/// use solr_scope::{AttributeMapping, FieldType};
///
/// let mapping = AttributeMapping::new()
///     .field("title", FieldType::String)
///     .field("visits", "integer");
///
/// assert_eq!(mapping.wire_field("title").unwrap(), "title_s");
/// assert_eq!(mapping.wire_field("unmapped").unwrap(), "unmapped");
/// assert_eq!(mapping.reverse_field("visits_i").unwrap(), "visits");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeMapping {
    fields: IndexMap<String, FieldDefinition>,
}

impl AttributeMapping {
    /// An empty mapping.
    pub fn new() -> Self {
        AttributeMapping::default()
    }

    /// Adds (or replaces) an attribute declaration.
    pub fn field(mut self, name: impl Into<String>, definition: impl Into<FieldDefinition>) -> Self {
        self.insert(name, definition);
        self
    }

    /// Declares or replaces one attribute.
    pub fn insert(&mut self, name: impl Into<String>, definition: impl Into<FieldDefinition>) {
        self.fields.insert(name.into(), definition.into());
    }

    /// Definition of one attribute.
    pub fn get(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    /// Whether the attribute is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Declared attributes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldDefinition)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of declared attributes.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Copies every entry of `other`, replacing entries with the same name.
    pub fn overwrite_from(&mut self, other: &AttributeMapping) {
        for (name, def) in &other.fields {
            self.fields.insert(name.clone(), def.clone());
        }
    }

    /// Copies the entries of `other` whose names are not declared here.
    pub fn graft_from(&mut self, other: &AttributeMapping) {
        for (name, def) in &other.fields {
            if !self.fields.contains_key(name) {
                self.fields.insert(name.clone(), def.clone());
            }
        }
    }

    /// Returns the wire field for an attribute.
    ///
    /// Unmapped attributes pass through unchanged. Fails when the declared
    /// type is unknown.
    pub fn wire_field(&self, attribute: &str) -> Result<String> {
        match self.fields.get(attribute) {
            None => Ok(attribute.to_string()),
            Some(def) => {
                let field_type = def.resolve_type().map_err(|_| {
                    ScopeError::configuration(format!(
                        "unknown field type '{}' for attribute '{}'",
                        def.field_type, attribute
                    ))
                })?;
                Ok(decorate(attribute, field_type))
            }
        }
    }

    /// Returns the attribute whose wire field equals `wire_field`, or the
    /// input unchanged when nothing maps to it.
    ///
    /// When two attributes share a wire field the first declared wins; use
    /// [`check_unambiguous`](Self::check_unambiguous) to reject such
    /// mappings up front.
    pub fn reverse_field(&self, wire_field: &str) -> Result<String> {
        for name in self.fields.keys() {
            if self.wire_field(name)? == wire_field {
                return Ok(name.clone());
            }
        }
        Ok(wire_field.to_string())
    }

    /// Fails if any type is unknown or two attributes map to the same wire field.
    pub fn check_unambiguous(&self) -> Result<()> {
        let mut seen: HashMap<String, &str> = HashMap::with_capacity(self.fields.len());
        for name in self.fields.keys() {
            let wire = self.wire_field(name)?;
            if let Some(previous) = seen.insert(wire.clone(), name) {
                return Err(ScopeError::configuration(format!(
                    "attributes '{}' and '{}' both map to wire field '{}'",
                    previous, name, wire
                )));
            }
        }
        Ok(())
    }
}

impl<K, V> FromIterator<(K, V)> for AttributeMapping
where
    K: Into<String>,
    V: Into<FieldDefinition>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut mapping = AttributeMapping::new();
        for (name, def) in iter {
            mapping.insert(name, def);
        }
        mapping
    }
}

fn decorate(attribute: &str, field_type: FieldType) -> String {
    match field_type.suffix() {
        Some(suffix) => format!("{}_{}", attribute, suffix),
        None => attribute.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_table() {
        assert_eq!(FieldType::Raw.suffix(), None);
        assert_eq!(FieldType::String.suffix(), Some("s"));
        assert_eq!(FieldType::SmallInt.suffix(), Some("si"));
        assert_eq!(FieldType::Date.suffix(), Some("dt"));
        assert_eq!(FieldType::Location.suffix(), Some("p"));
        assert_eq!(FieldType::StringArray.suffix(), Some("ms"));
    }

    #[test]
    fn type_aliases_parse() {
        assert_eq!("int".parse::<FieldType>().unwrap(), FieldType::Integer);
        assert_eq!("integer".parse::<FieldType>().unwrap(), FieldType::Integer);
        assert!("strng".parse::<FieldType>().is_err());
    }

    #[test]
    fn raw_has_no_required_suffix() {
        let err = FieldType::Raw.required_suffix().unwrap_err();
        assert!(matches!(err, ScopeError::Configuration(_)));
    }

    #[test]
    fn wire_field_passes_unmapped_through() {
        let mapping = AttributeMapping::new();
        assert_eq!(mapping.wire_field("artist_name").unwrap(), "artist_name");
    }

    #[test]
    fn wire_field_uses_suffix() {
        let mapping = AttributeMapping::new().field("artist_name", FieldType::String);
        assert_eq!(mapping.wire_field("artist_name").unwrap(), "artist_name_s");
    }

    #[test]
    fn raw_type_keeps_name() {
        let mapping = AttributeMapping::new().field("body", FieldType::Raw);
        assert_eq!(mapping.wire_field("body").unwrap(), "body");
    }

    #[test]
    fn typo_in_type_is_a_configuration_error() {
        let mapping = AttributeMapping::new().field("title", "strin");
        let err = mapping.wire_field("title").unwrap_err();
        assert!(err.to_string().contains("strin"));
    }

    #[test]
    fn reverse_lookup() {
        let mapping = AttributeMapping::new().field("artist_name", FieldType::String);
        assert_eq!(mapping.reverse_field("artist_name_s").unwrap(), "artist_name");
        assert_eq!(mapping.reverse_field("artist_id_s").unwrap(), "artist_id_s");
    }

    #[test]
    fn ambiguous_mapping_detected() {
        // "a_s" as raw collides with "a" as string
        let mapping = AttributeMapping::new()
            .field("a", FieldType::String)
            .field("a_s", FieldType::Raw);
        assert!(mapping.check_unambiguous().is_err());

        let fine = AttributeMapping::new()
            .field("a", FieldType::String)
            .field("b", FieldType::String);
        assert!(fine.check_unambiguous().is_ok());
    }

    #[test]
    fn graft_keeps_existing_entries() {
        let mut mine = AttributeMapping::new().field("title", FieldType::String);
        let theirs = AttributeMapping::new()
            .field("title", FieldType::Text)
            .field("year", FieldType::Integer);
        mine.graft_from(&theirs);
        assert_eq!(mine.get("title").unwrap().field_type, "string");
        assert_eq!(mine.get("year").unwrap().field_type, "integer");
    }

    #[test]
    fn deserializes_from_yaml() {
        let yaml = "title:\n  type: string\nscore:\n  type: float\n  virtual: true\n";
        let mapping: AttributeMapping = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(mapping.wire_field("title").unwrap(), "title_s");
        assert!(mapping.get("score").unwrap().is_virtual);
    }
}
