//! Fragments accepted by `with`.

use indexmap::IndexMap;

use crate::condition::Condition;
use crate::value::{Circle, FilterValue};

/// Left-hand side of a `with` map entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WithKey {
    /// Plain attribute: renders `field:value`.
    Attribute(String),
    /// Attribute plus operator.
    Condition(Condition),
}

impl WithKey {
    /// Attribute this key constrains.
    pub fn attribute(&self) -> &str {
        match self {
            WithKey::Attribute(a) => a,
            WithKey::Condition(c) => &c.attribute,
        }
    }
}

impl From<&str> for WithKey {
    fn from(s: &str) -> Self {
        WithKey::Attribute(s.to_string())
    }
}

impl From<String> for WithKey {
    fn from(s: String) -> Self {
        WithKey::Attribute(s)
    }
}

impl From<Condition> for WithKey {
    fn from(c: Condition) -> Self {
        WithKey::Condition(c)
    }
}

/// A single `with` entry: a raw filter query passed through verbatim, or a
/// map of keys to values rendered clause by clause.
///
/// ```
/// use solr_scope::{Condition, Predicate};
///
/// let p = Predicate::map()
///     .set("title", "Blade Runner")
///     .set(Condition::gte("year"), 1982);
/// assert!(!p.is_blank());
/// assert!(Predicate::from("  ").is_blank());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Raw(String),
    Map(IndexMap<WithKey, FilterValue>),
}

impl Predicate {
    /// Starts an empty map predicate.
    pub fn map() -> Self {
        Predicate::Map(IndexMap::new())
    }

    /// Adds an entry; turns a raw predicate into a map.
    pub fn set(self, key: impl Into<WithKey>, value: impl Into<FilterValue>) -> Self {
        let mut map = match self {
            Predicate::Map(map) => map,
            Predicate::Raw(_) => IndexMap::new(),
        };
        map.insert(key.into(), value.into());
        Predicate::Map(map)
    }

    /// Empty strings and empty maps carry no constraint.
    pub fn is_blank(&self) -> bool {
        match self {
            Predicate::Raw(s) => s.trim().is_empty(),
            Predicate::Map(map) => map.is_empty(),
        }
    }

    /// First entry whose value is a circle, with its attribute.
    pub fn geo_circle(&self) -> Option<(&str, &Circle)> {
        match self {
            Predicate::Raw(_) => None,
            Predicate::Map(map) => map.iter().find_map(|(key, value)| match value {
                FilterValue::Circle(circle) => Some((key.attribute(), circle)),
                _ => None,
            }),
        }
    }
}

impl From<&str> for Predicate {
    fn from(s: &str) -> Self {
        Predicate::Raw(s.to_string())
    }
}

impl From<String> for Predicate {
    fn from(s: String) -> Self {
        Predicate::Raw(s)
    }
}

impl<K: Into<WithKey>, V: Into<FilterValue>> FromIterator<(K, V)> for Predicate {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Predicate::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Distance;

    #[test]
    fn blank_predicates() {
        assert!(Predicate::from("").is_blank());
        assert!(Predicate::map().is_blank());
        assert!(!Predicate::from("title:x").is_blank());
        assert!(!Predicate::map().set("a", FilterValue::Null).is_blank());
    }

    #[test]
    fn plain_and_condition_keys_coexist() {
        let p = Predicate::map()
            .set("year", 2000)
            .set(Condition::gt("year"), 1990)
            .set(Condition::lt("year"), 2010);
        match p {
            Predicate::Map(map) => assert_eq!(map.len(), 3),
            Predicate::Raw(_) => panic!("expected a map"),
        }
    }

    #[test]
    fn finds_circle_under_condition() {
        let circle = Circle::new((47.0, 11.0), Distance::kms(1.0));
        let p = Predicate::map()
            .set("a", 1)
            .set(Condition::inside("place"), circle);
        let (attr, found) = p.geo_circle().unwrap();
        assert_eq!(attr, "place");
        assert_eq!(found.radius_in_meters, 1000.0);
    }

    #[test]
    fn finds_circle_under_plain_attribute() {
        let circle = Circle::new((47.0, 11.0), Distance::meters(500.0));
        let p = Predicate::map().set("location", circle);
        let (attr, found) = p.geo_circle().unwrap();
        assert_eq!(attr, "location");
        assert_eq!(found.radius_in_meters, 500.0);
    }
}
