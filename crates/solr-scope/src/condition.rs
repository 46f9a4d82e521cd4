//! Typed predicates keyed by attribute and operator.
//!
//! A [`Condition`] is an (attribute, operator) pair. It carries no value:
//! the value lives next to it in a `with` map, which is what lets the same
//! attribute appear both as a plain key and under several operators.

use std::fmt;

use crate::op::Operator;
use crate::value::FilterValue;

/// Opaque spatial filter marker. Center and radius travel as separate parameters.
pub const GEOFILT: &str = "{!geofilt}";

/// A filter key made of an attribute and an operator.
///
/// Equality and hashing look at both fields and nothing else.
///
/// # Example
///
/// ```
/// use solr_scope::{Condition, FilterValue};
///
/// let c = Condition::not("field");
/// assert_eq!(c.render("field", &FilterValue::Null), "field:[* TO *]");
/// assert_eq!(c.render("field", &FilterValue::from(7)), "!field:7");
///
/// let c = Condition::in_set("field");
/// let v = FilterValue::from(vec![Some(1), Some(2), None]);
/// assert_eq!(c.render("field", &v), "field:1 OR field:2 OR !field:[* TO *]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Condition {
    /// Logical attribute name.
    pub attribute: String,
    pub operator: Operator,
}

impl Condition {
    /// Pairs an attribute with an operator.
    pub fn new(attribute: impl Into<String>, operator: Operator) -> Self {
        Condition {
            attribute: attribute.into(),
            operator,
        }
    }

    /// Attribute is set (`not` null) or differs from the value.
    pub fn not(attribute: impl Into<String>) -> Self {
        Condition::new(attribute, Operator::Not)
    }

    /// Attribute differs from the value.
    pub fn ne(attribute: impl Into<String>) -> Self {
        Condition::new(attribute, Operator::Ne)
    }

    /// Exclusive lower bound.
    pub fn gt(attribute: impl Into<String>) -> Self {
        Condition::new(attribute, Operator::Gt)
    }

    /// Inclusive lower bound.
    pub fn gte(attribute: impl Into<String>) -> Self {
        Condition::new(attribute, Operator::Gte)
    }

    /// Exclusive upper bound.
    pub fn lt(attribute: impl Into<String>) -> Self {
        Condition::new(attribute, Operator::Lt)
    }

    /// Inclusive upper bound.
    pub fn lte(attribute: impl Into<String>) -> Self {
        Condition::new(attribute, Operator::Lte)
    }

    /// Value is one of a list, or within a range or box.
    pub fn in_set(attribute: impl Into<String>) -> Self {
        Condition::new(attribute, Operator::In)
    }

    /// Value is none of a list, or outside a range.
    pub fn not_in_set(attribute: impl Into<String>) -> Self {
        Condition::new(attribute, Operator::Nin)
    }

    /// Strictly within a range, box or circle.
    pub fn inside(attribute: impl Into<String>) -> Self {
        Condition::new(attribute, Operator::Inside)
    }

    /// Renders the condition against its own attribute name.
    pub fn filter_for(&self, value: &FilterValue) -> String {
        self.render(&self.attribute, value)
    }

    /// Renders the condition for an already resolved wire field.
    pub fn render(&self, field: &str, value: &FilterValue) -> String {
        match self.operator.normalize() {
            Operator::Not | Operator::Ne => match value {
                FilterValue::Null => exists(field),
                v => format!("!{}:{}", field, v),
            },
            Operator::Gt => format!("{}:{{{} TO *}}", field, value),
            Operator::Gte => format!("{}:[{} TO *]", field, value),
            Operator::Lt => format!("{}:{{* TO {}}}", field, value),
            Operator::Lte => format!("{}:[* TO {}]", field, value),
            Operator::Nin => match value {
                FilterValue::Range(first, last) => format!(
                    "{f}:{{* TO {}}} OR {f}:{{{} TO *}}",
                    first,
                    last,
                    f = field
                ),
                v => format!("!({})", self.or_join(field, v)),
            },
            Operator::In | Operator::Inside => self.or_join(field, value),
        }
    }

    fn or_join(&self, field: &str, value: &FilterValue) -> String {
        let (open, close) = if self.operator.is_exclusive() {
            ('{', '}')
        } else {
            ('[', ']')
        };
        match value {
            FilterValue::Range(first, last) => {
                format!("{}:{}{} TO {}{}", field, open, first, last, close)
            }
            FilterValue::BoundingBox(b) => {
                format!("{}:{}{} TO {}{}", field, open, b.sw, b.ne, close)
            }
            FilterValue::Circle(_) => GEOFILT.to_string(),
            FilterValue::List(items) => items
                .iter()
                .map(|v| member(field, v))
                .collect::<Vec<_>>()
                .join(" OR "),
            scalar => member(field, scalar),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.attribute, self.operator)
    }
}

/// `field:[* TO *]`, i.e. the field has a value.
pub(crate) fn exists(field: &str) -> String {
    format!("{}:[* TO *]", field)
}

fn member(field: &str, value: &FilterValue) -> String {
    match value {
        FilterValue::Null => format!("!{}", exists(field)),
        v => format!("{}:{}", field, v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{BoundingBox, Circle, Distance};
    use std::collections::HashSet;

    #[test]
    fn not_null_is_exists() {
        assert_eq!(
            Condition::not("field").filter_for(&FilterValue::Null),
            "field:[* TO *]"
        );
        assert_eq!(
            Condition::ne("field").filter_for(&FilterValue::Null),
            "field:[* TO *]"
        );
    }

    #[test]
    fn not_scalar() {
        assert_eq!(Condition::not("field").filter_for(&7.into()), "!field:7");
        assert_eq!(Condition::ne("field").filter_for(&"x".into()), "!field:x");
    }

    #[test]
    fn comparisons() {
        let v = FilterValue::from(10);
        assert_eq!(Condition::gt("f").filter_for(&v), "f:{10 TO *}");
        assert_eq!(Condition::gte("f").filter_for(&v), "f:[10 TO *]");
        assert_eq!(Condition::lt("f").filter_for(&v), "f:{* TO 10}");
        assert_eq!(Condition::lte("f").filter_for(&v), "f:[* TO 10]");
    }

    #[test]
    fn in_list_with_null() {
        let v = FilterValue::from(vec![Some(1), Some(2), None]);
        assert_eq!(
            Condition::in_set("field").filter_for(&v),
            "field:1 OR field:2 OR !field:[* TO *]"
        );
    }

    #[test]
    fn in_scalar_is_single_member() {
        assert_eq!(Condition::in_set("f").filter_for(&3.into()), "f:3");
    }

    #[test]
    fn in_and_inside_ranges() {
        let r = FilterValue::from(1..=3);
        assert_eq!(Condition::in_set("f").filter_for(&r), "f:[1 TO 3]");
        assert_eq!(Condition::inside("f").filter_for(&r), "f:{1 TO 3}");
    }

    #[test]
    fn nin_range_is_union_of_complements() {
        let r = FilterValue::from(1..=3);
        assert_eq!(
            Condition::not_in_set("field").filter_for(&r),
            "field:{* TO 1} OR field:{3 TO *}"
        );
    }

    #[test]
    fn nin_list_keeps_inner_negation() {
        let v = FilterValue::from(vec![Some(1), Some(2), None]);
        assert_eq!(
            Condition::not_in_set("user_id").filter_for(&v),
            "!(user_id:1 OR user_id:2 OR !user_id:[* TO *])"
        );
    }

    #[test]
    fn bounding_box() {
        let b = BoundingBox::new((47.0, 11.0), (48.0, 12.0));
        assert_eq!(
            Condition::in_set("location").filter_for(&b.into()),
            "location:[47.0,11.0 TO 48.0,12.0]"
        );
        assert_eq!(
            Condition::inside("location").filter_for(&b.into()),
            "location:{47.0,11.0 TO 48.0,12.0}"
        );
    }

    #[test]
    fn circle_is_geofilt_marker() {
        let c = Circle::new((47.0, 11.0), Distance::kms(10.0));
        assert_eq!(Condition::inside("location").filter_for(&c.into()), GEOFILT);
    }

    #[test]
    fn identity_is_attribute_and_operator() {
        let mut set = HashSet::new();
        set.insert(Condition::gt("a"));
        set.insert(Condition::gt("a"));
        set.insert(Condition::lt("a"));
        set.insert(Condition::gt("b"));
        assert_eq!(set.len(), 3);
        assert_ne!(Condition::not("a"), Condition::ne("a"));
    }

    #[test]
    fn render_uses_given_field() {
        assert_eq!(
            Condition::gt("year").render("year_i", &2000.into()),
            "year_i:{2000 TO *}"
        );
    }
}
