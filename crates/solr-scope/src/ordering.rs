//! Sort clause parsing.
//!
//! Orders are kept as the caller wrote them (`"title asc, year desc"`) and
//! parsed at compile time into [`OrderBy`] chunks so that field names can be
//! remapped to wire fields. Chunks that do not look like `field dir` pass
//! through untouched.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;
use crate::field_mapper::AttributeMapping;

static CHUNK_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*,\s*").expect("valid regex"));
static FIELD_AND_DIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(.*?) (asc|desc)").expect("valid regex"));

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dir {
    /// Ascending order (smallest first).
    #[default]
    Asc,
    /// Descending order (largest first).
    Desc,
}

impl Dir {
    /// Returns the wire name of this direction.
    pub fn as_str(self) -> &'static str {
        match self {
            Dir::Asc => "asc",
            Dir::Desc => "desc",
        }
    }

    fn parse(s: &str) -> Option<Dir> {
        if s.eq_ignore_ascii_case("asc") {
            Some(Dir::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Some(Dir::Desc)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Dir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single ordering clause specifying a field and direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// The field to sort by.
    pub field: String,
    /// The sort direction.
    pub dir: Dir,
}

impl OrderBy {
    /// Creates a new ordering with the given direction.
    pub fn new(field: impl Into<String>, dir: Dir) -> Self {
        OrderBy {
            field: field.into(),
            dir,
        }
    }

    /// Parses `"field asc"` / `"field DESC"`. Returns `None` for anything else.
    pub fn parse(chunk: &str) -> Option<OrderBy> {
        let caps = FIELD_AND_DIR.captures(chunk)?;
        let dir = Dir::parse(caps.get(2)?.as_str())?;
        Some(OrderBy::new(caps.get(1)?.as_str(), dir))
    }
}

impl std::fmt::Display for OrderBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.field, self.dir)
    }
}

impl From<OrderBy> for String {
    fn from(o: OrderBy) -> Self {
        o.to_string()
    }
}

/// Builds the `sort` parameter from accumulated order strings.
///
/// Returns `None` when no order was given.
pub fn sort_clause(orders: &[String], mapping: &AttributeMapping) -> Result<Option<String>> {
    if orders.is_empty() {
        return Ok(None);
    }
    let joined = orders.join(", ");
    let mut chunks = Vec::new();
    for chunk in CHUNK_SEPARATOR.split(&joined) {
        match OrderBy::parse(chunk) {
            Some(order) => {
                let field = mapping.wire_field(&order.field)?;
                chunks.push(OrderBy::new(field, order.dir).to_string());
            }
            None => chunks.push(chunk.to_string()),
        }
    }
    Ok(Some(chunks.join(",")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_mapper::FieldType;

    #[test]
    fn dir_display() {
        assert_eq!(Dir::Asc.to_string(), "asc");
        assert_eq!(Dir::Desc.to_string(), "desc");
        assert_eq!(Dir::default(), Dir::Asc);
    }

    #[test]
    fn order_by_displays_as_sort_chunk() {
        let order = OrderBy::new("priority", Dir::Desc);
        assert_eq!(order.field, "priority");
        assert_eq!(String::from(order), "priority desc");
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(
            OrderBy::parse("title DESC"),
            Some(OrderBy::new("title", Dir::Desc))
        );
        assert_eq!(
            OrderBy::parse("title asc"),
            Some(OrderBy::new("title", Dir::Asc))
        );
        assert_eq!(OrderBy::parse("score"), None);
    }

    #[test]
    fn sort_remaps_fields() {
        let mapping = AttributeMapping::new()
            .field("title", FieldType::String)
            .field("year", FieldType::Integer);
        let orders = vec!["title asc".to_string(), "year desc,  popularity desc".to_string()];
        assert_eq!(
            sort_clause(&orders, &mapping).unwrap().unwrap(),
            "title_s asc,year_i desc,popularity desc"
        );
    }

    #[test]
    fn unparsable_chunks_pass_through() {
        let orders = vec!["geodist()".to_string(), "id desc".to_string()];
        assert_eq!(
            sort_clause(&orders, &AttributeMapping::new()).unwrap().unwrap(),
            "geodist(),id desc"
        );
    }

    #[test]
    fn no_orders_no_clause() {
        assert_eq!(sort_clause(&[], &AttributeMapping::new()).unwrap(), None);
    }
}
