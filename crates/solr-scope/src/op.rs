//! Comparison operators for conditions.
//!
//! The [`Operator`] enum defines every operator a [`Condition`](crate::Condition)
//! can carry. `Ne` is an alias for `Not`.

use std::str::FromStr;

use crate::error::{Result, ScopeError};

/// Operator of a condition.
///
/// Operators are grouped by the values they take:
/// - **Negation**: `Not`, `Ne` - scalar or null
/// - **Comparison**: `Gt`, `Gte`, `Lt`, `Lte` - scalar bound
/// - **Membership**: `In`, `Nin` - list or range
/// - **Spatial**: `Inside` - bounding box, circle or exclusive range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    /// Not equal, or "exists" when the value is null.
    Not,
    /// Alias for `Not`.
    Ne,

    /// Greater than (exclusive bound).
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than (exclusive bound).
    Lt,
    /// Less than or equal.
    Lte,

    /// Value is one of a list, within a range, or inside a shape.
    In,
    /// Value is none of a list, or outside a range.
    Nin,

    /// Like `In`, with exclusive bounds.
    Inside,
}

impl Operator {
    /// Every operator, in declaration order.
    pub const ALL: [Operator; 9] = [
        Operator::Not,
        Operator::Ne,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::In,
        Operator::Nin,
        Operator::Inside,
    ];

    /// Normalizes aliases to their canonical form.
    ///
    /// - `Ne` -> `Not`
    /// - Others unchanged
    pub fn normalize(self) -> Operator {
        match self {
            Operator::Ne => Operator::Not,
            other => other,
        }
    }

    /// Returns `true` for the one-sided range operators.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte
        )
    }

    /// Returns `true` for operators whose list values stay a single clause.
    pub fn is_membership(self) -> bool {
        matches!(self, Operator::In | Operator::Nin)
    }

    /// Returns `true` if ranges and boxes render with exclusive braces.
    pub fn is_exclusive(self) -> bool {
        matches!(self, Operator::Inside)
    }

    /// Returns the name of this operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Not => "not",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::In => "in",
            Operator::Nin => "nin",
            Operator::Inside => "inside",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| ScopeError::unknown_operation(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_groups() {
        assert!(Operator::Gt.is_comparison());
        assert!(Operator::Lte.is_comparison());
        assert!(!Operator::In.is_comparison());

        assert!(Operator::In.is_membership());
        assert!(Operator::Nin.is_membership());
        assert!(!Operator::Inside.is_membership());

        assert!(Operator::Inside.is_exclusive());
        assert!(!Operator::In.is_exclusive());
    }

    #[test]
    fn operator_normalization() {
        assert_eq!(Operator::Ne.normalize(), Operator::Not);
        assert_eq!(Operator::Not.normalize(), Operator::Not);
        assert_eq!(Operator::Gt.normalize(), Operator::Gt);
    }

    #[test]
    fn operator_parse_round_trips() {
        for op in Operator::ALL {
            assert_eq!(op.as_str().parse::<Operator>().unwrap(), op);
        }
        assert!(matches!(
            "between".parse::<Operator>(),
            Err(ScopeError::UnknownOperation(_))
        ));
    }

    #[test]
    fn operator_display() {
        assert_eq!(Operator::Nin.to_string(), "nin");
        assert_eq!(Operator::Inside.to_string(), "inside");
    }
}
