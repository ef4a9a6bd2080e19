//! Reserved operator tags.

use std::fmt;

/// Operator tag appearing as a key in a query expression.
///
/// Field-scoped operators (`$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`,
/// `$nin`) apply to the value of the enclosing field path. The boolean
/// compositions (`$or`, `$and`) take a list of independent root queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Or,
    And,
}

impl Operator {
    pub const ALL: [Operator; 9] = [
        Operator::Ne,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::In,
        Operator::Nin,
        Operator::Or,
        Operator::And,
    ];

    /// Looks up an operator by its tag. Unknown `$` keys return `None` and
    /// are treated as field paths by the validator.
    pub fn from_tag(tag: &str) -> Option<Operator> {
        match tag {
            "$ne" => Some(Operator::Ne),
            "$gt" => Some(Operator::Gt),
            "$gte" => Some(Operator::Gte),
            "$lt" => Some(Operator::Lt),
            "$lte" => Some(Operator::Lte),
            "$in" => Some(Operator::In),
            "$nin" => Some(Operator::Nin),
            "$or" => Some(Operator::Or),
            "$and" => Some(Operator::And),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Operator::Ne => "$ne",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::In => "$in",
            Operator::Nin => "$nin",
            Operator::Or => "$or",
            Operator::And => "$and",
        }
    }

    /// Returns `true` for operators that need an enclosing field path.
    pub fn requires_parent(self) -> bool {
        self.field_scoped().is_some()
    }

    /// Narrows to the field-scoped operators. `$or` and `$and` give `None`.
    pub fn field_scoped(self) -> Option<FieldOperator> {
        match self {
            Operator::Ne => Some(FieldOperator::Ne),
            Operator::Gt => Some(FieldOperator::Gt),
            Operator::Gte => Some(FieldOperator::Gte),
            Operator::Lt => Some(FieldOperator::Lt),
            Operator::Lte => Some(FieldOperator::Lte),
            Operator::In => Some(FieldOperator::In),
            Operator::Nin => Some(FieldOperator::Nin),
            Operator::Or | Operator::And => None,
        }
    }

    /// Returns `true` for the numeric range comparisons.
    pub fn is_range(self) -> bool {
        matches!(
            self,
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte
        )
    }
}

/// Operator applied to the value of the enclosing field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldOperator {
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
}

impl From<FieldOperator> for Operator {
    fn from(op: FieldOperator) -> Self {
        match op {
            FieldOperator::Ne => Operator::Ne,
            FieldOperator::Gt => Operator::Gt,
            FieldOperator::Gte => Operator::Gte,
            FieldOperator::Lt => Operator::Lt,
            FieldOperator::Lte => Operator::Lte,
            FieldOperator::In => Operator::In,
            FieldOperator::Nin => Operator::Nin,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_tag(op.tag()), Some(op));
        }
        assert_eq!(Operator::from_tag("$eq"), None);
        assert_eq!(Operator::from_tag("ne"), None);
    }

    #[test]
    fn placement_and_range_classes() {
        assert!(Operator::Ne.requires_parent());
        assert!(Operator::Nin.requires_parent());
        assert!(!Operator::Or.requires_parent());
        assert!(!Operator::And.requires_parent());

        assert!(Operator::Gte.is_range());
        assert!(!Operator::In.is_range());
        assert!(!Operator::Ne.is_range());
    }

    #[test]
    fn field_scoped_operators_convert_back() {
        for op in Operator::ALL {
            match op.field_scoped() {
                Some(field_op) => assert_eq!(Operator::from(field_op), op),
                None => assert!(matches!(op, Operator::Or | Operator::And)),
            }
        }
    }

    #[test]
    fn display_uses_tag() {
        assert_eq!(Operator::Lte.to_string(), "$lte");
    }
}
