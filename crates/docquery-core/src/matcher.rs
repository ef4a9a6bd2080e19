//! Record matching.
//!
//! Matching never fails. A condition that cannot be evaluated (a missing
//! field, a string where a number is expected, a NaN) simply does not match.

use crate::query::{Combinator, Expression, Operation, Query};
use crate::value::{Number, Value};
use std::cmp::Ordering;

static ABSENT: Value = Value::Null;

impl Query {
    /// Returns `true` when every expression of the query holds for `record`.
    ///
    /// Operands were normalized by the field validators during validation,
    /// so a timestamp operand is an instant. Pass records through
    /// [`StaticSchema::normalize_record`](crate::schema::StaticSchema::normalize_record)
    /// first: a raw timestamp string never equals an instant.
    pub fn matches(&self, record: &Value) -> bool {
        self.matches_scoped(record, None)
    }

    /// Records of `records` the query matches, in input order.
    pub fn filter<'a>(&self, records: &'a [Value]) -> Vec<&'a Value> {
        records.iter().filter(|r| self.matches(r)).collect()
    }

    // `scope` is the value of the enclosing field for operator expressions.
    fn matches_scoped(&self, record: &Value, scope: Option<&Value>) -> bool {
        self.expressions()
            .iter()
            .all(|expr| expr.matches(record, scope))
    }
}

impl Expression {
    fn matches(&self, record: &Value, scope: Option<&Value>) -> bool {
        match self {
            Expression::Literal { field, value } => {
                record.lookup(field).unwrap_or(&ABSENT) == value
            }
            Expression::Operation(op) => op.matches(scope.unwrap_or(&ABSENT)),
            Expression::Nested { field, query } => {
                query.matches_scoped(record, Some(record.lookup(field).unwrap_or(&ABSENT)))
            }
            Expression::Composition {
                combinator: Combinator::Or,
                queries,
            } => queries.iter().any(|q| q.matches(record)),
            Expression::Composition {
                combinator: Combinator::And,
                queries,
            } => queries.iter().all(|q| q.matches(record)),
        }
    }
}

impl Operation {
    /// Evaluates the operator against the current value of its field.
    pub fn matches(&self, current: &Value) -> bool {
        match self {
            Operation::Ne(v) => current != v,
            Operation::Gt(n) => compare(current, *n) == Some(Ordering::Greater),
            Operation::Gte(n) => matches!(
                compare(current, *n),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operation::Lt(n) => compare(current, *n) == Some(Ordering::Less),
            Operation::Lte(n) => {
                matches!(compare(current, *n), Some(Ordering::Less | Ordering::Equal))
            }
            Operation::In(set) => set.iter().any(|v| v == current),
            Operation::Nin(set) => !set.iter().any(|v| v == current),
        }
    }
}

fn compare(current: &Value, operand: Number) -> Option<Ordering> {
    current.as_number()?.compare(operand)
}
