//! Validated query tree.
//!
//! A [`Query`] is produced once from untrusted input by [`Query::parse`] (or
//! one of its siblings), then reused read-only for any number of matches. The
//! tree is fully typed: whether a node is a literal, an operator application,
//! a nested sub-query or a boolean composition is settled during validation
//! and never re-inspected at match time.

use crate::errors::{QueryError, Result};
use crate::operator::Operator;
use crate::schema::FieldSchema;
use crate::validate::validate_query;
use crate::value::{Map, Number, Value};

/// Conjunction of expressions. An empty query matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    expressions: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// `{field: literal}`: the field must equal the literal.
    Literal { field: String, value: Value },
    /// Operator scoped to the enclosing field path.
    Operation(Operation),
    /// `{field: {...}}`: the sub-query's operators apply to `field`.
    Nested { field: String, query: Query },
    /// `$or` / `$and` over independent root queries.
    Composition {
        combinator: Combinator,
        queries: Vec<Query>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Ne(Value),
    Gt(Number),
    Gte(Number),
    Lt(Number),
    Lte(Number),
    In(Vec<Value>),
    Nin(Vec<Value>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Or,
    And,
}

impl Query {
    pub(crate) fn from_expressions(expressions: Vec<Expression>) -> Self {
        Self { expressions }
    }

    /// Parses and validates a query written as JSON text.
    pub fn parse(text: &str, schema: &dyn FieldSchema) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_str(text).map_err(|e| {
            tracing::debug!(error = %e, "rejected query text");
            QueryError::InvalidJson(e)
        })?;
        Self::from_json(raw, schema)
    }

    pub fn from_json(raw: serde_json::Value, schema: &dyn FieldSchema) -> Result<Self> {
        Self::from_value(Value::from(raw), schema)
    }

    /// Validates an already decoded expression. The top level must be an
    /// object.
    pub fn from_value(raw: Value, schema: &dyn FieldSchema) -> Result<Self> {
        let result = match &raw {
            Value::Object(map) => validate_query(map, schema, None),
            _ => Err(QueryError::NotAnObject),
        };
        match &result {
            Ok(query) => tracing::trace!(expressions = query.len(), "validated query"),
            Err(e) => tracing::debug!(error = %e, kind = ?e.kind(), "rejected query"),
        }
        result
    }

    pub fn expressions(&self) -> &[Expression] {
        &self.expressions
    }

    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// Renders the validated tree back into the wire form, with every
    /// operand in its normalized shape.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::from(&Value::Object(self.to_map()))
    }

    fn to_map(&self) -> Map {
        let mut map = Map::new();
        for expr in &self.expressions {
            let (key, value) = match expr {
                Expression::Literal { field, value } => (field.clone(), value.clone()),
                Expression::Operation(op) => (op.operator().tag().to_string(), op.operand()),
                Expression::Nested { field, query } => {
                    (field.clone(), Value::Object(query.to_map()))
                }
                Expression::Composition {
                    combinator,
                    queries,
                } => (
                    combinator.operator().tag().to_string(),
                    Value::Array(queries.iter().map(|q| Value::Object(q.to_map())).collect()),
                ),
            };
            map.insert(key, value);
        }
        map
    }
}

impl Operation {
    pub fn operator(&self) -> Operator {
        match self {
            Operation::Ne(_) => Operator::Ne,
            Operation::Gt(_) => Operator::Gt,
            Operation::Gte(_) => Operator::Gte,
            Operation::Lt(_) => Operator::Lt,
            Operation::Lte(_) => Operator::Lte,
            Operation::In(_) => Operator::In,
            Operation::Nin(_) => Operator::Nin,
        }
    }

    fn operand(&self) -> Value {
        match self {
            Operation::Ne(v) => v.clone(),
            Operation::Gt(n) | Operation::Gte(n) | Operation::Lt(n) | Operation::Lte(n) => {
                Value::Number(*n)
            }
            Operation::In(set) | Operation::Nin(set) => Value::Array(set.clone()),
        }
    }
}

impl Combinator {
    pub fn operator(self) -> Operator {
        match self {
            Combinator::Or => Operator::Or,
            Combinator::And => Operator::And,
        }
    }
}
