use crate::errors::{QueryError, Result};
use crate::operator::{FieldOperator, Operator};
use crate::query::{Combinator, Expression, Operation, Query};
use crate::schema::{FieldSchema, FieldValidator};
use crate::value::{Map, Value};

/// Validates one level of a raw expression. `parent` is the enclosing field
/// path, or `None` at the root and inside `$or` / `$and` sub-queries.
///
/// The first violation aborts the whole walk.
pub(crate) fn validate_query(
    raw: &Map,
    schema: &dyn FieldSchema,
    parent: Option<&str>,
) -> Result<Query> {
    let mut expressions = Vec::with_capacity(raw.len());
    for (key, exp) in raw {
        let expr = match Operator::from_tag(key) {
            Some(op) => match op.field_scoped() {
                Some(field_op) => {
                    let field = parent.ok_or(QueryError::MisplacedOperator(op))?;
                    Expression::Operation(validate_operation(field_op, field, exp, schema)?)
                }
                None => validate_composition(op, exp, schema)?,
            },
            None => validate_field(key, exp, schema, parent)?,
        };
        expressions.push(expr);
    }
    Ok(Query::from_expressions(expressions))
}

fn validate_operation(
    op: FieldOperator,
    field: &str,
    exp: &Value,
    schema: &dyn FieldSchema,
) -> Result<Operation> {
    let tag = Operator::from(op);
    let validator = schema.field(field).and_then(|d| d.validator.as_deref());
    match op {
        FieldOperator::Ne => Ok(Operation::Ne(normalize(field, validator, exp)?)),
        FieldOperator::Gt | FieldOperator::Gte | FieldOperator::Lt | FieldOperator::Lte => {
            let mut n = exp.as_number().ok_or_else(|| QueryError::NotANumber {
                field: field.to_string(),
                op: tag,
            })?;
            if let Some(v) = validator {
                if v.numeric_kind().is_none() {
                    return Err(QueryError::NonNumericField {
                        field: field.to_string(),
                        op: tag,
                    });
                }
                if let Some(normalized) = normalize(field, Some(v), exp)?.as_number() {
                    n = normalized;
                }
            }
            Ok(match op {
                FieldOperator::Gt => Operation::Gt(n),
                FieldOperator::Gte => Operation::Gte(n),
                FieldOperator::Lt => Operation::Lt(n),
                _ => Operation::Lte(n),
            })
        }
        FieldOperator::In | FieldOperator::Nin => {
            let set = match exp {
                Value::Object(_) => {
                    return Err(QueryError::DictOperand {
                        field: field.to_string(),
                        op: tag,
                    })
                }
                Value::Array(items) => items
                    .iter()
                    .map(|item| normalize(field, validator, item))
                    .collect::<Result<Vec<_>>>()?,
                scalar => vec![normalize(field, validator, scalar)?],
            };
            Ok(if op == FieldOperator::In {
                Operation::In(set)
            } else {
                Operation::Nin(set)
            })
        }
    }
}

fn validate_composition(op: Operator, exp: &Value, schema: &dyn FieldSchema) -> Result<Expression> {
    let Value::Array(items) = exp else {
        return Err(QueryError::NotAQueryList(op));
    };
    if items.len() < 2 {
        return Err(QueryError::TooFewQueries(op));
    }
    let queries = items
        .iter()
        .map(|item| match item {
            Value::Object(sub) => validate_query(sub, schema, None),
            _ => Err(QueryError::NotAQueryList(op)),
        })
        .collect::<Result<Vec<_>>>()?;
    let combinator = match op {
        Operator::Or => Combinator::Or,
        _ => Combinator::And,
    };
    Ok(Expression::Composition {
        combinator,
        queries,
    })
}

fn validate_field(
    key: &str,
    exp: &Value,
    schema: &dyn FieldSchema,
    parent: Option<&str>,
) -> Result<Expression> {
    let descriptor = schema
        .field(key)
        .ok_or_else(|| QueryError::UnknownField(key.to_string()))?;
    if !descriptor.filterable {
        return Err(QueryError::NotFilterable(key.to_string()));
    }
    // Plain fields only nest through dotted paths, never `{a: {b: ..}}`.
    if let Some(parent) = parent {
        return Err(QueryError::InvalidExpression(parent.to_string()));
    }
    match exp {
        Value::Object(sub) => Ok(Expression::Nested {
            field: key.to_string(),
            query: validate_query(sub, schema, Some(key))?,
        }),
        literal => Ok(Expression::Literal {
            field: key.to_string(),
            value: normalize(key, descriptor.validator.as_deref(), literal)?,
        }),
    }
}

fn normalize(field: &str, validator: Option<&dyn FieldValidator>, value: &Value) -> Result<Value> {
    match validator {
        Some(v) => v.validate(value).map_err(|source| QueryError::InvalidValue {
            field: field.to_string(),
            source,
        }),
        None => Ok(value.clone()),
    }
}
