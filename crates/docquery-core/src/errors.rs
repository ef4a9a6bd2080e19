use crate::operator::Operator;
use thiserror::Error;

/// Broad classes of query rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Structural,
    OperatorPlacement,
    TypeMismatch,
    UnknownField,
    NotFilterable,
    Cardinality,
    TimestampParse,
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("must be a JSON object")]
    NotAnObject,
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("{field}: value for {op} can't be a dict")]
    DictOperand { field: String, op: Operator },
    #[error("value for {0} must be an array of dicts")]
    NotAQueryList(Operator),
    #[error("{0} can't be at first level")]
    MisplacedOperator(Operator),
    #[error("{0}: invalid expression")]
    InvalidExpression(String),
    #[error("{field}: value for {op} must be a number")]
    NotANumber { field: String, op: Operator },
    #[error("{field}: cannot apply {op} operation on a non numerical field")]
    NonNumericField { field: String, op: Operator },
    #[error("invalid query expression for field `{field}': {source}")]
    InvalidValue {
        field: String,
        #[source]
        source: ValidatorError,
    },
    #[error("unknown query field: {0}")]
    UnknownField(String),
    #[error("field is not filterable: {0}")]
    NotFilterable(String),
    #[error("{0} must contain at least two elements")]
    TooFewQueries(Operator),
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::NotAnObject
            | QueryError::InvalidJson(_)
            | QueryError::DictOperand { .. }
            | QueryError::NotAQueryList(_) => ErrorKind::Structural,
            QueryError::MisplacedOperator(_) | QueryError::InvalidExpression(_) => {
                ErrorKind::OperatorPlacement
            }
            QueryError::NotANumber { .. } | QueryError::NonNumericField { .. } => {
                ErrorKind::TypeMismatch
            }
            QueryError::InvalidValue { source, .. } => match source {
                ValidatorError::NotATime => ErrorKind::TimestampParse,
                _ => ErrorKind::TypeMismatch,
            },
            QueryError::UnknownField(_) => ErrorKind::UnknownField,
            QueryError::NotFilterable(_) => ErrorKind::NotFilterable,
            QueryError::TooFewQueries(_) => ErrorKind::Cardinality,
        }
    }
}

/// Failure of a field validator to accept a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidatorError {
    #[error("not a time")]
    NotATime,
    #[error("not an integer")]
    NotAnInteger,
    #[error("not a float")]
    NotAFloat,
    #[error("not a string")]
    NotAString,
    #[error("not a boolean")]
    NotABool,
    #[error("not one of the allowed values")]
    NotAllowed,
    #[error("length out of bounds: {0}")]
    Length(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("timestamp layout list is empty")]
    EmptyLayouts,
    #[error("invalid timestamp layout: {0}")]
    InvalidLayout(String),
    #[error("invalid truncation: {0}")]
    InvalidTruncate(String),
    #[error("min_len {min} exceeds max_len {max}")]
    InvalidBounds { min: usize, max: usize },
    #[error("invalid schema for field `{field}': {reason}")]
    Schema { field: String, reason: String },
    #[error("invalid schema document: {0}")]
    Document(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QueryError>;
