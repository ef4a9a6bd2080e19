//! Built-in field validators.

use crate::errors::ValidatorError;
use crate::schema::{FieldValidator, LessFn, NumericKind};
use crate::value::{Number, Value};
use std::cmp::Ordering;

/// Strict numeric ordering shared by [`Integer`] and [`Float`].
pub fn number_less(a: &Value, b: &Value) -> bool {
    match (a.as_number(), b.as_number()) {
        (Some(a), Some(b)) => a.compare(b) == Some(Ordering::Less),
        _ => false,
    }
}

pub fn text_less(a: &Value, b: &Value) -> bool {
    match (a.as_str(), b.as_str()) {
        (Some(a), Some(b)) => a < b,
        _ => false,
    }
}

/// Accepts integral numbers, including floats with no fractional part.
#[derive(Debug, Clone, Copy, Default)]
pub struct Integer;

impl FieldValidator for Integer {
    fn validate(&self, value: &Value) -> Result<Value, ValidatorError> {
        value
            .as_number()
            .and_then(Number::as_i64)
            .map(Value::from)
            .ok_or(ValidatorError::NotAnInteger)
    }

    fn numeric_kind(&self) -> Option<NumericKind> {
        Some(NumericKind::Integer)
    }

    fn less(&self) -> Option<LessFn> {
        Some(number_less)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Float;

impl FieldValidator for Float {
    fn validate(&self, value: &Value) -> Result<Value, ValidatorError> {
        value
            .as_number()
            .map(|n| Value::Number(Number::F64(n.to_f64())))
            .ok_or(ValidatorError::NotAFloat)
    }

    fn numeric_kind(&self) -> Option<NumericKind> {
        Some(NumericKind::Float)
    }

    fn less(&self) -> Option<LessFn> {
        Some(number_less)
    }
}

/// Accepts strings, optionally restricted to a set of values and a length
/// range counted in characters.
#[derive(Debug, Clone, Default)]
pub struct Text {
    pub allowed: Vec<String>,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
}

impl FieldValidator for Text {
    fn validate(&self, value: &Value) -> Result<Value, ValidatorError> {
        let s = value.as_str().ok_or(ValidatorError::NotAString)?;
        if !self.allowed.is_empty() && !self.allowed.iter().any(|a| a == s) {
            return Err(ValidatorError::NotAllowed);
        }
        let len = s.chars().count();
        if let Some(min) = self.min_len {
            if len < min {
                return Err(ValidatorError::Length(format!("is shorter than {min}")));
            }
        }
        if let Some(max) = self.max_len {
            if len > max {
                return Err(ValidatorError::Length(format!("is longer than {max}")));
            }
        }
        Ok(value.clone())
    }

    fn less(&self) -> Option<LessFn> {
        Some(text_less)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Boolean;

impl FieldValidator for Boolean {
    fn validate(&self, value: &Value) -> Result<Value, ValidatorError> {
        match value {
            Value::Bool(_) => Ok(value.clone()),
            _ => Err(ValidatorError::NotABool),
        }
    }
}
