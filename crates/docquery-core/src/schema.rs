//! Field schema authority.
//!
//! The validator asks a [`FieldSchema`] whether a field path exists, whether
//! it may be filtered on, and which [`FieldValidator`] (if any) normalizes its
//! values. [`StaticSchema`] is the in-memory implementation used by the CLI and
//! the tests; other resource layers plug in by implementing the trait.

use crate::errors::{ConfigError, ValidatorError};
use crate::timestamp::TimestampConfig;
use crate::validators::{Boolean, Float, Integer, Text};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Strict less-than over two values. Returns `false` when either side is not
/// a value the comparator understands.
pub type LessFn = fn(&Value, &Value) -> bool;

/// Numeric kinds gate the `$gt`, `$gte`, `$lt` and `$lte` operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    Integer,
    Float,
}

pub trait FieldValidator: Send + Sync + fmt::Debug {
    /// Normalizes `value` into the field's canonical form, or rejects it.
    fn validate(&self, value: &Value) -> Result<Value, ValidatorError>;

    fn numeric_kind(&self) -> Option<NumericKind> {
        None
    }

    fn less(&self) -> Option<LessFn> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub filterable: bool,
    pub validator: Option<Arc<dyn FieldValidator>>,
}

impl FieldDescriptor {
    pub fn filterable() -> Self {
        Self {
            filterable: true,
            validator: None,
        }
    }

    pub fn not_filterable() -> Self {
        Self {
            filterable: false,
            validator: None,
        }
    }

    pub fn with_validator(mut self, validator: impl FieldValidator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }
}

pub trait FieldSchema {
    fn field(&self, path: &str) -> Option<&FieldDescriptor>;
}

impl<S: FieldSchema + ?Sized> FieldSchema for &S {
    fn field(&self, path: &str) -> Option<&FieldDescriptor> {
        (**self).field(path)
    }
}

impl<S: FieldSchema + ?Sized> FieldSchema for Arc<S> {
    fn field(&self, path: &str) -> Option<&FieldDescriptor> {
        (**self).field(path)
    }
}

/// Schema held in memory, keyed by full dotted field path.
#[derive(Debug, Clone, Default)]
pub struct StaticSchema {
    fields: BTreeMap<String, FieldDescriptor>,
}

impl StaticSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, path: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.insert(path, descriptor);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, descriptor: FieldDescriptor) {
        self.fields.insert(path.into(), descriptor);
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let raw: serde_json::Value = serde_json::from_str(s)?;
        ensure_object(&raw, "schema document")?;
        check_fields(raw.get("fields"), "")?;
        let doc: SchemaDocument = serde_json::from_value(raw)?;
        Self::from_document(doc)
    }

    /// Builds a schema from a document, flattening nested `fields` into
    /// dotted paths and compiling every validator.
    pub fn from_document(doc: SchemaDocument) -> Result<Self, ConfigError> {
        let mut schema = Self::new();
        for (name, spec) in doc.fields {
            schema.load_field(name, spec)?;
        }
        Ok(schema)
    }

    fn load_field(&mut self, path: String, spec: FieldSpec) -> Result<(), ConfigError> {
        if path.is_empty() || path.starts_with('$') || path.contains('.') {
            return Err(ConfigError::Schema {
                field: path,
                reason: "field names must be non-empty, without `.` or a leading `$`".into(),
            });
        }
        let validator = match spec.validator {
            Some(v) => Some(v.build().map_err(|e| ConfigError::Schema {
                field: path.clone(),
                reason: e.to_string(),
            })?),
            None => None,
        };
        for (name, child) in spec.fields {
            let mut nested = Self::new();
            nested.load_field(name, child)?;
            for (child_path, descriptor) in nested.fields {
                self.fields
                    .insert(format!("{path}.{child_path}"), descriptor);
            }
        }
        self.fields.insert(
            path,
            FieldDescriptor {
                filterable: spec.filterable,
                validator,
            },
        );
        Ok(())
    }

    /// Ordering comparator of the field at `path`, when its validator has one.
    pub fn less_for(&self, path: &str) -> Option<LessFn> {
        self.fields
            .get(path)
            .and_then(|d| d.validator.as_ref())
            .and_then(|v| v.less())
    }

    /// Rewrites every field of `record` that has a validator into its
    /// normalized form. Values the validator rejects are left as they are.
    pub fn normalize_record(&self, record: &mut Value) {
        for (path, descriptor) in &self.fields {
            let Some(validator) = &descriptor.validator else {
                continue;
            };
            if let Some(slot) = record.lookup_mut(path) {
                if let Ok(normalized) = validator.validate(slot) {
                    *slot = normalized;
                }
            }
        }
    }
}

// Derived struct deserializers also accept JSON arrays; schema documents are
// objects all the way down.
fn ensure_object(value: &serde_json::Value, what: &str) -> Result<(), ConfigError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(ConfigError::Document(serde::de::Error::custom(format!(
            "{what} must be an object"
        ))))
    }
}

fn check_fields(fields: Option<&serde_json::Value>, prefix: &str) -> Result<(), ConfigError> {
    let Some(fields) = fields else {
        return Ok(());
    };
    ensure_object(fields, &format!("`fields` of `{prefix}`"))?;
    for (name, spec) in fields.as_object().into_iter().flatten() {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        ensure_object(spec, &format!("field `{path}`"))?;
        if let Some(validator) = spec.get("validator").filter(|v| !v.is_null()) {
            ensure_object(validator, &format!("validator of `{path}`"))?;
        }
        check_fields(spec.get("fields"), &path)?;
    }
    Ok(())
}

impl FieldSchema for StaticSchema {
    fn field(&self, path: &str) -> Option<&FieldDescriptor> {
        self.fields.get(path)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(default = "default_filterable")]
    pub filterable: bool,
    #[serde(default)]
    pub validator: Option<ValidatorSpec>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
}

fn default_filterable() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidatorSpec {
    Integer,
    Float,
    String {
        #[serde(default)]
        allowed: Vec<String>,
        #[serde(default)]
        min_len: Option<usize>,
        #[serde(default)]
        max_len: Option<usize>,
    },
    Bool,
    Time(TimestampConfig),
}

impl ValidatorSpec {
    pub fn build(self) -> Result<Arc<dyn FieldValidator>, ConfigError> {
        let validator: Arc<dyn FieldValidator> = match self {
            ValidatorSpec::Integer => Arc::new(Integer),
            ValidatorSpec::Float => Arc::new(Float),
            ValidatorSpec::String {
                allowed,
                min_len,
                max_len,
            } => {
                if let (Some(min), Some(max)) = (min_len, max_len) {
                    if min > max {
                        return Err(ConfigError::InvalidBounds { min, max });
                    }
                }
                Arc::new(Text {
                    allowed,
                    min_len,
                    max_len,
                })
            }
            ValidatorSpec::Bool => Arc::new(Boolean),
            ValidatorSpec::Time(config) => Arc::new(config.compile()?),
        };
        Ok(validator)
    }
}
