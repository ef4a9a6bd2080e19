//! Schema-constrained filter queries over JSON-like records.
//!
//! A query is a JSON object in a small MongoDB-style dialect (`$ne`, `$gt`,
//! `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$or`, `$and`). [`Query::parse`]
//! checks it against a [`FieldSchema`] and builds a typed tree, normalizing
//! every operand through the field's validator. [`Query::matches`] then
//! evaluates the tree against records.

pub mod errors;
mod matcher;
pub mod operator;
pub mod query;
pub mod schema;
pub mod timestamp;
mod validate;
pub mod validators;
pub mod value;

pub use errors::*;
pub use operator::*;
pub use query::*;
pub use schema::*;
pub use timestamp::*;
pub use validators::*;
pub use value::*;
