//! Backend boundary.
//!
//! `Template` / `AsyncTemplate` are the record-level contracts a backend
//! implements. `EntityTemplate` layers entity conversion and the persist
//! workflow on top of either.

mod entity;

#[cfg(test)]
mod tests;

use crate::{
    db::{
        query::{DeleteQuery, ParamBindings, StructuredQuery},
        record::Record,
    },
    error::ErrorClass,
    value::Value,
};
use std::time::Duration;
use thiserror::Error as ThisError;

// re-exports
pub use entity::{EntityStatement, EntityTemplate};

///
/// TemplateError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum TemplateError {
    #[error("backend failure: {0}")]
    Backend(String),

    #[error("invalid query at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("query parameter '@{0}' is not bound")]
    UnboundParameter(String),

    #[error("record '{entity}' has no key field '{field}'")]
    MissingKey { entity: String, field: String },

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl TemplateError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    pub(crate) fn parse(offset: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            offset,
            message: message.into(),
        }
    }

    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::Backend(_) => ErrorClass::Internal,
            Self::Parse { .. } | Self::Unsupported(_) => ErrorClass::Unsupported,
            Self::UnboundParameter(_) | Self::MissingKey { .. } => ErrorClass::InvariantViolation,
        }
    }
}

///
/// Template
///
/// Record-level backend contract. Writes return the record as stored.
///

pub trait Template: Send + Sync {
    fn insert(&self, record: Record) -> Result<Record, TemplateError>;

    fn insert_with_ttl(&self, record: Record, ttl: Duration) -> Result<Record, TemplateError>;

    fn update(&self, record: Record) -> Result<Record, TemplateError>;

    /// Returns the number of records removed.
    fn delete(&self, query: &DeleteQuery) -> Result<u64, TemplateError>;

    fn select(&self, query: &StructuredQuery) -> Result<Vec<Record>, TemplateError>;

    /// Run a query in the backend's own language. Deletes return the
    /// removed records.
    fn execute_literal(&self, query: &str) -> Result<Vec<Record>, TemplateError>;

    fn prepare(&self, query: &str) -> Result<Box<dyn PreparedStatement + '_>, TemplateError>;

    fn count(&self, entity: &str) -> Result<u64, TemplateError>;
}

///
/// PreparedStatement
///
/// Literal query with `@name` parameters, bound before execution.
///

pub trait PreparedStatement {
    fn bind(&mut self, name: &str, value: Value);

    fn execute(&mut self) -> Result<Vec<Record>, TemplateError>;
}

/// Completion callback for asynchronous template calls.
pub type Callback<T> = Box<dyn FnOnce(Result<T, TemplateError>) + Send>;

///
/// AsyncTemplate
///
/// Callback form of [`Template`]. Implementations may complete on any
/// thread, including the calling one.
///

pub trait AsyncTemplate: Send + Sync {
    fn insert_async(&self, record: Record, callback: Callback<Record>);

    fn insert_with_ttl_async(&self, record: Record, ttl: Duration, callback: Callback<Record>);

    fn update_async(&self, record: Record, callback: Callback<Record>);

    fn delete_async(&self, query: DeleteQuery, callback: Callback<u64>);

    fn select_async(&self, query: StructuredQuery, callback: Callback<Vec<Record>>);

    fn execute_literal_async(&self, query: String, callback: Callback<Vec<Record>>);

    /// Prepare, bind, and execute in one step.
    fn execute_prepared_async(
        &self,
        query: String,
        params: ParamBindings,
        callback: Callback<Vec<Record>>,
    );

    fn count_async(&self, entity: String, callback: Callback<u64>);
}
