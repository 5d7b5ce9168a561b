//! Repository dispatch.
//!
//! A [`MethodCall`] names a repository method, carries its arguments and
//! declares the shape the caller wants back. The dispatcher classifies the
//! call, runs the matching strategy against an [`EntityTemplate`], and
//! reshapes the result.
//!
//! [`EntityTemplate`]: crate::db::template::EntityTemplate

mod asynchronous;
mod call;
mod dispatch;
pub(crate) mod shape;


use crate::{
    DEFAULT_DELETE_PREFIX, DEFAULT_FIND_PREFIX,
    error::{ErrorClass, InternalError},
    traits::EntityKind,
    value::Value,
};
use serde::Deserialize;
use std::fmt;
use thiserror::Error as ThisError;

// re-exports
pub use asynchronous::{AsyncDispatcher, AsyncRepository, Reply};
pub use call::{Arg, MethodCall};
pub use dispatch::{Dispatcher, classify};
pub use shape::{ReturnShape, Returned};

///
/// DispatchKind
///
/// Execution strategy chosen for one call.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DispatchKind {
    /// Built-in repository contract (`save`, `find_by_id`, ...).
    Default,
    FindDerived,
    DeleteDerived,
    /// A pre-built select travels as an argument.
    ExplicitQuery,
    /// A pre-built delete travels as an argument.
    ExplicitDelete,
    FindAll,
    /// The call carries literal query text.
    LiteralQuery,
    /// Object identity contract (`eq`, `hash`, `to_string`, ...).
    ObjectMethod,
    Unknown,
}

impl fmt::Display for DispatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Default => "default",
            Self::FindDerived => "find_derived",
            Self::DeleteDerived => "delete_derived",
            Self::ExplicitQuery => "explicit_query",
            Self::ExplicitDelete => "explicit_delete",
            Self::FindAll => "find_all",
            Self::LiteralQuery => "literal_query",
            Self::ObjectMethod => "object_method",
            Self::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

///
/// DispatchError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum DispatchError {
    #[error("unsupported repository method '{method}'")]
    UnsupportedMethod { method: String },

    #[error("expected at most one result for '{context}', found {count}")]
    NonUniqueResult { context: String, count: usize },

    #[error("method '{method}' cannot return {shape}")]
    ShapeMismatch { method: String, shape: ReturnShape },

    #[error("invalid arguments for '{method}': {reason}")]
    InvalidArguments { method: String, reason: String },
}

impl DispatchError {
    pub(crate) fn invalid(method: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::UnsupportedMethod { .. } | Self::ShapeMismatch { .. } => {
                ErrorClass::Unsupported
            }
            Self::NonUniqueResult { .. } | Self::InvalidArguments { .. } => {
                ErrorClass::InvariantViolation
            }
        }
    }
}

///
/// RepositoryConfig
///
/// Method-name prefixes recognised by classification.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct RepositoryConfig {
    pub find_prefix: String,
    pub delete_prefix: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            find_prefix: DEFAULT_FIND_PREFIX.to_string(),
            delete_prefix: DEFAULT_DELETE_PREFIX.to_string(),
        }
    }
}

///
/// Repository
///
/// Typed repository contract. `invoke` accepts any method name the
/// dispatcher can classify, including derived finders and deletes.
///

pub trait Repository<E: EntityKind> {
    /// Insert, or update when an entity with the same id exists.
    fn save(&self, entity: E) -> Result<E, InternalError>;

    fn save_all(&self, entities: Vec<E>) -> Result<Vec<E>, InternalError>;

    fn update(&self, entity: E) -> Result<E, InternalError>;

    fn delete_by_id(&self, id: Value) -> Result<(), InternalError>;

    fn find_by_id(&self, id: Value) -> Result<Option<E>, InternalError>;

    fn exists_by_id(&self, id: Value) -> Result<bool, InternalError>;

    fn count(&self) -> Result<u64, InternalError>;

    fn find_all(&self) -> Result<Vec<E>, InternalError>;

    fn invoke(&self, call: MethodCall<E>) -> Result<Returned<E>, InternalError>;
}
