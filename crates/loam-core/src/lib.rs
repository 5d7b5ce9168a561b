//! Core runtime for Loam: entity schemas, values, derived-query grammar,
//! parameter binding, repository dispatch, and the template boundary.
#![warn(unreachable_pub)]

extern crate self as loam;

// public exports are one module level down
pub mod db;
pub mod error;
pub mod model;
pub mod obs;
pub mod traits;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

///
/// CONSTANTS
///

/// Storage name given to an id field that does not override it.
pub const DEFAULT_ID_STORAGE_NAME: &str = "_id";

/// Method-name prefix that introduces a derived finder.
pub const DEFAULT_FIND_PREFIX: &str = "findBy";

/// Method-name prefix that introduces a derived delete.
pub const DEFAULT_DELETE_PREFIX: &str = "deleteBy";

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, templates, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        db::{
            query::{ConditionNode, DeleteQuery, Direction, Pagination, Sort, StructuredQuery},
            record::Record,
            repository::{MethodCall, Repository, ReturnShape, Returned},
        },
        model::{EntitySchema, FieldKind, FieldSchema},
        traits::{EmbeddableKind, EntityKind, FieldValue, Mapped},
        value::{Value, ValueKind},
    };
}
