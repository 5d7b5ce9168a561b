//! ## Crate layout
//! - `core`: runtime schemas, values, query derivation, binding, dispatch.
//! - `macros`: `#[derive(Entity)]` / `#[derive(Embeddable)]`.
//!
//! The top-level module re-exports (`db`, `model`, `traits`, `value`, ...)
//! are the paths generated code resolves against.

pub use loam_core as core;
pub use loam_derive as macros;

pub use loam_core::{
    DEFAULT_DELETE_PREFIX, DEFAULT_FIND_PREFIX, DEFAULT_ID_STORAGE_NAME, accessor, db, error,
    impl_field_value, impl_mapped_field_value, model, obs, traits, value,
};
pub use loam_derive::{Embeddable, Entity};

/// Crate-wide error.
pub use loam_core::error::InternalError as Error;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
/// using _ brings traits into scope and avoids name conflicts
///

pub mod prelude {
    pub use crate::core::{
        db::{
            convert::EntityConverter,
            memory::MemoryTemplate,
            query::{
                ConditionNode, DeleteQuery, Direction, Pagination, Sort, StructuredQuery, builder,
            },
            record::Record,
            repository::{
                AsyncDispatcher, AsyncRepository as _, Dispatcher, MethodCall, Repository as _,
                ReturnShape, Returned,
            },
            template::{AsyncTemplate as _, EntityTemplate, Template as _},
        },
        traits::{EmbeddableKind as _, EntityKind as _, FieldValue as _, Mapped as _},
        value::{Value, ValueKind},
    };
    pub use crate::{Embeddable, Entity, Error};
}
