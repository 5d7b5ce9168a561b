//! Derive macros for Loam mapped types.
//!
//! Generated code refers to the runtime through `::loam`, so these macros
//! are meant to be used via the `loam` facade crate.

use proc_macro::TokenStream;

mod field;
mod mapped;
mod util;

/// Implement `Mapped` + `EntityKind` (and the nested `FieldValue` bridge).
///
/// ```ignore
/// #[derive(Clone, Debug, Default, Entity)]
/// #[entity(name = "people")]
/// struct Person {
///     #[field(id)]
///     id: Option<u64>,
///     #[field(embedded)]
///     address: Address,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(entity, field))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    mapped::derive(input.into(), mapped::Target::Entity).into()
}

/// Implement `Mapped` + `EmbeddableKind` for a value type flattened into
/// (or listed inside) its owner.
#[proc_macro_derive(Embeddable, attributes(embeddable, field))]
pub fn derive_embeddable(input: TokenStream) -> TokenStream {
    mapped::derive(input.into(), mapped::Target::Embeddable).into()
}
