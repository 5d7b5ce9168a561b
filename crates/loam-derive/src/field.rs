use crate::util::{Outer, element, outer};
use darling::{Error as DarlingError, FromField};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Ident, Path, Type};

///
/// FieldInput
///
/// One struct field and its `#[field(...)]` options.
///

#[derive(Debug, FromField)]
#[darling(attributes(field))]
pub struct FieldInput {
    pub ident: Option<Ident>,
    pub ty: Type,

    #[darling(default)]
    pub id: bool,

    /// Storage name override.
    #[darling(default)]
    pub name: Option<String>,

    /// Flatten an embeddable into the owner.
    #[darling(default)]
    pub embedded: bool,

    /// Nested sub-entity (single or collection element).
    #[darling(default)]
    pub entity: bool,

    /// Embeddable value (single or collection element).
    #[darling(default)]
    pub embeddable: bool,

    #[darling(default)]
    pub map: bool,

    #[darling(default)]
    pub converter: Option<Path>,

    #[darling(default)]
    pub skip: bool,
}

impl FieldInput {
    pub fn validate(&self) -> Result<(), DarlingError> {
        let span = |err: DarlingError| match &self.ident {
            Some(ident) => err.with_span(ident),
            None => err,
        };

        let nested = [self.embedded, self.entity, self.embeddable]
            .iter()
            .filter(|flag| **flag)
            .count();
        if nested > 1 {
            return Err(span(DarlingError::custom(
                "`embedded`, `entity` and `embeddable` are mutually exclusive",
            )));
        }

        if self.skip && (self.id || nested > 0 || self.map || self.converter.is_some()) {
            return Err(span(DarlingError::custom(
                "a skipped field takes no other options",
            )));
        }

        if self.embedded && outer(&self.ty) != Outer::Single {
            return Err(span(DarlingError::custom(
                "only a single embeddable can be flattened; use `embeddable` for collections",
            )));
        }

        if self.map && nested > 0 {
            return Err(span(DarlingError::custom(
                "map values are stored as-is and cannot be mapped types",
            )));
        }

        if self.id && (nested > 0 || self.map) {
            return Err(span(DarlingError::custom("an id field must be a plain value")));
        }

        Ok(())
    }

    /// `FieldDescriptor` builder expression for this field.
    pub fn descriptor(&self, owner: &Ident) -> Option<TokenStream> {
        if self.skip {
            return None;
        }
        let ident = self.ident.as_ref()?;
        let declared = ident.to_string();
        let ty = &self.ty;

        let mut expr = quote! {
            ::loam::model::FieldDescriptor::new(
                #declared,
                <#ty as ::loam::traits::FieldValue>::kind(),
                ::loam::accessor!(#owner, #ident),
            )
        };

        if self.id {
            expr = quote!(#expr.id());
        }
        if let Some(name) = &self.name {
            expr = quote!(#expr.storage_name(#name));
        }
        if let Some(shape) = self.shape() {
            expr = quote!(#expr #shape);
        }
        if let Some(converter) = &self.converter {
            expr = quote!(#expr.converter(::loam::model::converter::<#converter>()));
        }

        Some(expr)
    }

    // classification hints; the registry decides the final kind
    fn shape(&self) -> Option<TokenStream> {
        let nested = self.nested();

        if self.map {
            return Some(quote!(.map()));
        }

        match (outer(&self.ty), nested) {
            (Outer::Map, _) => Some(quote!(.map())),
            (Outer::Sequence, nested) => {
                let element = nested.map_or_else(|| quote!(None), |n| quote!(Some(#n)));
                Some(quote!(.sequence(#element)))
            }
            (Outer::Single, Some(n)) if self.embedded => Some(quote!(.embedded(#n))),
            (Outer::Single, Some(n)) => Some(quote!(.nested(#n))),
            (Outer::Single, None) => None,
        }
    }

    fn nested(&self) -> Option<TokenStream> {
        let element = element(&self.ty);

        if self.entity {
            Some(quote!(::loam::model::Nested::entity::<#element>()))
        } else if self.embedded || self.embeddable {
            Some(quote!(::loam::model::Nested::embeddable::<#element>()))
        } else {
            None
        }
    }
}

///
/// TESTS
///
