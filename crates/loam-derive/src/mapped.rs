use crate::field::FieldInput;
use darling::{Error as DarlingError, FromDeriveInput, ast::Data, util::Ignored};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Generics, Ident};

///
/// Target
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Target {
    Entity,
    Embeddable,
}

///
/// MappedInput
///
/// Struct-level options, shared by both derives.
///

#[derive(Debug, FromDeriveInput)]
#[darling(attributes(entity, embeddable), supports(struct_named))]
pub struct MappedInput {
    pub ident: Ident,
    pub generics: Generics,
    pub data: Data<Ignored, FieldInput>,

    /// Record name; defaults to the type name.
    #[darling(default)]
    pub name: Option<String>,
}

// derive
pub fn derive(input: TokenStream, target: Target) -> TokenStream {
    let input: DeriveInput = match syn::parse2(input) {
        Ok(input) => input,
        Err(err) => return err.to_compile_error(),
    };

    match MappedInput::from_derive_input(&input).and_then(|mapped| mapped.expand(target)) {
        Ok(tokens) => tokens,
        Err(err) => err.write_errors(),
    }
}

impl MappedInput {
    fn expand(&self, target: Target) -> Result<TokenStream, DarlingError> {
        if !self.generics.params.is_empty() {
            return Err(
                DarlingError::custom("mapped types cannot be generic").with_span(&self.ident)
            );
        }

        let Data::Struct(fields) = &self.data else {
            return Err(DarlingError::unsupported_shape("enum").with_span(&self.ident));
        };

        let mut errors = DarlingError::accumulator();
        for field in fields.iter() {
            errors.handle(field.validate());
        }
        errors.finish()?;

        let ident = &self.ident;
        let name = self.name.clone().unwrap_or_else(|| ident.to_string());
        let descriptors = fields.iter().filter_map(|f| f.descriptor(ident));
        let kind = match target {
            Target::Entity => quote!(::loam::traits::EntityKind),
            Target::Embeddable => quote!(::loam::traits::EmbeddableKind),
        };

        Ok(quote! {
            impl ::loam::traits::Mapped for #ident {
                const NAME: &'static str = #name;

                fn descriptor() -> ::loam::model::EntityDescriptor<Self> {
                    ::loam::model::EntityDescriptor::new(vec![
                        #(#descriptors),*
                    ])
                }
            }

            impl #kind for #ident {}

            ::loam::impl_mapped_field_value!(#ident);
        })
    }
}

///
/// TESTS
///
