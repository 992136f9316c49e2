//! Procedural macros for the fanout dispatch crate.
//!
//! - `#[derive(Event)]`: Implements `fanout::Event` for your type, preserving generics and bounds.
//!   For enums, also generates `name()` returning the variant name.
//! - `#[event(extends = Parent)]`: Declares `Parent` as the nearest ancestor kind, so
//!   subscribers registered on `Parent` also receive this type.
//!
//! Usage:
//! ```rust,ignore
//! use fanout::Event;
//!
//! #[derive(Debug, Event)]
//! struct IoFailure;
//!
//! #[derive(Debug, Event)]
//! #[event(extends = IoFailure)]
//! struct DiskFull { free: u64 }
//! ```
use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Path, parse_macro_input};

#[proc_macro_derive(Event, attributes(event))]
pub fn derive_event(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let ident = input.ident.clone();
    let generics = input.generics.clone();

    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let parent = match parse_parent(&input) {
        Ok(parent) => parent,
        Err(err) => return err.to_compile_error().into(),
    };

    let parent_impl = parent.map(|parent| {
        quote! {
            fn parent_kind() -> ::std::option::Option<fanout::Kind> {
                ::std::option::Option::Some(fanout::Kind::of::<#parent>())
            }
        }
    });

    // For enums, generate name() that returns variant names
    let name_impl = match &input.data {
        Data::Enum(data_enum) => {
            let match_arms = data_enum.variants.iter().map(|variant| {
                let variant_ident = &variant.ident;
                let variant_name = variant_ident.to_string();

                let pattern = match &variant.fields {
                    Fields::Unit => quote! { Self::#variant_ident },
                    Fields::Unnamed(_) => quote! { Self::#variant_ident(..) },
                    Fields::Named(_) => quote! { Self::#variant_ident { .. } },
                };

                quote! {
                    #pattern => ::std::borrow::Cow::Borrowed(#variant_name)
                }
            });

            quote! {
                fn name(&self) -> ::std::borrow::Cow<'static, str> {
                    match self {
                        #(#match_arms),*
                    }
                }
            }
        }
        _ => quote! {},
    };

    let expanded = quote! {
        impl #impl_generics fanout::Event for #ident #ty_generics #where_clause {
            #parent_impl
            #name_impl
        }
    };
    TokenStream::from(expanded)
}

/// Reads `#[event(extends = Path)]`. Only one `extends` is allowed.
fn parse_parent(input: &DeriveInput) -> syn::Result<Option<Path>> {
    let mut parent: Option<Path> = None;
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("event")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("extends") {
                if parent.is_some() {
                    return Err(meta.error("`extends` may only be given once"));
                }
                parent = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("unsupported event attribute, expected `extends`"))
            }
        })?;
    }
    Ok(parent)
}
