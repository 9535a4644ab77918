use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, LitStr, parse_macro_input};

/// Implements `routeline::handler::resolver::ClassName` for a struct.
///
/// The class name defaults to the struct's identifier and can be overridden
/// with `#[class(name = "App\\Http\\UserController")]`.
#[proc_macro_derive(ClassName, attributes(class))]
pub fn derive_class_name(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    if !matches!(input.data, Data::Struct(_)) {
        return TokenStream::from(
            syn::Error::new_spanned(&input.ident, "ClassName can only be derived for structs.")
                .to_compile_error(),
        );
    }

    let class_name = match find_class_name(&input) {
        Ok(Some(name)) => name,
        Ok(None) => input.ident.to_string(),
        Err(e) => return TokenStream::from(e.to_compile_error()),
    };

    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let generated = quote! {
        impl #impl_generics ::routeline::handler::resolver::ClassName for #struct_name #ty_generics #where_clause {
            fn class_name() -> &'static str {
                #class_name
            }
        }
    };
    TokenStream::from(generated)
}

fn find_class_name(input: &DeriveInput) -> syn::Result<Option<String>> {
    let mut class_name = None;
    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("class")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().is_empty() {
                    return Err(meta.error("class name must not be empty"));
                }
                class_name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported class attribute, expected `name = \"...\"`"))
            }
        })?;
    }
    Ok(class_name)
}
