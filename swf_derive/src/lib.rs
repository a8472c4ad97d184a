use proc_macro2::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Index};

/// Derives `Trace` by calling `trace` on every field. Used on the AVM1 heap
/// object kinds (`ScriptObject`, `Value`, scope frames) so their `GcPtr`
/// fields get visited without hand-writing the walk for each one.
#[proc_macro_derive(Collect)]
pub fn collect_derive(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let expanded = impl_collect(&input);
    proc_macro::TokenStream::from(expanded)
}

fn impl_collect(ast: &DeriveInput) -> TokenStream {
    let name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let body = match &ast.data {
        Data::Struct(data) => trace_fields(&data.fields, quote! { self }),
        Data::Enum(data) => {
            let arms = data.variants.iter().map(|variant| {
                let variant_name = &variant.ident;
                match &variant.fields {
                    Fields::Unit => quote! { #name::#variant_name => {} },
                    Fields::Unnamed(fields) => {
                        let bindings: Vec<_> = (0..fields.unnamed.len())
                            .map(|i| syn::Ident::new(&format!("field_{i}"), proc_macro2::Span::call_site()))
                            .collect();
                        quote! {
                            #name::#variant_name(#(#bindings),*) => {
                                #(crate::gc::Trace::trace(#bindings, heap);)*
                            }
                        }
                    }
                    Fields::Named(fields) => {
                        let names: Vec<_> = fields.named.iter().map(|f| f.ident.clone().unwrap()).collect();
                        quote! {
                            #name::#variant_name { #(#names),* } => {
                                #(crate::gc::Trace::trace(#names, heap);)*
                            }
                        }
                    }
                }
            });
            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
        Data::Union(_) => panic!("Collect cannot be derived for unions"),
    };

    quote! {
        impl #impl_generics crate::gc::Trace for #name #ty_generics #where_clause {
            fn trace(&self, heap: &crate::gc::Heap) {
                #body
            }
        }
    }
}

/// Builds the trace body for a struct's fields (also used for the
/// struct-data case, called with `self` as the receiver expression).
fn trace_fields(fields: &Fields, receiver: TokenStream) -> TokenStream {
    match fields {
        Fields::Unit => quote! {},
        Fields::Named(fields) => {
            let calls = fields.named.iter().map(|f| {
                let ident = f.ident.as_ref().unwrap();
                quote! { crate::gc::Trace::trace(&#receiver.#ident, heap); }
            });
            quote! { #(#calls)* }
        }
        Fields::Unnamed(fields) => {
            let calls = fields.unnamed.iter().enumerate().map(|(i, _)| {
                let index = Index::from(i);
                quote! { crate::gc::Trace::trace(&#receiver.#index, heap); }
            });
            quote! { #(#calls)* }
        }
    }
}
