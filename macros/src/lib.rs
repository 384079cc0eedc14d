extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote, quote_spanned};
use syn::spanned::Spanned;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Index};

/// Derives `dg_utxo_serialize::TxSerialize` by writing each field in declaration order.
#[proc_macro_derive(TxSerial)]
pub fn derive_tx_serial(input: TokenStream) -> TokenStream {
    let input: DeriveInput = parse_macro_input!(input);
    let name = input.ident;
    let (to_bytes, from_bytes) = match create_to_bytes(input.data) {
        Ok(v) => v,
        Err(e) => return e.to_compile_error().into(),
    };
    let gen = quote! {
        impl dg_utxo_serialize::TxSerialize for #name {
            fn to_bytes(&self) -> Vec<u8> {
                #to_bytes
            }
            fn from_bytes<T: AsRef<[u8]>>(bytes: &mut std::io::Cursor<T>) -> Result<Self, std::io::Error>
            where
                Self: Sized,
            {
                #from_bytes
            }
        }
    };
    gen.into()
}

fn create_to_bytes(data: Data) -> Result<(TokenStream2, TokenStream2), syn::Error> {
    match data {
        Data::Struct(s) => match s.fields {
            Fields::Named(ref fields) => {
                let to_bytes = fields.named.iter().map(|f| {
                    let name = &f.ident;
                    quote_spanned! {f.span()=>
                        bytes.extend(dg_utxo_serialize::TxSerialize::to_bytes(&self.#name));
                    }
                });
                let names = fields.named.iter().map(|f| {
                    let name = &f.ident;
                    quote_spanned! {f.span()=>
                        let #name = dg_utxo_serialize::TxSerialize::from_bytes(bytes)?;
                    }
                });
                let assign = fields.named.iter().map(|f| {
                    let name = &f.ident;
                    quote_spanned! {f.span()=>
                        #name,
                    }
                });
                Ok((
                    quote! {
                        let mut bytes = vec![];
                        #(#to_bytes)*
                        bytes
                    },
                    quote! {
                        #(#names)*
                        Ok(Self {
                            #(#assign)*
                        })
                    },
                ))
            }
            Fields::Unnamed(ref fields) => {
                let to_bytes = fields.unnamed.iter().enumerate().map(|(i, f)| {
                    let index = Index::from(i);
                    quote_spanned! {f.span()=>
                        bytes.extend(dg_utxo_serialize::TxSerialize::to_bytes(&self.#index));
                    }
                });
                let locals: Vec<_> = (0..fields.unnamed.len())
                    .map(|i| format_ident!("field_{}", i))
                    .collect();
                let names = fields.unnamed.iter().zip(locals.iter()).map(|(f, local)| {
                    quote_spanned! {f.span()=>
                        let #local = dg_utxo_serialize::TxSerialize::from_bytes(bytes)?;
                    }
                });
                Ok((
                    quote! {
                        let mut bytes = vec![];
                        #(#to_bytes)*
                        bytes
                    },
                    quote! {
                        #(#names)*
                        Ok(Self(#(#locals),*))
                    },
                ))
            }
            Fields::Unit => Ok((quote! { vec![] }, quote! { Ok(Self) })),
        },
        Data::Enum(e) => Err(syn::Error::new(
            e.enum_token.span(),
            "TxSerial cannot be derived for enums",
        )),
        Data::Union(u) => Err(syn::Error::new(
            u.union_token.span(),
            "TxSerial cannot be derived for unions",
        )),
    }
}
