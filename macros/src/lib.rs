extern crate proc_macro;
use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, LitStr};

/// Converts a string literal into a fixed-size `[char; N]` array at compile time.
///
/// Used for constructing fixed manufacturer/CPU identification fields for SNIP.
#[proc_macro]
pub fn str_to_array(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as LitStr);
    let value = input.value();

    let chars: Vec<char> = value.chars().collect();

    let expanded = quote! {
        [#(#chars),*]
    };

    TokenStream::from(expanded)
}
