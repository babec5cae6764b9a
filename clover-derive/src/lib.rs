#![recursion_limit = "128"]
//! # Clover Derive Macros
//!
//! Procedural macros deriving clover traits.
//!
//! ## `Normalize`
//!
//! Derives `clover::common::Normalize` for structs with named fields. The
//! generated impl turns the record into a `Value::Map` of its public fields,
//! in declaration order.
//!
//! - **Field tag**: `#[clover = "name,omitempty"]` renames the field and
//!   optionally skips it when it holds the zero value of its kind
//! - **List form**: `#[clover(tag = "...")]`, `#[clover(rename = "...")]`,
//!   `#[clover(omitempty)]`, `#[clover(embed)]`
//! - **Struct attribute**: `#[clover(binary)]` normalizes through
//!   `MarshalBinary` into a byte blob
//!
//! # Examples
//!
//! ```rust,ignore
//! use clover_derive::Normalize;
//!
//! #[derive(Normalize)]
//! pub struct Audit {
//!     pub created_by: String,
//! }
//!
//! #[derive(Normalize)]
//! pub struct Todo {
//!     pub title: String,
//!     #[clover = "done,omitempty"]
//!     pub completed: bool,
//!     #[clover(embed)]
//!     pub audit: Audit,
//!     secret: String,
//! }
//! ```

extern crate proc_macro;
mod normalize;

use crate::normalize::generate_normalize_for_struct;
use proc_macro::TokenStream;
use syn::{Data, DeriveInput};

/// Derives the `Normalize` trait for structured records.
///
/// # Errors
///
/// Returns a compile error if:
/// - The type is a tuple struct, an enum or a union
/// - A `clover` attribute is malformed or unknown
///
/// # Examples
///
/// ```rust,ignore
/// #[derive(Normalize)]
/// pub struct User {
///     pub name: String,
///     #[clover(rename = "years", omitempty)]
///     pub age: u32,
/// }
/// ```
#[proc_macro_derive(Normalize, attributes(clover))]
pub fn derive_normalize(input: TokenStream) -> TokenStream {
    let ast = syn::parse_macro_input!(input as DeriveInput);

    match ast.data {
        Data::Struct(ref data) => match generate_normalize_for_struct(&ast, data) {
            Ok(token_stream) => token_stream,
            Err(e) => {
                let error = syn::Error::new(
                    e.span(),
                    format!("Failed to derive Normalize for struct '{}': {}", ast.ident, e),
                );
                error.to_compile_error().into()
            }
        },
        Data::Enum(_) => {
            let error = syn::Error::new_spanned(
                &ast,
                "Cannot derive Normalize for enums. Only structs with named fields are supported.",
            );
            error.to_compile_error().into()
        }
        Data::Union(_) => {
            let error = syn::Error::new_spanned(
                &ast,
                "Cannot derive Normalize for unions. Only structs with named fields are supported.",
            );
            error.to_compile_error().into()
        }
    }
}
