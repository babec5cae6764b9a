use proc_macro::TokenStream;
use proc_macro2::Ident;
use quote::quote;
use syn::{
    parse_quote, Attribute, DataStruct, DeriveInput, Expr, ExprLit, Fields, Generics, Lit, LitStr, Meta,
    Result, Visibility,
};

/// How one record field is written into the normalized map.
struct FieldSpec<'a> {
    ident: &'a Ident,
    name: String,
    omit_empty: bool,
    embedded: bool,
}

pub(crate) fn generate_normalize_for_struct(ast: &DeriveInput, data: &DataStruct) -> Result<TokenStream> {
    let name = &ast.ident;
    let generics = add_normalize_bounds(ast.generics.clone());
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    if is_binary(&ast.attrs)? {
        let gen = quote! {
            impl #impl_generics ::clover::common::Normalize for #name #ty_generics #where_clause {
                fn normalize(&self) -> ::clover::errors::CloverResult<::clover::common::Value> {
                    ::clover::common::normalize_binary(self)
                }
            }
        };
        return Ok(TokenStream::from(gen));
    }

    let fields = match &data.fields {
        Fields::Named(fields) => fields.named.iter().collect::<Vec<_>>(),
        Fields::Unit => Vec::new(),
        Fields::Unnamed(fields) => {
            return Err(syn::Error::new_spanned(
                fields,
                "tuple structs have no field names to map",
            ))
        }
    };

    let mut specs = Vec::with_capacity(fields.len());
    for field in fields {
        if !matches!(field.vis, Visibility::Public(_)) {
            continue;
        }
        if let Some(ident) = field.ident.as_ref() {
            specs.push(field_spec(ident, &field.attrs)?);
        }
    }

    let inserts = specs.iter().map(|spec| {
        let ident = spec.ident;
        let field_name = &spec.name;
        let embedded = spec.embedded;
        let insert = quote! {
            ::clover::common::insert_record_field(
                &mut map,
                #field_name,
                ::clover::common::Normalize::normalize(&self.#ident)?,
                #embedded,
            );
        };
        if spec.omit_empty {
            quote! {
                if !::clover::common::Normalize::is_zero(&self.#ident) {
                    #insert
                }
            }
        } else {
            insert
        }
    });

    let gen = quote! {
        impl #impl_generics ::clover::common::Normalize for #name #ty_generics #where_clause {
            #[allow(unused_mut)]
            fn normalize(&self) -> ::clover::errors::CloverResult<::clover::common::Value> {
                let mut map = ::std::collections::BTreeMap::new();
                #(#inserts)*
                Ok(::clover::common::Value::Map(map))
            }
        }
    };

    Ok(TokenStream::from(gen))
}

fn add_normalize_bounds(mut generics: Generics) -> Generics {
    for param in generics.type_params_mut() {
        param.bounds.push(parse_quote!(::clover::common::Normalize));
    }
    generics
}

fn is_binary(attrs: &[Attribute]) -> Result<bool> {
    let mut binary = false;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("clover")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("binary") {
                binary = true;
                Ok(())
            } else {
                Err(meta.error("unsupported struct attribute, expected `binary`"))
            }
        })?;
    }
    Ok(binary)
}

fn field_spec<'a>(ident: &'a Ident, attrs: &[Attribute]) -> Result<FieldSpec<'a>> {
    let mut spec = FieldSpec {
        ident,
        name: ident.to_string(),
        omit_empty: false,
        embedded: false,
    };

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("clover")) {
        match &attr.meta {
            // #[clover = "name,omitempty"]
            Meta::NameValue(name_value) => match &name_value.value {
                Expr::Lit(ExprLit { lit: Lit::Str(tag), .. }) => apply_tag(&mut spec, tag),
                other => return Err(syn::Error::new_spanned(other, "expected a string tag")),
            },
            Meta::List(_) => {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("tag") {
                        let tag: LitStr = meta.value()?.parse()?;
                        apply_tag(&mut spec, &tag);
                    } else if meta.path.is_ident("rename") {
                        let rename: LitStr = meta.value()?.parse()?;
                        if !rename.value().is_empty() {
                            spec.name = rename.value();
                        }
                    } else if meta.path.is_ident("omitempty") {
                        spec.omit_empty = true;
                    } else if meta.path.is_ident("embed") {
                        spec.embedded = true;
                    } else {
                        return Err(meta.error(
                            "unsupported field attribute, expected `tag`, `rename`, `omitempty` or `embed`",
                        ));
                    }
                    Ok(())
                })?;
            }
            Meta::Path(path) => {
                return Err(syn::Error::new_spanned(path, "expected `#[clover = \"...\"]` or `#[clover(...)]`"))
            }
        }
    }
    Ok(spec)
}

/// Applies a `name[,omitempty]` tag. Only the option right after the name
/// is honoured.
fn apply_tag(spec: &mut FieldSpec, tag: &LitStr) {
    let tag = tag.value();
    let mut parts = tag.split(',');
    if let Some(name) = parts.next().map(str::trim) {
        if !name.is_empty() {
            spec.name = name.to_string();
        }
    }
    if parts.next().map(str::trim) == Some("omitempty") {
        spec.omit_empty = true;
    }
}
