extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, Type};

/// Field and variant attributes parsed from `#[bert(...)]` annotations
///
/// # Fields
///
/// * `rename` - Atom to use instead of the field name or snake_case variant name
/// * `default` - Whether to use `Default::default()` when the field is missing during decode
#[derive(Debug, Clone, Default)]
struct BertAttributes {
    rename: Option<String>,
    default: bool,
}

/// Extract and parse `#[bert(...)]` attribute values
///
/// # Supported Attributes
///
/// * `#[bert(rename = "name")]` - Alternative atom for the field or variant
/// * `#[bert(default)]` - Use default value if field is missing during decode
///
/// Multiple attributes can be combined: `#[bert(rename = "id", default)]`
fn get_attributes(attrs: &[Attribute]) -> syn::Result<BertAttributes> {
    let mut parsed = BertAttributes::default();
    for attr in attrs {
        if !attr.path().is_ident("bert") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let lit: syn::LitStr = meta.value()?.parse()?;
                parsed.rename = Some(lit.value());
                Ok(())
            } else if meta.path.is_ident("default") {
                parsed.default = true;
                Ok(())
            } else {
                Err(meta.error("Unknown attribute, expected `rename` or `default`"))
            }
        })?;
    }
    Ok(parsed)
}

/// Convert a type or variant name to the snake_case atom it is encoded as.
///
/// `HttpRequest` becomes `http_request`; names already in snake_case are unchanged.
fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

/// Check if a type is `Option<T>`
fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        type_path
            .path
            .segments
            .last()
            .map_or(false, |seg| seg.ident == "Option")
    } else {
        false
    }
}

/// Build `#{field => value}` pairs for named fields that are already bound to locals.
fn named_fields_to_map(
    fields: &syn::FieldsNamed,
    access: impl Fn(&syn::Ident) -> TokenStream2,
) -> syn::Result<TokenStream2> {
    let mut pushes = Vec::new();
    for f in &fields.named {
        let ident = f.ident.as_ref().expect("named field");
        let attrs = get_attributes(&f.attrs)?;
        let key = attrs.rename.unwrap_or_else(|| ident.to_string());
        let value = access(ident);
        pushes.push(quote! {
            pairs.push((
                bert_codec::Term::atom(#key),
                bert_codec::ToTerm::to_term(#value)?,
            ));
        });
    }
    let count = fields.named.len();
    Ok(quote! {
        {
            let mut pairs = ::std::vec::Vec::with_capacity(#count);
            #(#pushes)*
            bert_codec::Term::Map(pairs)
        }
    })
}

/// Build the field initializers that take each named field out of a decoded map.
///
/// Missing `Option` fields become `None`; missing `#[bert(default)]` fields become
/// `Default::default()`; any other missing field is an error.
fn named_fields_from_map(
    fields: &syn::FieldsNamed,
    type_name: &str,
) -> syn::Result<TokenStream2> {
    let mut inits = Vec::new();
    for f in &fields.named {
        let ident = f.ident.as_ref().expect("named field");
        let attrs = get_attributes(&f.attrs)?;
        let key = attrs.rename.unwrap_or_else(|| ident.to_string());
        let missing = if attrs.default {
            quote! { ::std::default::Default::default() }
        } else if is_option_type(&f.ty) {
            quote! { ::std::option::Option::None }
        } else {
            quote! {
                return ::std::result::Result::Err(
                    bert_codec::__private::missing_field(#key, #type_name)
                )
            }
        };
        inits.push(quote! {
            #ident: match bert_codec::__private::take_field(&mut pairs, #key) {
                ::std::option::Option::Some(value) => bert_codec::FromTerm::from_term(value)?,
                ::std::option::Option::None => #missing,
            },
        });
    }
    Ok(quote! { #(#inits)* })
}

/// Derive macro for implementing the `ToTerm` trait
///
/// * Named structs become maps keyed by field-name atoms
/// * Tuple structs become tuples
/// * Unit structs and unit variants become the snake_case atom of their name
/// * Tuple variants become `{variant, fields...}`, named variants `{variant, #{...}}`
///
/// # Examples
///
/// ```ignore
/// #[derive(ToTerm)]
/// struct User {
///     #[bert(rename = "uid")]
///     id: u32,
///     name: String,
/// }
/// ```
#[proc_macro_derive(ToTerm, attributes(bert))]
pub fn derive_to_term(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_to_term(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_to_term(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(fields) => {
                let map = named_fields_to_map(fields, |ident| quote! { &self.#ident })?;
                quote! { ::std::result::Result::Ok(#map) }
            }
            Fields::Unnamed(fields) => {
                let indices = (0..fields.unnamed.len()).map(syn::Index::from);
                quote! {
                    ::std::result::Result::Ok(bert_codec::Term::Tuple(::std::vec![
                        #(bert_codec::ToTerm::to_term(&self.#indices)?,)*
                    ]))
                }
            }
            Fields::Unit => {
                let atom = to_snake_case(&name.to_string());
                quote! { ::std::result::Result::Ok(bert_codec::Term::atom(#atom)) }
            }
        },
        Data::Enum(e) => {
            let mut arms = Vec::new();
            for v in &e.variants {
                let ident = &v.ident;
                let attrs = get_attributes(&v.attrs)?;
                let atom = attrs
                    .rename
                    .unwrap_or_else(|| to_snake_case(&ident.to_string()));
                arms.push(match &v.fields {
                    Fields::Unit => quote! {
                        Self::#ident => ::std::result::Result::Ok(bert_codec::Term::atom(#atom)),
                    },
                    Fields::Unnamed(fields) => {
                        let bindings: Vec<_> = (0..fields.unnamed.len())
                            .map(|i| format_ident!("f{}", i))
                            .collect();
                        quote! {
                            Self::#ident(#(#bindings),*) => ::std::result::Result::Ok(
                                bert_codec::Term::Tuple(::std::vec![
                                    bert_codec::Term::atom(#atom),
                                    #(bert_codec::ToTerm::to_term(#bindings)?,)*
                                ])
                            ),
                        }
                    }
                    Fields::Named(fields) => {
                        let idents: Vec<_> = fields
                            .named
                            .iter()
                            .map(|f| f.ident.clone().expect("named field"))
                            .collect();
                        let map = named_fields_to_map(fields, |ident| quote! { #ident })?;
                        quote! {
                            Self::#ident { #(#idents),* } => ::std::result::Result::Ok(
                                bert_codec::Term::Tuple(::std::vec![
                                    bert_codec::Term::atom(#atom),
                                    #map,
                                ])
                            ),
                        }
                    }
                });
            }
            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                name,
                "ToTerm cannot be derived for unions",
            ))
        }
    };

    Ok(quote! {
        impl #impl_generics bert_codec::ToTerm for #name #ty_generics #where_clause {
            fn to_term(&self) -> bert_codec::Result<bert_codec::Term> {
                #body
            }
        }
    })
}

/// Derive macro for implementing the `FromTerm` trait
///
/// Accepts exactly the shapes `#[derive(ToTerm)]` produces. Map keys may be atoms or
/// binaries, so maps produced by other BERT encoders with text keys also decode.
#[proc_macro_derive(FromTerm, attributes(bert))]
pub fn derive_from_term(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_from_term(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_from_term(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let type_name = name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(fields) => {
                let inits = named_fields_from_map(fields, &type_name)?;
                quote! {
                    let mut pairs = bert_codec::__private::expect_map(term, #type_name)?;
                    ::std::result::Result::Ok(Self { #inits })
                }
            }
            Fields::Unnamed(fields) => {
                let count = fields.unnamed.len();
                let elements = (0..count).map(|_| {
                    quote! {
                        bert_codec::FromTerm::from_term(
                            bert_codec::__private::next_element(&mut items, #type_name)?
                        )?
                    }
                });
                quote! {
                    let mut items = bert_codec::__private::expect_tuple(term, #count, #type_name)?
                        .into_iter();
                    ::std::result::Result::Ok(Self(#(#elements),*))
                }
            }
            Fields::Unit => {
                let atom = to_snake_case(&type_name);
                quote! {
                    bert_codec::__private::expect_atom(term, #atom, #type_name)?;
                    ::std::result::Result::Ok(Self)
                }
            }
        },
        Data::Enum(e) => {
            let mut arms = Vec::new();
            for v in &e.variants {
                let ident = &v.ident;
                let attrs = get_attributes(&v.attrs)?;
                let atom = attrs
                    .rename
                    .unwrap_or_else(|| to_snake_case(&ident.to_string()));
                arms.push(match &v.fields {
                    Fields::Unit => quote! {
                        #atom => {
                            bert_codec::__private::expect_end(rest, #type_name)?;
                            ::std::result::Result::Ok(Self::#ident)
                        }
                    },
                    Fields::Unnamed(fields) => {
                        let elements = (0..fields.unnamed.len()).map(|_| {
                            quote! {
                                bert_codec::FromTerm::from_term(
                                    bert_codec::__private::next_element(&mut rest, #type_name)?
                                )?
                            }
                        });
                        quote! {
                            #atom => {
                                let value = Self::#ident(#(#elements),*);
                                bert_codec::__private::expect_end(rest, #type_name)?;
                                ::std::result::Result::Ok(value)
                            }
                        }
                    }
                    Fields::Named(fields) => {
                        let inits = named_fields_from_map(fields, &type_name)?;
                        quote! {
                            #atom => {
                                let mut pairs = bert_codec::__private::expect_map(
                                    bert_codec::__private::next_element(&mut rest, #type_name)?,
                                    #type_name,
                                )?;
                                let value = Self::#ident { #inits };
                                bert_codec::__private::expect_end(rest, #type_name)?;
                                ::std::result::Result::Ok(value)
                            }
                        }
                    }
                });
            }
            quote! {
                let (variant, rest) = bert_codec::__private::variant(term, #type_name)?;
                #[allow(unused_mut, unused_variables)]
                let mut rest = rest.into_iter();
                match variant.as_str() {
                    #(#arms)*
                    other => ::std::result::Result::Err(
                        bert_codec::__private::unknown_variant(other, #type_name)
                    ),
                }
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                name,
                "FromTerm cannot be derived for unions",
            ))
        }
    };

    Ok(quote! {
        impl #impl_generics bert_codec::FromTerm for #name #ty_generics #where_clause {
            fn from_term(term: bert_codec::Term) -> bert_codec::Result<Self> {
                #body
            }
        }
    })
}
