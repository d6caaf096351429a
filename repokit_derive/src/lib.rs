use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Data, DeriveInput, Fields, Ident, LitStr, Token, Type, parse_macro_input, spanned::Spanned,
};

/// Derives `repokit::metadata::Entity` from the struct's fields.
///
/// Property names are the PascalCase field names, matching
/// `#[serde(rename_all = "PascalCase")]`.
///
/// Struct options: `#[entity(name = "...", key = "...")]`.
/// Field options: `cascade`, `collection [= "Target"]`, `reference [= "Target"]`,
/// `foreign_key = "..."`, `rename = "..."`, `nullable`, `skip`.
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_entity(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct EntityOptions {
    name: Option<String>,
    key: Option<String>,
}

enum Navigation {
    Reference(Option<String>),
    Collection(Option<String>),
}

#[derive(Default)]
struct FieldOptions {
    cascade: bool,
    navigation: Option<Navigation>,
    foreign_key: Option<String>,
    rename: Option<String>,
    nullable: bool,
    skip: bool,
}

fn expand_entity(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            "Entity cannot be derived for generic structs",
        ));
    }

    let options = parse_entity_options(&input.attrs)?;
    let entity_name = options.name.unwrap_or_else(|| struct_name.to_string());
    let key = options.key.unwrap_or_else(|| "Id".to_string());

    let named_fields = match input.data {
        Data::Struct(data) => match data.fields {
            Fields::Named(fields) => fields,
            _ => {
                return Err(syn::Error::new(
                    struct_name.span(),
                    "Entity requires named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Entity can only be derived for structs",
            ));
        }
    };

    let mut properties = Vec::<TokenStream2>::new();
    for field in named_fields.named {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "Entity requires named fields"))?;
        let field_options = parse_field_options(&field.attrs)?;
        if field_options.skip {
            continue;
        }

        let property_name = field_options
            .rename
            .clone()
            .unwrap_or_else(|| to_pascal_case(&ident));
        properties.push(property_tokens(
            &entity_name,
            &property_name,
            &field.ty,
            field_options,
            &ident,
        )?);
    }

    if properties.is_empty() {
        return Err(syn::Error::new(
            struct_name.span(),
            "Entity requires at least one property",
        ));
    }

    Ok(quote! {
        impl ::repokit::metadata::Entity for #struct_name {
            const NAME: &'static str = #entity_name;

            fn descriptor() -> ::repokit::metadata::EntityDescriptor {
                ::repokit::metadata::EntityDescriptor::builder(#entity_name)
                    .key(#key)
                    #( .property(#properties) )*
                    .build()
            }
        }
    })
}

fn property_tokens(
    entity_name: &str,
    property_name: &str,
    ty: &Type,
    options: FieldOptions,
    ident: &Ident,
) -> syn::Result<TokenStream2> {
    let cascade = options.cascade.then(|| quote!(.cascade()));

    match options.navigation {
        Some(Navigation::Collection(target)) => {
            let target = match target {
                Some(target) => target,
                None => element_type_name(ty, "Vec").ok_or_else(|| {
                    syn::Error::new(
                        ty.span(),
                        "collection navigation needs a Vec<T> field or collection = \"Target\"",
                    )
                })?,
            };
            let foreign_key = options
                .foreign_key
                .unwrap_or_else(|| format!("{}Id", entity_name));
            Ok(quote! {
                ::repokit::metadata::PropertyDescriptor::collection(
                    #property_name,
                    #target,
                    #foreign_key,
                ) #cascade
            })
        }
        Some(Navigation::Reference(target)) => {
            let target = match target {
                Some(target) => target,
                None => element_type_name(ty, "Option")
                    .or_else(|| element_type_name(ty, "Box"))
                    .or_else(|| last_segment(ty).map(|segment| segment.ident.to_string()))
                    .ok_or_else(|| {
                        syn::Error::new(
                            ty.span(),
                            "reference navigation needs reference = \"Target\"",
                        )
                    })?,
            };
            let foreign_key = options
                .foreign_key
                .unwrap_or_else(|| format!("{}Id", property_name));
            Ok(quote! {
                ::repokit::metadata::PropertyDescriptor::reference(
                    #property_name,
                    #target,
                    #foreign_key,
                ) #cascade
            })
        }
        None => {
            if options.cascade {
                return Err(syn::Error::new(
                    ident.span(),
                    "cascade applies to navigations; add collection or reference",
                ));
            }
            if options.foreign_key.is_some() {
                return Err(syn::Error::new(
                    ident.span(),
                    "foreign_key applies to navigations; add collection or reference",
                ));
            }

            let (scalar, optional) = scalar_type(ty);
            let scalar = Ident::new(scalar, ident.span());
            let nullable = (optional || options.nullable).then(|| quote!(.nullable()));
            Ok(quote! {
                ::repokit::metadata::PropertyDescriptor::scalar(
                    #property_name,
                    ::repokit::metadata::ScalarType::#scalar,
                ) #nullable
            })
        }
    }
}

/// Scalar type of a field and whether it is wrapped in `Option`.
fn scalar_type(ty: &Type) -> (&'static str, bool) {
    let Some(segment) = last_segment(ty) else {
        return ("Json", false);
    };

    let ident = segment.ident.to_string();
    match ident.as_str() {
        "Option" => match first_generic_type(segment) {
            Some(inner) => (scalar_type(&inner).0, true),
            None => ("Json", true),
        },
        "bool" => ("Boolean", false),
        "String" | "str" | "char" => ("Text", false),
        "f32" | "f64" => ("Float", false),
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
        | "u128" | "usize" => ("Integer", false),
        "Decimal" => ("Decimal", false),
        "DateTime" | "NaiveDateTime" | "NaiveDate" => ("Timestamp", false),
        "Uuid" => ("Uuid", false),
        _ => ("Json", false),
    }
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(path) => path.path.segments.last(),
        Type::Reference(reference) => last_segment(reference.elem.as_ref()),
        _ => None,
    }
}

fn first_generic_type(segment: &syn::PathSegment) -> Option<Type> {
    let syn::PathArguments::AngleBracketed(arguments) = &segment.arguments else {
        return None;
    };

    for arg in &arguments.args {
        if let syn::GenericArgument::Type(ty) = arg {
            return Some(ty.clone());
        }
    }
    None
}

/// `Inner` of `Wrapper<Inner>`.
fn element_type_name(ty: &Type, wrapper: &str) -> Option<String> {
    let segment = last_segment(ty)?;
    if segment.ident != wrapper {
        return None;
    }
    let inner = first_generic_type(segment)?;
    last_segment(&inner).map(|segment| segment.ident.to_string())
}

fn to_pascal_case(ident: &Ident) -> String {
    let raw = ident.to_string();
    let raw = raw.trim_start_matches("r#");

    let mut result = String::with_capacity(raw.len());
    let mut upper_next = true;
    for c in raw.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            result.extend(c.to_uppercase());
            upper_next = false;
        } else {
            result.push(c);
        }
    }
    result
}

fn parse_entity_options(attrs: &[syn::Attribute]) -> syn::Result<EntityOptions> {
    let mut options = EntityOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                options.name = Some(lit.value());
                return Ok(());
            }

            if meta.path.is_ident("key") {
                let lit: LitStr = meta.value()?.parse()?;
                options.key = Some(lit.value());
                return Ok(());
            }

            Err(meta.error(
                "Unsupported entity attribute. Supported: name = \"...\", key = \"...\"",
            ))
        })?;
    }

    Ok(options)
}

fn parse_field_options(attrs: &[syn::Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("cascade") {
                options.cascade = true;
                return Ok(());
            }

            if meta.path.is_ident("skip") {
                options.skip = true;
                return Ok(());
            }

            if meta.path.is_ident("nullable") {
                options.nullable = true;
                return Ok(());
            }

            if meta.path.is_ident("collection") || meta.path.is_ident("reference") {
                if options.navigation.is_some() {
                    return Err(meta.error("a field is either a collection or a reference"));
                }
                let target = if meta.input.peek(Token![=]) {
                    let lit: LitStr = meta.value()?.parse()?;
                    Some(lit.value())
                } else {
                    None
                };
                options.navigation = Some(if meta.path.is_ident("collection") {
                    Navigation::Collection(target)
                } else {
                    Navigation::Reference(target)
                });
                return Ok(());
            }

            if meta.path.is_ident("foreign_key") {
                let lit: LitStr = meta.value()?.parse()?;
                options.foreign_key = Some(lit.value());
                return Ok(());
            }

            if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                options.rename = Some(lit.value());
                return Ok(());
            }

            Err(meta.error(
                "Unsupported entity field attribute. Supported: cascade, collection [= \"...\"], reference [= \"...\"], foreign_key = \"...\", rename = \"...\", nullable, skip",
            ))
        })?;
    }

    if options.skip
        && (options.navigation.is_some() || options.cascade || options.rename.is_some())
    {
        return Err(syn::Error::new(
            proc_macro2::Span::call_site(),
            "#[entity(skip)] cannot be combined with other field options",
        ));
    }

    Ok(options)
}
