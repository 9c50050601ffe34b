use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::spanned::Spanned;
use syn::{Data, DeriveInput, Fields, Ident, LitInt, LitStr, Type, parse_macro_input};

/// Derives `sprocmap::SprocEntity` from `#[sproc(...)]` declarations.
///
/// Type level: `load_all`, `load_by_key`, `insert`, `update`, `delete` (procedure
/// names) and `prefix` (parameter-name prefix).
///
/// Field level: `key`, `concurrency_token`, `never_bind`, `ignore_write`,
/// `ignore_read`, `parameter = "..."`, `column = "..."`, `size = N`.
#[proc_macro_derive(SprocEntity, attributes(sproc))]
pub fn derive_sproc_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_sproc_entity(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct EntityOptions {
    prefix: Option<LitStr>,
    procedures: Vec<(Ident, LitStr)>,
}

#[derive(Default)]
struct FieldOptions {
    key: bool,
    concurrency_token: bool,
    never_bind: bool,
    ignore_write: bool,
    ignore_read: bool,
    parameter: Option<LitStr>,
    column: Option<LitStr>,
    size: Option<u32>,
}

struct EntityField {
    ident: Ident,
    name: String,
    ty: Type,
    options: FieldOptions,
}

const PROCEDURE_KINDS: &[(&str, &str)] = &[
    ("load_all", "LoadAll"),
    ("load_by_key", "LoadByKey"),
    ("insert", "Insert"),
    ("update", "Update"),
    ("delete", "Delete"),
];

fn expand_sproc_entity(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            "SprocEntity does not support generic structs",
        ));
    }

    let options = parse_entity_options(&input.attrs)?;

    let data_struct = match input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "SprocEntity can only be derived for structs",
            ));
        }
    };

    let named_fields = match data_struct.fields {
        Fields::Named(fields) => fields,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "SprocEntity requires named fields",
            ));
        }
    };

    let mut fields = Vec::new();
    for field in named_fields.named {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        fields.push(EntityField {
            name: ident.unraw().to_string(),
            ident,
            ty: field.ty.clone(),
            options: parse_field_options(&field.attrs)?,
        });
    }

    let type_name = struct_name.to_string();

    let prefix_call = options.prefix.as_ref().map(|prefix| quote!(.prefix(#prefix)));

    let procedure_calls = options.procedures.iter().map(|(kind, procedure)| {
        quote!(.procedure(::sprocmap::ProcedureKind::#kind, #procedure))
    });

    let property_exprs = fields.iter().map(|field| {
        let name = &field.name;
        let ty = &field.ty;
        let mut modifiers = Vec::new();
        if field.options.key {
            modifiers.push(quote!(.key()));
        }
        if field.options.concurrency_token {
            modifiers.push(quote!(.concurrency_token()));
        }
        if field.options.never_bind {
            modifiers.push(quote!(.never_bind()));
        }
        if field.options.ignore_write {
            modifiers.push(quote!(.ignore_write()));
        }
        if field.options.ignore_read {
            modifiers.push(quote!(.ignore_read()));
        }
        if let Some(parameter) = &field.options.parameter {
            modifiers.push(quote!(.parameter(#parameter)));
        }
        if let Some(column) = &field.options.column {
            modifiers.push(quote!(.column(#column)));
        }
        if let Some(size) = field.options.size {
            modifiers.push(quote!(.size(#size)));
        }
        quote! {
            .property(::sprocmap::PropertyBinding::of::<#ty>(#name) #(#modifiers)*)
        }
    });

    let get_arms = fields.iter().map(|field| {
        let name = &field.name;
        let ident = &field.ident;
        quote! {
            #name => ::core::option::Option::Some(::sprocmap::SqlValue::to_value(&self.#ident)),
        }
    });

    let set_arms = fields.iter().map(|field| {
        let name = &field.name;
        let ident = &field.ident;
        let ty = &field.ty;
        quote! {
            #name => {
                self.#ident = <#ty as ::sprocmap::SqlValue>::from_value(value)?;
                ::core::result::Result::Ok(())
            }
        }
    });

    Ok(quote! {
        impl ::sprocmap::SprocEntity for #struct_name {
            fn entity_binding() -> ::sprocmap::Result<::sprocmap::EntityBinding> {
                ::sprocmap::EntityBinding::builder(#type_name)
                    #prefix_call
                    #(#procedure_calls)*
                    #(#property_exprs)*
                    .build()
            }

            fn get_property(&self, property: &str) -> ::core::option::Option<::sprocmap::Value> {
                match property {
                    #(#get_arms)*
                    _ => ::core::option::Option::None,
                }
            }

            fn set_property(
                &mut self,
                property: &str,
                value: ::sprocmap::Value,
            ) -> ::sprocmap::Result<()> {
                let _ = &value;
                match property {
                    #(#set_arms)*
                    other => ::core::result::Result::Err(::sprocmap::SprocError::Argument(
                        ::std::format!("'{}' has no property '{}'", #type_name, other),
                    )),
                }
            }
        }
    })
}

fn parse_entity_options(attrs: &[syn::Attribute]) -> syn::Result<EntityOptions> {
    let mut options = EntityOptions {
        prefix: None,
        procedures: Vec::new(),
    };

    for attr in attrs {
        if !attr.path().is_ident("sproc") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("prefix") {
                if options.prefix.is_some() {
                    return Err(meta.error("duplicate `prefix` declaration"));
                }
                let lit: LitStr = meta.value()?.parse()?;
                options.prefix = Some(lit);
                return Ok(());
            }

            for (key, variant) in PROCEDURE_KINDS {
                if meta.path.is_ident(key) {
                    let kind = Ident::new(variant, meta.path.span());
                    if options.procedures.iter().any(|(existing, _)| *existing == kind) {
                        return Err(meta.error(format!(
                            "duplicate `{}` procedure declaration",
                            key
                        )));
                    }
                    let lit: LitStr = meta.value()?.parse()?;
                    options.procedures.push((kind, lit));
                    return Ok(());
                }
            }

            Err(meta.error(
                "Unsupported #[sproc(...)] option. Supported: load_all, load_by_key, insert, update, delete, prefix",
            ))
        })?;
    }

    Ok(options)
}

fn parse_field_options(attrs: &[syn::Attribute]) -> syn::Result<FieldOptions> {
    let mut parsed = FieldOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("sproc") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("key") {
                parsed.key = true;
                return Ok(());
            }

            if meta.path.is_ident("concurrency_token") {
                parsed.concurrency_token = true;
                return Ok(());
            }

            if meta.path.is_ident("never_bind") {
                parsed.never_bind = true;
                return Ok(());
            }

            if meta.path.is_ident("ignore_write") {
                parsed.ignore_write = true;
                return Ok(());
            }

            if meta.path.is_ident("ignore_read") {
                parsed.ignore_read = true;
                return Ok(());
            }

            if meta.path.is_ident("parameter") {
                let lit: LitStr = meta.value()?.parse()?;
                parsed.parameter = Some(lit);
                return Ok(());
            }

            if meta.path.is_ident("column") {
                let lit: LitStr = meta.value()?.parse()?;
                parsed.column = Some(lit);
                return Ok(());
            }

            if meta.path.is_ident("size") {
                let lit: LitInt = meta.value()?.parse()?;
                parsed.size = Some(lit.base10_parse::<u32>()?);
                return Ok(());
            }

            Err(meta.error(
                "Unsupported #[sproc(...)] field option. Supported: key, concurrency_token, never_bind, ignore_write, ignore_read, parameter = \"...\", column = \"...\", size = <u32>",
            ))
        })?;
    }

    Ok(parsed)
}
