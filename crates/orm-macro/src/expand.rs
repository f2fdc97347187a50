//! # Persistable expansion
//!
//! Generates the `Persistable` impl: a lazily built `Mapping` plus `read`
//! and `write` dispatch over the non-skipped members.

use proc_macro2::TokenStream;
use quote::quote;
use syn::LitStr;
use syn::ext::IdentExt;

use crate::persist::{Accessor, Directives, Entity, Kind, Member};

pub fn expand(entity: &Entity) -> TokenStream {
    let ident = &entity.ident;
    let entity_name = ident.unraw().to_string();
    let key = &entity.key;

    let table = entity.table.as_ref().map(|table| quote! { .table(#table) });
    let primary_key = entity.primary_key.as_ref().map(|column| quote! { .primary_key(#column) });
    let members = entity.members.iter().map(member_def);
    let accessors = entity.accessors.iter().map(accessor);

    let persisted: Vec<&Member> = entity.members.iter().filter(|member| !member.skipped).collect();
    let read_arms = persisted.iter().map(|member| read_arm(member));
    let write_arms = persisted.iter().map(|member| write_arm(member));

    quote! {
        #[automatically_derived]
        impl ::omnia_orm::Persistable for #ident {
            fn mapping() -> &'static ::omnia_orm::Mapping {
                static MAPPING: ::std::sync::OnceLock<::omnia_orm::Mapping> =
                    ::std::sync::OnceLock::new();
                MAPPING.get_or_init(|| {
                    ::omnia_orm::Mapping::builder(#entity_name)
                        #table
                        #primary_key
                        #(.member(#members))*
                        #(.accessor(#accessors))*
                        .build()
                })
            }

            fn key(&self) -> &::omnia_orm::Key {
                &self.#key
            }

            fn set_key(&mut self, key: ::omnia_orm::Key) {
                self.#key = key;
            }

            fn read(
                &self, member: &str,
            ) -> ::omnia_orm::__private::anyhow::Result<::std::option::Option<::omnia_orm::Value>> {
                match member {
                    #(#read_arms)*
                    other => ::omnia_orm::__private::anyhow::bail!(
                        "{} has no persisted member '{}'", #entity_name, other
                    ),
                }
            }

            #[allow(unused_variables, unreachable_code)]
            fn write(
                &mut self, member: &str, value: ::omnia_orm::Assign<'_>,
            ) -> ::omnia_orm::__private::anyhow::Result<()> {
                match member {
                    #(#write_arms)*
                    other => ::omnia_orm::__private::anyhow::bail!(
                        "{} has no persisted member '{}'", #entity_name, other
                    ),
                }
                ::std::result::Result::Ok(())
            }
        }
    }
}

fn member_def(member: &Member) -> TokenStream {
    let name = &member.name;
    let def = match &member.kind {
        Kind::Scalar => quote! { ::omnia_orm::MemberDef::scalar(#name) },
        Kind::Reference { target, .. } => quote! {
            ::omnia_orm::MemberDef::reference(#name, || {
                <#target as ::omnia_orm::Persistable>::mapping().primary_key()
            })
        },
        Kind::Labeled { .. } => quote! { ::omnia_orm::MemberDef::labeled(#name) },
    };

    let Directives {
        column,
        skip,
        reference,
    } = &member.directives;
    let column = column.as_ref().map(|column| quote! { .column(#column) });
    let skip = skip.then(|| quote! { .skip() });
    let reference = reference
        .as_ref()
        .filter(|reference| reference.value.is_some() || reference.label.is_some())
        .map(|reference| {
            let value = optional_str(reference.value.as_ref());
            let label = optional_str(reference.label.as_ref());
            quote! { .ref_columns(#value, #label) }
        });

    quote! { #def #column #skip #reference }
}

fn accessor(accessor: &Accessor) -> TokenStream {
    let name = &accessor.name;
    let Directives {
        column,
        skip,
        reference,
    } = &accessor.directives;

    let column = match column {
        Some(column) => quote! { ::std::option::Option::Some(::std::string::ToString::to_string(#column)) },
        None => quote! { ::std::option::Option::None },
    };
    let reference = match reference {
        Some(reference) => {
            let value = optional_string(reference.value.as_ref());
            let label = optional_string(reference.label.as_ref());
            quote! {
                ::std::option::Option::Some(::omnia_orm::RefDirective { value: #value, label: #label })
            }
        }
        None => quote! { ::std::option::Option::None },
    };

    quote! {
        #name,
        ::omnia_orm::Directives { column: #column, skip: #skip, reference: #reference }
    }
}

fn read_arm(member: &Member) -> TokenStream {
    let name = &member.name;
    let field = &member.ident;

    let value = match &member.kind {
        Kind::Scalar => quote! {
            ::std::option::Option::Some(::omnia_orm::Value::from(::std::clone::Clone::clone(&self.#field)))
        },
        // an unset or unsaved reference is omitted
        Kind::Reference { target, optional: true } => quote! {
            self.#field
                .as_ref()
                .and_then(<#target as ::omnia_orm::Persistable>::id)
                .map(::omnia_orm::Value::from)
        },
        Kind::Reference { target, optional: false } => quote! {
            <#target as ::omnia_orm::Persistable>::id(&self.#field).map(::omnia_orm::Value::from)
        },
        Kind::Labeled { optional: true } => quote! {
            self.#field.as_ref().map(|value| ::omnia_orm::Value::from(value.id()))
        },
        Kind::Labeled { optional: false } => quote! {
            ::std::option::Option::Some(::omnia_orm::Value::from(self.#field.id()))
        },
    };

    quote! { #name => ::std::result::Result::Ok(#value), }
}

fn write_arm(member: &Member) -> TokenStream {
    let name = &member.name;
    let field = &member.ident;
    let ty = &member.ty;

    let value = match &member.kind {
        Kind::Scalar => quote! { value.cell::<#ty>()? },
        Kind::Reference { target, optional: true } => {
            quote! { ::std::option::Option::Some(value.reference::<#target>()?) }
        }
        Kind::Reference { target, optional: false } => quote! { value.reference::<#target>()? },
        Kind::Labeled { optional: true } => quote! { ::std::option::Option::Some(value.labeled()?) },
        Kind::Labeled { optional: false } => quote! { value.labeled()? },
    };

    quote! { #name => self.#field = #value, }
}

fn optional_str(value: Option<&LitStr>) -> TokenStream {
    value.map_or_else(
        || quote! { ::std::option::Option::None },
        |value| quote! { ::std::option::Option::Some(#value) },
    )
}

fn optional_string(value: Option<&LitStr>) -> TokenStream {
    value.map_or_else(
        || quote! { ::std::option::Option::None },
        |value| quote! { ::std::option::Option::Some(::std::string::ToString::to_string(#value)) },
    )
}
