use proc_macro2::Span;
use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::{
    Attribute, Data, DeriveInput, Error, Fields, GenericArgument, Ident, LitStr, PathArguments,
    PathSegment, Result, Type,
};

/// A struct deriving `Persistable`.
pub struct Entity {
    pub ident: Ident,
    pub table: Option<LitStr>,
    pub primary_key: Option<LitStr>,
    /// The field holding the entity's `Key`.
    pub key: Ident,
    pub members: Vec<Member>,
    pub accessors: Vec<Accessor>,
}

/// Directives declared at one level, as written.
#[derive(Default)]
pub struct Directives {
    pub column: Option<LitStr>,
    pub skip: bool,
    pub reference: Option<Reference>,
}

#[derive(Default)]
pub struct Reference {
    pub value: Option<LitStr>,
    pub label: Option<LitStr>,
}

/// Struct-level directives for a member, addressed by accessor name.
pub struct Accessor {
    pub name: LitStr,
    pub directives: Directives,
}

pub struct Member {
    pub ident: Ident,
    pub name: String,
    pub ty: Type,
    pub kind: Kind,
    pub directives: Directives,
    /// Skipped at either level. No accessors are generated for it.
    pub skipped: bool,
}

pub enum Kind {
    Scalar,
    Reference { target: Type, optional: bool },
    Labeled { optional: bool },
}

impl TryFrom<DeriveInput> for Entity {
    type Error = Error;

    fn try_from(input: DeriveInput) -> Result<Self> {
        if !input.generics.params.is_empty() {
            return Err(Error::new_spanned(
                &input.generics,
                "`Persistable` cannot be derived for generic types",
            ));
        }
        let Data::Struct(data) = input.data else {
            return Err(Error::new_spanned(&input.ident, "`Persistable` can only be derived for structs"));
        };
        let Fields::Named(fields) = data.fields else {
            return Err(Error::new_spanned(&input.ident, "`Persistable` requires named fields"));
        };

        let mut table = None;
        let mut primary_key = None;
        let mut accessors = Vec::new();
        for attr in persist_attrs(&input.attrs) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("table") {
                    table = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("primary_key") {
                    primary_key = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("accessor") {
                    accessors.push(parse_accessor(&meta)?);
                } else {
                    return Err(meta.error("expected `table`, `primary_key` or `accessor`"));
                }
                Ok(())
            })?;
        }

        let mut key: Option<Ident> = None;
        let mut members = Vec::new();
        for field in fields.named {
            let Some(ident) = field.ident else {
                continue;
            };
            let (directives, key_attr) = parse_field(&field.attrs)?;

            if key_attr || is_type(&field.ty, "Key") {
                if key.is_some() {
                    return Err(Error::new_spanned(&ident, "cannot specify second `Key` field"));
                }
                key = Some(ident);
                continue;
            }
            members.push(Member::new(ident, field.ty, directives, &accessors));
        }

        let Some(key) = key else {
            return Err(Error::new(Span::call_site(), "missing a field of type `Key`"));
        };

        Ok(Self {
            ident: input.ident,
            table,
            primary_key,
            key,
            members,
            accessors,
        })
    }
}

impl Member {
    fn new(ident: Ident, ty: Type, directives: Directives, accessors: &[Accessor]) -> Self {
        let name = ident.unraw().to_string();
        let accessor = accessors.iter().find(|accessor| {
            column_name(&member_name_for_accessor(&accessor.name.value())) == column_name(&name)
        });

        let skipped = directives.skip || accessor.is_some_and(|accessor| accessor.directives.skip);
        let referenced = directives.reference.is_some()
            || accessor.is_some_and(|accessor| accessor.directives.reference.is_some());

        let kind = if let Some(optional) = labeled(&ty) {
            Kind::Labeled { optional }
        } else if referenced {
            match option_inner(&ty) {
                Some(inner) => Kind::Reference {
                    target: inner.clone(),
                    optional: true,
                },
                None => Kind::Reference {
                    target: ty.clone(),
                    optional: false,
                },
            }
        } else {
            Kind::Scalar
        };

        Self {
            ident,
            name,
            ty,
            kind,
            directives,
            skipped,
        }
    }
}

fn persist_attrs(attrs: &[Attribute]) -> impl Iterator<Item = &Attribute> {
    attrs.iter().filter(|attr| attr.path().is_ident("persist"))
}

// Field-level `#[persist(..)]`; returns the directives and whether the field
// is marked as the key holder.
fn parse_field(attrs: &[Attribute]) -> Result<(Directives, bool)> {
    let mut directives = Directives::default();
    let mut key = false;

    for attr in persist_attrs(attrs) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("key") {
                key = true;
                Ok(())
            } else {
                parse_directive(&meta, &mut directives)
            }
        })?;
    }
    Ok((directives, key))
}

// accessor(name = "getDistance", column = "dist", skip, reference(..))
fn parse_accessor(meta: &ParseNestedMeta) -> Result<Accessor> {
    let mut name: Option<LitStr> = None;
    let mut directives = Directives::default();

    meta.parse_nested_meta(|nested| {
        if nested.path.is_ident("name") {
            name = Some(nested.value()?.parse()?);
            Ok(())
        } else {
            parse_directive(&nested, &mut directives)
        }
    })?;

    let Some(name) = name else {
        return Err(meta.error("accessor requires `name = \"..\"`"));
    };
    Ok(Accessor { name, directives })
}

fn parse_directive(meta: &ParseNestedMeta, directives: &mut Directives) -> Result<()> {
    if meta.path.is_ident("column") {
        directives.column = Some(meta.value()?.parse()?);
    } else if meta.path.is_ident("skip") {
        directives.skip = true;
    } else if meta.path.is_ident("reference") {
        let mut reference = Reference::default();
        if meta.input.peek(syn::token::Paren) {
            meta.parse_nested_meta(|nested| {
                if nested.path.is_ident("value") {
                    reference.value = Some(nested.value()?.parse()?);
                } else if nested.path.is_ident("label") {
                    reference.label = Some(nested.value()?.parse()?);
                } else {
                    return Err(nested.error("expected `value` or `label`"));
                }
                Ok(())
            })?;
        }
        directives.reference = Some(reference);
    } else {
        return Err(meta.error("expected `column`, `skip`, `reference` or `key`"));
    }
    Ok(())
}

fn last_segment(ty: &Type) -> Option<&PathSegment> {
    match ty {
        Type::Path(path) if path.qself.is_none() => path.path.segments.last(),
        _ => None,
    }
}

fn is_type(ty: &Type, name: &str) -> bool {
    last_segment(ty).is_some_and(|segment| segment.ident == name && segment.arguments.is_none())
}

fn option_inner(ty: &Type) -> Option<&Type> {
    let segment = last_segment(ty).filter(|segment| segment.ident == "Option")?;
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first() {
        Some(GenericArgument::Type(inner)) => Some(inner),
        _ => None,
    }
}

// `Some(optional)` for `RefValue` and `Option<RefValue>` members.
fn labeled(ty: &Type) -> Option<bool> {
    if is_type(ty, "RefValue") {
        return Some(false);
    }
    option_inner(ty).filter(|inner| is_type(inner, "RefValue")).map(|_| true)
}

// Must match `omnia_orm::to_column_name` and `member_name_for_accessor`:
// the generated accessors and the runtime mapping resolve the same members.
// `crates/orm/tests/clause.rs` checks derived entities against their mapping.
fn column_name(name: &str) -> String {
    let mut column = String::with_capacity(name.len() + 4);
    let mut previous_lower = false;
    for ch in name.chars() {
        if previous_lower && ch.is_ascii_uppercase() {
            column.push('_');
        }
        previous_lower = ch.is_ascii_lowercase();
        column.push(ch.to_ascii_lowercase());
    }
    column
}

fn member_name_for_accessor(accessor: &str) -> String {
    let stripped = ["get", "is"].iter().find_map(|prefix| {
        accessor
            .strip_prefix(prefix)
            .filter(|rest| rest.chars().next().is_some_and(|ch| ch.is_ascii_uppercase()))
    });
    let Some(rest) = stripped else {
        return accessor.to_string();
    };
    let mut chars = rest.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_ascii_lowercase().to_string() + chars.as_str()
    })
}
