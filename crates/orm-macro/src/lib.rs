//! Derive macro for `omnia_orm::Persistable`.

mod expand;
mod persist;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derives `Persistable` from `#[persist(..)]` attributes.
///
/// The struct needs exactly one field of type `Key` (or one marked
/// `#[persist(key)]`) and must implement `Default`.
///
/// Struct-level options:
/// - `table = ".."`: table name, defaults to the snake-cased struct name.
/// - `primary_key = ".."`: primary-key column.
/// - `accessor(name = "..", ..)`: directives for the member behind an
///   accessor name such as `getPropName`; they take priority over the
///   member's own directives.
///
/// Member-level options:
/// - `column = ".."`: column override.
/// - `skip`: not persisted.
/// - `reference`: the member is another `Persistable` type (optionally in an
///   `Option`) persisted by its primary key.
/// - `reference(value = "..", label = "..")`: foreign-key and label columns
///   of a `RefValue` member.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Default, Persistable)]
/// #[persist(table = "est_proposal", primary_key = "pr_key")]
/// #[persist(accessor(name = "getDistance", column = "dist"))]
/// pub struct Proposal {
///     pub key: Key,
///     #[persist(column = "proposal_name")]
///     pub prop_name: Option<String>,
///     pub distance: Option<i32>,
///     #[persist(reference)]
///     pub contractor: Option<Contractor>,
///     #[persist(skip)]
///     pub tasks: Vec<ProposalTask>,
/// }
/// ```
#[proc_macro_derive(Persistable, attributes(persist))]
pub fn persistable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match persist::Entity::try_from(input) {
        Ok(entity) => expand::expand(&entity).into(),
        Err(e) => e.into_compile_error().into(),
    }
}
