//! Attribute-driven object-relational mapping for SQL databases.
//!
//! Entities describe their table mapping with `#[derive(Persistable)]`. The
//! resulting [`Mapping`] drives INSERT/UPDATE/SELECT clause derivation, row
//! mapping and schema validation. A [`BaseRepository`] ties the pieces
//! together over any [`Executor`].
//!
//! # Quick Start
//!
//! ## Define an Entity
//!
//! ```ignore
//! use omnia_orm::{Key, Persistable};
//!
//! #[derive(Debug, Default, Persistable)]
//! #[persist(table = "est_contractor", primary_key = "sc_key")]
//! pub struct Contractor {
//!     pub key: Key,
//!     #[persist(column = "sc_name")]
//!     pub name: Option<String>,
//! }
//!
//! #[derive(Debug, Default, Persistable)]
//! #[persist(table = "est_proposal", primary_key = "pr_key")]
//! pub struct Proposal {
//!     pub key: Key,
//!     #[persist(column = "proposal_name")]
//!     pub prop_name: Option<String>,
//!     #[persist(reference)]
//!     pub contractor: Option<Contractor>,
//!     #[persist(skip)]
//!     pub scratch: Vec<String>,
//! }
//! ```
//!
//! ## Save and Load
//!
//! ```ignore
//! use omnia_orm::{BaseRepository, SqliteExecutor};
//!
//! let repo = BaseRepository::<Proposal, _>::new(SqliteExecutor::connect()?);
//! let key = repo.save(&mut proposal)?.expect("generated key");
//! let loaded = repo.get(&key)?;
//! ```
//!
//! ## Queries
//!
//! ```ignore
//! use omnia_orm::{Direction, SqlQuery, params};
//!
//! let query = SqlQuery::new()
//!     .r#where("proposal_name LIKE ?", params!["%bridge%"])?
//!     .and_where("sc_key = ?", params![4_i64])?
//!     .order_by_column("proposal_name", Direction::Asc)?
//!     .limit(10)?;
//! let proposals = repo.query_entity(&query)?;
//!
//! // arbitrary SQL with a closure mapper
//! let names = repo.query(
//!     &SqlQuery::raw("SELECT sc_name FROM est_contractor", vec![]),
//!     &|row: &dyn RowAccess, _row_num: usize| row.get::<String>("sc_name"),
//! )?;
//! ```
//!
//! ## Custom Types
//!
//! ```ignore
//! impl FetchValue for UserId {
//!     fn fetch(value: &DataType) -> anyhow::Result<Self> {
//!         let id: String = FetchValue::fetch(value)?;
//!         Ok(UserId(id))
//!     }
//! }
//! ```

// lets generated code name this crate as `omnia_orm` from inside it
extern crate self as omnia_orm;

mod clause;
mod entity;
mod error;
mod key;
mod mapper;
mod meta;
mod query;
mod ref_value;
mod repository;
#[cfg(feature = "sqlite")]
mod sqlite;
mod types;
mod validation;

pub use clause::{SqlClause, insert_clause, select_clause, select_list, update_clause};
pub use entity::{Assign, FetchValue, Persistable};
pub use error::{BoxError, Error, Result};
pub use key::{Key, Pair};
pub use mapper::{PersistableRowMapper, RowMapper};
pub use meta::{
    Directives, Mapping, MappingBuilder, Member, MemberDef, MemberKind, PrimaryKeyFn,
    RefDirective, member_name_for_accessor, to_column_name,
};
pub use omnia_orm_macro::Persistable;
pub use query::{Direction, SqlQuery};
pub use ref_value::RefValue;
pub use repository::{BaseRepository, Executor};
// Parameter values for clauses and queries.
pub use sea_query::Value;
#[cfg(feature = "sqlite")]
pub use sqlite::{ConnectOptions, SqliteExecutor};
pub use types::{DataType, Field, Row, RowAccess};
pub use validation::{SchemaSource, SchemaValidator, assert_placeholder_count, count_placeholders};

// Re-exports for `Persistable` derive use only.
#[doc(hidden)]
pub mod __private {
    pub use anyhow;
}
