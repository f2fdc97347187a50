//! Row to entity reconstruction.

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;

use crate::entity::{Assign, FetchValue, Persistable};
use crate::error::{Error, Result};
use crate::key::Key;
use crate::meta::{Mapping, Member, MemberKind};
use crate::ref_value::RefValue;
use crate::types::RowAccess;

/// Turns the current row of a result set into a value.
pub trait RowMapper<E> {
    /// Maps the row at (0-based) position `row_num`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Mapping`] if the row cannot be mapped.
    fn map_row(&self, row: &dyn RowAccess, row_num: usize) -> Result<E>;
}

/// Closures map rows with `anyhow` errors; failures are reported as
/// [`Error::Mapping`] unless they already are crate errors.
impl<E, F> RowMapper<E> for F
where
    F: Fn(&dyn RowAccess, usize) -> anyhow::Result<E>,
{
    fn map_row(&self, row: &dyn RowAccess, row_num: usize) -> Result<E> {
        self(row, row_num).map_err(|err| match err.downcast::<Error>() {
            Ok(err) => err,
            Err(err) => Error::Mapping {
                row: row_num,
                entity: std::any::type_name::<E>(),
                message: format!("{err:#}"),
                source: Some(err.into()),
            },
        })
    }
}

static MAPPERS: LazyLock<DashMap<TypeId, Arc<dyn Any + Send + Sync>>> = LazyLock::new(DashMap::new);

/// Maps rows onto a [`Persistable`] type using its [`Mapping`].
///
/// Each row is mapped onto a fresh `E::default()` in four steps: scalar
/// members are bound from columns whose labels match their names
/// (case-insensitive, underscores ignored); the primary key is read from the
/// declared primary-key column; references and labeled references are
/// rebuilt from their foreign-key columns; finally scalar members with a
/// column override that were not bound by name are read from that column.
#[derive(Debug)]
pub struct PersistableRowMapper<E> {
    mapping: &'static Mapping,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Persistable> PersistableRowMapper<E> {
    /// Shared mapper for `E`, created on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] if the cache entry for `E` holds another type.
    pub fn of() -> Result<Arc<Self>> {
        let cached = MAPPERS
            .entry(TypeId::of::<E>())
            .or_insert_with(|| {
                tracing::debug!(entity = E::mapping().entity(), "caching row mapper");
                Arc::new(Self::new()) as Arc<dyn Any + Send + Sync>
            })
            .clone();

        cached.downcast::<Self>().map_err(|_| {
            Error::State(format!("row mapper cache is corrupt for {}", std::any::type_name::<E>()))
        })
    }

    /// An uncached mapper.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mapping: E::mapping(),
            _marker: PhantomData,
        }
    }

    fn populate(&self, row: &dyn RowAccess, row_num: usize) -> Result<E> {
        let cx = Context {
            row,
            row_num,
            entity: self.mapping.entity(),
        };
        let mut entity = E::default();

        let bound = self.bind_by_name(&cx, &mut entity)?;
        self.assign_primary_key(&cx, &mut entity)?;
        self.assign_references(&cx, &mut entity)?;
        self.assign_named(&cx, &mut entity, &bound)?;

        Ok(entity)
    }

    fn bind_by_name<'m>(&'m self, cx: &Context<'_>, entity: &mut E) -> Result<Vec<&'m str>> {
        let labels: Vec<(usize, String)> = (0..cx.row.column_count())
            .filter_map(|index| cx.row.column_label(index).map(|label| (index, normalize(label))))
            .collect();

        let mut bound = Vec::new();
        for member in self.mapping.persisted().filter(|member| member.is_scalar()) {
            let wanted = normalize(member.name());
            let Some(&(index, _)) = labels.iter().find(|(_, label)| *label == wanted) else {
                continue;
            };
            cx.assign_cell(entity, member, index)?;
            bound.push(member.name());
        }
        Ok(bound)
    }

    fn assign_primary_key(&self, cx: &Context<'_>, entity: &mut E) -> Result<()> {
        let Some(primary_key) = self.mapping.primary_key() else {
            return Ok(());
        };

        let context = format!("primary key mapping for {}", cx.entity);
        let index = cx.require(primary_key, &context)?;
        let id: i64 = cx.fetch(index, primary_key)?;
        entity.set_key(Key::of(primary_key, id));
        Ok(())
    }

    fn assign_references(&self, cx: &Context<'_>, entity: &mut E) -> Result<()> {
        for member in self.mapping.persisted() {
            match member.kind() {
                MemberKind::Reference(_) => {
                    let Some(target_key) = member.target_primary_key() else {
                        continue;
                    };
                    let column = member.column_override().unwrap_or(target_key);
                    let context = format!("reference mapping for {}.{}", cx.entity, member.name());
                    let index = cx.require(column, &context)?;

                    // a NULL foreign key leaves the member unset
                    if let Some(id) = cx.fetch::<Option<i64>>(index, column)? {
                        cx.write(entity, member, column, Assign::Reference(Key::of(target_key, id)))?;
                    }
                }
                MemberKind::Labeled => {
                    let (value_column, label_column) = member.labeled_columns(cx.entity)?;
                    let context = format!("reference mapping for {}.{}", cx.entity, member.name());
                    let value_index = cx.require(value_column, &context)?;
                    let context =
                        format!("reference label mapping for {}.{}", cx.entity, member.name());
                    let label_index = cx.require(label_column, &context)?;

                    let id = cx.fetch::<Option<i64>>(value_index, value_column)?;
                    let label = cx.fetch::<Option<String>>(label_index, label_column)?;
                    if let Some(id) = id {
                        let value = RefValue::new(label.unwrap_or_default(), value_column, id);
                        cx.write(entity, member, value_column, Assign::Labeled(value))?;
                    }
                }
                MemberKind::Scalar => {}
            }
        }
        Ok(())
    }

    fn assign_named(&self, cx: &Context<'_>, entity: &mut E, bound: &[&str]) -> Result<()> {
        let named = self
            .mapping
            .persisted()
            .filter(|member| member.is_scalar() && !bound.contains(&member.name()));

        for member in named {
            let Some(column) = member.column_override() else {
                continue;
            };
            match cx.row.find(column) {
                Some(index) => cx.assign_cell(entity, member, index)?,
                None => tracing::debug!(
                    entity = cx.entity,
                    member = member.name(),
                    column,
                    "result set is missing the member's column"
                ),
            }
        }
        Ok(())
    }
}

impl<E: Persistable> Default for PersistableRowMapper<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Persistable> RowMapper<E> for PersistableRowMapper<E> {
    fn map_row(&self, row: &dyn RowAccess, row_num: usize) -> Result<E> {
        self.populate(row, row_num).inspect_err(|err| {
            tracing::error!(entity = self.mapping.entity(), row = row_num, error = %err, "failed to map row");
        })
    }
}

struct Context<'a> {
    row: &'a dyn RowAccess,
    row_num: usize,
    entity: &'static str,
}

impl Context<'_> {
    fn require(&self, column: &str, context: &str) -> Result<usize> {
        self.row.find(column).ok_or_else(|| {
            Error::mapping(
                self.row_num,
                self.entity,
                format!("{context}: column '{column}' not present in result set"),
            )
        })
    }

    fn fetch<T: FetchValue>(&self, index: usize, column: &str) -> Result<T> {
        self.row.value(index).and_then(|value| T::fetch(&value)).map_err(|err| {
            self.failure(format!("failed to read column '{column}': {err:#}"), err)
        })
    }

    fn assign_cell<E: Persistable>(&self, entity: &mut E, member: &Member, index: usize) -> Result<()> {
        let column = self.row.column_label(index).unwrap_or_default().to_string();
        let value = self.row.value(index).map_err(|err| {
            self.failure(format!("failed to read column '{column}': {err:#}"), err)
        })?;
        self.write(entity, member, &column, Assign::Cell(&value))
    }

    fn write<E: Persistable>(
        &self, entity: &mut E, member: &Member, column: &str, value: Assign<'_>,
    ) -> Result<()> {
        entity.write(member.name(), value).map_err(|err| {
            self.failure(
                format!(
                    "failed to assign {}.{} from column '{column}': {err:#}",
                    self.entity,
                    member.name()
                ),
                err,
            )
        })
    }

    fn failure(&self, message: String, err: anyhow::Error) -> Error {
        Error::Mapping {
            row: self.row_num,
            entity: self.entity,
            message,
            source: Some(err.into()),
        }
    }
}

/// Lowercases and drops underscores, so `prop_name` matches `PropName`.
fn normalize(name: &str) -> String {
    name.chars().filter(|ch| *ch != '_').map(|ch| ch.to_ascii_lowercase()).collect()
}
