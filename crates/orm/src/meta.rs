//! Mapping metadata.
//!
//! A [`Mapping`] is the resolved description of how a struct maps onto a
//! table: its table name, primary-key column and, for every member, the
//! effective column override, skip flag and reference directives. It is
//! built once per type (normally by `#[derive(Persistable)]`) through a
//! [`MappingBuilder`] and shared by clause derivation, row mapping and
//! schema validation.
//!
//! Directives can be declared at two levels. Member-level directives sit on
//! the struct field; accessor-level directives are declared on the struct by
//! accessor name and take priority. Each directive resolves independently:
//! the accessor-level declaration wins, then the member-level one.

use crate::error::{Error, Result};

/// Returns the primary-key column of a referenced type, if it declares one.
pub type PrimaryKeyFn = fn() -> Option<&'static str>;

/// Foreign reference directive.
///
/// Entity references usually leave both columns unset. Labeled references
/// (`RefValue` members) name the foreign-key column and the label column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefDirective {
    pub value: Option<String>,
    pub label: Option<String>,
}

/// Directives declared for a member at one level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    pub column: Option<String>,
    pub skip: bool,
    pub reference: Option<RefDirective>,
}

impl Directives {
    /// Overlays `self` (accessor level) on `fallback` (member level).
    fn over(self, fallback: Self) -> Self {
        Self {
            column: self.column.or(fallback.column),
            skip: self.skip || fallback.skip,
            reference: self.reference.or(fallback.reference),
        }
    }
}

/// How a member is persisted.
#[derive(Debug, Clone, Copy)]
pub enum MemberKind {
    /// A plain column value.
    Scalar,
    /// Another mapped type, persisted by identity.
    Reference(PrimaryKeyFn),
    /// A `RefValue`: foreign key plus label.
    Labeled,
}

/// Member-level declaration handed to a [`MappingBuilder`].
#[derive(Debug, Clone)]
pub struct MemberDef {
    name: String,
    kind: MemberKind,
    directives: Directives,
}

impl MemberDef {
    /// A plain column member.
    #[must_use]
    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new(name, MemberKind::Scalar)
    }

    /// A reference to another mapped type.
    #[must_use]
    pub fn reference(name: impl Into<String>, target_primary_key: PrimaryKeyFn) -> Self {
        let mut def = Self::new(name, MemberKind::Reference(target_primary_key));
        def.directives.reference = Some(RefDirective::default());
        def
    }

    /// A labeled foreign value.
    #[must_use]
    pub fn labeled(name: impl Into<String>) -> Self {
        Self::new(name, MemberKind::Labeled)
    }

    fn new(name: impl Into<String>, kind: MemberKind) -> Self {
        Self {
            name: name.into(),
            kind,
            directives: Directives::default(),
        }
    }

    /// Sets the column override.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.directives.column = Some(column.into());
        self
    }

    /// Excludes the member from persistence.
    #[must_use]
    pub const fn skip(mut self) -> Self {
        self.directives.skip = true;
        self
    }

    /// Sets the foreign-key and label columns of a labeled reference.
    #[must_use]
    pub fn ref_columns(mut self, value: Option<&str>, label: Option<&str>) -> Self {
        self.directives.reference = Some(RefDirective {
            value: value.map(ToString::to_string),
            label: label.map(ToString::to_string),
        });
        self
    }
}

/// Collects declarations for one type and resolves them into a [`Mapping`].
#[derive(Debug)]
pub struct MappingBuilder {
    entity: &'static str,
    table: Option<String>,
    primary_key: Option<String>,
    members: Vec<MemberDef>,
    accessors: Vec<(String, Directives)>,
}

impl MappingBuilder {
    /// Sets an explicit table name.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Declares the primary-key column.
    #[must_use]
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    /// Adds a member declaration.
    #[must_use]
    pub fn member(mut self, def: MemberDef) -> Self {
        self.members.push(def);
        self
    }

    /// Adds accessor-level directives. `name` may be a member name or a
    /// bean-style accessor name such as `getPropName`.
    #[must_use]
    pub fn accessor(mut self, name: impl Into<String>, directives: Directives) -> Self {
        self.accessors.push((name.into(), directives));
        self
    }

    /// Resolves every member's effective directives.
    #[must_use]
    pub fn build(self) -> Mapping {
        let Self {
            entity,
            table,
            primary_key,
            members,
            mut accessors,
        } = self;

        let mut resolved: Vec<Member> = members
            .into_iter()
            .map(|def| {
                let column = to_column_name(&def.name);
                let accessor = accessors
                    .iter()
                    .position(|(name, _)| to_column_name(&member_name_for_accessor(name)) == column)
                    .map(|index| accessors.swap_remove(index).1);

                let directives = match accessor {
                    Some(accessor) => accessor.over(def.directives),
                    None => def.directives,
                };

                if matches!(def.kind, MemberKind::Scalar) && directives.reference.is_some() {
                    tracing::warn!(
                        entity,
                        member = %def.name,
                        "reference directive on a scalar member is ignored"
                    );
                }

                Member {
                    name: def.name,
                    kind: def.kind,
                    column: directives.column,
                    skip: directives.skip,
                    reference: directives.reference,
                }
            })
            .collect();

        for (name, _) in &accessors {
            tracing::warn!(entity, accessor = %name, "accessor directives match no member");
        }

        resolved.sort_by(|a, b| a.name.cmp(&b.name));

        Mapping {
            entity,
            table: table.unwrap_or_else(|| to_column_name(entity)),
            primary_key,
            members: resolved,
        }
    }
}

/// Resolved mapping of a type onto a table.
#[derive(Debug)]
pub struct Mapping {
    entity: &'static str,
    table: String,
    primary_key: Option<String>,
    members: Vec<Member>,
}

impl Mapping {
    /// Starts a mapping for the named type.
    #[must_use]
    pub const fn builder(entity: &'static str) -> MappingBuilder {
        MappingBuilder {
            entity,
            table: None,
            primary_key: None,
            members: Vec::new(),
            accessors: Vec::new(),
        }
    }

    /// Type name.
    #[must_use]
    pub const fn entity(&self) -> &'static str {
        self.entity
    }

    /// Table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Declared primary-key column.
    #[must_use]
    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    /// All members ordered by name, skipped ones included.
    #[must_use]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Members taking part in persistence, ordered by name.
    pub fn persisted(&self) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(|member| !member.skip)
    }

    /// Looks up a member by name.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|member| member.name == name)
    }
}

/// A member with its resolved directives.
#[derive(Debug)]
pub struct Member {
    name: String,
    kind: MemberKind,
    column: Option<String>,
    skip: bool,
    reference: Option<RefDirective>,
}

impl Member {
    /// Member (field) name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How the member is persisted.
    #[must_use]
    pub const fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Explicit column override.
    #[must_use]
    pub fn column_override(&self) -> Option<&str> {
        self.column.as_deref()
    }

    /// Whether the member is excluded from persistence.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        self.skip
    }

    /// Whether the member is a plain value.
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        matches!(self.kind, MemberKind::Scalar)
    }

    /// Primary-key column of the referenced type. `None` for non-reference
    /// members and for targets without a declared primary key.
    #[must_use]
    pub fn target_primary_key(&self) -> Option<&'static str> {
        match self.kind {
            MemberKind::Reference(primary_key) => primary_key(),
            MemberKind::Scalar | MemberKind::Labeled => None,
        }
    }

    /// Value and label columns of a labeled member. The label falls back to
    /// the column override.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when either column is undeclared.
    pub fn labeled_columns(&self, entity: &str) -> Result<(&str, &str)> {
        let directive = self.reference.as_ref();
        let value = directive.and_then(|reference| reference.value.as_deref());
        let label = directive.and_then(|reference| reference.label.as_deref()).or(self.column.as_deref());

        match (value, label) {
            (Some(value), Some(label)) => Ok((value, label)),
            _ => Err(Error::Configuration(format!(
                "RefValue member {entity}.{} requires both a value column and a label column",
                self.name
            ))),
        }
    }

    /// Column written by INSERT and UPDATE. A labeled member always writes
    /// its declared value column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an incompletely declared labeled
    /// member.
    pub fn column_name(&self, entity: &str) -> Result<String> {
        match (&self.column, self.kind) {
            (_, MemberKind::Labeled) => {
                self.labeled_columns(entity).map(|(value, _)| value.to_string())
            }
            (Some(column), MemberKind::Reference(_) | MemberKind::Scalar) => Ok(column.clone()),
            (None, MemberKind::Reference(_)) => Ok(self.reference_column()),
            (None, MemberKind::Scalar) => Ok(to_column_name(&self.name)),
        }
    }

    /// Expression contributed to a SELECT list, `None` for labeled members.
    #[must_use]
    pub fn select_expr(&self) -> Option<String> {
        match (&self.column, self.kind) {
            (_, MemberKind::Labeled) => None,
            (Some(column), MemberKind::Reference(_)) => Some(column.clone()),
            (Some(column), MemberKind::Scalar) => {
                Some(format!("{column} as \"{}\"", to_column_name(&self.name)))
            }
            (None, MemberKind::Reference(_)) => Some(self.reference_column()),
            (None, MemberKind::Scalar) => Some(to_column_name(&self.name)),
        }
    }

    fn reference_column(&self) -> String {
        self.target_primary_key()
            .map_or_else(|| format!("{}_id", to_column_name(&self.name)), ToString::to_string)
    }
}

/// Converts a camel-case name to its column name by inserting `_` between a
/// lowercase letter and a following uppercase run, then lowercasing.
#[must_use]
pub fn to_column_name(name: &str) -> String {
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

/// Maps a bean-style accessor name to its member name: `getPropName` becomes
/// `propName`, `isActive` becomes `active`. Other names are returned as is.
#[must_use]
pub fn member_name_for_accessor(accessor: &str) -> String {
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
