//! Fluent builder for parameterized query tails.

use std::fmt;

use sea_query::Value;

use crate::clause::SqlClause;
use crate::entity::is_null_value;
use crate::error::{Error, Result};
use crate::validation::assert_placeholder_count;

/// Builds a `Vec<Value>` of query parameters.
///
/// ```ignore
/// let query = SqlQuery::new().r#where("sc_name = ? AND phone1 = ?", params!["Acme", "555"])?;
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($value)),+]
    };
}

/// Sort direction for [`SqlQuery::order_by_column`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => f.write_str("asc"),
            Self::Desc => f.write_str("desc"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connective {
    Where,
    And,
    Or,
    Raw,
}

#[derive(Debug, Clone)]
struct Condition {
    connective: Connective,
    fragment: String,
    values: Vec<Value>,
}

impl Condition {
    fn render(&self, first: bool) -> String {
        match self.connective {
            Connective::Raw => self.fragment.clone(),
            Connective::Where if first => self.fragment.clone(),
            Connective::Where | Connective::And => format!("AND {}", self.fragment),
            Connective::Or => format!("OR {}", self.fragment),
        }
    }
}

#[derive(Debug, Clone)]
struct OrderBy {
    expression: String,
    direction: Option<Direction>,
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Some(direction) => write!(f, "{} {direction}", self.expression),
            None => f.write_str(&self.expression),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Composed {
    select: Option<String>,
    body: Vec<SqlClause>,
    conditions: Vec<Condition>,
    order: Vec<OrderBy>,
    limit: Option<i64>,
    offset: Option<i64>,
    primary_key: Option<String>,
}

#[derive(Debug, Clone)]
enum Mode {
    Raw { sql: String, values: Vec<Value> },
    Composed(Composed),
}

/// A query tail (or a full raw statement) with positional parameters.
///
/// Composed queries are assembled from an optional SELECT override, body
/// clauses, WHERE conditions, ordering and pagination. Raw queries carry
/// verbatim SQL and cannot be changed after construction.
///
/// ```ignore
/// let query = SqlQuery::new()
///     .r#where("sc_name = ?", params!["Acme"])?
///     .and_where("email IS NOT NULL", params![])?
///     .order_by_column("sc_name", Direction::Desc)?
///     .paginate(10, 20)?;
///
/// assert_eq!(
///     query.sql(),
///     "WHERE sc_name = ? AND email IS NOT NULL ORDER BY sc_name desc LIMIT 10 OFFSET 20"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct SqlQuery {
    mode: Mode,
}

impl Default for SqlQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlQuery {
    /// An empty composed query.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: Mode::Composed(Composed::default()),
        }
    }

    /// A raw query. The SQL is used verbatim.
    #[must_use]
    pub fn raw(sql: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            mode: Mode::Raw {
                sql: sql.into(),
                values,
            },
        }
    }

    fn composed(&mut self, operation: &str) -> Result<&mut Composed> {
        match &mut self.mode {
            Mode::Composed(composed) => Ok(composed),
            Mode::Raw { .. } => {
                Err(Error::State(format!("cannot apply {operation} to a raw SqlQuery")))
            }
        }
    }

    /// Appends a body clause such as `FROM ..` or `JOIN ..`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] on a raw query.
    pub fn clause(mut self, clause: &str, values: Vec<Value>) -> Result<Self> {
        self.composed("clause")?.body.push(SqlClause::new(clause.trim(), sanitize(values)));
        Ok(self)
    }

    /// Replaces the SELECT segment verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] on a raw query.
    pub fn select(mut self, select: &str) -> Result<Self> {
        self.composed("select")?.select = Some(select.trim().to_string());
        Ok(self)
    }

    /// Sets `SELECT c1, c2`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] if no column is given, [`Error::State`] on
    /// a raw query.
    pub fn select_columns(self, columns: &[&str]) -> Result<Self> {
        self.select_with("SELECT", columns)
    }

    /// Sets `SELECT DISTINCT c1, c2`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] if no column is given, [`Error::State`] on
    /// a raw query.
    pub fn select_distinct(self, columns: &[&str]) -> Result<Self> {
        self.select_with("SELECT DISTINCT", columns)
    }

    fn select_with(mut self, keyword: &str, columns: &[&str]) -> Result<Self> {
        let composed = self.composed("select")?;
        let columns: Vec<&str> =
            columns.iter().map(|column| column.trim()).filter(|column| !column.is_empty()).collect();
        if columns.is_empty() {
            return Err(Error::Argument("at least one column must be specified".to_string()));
        }
        composed.select = Some(format!("{keyword} {}", columns.join(", ")));
        Ok(self)
    }

    /// Appends `FROM <table>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] on a raw query.
    pub fn from(self, table: &str) -> Result<Self> {
        self.clause(&format!("FROM {}", table.trim()), Vec::new())
    }

    /// Appends a join expression verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] on a raw query.
    pub fn join(self, join: &str) -> Result<Self> {
        self.clause(join, Vec::new())
    }

    /// Adds a WHERE condition. Later `where` conditions are joined with AND.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] on a raw query.
    pub fn r#where(self, fragment: &str, values: Vec<Value>) -> Result<Self> {
        self.push_condition("where", Connective::Where, fragment.trim(), values)
    }

    /// Adds an AND condition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] without a preceding condition or on a raw
    /// query.
    pub fn and_where(self, fragment: &str, values: Vec<Value>) -> Result<Self> {
        self.push_condition("and_where", Connective::And, fragment.trim(), values)
    }

    /// Adds an OR condition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] without a preceding condition or on a raw
    /// query.
    pub fn or_where(self, fragment: &str, values: Vec<Value>) -> Result<Self> {
        self.push_condition("or_where", Connective::Or, fragment.trim(), values)
    }

    /// Adds a raw condition fragment, rendered verbatim with no connective.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] on a raw query.
    pub fn condition(self, fragment: &str, values: Vec<Value>) -> Result<Self> {
        self.push_condition("condition", Connective::Raw, fragment.trim(), values)
    }

    fn push_condition(
        mut self, operation: &str, connective: Connective, fragment: &str, values: Vec<Value>,
    ) -> Result<Self> {
        let composed = self.composed(operation)?;
        if matches!(connective, Connective::And | Connective::Or) && composed.conditions.is_empty()
        {
            return Err(Error::State(format!(
                "{operation} requires at least one preceding where condition"
            )));
        }
        composed.conditions.push(Condition {
            connective,
            fragment: fragment.to_string(),
            values: sanitize(values),
        });
        Ok(self)
    }

    /// Appends a raw ORDER BY expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] on a raw query.
    pub fn order_by(mut self, expression: &str) -> Result<Self> {
        self.composed("order_by")?.order.push(OrderBy {
            expression: expression.trim().to_string(),
            direction: None,
        });
        Ok(self)
    }

    /// Appends `<column> asc|desc` to ORDER BY.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] on a raw query.
    pub fn order_by_column(mut self, column: &str, direction: Direction) -> Result<Self> {
        self.composed("order_by")?.order.push(OrderBy {
            expression: column.trim().to_string(),
            direction: Some(direction),
        });
        Ok(self)
    }

    /// Limits the number of rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] if negative, [`Error::State`] on a raw
    /// query.
    pub fn limit(mut self, max_rows: i64) -> Result<Self> {
        let composed = self.composed("limit")?;
        if max_rows < 0 {
            return Err(Error::Argument(format!("limit must be non-negative, got {max_rows}")));
        }
        composed.limit = Some(max_rows);
        Ok(self)
    }

    /// Skips rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] if negative, [`Error::State`] on a raw
    /// query.
    pub fn offset(mut self, rows: i64) -> Result<Self> {
        let composed = self.composed("offset")?;
        if rows < 0 {
            return Err(Error::Argument(format!("offset must be non-negative, got {rows}")));
        }
        composed.offset = Some(rows);
        Ok(self)
    }

    /// Shorthand for `limit(max_rows)` then `offset(start_at)`.
    ///
    /// # Errors
    ///
    /// As [`SqlQuery::limit`] and [`SqlQuery::offset`].
    pub fn paginate(self, max_rows: i64, start_at: i64) -> Result<Self> {
        self.limit(max_rows)?.offset(start_at)
    }

    /// Names the primary-key column for types that do not declare one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] on a raw query.
    pub fn primary_key(mut self, name: &str) -> Result<Self> {
        self.composed("primary_key")?.primary_key = Some(name.trim().to_string());
        Ok(self)
    }

    /// Primary-key column hint.
    #[must_use]
    pub fn primary_key_name(&self) -> Option<&str> {
        match &self.mode {
            Mode::Composed(composed) => composed.primary_key.as_deref(),
            Mode::Raw { .. } => None,
        }
    }

    /// Whether the query was built with [`SqlQuery::raw`].
    #[must_use]
    pub const fn is_raw(&self) -> bool {
        matches!(self.mode, Mode::Raw { .. })
    }

    /// Renders the SQL.
    #[must_use]
    pub fn sql(&self) -> String {
        let composed = match &self.mode {
            Mode::Raw { sql, .. } => return sql.clone(),
            Mode::Composed(composed) => composed,
        };

        let mut segments: Vec<String> = Vec::new();
        segments.extend(composed.select.clone());
        segments.extend(composed.body.iter().map(|clause| clause.clause().to_string()));

        if let Some(first) = composed.conditions.first() {
            let rendered = composed
                .conditions
                .iter()
                .enumerate()
                .map(|(index, condition)| condition.render(index == 0))
                .collect::<Vec<_>>()
                .join(" ");
            if first.connective == Connective::Where {
                segments.push(format!("WHERE {rendered}"));
            } else {
                segments.push(rendered);
            }
        }

        if !composed.order.is_empty() {
            let order = composed.order.iter().map(ToString::to_string).collect::<Vec<_>>();
            segments.push(format!("ORDER BY {}", order.join(", ")));
        }
        if let Some(limit) = composed.limit {
            segments.push(format!("LIMIT {limit}"));
        }
        if let Some(offset) = composed.offset {
            segments.push(format!("OFFSET {offset}"));
        }

        segments
            .iter()
            .map(|segment| segment.trim())
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parameters: body clause values then condition values.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        match &self.mode {
            Mode::Raw { values, .. } => values.clone(),
            Mode::Composed(composed) => composed
                .body
                .iter()
                .flat_map(|clause| clause.values().iter().cloned())
                .chain(composed.conditions.iter().flat_map(|condition| condition.values.iter().cloned()))
                .collect(),
        }
    }

    /// Checks that the rendered SQL has one placeholder per value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Arity`] on mismatch.
    pub fn assert_arity(&self) -> Result<()> {
        assert_placeholder_count(&self.sql(), self.values().len())
    }
}

/// A lone NULL contributes no parameter.
fn sanitize(values: Vec<Value>) -> Vec<Value> {
    if values.len() == 1 && values.iter().all(is_null_value) {
        return Vec::new();
    }
    values
}
