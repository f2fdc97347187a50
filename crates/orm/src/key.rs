use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single named key column and its value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pair {
    name: String,
    value: i64,
}

impl Pair {
    /// Creates a new key pair.
    #[must_use]
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.value
    }
}

/// Ordered, named identifier of a persisted entity.
///
/// The first pair is the primary key. Equality and hashing consider every
/// pair in order, so `a=1,b=2` and `b=2,a=1` are different keys. An empty key
/// marks an entity that has not been persisted yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pairs: Vec<Pair>,
}

impl Key {
    /// Value stored for a key column added without a value.
    pub const MISSING: i64 = -1;

    /// The "no key" sentinel.
    #[must_use]
    pub const fn none() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Creates a single-column key.
    #[must_use]
    pub fn of(name: impl Into<String>, value: i64) -> Self {
        Self {
            pairs: vec![Pair::new(name, value)],
        }
    }

    /// Adds (or replaces in place) a key column.
    #[must_use]
    pub fn add(self, name: impl Into<String>, value: i64) -> Self {
        self.add_nullable(name, Some(value))
    }

    /// Adds (or replaces in place) a key column whose value may be absent.
    /// An absent value is stored as [`Key::MISSING`].
    #[must_use]
    pub fn add_nullable(mut self, name: impl Into<String>, value: Option<i64>) -> Self {
        let name = name.into();
        let value = value.unwrap_or(Self::MISSING);

        if let Some(existing) = self.pairs.iter_mut().find(|pair| pair.name == name) {
            existing.value = value;
        } else {
            self.pairs.push(Pair { name, value });
        }
        self
    }

    /// Number of key columns.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.pairs.len()
    }

    /// Whether this is the "no key" sentinel.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Pair at the given ordinal position, `None` past the end.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<&Pair> {
        self.pairs.get(index)
    }

    /// The primary (ordinal 0) pair.
    #[must_use]
    pub fn primary(&self) -> Option<&Pair> {
        self.at(0)
    }

    /// Looks up a pair by column name.
    #[must_use]
    pub fn contains(&self, name: &str) -> Option<&Pair> {
        self.pairs.iter().find(|pair| pair.name == name)
    }

    /// Value of the named key column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyNotFound`] naming the missing column and the full
    /// key when no such column exists.
    pub fn get(&self, name: &str) -> Result<i64> {
        self.contains(name).map(Pair::value).ok_or_else(|| Error::KeyNotFound {
            name: name.to_string(),
            key: self.clone(),
        })
    }

    /// Iterates over the pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = &Pair> {
        self.pairs.iter()
    }
}

impl<N, V> FromIterator<(N, V)> for Key
where
    N: Into<String>,
    V: Into<i64>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        iter.into_iter().fold(Self::none(), |key, (name, value)| key.add(name, value.into()))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(s)")?;
        for pair in &self.pairs {
            write!(f, " {}={}", pair.name, pair.value)?;
        }
        Ok(())
    }
}
