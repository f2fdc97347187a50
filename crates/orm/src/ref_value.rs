use serde::{Deserialize, Serialize};

use crate::key::Pair;

/// A foreign key read together with a human readable label.
///
/// Used when a query joins the label of a referenced row without
/// materializing the referenced entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefValue {
    label: String,
    reference: Pair,
}

impl RefValue {
    /// Creates a labeled reference to `column = id`.
    #[must_use]
    pub fn new(label: impl Into<String>, column: impl Into<String>, id: i64) -> Self {
        Self {
            label: label.into(),
            reference: Pair::new(column, id),
        }
    }

    /// Display label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Foreign key column and value.
    #[must_use]
    pub const fn reference(&self) -> &Pair {
        &self.reference
    }

    /// Foreign key value.
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.reference.value()
    }
}
