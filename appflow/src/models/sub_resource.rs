//! Sub-resources (journeys) that are triggered once an upload is processed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a [`SubResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubResourceId(pub i64);

impl fmt::Display for SubResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A journey linked to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubResource {
    /// Journey id.
    pub id: SubResourceId,
    /// Display name.
    pub name: String,
}

impl SubResource {
    /// Creates a sub-resource.
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id: SubResourceId(id),
            name: name.into(),
        }
    }
}

impl fmt::Display for SubResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}
