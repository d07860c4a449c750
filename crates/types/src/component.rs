//! Components and clone results.

use serde::{Deserialize, Serialize};

use crate::{Guid, ResourceRef};

/// A named resource together with the identifiers of the resources that
/// currently depend on it.
///
/// An empty `dependency_of` set means nothing binds to the component and it
/// is safe to delete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub guid: Guid,
    pub name: String,
    #[serde(default)]
    pub dependency_of: Vec<Guid>,
}

impl Component {
    pub fn new(guid: impl Into<Guid>, name: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            name: name.into(),
            dependency_of: Vec::new(),
        }
    }

    pub fn with_dependents(mut self, dependents: impl IntoIterator<Item = impl Into<Guid>>) -> Self {
        self.dependency_of.extend(dependents.into_iter().map(Into::into));
        self
    }

    pub fn is_bound(&self) -> bool {
        !self.dependency_of.is_empty()
    }

    /// First dependent, used as the owner when recovering plan details.
    pub fn owner(&self) -> Option<&Guid> {
        self.dependency_of.first()
    }
}

/// Pairs an original component with the reference of its freshly created clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloneResult {
    pub component: Component,
    pub clone: ResourceRef,
}
