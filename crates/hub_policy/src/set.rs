//! Ordered policy sets.

use crate::error::{Error, Result};
use crate::model::{Policy, PolicyId};
use serde::{Deserialize, Serialize};

/// The policies attached to one endpoint, kept in insertion order.
///
/// Execution order is derived on demand by [`PolicySet::ordered`]:
/// type precedence, then ascending priority, then insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Policy>", into = "Vec<Policy>")]
pub struct PolicySet {
    policies: Vec<Policy>,
}

impl PolicySet {
    /// Creates an empty policy set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a policy at the end of the insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicatePolicy`] if the id is already present.
    pub fn insert(&mut self, policy: Policy) -> Result<()> {
        if self.contains(&policy.id) {
            return Err(Error::DuplicatePolicy(policy.id.to_string()));
        }
        self.policies.push(policy);
        Ok(())
    }

    /// Removes a policy, returning it if it existed.
    pub fn remove(&mut self, id: &PolicyId) -> Option<Policy> {
        let index = self.policies.iter().position(|p| &p.id == id)?;
        Some(self.policies.remove(index))
    }

    /// Returns true if a policy with the id exists.
    #[must_use]
    pub fn contains(&self, id: &PolicyId) -> bool {
        self.policies.iter().any(|p| &p.id == id)
    }

    /// Looks up a policy by id.
    #[must_use]
    pub fn get(&self, id: &PolicyId) -> Option<&Policy> {
        self.policies.iter().find(|p| &p.id == id)
    }

    /// Looks up a policy by id for in-place editing.
    ///
    /// The id itself must not be changed through this reference.
    pub fn get_mut(&mut self, id: &PolicyId) -> Option<&mut Policy> {
        self.policies.iter_mut().find(|p| &p.id == id)
    }

    /// Enables or disables a policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPolicy`] if no policy has the id.
    pub fn set_enabled(&mut self, id: &PolicyId, enabled: bool) -> Result<()> {
        let policy = self
            .get_mut(id)
            .ok_or_else(|| Error::UnknownPolicy(id.to_string()))?;
        policy.enabled = enabled;
        Ok(())
    }

    /// Number of policies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Returns true if the set has no policies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Policy> {
        self.policies.iter()
    }

    /// Returns the policies in execution order.
    #[must_use]
    pub fn ordered(&self) -> Vec<&Policy> {
        let mut ordered: Vec<&Policy> = self.policies.iter().collect();
        // stable: equal keys keep insertion order
        ordered.sort_by_key(|p| (p.kind().precedence(), p.priority));
        ordered
    }
}

impl TryFrom<Vec<Policy>> for PolicySet {
    type Error = Error;

    fn try_from(policies: Vec<Policy>) -> Result<Self> {
        let mut set = Self::new();
        for policy in policies {
            set.insert(policy)?;
        }
        Ok(set)
    }
}

impl From<PolicySet> for Vec<Policy> {
    fn from(set: PolicySet) -> Self {
        set.policies
    }
}

impl<'a> IntoIterator for &'a PolicySet {
    type Item = &'a Policy;
    type IntoIter = std::slice::Iter<'a, Policy>;

    fn into_iter(self) -> Self::IntoIter {
        self.policies.iter()
    }
}
