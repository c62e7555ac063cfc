//! Breach state storage.
//!
//! The evaluator holds no state of its own. Breach states live in a
//! [`BreachStore`] owned by the caller, keyed by policy id and condition index.

use crate::breach::BreachState;
use chrono::{DateTime, Utc};
use hub_policy::PolicyId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifies the breach state of one condition of one policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BreachKey {
    /// Owning policy.
    pub policy_id: PolicyId,
    /// Position of the condition within the policy.
    pub condition_index: usize,
}

impl BreachKey {
    /// Creates a key.
    #[must_use]
    pub fn new(policy_id: impl Into<PolicyId>, condition_index: usize) -> Self {
        Self {
            policy_id: policy_id.into(),
            condition_index,
        }
    }
}

/// Storage for breach states across ticks.
pub trait BreachStore {
    /// Returns the state for a key, `Clear` if absent.
    fn get(&self, key: &BreachKey) -> BreachState;

    /// Stores a state.
    fn set(&mut self, key: BreachKey, state: BreachState);

    /// Drops every state belonging to a policy.
    fn clear_policy(&mut self, policy_id: &PolicyId);

    /// Keeps only states whose policy satisfies `keep`.
    fn retain_policies(&mut self, keep: &dyn Fn(&PolicyId) -> bool);

    /// Timestamp of the last evaluated snapshot.
    fn last_tick(&self) -> Option<DateTime<Utc>>;

    /// Records the timestamp of an evaluated snapshot.
    fn record_tick(&mut self, at: DateTime<Utc>);
}

/// In-memory [`BreachStore`]. `Clear` states are not stored.
#[derive(Debug, Clone, Default)]
pub struct MemoryBreachStore {
    states: HashMap<BreachKey, BreachState>,
    last_tick: Option<DateTime<Utc>>,
}

impl MemoryBreachStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of non-clear states.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns true if every condition is clear.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Non-clear states sorted by key.
    #[must_use]
    pub fn entries(&self) -> Vec<(&BreachKey, &BreachState)> {
        let mut entries: Vec<_> = self.states.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

impl BreachStore for MemoryBreachStore {
    fn get(&self, key: &BreachKey) -> BreachState {
        self.states.get(key).copied().unwrap_or_default()
    }

    fn set(&mut self, key: BreachKey, state: BreachState) {
        if state == BreachState::Clear {
            self.states.remove(&key);
        } else {
            self.states.insert(key, state);
        }
    }

    fn clear_policy(&mut self, policy_id: &PolicyId) {
        self.states.retain(|key, _| &key.policy_id != policy_id);
    }

    fn retain_policies(&mut self, keep: &dyn Fn(&PolicyId) -> bool) {
        self.states.retain(|key, _| keep(&key.policy_id));
    }

    fn last_tick(&self) -> Option<DateTime<Utc>> {
        self.last_tick
    }

    fn record_tick(&mut self, at: DateTime<Utc>) {
        self.last_tick = Some(self.last_tick.map_or(at, |last| last.max(at)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn since() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
    }

    #[test]
    fn absent_keys_are_clear() {
        let store = MemoryBreachStore::new();
        assert_eq!(store.get(&BreachKey::new("p1", 0)), BreachState::Clear);
    }

    #[test]
    fn clear_states_are_not_kept() {
        let mut store = MemoryBreachStore::new();
        let key = BreachKey::new("p1", 0);
        store.set(key.clone(), BreachState::Breaching { since: since() });
        assert_eq!(store.len(), 1);

        store.set(key, BreachState::Clear);
        assert!(store.is_empty());
    }

    #[test]
    fn clear_and_retain_by_policy() {
        let mut store = MemoryBreachStore::new();
        for id in ["p1", "p2", "p3"] {
            store.set(BreachKey::new(id, 0), BreachState::Fired { since: since() });
            store.set(BreachKey::new(id, 1), BreachState::Breaching { since: since() });
        }

        store.clear_policy(&PolicyId::from("p1"));
        assert_eq!(store.len(), 4);

        store.retain_policies(&|id| id.as_str() == "p3");
        let keys: Vec<_> = store.entries().into_iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![BreachKey::new("p3", 0), BreachKey::new("p3", 1)]);
    }

    #[test]
    fn last_tick_never_moves_backwards() {
        let mut store = MemoryBreachStore::new();
        store.record_tick(since());
        store.record_tick(since() - chrono::Duration::minutes(1));
        assert_eq!(store.last_tick(), Some(since()));
    }
}
