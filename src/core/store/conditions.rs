//! Condition arena keyed by condition id

use crate::core::condition::{CompiledCondition, Condition, ConditionId, ConditionSpec};
use crate::core::policy::PolicyId;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Arena of condition records
///
/// Ids come from a counter that only moves forward, so a removed id is never
/// handed out again. Records are shared as `Arc` so that decision snapshots
/// can outlive the lock they were taken under.
#[derive(Debug, Default)]
pub struct ConditionStore {
    conditions: BTreeMap<ConditionId, Arc<Condition>>,
    next_id: ConditionId,
}

impl ConditionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a validated condition and return the stored record
    pub fn insert(
        &mut self,
        policy_id: PolicyId,
        compiled: CompiledCondition,
        spec: ConditionSpec,
    ) -> Arc<Condition> {
        let id = self.next_id;
        self.next_id += 1;

        let condition = Arc::new(Condition::new(id, policy_id, compiled, spec));
        self.conditions.insert(id, Arc::clone(&condition));
        condition
    }

    pub fn get(&self, id: ConditionId) -> Option<&Arc<Condition>> {
        self.conditions.get(&id)
    }

    pub fn remove(&mut self, id: ConditionId) -> Option<Arc<Condition>> {
        self.conditions.remove(&id)
    }

    /// Records for `ids`, in the given order, skipping unknown ids
    pub fn resolve(&self, ids: &[ConditionId]) -> Vec<Arc<Condition>> {
        ids.iter()
            .filter_map(|id| self.conditions.get(id).cloned())
            .collect()
    }

    /// Id the next insert will receive
    pub fn next_id(&self) -> ConditionId {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert_native(store: &mut ConditionStore, policy_id: PolicyId) -> Arc<Condition> {
        let spec = ConditionSpec::native_balance(">=", "1");
        let compiled = spec.compile().unwrap();
        store.insert(policy_id, compiled, spec)
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut store = ConditionStore::new();
        assert_eq!(insert_native(&mut store, 0).id, 0);
        assert_eq!(insert_native(&mut store, 0).id, 1);
        assert_eq!(insert_native(&mut store, 1).id, 2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_removed_ids_are_not_reused() {
        let mut store = ConditionStore::new();
        let first = insert_native(&mut store, 0);
        assert!(store.remove(first.id).is_some());
        assert!(store.get(first.id).is_none());

        let second = insert_native(&mut store, 0);
        assert_eq!(second.id, 1);
        assert_eq!(store.next_id(), 2);
    }

    #[test]
    fn test_resolve_preserves_order() {
        let mut store = ConditionStore::new();
        for _ in 0..4 {
            insert_native(&mut store, 0);
        }

        let resolved: Vec<ConditionId> = store.resolve(&[3, 0, 2]).iter().map(|c| c.id).collect();
        assert_eq!(resolved, vec![3, 0, 2]);
        assert!(store.resolve(&[99]).is_empty());
    }
}
