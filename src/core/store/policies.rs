//! Policy store: policy records, their condition lists and the owner index
//!
//! All state lives behind one `RwLock`:
//! - Mutations hold the write lock from authorization to audit emission, so
//!   a failed call leaves records, indices and id counters untouched
//! - Decision snapshots are taken under a single read guard, so one decision
//!   never mixes two store states

use super::ConditionStore;
use crate::core::audit::{AuditLog, PolicyEvent};
use crate::core::condition::{Condition, ConditionId, ConditionSpec};
use crate::core::policy::{Policy, PolicyId};
use crate::error::{PbacError, Result};
use crate::validation::require_non_empty;
use alloy_primitives::Address;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Conditions of one policy, resolved for evaluation
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
    pub policy_id: PolicyId,
    pub conditions: Vec<Arc<Condition>>,
}

#[derive(Debug, Default)]
struct PolicyTable {
    policies: BTreeMap<PolicyId, Policy>,
    by_owner: HashMap<Address, Vec<PolicyId>>,
    next_id: PolicyId,
}

impl PolicyTable {
    fn insert(&mut self, owner: Address, name: &str, resource: &str, action: &str) -> &Policy {
        let id = self.next_id;
        self.next_id += 1;

        let policy = Policy::new(
            id,
            owner,
            name.to_string(),
            resource.to_string(),
            action.to_string(),
            now(),
        );
        self.by_owner.entry(owner).or_default().push(id);
        self.policies.entry(id).or_insert(policy)
    }

    fn get(&self, id: PolicyId) -> Result<&Policy> {
        self.policies.get(&id).ok_or(PbacError::PolicyNotFound(id))
    }

    /// Resolve a policy for mutation by `caller`
    fn owned_mut(&mut self, caller: Address, id: PolicyId) -> Result<&mut Policy> {
        let policy = self
            .policies
            .get_mut(&id)
            .ok_or(PbacError::PolicyNotFound(id))?;
        if !policy.is_owned_by(&caller) {
            return Err(PbacError::Unauthorized {
                caller,
                policy_id: id,
            });
        }
        Ok(policy)
    }

    fn matching<'a>(
        &'a self,
        resource: &'a str,
        action: &'a str,
    ) -> impl Iterator<Item = &'a Policy> + 'a {
        self.policies
            .values()
            .filter(move |p| p.is_active && p.applies_to(resource, action))
    }
}

#[derive(Debug, Default)]
struct StoreState {
    policies: PolicyTable,
    conditions: ConditionStore,
}

/// Thread-safe policy and condition registry
pub struct PolicyStore {
    state: RwLock<StoreState>,
    audit: Arc<AuditLog>,
}

impl PolicyStore {
    pub fn new(audit: Arc<AuditLog>) -> Self {
        PolicyStore {
            state: RwLock::new(StoreState::default()),
            audit,
        }
    }

    /// Register a new active policy owned by `owner`
    pub fn create_policy(
        &self,
        owner: Address,
        name: &str,
        resource: &str,
        action: &str,
    ) -> Result<PolicyId> {
        require_non_empty("name", name)?;
        require_non_empty("resource", resource)?;
        require_non_empty("action", action)?;

        let mut state = self.state.write();
        let policy = state.policies.insert(owner, name, resource, action).clone();

        info!(
            policy_id = policy.id,
            owner = %owner,
            resource,
            action,
            "policy created"
        );
        self.audit.record(PolicyEvent::PolicyCreated {
            policy: policy.clone(),
        });

        Ok(policy.id)
    }

    /// Replace the action of a policy
    pub fn update_policy(&self, caller: Address, id: PolicyId, action: &str) -> Result<PolicyId> {
        let mut state = self.state.write();
        let policy = state.policies.owned_mut(caller, id)?;
        require_non_empty("action", action)?;

        policy.action = action.to_string();
        policy.updated_at = now();
        let policy = policy.clone();

        info!(policy_id = id, action, "policy updated");
        self.audit.record(PolicyEvent::PolicyUpdated { policy });

        Ok(id)
    }

    /// Activate or deactivate a policy (idempotent)
    pub fn set_policy_status(&self, caller: Address, id: PolicyId, active: bool) -> Result<PolicyId> {
        let mut state = self.state.write();
        let policy = state.policies.owned_mut(caller, id)?;

        if policy.is_active != active {
            policy.is_active = active;
            policy.updated_at = now();
        }
        let policy = policy.clone();

        info!(policy_id = id, active, "policy status set");
        self.audit.record(PolicyEvent::PolicyStatusChanged { policy });

        Ok(id)
    }

    /// Shorthand for `set_policy_status(caller, id, false)`
    pub fn deactivate_policy(&self, caller: Address, id: PolicyId) -> Result<PolicyId> {
        self.set_policy_status(caller, id, false)
    }

    /// Validate `spec` and append it to the policy's condition list
    pub fn add_condition(
        &self,
        caller: Address,
        policy_id: PolicyId,
        spec: ConditionSpec,
    ) -> Result<ConditionId> {
        let mut guard = self.state.write();
        let StoreState {
            policies,
            conditions,
        } = &mut *guard;

        let policy = policies.owned_mut(caller, policy_id)?;
        let compiled = spec.compile()?;

        let condition = conditions.insert(policy_id, compiled, spec);
        policy.condition_ids.push(condition.id);
        policy.updated_at = now();

        info!(
            policy_id,
            condition_id = condition.id,
            standard = %condition.standard(),
            method = %condition.method(),
            comparator = %condition.comparator,
            "condition added"
        );
        self.audit.record(PolicyEvent::ConditionAdded {
            policy: policy.clone(),
            condition: Condition::clone(&condition),
        });

        Ok(condition.id)
    }

    /// Detach and delete a condition, keeping the order of the others
    pub fn remove_condition(
        &self,
        caller: Address,
        policy_id: PolicyId,
        condition_id: ConditionId,
    ) -> Result<ConditionId> {
        let mut guard = self.state.write();
        let StoreState {
            policies,
            conditions,
        } = &mut *guard;

        let policy = policies.owned_mut(caller, policy_id)?;
        let position = match policy.condition_position(condition_id) {
            Some(position) => position,
            None if conditions.get(condition_id).is_none() => {
                return Err(PbacError::ConditionNotFound(condition_id));
            }
            None => {
                return Err(PbacError::ConditionNotOwned {
                    policy_id,
                    condition_id,
                });
            }
        };
        let condition = conditions
            .remove(condition_id)
            .ok_or(PbacError::ConditionNotFound(condition_id))?;

        policy.condition_ids.remove(position);
        policy.updated_at = now();

        info!(policy_id, condition_id, "condition removed");
        self.audit.record(PolicyEvent::ConditionRemoved {
            policy: policy.clone(),
            condition: Condition::clone(&condition),
        });

        Ok(condition_id)
    }

    /// Active policies whose resource and action equal the query, by id
    pub fn find_matching(&self, resource: &str, action: &str) -> Vec<PolicyId> {
        let state = self.state.read();
        state
            .policies
            .matching(resource, action)
            .map(|p| p.id)
            .collect()
    }

    /// Matching active policies with their conditions, read atomically
    pub fn matching_snapshot(&self, resource: &str, action: &str) -> Vec<PolicySnapshot> {
        let state = self.state.read();
        let snapshots: Vec<PolicySnapshot> = state
            .policies
            .matching(resource, action)
            .map(|p| PolicySnapshot {
                policy_id: p.id,
                conditions: state.conditions.resolve(&p.condition_ids),
            })
            .collect();

        debug!(
            resource,
            action,
            candidates = snapshots.len(),
            "matching policies resolved"
        );
        snapshots
    }

    /// One policy with its conditions, regardless of activation state
    pub fn policy_snapshot(&self, id: PolicyId) -> Result<PolicySnapshot> {
        let state = self.state.read();
        let policy = state.policies.get(id)?;
        Ok(PolicySnapshot {
            policy_id: id,
            conditions: state.conditions.resolve(&policy.condition_ids),
        })
    }

    /// Number of policies ever created (policies are never removed)
    pub fn policy_count(&self) -> u64 {
        self.state.read().policies.policies.len() as u64
    }

    pub fn policy_info(&self, id: PolicyId) -> Result<Policy> {
        self.state.read().policies.get(id).cloned()
    }

    pub fn policy_condition_ids(&self, id: PolicyId) -> Result<Vec<ConditionId>> {
        Ok(self.state.read().policies.get(id)?.condition_ids.clone())
    }

    pub fn condition(&self, id: ConditionId) -> Result<Arc<Condition>> {
        self.state
            .read()
            .conditions
            .get(id)
            .cloned()
            .ok_or(PbacError::ConditionNotFound(id))
    }

    /// Ids of policies created by `owner`, in creation order
    pub fn policies_by_owner(&self, owner: &Address) -> Vec<PolicyId> {
        self.state
            .read()
            .policies
            .by_owner
            .get(owner)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of live condition records
    pub fn condition_count(&self) -> usize {
        self.state.read().conditions.len()
    }

    /// Every policy record, by id
    pub fn all_policies(&self) -> Vec<Policy> {
        self.state.read().policies.policies.values().cloned().collect()
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
