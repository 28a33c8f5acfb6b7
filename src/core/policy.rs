//! Policy records
//!
//! A policy grants `action` on `resource` to every account that satisfies all
//! of its conditions. Policies are never physically removed; deactivation is a
//! soft delete that keeps the record and its conditions.

use crate::core::condition::ConditionId;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Identifier of a policy record
pub type PolicyId = u64;

/// Stored policy record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,

    /// Creator; the only account allowed to mutate the policy
    pub owner: Address,

    /// Display name (immutable)
    pub name: String,

    /// Resource identifier, matched exactly (immutable)
    pub resource: String,

    /// Action identifier, matched exactly
    pub action: String,

    /// Inactive policies are skipped by access decisions
    pub is_active: bool,

    /// Conditions in evaluation order
    pub condition_ids: Vec<ConditionId>,

    /// Unix seconds
    pub created_at: i64,

    /// Unix seconds of the last mutation
    pub updated_at: i64,
}

impl Policy {
    pub(crate) fn new(
        id: PolicyId,
        owner: Address,
        name: String,
        resource: String,
        action: String,
        now: i64,
    ) -> Self {
        Policy {
            id,
            owner,
            name,
            resource,
            action,
            is_active: true,
            condition_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Exact, case-sensitive match on resource and action
    pub fn applies_to(&self, resource: &str, action: &str) -> bool {
        self.resource == resource && self.action == action
    }

    pub fn is_owned_by(&self, account: &Address) -> bool {
        &self.owner == account
    }

    /// Position of `condition_id` in this policy's list
    pub fn condition_position(&self, condition_id: ConditionId) -> Option<usize> {
        self.condition_ids.iter().position(|id| *id == condition_id)
    }
}
