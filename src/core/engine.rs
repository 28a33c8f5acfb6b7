//! Access decisions
//!
//! A request `(account, resource, action)` is granted when at least one
//! active policy matching the resource and action has all of its conditions
//! satisfied. No matching policy means deny.

use crate::core::audit::{AuditLog, PolicyEvent};
use crate::core::config::EvaluationStrategy;
use crate::core::evaluator::ConditionEvaluator;
use crate::core::policy::PolicyId;
use crate::core::store::{PolicySnapshot, PolicyStore};
use crate::error::Result;
use alloy_primitives::Address;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of one access request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub account: Address,
    pub resource: String,
    pub action: String,
    /// Policy whose evaluation confirmed the grant first
    pub granted_by: Option<PolicyId>,
    pub granted: bool,
}

/// Combines policy matching with condition evaluation
pub struct AccessDecisionEngine {
    store: Arc<PolicyStore>,
    evaluator: ConditionEvaluator,
    audit: Arc<AuditLog>,
}

impl AccessDecisionEngine {
    pub fn new(store: Arc<PolicyStore>, evaluator: ConditionEvaluator, audit: Arc<AuditLog>) -> Self {
        AccessDecisionEngine {
            store,
            evaluator,
            audit,
        }
    }

    pub fn evaluator(&self) -> &ConditionEvaluator {
        &self.evaluator
    }

    /// Decide a request and report the granting policy
    pub async fn decide(&self, account: Address, resource: &str, action: &str) -> AccessDecision {
        let candidates = self.store.matching_snapshot(resource, action);

        let granted_by = if candidates.is_empty() {
            debug!(resource, action, "no matching policy");
            None
        } else {
            self.first_satisfied(&candidates, account).await
        };

        let decision = AccessDecision {
            account,
            resource: resource.to_string(),
            action: action.to_string(),
            granted_by,
            granted: granted_by.is_some(),
        };

        info!(
            account = %account,
            resource,
            action,
            candidates = candidates.len(),
            granted = decision.granted,
            granted_by = ?decision.granted_by,
            "access checked"
        );
        self.audit.record(PolicyEvent::AccessChecked {
            decision: decision.clone(),
        });

        decision
    }

    pub async fn check_access(&self, account: Address, resource: &str, action: &str) -> bool {
        self.decide(account, resource, action).await.granted
    }

    /// Evaluate a single policy for `account`, whether or not it is active
    pub async fn check_policy_for_user(&self, policy_id: PolicyId, account: Address) -> Result<bool> {
        let snapshot = self.store.policy_snapshot(policy_id)?;
        let satisfied = self
            .evaluator
            .evaluate_all(&snapshot.conditions, account)
            .await;

        info!(policy_id, account = %account, satisfied, "policy enforced");
        self.audit.record(PolicyEvent::PolicyEnforced {
            policy_id,
            account,
            satisfied,
        });

        Ok(satisfied)
    }

    /// OR over candidate policies, stopping at the first satisfied one
    async fn first_satisfied(
        &self,
        candidates: &[PolicySnapshot],
        account: Address,
    ) -> Option<PolicyId> {
        match self.evaluator.strategy() {
            EvaluationStrategy::Sequential => {
                for candidate in candidates {
                    if self
                        .evaluator
                        .evaluate_all(&candidate.conditions, account)
                        .await
                    {
                        return Some(candidate.policy_id);
                    }
                }
                None
            }
            EvaluationStrategy::Concurrent => {
                let mut pending: FuturesUnordered<_> = candidates
                    .iter()
                    .map(|candidate| async move {
                        let satisfied = self
                            .evaluator
                            .evaluate_all(&candidate.conditions, account)
                            .await;
                        (candidate.policy_id, satisfied)
                    })
                    .collect();

                while let Some((policy_id, satisfied)) = pending.next().await {
                    if satisfied {
                        return Some(policy_id);
                    }
                }
                None
            }
        }
    }
}
