//! Condition evaluation against a ledger oracle
//!
//! Evaluation is fail-closed: an oracle error, a timeout or an observation
//! outside the condition's domain makes the condition unsatisfied. Only
//! [`ConditionEvaluator::try_evaluate_condition`] surfaces the error itself.

use crate::core::condition::Condition;
use crate::core::config::{EngineConfig, EvaluationStrategy};
use crate::core::oracle::{observe, LedgerOracle};
use crate::error::{PbacError, Result};
use alloy_primitives::Address;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Resolves conditions for an account through a [`LedgerOracle`]
#[derive(Clone)]
pub struct ConditionEvaluator {
    oracle: Arc<dyn LedgerOracle>,
    timeout: Duration,
    strategy: EvaluationStrategy,
    max_in_flight: usize,
}

impl ConditionEvaluator {
    pub fn new(oracle: Arc<dyn LedgerOracle>, config: &EngineConfig) -> Self {
        ConditionEvaluator {
            oracle,
            timeout: config.oracle_timeout(),
            strategy: config.strategy,
            max_in_flight: config.max_concurrent_queries.max(1),
        }
    }

    pub fn strategy(&self) -> EvaluationStrategy {
        self.strategy
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Evaluate one condition, reporting why it could not be decided
    pub async fn try_evaluate_condition(
        &self,
        condition: &Condition,
        account: Address,
    ) -> Result<bool> {
        let read = observe(
            self.oracle.as_ref(),
            condition.chain,
            &condition.source,
            account,
        );

        let observation = match tokio::time::timeout(self.timeout, read).await {
            Ok(Ok(observation)) => observation,
            Ok(Err(e)) => {
                return Err(PbacError::EvaluationFailure {
                    condition_id: condition.id,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(PbacError::EvaluationFailure {
                    condition_id: condition.id,
                    reason: format!("oracle did not answer within {:?}", self.timeout),
                })
            }
        };

        let satisfied = condition.holds(observation, account)?;
        debug!(
            condition_id = condition.id,
            account = %account,
            method = %condition.method(),
            ?observation,
            satisfied,
            "condition evaluated"
        );
        Ok(satisfied)
    }

    /// Evaluate one condition; any failure counts as unsatisfied
    pub async fn evaluate_condition(&self, condition: &Condition, account: Address) -> bool {
        match self.try_evaluate_condition(condition, account).await {
            Ok(satisfied) => satisfied,
            Err(e) => {
                warn!(
                    condition_id = condition.id,
                    policy_id = condition.policy_id,
                    account = %account,
                    error = %e,
                    "condition evaluation failed, treating as unsatisfied"
                );
                false
            }
        }
    }

    /// AND over `conditions`; an empty list is satisfied
    ///
    /// Stops at the first unsatisfied condition. Under the concurrent
    /// strategy, reads still in flight at that point are dropped.
    pub async fn evaluate_all(&self, conditions: &[Arc<Condition>], account: Address) -> bool {
        if conditions.is_empty() {
            return true;
        }

        match self.strategy {
            EvaluationStrategy::Sequential => {
                for condition in conditions {
                    if !self.evaluate_condition(condition, account).await {
                        return false;
                    }
                }
                true
            }
            EvaluationStrategy::Concurrent => {
                let evaluations: Vec<_> = conditions
                    .iter()
                    .map(|condition| self.evaluate_condition(condition, account))
                    .collect();
                let mut pending = stream::iter(evaluations).buffer_unordered(self.max_in_flight);

                while let Some(satisfied) = pending.next().await {
                    if !satisfied {
                        return false;
                    }
                }
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::condition::ConditionSpec;
    use crate::core::oracle::MemoryLedger;
    use alloy_primitives::U256;

    const TOKEN: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    fn alice() -> Address {
        Address::repeat_byte(0xa1)
    }

    fn token() -> Address {
        TOKEN.parse().unwrap()
    }

    fn condition(id: u64, spec: ConditionSpec) -> Arc<Condition> {
        Arc::new(Condition::new(id, 0, spec.compile().unwrap(), spec))
    }

    fn evaluator(ledger: Arc<MemoryLedger>, strategy: EvaluationStrategy) -> ConditionEvaluator {
        let config = EngineConfig {
            oracle_timeout_ms: 50,
            strategy,
            max_concurrent_queries: 1,
            ..EngineConfig::default()
        };
        ConditionEvaluator::new(ledger, &config)
    }

    #[tokio::test]
    async fn test_native_balance_threshold() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.set_native_balance(alice(), U256::from(1_000_000_000_000u64));
        let eval = evaluator(Arc::clone(&ledger), EvaluationStrategy::Sequential);

        let at_threshold = condition(0, ConditionSpec::native_balance(">=", "1000000000000"));
        let above = condition(1, ConditionSpec::native_balance(">", "1000000000000"));

        assert!(eval.evaluate_condition(&at_threshold, alice()).await);
        assert!(!eval.evaluate_condition(&above, alice()).await);
    }

    #[tokio::test]
    async fn test_erc721_owner_substitutes_account() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.set_erc721_owner(token(), U256::from(1u64), alice());
        let eval = evaluator(Arc::clone(&ledger), EvaluationStrategy::Sequential);

        let owns = condition(0, ConditionSpec::erc721_owner(TOKEN, "1", "==", ":userAddress"));
        assert!(eval.evaluate_condition(&owns, alice()).await);
        assert!(!eval.evaluate_condition(&owns, Address::ZERO).await);

        let not_owns = condition(1, ConditionSpec::erc721_owner(TOKEN, "1", "!=", ":userAddress"));
        assert!(eval.evaluate_condition(&not_owns, Address::ZERO).await);
    }

    #[tokio::test]
    async fn test_oracle_error_fails_closed() {
        let ledger = Arc::new(MemoryLedger::new());
        // Holder has nothing, so "<" would be satisfied if the read succeeded
        let cond = condition(4, ConditionSpec::erc20_balance(TOKEN, "<", "10"));
        let eval = evaluator(Arc::clone(&ledger), EvaluationStrategy::Sequential);

        assert!(!eval.evaluate_condition(&cond, alice()).await);
        let err = eval.try_evaluate_condition(&cond, alice()).await.unwrap_err();
        assert!(matches!(
            err,
            PbacError::EvaluationFailure { condition_id: 4, .. }
        ));

        ledger.set_erc20_balance(token(), alice(), U256::from(1u64));
        assert!(eval.evaluate_condition(&cond, alice()).await);
    }

    #[tokio::test]
    async fn test_timeout_fails_closed() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.set_latency(Some(Duration::from_millis(500)));
        let eval = evaluator(Arc::clone(&ledger), EvaluationStrategy::Sequential);

        let cond = condition(0, ConditionSpec::native_balance(">=", "0"));
        let err = eval.try_evaluate_condition(&cond, alice()).await.unwrap_err();
        assert!(matches!(err, PbacError::EvaluationFailure { .. }));
        assert!(!eval.evaluate_condition(&cond, alice()).await);
    }

    #[tokio::test]
    async fn test_empty_list_is_satisfied() {
        let ledger = Arc::new(MemoryLedger::new());
        for strategy in [EvaluationStrategy::Sequential, EvaluationStrategy::Concurrent] {
            let eval = evaluator(Arc::clone(&ledger), strategy);
            assert!(eval.evaluate_all(&[], alice()).await);
        }
        assert_eq!(ledger.call_count(), 0);
    }

    #[tokio::test]
    async fn test_and_stops_at_first_failure() {
        let ledger = Arc::new(MemoryLedger::new());
        let conditions = vec![
            condition(0, ConditionSpec::native_balance(">", "0")),
            condition(1, ConditionSpec::native_balance(">=", "0")),
            condition(2, ConditionSpec::native_balance(">=", "0")),
        ];

        for strategy in [EvaluationStrategy::Sequential, EvaluationStrategy::Concurrent] {
            let ledger = Arc::new(MemoryLedger::new());
            let eval = evaluator(Arc::clone(&ledger), strategy);
            assert!(!eval.evaluate_all(&conditions, alice()).await);
            assert_eq!(ledger.call_count(), 1, "{:?} kept querying", strategy);
        }

        ledger.set_native_balance(alice(), U256::from(1u64));
        let eval = evaluator(Arc::clone(&ledger), EvaluationStrategy::Concurrent);
        assert!(eval.evaluate_all(&conditions, alice()).await);
        assert_eq!(ledger.call_count(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_reads_overlap() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.set_native_balance(alice(), U256::from(5u64));
        ledger.set_latency(Some(Duration::from_millis(40)));

        let config = EngineConfig {
            oracle_timeout_ms: 1_000,
            strategy: EvaluationStrategy::Concurrent,
            max_concurrent_queries: 8,
            ..EngineConfig::default()
        };
        let eval = ConditionEvaluator::new(ledger, &config);
        let conditions: Vec<_> = (0..8)
            .map(|i| condition(i, ConditionSpec::native_balance(">=", "5")))
            .collect();

        let started = std::time::Instant::now();
        assert!(eval.evaluate_all(&conditions, alice()).await);
        assert!(started.elapsed() < Duration::from_millis(8 * 40));
    }
}
