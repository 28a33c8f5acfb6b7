//! # PBAC - Policy-Based Access Control over on-chain state
//!
//! `pbac` decides whether an account may perform an action on a resource by
//! checking live ledger state against owner-managed policies:
//!
//! - **Policies** bind a resource and an action to a list of conditions
//! - **Conditions** read native balances, ERC20/ERC1155 balances or ERC721
//!   ownership and compare them against a target
//! - **Decisions** grant when any active matching policy has all of its
//!   conditions satisfied; no matching policy means deny
//! - **Fail-closed**: an unreachable or slow oracle never grants access
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pbac::{Address, ConditionSpec, MemoryLedger, Pbac, Result, U256};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let ledger = Arc::new(MemoryLedger::new());
//! let pbac = Pbac::builder().oracle(ledger.clone()).build()?;
//!
//! let owner = Address::repeat_byte(0x01);
//! let user = Address::repeat_byte(0x02);
//!
//! let policy = pbac.create_policy(owner, "ETH余额策略", "secret-document", "read")?;
//! pbac.add_condition(owner, policy, ConditionSpec::native_balance(">=", "1000000000000"))?;
//!
//! ledger.set_native_balance(user, U256::from(2_000_000_000_000u64));
//! assert!(pbac.check_access(user, "secret-document", "read").await);
//! # Ok(())
//! # }
//! ```
//!
//! ## Against a node
//!
//! ```rust,no_run
//! use pbac::{EvaluationStrategy, JsonRpcLedger, Pbac, Result};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let ledger = JsonRpcLedger::new("http://127.0.0.1:8545", Duration::from_secs(5))
//!     .map_err(|e| pbac::PbacError::InvalidArgument(e.to_string()))?;
//! let pbac = Pbac::builder()
//!     .oracle(Arc::new(ledger))
//!     .strategy(EvaluationStrategy::Sequential)
//!     .oracle_timeout(Duration::from_secs(2))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod core;

// Re-export core modules internally so crate:: paths in core still work
#[allow(unused_imports)]
pub(crate) use crate::core::{
    audit, condition, config, engine, error, evaluator, oracle, policy, store, validation,
};

pub use crate::core::{
    audit::{AuditLog, AuditRecord, PolicyEvent},
    condition::{
        Chain, Comparator, Condition, ConditionId, ConditionSource, ConditionSpec, Method, Target,
        TokenStandard,
    },
    config::{EngineConfig, EvaluationStrategy, PolicyDefinition, PolicyFile, RpcSettings},
    engine::{AccessDecision, AccessDecisionEngine},
    error::{ErrorKind, PbacError, Result},
    evaluator::ConditionEvaluator,
    oracle::{JsonRpcLedger, LedgerOracle, MemoryLedger, OracleError},
    policy::{Policy, PolicyId},
    store::PolicyStore,
    validation::{BlockTag, Subject},
};
pub use alloy_primitives::{Address, U256};

use crate::validation::parse_address;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Policy registry, evaluator and audit log behind one handle
///
/// Mutations are synchronous and atomic; decisions are async because they
/// query the ledger oracle.
pub struct Pbac {
    store: Arc<PolicyStore>,
    engine: AccessDecisionEngine,
    audit: Arc<AuditLog>,
    config: EngineConfig,
}

impl Pbac {
    pub fn builder() -> PbacBuilder {
        PbacBuilder::new()
    }

    /// Engine with default configuration over `oracle`
    pub fn with_oracle(oracle: Arc<dyn LedgerOracle>) -> Self {
        Self::assemble(oracle, EngineConfig::default())
    }

    fn assemble(oracle: Arc<dyn LedgerOracle>, config: EngineConfig) -> Self {
        let audit = Arc::new(AuditLog::new(config.audit_capacity));
        let store = Arc::new(PolicyStore::new(Arc::clone(&audit)));
        let evaluator = ConditionEvaluator::new(oracle, &config);
        let engine = AccessDecisionEngine::new(Arc::clone(&store), evaluator, Arc::clone(&audit));

        Pbac {
            store,
            engine,
            audit,
            config,
        }
    }

    pub fn create_policy(
        &self,
        owner: Address,
        name: &str,
        resource: &str,
        action: &str,
    ) -> Result<PolicyId> {
        self.store.create_policy(owner, name, resource, action)
    }

    pub fn update_policy(&self, caller: Address, id: PolicyId, action: &str) -> Result<PolicyId> {
        self.store.update_policy(caller, id, action)
    }

    pub fn set_policy_status(&self, caller: Address, id: PolicyId, active: bool) -> Result<PolicyId> {
        self.store.set_policy_status(caller, id, active)
    }

    pub fn deactivate_policy(&self, caller: Address, id: PolicyId) -> Result<PolicyId> {
        self.store.deactivate_policy(caller, id)
    }

    pub fn add_condition(
        &self,
        caller: Address,
        policy_id: PolicyId,
        spec: ConditionSpec,
    ) -> Result<ConditionId> {
        self.store.add_condition(caller, policy_id, spec)
    }

    pub fn remove_condition(
        &self,
        caller: Address,
        policy_id: PolicyId,
        condition_id: ConditionId,
    ) -> Result<ConditionId> {
        self.store.remove_condition(caller, policy_id, condition_id)
    }

    pub fn find_matching(&self, resource: &str, action: &str) -> Vec<PolicyId> {
        self.store.find_matching(resource, action)
    }

    pub fn policy_count(&self) -> u64 {
        self.store.policy_count()
    }

    pub fn policy_info(&self, id: PolicyId) -> Result<Policy> {
        self.store.policy_info(id)
    }

    pub fn policy_condition_ids(&self, id: PolicyId) -> Result<Vec<ConditionId>> {
        self.store.policy_condition_ids(id)
    }

    pub fn condition(&self, id: ConditionId) -> Result<Arc<Condition>> {
        self.store.condition(id)
    }

    pub fn policies_by_owner(&self, owner: &Address) -> Vec<PolicyId> {
        self.store.policies_by_owner(owner)
    }

    pub fn condition_count(&self) -> usize {
        self.store.condition_count()
    }

    pub fn all_policies(&self) -> Vec<Policy> {
        self.store.all_policies()
    }

    /// Evaluate one stored condition; oracle failures count as unsatisfied
    pub async fn evaluate_condition(&self, id: ConditionId, account: Address) -> Result<bool> {
        let condition = self.store.condition(id)?;
        Ok(self
            .engine
            .evaluator()
            .evaluate_condition(&condition, account)
            .await)
    }

    /// Evaluate one stored condition, surfacing oracle failures
    pub async fn try_evaluate_condition(&self, id: ConditionId, account: Address) -> Result<bool> {
        let condition = self.store.condition(id)?;
        self.engine
            .evaluator()
            .try_evaluate_condition(&condition, account)
            .await
    }

    pub async fn check_access(&self, account: Address, resource: &str, action: &str) -> bool {
        self.engine.check_access(account, resource, action).await
    }

    pub async fn decide(&self, account: Address, resource: &str, action: &str) -> AccessDecision {
        self.engine.decide(account, resource, action).await
    }

    pub async fn check_policy_for_user(&self, policy_id: PolicyId, account: Address) -> Result<bool> {
        self.engine.check_policy_for_user(policy_id, account).await
    }

    /// Create every policy in `file`, in order
    ///
    /// Stops at the first invalid definition; policies created before it are
    /// kept.
    pub fn load_policy_file(&self, file: &PolicyFile) -> Result<Vec<PolicyId>> {
        let mut created = Vec::with_capacity(file.policies.len());

        for definition in &file.policies {
            let owner = parse_address("owner", &definition.owner)?;
            let id = self.store.create_policy(
                owner,
                &definition.name,
                &definition.resource,
                &definition.action,
            )?;
            for spec in &definition.conditions {
                self.store.add_condition(owner, id, spec.clone())?;
            }
            if !definition.active {
                self.store.set_policy_status(owner, id, false)?;
            }
            created.push(id);
        }

        info!(policies = created.len(), "policy file loaded");
        Ok(created)
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Builder for [`Pbac`]
pub struct PbacBuilder {
    oracle: Option<Arc<dyn LedgerOracle>>,
    config: EngineConfig,
}

impl PbacBuilder {
    pub fn new() -> Self {
        PbacBuilder {
            oracle: None,
            config: EngineConfig::default(),
        }
    }

    /// Ledger the conditions are evaluated against (required)
    pub fn oracle(mut self, oracle: Arc<dyn LedgerOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn strategy(mut self, strategy: EvaluationStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn oracle_timeout(mut self, timeout: Duration) -> Self {
        self.config.oracle_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn max_concurrent_queries(mut self, limit: usize) -> Self {
        self.config.max_concurrent_queries = limit;
        self
    }

    pub fn audit_capacity(mut self, capacity: usize) -> Self {
        self.config.audit_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<Pbac> {
        let oracle = self
            .oracle
            .ok_or_else(|| PbacError::InvalidArgument("a ledger oracle must be set".to_string()))?;
        self.config.validate()?;

        debug!(
            strategy = ?self.config.strategy,
            oracle_timeout_ms = self.config.oracle_timeout_ms,
            max_concurrent_queries = self.config.max_concurrent_queries,
            "building pbac engine"
        );

        Ok(Pbac::assemble(oracle, self.config))
    }
}

impl Default for PbacBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_oracle() {
        let err = PbacBuilder::new().build().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = Pbac::builder()
            .oracle(Arc::new(MemoryLedger::new()))
            .max_concurrent_queries(0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_applies_settings() {
        let pbac = Pbac::builder()
            .oracle(Arc::new(MemoryLedger::new()))
            .strategy(EvaluationStrategy::Sequential)
            .oracle_timeout(Duration::from_millis(750))
            .audit_capacity(4)
            .build()
            .unwrap();

        assert_eq!(pbac.config().strategy, EvaluationStrategy::Sequential);
        assert_eq!(pbac.config().oracle_timeout_ms, 750);
        assert_eq!(pbac.audit().capacity(), 4);
    }

    #[test]
    fn test_load_policy_file() {
        let file = PolicyFile::from_toml_str(
            r#"
[[policy]]
owner = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
name = "ETH余额策略"
resource = "secret-document"
action = "read"

[[policy.condition]]
chain = "ethereum"
method = "eth_getBalance"
parameters = [":userAddress", "latest"]
comparator = ">="
value = "1000000000000"

[[policy]]
owner = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
name = "retired"
resource = "secret-document"
action = "write"
active = false
"#,
        )
        .unwrap();

        let pbac = Pbac::with_oracle(Arc::new(MemoryLedger::new()));
        let ids = pbac.load_policy_file(&file).unwrap();

        assert_eq!(ids, vec![0, 1]);
        assert_eq!(pbac.policy_condition_ids(0).unwrap(), vec![0]);
        assert!(!pbac.policy_info(1).unwrap().is_active);
        assert_eq!(pbac.find_matching("secret-document", "read"), vec![0]);
    }

    #[test]
    fn test_load_policy_file_rejects_bad_owner() {
        let file = PolicyFile::from_toml_str(
            r#"
[[policy]]
owner = "not-an-address"
name = "p"
resource = "r"
action = "a"
"#,
        )
        .unwrap();

        let pbac = Pbac::with_oracle(Arc::new(MemoryLedger::new()));
        let err = pbac.load_policy_file(&file).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(pbac.policy_count(), 0);
    }

    #[tokio::test]
    async fn test_evaluate_condition_by_id() {
        let ledger = Arc::new(MemoryLedger::new());
        let pbac = Pbac::with_oracle(ledger.clone());
        let owner = Address::repeat_byte(0x01);
        let user = Address::repeat_byte(0x02);

        let policy = pbac.create_policy(owner, "p", "doc", "read").unwrap();
        let cond = pbac
            .add_condition(owner, policy, ConditionSpec::native_balance(">=", "10"))
            .unwrap();

        assert!(!pbac.evaluate_condition(cond, user).await.unwrap());
        ledger.set_native_balance(user, U256::from(10u64));
        assert!(pbac.try_evaluate_condition(cond, user).await.unwrap());

        let err = pbac.evaluate_condition(42, user).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
