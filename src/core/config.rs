//! Engine configuration and policy files
//!
//! Both are TOML documents. A policy file embeds an optional `[engine]`
//! table, an optional `[rpc]` table and any number of `[[policy]]` entries,
//! each with nested `[[policy.condition]]` entries:
//!
//! ```toml
//! [engine]
//! oracle_timeout_ms = 3000
//! strategy = "sequential"
//!
//! [rpc]
//! endpoint = "http://127.0.0.1:8545"
//!
//! [[policy]]
//! owner = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
//! name = "ETH余额策略"
//! resource = "secret-document"
//! action = "read"
//!
//! [[policy.condition]]
//! chain = "ethereum"
//! method = "eth_getBalance"
//! parameters = [":userAddress", "latest"]
//! comparator = ">="
//! value = "1000000000000"
//! ```

use crate::core::condition::ConditionSpec;
use crate::error::{PbacError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How sibling futures are driven during a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStrategy {
    /// One oracle call at a time, in list order
    Sequential,
    /// Siblings in flight together, bounded by `max_concurrent_queries`
    #[default]
    Concurrent,
}

/// Tunables for evaluation and auditing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on a single oracle read
    pub oracle_timeout_ms: u64,
    pub strategy: EvaluationStrategy,
    /// Conditions of one policy queried at once under `Concurrent`
    pub max_concurrent_queries: usize,
    /// Audit records kept in memory
    pub audit_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            oracle_timeout_ms: 5_000,
            strategy: EvaluationStrategy::Concurrent,
            max_concurrent_queries: 8,
            audit_capacity: 1024,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.oracle_timeout_ms == 0 {
            return Err(PbacError::invalid("oracle_timeout_ms must be positive"));
        }
        if self.max_concurrent_queries == 0 {
            return Err(PbacError::invalid("max_concurrent_queries must be positive"));
        }
        if self.audit_capacity == 0 {
            return Err(PbacError::invalid("audit_capacity must be positive"));
        }
        Ok(())
    }
}

/// JSON-RPC connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcSettings {
    pub endpoint: String,
}

/// Policy seeded from a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDefinition {
    /// Owner address (hex)
    pub owner: String,
    pub name: String,
    pub resource: String,
    pub action: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, rename = "condition")]
    pub conditions: Vec<ConditionSpec>,
}

fn default_active() -> bool {
    true
}

/// Engine settings plus seed policies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyFile {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub rpc: Option<RpcSettings>,
    #[serde(default, rename = "policy")]
    pub policies: Vec<PolicyDefinition>,
}

impl PolicyFile {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: PolicyFile = toml::from_str(raw)?;
        file.engine.validate()?;
        Ok(file)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}
