//! In-memory ledger
//!
//! Holds native balances and token state in process. Contracts exist once any
//! state has been set for them; reads against unknown contracts fail the way a
//! call to an empty address would. Faults and latency can be injected to
//! exercise fail-closed evaluation.

use super::{LedgerOracle, OracleError};
use crate::core::condition::Chain;
use crate::validation::BlockTag;
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ContractKind {
    Erc20,
    Erc721,
    Erc1155,
}

#[derive(Debug, Default)]
struct LedgerState {
    native: HashMap<Address, U256>,
    contracts: HashMap<Address, ContractKind>,
    fungible: HashMap<(Address, Address), U256>,
    multi: HashMap<(Address, Address, U256), U256>,
    owners: HashMap<(Address, U256), Address>,
    failing: HashSet<Address>,
    native_offline: bool,
    latency: Option<Duration>,
}

/// In-process [`LedgerOracle`]
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: RwLock<LedgerState>,
    calls: AtomicUsize,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_native_balance(&self, holder: Address, balance: U256) {
        self.state.write().native.insert(holder, balance);
    }

    pub fn set_erc20_balance(&self, contract: Address, holder: Address, balance: U256) {
        let mut state = self.state.write();
        state.contracts.insert(contract, ContractKind::Erc20);
        state.fungible.insert((contract, holder), balance);
    }

    pub fn set_erc1155_balance(
        &self,
        contract: Address,
        holder: Address,
        token_id: U256,
        balance: U256,
    ) {
        let mut state = self.state.write();
        state.contracts.insert(contract, ContractKind::Erc1155);
        state.multi.insert((contract, holder, token_id), balance);
    }

    pub fn set_erc721_owner(&self, contract: Address, token_id: U256, owner: Address) {
        let mut state = self.state.write();
        state.contracts.insert(contract, ContractKind::Erc721);
        state.owners.insert((contract, token_id), owner);
    }

    /// Make every read against `contract` fail as unreachable
    pub fn fail_contract(&self, contract: Address) {
        self.state.write().failing.insert(contract);
    }

    pub fn restore_contract(&self, contract: Address) {
        self.state.write().failing.remove(&contract);
    }

    /// Make native balance reads fail as unreachable
    pub fn set_native_offline(&self, offline: bool) {
        self.state.write().native_offline = offline;
    }

    /// Delay every read by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state.write().latency = latency;
    }

    /// Number of reads served (including failed ones)
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn begin_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = self.state.read().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_contract(&self, contract: Address, expected: ContractKind) -> Result<(), OracleError> {
        let state = self.state.read();
        if state.failing.contains(&contract) {
            return Err(OracleError::Unreachable(format!(
                "contract {} is not responding",
                contract
            )));
        }
        match state.contracts.get(&contract) {
            Some(kind) if *kind == expected => Ok(()),
            Some(_) => Err(OracleError::Reverted(format!(
                "contract {} does not implement the requested interface",
                contract
            ))),
            None => Err(OracleError::MalformedResponse(format!(
                "no contract code at {}",
                contract
            ))),
        }
    }
}

#[async_trait]
impl LedgerOracle for MemoryLedger {
    async fn native_balance(
        &self,
        _chain: Chain,
        holder: Address,
        _block: BlockTag,
    ) -> Result<U256, OracleError> {
        self.begin_call().await;
        let state = self.state.read();
        if state.native_offline {
            return Err(OracleError::Unreachable("native ledger offline".to_string()));
        }
        Ok(state.native.get(&holder).copied().unwrap_or(U256::ZERO))
    }

    async fn erc20_balance_of(
        &self,
        _chain: Chain,
        contract: Address,
        holder: Address,
    ) -> Result<U256, OracleError> {
        self.begin_call().await;
        self.check_contract(contract, ContractKind::Erc20)?;
        let state = self.state.read();
        Ok(state
            .fungible
            .get(&(contract, holder))
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn erc1155_balance_of(
        &self,
        _chain: Chain,
        contract: Address,
        holder: Address,
        token_id: U256,
    ) -> Result<U256, OracleError> {
        self.begin_call().await;
        self.check_contract(contract, ContractKind::Erc1155)?;
        let state = self.state.read();
        Ok(state
            .multi
            .get(&(contract, holder, token_id))
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn erc721_owner_of(
        &self,
        _chain: Chain,
        contract: Address,
        token_id: U256,
    ) -> Result<Address, OracleError> {
        self.begin_call().await;
        self.check_contract(contract, ContractKind::Erc721)?;
        let state = self.state.read();
        state
            .owners
            .get(&(contract, token_id))
            .copied()
            .ok_or_else(|| OracleError::Reverted(format!("ERC721: invalid token ID {}", token_id)))
    }
}
