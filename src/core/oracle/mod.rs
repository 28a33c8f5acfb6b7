//! Read-only ledger oracles
//!
//! Conditions are resolved against live ledger state through [`LedgerOracle`].
//! Two implementations ship with the crate:
//! - [`MemoryLedger`]: in-process balances and owners with fault injection
//! - [`JsonRpcLedger`]: Ethereum JSON-RPC over HTTP

mod memory;
mod rpc;

pub use memory::MemoryLedger;
pub use rpc::JsonRpcLedger;

use crate::core::condition::{Chain, ConditionSource, Observation};
use crate::validation::BlockTag;
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use thiserror::Error;

/// Failure of a single external read
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Oracle unreachable: {0}")]
    Unreachable(String),

    #[error("Call reverted: {0}")]
    Reverted(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Chain not served by this oracle: {0}")]
    UnsupportedChain(Chain),
}

/// Source of native balances and token contract state
#[async_trait]
pub trait LedgerOracle: Send + Sync {
    /// Native asset balance of `holder` at `block`
    async fn native_balance(
        &self,
        chain: Chain,
        holder: Address,
        block: BlockTag,
    ) -> Result<U256, OracleError>;

    /// ERC20 `balanceOf(holder)`
    async fn erc20_balance_of(
        &self,
        chain: Chain,
        contract: Address,
        holder: Address,
    ) -> Result<U256, OracleError>;

    /// ERC1155 `balanceOf(holder, token_id)`
    async fn erc1155_balance_of(
        &self,
        chain: Chain,
        contract: Address,
        holder: Address,
        token_id: U256,
    ) -> Result<U256, OracleError>;

    /// ERC721 `ownerOf(token_id)`
    async fn erc721_owner_of(
        &self,
        chain: Chain,
        contract: Address,
        token_id: U256,
    ) -> Result<Address, OracleError>;
}

/// Perform the read described by `source` for `account`
pub async fn observe(
    oracle: &dyn LedgerOracle,
    chain: Chain,
    source: &ConditionSource,
    account: Address,
) -> Result<Observation, OracleError> {
    let observation = match *source {
        ConditionSource::Native { holder, block } => Observation::Amount(
            oracle
                .native_balance(chain, holder.resolve(account), block)
                .await?,
        ),
        ConditionSource::Erc20 { contract, holder } => Observation::Amount(
            oracle
                .erc20_balance_of(chain, contract, holder.resolve(account))
                .await?,
        ),
        ConditionSource::Erc1155 {
            contract,
            holder,
            token_id,
        } => Observation::Amount(
            oracle
                .erc1155_balance_of(chain, contract, holder.resolve(account), token_id)
                .await?,
        ),
        ConditionSource::Erc721 { contract, token_id } => {
            Observation::Owner(oracle.erc721_owner_of(chain, contract, token_id).await?)
        }
    };
    Ok(observation)
}
