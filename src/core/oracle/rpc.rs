//! Ethereum JSON-RPC oracle
//!
//! Native balances come from `eth_getBalance`; token state from `eth_call`
//! with ABI-encoded calldata:
//!
//! | Call | Selector |
//! |------|----------|
//! | `balanceOf(address)` (ERC20) | `0x70a08231` |
//! | `balanceOf(address,uint256)` (ERC1155) | `0x00fdd58e` |
//! | `ownerOf(uint256)` (ERC721) | `0x6352211e` |
//!
//! Each argument occupies one 32-byte word: addresses are left-padded,
//! integers are big-endian.

use super::{LedgerOracle, OracleError};
use crate::core::condition::Chain;
use crate::validation::BlockTag;
use alloy_primitives::{hex, Address, U256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// `balanceOf(address)`
pub const ERC20_BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// `balanceOf(address,uint256)`
pub const ERC1155_BALANCE_OF_SELECTOR: [u8; 4] = [0x00, 0xfd, 0xd5, 0x8e];

/// `ownerOf(uint256)`
pub const ERC721_OWNER_OF_SELECTOR: [u8; 4] = [0x63, 0x52, 0x21, 0x1e];

/// JSON-RPC error code geth uses for reverted calls
const EXECUTION_REVERTED: i64 = 3;

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: Option<Value>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// [`LedgerOracle`] backed by an Ethereum JSON-RPC endpoint
#[derive(Debug)]
pub struct JsonRpcLedger {
    client: reqwest::Client,
    endpoint: String,
    chain: Chain,
    next_id: AtomicU64,
}

impl JsonRpcLedger {
    /// Connect to `endpoint` with a per-request transport timeout
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| OracleError::Unreachable(e.to_string()))?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        JsonRpcLedger {
            client,
            endpoint: endpoint.into(),
            chain: Chain::Ethereum,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn check_chain(&self, chain: Chain) -> Result<(), OracleError> {
        if chain != self.chain {
            return Err(OracleError::UnsupportedChain(chain));
        }
        Ok(())
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, OracleError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(endpoint = %self.endpoint, method, id, "json-rpc request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Unreachable(format!(
                "{} returned HTTP {}",
                self.endpoint, status
            )));
        }

        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|e| OracleError::MalformedResponse(e.to_string()))?;

        if let Some(error) = envelope.error {
            if error.code == EXECUTION_REVERTED || error.message.contains("revert") {
                return Err(OracleError::Reverted(error.message));
            }
            return Err(OracleError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        envelope.result.ok_or_else(|| {
            OracleError::MalformedResponse("response carries neither result nor error".to_string())
        })
    }

    async fn call(&self, contract: Address, calldata: Vec<u8>) -> Result<Vec<u8>, OracleError> {
        let params = json!([
            {
                "to": contract.to_string(),
                "data": hex::encode_prefixed(&calldata),
            },
            "latest"
        ]);
        let result = self.request("eth_call", params).await?;
        decode_bytes(&result)
    }
}

#[async_trait]
impl LedgerOracle for JsonRpcLedger {
    async fn native_balance(
        &self,
        chain: Chain,
        holder: Address,
        block: BlockTag,
    ) -> Result<U256, OracleError> {
        self.check_chain(chain)?;
        let result = self
            .request(
                "eth_getBalance",
                json!([holder.to_string(), block.to_rpc_param()]),
            )
            .await?;
        decode_quantity(&result)
    }

    async fn erc20_balance_of(
        &self,
        chain: Chain,
        contract: Address,
        holder: Address,
    ) -> Result<U256, OracleError> {
        self.check_chain(chain)?;
        let calldata = encode_call(ERC20_BALANCE_OF_SELECTOR, &[address_word(holder)]);
        decode_uint(&self.call(contract, calldata).await?)
    }

    async fn erc1155_balance_of(
        &self,
        chain: Chain,
        contract: Address,
        holder: Address,
        token_id: U256,
    ) -> Result<U256, OracleError> {
        self.check_chain(chain)?;
        let calldata = encode_call(
            ERC1155_BALANCE_OF_SELECTOR,
            &[address_word(holder), uint_word(token_id)],
        );
        decode_uint(&self.call(contract, calldata).await?)
    }

    async fn erc721_owner_of(
        &self,
        chain: Chain,
        contract: Address,
        token_id: U256,
    ) -> Result<Address, OracleError> {
        self.check_chain(chain)?;
        let calldata = encode_call(ERC721_OWNER_OF_SELECTOR, &[uint_word(token_id)]);
        decode_address(&self.call(contract, calldata).await?)
    }
}

/// Selector followed by 32-byte argument words
pub fn encode_call(selector: [u8; 4], words: &[[u8; 32]]) -> Vec<u8> {
    let mut calldata = Vec::with_capacity(4 + 32 * words.len());
    calldata.extend_from_slice(&selector);
    for word in words {
        calldata.extend_from_slice(word);
    }
    calldata
}

fn address_word(address: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    word
}

fn uint_word(value: U256) -> [u8; 32] {
    value.to_be_bytes::<32>()
}

/// First return word as an unsigned integer
pub fn decode_uint(data: &[u8]) -> Result<U256, OracleError> {
    if data.len() < 32 {
        return Err(OracleError::MalformedResponse(format!(
            "expected a 32-byte word, got {} bytes",
            data.len()
        )));
    }
    Ok(U256::from_be_slice(&data[..32]))
}

/// First return word as an address (upper 12 bytes must be zero)
pub fn decode_address(data: &[u8]) -> Result<Address, OracleError> {
    if data.len() < 32 {
        return Err(OracleError::MalformedResponse(format!(
            "expected a 32-byte word, got {} bytes",
            data.len()
        )));
    }
    if data[..12].iter().any(|b| *b != 0) {
        return Err(OracleError::MalformedResponse(
            "address word has non-zero padding".to_string(),
        ));
    }
    Ok(Address::from_slice(&data[12..32]))
}

fn decode_bytes(value: &Value) -> Result<Vec<u8>, OracleError> {
    let text = value
        .as_str()
        .ok_or_else(|| OracleError::MalformedResponse(format!("expected hex string, got {}", value)))?;
    hex::decode(text).map_err(|e| OracleError::MalformedResponse(e.to_string()))
}

/// Hex quantity such as `"0x1bc16d674ec80000"`
fn decode_quantity(value: &Value) -> Result<U256, OracleError> {
    let text = value
        .as_str()
        .ok_or_else(|| OracleError::MalformedResponse(format!("expected quantity, got {}", value)))?;
    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| OracleError::MalformedResponse(format!("quantity '{}' lacks 0x prefix", text)))?;
    if digits.is_empty() {
        return Err(OracleError::MalformedResponse("empty quantity".to_string()));
    }
    U256::from_str_radix(digits, 16)
        .map_err(|e| OracleError::MalformedResponse(format!("quantity '{}': {}", text, e)))
}
