//! Condition records and the standard/method validity table
//!
//! A condition states a fact about ledger state that must hold for an account:
//! - Native balance of a holder at a block, compared numerically
//! - ERC20 / ERC1155 token balance of a holder, compared numerically
//! - ERC721 owner of a token id, compared by address equality
//!
//! Callers describe conditions with loosely-typed strings ([`ConditionSpec`]);
//! [`ConditionSpec::compile`] turns them into a [`ConditionSource`] variant so
//! that every stored condition is one of the four valid shapes.

mod comparator;

pub use comparator::Comparator;

use crate::core::policy::PolicyId;
use crate::error::{PbacError, Result};
use crate::validation::{parse_address, parse_uint, BlockTag, Subject};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a condition record
pub type ConditionId = u64;

/// Ledger a condition is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
}

impl Chain {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PbacError::invalid("chain must not be empty"));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "ethereum" => Ok(Chain::Ethereum),
            _ => Err(PbacError::UnsupportedChain(trimmed.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token standard of the contract a condition reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenStandard {
    /// The chain's native asset, no contract involved
    None,
    #[serde(rename = "ERC20")]
    Erc20,
    #[serde(rename = "ERC721")]
    Erc721,
    #[serde(rename = "ERC1155")]
    Erc1155,
}

impl TokenStandard {
    /// Parse a standard name; the empty string means the native asset
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "" | "NONE" | "NATIVE" => Ok(TokenStandard::None),
            "ERC20" => Ok(TokenStandard::Erc20),
            "ERC721" => Ok(TokenStandard::Erc721),
            "ERC1155" => Ok(TokenStandard::Erc1155),
            _ => Err(PbacError::invalid(format!(
                "unknown token standard '{}'",
                raw
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStandard::None => "None",
            TokenStandard::Erc20 => "ERC20",
            TokenStandard::Erc721 => "ERC721",
            TokenStandard::Erc1155 => "ERC1155",
        }
    }
}

impl fmt::Display for TokenStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External read a condition performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    NativeBalance,
    TokenBalance,
    TokenOwner,
}

impl Method {
    /// Parse a method name, accepting the RPC/ABI spelling, the descriptive
    /// one, or both joined with `/`
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "eth_getBalance" | "NativeBalance" | "eth_getBalance/NativeBalance" => {
                Ok(Method::NativeBalance)
            }
            "balanceOf" | "TokenBalance" | "balanceOf/TokenBalance" => Ok(Method::TokenBalance),
            "ownerOf" | "TokenOwner" | "ownerOf/TokenOwner" => Ok(Method::TokenOwner),
            other => Err(PbacError::UnsupportedMethod(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::NativeBalance => "NativeBalance",
            Method::TokenBalance => "TokenBalance",
            Method::TokenOwner => "TokenOwner",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a condition's observed value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionSource {
    /// Native balance of `holder` at `block`
    Native { holder: Subject, block: BlockTag },
    /// `contract.balanceOf(holder)`
    Erc20 { contract: Address, holder: Subject },
    /// `contract.balanceOf(holder, token_id)`
    Erc1155 {
        contract: Address,
        holder: Subject,
        token_id: U256,
    },
    /// `contract.ownerOf(token_id)`
    Erc721 { contract: Address, token_id: U256 },
}

impl ConditionSource {
    pub fn standard(&self) -> TokenStandard {
        match self {
            ConditionSource::Native { .. } => TokenStandard::None,
            ConditionSource::Erc20 { .. } => TokenStandard::Erc20,
            ConditionSource::Erc1155 { .. } => TokenStandard::Erc1155,
            ConditionSource::Erc721 { .. } => TokenStandard::Erc721,
        }
    }

    pub fn method(&self) -> Method {
        match self {
            ConditionSource::Native { .. } => Method::NativeBalance,
            ConditionSource::Erc20 { .. } | ConditionSource::Erc1155 { .. } => {
                Method::TokenBalance
            }
            ConditionSource::Erc721 { .. } => Method::TokenOwner,
        }
    }

    pub fn contract(&self) -> Option<Address> {
        match self {
            ConditionSource::Native { .. } => None,
            ConditionSource::Erc20 { contract, .. }
            | ConditionSource::Erc1155 { contract, .. }
            | ConditionSource::Erc721 { contract, .. } => Some(*contract),
        }
    }
}

/// Value a condition compares against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Base-unit amount for balance reads
    Amount(U256),
    /// Expected (or excluded) owner for ownership reads
    Owner(Subject),
}

/// Value read from the ledger for one condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Amount(U256),
    Owner(Address),
}

/// Caller-facing condition description, as typed into a form or a policy file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConditionSpec {
    /// Token contract; empty for the native asset
    pub contract_address: String,
    /// `""`/`None`, `ERC20`, `ERC721` or `ERC1155`
    pub standard_type: String,
    pub chain: String,
    /// `eth_getBalance`, `balanceOf` or `ownerOf` (or the descriptive names)
    pub method: String,
    pub parameters: Vec<String>,
    pub comparator: String,
    pub value: String,
}

impl ConditionSpec {
    /// Native balance of the evaluated account at the latest block
    pub fn native_balance(comparator: &str, value: &str) -> Self {
        ConditionSpec {
            contract_address: String::new(),
            standard_type: String::new(),
            chain: Chain::Ethereum.as_str().to_string(),
            method: "eth_getBalance".to_string(),
            parameters: vec![":userAddress".to_string(), "latest".to_string()],
            comparator: comparator.to_string(),
            value: value.to_string(),
        }
    }

    /// ERC20 balance of the evaluated account
    pub fn erc20_balance(contract: &str, comparator: &str, value: &str) -> Self {
        ConditionSpec {
            contract_address: contract.to_string(),
            standard_type: "ERC20".to_string(),
            chain: Chain::Ethereum.as_str().to_string(),
            method: "balanceOf".to_string(),
            parameters: vec![":userAddress".to_string()],
            comparator: comparator.to_string(),
            value: value.to_string(),
        }
    }

    /// ERC1155 balance of `token_id` held by the evaluated account
    pub fn erc1155_balance(contract: &str, token_id: &str, comparator: &str, value: &str) -> Self {
        ConditionSpec {
            contract_address: contract.to_string(),
            standard_type: "ERC1155".to_string(),
            chain: Chain::Ethereum.as_str().to_string(),
            method: "balanceOf".to_string(),
            parameters: vec![":userAddress".to_string(), token_id.to_string()],
            comparator: comparator.to_string(),
            value: value.to_string(),
        }
    }

    /// ERC721 ownership of `token_id`; `owner` may be `:userAddress`
    pub fn erc721_owner(contract: &str, token_id: &str, comparator: &str, owner: &str) -> Self {
        ConditionSpec {
            contract_address: contract.to_string(),
            standard_type: "ERC721".to_string(),
            chain: Chain::Ethereum.as_str().to_string(),
            method: "ownerOf".to_string(),
            parameters: vec![token_id.to_string()],
            comparator: comparator.to_string(),
            value: owner.to_string(),
        }
    }

    /// Validate against the standard/method table and produce typed parts
    ///
    /// | standard | method        | parameters            | comparators  |
    /// |----------|---------------|-----------------------|--------------|
    /// | None     | NativeBalance | holder [, block tag]  | all          |
    /// | ERC20    | TokenBalance  | holder                | all          |
    /// | ERC1155  | TokenBalance  | holder, token id      | all          |
    /// | ERC721   | TokenOwner    | token id              | `==` / `!=`  |
    pub fn compile(&self) -> Result<CompiledCondition> {
        let chain = Chain::parse(&self.chain)?;
        let method = Method::parse(&self.method)?;
        let standard = TokenStandard::parse(&self.standard_type)?;
        let comparator = Comparator::parse(&self.comparator)?;

        let source = match (standard, method) {
            (TokenStandard::None, Method::NativeBalance) => {
                if !self.contract_address.trim().is_empty() {
                    return Err(PbacError::invalid(
                        "native balance conditions take no contract address",
                    ));
                }
                self.expect_parameters(1..=2)?;
                let holder = Subject::parse("holder", &self.parameters[0])?;
                let block = match self.parameters.get(1) {
                    Some(tag) => BlockTag::parse(tag)?,
                    None => BlockTag::Latest,
                };
                ConditionSource::Native { holder, block }
            }
            (TokenStandard::Erc20, Method::TokenBalance) => {
                let contract = parse_address("contract address", &self.contract_address)?;
                self.expect_parameters(1..=1)?;
                let holder = Subject::parse("holder", &self.parameters[0])?;
                ConditionSource::Erc20 { contract, holder }
            }
            (TokenStandard::Erc1155, Method::TokenBalance) => {
                let contract = parse_address("contract address", &self.contract_address)?;
                self.expect_parameters(2..=2)?;
                let holder = Subject::parse("holder", &self.parameters[0])?;
                let token_id = parse_uint("token id", &self.parameters[1])?;
                ConditionSource::Erc1155 {
                    contract,
                    holder,
                    token_id,
                }
            }
            (TokenStandard::Erc721, Method::TokenOwner) => {
                let contract = parse_address("contract address", &self.contract_address)?;
                self.expect_parameters(1..=1)?;
                let token_id = parse_uint("token id", &self.parameters[0])?;
                ConditionSource::Erc721 { contract, token_id }
            }
            (standard, method) => {
                return Err(PbacError::invalid(format!(
                    "method {} is not valid for token standard {}",
                    method, standard
                )));
            }
        };

        let target = match source.method() {
            Method::NativeBalance | Method::TokenBalance => {
                Target::Amount(parse_uint("value", &self.value)?)
            }
            Method::TokenOwner => {
                if !comparator.is_equality() {
                    return Err(PbacError::invalid(format!(
                        "ownership conditions only support == and !=, got {}",
                        comparator
                    )));
                }
                Target::Owner(Subject::parse("value", &self.value)?)
            }
        };

        Ok(CompiledCondition {
            chain,
            source,
            comparator,
            target,
        })
    }

    fn expect_parameters(&self, allowed: std::ops::RangeInclusive<usize>) -> Result<()> {
        if allowed.contains(&self.parameters.len()) {
            return Ok(());
        }
        let expected = if allowed.start() == allowed.end() {
            allowed.start().to_string()
        } else {
            format!("{} to {}", allowed.start(), allowed.end())
        };
        Err(PbacError::invalid(format!(
            "{} conditions take {} parameter(s), got {}",
            self.method.trim(),
            expected,
            self.parameters.len()
        )))
    }
}

/// Typed result of [`ConditionSpec::compile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompiledCondition {
    pub chain: Chain,
    pub source: ConditionSource,
    pub comparator: Comparator,
    pub target: Target,
}

/// Stored condition record
///
/// Immutable once created; replaced only by remove + add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub id: ConditionId,
    pub policy_id: PolicyId,
    pub chain: Chain,
    pub source: ConditionSource,
    pub comparator: Comparator,
    pub target: Target,
    /// Parameter list exactly as supplied
    pub parameters: Vec<String>,
    /// Target value exactly as supplied
    pub value: String,
}

impl Condition {
    pub(crate) fn new(
        id: ConditionId,
        policy_id: PolicyId,
        compiled: CompiledCondition,
        spec: ConditionSpec,
    ) -> Self {
        Condition {
            id,
            policy_id,
            chain: compiled.chain,
            source: compiled.source,
            comparator: compiled.comparator,
            target: compiled.target,
            parameters: spec.parameters,
            value: spec.value,
        }
    }

    pub fn standard(&self) -> TokenStandard {
        self.source.standard()
    }

    pub fn method(&self) -> Method {
        self.source.method()
    }

    /// Token contract, `None` for native balance conditions
    pub fn contract_address(&self) -> Option<Address> {
        self.source.contract()
    }

    /// Apply the comparator between an observed value and the target
    ///
    /// Fails with `UnsupportedMethod` when the observation does not belong to
    /// the condition's comparison domain.
    pub fn holds(&self, observation: Observation, account: Address) -> Result<bool> {
        match (&self.target, observation) {
            (Target::Amount(expected), Observation::Amount(actual)) => {
                Ok(self.comparator.compare(&actual, expected))
            }
            (Target::Owner(subject), Observation::Owner(actual)) => {
                let expected = subject.resolve(account);
                Ok(self.comparator.compare(&actual, &expected))
            }
            (_, observation) => Err(PbacError::UnsupportedMethod(format!(
                "{} condition {} cannot compare {:?}",
                self.method(),
                self.id,
                observation
            ))),
        }
    }
}
