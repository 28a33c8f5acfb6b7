//! Validation of caller-supplied policy and condition literals
//!
//! Every string that reaches the stores passes through one of these helpers
//! first, so a record that is stored is always well-formed:
//! - Policy fields (name, resource, action) must be non-empty
//! - Addresses are 20-byte hex literals, `0x` prefix optional, any case
//! - Amounts and token ids are unsigned 256-bit integers (decimal or `0x` hex)
//! - The `:userAddress` placeholder stands for the account under evaluation

use crate::error::{PbacError, Result};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder substituted with the subject account at evaluation time
pub const USER_ADDRESS_PLACEHOLDER: &str = ":userAddress";

/// Reject empty or whitespace-only policy fields
///
/// Values are otherwise kept verbatim: resource and action matching is an
/// exact, case-sensitive comparison.
///
/// # Examples
///
/// ```
/// use pbac::core::validation::require_non_empty;
///
/// assert!(require_non_empty("resource", "secret-document").is_ok());
/// assert!(require_non_empty("resource", "").is_err());
/// assert!(require_non_empty("action", "   ").is_err());
/// ```
pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PbacError::invalid(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Parse a 20-byte address literal
pub fn parse_address(field: &str, raw: &str) -> Result<Address> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PbacError::invalid(format!("{} must not be empty", field)));
    }
    trimmed.parse::<Address>().map_err(|e| {
        PbacError::invalid(format!("{} '{}' is not a valid address: {}", field, raw, e))
    })
}

/// Parse an unsigned 256-bit integer (decimal, or hex with `0x` prefix)
///
/// # Examples
///
/// ```
/// use alloy_primitives::U256;
/// use pbac::core::validation::parse_uint;
///
/// assert_eq!(parse_uint("value", "1000000000000").unwrap(), U256::from(1_000_000_000_000u64));
/// assert_eq!(parse_uint("value", "0xff").unwrap(), U256::from(255u64));
/// assert!(parse_uint("value", "-1").is_err());
/// assert!(parse_uint("value", "1.5").is_err());
/// assert!(parse_uint("value", "1_000").is_err());
/// ```
pub fn parse_uint(field: &str, raw: &str) -> Result<U256> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PbacError::invalid(format!("{} must not be empty", field)));
    }

    let not_uint = || {
        PbacError::invalid(format!(
            "{} '{}' is not an unsigned 256-bit integer",
            field, raw
        ))
    };

    // from_str_radix skips '_' separators, so check the digits first
    let (digits, radix) = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) if hex.is_empty() => {
            return Err(PbacError::invalid(format!("{} '{}' has no digits", field, raw)));
        }
        Some(hex) if hex.bytes().all(|b| b.is_ascii_hexdigit()) => (hex, 16),
        None if trimmed.bytes().all(|b| b.is_ascii_digit()) => (trimmed, 10),
        _ => return Err(not_uint()),
    };

    U256::from_str_radix(digits, radix).map_err(|_| not_uint())
}

/// Whose address a condition refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    /// The account being evaluated (`:userAddress`)
    User,
    /// A fixed address written into the condition
    Fixed(Address),
}

impl Subject {
    /// Parse a holder/owner literal: the placeholder or an address
    pub fn parse(field: &str, raw: &str) -> Result<Self> {
        if raw.trim() == USER_ADDRESS_PLACEHOLDER {
            return Ok(Subject::User);
        }
        parse_address(field, raw).map(Subject::Fixed)
    }

    /// Substitute the placeholder with the account under evaluation
    pub fn resolve(&self, account: Address) -> Address {
        match self {
            Subject::User => account,
            Subject::Fixed(address) => *address,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::User => f.write_str(USER_ADDRESS_PLACEHOLDER),
            Subject::Fixed(address) => write!(f, "{}", address),
        }
    }
}

/// Block at which a native balance is read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockTag {
    #[default]
    Latest,
    Earliest,
    Pending,
    Safe,
    Finalized,
    Number(u64),
}

impl BlockTag {
    /// Parse a block tag or block number (decimal or `0x` hex)
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let tag = match trimmed.to_ascii_lowercase().as_str() {
            "latest" => BlockTag::Latest,
            "earliest" => BlockTag::Earliest,
            "pending" => BlockTag::Pending,
            "safe" => BlockTag::Safe,
            "finalized" => BlockTag::Finalized,
            _ => {
                let number = parse_uint("block tag", trimmed)?;
                let number = u64::try_from(number).map_err(|_| {
                    PbacError::invalid(format!("block number '{}' is out of range", raw))
                })?;
                BlockTag::Number(number)
            }
        };
        Ok(tag)
    }

    /// Render as an Ethereum JSON-RPC block parameter
    pub fn to_rpc_param(&self) -> String {
        match self {
            BlockTag::Latest => "latest".to_string(),
            BlockTag::Earliest => "earliest".to_string(),
            BlockTag::Pending => "pending".to_string(),
            BlockTag::Safe => "safe".to_string(),
            BlockTag::Finalized => "finalized".to_string(),
            BlockTag::Number(n) => format!("{:#x}", n),
        }
    }
}
