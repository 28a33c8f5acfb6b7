use crate::core::condition::ConditionId;
use crate::core::policy::PolicyId;
use alloy_primitives::Address;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PbacError {
    #[error("Unauthorized: {caller} is not the owner of policy {policy_id}")]
    Unauthorized { caller: Address, policy_id: PolicyId },

    #[error("Policy not found: {0}")]
    PolicyNotFound(PolicyId),

    #[error("Condition not found: {0}")]
    ConditionNotFound(ConditionId),

    #[error("Condition {condition_id} is not attached to policy {policy_id}")]
    ConditionNotOwned {
        policy_id: PolicyId,
        condition_id: ConditionId,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("Evaluation of condition {condition_id} failed: {reason}")]
    EvaluationFailure {
        condition_id: ConditionId,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse error taxonomy shared by every caller-facing operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    InvalidArgument,
    UnsupportedMethod,
    UnsupportedChain,
    EvaluationFailure,
    Internal,
}

impl PbacError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            PbacError::Unauthorized { .. } => ErrorKind::Unauthorized,
            PbacError::PolicyNotFound(_)
            | PbacError::ConditionNotFound(_)
            | PbacError::ConditionNotOwned { .. } => ErrorKind::NotFound,
            PbacError::InvalidArgument(_) | PbacError::Config(_) => ErrorKind::InvalidArgument,
            PbacError::UnsupportedMethod(_) => ErrorKind::UnsupportedMethod,
            PbacError::UnsupportedChain(_) => ErrorKind::UnsupportedChain,
            PbacError::EvaluationFailure { .. } => ErrorKind::EvaluationFailure,
            PbacError::Io(_) | PbacError::Serialization(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        PbacError::InvalidArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, PbacError>;
