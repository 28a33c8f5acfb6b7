//! PBAC core: policy registry, condition evaluation and access decisions

pub mod audit;
pub mod condition;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod oracle;
pub mod policy;
pub mod store;
pub mod validation;
