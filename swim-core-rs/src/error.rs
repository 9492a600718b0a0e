//! Error types for the membership core

use crate::types::NodeAddress;
use thiserror::Error;

/// Errors raised by registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown node: {0}")]
    UnknownNode(NodeAddress),
}

/// Result alias for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors parsing a `host:port` node address
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("missing port in address: {0}")]
    MissingPort(String),

    #[error("invalid port in address: {0}")]
    InvalidPort(String),
}

/// Unrecognized node state name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown node state: {0}")]
pub struct UnknownState(pub String);
