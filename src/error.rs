use std::net::IpAddr;

use thiserror::Error;

/// Classifies not-found errors for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    /// The URI was never registered in the path registry
    Uri,
    /// The CIDR prefix was never registered in the address registry
    Address,
    /// No rule is stored under the requested key
    Rule,
}

/// Policy engine error types
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Parse error at line {line}: {message}")]
    ParseErrorAtLine { line: usize, message: String },

    #[error("Invalid CIDR: {0}")]
    InvalidCidr(String),

    #[error("Invalid IP address: {0}")]
    InvalidIp(String),

    #[error("Unsupported address family: {0} (only IPv4 is supported)")]
    UnsupportedAddressFamily(IpAddr),

    #[error("Invalid priority: {0}")]
    InvalidPriority(u8),

    #[error("Not found: {message}")]
    NotFound { kind: NotFoundKind, message: String },

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),
}

impl PolicyError {
    pub(crate) fn not_found(kind: NotFoundKind, message: impl Into<String>) -> Self {
        PolicyError::NotFound {
            kind,
            message: message.into(),
        }
    }

    /// Returns the not-found sub-kind, if this is a not-found error.
    pub fn not_found_kind(&self) -> Option<NotFoundKind> {
        match self {
            PolicyError::NotFound { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PolicyError>;
