//! Scan outcome types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a scan produced no verdict
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ScanError {
    /// The daemon could not be reached or did not answer the liveness probe
    #[error("{0}")]
    Connection(String),
    /// A deadline expired while talking to the daemon
    #[error("timed out: {0}")]
    Timeout(String),
    /// The reply could not be understood
    #[error("protocol error: {0}")]
    Protocol(String),
    /// The daemon reported an internal failure
    #[error("daemon error: {0}")]
    Daemon(String),
}

impl ScanError {
    /// Short taxonomy name, suitable for logs and metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::Connection(_) | ScanError::Timeout(_) => "connection",
            ScanError::Protocol(_) => "protocol",
            ScanError::Daemon(_) => "daemon",
        }
    }
}

/// Result of scanning one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanResult {
    /// No signature matched
    Clean,
    /// A signature matched
    Infected { signature: String },
    /// No verdict could be obtained
    Error { error: ScanError },
}

impl ScanResult {
    pub fn infected(signature: impl Into<String>) -> Self {
        ScanResult::Infected {
            signature: signature.into(),
        }
    }

    pub fn error(error: ScanError) -> Self {
        ScanResult::Error { error }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, ScanResult::Clean)
    }

    pub fn is_infected(&self) -> bool {
        matches!(self, ScanResult::Infected { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ScanResult::Error { .. })
    }

    /// Signature name reported by the daemon, if any
    pub fn signature(&self) -> Option<&str> {
        match self {
            ScanResult::Infected { signature } => Some(signature),
            _ => None,
        }
    }

    /// Value for the verdict header: `Yes (<signature>)`, `No` or `Error (<reason>)`
    pub fn header_value(&self) -> String {
        match self {
            ScanResult::Clean => "No".to_string(),
            ScanResult::Infected { signature } => {
                format!("Yes ({})", sanitize_header(signature))
            }
            ScanResult::Error { error } => {
                format!("Error ({})", sanitize_header(&error.to_string()))
            }
        }
    }
}

/// Header values must stay on one line
fn sanitize_header(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}
