//! Signature source filtering
//!
//! Community signature feeds mark their names with a suffix (".UNOFFICIAL"
//! for the default clamd configuration). The policy below decides which
//! detections are reported, without touching the network.

use clamlink_common::config::SignatureFilter;

use super::result::ScanResult;

/// Filter plus the suffix that marks unofficial signatures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePolicy {
    pub filter: SignatureFilter,
    pub unofficial_suffix: String,
}

impl Default for SignaturePolicy {
    fn default() -> Self {
        Self {
            filter: SignatureFilter::All,
            unofficial_suffix: ".UNOFFICIAL".to_string(),
        }
    }
}

impl SignaturePolicy {
    pub fn new(filter: SignatureFilter, unofficial_suffix: impl Into<String>) -> Self {
        Self {
            filter,
            unofficial_suffix: unofficial_suffix.into(),
        }
    }

    /// An empty suffix marks nothing as unofficial
    pub fn is_unofficial(&self, signature: &str) -> bool {
        !self.unofficial_suffix.is_empty() && signature.ends_with(&self.unofficial_suffix)
    }

    pub fn matches_signature(&self, signature: &str) -> bool {
        match self.filter {
            SignatureFilter::All => true,
            SignatureFilter::Official => !self.is_unofficial(signature),
            SignatureFilter::Unofficial => self.is_unofficial(signature),
        }
    }

    /// Only infected results can match
    pub fn matches(&self, result: &ScanResult) -> bool {
        result
            .signature()
            .map(|signature| self.matches_signature(signature))
            .unwrap_or(false)
    }
}
