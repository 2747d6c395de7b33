//! Virus scanning module
//!
//! Provides virus detection for mail filtering through:
//! - clamd integration over TCP or a local socket
//! - Signature source filtering (official / unofficial feeds)
//! - A host-facing check producing a detection flag and header value

pub mod clamd;
pub mod endpoint;
pub mod filter;
pub mod protocol;
pub mod result;

pub use clamd::{ClamdClient, ClamdConfig};
pub use endpoint::ClamdEndpoint;
pub use filter::SignaturePolicy;
pub use result::{ScanError, ScanResult};

use async_trait::async_trait;
use clamlink_common::config::ClamavConfig;
use serde::Serialize;
use tracing::{info, warn};

/// Header value reported when scanning is switched off
pub const DISABLED_HEADER_VALUE: &str = "Disabled";

/// A backend able to scan raw messages
#[async_trait]
pub trait VirusScanner: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Scan a raw message; failures are reported inside the result
    async fn scan(&self, message: &[u8]) -> ScanResult;

    /// Check whether the backend is reachable
    async fn health_check(&self) -> bool;
}

/// Overall virus check result, ready for the host to report
#[derive(Debug, Clone, Serialize)]
pub struct VirusCheckResult {
    /// Whether a signature matching the configured filter was found
    pub detected: bool,
    /// Signature reported by the scanner, whether or not it passed the filter
    pub signature: Option<String>,
    /// Whether the signature is an official one (None when nothing was found)
    pub official: Option<bool>,
    /// Header name for the verdict
    pub header_name: String,
    /// Header value: "Yes (<signature>)", "No", "Error (<reason>)" or "Disabled"
    pub header_value: String,
    /// Raw scan outcome (None when scanning is disabled)
    pub result: Option<ScanResult>,
}

impl VirusCheckResult {
    /// `Name: value` line for insertion into the message
    pub fn header_line(&self) -> String {
        format!("{}: {}", self.header_name, self.header_value)
    }

    pub fn is_error(&self) -> bool {
        self.result.as_ref().map(ScanResult::is_error).unwrap_or(false)
    }
}

enum Capability {
    Enabled(Box<dyn VirusScanner>),
    Disabled(String),
}

/// Host-facing virus check
///
/// Whether scanning is available is decided once, when the check is built.
/// After that every message gets a [`VirusCheckResult`]; nothing is raised
/// back to the caller.
pub struct VirusCheck {
    capability: Capability,
    policy: SignaturePolicy,
    header_name: String,
}

impl VirusCheck {
    /// Create a check around an explicit scanner
    pub fn new(
        scanner: Box<dyn VirusScanner>,
        policy: SignaturePolicy,
        header_name: impl Into<String>,
    ) -> Self {
        Self {
            capability: Capability::Enabled(scanner),
            policy,
            header_name: header_name.into(),
        }
    }

    /// Create a check that never scans
    pub fn disabled(reason: impl Into<String>, header_name: impl Into<String>) -> Self {
        Self {
            capability: Capability::Disabled(reason.into()),
            policy: SignaturePolicy::default(),
            header_name: header_name.into(),
        }
    }

    /// Build a clamd-backed check, or report why scanning is unavailable
    pub fn try_from_config(config: &ClamavConfig) -> clamlink_common::Result<Self> {
        if !config.enabled {
            return Err(clamlink_common::Error::ScanningDisabled(
                "disabled in configuration".to_string(),
            ));
        }

        let clamd = ClamdConfig::try_from(config)?;
        info!("Virus scanning via clamd at {}", clamd.endpoint);

        Ok(Self::new(
            Box::new(ClamdClient::new(clamd)),
            SignaturePolicy::new(config.filter, config.unofficial_suffix.clone()),
            config.header_name.clone(),
        ))
    }

    /// Build from configuration, falling back to a disabled check
    pub fn from_config(config: &ClamavConfig) -> Self {
        match Self::try_from_config(config) {
            Ok(check) => check,
            Err(clamlink_common::Error::ScanningDisabled(reason)) => {
                info!("Virus scanning disabled: {}", reason);
                Self::disabled(reason, config.header_name.clone())
            }
            Err(e) => {
                warn!("Virus scanning disabled: {}", e);
                Self::disabled(e.to_string(), config.header_name.clone())
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.capability, Capability::Enabled(_))
    }

    /// Reason scanning is off, if it is
    pub fn disabled_reason(&self) -> Option<&str> {
        match &self.capability {
            Capability::Enabled(_) => None,
            Capability::Disabled(reason) => Some(reason),
        }
    }

    pub fn policy(&self) -> &SignaturePolicy {
        &self.policy
    }

    /// Check a message for viruses
    ///
    /// # Arguments
    /// * `raw_message` - The raw RFC 5322 message bytes
    pub async fn check(&self, raw_message: &[u8]) -> VirusCheckResult {
        let scanner = match &self.capability {
            Capability::Enabled(scanner) => scanner,
            Capability::Disabled(_) => {
                return VirusCheckResult {
                    detected: false,
                    signature: None,
                    official: None,
                    header_name: self.header_name.clone(),
                    header_value: DISABLED_HEADER_VALUE.to_string(),
                    result: None,
                };
            }
        };

        let result = scanner.scan(raw_message).await;
        if let ScanResult::Error { error } = &result {
            warn!(
                scanner = scanner.name(),
                kind = error.kind(),
                "virus check failed: {}",
                error
            );
        }

        self.report(result)
    }

    /// Apply the signature policy to a raw outcome
    pub fn report(&self, result: ScanResult) -> VirusCheckResult {
        let signature = result.signature().map(str::to_string);
        VirusCheckResult {
            detected: self.policy.matches(&result),
            official: signature
                .as_deref()
                .map(|signature| !self.policy.is_unofficial(signature)),
            signature,
            header_name: self.header_name.clone(),
            header_value: result.header_value(),
            result: Some(result),
        }
    }

    /// Check whether the scanner is reachable
    pub async fn health_check(&self) -> bool {
        match &self.capability {
            Capability::Enabled(scanner) => scanner.health_check().await,
            Capability::Disabled(_) => false,
        }
    }
}
