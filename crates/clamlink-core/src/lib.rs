//! ClamLink Core - ClamAV daemon client for mail filtering
//!
//! This crate streams messages to a running clamd, classifies the verdict,
//! and turns it into a detection flag and header value for the host filter.

pub mod av;

pub use av::{
    ClamdClient, ClamdConfig, ClamdEndpoint, ScanError, ScanResult, SignaturePolicy, VirusCheck,
    VirusCheckResult, VirusScanner,
};
