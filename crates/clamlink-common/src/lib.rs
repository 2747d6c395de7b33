//! ClamLink Common - Shared configuration and error types
//!
//! This crate provides the configuration model and the error type
//! shared by the ClamLink library and command-line tool.

pub mod config;
pub mod error;

pub use config::Config;
pub use error::{Error, Result};
