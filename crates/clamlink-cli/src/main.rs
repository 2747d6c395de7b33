//! ClamLink - command-line entry point

mod cli;

use anyhow::{anyhow, Context, Result};
use clamlink_common::config::{Config, LoggingConfig};
use clamlink_core::{ClamdClient, ClamdConfig, VirusCheck, VirusCheckResult};
use clap::Parser;
use cli::{Cli, Command};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const EXIT_CLEAN: u8 = 0;
const EXIT_DETECTED: u8 = 1;
const EXIT_ERROR: u8 = 2;

#[derive(Serialize)]
struct ScanReport<'a> {
    input: &'a str,
    #[serde(flatten)]
    check: &'a VirusCheckResult,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("clamlink: {:#}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    cli.apply_overrides(&mut config);
    config.validate()?;

    init_logging(&config.logging);

    match cli.command {
        Command::Scan { files, json } => scan(&config, files, json).await,
        Command::Ping => ping(&config).await,
    }
}

async fn scan(config: &Config, files: Vec<PathBuf>, json: bool) -> Result<u8> {
    let check = VirusCheck::from_config(&config.clamav);
    if let Some(reason) = check.disabled_reason() {
        return Err(anyhow!("virus scanning disabled: {}", reason));
    }

    let mut status = EXIT_CLEAN;
    let show_input = files.len() > 1;

    if files.is_empty() {
        let mut message = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut message)
            .await
            .context("Failed to read message from stdin")?;
        let result = check.check(&message).await;
        print_result("-", &result, json, false)?;
        status = status.max(exit_status(&result));
    } else {
        for path in &files {
            let message = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let result = check.check(&message).await;
            print_result(&path.display().to_string(), &result, json, show_input)?;
            status = status.max(exit_status(&result));
        }
    }

    Ok(status)
}

async fn ping(config: &Config) -> Result<u8> {
    let client = ClamdClient::new(ClamdConfig::try_from(&config.clamav)?);

    client
        .ping()
        .await
        .with_context(|| format!("clamd at {} is not available", client.endpoint()))?;
    let version = client.version().await?;

    info!("clamd at {} is alive", client.endpoint());
    println!("{}", version);
    Ok(EXIT_CLEAN)
}

fn print_result(input: &str, result: &VirusCheckResult, json: bool, show_input: bool) -> Result<()> {
    if json {
        let report = ScanReport {
            input,
            check: result,
        };
        println!("{}", serde_json::to_string(&report)?);
    } else if show_input {
        println!("{}: {}", input, result.header_line());
    } else {
        println!("{}", result.header_line());
    }
    Ok(())
}

/// Errors outrank detections, detections outrank clean results
fn exit_status(result: &VirusCheckResult) -> u8 {
    if result.is_error() || result.result.is_none() {
        EXIT_ERROR
    } else if result.detected {
        EXIT_DETECTED
    } else {
        EXIT_CLEAN
    }
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},clamlink=debug", config.level)));

    let (text, json) = if config.format == "json" {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            ),
            None,
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clamlink_core::{ScanError, ScanResult, SignaturePolicy, VirusScanner};

    struct Fixed(ScanResult);

    #[async_trait::async_trait]
    impl VirusScanner for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn scan(&self, _message: &[u8]) -> ScanResult {
            self.0.clone()
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    async fn check(result: ScanResult) -> VirusCheckResult {
        VirusCheck::new(Box::new(Fixed(result)), SignaturePolicy::default(), "X-Spam-Virus")
            .check(b"message")
            .await
    }

    #[tokio::test]
    async fn test_exit_status() {
        assert_eq!(exit_status(&check(ScanResult::Clean).await), EXIT_CLEAN);
        assert_eq!(
            exit_status(&check(ScanResult::infected("Eicar-Signature")).await),
            EXIT_DETECTED
        );
        assert_eq!(
            exit_status(&check(ScanResult::error(ScanError::Protocol("bad".into()))).await),
            EXIT_ERROR
        );
    }

    #[tokio::test]
    async fn test_disabled_exit_status() {
        let result = VirusCheck::disabled("off", "X-Spam-Virus")
            .check(b"message")
            .await;
        assert_eq!(exit_status(&result), EXIT_ERROR);
    }

    #[tokio::test]
    async fn test_config_error_returns_before_logging() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let cli = Cli::parse_from([
            "clamlink",
            "--config",
            missing.to_str().unwrap(),
            "ping",
        ]);

        let err = run(cli).await.unwrap_err();
        assert!(
            format!("{:#}", err).contains("Failed to read config file"),
            "{:#}",
            err
        );
    }

    #[tokio::test]
    async fn test_json_report_flattens_result() {
        let result = check(ScanResult::infected("Sig.UNOFFICIAL")).await;
        let report = ScanReport {
            input: "a.eml",
            check: &result,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["input"], "a.eml");
        assert_eq!(value["detected"], true);
        assert_eq!(value["official"], false);
        assert_eq!(value["header_value"], "Yes (Sig.UNOFFICIAL)");
    }
}
