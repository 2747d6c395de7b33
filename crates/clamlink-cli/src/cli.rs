use clamlink_common::config::{Config, SignatureFilter};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "clamlink", version, about = "Scan mail messages with a ClamAV daemon")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "CLAMLINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Daemon location: port, host:port or socket path (overrides config)
    #[arg(short, long, env = "CLAMLINK_SOCKET")]
    pub socket: Option<String>,

    /// Which signatures count as a detection (overrides config)
    #[arg(long)]
    pub filter: Option<SignatureFilter>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan message files (stdin when none given); exit 1 if a virus is detected
    Scan {
        /// Message files to scan
        files: Vec<PathBuf>,

        /// Print results as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Check that the daemon is reachable and print its version
    Ping,
}

impl Cli {
    /// Fold command-line overrides into the loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(socket) = &self.socket {
            config.clamav.socket = socket.clone();
        }
        if let Some(filter) = self.filter {
            config.clamav.filter = filter;
        }
    }
}
