//! Configuration for ClamLink

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// ClamAV daemon configuration
    #[serde(default)]
    pub clamav: ClamavConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which signatures count as a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureFilter {
    /// Any signature
    #[default]
    All,
    /// Only signatures without the unofficial suffix
    Official,
    /// Only signatures carrying the unofficial suffix
    Unofficial,
}

impl std::str::FromStr for SignatureFilter {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(SignatureFilter::All),
            "official" => Ok(SignatureFilter::Official),
            "unofficial" => Ok(SignatureFilter::Unofficial),
            other => Err(crate::Error::Config(format!(
                "unknown signature filter '{}' (expected all, official or unofficial)",
                other
            ))),
        }
    }
}

/// ClamAV daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClamavConfig {
    /// Enable virus scanning
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Daemon location: a port ("3310"), "host:port", or a socket path
    #[serde(default = "default_socket")]
    pub socket: String,

    /// Connect timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,

    /// INSTREAM chunk size in bytes
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Suffix marking community-maintained signatures
    #[serde(default = "default_unofficial_suffix")]
    pub unofficial_suffix: String,

    /// Signature filter applied when reporting
    #[serde(default)]
    pub filter: SignatureFilter,

    /// Header name used for the scan verdict
    #[serde(default = "default_header_name")]
    pub header_name: String,
}

impl Default for ClamavConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            socket: default_socket(),
            connect_timeout_ms: default_connect_timeout(),
            read_timeout_ms: default_read_timeout(),
            chunk_size: default_chunk_size(),
            unofficial_suffix: default_unofficial_suffix(),
            filter: SignatureFilter::default(),
            header_name: default_header_name(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_socket() -> String {
    "3310".to_string()
}

fn default_connect_timeout() -> u64 {
    2000
}

fn default_read_timeout() -> u64 {
    30_000
}

fn default_chunk_size() -> usize {
    8192
}

fn default_unofficial_suffix() -> String {
    ".UNOFFICIAL".to_string()
}

fn default_header_name() -> String {
    "X-Spam-Virus".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default locations, falling back to defaults
    pub fn load() -> crate::Result<Self> {
        let paths = [
            PathBuf::from("./clamlink.toml"),
            PathBuf::from("/etc/clamlink/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> crate::Result<()> {
        if self.clamav.socket.trim().is_empty() {
            return Err(crate::Error::Config(
                "clamav.socket must not be empty".to_string(),
            ));
        }
        if self.clamav.chunk_size == 0 {
            return Err(crate::Error::Config(
                "clamav.chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.clamav.header_name.trim().is_empty() {
            return Err(crate::Error::Config(
                "clamav.header_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.clamav.enabled);
        assert_eq!(config.clamav.socket, "3310");
        assert_eq!(config.clamav.unofficial_suffix, ".UNOFFICIAL");
        assert_eq!(config.clamav.filter, SignatureFilter::All);
        assert_eq!(config.clamav.header_name, "X-Spam-Virus");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[clamav]
socket = "/run/clamav/clamd.ctl"
filter = "unofficial"
read_timeout_ms = 1000

[logging]
format = "json"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.clamav.socket, "/run/clamav/clamd.ctl");
        assert_eq!(config.clamav.filter, SignatureFilter::Unofficial);
        assert_eq!(config.clamav.read_timeout_ms, 1000);
        assert_eq!(config.clamav.connect_timeout_ms, 2000);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_from_file_rejects_empty_socket() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[clamav]\nsocket = \"  \"").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_from_file_reads_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[clamav]\nsocket = \"clamd.local:3311\"\nenabled = false").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.clamav.socket, "clamd.local:3311");
        assert!(!config.clamav.enabled);
    }

    #[test]
    fn test_signature_filter_from_str() {
        assert_eq!("ALL".parse::<SignatureFilter>().unwrap(), SignatureFilter::All);
        assert_eq!(
            " official ".parse::<SignatureFilter>().unwrap(),
            SignatureFilter::Official
        );
        assert!("community".parse::<SignatureFilter>().is_err());
    }
}
