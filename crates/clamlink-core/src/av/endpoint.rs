//! Daemon endpoint resolution and connection

use clamlink_common::Error;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use super::result::ScanError;

/// Default clamd TCP port
pub const DEFAULT_PORT: u16 = 3310;

const DEFAULT_HOST: &str = "127.0.0.1";

/// Byte stream to the daemon, TCP or local socket
pub trait ClamdStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ClamdStream for T {}

/// Where the daemon listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClamdEndpoint {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}

impl Default for ClamdEndpoint {
    fn default() -> Self {
        ClamdEndpoint::Tcp {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl fmt::Display for ClamdEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClamdEndpoint::Tcp { host, port } if host.contains(':') => {
                write!(f, "[{}]:{}", host, port)
            }
            ClamdEndpoint::Tcp { host, port } => write!(f, "{}:{}", host, port),
            ClamdEndpoint::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

fn parse_port(value: &str, original: &str) -> Result<u16, Error> {
    match value.parse::<u16>() {
        Ok(0) | Err(_) => Err(Error::Config(format!(
            "invalid clamd port in '{}'",
            original
        ))),
        Ok(port) => Ok(port),
    }
}

impl FromStr for ClamdEndpoint {
    type Err = Error;

    /// Accepts `3310`, `host:port`, `[v6]:port`, `/path/to/socket` or `unix:path`
    fn from_str(s: &str) -> Result<Self, Error> {
        let value = s.trim();
        if value.is_empty() {
            return Err(Error::Config("clamd socket is empty".to_string()));
        }

        if let Some(path) = value.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(Error::Config("clamd socket path is empty".to_string()));
            }
            return Ok(ClamdEndpoint::Unix(PathBuf::from(path)));
        }

        if value.starts_with('/') {
            return Ok(ClamdEndpoint::Unix(PathBuf::from(value)));
        }

        if value.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(ClamdEndpoint::Tcp {
                host: DEFAULT_HOST.to_string(),
                port: parse_port(value, s)?,
            });
        }

        let Some((host, port)) = value.rsplit_once(':') else {
            return Err(Error::Config(format!(
                "cannot resolve clamd socket '{}': expected port, host:port or socket path",
                s
            )));
        };

        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(Error::Config(format!("missing clamd host in '{}'", s)));
        }

        Ok(ClamdEndpoint::Tcp {
            host: host.to_string(),
            port: parse_port(port, s)?,
        })
    }
}

impl ClamdEndpoint {
    async fn open(&self) -> std::io::Result<Box<dyn ClamdStream>> {
        match self {
            ClamdEndpoint::Tcp { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port)).await?;
                stream.set_nodelay(true)?;
                Ok(Box::new(stream))
            }
            #[cfg(unix)]
            ClamdEndpoint::Unix(path) => {
                let stream = tokio::net::UnixStream::connect(path).await?;
                Ok(Box::new(stream))
            }
            #[cfg(not(unix))]
            ClamdEndpoint::Unix(_) => Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "local sockets are not supported on this platform",
            )),
        }
    }

    /// Open a fresh connection within `timeout`
    pub async fn connect(&self, timeout: Duration) -> Result<Box<dyn ClamdStream>, ScanError> {
        match tokio::time::timeout(timeout, self.open()).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(ScanError::Connection(format!(
                "cannot connect to {}: {}",
                self, e
            ))),
            Err(_) => Err(ScanError::Connection(format!(
                "cannot connect to {}: timed out after {}ms",
                self,
                timeout.as_millis()
            ))),
        }
    }
}
