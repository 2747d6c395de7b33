//! clamd integration for virus scanning
//!
//! Streams messages to a ClamAV daemon using the INSTREAM command.
//! See: https://docs.clamav.net/manual/Usage/Scanning.html#clamd

use async_trait::async_trait;
use clamlink_common::config::ClamavConfig;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::endpoint::ClamdEndpoint;
use super::protocol::{self, ClamdCommand, MAX_CHUNK_SIZE, MAX_REPLY_LEN};
use super::result::{ScanError, ScanResult};
use super::VirusScanner;

/// clamd client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClamdConfig {
    /// Daemon location (default: 127.0.0.1:3310)
    pub endpoint: ClamdEndpoint,
    /// Deadline for opening a connection and for the PING exchange
    pub connect_timeout: Duration,
    /// Deadline for streaming the message and for reading the verdict
    pub read_timeout: Duration,
    /// Payload bytes per INSTREAM chunk
    pub chunk_size: usize,
}

impl Default for ClamdConfig {
    fn default() -> Self {
        Self {
            endpoint: ClamdEndpoint::default(),
            connect_timeout: Duration::from_millis(2000),
            read_timeout: Duration::from_millis(30_000),
            chunk_size: 8192,
        }
    }
}

impl TryFrom<&ClamavConfig> for ClamdConfig {
    type Error = clamlink_common::Error;

    fn try_from(config: &ClamavConfig) -> clamlink_common::Result<Self> {
        if config.chunk_size == 0 || config.chunk_size > MAX_CHUNK_SIZE {
            return Err(clamlink_common::Error::Config(format!(
                "invalid clamav.chunk_size {}",
                config.chunk_size
            )));
        }

        Ok(Self {
            endpoint: config.socket.parse()?,
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            read_timeout: Duration::from_millis(config.read_timeout_ms),
            chunk_size: config.chunk_size,
        })
    }
}

/// clamd client
///
/// Holds only immutable configuration; every call opens its own
/// connection, so a single client can serve concurrent scans.
#[derive(Debug, Clone)]
pub struct ClamdClient {
    config: ClamdConfig,
}

impl ClamdClient {
    /// Create a new clamd client
    ///
    /// The chunk size is clamped to what an INSTREAM frame can carry.
    pub fn new(mut config: ClamdConfig) -> Self {
        let chunk_size = config.chunk_size.clamp(1, MAX_CHUNK_SIZE);
        if chunk_size != config.chunk_size {
            warn!(
                "clamd chunk size {} out of range, using {}",
                config.chunk_size, chunk_size
            );
            config.chunk_size = chunk_size;
        }
        Self { config }
    }

    pub fn endpoint(&self) -> &ClamdEndpoint {
        &self.config.endpoint
    }

    /// Check that the daemon answers PING with PONG
    pub async fn ping(&self) -> Result<(), ScanError> {
        let reply = self
            .command(ClamdCommand::Ping, self.config.connect_timeout)
            .await
            .map_err(|e| match e {
                ScanError::Connection(msg) if msg.starts_with("cannot connect") => {
                    ScanError::Connection(msg)
                }
                other => ScanError::Connection(format!("daemon not responding: {}", other)),
            })?;
        protocol::parse_pong(&reply)
    }

    /// Engine and signature database version
    pub async fn version(&self) -> Result<String, ScanError> {
        let reply = self
            .command(ClamdCommand::Version, self.config.read_timeout)
            .await?;
        protocol::parse_version(&reply)
    }

    /// Scan a message
    ///
    /// Never fails: connection, protocol and daemon problems come back as
    /// [`ScanResult::Error`].
    ///
    /// # Arguments
    /// * `message` - The raw RFC 5322 message bytes
    pub async fn scan(&self, message: &[u8]) -> ScanResult {
        debug!(
            endpoint = %self.config.endpoint,
            bytes = message.len(),
            "Scanning message with clamd"
        );

        if let Err(e) = self.ping().await {
            warn!(kind = e.kind(), "clamd liveness probe failed: {}", e);
            return ScanResult::error(e);
        }

        let result = match self.scan_stream(message).await {
            Ok(result) => result,
            Err(e) => ScanResult::error(e),
        };

        match &result {
            ScanResult::Clean => debug!("clamd reported message clean"),
            ScanResult::Infected { signature } => {
                info!(signature = %signature, "clamd detected a virus")
            }
            ScanResult::Error { error } => {
                warn!(kind = error.kind(), "clamd scan failed: {}", error)
            }
        }

        result
    }

    async fn scan_stream(&self, message: &[u8]) -> Result<ScanResult, ScanError> {
        let mut stream = self
            .config
            .endpoint
            .connect(self.config.connect_timeout)
            .await?;
        let deadline = self.config.read_timeout;

        // clamd may cut the stream short (size limit) and still send a verdict
        let sending = send_instream(&mut stream, message, self.config.chunk_size);
        let write_error = match tokio::time::timeout(deadline, sending).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                debug!("INSTREAM write interrupted: {}", e);
                Some(e)
            }
            Err(_) => {
                return Err(ScanError::Timeout(format!(
                    "streaming message to {}",
                    self.config.endpoint
                )))
            }
        };

        let reply = match tokio::time::timeout(deadline, read_reply(&mut stream)).await {
            Ok(reply) => reply?,
            Err(_) => {
                return Err(ScanError::Timeout(format!(
                    "waiting for verdict from {}",
                    self.config.endpoint
                )))
            }
        };

        if reply.is_empty() {
            if let Some(e) = write_error {
                return Err(ScanError::Connection(format!(
                    "connection lost while streaming message: {}",
                    e
                )));
            }
        }

        Ok(protocol::parse_scan_reply(&reply))
    }

    /// Send a single command on a fresh connection and read its reply
    async fn command(&self, command: ClamdCommand, deadline: Duration) -> Result<Vec<u8>, ScanError> {
        let mut stream = self
            .config
            .endpoint
            .connect(self.config.connect_timeout)
            .await?;

        let exchange = async {
            stream
                .write_all(&command.encode())
                .await
                .map_err(|e| ScanError::Connection(format!("write failed: {}", e)))?;
            stream
                .flush()
                .await
                .map_err(|e| ScanError::Connection(format!("write failed: {}", e)))?;
            read_reply(&mut stream).await
        };

        tokio::time::timeout(deadline, exchange)
            .await
            .map_err(|_| ScanError::Timeout(format!("{} to {}", command.verb(), self.config.endpoint)))?
    }
}

async fn send_instream<S>(stream: &mut S, message: &[u8], chunk_size: usize) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&ClamdCommand::Instream.encode()).await?;
    for chunk in message.chunks(chunk_size) {
        stream.write_all(&protocol::encode_chunk(chunk)?).await?;
    }
    stream.write_all(&protocol::end_of_stream()).await?;
    stream.flush().await
}

/// Read one reply, up to a NUL or newline terminator or EOF
async fn read_reply<S>(stream: &mut S) -> Result<Vec<u8>, ScanError>
where
    S: AsyncRead + Unpin,
{
    let mut reply = Vec::new();
    let mut buf = [0u8; 512];

    loop {
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| ScanError::Connection(format!("read failed: {}", e)))?;
        if n == 0 {
            break;
        }
        let end = buf[..n].iter().position(|&b| b == 0 || b == b'\n');
        reply.extend_from_slice(&buf[..end.unwrap_or(n)]);
        if reply.len() > MAX_REPLY_LEN {
            return Err(ScanError::Protocol(format!(
                "reply exceeds {} bytes",
                MAX_REPLY_LEN
            )));
        }
        if end.is_some() {
            break;
        }
    }

    Ok(reply)
}

#[async_trait]
impl VirusScanner for ClamdClient {
    fn name(&self) -> &str {
        "clamd"
    }

    async fn scan(&self, message: &[u8]) -> ScanResult {
        ClamdClient::scan(self, message).await
    }

    async fn health_check(&self) -> bool {
        self.ping().await.is_ok()
    }
}
