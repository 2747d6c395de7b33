//! clamd wire protocol
//!
//! Commands are sent in the NUL-terminated `z` form. `INSTREAM` payloads
//! are framed as a 4-byte big-endian length followed by the data, ending
//! with a zero-length chunk. Every command gets exactly one reply.

use super::result::{ScanError, ScanResult};

/// Longest reply accepted from the daemon
pub const MAX_REPLY_LEN: usize = 4096;

/// Largest payload a single INSTREAM chunk can announce
pub const MAX_CHUNK_SIZE: usize = u32::MAX as usize;

/// Commands understood by clamd that this client issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClamdCommand {
    /// PING - Liveness probe, answered with PONG
    Ping,
    /// VERSION - Engine and signature database version
    Version,
    /// INSTREAM - Scan a stream of chunks
    Instream,
}

impl ClamdCommand {
    pub fn verb(&self) -> &'static str {
        match self {
            ClamdCommand::Ping => "PING",
            ClamdCommand::Version => "VERSION",
            ClamdCommand::Instream => "INSTREAM",
        }
    }

    /// Encode as `z<VERB>\0`
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.verb().len() + 2);
        buf.push(b'z');
        buf.extend_from_slice(self.verb().as_bytes());
        buf.push(0);
        buf
    }
}

/// Frame one INSTREAM chunk
pub fn encode_chunk(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let len = u32::try_from(data.len()).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("chunk of {} bytes exceeds the INSTREAM frame limit", data.len()),
        )
    })?;
    let mut buf = Vec::with_capacity(data.len() + 4);
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(data);
    Ok(buf)
}

/// Zero-length chunk terminating an INSTREAM body
pub fn end_of_stream() -> [u8; 4] {
    [0, 0, 0, 0]
}

/// Decode a raw reply into text without its terminator
fn reply_text(raw: &[u8]) -> Result<&str, ScanError> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| ScanError::Protocol("reply is not valid UTF-8".to_string()))?;
    Ok(text.trim_end_matches(['\0', '\r', '\n']).trim())
}

/// Check a PING reply
pub fn parse_pong(raw: &[u8]) -> Result<(), ScanError> {
    match reply_text(raw) {
        Ok("PONG") => Ok(()),
        Ok("") => Err(ScanError::Connection(
            "daemon not responding: empty reply to PING".to_string(),
        )),
        Ok(other) => Err(ScanError::Connection(format!(
            "daemon not responding: unexpected reply to PING '{}'",
            other
        ))),
        Err(e) => Err(ScanError::Connection(format!("daemon not responding: {}", e))),
    }
}

/// Extract the version banner from a VERSION reply
pub fn parse_version(raw: &[u8]) -> Result<String, ScanError> {
    let text = reply_text(raw)?;
    if text.is_empty() {
        return Err(ScanError::Protocol("empty reply to VERSION".to_string()));
    }
    if let Some(message) = text.strip_suffix("ERROR") {
        return Err(ScanError::Daemon(message.trim().to_string()));
    }
    Ok(text.to_string())
}

/// Classify the terminal reply to an INSTREAM scan
///
/// The reply has the shape `<label>: <status>` where status is `OK`,
/// `<signature> FOUND` or `<message> ERROR`. Errors reported before the
/// label is known (e.g. `INSTREAM size limit exceeded. ERROR`) carry no label.
pub fn parse_scan_reply(raw: &[u8]) -> ScanResult {
    let text = match reply_text(raw) {
        Ok(text) => text,
        Err(e) => return ScanResult::error(e),
    };

    if text.is_empty() {
        return ScanResult::error(ScanError::Protocol("empty reply".to_string()));
    }

    if let Some(message) = text.strip_suffix(" ERROR") {
        let message = match message.split_once(':') {
            Some((label, rest)) if !label.is_empty() && !label.contains(char::is_whitespace) => {
                rest.trim()
            }
            _ => message.trim(),
        };
        let message = if message.is_empty() {
            "unspecified error"
        } else {
            message
        };
        return ScanResult::error(ScanError::Daemon(message.to_string()));
    }

    let Some((label, status)) = text.split_once(": ") else {
        return ScanResult::error(ScanError::Protocol(format!(
            "malformed reply '{}'",
            text
        )));
    };
    if label.trim().is_empty() {
        return ScanResult::error(ScanError::Protocol(format!(
            "malformed reply '{}'",
            text
        )));
    }

    let status = status.trim();
    if status == "OK" {
        return ScanResult::Clean;
    }

    if let Some(signature) = status.strip_suffix(" FOUND") {
        let signature = signature.trim();
        if signature.is_empty() {
            return ScanResult::error(ScanError::Protocol(
                "FOUND reply without a signature".to_string(),
            ));
        }
        return ScanResult::infected(signature);
    }

    ScanResult::error(ScanError::Protocol(format!(
        "unrecognized status '{}'",
        status
    )))
}
