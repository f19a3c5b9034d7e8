//! Self-delimiting binary records, one per entry.
//!
//! A record is a `u32` little-endian length followed by the MessagePack body.
//! Streams carry records back to back with no outer framing; end of stream
//! at a record boundary is the only terminator.

use crate::core::{Entry, LogError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{ErrorKind, Read};

/// Upper bound on a single record body. Larger prefixes are treated as
/// corruption rather than allocated.
pub const MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;

const LEN_PREFIX: usize = 4;

pub fn encode<K: Serialize, P: Serialize>(entry: &Entry<K, P>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_into(&mut buf, entry)?;
    Ok(buf)
}

/// Appends one record to `buf`, returning the number of bytes written.
pub fn encode_into<K: Serialize, P: Serialize>(buf: &mut Vec<u8>, entry: &Entry<K, P>) -> Result<usize> {
    let body = rmp_serde::to_vec(entry)
        .map_err(|e| LogError::Serialization(format!("Failed to serialize entry: {}", e)))?;
    if body.len() > MAX_RECORD_SIZE {
        return Err(LogError::Serialization(format!(
            "Entry of {} bytes exceeds record limit of {} bytes",
            body.len(),
            MAX_RECORD_SIZE
        )));
    }
    let len = body.len() as u32;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&body);
    Ok(LEN_PREFIX + body.len())
}

/// Decodes every record until end of stream.
///
/// All or nothing: the first malformed record aborts the whole batch.
pub fn decode_all<K, P, R>(mut reader: R) -> Result<Vec<Entry<K, P>>>
where
    K: DeserializeOwned,
    P: DeserializeOwned,
    R: Read,
{
    let mut entries = Vec::new();
    while let Some(len) = read_len_prefix(&mut reader)? {
        if len > MAX_RECORD_SIZE {
            return Err(LogError::InvalidState(format!(
                "record length {} exceeds limit of {} bytes",
                len, MAX_RECORD_SIZE
            )));
        }
        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => {
                LogError::InvalidState(format!("truncated record: expected {} bytes", len))
            }
            _ => LogError::from(e),
        })?;
        let entry: Entry<K, P> = rmp_serde::from_slice(&body)
            .map_err(|e| LogError::InvalidState(format!("malformed record: {}", e)))?;
        if let Some(expires_at) = entry.expires_at {
            if expires_at <= entry.timestamp {
                return Err(LogError::InvalidState(format!(
                    "record expires at {} which is not after its timestamp {}",
                    expires_at, entry.timestamp
                )));
            }
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// `Ok(None)` on a clean end of stream, an error if the prefix is cut short.
fn read_len_prefix<R: Read>(reader: &mut R) -> Result<Option<usize>> {
    let mut buf = [0u8; LEN_PREFIX];
    let mut filled = 0;
    while filled < LEN_PREFIX {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(LogError::InvalidState(format!(
                    "truncated record length prefix ({} of {} bytes)",
                    filled, LEN_PREFIX
                )));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(Some(u32::from_le_bytes(buf) as usize))
}
