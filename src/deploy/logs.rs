// ABOUTME: Bounded log capture for GetLogs.
// ABOUTME: Reads at most a fixed number of bytes and tolerates streams that end early.

use futures::StreamExt;
use std::borrow::Cow;

use crate::runtime::{ByteStream, LogError};

/// Upper bound on bytes returned by a single log fetch.
pub const MAX_LOG_BYTES: usize = 1024 * 1024;

/// Lines requested when the caller gives no tail.
pub const DEFAULT_TAIL: &str = "100";

/// Log bytes captured from a workload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedLogs {
    pub bytes: Vec<u8>,
    /// Output was cut at the byte limit.
    pub truncated: bool,
}

impl CapturedLogs {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

/// Read from `stream` until it ends or `limit` bytes have been collected.
///
/// An error after some output has arrived ends the read with what was
/// collected so far; only an error before any output is returned.
pub async fn read_capped(mut stream: ByteStream, limit: usize) -> Result<CapturedLogs, LogError> {
    let mut captured = CapturedLogs::default();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) if captured.bytes.is_empty() => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, read = captured.bytes.len(), "log stream ended early");
                break;
            }
        };

        let room = limit - captured.bytes.len();
        if chunk.len() > room {
            captured.bytes.extend_from_slice(&chunk[..room]);
            captured.truncated = true;
            break;
        }
        captured.bytes.extend_from_slice(&chunk);
    }

    Ok(captured)
}
