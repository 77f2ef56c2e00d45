//! Length-prefixed framing over a byte stream.
//!
//! Reading is two-phase: exactly [`FRAME_LEN_PREFIX`] header bytes, then
//! exactly the announced number of payload bytes. The announced length is
//! validated before any payload byte is read.

use std::io;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::constants::{FRAME_LEN_PREFIX, MAX_FRAME_PAYLOAD};
use crate::error::ProtoError;

/// Validates a frame header and returns the payload length it announces.
pub fn decode_header(header: [u8; FRAME_LEN_PREFIX]) -> Result<usize, ProtoError> {
    let len = u32::from_le_bytes(header) as usize;
    if len == 0 {
        return Err(ProtoError::EmptyFrame);
    }
    if len > MAX_FRAME_PAYLOAD {
        return Err(ProtoError::FrameTooLarge(len));
    }
    Ok(len)
}

/// How many transient read failures a single header or payload read may absorb.
///
/// Interrupted, would-block and timed-out reads are transient; each one counts
/// against the cap for the unit currently being read. End of stream in the
/// middle of a unit is never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPolicy {
    pub max_retries: u32,
}

impl Default for ReadPolicy {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Reads whole frames from an async byte stream.
pub struct FrameReader<R> {
    inner: R,
    policy: ReadPolicy,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, policy: ReadPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads the next frame payload.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly on a frame boundary.
    pub async fn read_frame(&mut self) -> Result<Option<Bytes>, ProtoError> {
        let mut header = [0u8; FRAME_LEN_PREFIX];
        if !self.read_unit(&mut header, true).await? {
            return Ok(None);
        }
        let len = decode_header(header)?;

        let mut payload = vec![0u8; len];
        self.read_unit(&mut payload, false).await?;
        trace!(len, "frame received");
        Ok(Some(Bytes::from(payload)))
    }

    /// Fills `buf` completely. Returns `false` only for a clean end of stream
    /// before the first byte of a header.
    async fn read_unit(&mut self, buf: &mut [u8], at_boundary: bool) -> Result<bool, ProtoError> {
        let mut filled = 0;
        let mut retries = 0u32;

        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]).await {
                Ok(0) => {
                    if at_boundary && filled == 0 {
                        return Ok(false);
                    }
                    return Err(ProtoError::IncompleteRead {
                        expected: buf.len(),
                        received: filled,
                    });
                }
                Ok(n) => filled += n,
                Err(e) if is_transient(&e) => {
                    retries += 1;
                    if retries > self.policy.max_retries {
                        return Err(ProtoError::RetryLimit(retries));
                    }
                    trace!(retries, filled, "transient read failure, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }
}
