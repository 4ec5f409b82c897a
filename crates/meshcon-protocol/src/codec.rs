//! Line-based codec for the gateway serial link.
//!
//! The gateway terminates every line with `\r\n`; requests from the host are
//! terminated with a bare `\n`, which is what the gateway firmware scans for.

use bytes::{Buf, BytesMut};

use crate::error::{ProtocolError, ProtocolResult};
use crate::inbound::REQUEST_TAG;

/// Maximum line length accepted from the gateway.
pub const MAX_LINE_LENGTH: usize = 512;

/// A codec for splitting a byte stream into lines.
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl LineCodec {
    /// Create a new line codec.
    pub fn new() -> Self {
        LineCodec {
            buffer: BytesMut::with_capacity(MAX_LINE_LENGTH),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode a complete line from the buffer.
    ///
    /// Empty lines are skipped. Returns `Ok(None)` when more data is needed.
    /// If the buffer exceeds [`MAX_LINE_LENGTH`] without a terminator the
    /// partial line is discarded and an overflow error is returned, so the
    /// next call starts clean.
    pub fn decode_line(&mut self) -> ProtocolResult<Option<String>> {
        loop {
            let Some(end) = self.buffer.iter().position(|&b| b == b'\n') else {
                if self.buffer.len() > MAX_LINE_LENGTH {
                    let actual = self.buffer.len();
                    self.buffer.clear();
                    return Err(ProtocolError::BufferOverflow {
                        max: MAX_LINE_LENGTH,
                        actual,
                    });
                }
                return Ok(None);
            };

            let line_data = self.buffer.split_to(end);
            self.buffer.advance(1);

            let line = String::from_utf8_lossy(&line_data);
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(line.to_string()));
        }
    }

    /// Encode an operator request for transmission.
    pub fn encode_request(request: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(REQUEST_TAG.len() + request.len() + 2);
        buf.extend_from_slice(REQUEST_TAG.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(request.as_bytes());
        buf.push(b'\n');
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}
