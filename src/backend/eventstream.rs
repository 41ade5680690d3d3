//! AWS event-stream framing (`application/vnd.amazon.eventstream`).
//!
//! ```text
//! ┌──────────────┬───────────────┬─────────────┬─────────┬─────────┬─────────────┐
//! │ total len u32│ headers len u32│ prelude crc │ headers │ payload │ message crc │
//! └──────────────┴───────────────┴─────────────┴─────────┴─────────┴─────────────┘
//!   big-endian      big-endian      crc32(0..8)                      crc32(0..n-4)
//! ```
//!
//! Network reads do not line up with frames, so [`EventStreamDecoder`]
//! buffers bytes and hands out complete frames only. Any framing error is
//! fatal: once a length is wrong there is no way to find the next frame.
//! Both checksums are verified; a mismatch is a framing error too.

use thiserror::Error;

const PRELUDE_LEN: usize = 12;
const CRC_LEN: usize = 4;
const MIN_FRAME_LEN: usize = PRELUDE_LEN + CRC_LEN;
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame length {0} is below the 16-byte minimum")]
    TooShort(usize),
    #[error("frame length {0} exceeds the 16 MiB limit")]
    TooLong(usize),
    #[error("headers length {headers} does not fit in frame of {total} bytes")]
    HeadersOverflow { headers: usize, total: usize },
    #[error("malformed header: {0}")]
    BadHeader(String),
    #[error("{which} checksum mismatch")]
    Checksum { which: &'static str },
    #[error("stream ended inside a frame ({0} bytes buffered)")]
    Truncated(usize),
}

/// A typed header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Bytes(Vec<u8>),
    String(String),
    Timestamp(i64),
    Uuid([u8; 16]),
}

/// One decoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub headers: Vec<(String, HeaderValue)>,
    pub payload: Vec<u8>,
}

impl Frame {
    /// A string header by name.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|(n, v)| match v {
            HeaderValue::String(s) if n == name => Some(s.as_str()),
            _ => None,
        })
    }

    /// `:message-type`: `event`, `exception` or `error`.
    pub fn message_type(&self) -> Option<&str> {
        self.header_str(":message-type")
    }

    /// `:event-type`, e.g. `chunk`.
    pub fn event_type(&self) -> Option<&str> {
        self.header_str(":event-type")
    }

    /// `:exception-type` (or `:error-code` on error frames).
    pub fn exception_type(&self) -> Option<&str> {
        self.header_str(":exception-type")
            .or_else(|| self.header_str(":error-code"))
    }
}

/// Incremental frame decoder.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buf: Vec<u8>,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes as they arrive from the network.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Take the next complete frame, if the buffer holds one.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        if self.buf.len() < PRELUDE_LEN {
            return Ok(None);
        }

        let total = read_u32(&self.buf[0..4]) as usize;
        let headers_len = read_u32(&self.buf[4..8]) as usize;
        if total < MIN_FRAME_LEN {
            return Err(FrameError::TooShort(total));
        }
        if total > MAX_FRAME_LEN {
            return Err(FrameError::TooLong(total));
        }
        if headers_len > total - MIN_FRAME_LEN {
            return Err(FrameError::HeadersOverflow {
                headers: headers_len,
                total,
            });
        }
        if crc32(&self.buf[0..8]) != read_u32(&self.buf[8..12]) {
            return Err(FrameError::Checksum { which: "prelude" });
        }
        if self.buf.len() < total {
            return Ok(None);
        }

        let frame_bytes: Vec<u8> = self.buf.drain(..total).collect();
        if crc32(&frame_bytes[..total - CRC_LEN]) != read_u32(&frame_bytes[total - CRC_LEN..]) {
            return Err(FrameError::Checksum { which: "message" });
        }

        let headers_end = PRELUDE_LEN + headers_len;
        let headers = parse_headers(&frame_bytes[PRELUDE_LEN..headers_end])?;
        let payload = frame_bytes[headers_end..total - CRC_LEN].to_vec();
        Ok(Some(Frame { headers, payload }))
    }

    /// Call once the body has ended; leftover bytes mean a cut-off frame.
    pub fn finish(&self) -> Result<(), FrameError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(FrameError::Truncated(self.buf.len()))
        }
    }
}

fn read_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

fn parse_headers(mut b: &[u8]) -> Result<Vec<(String, HeaderValue)>, FrameError> {
    let mut headers = Vec::new();
    while !b.is_empty() {
        let name_len = take(&mut b, 1)?[0] as usize;
        let name = String::from_utf8(take(&mut b, name_len)?.to_vec())
            .map_err(|_| FrameError::BadHeader("header name is not UTF-8".into()))?;
        let kind = take(&mut b, 1)?[0];
        let value = match kind {
            0 => HeaderValue::Bool(true),
            1 => HeaderValue::Bool(false),
            2 => HeaderValue::Byte(take(&mut b, 1)?[0] as i8),
            3 => {
                let v = take(&mut b, 2)?;
                HeaderValue::Short(i16::from_be_bytes([v[0], v[1]]))
            }
            4 => HeaderValue::Int(read_u32(take(&mut b, 4)?) as i32),
            5 => HeaderValue::Long(read_i64(take(&mut b, 8)?)),
            6 | 7 => {
                let len_bytes = take(&mut b, 2)?;
                let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
                let raw = take(&mut b, len)?.to_vec();
                if kind == 6 {
                    HeaderValue::Bytes(raw)
                } else {
                    HeaderValue::String(String::from_utf8(raw).map_err(|_| {
                        FrameError::BadHeader(format!("header '{name}' is not UTF-8"))
                    })?)
                }
            }
            8 => HeaderValue::Timestamp(read_i64(take(&mut b, 8)?)),
            9 => {
                let mut uuid = [0u8; 16];
                uuid.copy_from_slice(take(&mut b, 16)?);
                HeaderValue::Uuid(uuid)
            }
            other => {
                return Err(FrameError::BadHeader(format!(
                    "unknown value type {other} for header '{name}'"
                )))
            }
        };
        headers.push((name, value));
    }
    Ok(headers)
}

fn take<'a>(b: &mut &'a [u8], n: usize) -> Result<&'a [u8], FrameError> {
    if b.len() < n {
        return Err(FrameError::BadHeader("header runs past end of header block".into()));
    }
    let (head, tail) = b.split_at(n);
    *b = tail;
    Ok(head)
}

fn read_i64(b: &[u8]) -> i64 {
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&b[..8]);
    i64::from_be_bytes(arr)
}

/// CRC-32 (IEEE 802.3), as used by event-stream checksums.
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Encode a frame with string headers and valid checksums.
///
/// The service never sends event-stream data; this exists for fixtures and
/// local stand-ins of the Bedrock streaming endpoint.
pub fn encode_frame(headers: &[(&str, &str)], payload: &[u8]) -> Vec<u8> {
    let mut header_block = Vec::new();
    for (name, value) in headers {
        header_block.push(name.len() as u8);
        header_block.extend_from_slice(name.as_bytes());
        header_block.push(7);
        header_block.extend_from_slice(&(value.len() as u16).to_be_bytes());
        header_block.extend_from_slice(value.as_bytes());
    }

    let total = MIN_FRAME_LEN + header_block.len() + payload.len();
    let mut frame = Vec::with_capacity(total);
    frame.extend_from_slice(&(total as u32).to_be_bytes());
    frame.extend_from_slice(&(header_block.len() as u32).to_be_bytes());
    let prelude_crc = crc32(&frame);
    frame.extend_from_slice(&prelude_crc.to_be_bytes());
    frame.extend_from_slice(&header_block);
    frame.extend_from_slice(payload);
    let message_crc = crc32(&frame);
    frame.extend_from_slice(&message_crc.to_be_bytes());
    frame
}
