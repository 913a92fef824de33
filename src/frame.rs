//! Frame handling: split a byte buffer holding one or more MessagePack messages.
//!
//! MessagePack values are self-delimiting, so a buffer read from a stream can carry
//! several messages back to back, possibly ending in a partial one. Messages that
//! decode but are not message arrays (`[id, ...]` with at least two elements) are
//! removed and reported; the rest of the buffer is still processed.

use crate::codec::{to_bytes, wire_kind, CodecError};
use rmpv::Value as Wire;
use std::io::{Cursor, ErrorKind};

/// Result of decoding a buffer.
#[derive(Debug, Default)]
pub struct FrameDecodeResult {
    /// Well-formed message arrays, in arrival order.
    pub messages: Vec<DecodedMessage>,
    /// Values that decoded but are not messages.
    pub removed: Vec<RemovedMessage>,
    /// Length of a trailing partial message; keep these bytes for the next read.
    pub incomplete: usize,
}

#[derive(Debug)]
pub struct DecodedMessage {
    pub value: Wire,
    pub byte_range: (usize, usize),
}

#[derive(Debug)]
pub struct RemovedMessage {
    pub byte_range: (usize, usize),
    pub reason: String,
}

/// Bytes that are not MessagePack at all; the stream cannot be resynchronized.
#[derive(Debug, thiserror::Error)]
#[error("corrupt data at byte {offset}: {reason}")]
pub struct FrameError {
    pub offset: usize,
    pub reason: String,
}

/// Decode every complete message in `bytes`.
pub fn decode_frame(bytes: &[u8]) -> Result<FrameDecodeResult, FrameError> {
    let mut result = FrameDecodeResult::default();
    let mut offset = 0;

    while offset < bytes.len() {
        let mut cursor = Cursor::new(&bytes[offset..]);
        let value = match rmpv::decode::read_value(&mut cursor) {
            Ok(v) => v,
            Err(e) if is_eof(&e) => {
                result.incomplete = bytes.len() - offset;
                break;
            }
            Err(e) => {
                return Err(FrameError {
                    offset,
                    reason: e.to_string(),
                })
            }
        };
        let consumed = cursor.position() as usize;
        let byte_range = (offset, offset + consumed);
        match check_message(&value) {
            Ok(()) => result.messages.push(DecodedMessage { value, byte_range }),
            Err(reason) => {
                tracing::warn!(start = byte_range.0, end = byte_range.1, %reason, "dropping non-message value");
                result.removed.push(RemovedMessage { byte_range, reason });
            }
        }
        offset += consumed;
    }

    tracing::trace!(
        messages = result.messages.len(),
        removed = result.removed.len(),
        incomplete = result.incomplete,
        "decoded frame"
    );
    Ok(result)
}

/// Concatenate the encodings of several messages.
pub fn encode_frame(messages: &[Wire]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    for m in messages {
        out.extend(to_bytes(m)?);
    }
    Ok(out)
}

fn is_eof(e: &rmpv::decode::Error) -> bool {
    match e {
        rmpv::decode::Error::InvalidMarkerRead(io) | rmpv::decode::Error::InvalidDataRead(io) => {
            io.kind() == ErrorKind::UnexpectedEof
        }
        _ => false,
    }
}

fn check_message(value: &Wire) -> Result<(), String> {
    match value {
        Wire::Array(items) if items.len() >= 2 => match &items[0] {
            Wire::Nil | Wire::Integer(_) => Ok(()),
            other => Err(format!("message id must be an integer or nil, found {}", wire_kind(other))),
        },
        Wire::Array(items) => Err(format!("message array has {} element(s), need at least 2", items.len())),
        other => Err(format!("expected message array, found {}", wire_kind(other))),
    }
}
