use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: length (4) + type code (1) + tag (2) = 7 bytes.
pub const HEADER_SIZE: usize = 7;

/// Default maximum frame size (header included): 16 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// A complete frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message type code.
    pub type_code: u8,
    /// Correlation tag.
    pub tag: u16,
    /// The unparsed message body.
    pub body: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(type_code: u8, tag: u16, body: impl Into<Bytes>) -> Self {
        Self {
            type_code,
            tag,
            body: body.into(),
        }
    }

    /// The total wire size of this frame (header + body), as written in the
    /// length field.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.body.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────┬──────────┬──────────────────────┐
/// │ Length (4B)  │ Type     │ Tag      │ Body                 │
/// │ LE, total    │ (1B)     │ (2B LE)  │ (Length - 7 bytes)   │
/// └──────────────┴──────────┴──────────┴──────────────────────┘
/// ```
pub fn encode_frame(type_code: u8, tag: u16, body: &[u8], dst: &mut BytesMut) -> Result<()> {
    let total = HEADER_SIZE + body.len();
    if total > u32::MAX as usize {
        return Err(FrameError::FrameTooLarge {
            size: total,
            max: u32::MAX as usize,
        });
    }
    dst.reserve(total);
    dst.put_u32_le(total as u32);
    dst.put_u8(type_code);
    dst.put_u16_le(tag);
    dst.put_slice(body);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. The declared length
/// is validated as soon as it is available, before waiting for the body.
pub fn decode_frame(src: &mut BytesMut, max_frame_size: usize) -> Result<Option<Frame>> {
    if src.len() < 4 {
        return Ok(None); // Need more data
    }

    let length = u32::from_le_bytes([src[0], src[1], src[2], src[3]]);
    if (length as usize) < HEADER_SIZE {
        return Err(FrameError::InvalidLength {
            length,
            header: HEADER_SIZE,
        });
    }

    let total = length as usize;
    if total > max_frame_size {
        return Err(FrameError::FrameTooLarge {
            size: total,
            max: max_frame_size,
        });
    }

    if src.len() < total {
        return Ok(None); // Need more data
    }

    let mut frame = src.split_to(total);
    frame.advance(4);
    let type_code = frame.get_u8();
    let tag = frame.get_u16_le();

    Ok(Some(Frame {
        type_code,
        tag,
        body: frame.freeze(),
    }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum frame size in bytes, header included. Default: 16 MiB.
    pub max_frame_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}
