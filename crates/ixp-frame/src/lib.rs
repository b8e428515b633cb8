//! Frame protocol for tagged request streams.
//!
//! Every message on the wire is framed with:
//! - A 4-byte little-endian total length (header included)
//! - A 1-byte message type code
//! - A 2-byte little-endian tag correlating a response with its request
//!
//! The body is opaque at this layer. Readers only ever hand out complete
//! frames, and a declared length shorter than the header is reported as a
//! fatal framing error.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::FrameCodec;
pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_FRAME_SIZE, HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
