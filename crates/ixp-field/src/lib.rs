//! Composable binary field codecs.
//!
//! A [`Field`] describes the wire shape of one value: a fixed-width integer,
//! a fixed or length-prefixed byte blob, text, an array, a positional tuple or
//! a named record. Fields nest, so a whole message body is just another field:
//!
//! ```
//! use ixp_field::{Field, Record, Value, U32_LE};
//!
//! let tversion = Field::record([
//!     ("msize", Field::from(U32_LE)),
//!     ("version", Field::string()),
//! ]);
//!
//! let body = tversion
//!     .pack(&Record::new().with("msize", 0xff00ffu32).with("version", "9P2000").into())
//!     .unwrap();
//! assert_eq!(&body[..], b"\xff\x00\xff\x00\x06\x009P2000");
//!
//! let (value, consumed) = tversion.unpack(&body, 0).unwrap();
//! assert_eq!(consumed, body.len());
//! assert_eq!(value.field("msize").and_then(Value::as_u64), Some(0xff00ff));
//! ```
//!
//! Fields never look outside the buffer and offset they are given, and every
//! `unpack` reports exactly the number of bytes `pack` produced.

pub mod blob;
pub mod error;
pub mod field;
pub mod int;
pub mod value;

pub use blob::{BlobField, Length, TextEncoding};
pub use error::{DecodingError, EncodingError};
pub use field::{Count, Field};
pub use int::{
    ByteOrder, IntField, Width, I16_BE, I16_LE, I32_BE, I32_LE, I64_BE, I64_LE, I8, U16_BE,
    U16_LE, U32_BE, U32_LE, U64_BE, U64_LE, U8,
};
pub use value::{Record, Value};
