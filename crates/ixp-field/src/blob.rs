use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{DecodeResult, DecodingError, EncodeResult, EncodingError};
use crate::int::{take, IntField};

/// How a blob (or an array) knows its size on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    /// Declared by the layout; nothing is written.
    Fixed(usize),
    /// Written before the payload by an integer field.
    Prefixed(IntField),
}

/// A byte blob field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobField {
    pub length: Length,
}

impl BlobField {
    pub const fn fixed(len: usize) -> Self {
        Self {
            length: Length::Fixed(len),
        }
    }

    pub const fn prefixed(prefix: IntField) -> Self {
        Self {
            length: Length::Prefixed(prefix),
        }
    }

    pub fn pack_into(&self, data: &[u8], dst: &mut BytesMut) -> EncodeResult<()> {
        match self.length {
            Length::Fixed(expected) => {
                if data.len() != expected {
                    return Err(EncodingError::BlobLength {
                        len: data.len(),
                        expected,
                    });
                }
            }
            Length::Prefixed(prefix) => prefix.pack_len(data.len(), dst)?,
        }
        dst.put_slice(data);
        Ok(())
    }

    /// Borrow the blob at `offset`, returning the payload slice and the total
    /// bytes consumed (prefix included).
    pub fn unpack_slice<'a>(
        &self,
        data: &'a [u8],
        offset: usize,
    ) -> DecodeResult<(&'a [u8], usize)> {
        let (len, header) = match self.length {
            Length::Fixed(len) => (len as u64, 0),
            Length::Prefixed(prefix) => prefix.unpack_len(data, offset)?,
        };
        let body = take(data, offset + header, len)?;
        Ok((body, header + body.len()))
    }

    pub fn unpack(&self, data: &[u8], offset: usize) -> DecodeResult<(Bytes, usize)> {
        let (body, consumed) = self.unpack_slice(data, offset)?;
        Ok((Bytes::copy_from_slice(body), consumed))
    }
}

/// Character encoding applied by text fields on top of a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Ascii,
}

impl TextEncoding {
    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Ascii => "ascii",
        }
    }

    pub fn encode<'a>(self, text: &'a str) -> EncodeResult<&'a [u8]> {
        if let TextEncoding::Ascii = self {
            if let Some(ch) = text.chars().find(|c| !c.is_ascii()) {
                return Err(EncodingError::Unencodable {
                    ch,
                    encoding: self.name(),
                });
            }
        }
        Ok(text.as_bytes())
    }

    /// `base` is the absolute offset of `bytes`, for error positions.
    pub fn decode(self, bytes: &[u8], base: usize) -> DecodeResult<String> {
        match self {
            TextEncoding::Utf8 => match std::str::from_utf8(bytes) {
                Ok(text) => Ok(text.to_string()),
                Err(err) => Err(DecodingError::InvalidText {
                    encoding: self.name(),
                    position: base + err.valid_up_to(),
                }),
            },
            TextEncoding::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(pos) => Err(DecodingError::InvalidText {
                    encoding: self.name(),
                    position: base + pos,
                }),
                // All ASCII, so valid UTF-8.
                None => Ok(String::from_utf8_lossy(bytes).into_owned()),
            },
        }
    }
}
