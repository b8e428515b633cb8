use bytes::{Buf, BufMut, BytesMut};

use crate::error::{DecodeResult, DecodingError, EncodeResult, EncodingError};
use crate::value::Value;

/// Integer width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    W1 = 1,
    W2 = 2,
    W4 = 4,
    W8 = 8,
}

impl Width {
    pub const fn bytes(self) -> usize {
        self as usize
    }

    const fn bits(self) -> u32 {
        self as u32 * 8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// A fixed-width integer field.
///
/// Width, signedness and byte order are fixed at construction and apply to
/// both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntField {
    pub width: Width,
    pub signed: bool,
    pub order: ByteOrder,
}

pub const U8: IntField = IntField::unsigned(Width::W1, ByteOrder::Little);
pub const U16_LE: IntField = IntField::unsigned(Width::W2, ByteOrder::Little);
pub const U16_BE: IntField = IntField::unsigned(Width::W2, ByteOrder::Big);
pub const U32_LE: IntField = IntField::unsigned(Width::W4, ByteOrder::Little);
pub const U32_BE: IntField = IntField::unsigned(Width::W4, ByteOrder::Big);
pub const U64_LE: IntField = IntField::unsigned(Width::W8, ByteOrder::Little);
pub const U64_BE: IntField = IntField::unsigned(Width::W8, ByteOrder::Big);
pub const I8: IntField = IntField::signed(Width::W1, ByteOrder::Little);
pub const I16_LE: IntField = IntField::signed(Width::W2, ByteOrder::Little);
pub const I16_BE: IntField = IntField::signed(Width::W2, ByteOrder::Big);
pub const I32_LE: IntField = IntField::signed(Width::W4, ByteOrder::Little);
pub const I32_BE: IntField = IntField::signed(Width::W4, ByteOrder::Big);
pub const I64_LE: IntField = IntField::signed(Width::W8, ByteOrder::Little);
pub const I64_BE: IntField = IntField::signed(Width::W8, ByteOrder::Big);

impl IntField {
    pub const fn unsigned(width: Width, order: ByteOrder) -> Self {
        Self {
            width,
            signed: false,
            order,
        }
    }

    pub const fn signed(width: Width, order: ByteOrder) -> Self {
        Self {
            width,
            signed: true,
            order,
        }
    }

    fn kind(&self) -> &'static str {
        if self.signed {
            "signed"
        } else {
            "unsigned"
        }
    }

    /// Inclusive range of representable values.
    pub fn range(&self) -> (i128, i128) {
        let bits = self.width.bits();
        if self.signed {
            (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
        } else {
            (0, (1i128 << bits) - 1)
        }
    }

    /// Append `value` to `dst`.
    pub fn pack_into(&self, value: &Value, dst: &mut BytesMut) -> EncodeResult<()> {
        let raw = match *value {
            Value::UInt(v) => i128::from(v),
            Value::Int(v) => i128::from(v),
            ref other => {
                return Err(EncodingError::Mismatch {
                    expected: "integer",
                    found: other.kind(),
                })
            }
        };
        self.put(raw, dst)
    }

    /// Append a length or count, as a prefix field does.
    pub(crate) fn pack_len(&self, len: usize, dst: &mut BytesMut) -> EncodeResult<()> {
        let (_, max) = self.range();
        if len as u128 > max as u128 {
            return Err(EncodingError::PrefixOverflow {
                len,
                width: self.width.bytes(),
            });
        }
        self.put(len as i128, dst)
    }

    fn put(&self, raw: i128, dst: &mut BytesMut) -> EncodeResult<()> {
        let (min, max) = self.range();
        if raw < min || raw > max {
            return Err(EncodingError::Overflow {
                value: raw,
                width: self.width.bytes(),
                kind: self.kind(),
            });
        }

        let n = self.width.bytes();
        // In range, so the low `n` bytes of the two's complement form are exact.
        let bits = raw as u64;
        match self.order {
            ByteOrder::Little => dst.put_uint_le(bits, n),
            ByteOrder::Big => dst.put_uint(bits, n),
        }
        Ok(())
    }

    /// Decode an integer at `offset`, returning the value and bytes consumed.
    pub fn unpack(&self, data: &[u8], offset: usize) -> DecodeResult<(Value, usize)> {
        let raw = self.get(data, offset)?;
        let value = if self.signed {
            Value::Int(raw as i64)
        } else {
            Value::UInt(raw as u64)
        };
        Ok((value, self.width.bytes()))
    }

    /// Decode a length or count prefix.
    pub(crate) fn unpack_len(&self, data: &[u8], offset: usize) -> DecodeResult<(u64, usize)> {
        let raw = self.get(data, offset)?;
        // Negative prefixes from a signed field can never be satisfied.
        let len = u64::try_from(raw).unwrap_or(u64::MAX);
        Ok((len, self.width.bytes()))
    }

    fn get(&self, data: &[u8], offset: usize) -> DecodeResult<i128> {
        let n = self.width.bytes();
        let mut src = take(data, offset, n as u64)?;
        let raw = match (self.order, self.signed) {
            (ByteOrder::Little, false) => i128::from(src.get_uint_le(n)),
            (ByteOrder::Big, false) => i128::from(src.get_uint(n)),
            (ByteOrder::Little, true) => i128::from(src.get_int_le(n)),
            (ByteOrder::Big, true) => i128::from(src.get_int(n)),
        };
        Ok(raw)
    }
}

/// Borrow `len` bytes at `offset`, or fail with an underrun.
pub(crate) fn take(data: &[u8], offset: usize, len: u64) -> DecodeResult<&[u8]> {
    let available = data.len().saturating_sub(offset);
    if offset > data.len() || len > available as u64 {
        return Err(DecodingError::Underrun {
            offset,
            needed: len,
            available,
        });
    }
    let len = len as usize;
    Ok(&data[offset..offset + len])
}
