use bytes::{Bytes, BytesMut};

use crate::blob::{BlobField, Length, TextEncoding};
use crate::error::{DecodeResult, DecodingError, EncodeResult, EncodingError};
use crate::int::{IntField, U16_LE};
use crate::value::{Record, Value};

/// Element count of an array field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    Fixed(usize),
    Prefixed(IntField),
}

/// The wire shape of one value.
///
/// Composite variants are built only from other fields and delegate to them
/// entirely, accumulating the bytes consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Int(IntField),
    Blob(BlobField),
    Text {
        blob: BlobField,
        encoding: TextEncoding,
    },
    Array {
        count: Count,
        item: Box<Field>,
    },
    Sequence(Vec<Field>),
    Record(Vec<(String, Field)>),
}

impl From<IntField> for Field {
    fn from(field: IntField) -> Self {
        Field::Int(field)
    }
}

impl From<BlobField> for Field {
    fn from(field: BlobField) -> Self {
        Field::Blob(field)
    }
}

impl Field {
    /// Bytes with a length prefix.
    pub fn data(prefix: IntField) -> Self {
        Field::Blob(BlobField::prefixed(prefix))
    }

    /// Bytes of a fixed declared length.
    pub fn fixed(len: usize) -> Self {
        Field::Blob(BlobField::fixed(len))
    }

    /// UTF-8 text with a length prefix.
    pub fn text(prefix: IntField) -> Self {
        Self::text_with(BlobField::prefixed(prefix), TextEncoding::Utf8)
    }

    pub fn text_with(blob: BlobField, encoding: TextEncoding) -> Self {
        Field::Text { blob, encoding }
    }

    /// The 9P string: UTF-8 with a little-endian u16 length prefix.
    pub fn string() -> Self {
        Self::text(U16_LE)
    }

    /// Items preceded by a count prefix.
    pub fn array(prefix: IntField, item: impl Into<Field>) -> Self {
        Field::Array {
            count: Count::Prefixed(prefix),
            item: Box::new(item.into()),
        }
    }

    /// Exactly `len` items, no prefix.
    pub fn fixed_array(len: usize, item: impl Into<Field>) -> Self {
        Field::Array {
            count: Count::Fixed(len),
            item: Box::new(item.into()),
        }
    }

    pub fn sequence<I, F>(fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        Field::Sequence(fields.into_iter().map(Into::into).collect())
    }

    pub fn record<I, N, F>(fields: I) -> Self
    where
        I: IntoIterator<Item = (N, F)>,
        N: Into<String>,
        F: Into<Field>,
    {
        Field::Record(
            fields
                .into_iter()
                .map(|(name, field)| (name.into(), field.into()))
                .collect(),
        )
    }

    /// Pack a value into a new buffer.
    pub fn pack(&self, value: &Value) -> EncodeResult<Bytes> {
        let mut dst = BytesMut::new();
        self.pack_into(value, &mut dst)?;
        Ok(dst.freeze())
    }

    /// Append a packed value to `dst`.
    ///
    /// On error `dst` may hold a partial encoding.
    pub fn pack_into(&self, value: &Value, dst: &mut BytesMut) -> EncodeResult<()> {
        match (self, value) {
            (Field::Int(field), value) => field.pack_into(value, dst),
            (Field::Blob(blob), Value::Bytes(data)) => blob.pack_into(data, dst),
            (Field::Text { blob, encoding }, Value::Text(text)) => {
                blob.pack_into(encoding.encode(text)?, dst)
            }
            (Field::Array { count, item }, Value::List(items)) => {
                match *count {
                    Count::Fixed(expected) if items.len() != expected => {
                        return Err(EncodingError::Arity {
                            expected,
                            found: items.len(),
                        })
                    }
                    Count::Fixed(_) => {}
                    Count::Prefixed(_) if item.is_zero_width() => {
                        return Err(EncodingError::ZeroWidthItem)
                    }
                    Count::Prefixed(prefix) => prefix.pack_len(items.len(), dst)?,
                }
                items.iter().try_for_each(|v| item.pack_into(v, dst))
            }
            (Field::Sequence(fields), Value::Tuple(values)) => {
                if fields.len() != values.len() {
                    return Err(EncodingError::Arity {
                        expected: fields.len(),
                        found: values.len(),
                    });
                }
                fields
                    .iter()
                    .zip(values)
                    .try_for_each(|(field, v)| field.pack_into(v, dst))
            }
            (Field::Record(fields), Value::Record(record)) => {
                if let Some((name, _)) = record
                    .iter()
                    .find(|(name, _)| !fields.iter().any(|(n, _)| n == name))
                {
                    return Err(EncodingError::UnknownField(name.to_string()));
                }
                fields.iter().try_for_each(|(name, field)| {
                    let v = record
                        .get(name)
                        .ok_or_else(|| EncodingError::MissingField(name.clone()))?;
                    field.pack_into(v, dst)
                })
            }
            (field, value) => Err(EncodingError::Mismatch {
                expected: field.value_kind(),
                found: value.kind(),
            }),
        }
    }

    /// Decode a value starting at `offset`.
    ///
    /// Returns the value and the number of bytes it occupied.
    pub fn unpack(&self, data: &[u8], offset: usize) -> DecodeResult<(Value, usize)> {
        match self {
            Field::Int(field) => field.unpack(data, offset),
            Field::Blob(blob) => {
                let (bytes, consumed) = blob.unpack(data, offset)?;
                Ok((Value::Bytes(bytes), consumed))
            }
            Field::Text { blob, encoding } => {
                let (body, consumed) = blob.unpack_slice(data, offset)?;
                let base = offset + consumed - body.len();
                Ok((Value::Text(encoding.decode(body, base)?), consumed))
            }
            Field::Array { count, item } => {
                let mut cursor = offset;
                let count = match *count {
                    Count::Fixed(n) => n as u64,
                    Count::Prefixed(_) if item.is_zero_width() => {
                        return Err(DecodingError::ZeroWidthItem)
                    }
                    Count::Prefixed(prefix) => {
                        let (n, size) = prefix.unpack_len(data, cursor)?;
                        cursor += size;
                        n
                    }
                };
                // Counted items consume at least one byte each, so a bogus
                // count underruns before it can grow the list much.
                let mut items = Vec::new();
                for _ in 0..count {
                    let (v, size) = item.unpack(data, cursor)?;
                    items.push(v);
                    cursor += size;
                }
                Ok((Value::List(items), cursor - offset))
            }
            Field::Sequence(fields) => {
                let mut cursor = offset;
                let mut values = Vec::with_capacity(fields.len());
                for field in fields {
                    let (v, size) = field.unpack(data, cursor)?;
                    values.push(v);
                    cursor += size;
                }
                Ok((Value::Tuple(values), cursor - offset))
            }
            Field::Record(fields) => {
                let mut cursor = offset;
                let mut record = Record::new();
                for (name, field) in fields {
                    let (v, size) = field.unpack(data, cursor)?;
                    record.insert(name.clone(), v);
                    cursor += size;
                }
                Ok((Value::Record(record), cursor - offset))
            }
        }
    }

    /// Decode a value that must occupy the whole buffer, as a message body does.
    pub fn unpack_exact(&self, data: &[u8]) -> DecodeResult<Value> {
        let (value, consumed) = self.unpack(data, 0)?;
        if consumed != data.len() {
            return Err(DecodingError::TrailingBytes {
                remaining: data.len() - consumed,
            });
        }
        Ok(value)
    }

    /// True when the field never occupies any bytes.
    fn is_zero_width(&self) -> bool {
        match self {
            Field::Int(_) => false,
            Field::Blob(blob) | Field::Text { blob, .. } => blob.length == Length::Fixed(0),
            Field::Array {
                count: Count::Fixed(n),
                item,
            } => *n == 0 || item.is_zero_width(),
            Field::Array { .. } => false,
            Field::Sequence(fields) => fields.iter().all(Field::is_zero_width),
            Field::Record(fields) => fields.iter().all(|(_, f)| f.is_zero_width()),
        }
    }

    fn value_kind(&self) -> &'static str {
        match self {
            Field::Int(_) => "integer",
            Field::Blob(_) => "bytes",
            Field::Text { .. } => "text",
            Field::Array { .. } => "list",
            Field::Sequence(_) => "tuple",
            Field::Record(_) => "record",
        }
    }
}
