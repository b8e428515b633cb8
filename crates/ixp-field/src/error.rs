/// Errors raised while packing a value into bytes.
///
/// Always local to the value being packed; never a connection fault.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// The integer does not fit in the field's width and signedness.
    #[error("arithmetic overflow: {value} does not fit in {width} byte {kind} integer")]
    Overflow {
        value: i128,
        width: usize,
        kind: &'static str,
    },

    /// A fixed-length blob was given the wrong number of bytes.
    #[error("blob length {len} does not match fixed length {expected}")]
    BlobLength { len: usize, expected: usize },

    /// A length or count cannot be represented by its prefix field.
    #[error("length {len} does not fit in {width} byte prefix")]
    PrefixOverflow { len: usize, width: usize },

    /// A character cannot be represented in the field's text encoding.
    #[error("character {ch:?} cannot be encoded as {encoding}")]
    Unencodable { ch: char, encoding: &'static str },

    /// A record field was absent from the value.
    #[error("missing record field '{0}'")]
    MissingField(String),

    /// A record value carries a name the layout does not define.
    #[error("unknown record field '{0}'")]
    UnknownField(String),

    /// An array with a count prefix has an item that occupies no bytes.
    #[error("counted array item occupies no bytes")]
    ZeroWidthItem,

    /// The value's shape does not match the field.
    #[error("expected {expected} value, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A tuple or fixed array was given the wrong number of elements.
    #[error("expected {expected} elements, found {found}")]
    Arity { expected: usize, found: usize },
}

/// Errors raised while unpacking a value from bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodingError {
    /// The buffer ends before the length implied by a fixed width, fixed
    /// length or length prefix. This is the codec's framing fault.
    #[error("buffer underrun at offset {offset}: need {needed} bytes, {available} available")]
    Underrun {
        offset: usize,
        needed: u64,
        available: usize,
    },

    /// The bytes are not valid in the field's text encoding.
    #[error("invalid {encoding} text at byte {position}")]
    InvalidText {
        encoding: &'static str,
        position: usize,
    },

    /// An array with a count prefix has an item that occupies no bytes, so
    /// the count is not bounded by the buffer.
    #[error("counted array item occupies no bytes")]
    ZeroWidthItem,

    /// Exact unpacking left bytes unconsumed.
    #[error("{remaining} trailing bytes after value")]
    TrailingBytes { remaining: usize },
}

impl DecodingError {
    /// True for structural faults (the buffer is shorter than declared).
    pub fn is_framing(&self) -> bool {
        matches!(self, DecodingError::Underrun { .. })
    }
}

pub type EncodeResult<T> = std::result::Result<T, EncodingError>;
pub type DecodeResult<T> = std::result::Result<T, DecodingError>;
