//! Request/response pairing.
//!
//! The multiplexer hands back whatever frame answers a request. An
//! [`Exchange`] knows which response type a request expects, and treats the
//! protocol's error response (`Rerror`, type [`RERROR`]) as a failure carrying
//! the server's reason string.

use bytes::Bytes;
use ixp_field::{DecodingError, EncodingError, Field, Value};
use ixp_mux::{Dispatch, Multiplexer, MuxError, Response};
use tracing::debug;

/// Type code of the error response.
pub const RERROR: u8 = 107;

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error(transparent)]
    Mux(#[from] MuxError),

    #[error("request body: {0}")]
    Encoding(#[from] EncodingError),

    #[error("response body: {0}")]
    Decoding(#[from] DecodingError),

    /// The server answered with an error response.
    #[error("server error: {0}")]
    Protocol(String),

    #[error("expected response type {expected}, got {found}")]
    UnexpectedType { expected: u8, found: u8 },
}

/// A request type paired with the response type that answers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exchange {
    pub request_type: u8,
    pub response_type: u8,
}

impl Exchange {
    pub const fn new(request_type: u8, response_type: u8) -> Self {
        Self {
            request_type,
            response_type,
        }
    }

    /// Pair a T-message with its R-message, numbered one above it.
    pub const fn paired(request_type: u8) -> Self {
        Self::new(request_type, request_type.wrapping_add(1))
    }

    /// Send a raw body and return the raw response body.
    pub fn call(
        &self,
        mux: &Multiplexer,
        body: impl Into<Bytes>,
        dispatch: Dispatch,
    ) -> Result<Bytes, CallError> {
        let response = mux.request(self.request_type, body, dispatch)?;
        self.accept(response)
    }

    /// Pack `value` with `request`, send it, and decode the whole response
    /// body with `response`.
    pub fn call_value(
        &self,
        mux: &Multiplexer,
        request: &Field,
        value: &Value,
        response: &Field,
        dispatch: Dispatch,
    ) -> Result<Value, CallError> {
        let body = request.pack(value)?;
        let reply = self.call(mux, body, dispatch)?;
        Ok(response.unpack_exact(&reply)?)
    }

    /// Await the response through the multiplexer's future API.
    #[cfg(feature = "async")]
    pub async fn call_async(
        &self,
        mux: &Multiplexer,
        body: impl Into<Bytes>,
        dispatch: Dispatch,
    ) -> Result<Bytes, CallError> {
        let response = mux.call(self.request_type, body, dispatch).await?;
        self.accept(response)
    }

    /// Check a response against this exchange.
    pub fn accept(&self, response: Response) -> Result<Bytes, CallError> {
        if response.type_code == self.response_type {
            return Ok(response.body);
        }
        if response.type_code == RERROR {
            let reason = error_reason(&response.body)?;
            debug!(request_type = self.request_type, %reason, "error response");
            return Err(CallError::Protocol(reason));
        }
        Err(CallError::UnexpectedType {
            expected: self.response_type,
            found: response.type_code,
        })
    }
}

/// Decode the reason string carried by an error response body.
pub fn error_reason(body: &[u8]) -> Result<String, DecodingError> {
    let value = Field::string().unpack_exact(body)?;
    Ok(value.as_str().unwrap_or_default().to_string())
}
