use std::sync::Arc;

use ixp_frame::FrameError;
use ixp_transport::TransportError;

/// Errors reported by the multiplexer.
///
/// Cloneable so a single connection fault can be handed to every pending
/// request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MuxError {
    /// The request body could not be framed. Affects only that request.
    #[error("request could not be framed: {0}")]
    Encoding(#[source] Arc<FrameError>),

    /// A received frame was structurally invalid. Fatal to the connection.
    #[error("framing error: {0}")]
    Framing(#[source] Arc<FrameError>),

    /// I/O failure on the connection. Fatal to the connection.
    #[error("transport error: {0}")]
    Transport(#[source] Arc<std::io::Error>),

    /// The connection could not be established.
    #[error("connect failed: {0}")]
    Connect(#[source] Arc<TransportError>),

    /// A response arrived for a tag nothing is waiting on. Fatal: the stream
    /// can no longer be trusted.
    #[error("response for unknown tag {0:#06x}")]
    UnknownTag(u16),

    /// The multiplexer is closed, or closing, and accepts no more requests.
    #[error("multiplexer closed")]
    Closed,

    /// The request was cancelled by a graceful shutdown.
    #[error("multiplexer shut down")]
    Shutdown,

    /// Invalid multiplexer configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MuxError {
    /// True for faults that terminate the whole connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MuxError::Framing(_) | MuxError::Transport(_) | MuxError::UnknownTag(_)
        )
    }
}

impl From<FrameError> for MuxError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(io) => MuxError::Transport(Arc::new(io)),
            FrameError::ConnectionClosed => MuxError::Transport(Arc::new(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            ))),
            other => MuxError::Framing(Arc::new(other)),
        }
    }
}

impl From<TransportError> for MuxError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Io(io) => MuxError::Transport(Arc::new(io)),
            other => MuxError::Connect(Arc::new(other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, MuxError>;
