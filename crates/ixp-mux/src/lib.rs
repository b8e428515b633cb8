//! Tag-multiplexed request/response client.
//!
//! One [`Multiplexer`] owns one connection and lets any number of callers
//! have requests in flight on it at once. Requests are framed and written in
//! submission order by a single send worker; a single receive worker reads
//! response frames and routes each one back to its caller by tag.
//!
//! - *Tagged* requests draw a tag from a bounded pool and may be answered in
//!   any order.
//! - *Sequential* requests share the reserved [`Multiplexer::NOTAG`] tag and
//!   are answered strictly in submission order.
//!
//! Every accepted request is resolved exactly once: by its response, or by
//! an error when the connection fails, is closed, or is shut down.

pub mod config;
pub mod error;
pub mod mux;
pub mod tags;

mod pending;
mod worker;

pub use config::MuxConfig;
pub use error::{MuxError, Result};
pub use mux::{Dispatch, Multiplexer, Response, State};
pub use tags::TagPool;
