//! Duplex stream connections for ixp.
//!
//! Provides a unified connection handle over the stream transports 9P servers
//! are usually reachable on:
//! - Unix domain sockets (`unix!/path/to/socket`)
//! - TCP (`tcp!host!port`)
//!
//! This is the lowest layer of ixp. The multiplexer takes ownership of a
//! [`Connection`], clones it once for its receive worker, and shuts it down as
//! part of its own lifecycle.

pub mod dial;
pub mod error;
pub mod traits;

pub use dial::Address;
pub use error::{Result, TransportError};
pub use traits::Connection;
