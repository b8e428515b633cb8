//! Client core for 9P-style tagged request/response protocols.
//!
//! # Crate Structure
//!
//! - [`transport`] - Connection handle over Unix sockets or TCP, dial strings
//! - [`field`] - Composable binary field codecs for message bodies
//! - [`frame`] - Length/type/tag framing
//! - [`mux`] - Concurrent tagged requests over one connection
//! - [`Exchange`] - Pairs a request type with its response type and turns
//!   error responses into errors

pub mod exchange;

pub use exchange::{CallError, Exchange, RERROR};

/// Re-export transport types.
pub mod transport {
    pub use ixp_transport::*;
}

/// Re-export field codec types.
pub mod field {
    pub use ixp_field::*;
}

/// Re-export frame types.
pub mod frame {
    pub use ixp_frame::*;
}

/// Re-export multiplexer types.
pub mod mux {
    pub use ixp_mux::*;
}
