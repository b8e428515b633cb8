use std::fmt;
use std::io;

use ixp::mux::MuxError;
use ixp::transport::TransportError;
use ixp::CallError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: &io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: &TransportError) -> CliError {
    match err {
        TransportError::InvalidAddress { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn mux_error(context: &str, err: &MuxError) -> CliError {
    match err {
        MuxError::Transport(source) => io_error(context, source),
        MuxError::Connect(source) => transport_error(context, source),
        MuxError::Encoding(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        MuxError::Framing(_) | MuxError::UnknownTag(_) => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        MuxError::Config(_) => CliError::new(USAGE, format!("{context}: {err}")),
        MuxError::Closed | MuxError::Shutdown => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

pub fn call_error(context: &str, err: &CallError) -> CliError {
    match err {
        CallError::Mux(err) => mux_error(context, err),
        CallError::Protocol(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        CallError::Encoding(_) | CallError::Decoding(_) | CallError::UnexpectedType { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
    }
}
