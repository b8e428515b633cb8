use std::fmt;
use std::net::TcpStream;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::Connection;

/// A parsed Plan 9 style dial string.
///
/// ```text
/// unix!/tmp/ns.user.:0/wmii
/// tcp!localhost!564
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// Filesystem-path Unix domain socket.
    Unix(PathBuf),
    /// TCP host and port.
    Tcp { host: String, port: u16 },
}

impl FromStr for Address {
    type Err = TransportError;

    fn from_str(address: &str) -> Result<Self> {
        let invalid = |reason| TransportError::InvalidAddress {
            address: address.to_string(),
            reason,
        };

        let (scheme, rest) = address
            .split_once('!')
            .ok_or_else(|| invalid("expected '<network>!<address>'"))?;

        match scheme {
            "unix" => {
                if rest.is_empty() {
                    return Err(invalid("missing socket path"));
                }
                Ok(Address::Unix(PathBuf::from(rest)))
            }
            "tcp" => {
                let (host, port) = rest
                    .rsplit_once('!')
                    .ok_or_else(|| invalid("expected 'tcp!<host>!<port>'"))?;
                if host.is_empty() {
                    return Err(invalid("missing host"));
                }
                let port = port.parse().map_err(|_| invalid("invalid port"))?;
                Ok(Address::Tcp {
                    host: host.to_string(),
                    port,
                })
            }
            _ => Err(invalid("unknown network (expected 'unix' or 'tcp')")),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Unix(path) => write!(f, "unix!{}", path.display()),
            Address::Tcp { host, port } => write!(f, "tcp!{host}!{port}"),
        }
    }
}

impl Address {
    /// Open a connection to this address.
    pub fn connect(&self) -> Result<Connection> {
        debug!(address = %self, "dialing");
        match self {
            #[cfg(unix)]
            Address::Unix(path) => std::os::unix::net::UnixStream::connect(path)
                .map(Connection::from)
                .map_err(|source| TransportError::Connect {
                    address: self.to_string(),
                    source,
                }),
            #[cfg(not(unix))]
            Address::Unix(_) => Err(TransportError::Unsupported("unix")),
            Address::Tcp { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port)).map_err(|source| {
                    TransportError::Connect {
                        address: self.to_string(),
                        source,
                    }
                })?;
                // Small request frames must not sit in the Nagle buffer.
                stream.set_nodelay(true)?;
                Ok(Connection::from(stream))
            }
        }
    }
}

impl Connection {
    /// Parse a dial string and connect to it.
    pub fn dial(address: &str) -> Result<Self> {
        address.parse::<Address>()?.connect()
    }
}
