//! Error taxonomy for the connection core.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures reported by [`Connector`](super::Connector) and [`Sender`](super::Sender).
///
/// A read failure after registration is not represented here: it reaches the
/// consumer in-band, as the [`DISCONNECT_SENTINEL`](super::DISCONNECT_SENTINEL) line.
#[derive(Debug, Error)]
pub enum Error {
    /// Dialing, proxy negotiation, or a socket read/write failed. The socket
    /// has been closed and the connection is no longer registered.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The server sent an `ERROR` line while we were registering.
    #[error("server sent error: {line}")]
    Protocol { line: String },
}

impl Error {
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(..))
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Protocol {
            line: "ERROR :Closing Link".into(),
        };
        assert_eq!(err.to_string(), "server sent error: ERROR :Closing Link");

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: Error = io.into();
        assert!(err.is_connection());
        assert_eq!(err.to_string(), "connection error: refused");
    }
}
