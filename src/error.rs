use std::io;

use thiserror::Error;

/// How the resilient wrapper should treat a failed remote call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Expected to clear after a reconnect.
    Transient,
    /// Retrying will not help.
    Permanent,
    /// The session has no live connection.
    NotConnected,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("not connected")]
    NotConnected,

    #[error("connection lost")]
    ConnectionLost,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server said NO: {0}")]
    Refused(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),

    /// A transient failure that survived the single reconnect-and-retry.
    #[error("{op} failed after reconnect: {source}")]
    RetryExhausted {
        op: &'static str,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotConnected => ErrorKind::NotConnected,
            Error::ConnectionLost | Error::Tls(_) | Error::Protocol(_) => ErrorKind::Transient,
            Error::Io(e) if is_transient_io(e.kind()) => ErrorKind::Transient,
            _ => ErrorKind::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

fn is_transient_io(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::NotConnected
    )
}

impl From<imap::Error> for Error {
    fn from(e: imap::Error) -> Self {
        match e {
            imap::Error::Io(e) => Error::Io(e),
            imap::Error::Tls(e) => Error::Tls(e.to_string()),
            imap::Error::TlsHandshake(e) => Error::Tls(e.to_string()),
            imap::Error::ConnectionLost => Error::ConnectionLost,
            imap::Error::Bad(s) => Error::Protocol(s),
            imap::Error::Parse(e) => Error::Protocol(e.to_string()),
            imap::Error::No(s) => Error::Refused(s),
            other => Error::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_drops_are_transient() {
        for kind in [
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::ConnectionAborted,
        ] {
            assert_eq!(Error::Io(io::Error::new(kind, "x")).kind(), ErrorKind::Transient);
        }
        assert_eq!(Error::ConnectionLost.kind(), ErrorKind::Transient);
        assert_eq!(Error::Tls("handshake".into()).kind(), ErrorKind::Transient);
        assert_eq!(Error::Protocol("BAD".into()).kind(), ErrorKind::Transient);
    }

    #[test]
    fn logical_failures_are_permanent() {
        assert_eq!(Error::Refused("no such mailbox".into()).kind(), ErrorKind::Permanent);
        assert_eq!(
            Error::Io(io::Error::new(io::ErrorKind::PermissionDenied, "x")).kind(),
            ErrorKind::Permanent
        );
        let exhausted = Error::RetryExhausted {
            op: "FETCH",
            source: Box::new(Error::ConnectionLost),
        };
        assert_eq!(exhausted.kind(), ErrorKind::Permanent);
    }

    #[test]
    fn not_connected_has_its_own_kind() {
        assert_eq!(Error::NotConnected.kind(), ErrorKind::NotConnected);
    }

    #[test]
    fn imap_errors_map_onto_kinds() {
        assert!(Error::from(imap::Error::ConnectionLost).is_transient());
        assert!(Error::from(imap::Error::Bad("oops".into())).is_transient());
        assert!(!Error::from(imap::Error::No("denied".into())).is_transient());
    }
}
