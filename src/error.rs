//! The crate's error taxonomy.

use thiserror::Error;

/// A list specifying categories of [`MdbError`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MdbError {
    /// The socket could not be opened, or TLS setup failed before any
    /// protocol byte was exchanged.
    #[error("connection to the server could not be established")]
    Connect {
        /// The causing error.
        #[from]
        source: std::io::Error,
    },

    /// TLS handshake failed after the TCP connection was already open.
    #[error("TLS handshake failed")]
    Tls {
        /// The causing error.
        #[from]
        source: rustls::Error,
    },

    /// The server name supplied for TLS was not a valid DNS name.
    #[error("the configured host is not a valid TLS server name")]
    TlsInvalidName {
        /// The causing error.
        #[from]
        source: rustls::client::InvalidDnsNameError,
    },

    /// A wire message frame was truncated or otherwise malformed.
    #[error("wire protocol framing error: {0}")]
    Protocol(String),

    /// A BSON document could not be decoded.
    #[error("BSON decode error: {0}")]
    Decode(String),

    /// A value could not be represented in BSON.
    #[error("BSON encode error: {0}")]
    Encode(String),

    /// The parameter document passed to `run_command` did not identify
    /// exactly one known command.
    #[error("could not determine a single command name from the given document")]
    BadCommand,

    /// The SCRAM-SHA-1 handshake failed, either because the server
    /// rejected a step or because the server's final signature did not
    /// verify.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The server executed the command but reported failure (`ok` was
    /// not `1`). Carries the server's `errmsg`, if any.
    #[error("server reported an error: {0}")]
    Operational(String),

    /// Programming error: a method was used in a way its contract
    /// forbids.
    #[error("usage error: {0}")]
    Usage(&'static str),
}

/// Abbreviation of `Result<T, MdbError>`.
pub type MdbResult<T> = std::result::Result<T, MdbError>;

impl MdbError {
    /// Returns the server's `errmsg`, if this error originated from an
    /// `ok: 0` command reply.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Operational(msg) => Some(msg),
            _ => None,
        }
    }

    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub(crate) fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub(crate) fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }
}
