//! Error taxonomy for the FTP/FTPS dispatcher.

use std::fmt;
use std::io;

/// Categorised error produced by the context, parser, or transfer strategy.
#[derive(Debug)]
pub enum FtpError {
    /// A reply's leading line could not be parsed as `NNN(-| )...`.
    BadReply(String),
    /// A well-formed reply whose code indicates a command failure (4xx/5xx).
    ProtocolError { code: u16, message: String },
    /// A `227`/`229` reply could not be parsed into a usable address.
    BadPasvReply(String),
    /// The data-channel TCP connect failed or timed out.
    DataDialFailed(String),
    /// The TLS handshake itself failed (not a certificate problem).
    TlsHandshakeFailed(String),
    /// The peer's certificate was rejected by the configured verifier.
    TlsAuthorizationFailed(String),
    /// No signal arrived within the configured timeout.
    Timeout,
    /// The context is closed; no further dispatch is possible.
    Closed,
    /// `dispatch` was called while another task was already pending.
    Busy,
    /// Any other I/O failure on the control or data socket.
    Transport(io::Error),
}

pub type FtpResult<T> = Result<T, FtpError>;

impl FtpError {
    pub fn protocol_error(code: u16, message: impl Into<String>) -> Self {
        Self::ProtocolError {
            code,
            message: message.into(),
        }
    }

    /// Classify a completed reply: success stays `Ok`, 4xx/5xx becomes
    /// `ProtocolError`.
    pub fn from_reply(code: u16, message: &str) -> FtpResult<()> {
        if code < 400 {
            Ok(())
        } else {
            Err(Self::protocol_error(code, message))
        }
    }
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadReply(s) => write!(f, "malformed reply: {s}"),
            Self::ProtocolError { code, message } => write!(f, "{code} {message}"),
            Self::BadPasvReply(s) => write!(f, "malformed passive-mode reply: {s}"),
            Self::DataDialFailed(s) => write!(f, "data connection failed: {s}"),
            Self::TlsHandshakeFailed(s) => write!(f, "TLS handshake failed: {s}"),
            Self::TlsAuthorizationFailed(s) => write!(f, "TLS certificate rejected: {s}"),
            Self::Timeout => write!(f, "timed out waiting for a signal"),
            Self::Closed => write!(f, "context is closed"),
            Self::Busy => write!(f, "a task is already pending on this context"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
        }
    }
}

impl std::error::Error for FtpError {}

impl From<io::Error> for FtpError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::TimedOut {
            Self::Timeout
        } else {
            Self::Transport(e)
        }
    }
}

impl From<rustls::Error> for FtpError {
    fn from(e: rustls::Error) -> Self {
        Self::TlsHandshakeFailed(e.to_string())
    }
}
