//! Socket adapter — unifies plain TCP and TLS-wrapped TCP behind one type
//! the dispatcher can poll for events without caring which it has.

use crate::error::{FtpError, FtpResult};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;

/// One event surfaced off a socket: bytes, an I/O error, a read timeout,
/// or an orderly close (EOF).
#[derive(Debug)]
pub enum SocketEvent {
    Data(Vec<u8>),
    Error(FtpError),
    Timeout,
    Closed,
}

const READ_CHUNK: usize = 4096;

/// A control or data connection, plain or TLS.
pub enum Socket {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Socket {
    pub async fn connect(host: &str, port: u16, dial_timeout: Duration) -> FtpResult<Self> {
        let addr = format!("{host}:{port}");
        let tcp = timeout(dial_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| FtpError::DataDialFailed(format!("connect to {addr} timed out")))?
            .map_err(|e| FtpError::DataDialFailed(format!("connect to {addr}: {e}")))?;
        tcp.set_nodelay(true).ok();
        Ok(Self::Plain(tcp))
    }

    /// Consume a plain socket and hand back its TLS-wrapped replacement.
    /// Panics-free: upgrading an already-TLS socket is a logic error the
    /// caller (connection-phase code) never triggers, so it is rejected
    /// with a handshake error instead.
    pub async fn upgrade_to_tls(
        self,
        connector: &tokio_rustls::TlsConnector,
        host: &str,
    ) -> FtpResult<Self> {
        let tcp = match self {
            Self::Plain(tcp) => tcp,
            Self::Tls(_) => {
                return Err(FtpError::TlsHandshakeFailed(
                    "socket is already TLS-wrapped".into(),
                ))
            }
        };
        let server_name = rustls::pki_types::ServerName::try_from(host.to_string())
            .map_err(|e| FtpError::TlsHandshakeFailed(format!("invalid server name: {e}")))?;
        let tls = connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| FtpError::TlsHandshakeFailed(e.to_string()))?;
        Ok(Self::Tls(Box::new(tls)))
    }

    pub async fn write_all(&mut self, bytes: &[u8]) -> FtpResult<()> {
        match self {
            Self::Plain(s) => s.write_all(bytes).await?,
            Self::Tls(s) => s.write_all(bytes).await?,
        }
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> FtpResult<usize> {
        let n = match self {
            Self::Plain(s) => s.read(buf).await?,
            Self::Tls(s) => s.read(buf).await?,
        };
        Ok(n)
    }

    /// Wait for one event, bounded by `read_timeout`.
    pub async fn next_event(&mut self, read_timeout: Duration) -> SocketEvent {
        let mut buf = [0u8; READ_CHUNK];
        match timeout(read_timeout, self.read(&mut buf)).await {
            Err(_) => SocketEvent::Timeout,
            Ok(Err(e)) => SocketEvent::Error(e),
            Ok(Ok(0)) => SocketEvent::Closed,
            Ok(Ok(n)) => SocketEvent::Data(buf[..n].to_vec()),
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    pub async fn shutdown(&mut self) {
        let _ = match self {
            Self::Plain(s) => s.shutdown().await,
            Self::Tls(s) => s.shutdown().await,
        };
    }
}
