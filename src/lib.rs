//! # ftpctx — FTP/FTPS client core
//!
//! A single-serialized dispatcher over an FTP control connection (plus,
//! for the duration of a transfer, its transient data connection): the
//! response parser, the socket adapter, passive-mode transfer
//! preparation, and the handful of command operations built on top of
//! them (RFC 959 / RFC 4217 / RFC 2428).
//!
//! What this crate deliberately does not do: active-mode FTP, concurrent
//! multi-command pipelining, automatic reconnect, UNIX/Windows/MLSD
//! listing parsing (callers supply their own `parse` closure to
//! [`client::FtpClient::list`]), and transfer progress tracking.
//!
//! - `error` — the error taxonomy
//! - `types` — configuration and the parsed reply
//! - `parser` — the incremental reply parser
//! - `socket` — plain/TLS socket adapter
//! - `tls` — `rustls`-based TLS configuration
//! - `task` — the `Signal` / `TaskHandler` / `HandlerAction` protocol
//! - `transfer` — passive-mode data-channel preparation
//! - `context` — the dispatcher itself
//! - `commands` — the concrete task handlers
//! - `client` — the command operations callers actually use

pub mod client;
pub mod commands;
pub mod context;
pub mod error;
pub mod parser;
pub mod socket;
pub mod task;
pub mod tls;
pub mod transfer;
pub mod types;

pub use client::FtpClient;
pub use context::FtpContext;
pub use error::{FtpError, FtpResult};
pub use types::{FtpConfig, FtpResponse, TlsOptions};

#[cfg(test)]
mod integration_tests {
    use crate::{FtpClient, FtpConfig};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// A minimal FTP-shaped server driven entirely by the test: enough of
    /// the control-channel protocol to exercise the dispatcher end to
    /// end, without pulling in a mock framework the pack doesn't use
    /// anywhere in its FTP-adjacent crates.
    async fn greet(stream: &mut TcpStream, banner: &str) {
        stream.write_all(banner.as_bytes()).await.unwrap();
    }

    async fn read_command(stream: &mut TcpStream) -> String {
        let mut buf = vec![0u8; 4096];
        let n = stream.read(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf[..n]).trim_end().to_string()
    }

    #[tokio::test]
    async fn connect_reads_single_line_greeting() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            greet(&mut stream, "220 Welcome\r\n").await;
            stream
        });

        let config = FtpConfig::new(addr.ip().to_string(), addr.port());
        let client = FtpClient::connect(config).await.unwrap();
        assert!(!client.closed());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn connect_reads_multi_line_greeting() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            greet(
                &mut stream,
                "220-Welcome to the test server\r\n220-Have a nice day\r\n220 Ready\r\n",
            )
            .await;
            stream
        });

        let config = FtpConfig::new(addr.ip().to_string(), addr.port());
        let client = FtpClient::connect(config).await.unwrap();
        assert!(!client.closed());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn login_sequence_sends_user_then_pass() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            greet(&mut stream, "220 Welcome\r\n").await;

            let user_cmd = read_command(&mut stream).await;
            assert_eq!(user_cmd, "USER alice");
            stream
                .write_all(b"331 Password required\r\n")
                .await
                .unwrap();

            let pass_cmd = read_command(&mut stream).await;
            assert_eq!(pass_cmd, "PASS hunter2");
            stream.write_all(b"230 Logged in\r\n").await.unwrap();
        });

        let config = FtpConfig::new(addr.ip().to_string(), addr.port());
        let client = FtpClient::connect(config).await.unwrap();
        client.login("alice", "hunter2").await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn a_second_dispatch_while_one_is_pending_returns_busy() {
        use crate::task::{HandlerAction, Signal, TaskHandler};
        use async_trait::async_trait;

        struct NeverResolves;
        #[async_trait]
        impl TaskHandler for NeverResolves {
            type Output = ();
            async fn handle(&mut self, _signal: Signal) -> HandlerAction<()> {
                HandlerAction::Pending
            }
        }

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            greet(&mut stream, "220 Welcome\r\n").await;
            // Deliberately never reply again; the first dispatch blocks.
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        });

        let mut config = FtpConfig::new(addr.ip().to_string(), addr.port());
        config.timeout_millis = 2_000;
        let client = FtpClient::connect(config).await.unwrap();

        let ctx = client.clone();
        let first = tokio::spawn(async move { ctx.send("NOOP", false).await });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let second = client.send("NOOP", false).await;
        assert!(matches!(second, Err(crate::FtpError::Busy)));

        drop(first);
        server.abort();
        let _ = NeverResolves; // keep the type in scope for documentation purposes
    }

    #[tokio::test]
    async fn close_rejects_a_pending_dispatch_with_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            greet(&mut stream, "220 Welcome\r\n").await;
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        });

        let mut config = FtpConfig::new(addr.ip().to_string(), addr.port());
        config.timeout_millis = 10_000;
        let client = FtpClient::connect(config).await.unwrap();

        let waiting_client = client.clone();
        let waiting = tokio::spawn(async move { waiting_client.send("NOOP", false).await });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        client.close().await;

        let result = waiting.await.unwrap();
        assert!(matches!(result, Err(crate::FtpError::Closed)));
        server.abort();
    }

    #[tokio::test]
    async fn dispatch_after_close_fails_immediately() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            greet(&mut stream, "220 Welcome\r\n").await;
        });

        let config = FtpConfig::new(addr.ip().to_string(), addr.port());
        let client = FtpClient::connect(config).await.unwrap();
        server.await.unwrap();

        client.close().await;
        let result = client.send("NOOP", false).await;
        assert!(matches!(result, Err(crate::FtpError::Closed)));
    }

    #[tokio::test]
    async fn timeout_then_closed_sequencing() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            greet(&mut stream, "220 Welcome\r\n").await;
            let _ = read_command(&mut stream).await;
            // Neither reply nor close for a while, then close.
            tokio::time::sleep(std::time::Duration::from_millis(120)).await;
            drop(stream);
        });

        let mut config = FtpConfig::new(addr.ip().to_string(), addr.port());
        config.timeout_millis = 50;
        let client = FtpClient::connect(config).await.unwrap();

        let first = client.send("NOOP", false).await;
        assert!(matches!(first, Err(crate::FtpError::Timeout)));

        server.await.unwrap();
        let second = client.send("NOOP", false).await;
        assert!(matches!(second, Err(crate::FtpError::Closed) | Err(crate::FtpError::Transport(_))));
    }

    #[tokio::test]
    async fn send_rejects_a_failure_reply_by_default() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            greet(&mut stream, "220 Welcome\r\n").await;
            let _ = read_command(&mut stream).await;
            stream
                .write_all(b"500 Unknown command\r\n")
                .await
                .unwrap();
        });

        let config = FtpConfig::new(addr.ip().to_string(), addr.port());
        let client = FtpClient::connect(config).await.unwrap();

        let result = client.send("BADCMD", false).await;
        assert!(matches!(
            result,
            Err(crate::FtpError::ProtocolError { code: 500, .. })
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn send_with_ignore_errors_resolves_a_failure_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            greet(&mut stream, "220 Welcome\r\n").await;
            let _ = read_command(&mut stream).await;
            stream
                .write_all(b"500 Unknown command\r\n")
                .await
                .unwrap();
        });

        let config = FtpConfig::new(addr.ip().to_string(), addr.port());
        let client = FtpClient::connect(config).await.unwrap();

        let result = client.send("BADCMD", true).await.unwrap();
        assert_eq!(result.code, 500);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn use_default_settings_sends_type_then_stru() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            greet(&mut stream, "220 Welcome\r\n").await;

            let type_cmd = read_command(&mut stream).await;
            assert_eq!(type_cmd, "TYPE I");
            stream.write_all(b"200 Type set to I\r\n").await.unwrap();

            let stru_cmd = read_command(&mut stream).await;
            assert_eq!(stru_cmd, "STRU F");
            stream
                .write_all(b"200 Structure set to F\r\n")
                .await
                .unwrap();
        });

        let config = FtpConfig::new(addr.ip().to_string(), addr.port());
        let client = FtpClient::connect(config).await.unwrap();
        client.use_default_settings().await.unwrap();
        server.await.unwrap();
    }
}
