//! The command operations (`spec.md` §4.F): the small set of FTP
//! interactions built on top of [`FtpContext::dispatch`].
//!
//! Most operations are a single `send` + reply pair, expressed with
//! [`FtpContext::dispatch`]. Three are not: `useTLS` performs an in-place
//! handshake on the control socket, `upload` pushes bytes onto the data
//! socket rather than reacting to them, and every transfer first needs a
//! `PASV` round trip before its own command can be sent. None of these
//! fit the reactive `Signal -> HandlerAction` shape a `TaskHandler`
//! offers on its own, so each is expressed as one `FtpContext::begin`
//! acquisition driven phase by phase — holding the dispatcher for the
//! operation's entire lifetime rather than one lock per phase, so no
//! other task's command can interleave mid-sequence.

use crate::commands::{DownloadHandler, ListHandler, LoginHandler, PreliminaryAckHandler};
use crate::context::FtpContext;
use crate::error::{FtpError, FtpResult};
use crate::socket::Socket;
use crate::task::{IgnoreErrorsReplyHandler, StandardReplyHandler};
use crate::tls;
use crate::transfer::{Passive, PassiveReplyParser};
use crate::types::{FtpConfig, FtpResponse};
use std::net::IpAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

/// A connected FTP/FTPS session. Cheap to clone (it shares the underlying
/// [`FtpContext`]); every method call may race any other for the
/// dispatcher, per `spec.md` §5.
#[derive(Clone)]
pub struct FtpClient {
    ctx: FtpContext,
    config: FtpConfig,
}

impl FtpClient {
    /// Dial the control connection, perform Implicit-FTPS wrapping if
    /// configured, and read the server's greeting.
    pub async fn connect(config: FtpConfig) -> FtpResult<Self> {
        let dial_timeout = config.timeout();
        let mut socket = Socket::connect(&config.host, config.port, dial_timeout).await?;

        let mut connector = None;
        if let Some(tls_opts) = &config.tls {
            let built = tls::build_connector(tls_opts.accept_invalid_certs)?;
            if tls_opts.implicit {
                socket = socket.upgrade_to_tls(&built, &config.host).await?;
            }
            connector = Some(built);
        }

        let ctx = FtpContext::new(socket, config.clone(), connector);
        let greeting = ctx.dispatch(None, StandardReplyHandler).await?;
        if !greeting.is_success() {
            return Err(FtpError::protocol_error(greeting.code, greeting.message));
        }

        Ok(Self { ctx, config })
    }

    pub fn closed(&self) -> bool {
        self.ctx.closed()
    }

    pub async fn close(&self) {
        self.ctx.close().await;
    }

    /// Send an arbitrary command and return its reply; the building
    /// block every other single-phase operation is written in terms of.
    /// `2xx`/`3xx` resolves; a `4xx`/`5xx` reply rejects with
    /// `ProtocolError` unless `ignore_errors` is set, in which case it
    /// resolves carrying the failing response instead.
    pub async fn send(&self, command: &str, ignore_errors: bool) -> FtpResult<FtpResponse> {
        if ignore_errors {
            self.ctx
                .dispatch(Some(command.to_string()), IgnoreErrorsReplyHandler)
                .await
        } else {
            self.ctx
                .dispatch(Some(command.to_string()), StandardReplyHandler)
                .await
        }
    }

    /// `AUTH TLS` (RFC 4217 Explicit FTPS), followed by `PBSZ 0` /
    /// `PROT P` so the data channel is protected too. One lock
    /// acquisition for the whole sequence: nothing else may write to the
    /// control socket between the plaintext `AUTH TLS` exchange and the
    /// handshake it authorizes.
    pub async fn use_tls(&self) -> FtpResult<()> {
        let mut guard = self.ctx.begin().await?;
        if !guard.has_tls() {
            return Err(FtpError::TlsHandshakeFailed(
                "no TLS options configured for this connection".into(),
            ));
        }

        guard.send("AUTH TLS").await?;
        let resp = guard.run(&mut StandardReplyHandler).await?;
        if !resp.is_success() {
            return Err(FtpError::protocol_error(resp.code, resp.message));
        }

        let host = guard.host();
        guard.upgrade_control(&host).await?;

        guard.send("PBSZ 0").await?;
        guard.run(&mut StandardReplyHandler).await?;

        guard.send("PROT P").await?;
        guard.run(&mut StandardReplyHandler).await?;
        Ok(())
    }

    /// `USER` / `PASS`. The password never reaches the log verbatim
    /// regardless of whether it is sent here or via a handler's
    /// `SendRaw` — both paths go through the same redaction point.
    pub async fn login(&self, username: &str, password: &str) -> FtpResult<()> {
        let resp = self
            .ctx
            .dispatch(
                Some(format!("USER {username}")),
                LoginHandler::new(password.to_string()),
            )
            .await?;
        FtpError::from_reply(resp.code, &resp.message)
    }

    /// `TYPE I` (binary transfer mode) and `STRU F` (file structure),
    /// followed by `PBSZ 0` / `PROT P` — ignoring their error codes,
    /// per `spec.md` §4.F — when the control socket is already
    /// TLS-wrapped. One lock acquisition for the whole sequence.
    pub async fn use_default_settings(&self) -> FtpResult<()> {
        let mut guard = self.ctx.begin().await?;

        guard.send("TYPE I").await?;
        guard.run(&mut StandardReplyHandler).await?;

        guard.send("STRU F").await?;
        guard.run(&mut StandardReplyHandler).await?;

        if guard.control_is_tls() {
            guard.send("PBSZ 0").await?;
            guard.run(&mut IgnoreErrorsReplyHandler).await?;

            guard.send("PROT P").await?;
            guard.run(&mut IgnoreErrorsReplyHandler).await?;
        }

        Ok(())
    }

    pub async fn noop(&self) -> FtpResult<()> {
        self.send("NOOP", false).await?;
        Ok(())
    }

    /// `QUIT`. Tolerant of the server closing the socket before its own
    /// reply arrives — plenty of servers do.
    pub async fn quit(&self) -> FtpResult<()> {
        match self.send("QUIT", false).await {
            Ok(_) | Err(FtpError::Closed) => {}
            Err(e) => return Err(e),
        }
        self.ctx.close().await;
        Ok(())
    }

    /// `LIST` (or `LIST path`), parsed by the caller-supplied `parse`
    /// closure — this crate has no opinion on listing syntax.
    pub async fn list<F, T>(&self, path: Option<&str>, parse: F) -> FtpResult<T>
    where
        F: Fn(&str) -> T + Send + 'static,
        T: Send + 'static,
    {
        let mut guard = self.ctx.begin().await?;
        self.prepare_data_channel(&mut guard).await?;

        let cmd = match path {
            Some(p) => format!("LIST {p}"),
            None => "LIST".to_string(),
        };
        guard.send(&cmd).await?;
        guard.run(&mut ListHandler::new(parse)).await
    }

    /// `RETR`, optionally preceded by `REST` for a resumed download.
    /// Returns the number of bytes written to `sink`.
    pub async fn download<W>(
        &self,
        remote_path: &str,
        sink: W,
        resume_at: Option<u64>,
    ) -> FtpResult<u64>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut guard = self.ctx.begin().await?;
        self.prepare_data_channel(&mut guard).await?;

        let (first_cmd, follow_up) = match resume_at {
            Some(offset) => (
                format!("REST {offset}"),
                Some(format!("RETR {remote_path}")),
            ),
            None => (format!("RETR {remote_path}"), None),
        };
        guard.send(&first_cmd).await?;
        guard.run(&mut DownloadHandler::new(sink, follow_up)).await
    }

    /// `STOR`, optionally preceded by `REST` for a resumed upload. Pushes
    /// bytes directly onto the data socket rather than routing them
    /// through a handler — see the module doc comment. Returns the
    /// number of bytes sent.
    pub async fn upload<R>(
        &self,
        remote_path: &str,
        mut source: R,
        resume_at: Option<u64>,
    ) -> FtpResult<u64>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut guard = self.ctx.begin().await?;
        self.prepare_data_channel(&mut guard).await?;

        if let Some(offset) = resume_at {
            guard.send(&format!("REST {offset}")).await?;
            let resp = guard.run(&mut StandardReplyHandler).await?;
            if !resp.is_intermediate() {
                return Err(FtpError::protocol_error(resp.code, resp.message));
            }
        }

        guard.send(&format!("STOR {remote_path}")).await?;
        let ack = guard.run(&mut PreliminaryAckHandler).await?;
        if !ack.is_success() && !ack.is_preliminary() {
            return Err(FtpError::protocol_error(ack.code, ack.message));
        }

        let mut buf = vec![0u8; 65_536];
        let mut total = 0u64;
        loop {
            let n = source.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            guard.write_data(&buf[..n]).await?;
            total += n as u64;
        }
        guard.shutdown_data().await;

        guard.run(&mut StandardReplyHandler).await?;
        Ok(total)
    }

    /// Issue `PASV`, parse the reply, dial the resulting address, and —
    /// if the control socket is already TLS-wrapped — wrap the new data
    /// socket with the same connector, so it resumes the control
    /// connection's TLS session rather than negotiating cold. All under
    /// the caller's already-held guard, so the command that follows is
    /// guaranteed to use the socket this call just opened.
    async fn prepare_data_channel(&self, guard: &mut crate::context::TaskGuard) -> FtpResult<()> {
        let strategy = Passive;
        guard.send(strategy.command()).await?;
        let resp = guard.run(&mut StandardReplyHandler).await?;
        if !resp.is_success() {
            return Err(FtpError::protocol_error(resp.code, resp.message));
        }

        let control_host = resolve_host(&self.config.host).await?;
        let addr = strategy.parse(control_host, &resp.message)?;
        let mut socket =
            Socket::connect(&addr.host.to_string(), addr.port, guard.data_timeout()).await?;

        if guard.control_is_tls() {
            let connector = guard.connector().ok_or_else(|| {
                FtpError::TlsHandshakeFailed("no TLS connector configured".into())
            })?;
            socket = socket.upgrade_to_tls(&connector, &guard.host()).await?;
        }

        guard.set_data_socket(socket).await;
        Ok(())
    }
}

async fn resolve_host(host: &str) -> FtpResult<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    let mut addrs = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|e| FtpError::DataDialFailed(format!("DNS lookup for {host}: {e}")))?;
    addrs
        .next()
        .map(|a| a.ip())
        .ok_or_else(|| FtpError::DataDialFailed(format!("no addresses found for {host}")))
}
