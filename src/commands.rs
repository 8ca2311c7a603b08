//! Concrete [`crate::task::TaskHandler`] implementations backing the
//! command operations on [`crate::client::FtpClient`].

use crate::error::FtpError;
use crate::task::{HandlerAction, Signal, TaskHandler};
use crate::types::FtpResponse;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

/// Resolves on the very first reply, whatever its class. Used where the
/// "interesting" event is the server accepting a data connection (e.g.
/// the `150`/`125` ack to `STOR`) rather than the transfer's eventual
/// completion reply — the caller still has to push bytes before that
/// completion reply can arrive, so waiting for it here would deadlock.
pub struct PreliminaryAckHandler;

#[async_trait]
impl TaskHandler for PreliminaryAckHandler {
    type Output = FtpResponse;

    async fn handle(&mut self, signal: Signal) -> HandlerAction<FtpResponse> {
        match signal {
            Signal::Response(resp) if resp.is_success() || resp.is_preliminary() => {
                HandlerAction::Resolve(resp)
            }
            Signal::Response(resp) => {
                HandlerAction::Reject(FtpError::protocol_error(resp.code, resp.message))
            }
            Signal::DataChunk(_) | Signal::DataEnd => HandlerAction::Pending,
            Signal::Error(e) => HandlerAction::Reject(e),
        }
    }
}

/// `USER` has already been sent by the caller; this drives the rest of
/// the login sequence: a `3xx` reply means the server wants a password,
/// issued here via `SendRaw` (never logged verbatim — see
/// `context::redact_for_log`); a `2xx` reply means the server logged the
/// account in without one.
pub struct LoginHandler {
    password: Option<String>,
}

impl LoginHandler {
    pub fn new(password: String) -> Self {
        Self {
            password: Some(password),
        }
    }
}

#[async_trait]
impl TaskHandler for LoginHandler {
    type Output = FtpResponse;

    async fn handle(&mut self, signal: Signal) -> HandlerAction<FtpResponse> {
        match signal {
            Signal::Response(resp) if resp.is_preliminary() => HandlerAction::Pending,
            Signal::Response(resp) if resp.is_intermediate() => match self.password.take() {
                Some(password) => HandlerAction::SendRaw(format!("PASS {password}")),
                None => HandlerAction::Reject(FtpError::protocol_error(resp.code, resp.message)),
            },
            Signal::Response(resp) if resp.is_success() => HandlerAction::Resolve(resp),
            Signal::Response(resp) => {
                HandlerAction::Reject(FtpError::protocol_error(resp.code, resp.message))
            }
            Signal::DataChunk(_) | Signal::DataEnd => HandlerAction::Pending,
            Signal::Error(e) => HandlerAction::Reject(e),
        }
    }
}

/// Drives a `LIST`/`MLSD`-style transfer: accumulates data-channel bytes
/// and hands the assembled text to the caller-supplied `parse` closure as
/// soon as the data channel closes.
///
/// Finalizes on [`Signal::DataEnd`], not the trailing `226` — see the
/// "226 vs DataEnd ordering" design note this crate follows literally.
/// Any `226` that arrives is therefore left unread on the control socket
/// for the next `dispatch` call to pick up as its first signal.
pub struct ListHandler<F, T> {
    parse: F,
    buf: Vec<u8>,
    _output: std::marker::PhantomData<fn() -> T>,
}

impl<F, T> ListHandler<F, T>
where
    F: Fn(&str) -> T + Send,
{
    pub fn new(parse: F) -> Self {
        Self {
            parse,
            buf: Vec::new(),
            _output: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<F, T> TaskHandler for ListHandler<F, T>
where
    F: Fn(&str) -> T + Send,
    T: Send,
{
    type Output = T;

    async fn handle(&mut self, signal: Signal) -> HandlerAction<T> {
        match signal {
            Signal::Response(resp) if resp.is_preliminary() || resp.code == 226 => {
                HandlerAction::Pending
            }
            Signal::Response(resp) if !resp.is_success() => {
                HandlerAction::Reject(FtpError::protocol_error(resp.code, resp.message))
            }
            Signal::Response(_) => HandlerAction::Pending,
            Signal::DataChunk(bytes) => {
                self.buf.extend_from_slice(&bytes);
                HandlerAction::Pending
            }
            Signal::DataEnd => {
                let text = String::from_utf8_lossy(&self.buf).into_owned();
                HandlerAction::Resolve((self.parse)(&text))
            }
            Signal::Error(e) => HandlerAction::Reject(e),
        }
    }
}

/// Drives a `RETR` (optionally preceded by `REST`): streams data-channel
/// bytes into the caller's sink as they arrive and finalizes on `226`,
/// not `DataEnd` — the opposite convention from [`ListHandler`], per the
/// same design note.
pub struct DownloadHandler<W> {
    sink: W,
    follow_up: Option<String>,
    bytes: u64,
}

impl<W> DownloadHandler<W>
where
    W: tokio::io::AsyncWrite + Unpin + Send,
{
    /// `follow_up` is the `RETR` command to issue once a preceding `REST`
    /// is acknowledged with a `3xx` reply; `None` when there is no resume
    /// offset and the caller already sent `RETR` directly.
    pub fn new(sink: W, follow_up: Option<String>) -> Self {
        Self {
            sink,
            follow_up,
            bytes: 0,
        }
    }
}

#[async_trait]
impl<W> TaskHandler for DownloadHandler<W>
where
    W: tokio::io::AsyncWrite + Unpin + Send,
{
    type Output = u64;

    async fn handle(&mut self, signal: Signal) -> HandlerAction<u64> {
        match signal {
            Signal::Response(resp) if resp.is_preliminary() => HandlerAction::Pending,
            Signal::Response(resp) if resp.is_intermediate() => match self.follow_up.take() {
                Some(cmd) => HandlerAction::SendRaw(cmd),
                None => HandlerAction::Reject(FtpError::protocol_error(resp.code, resp.message)),
            },
            Signal::Response(resp) if resp.code == 226 => HandlerAction::Resolve(self.bytes),
            Signal::Response(resp) if resp.is_success() => HandlerAction::Pending,
            Signal::Response(resp) => {
                HandlerAction::Reject(FtpError::protocol_error(resp.code, resp.message))
            }
            Signal::DataChunk(bytes) => {
                if let Err(e) = self.sink.write_all(&bytes).await {
                    return HandlerAction::Reject(e.into());
                }
                self.bytes += bytes.len() as u64;
                HandlerAction::Pending
            }
            Signal::DataEnd => HandlerAction::Pending,
            Signal::Error(e) => HandlerAction::Reject(e),
        }
    }
}
