//! The FTP Context — a single-serialized dispatcher owning the control
//! socket and, for the duration of a transfer, the data socket. Exactly
//! one [`crate::task::TaskHandler`] is ever in flight; a second
//! `dispatch` call while one is pending fails fast with
//! [`FtpError::Busy`] instead of queuing.

use crate::error::{FtpError, FtpResult};
use crate::parser::ReplyParser;
use crate::socket::{Socket, SocketEvent};
use crate::task::{HandlerAction, Signal, TaskHandler};
use crate::types::{FtpConfig, FtpResponse};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, OwnedMutexGuard};
use tokio_rustls::TlsConnector;

struct Inner {
    control: Option<Socket>,
    data: Option<Socket>,
    parser: ReplyParser,
    pending: VecDeque<FtpResponse>,
    config: FtpConfig,
    connector: Option<TlsConnector>,
}

/// A cloneable handle to one FTP control connection plus its transient
/// data connection. Cloning shares the same dispatcher: two clones racing
/// `dispatch` genuinely contend for the same lock.
#[derive(Clone)]
pub struct FtpContext {
    inner: Arc<Mutex<Inner>>,
    closed: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

enum NextSignal {
    Control(SocketEvent),
    Data(SocketEvent),
}

impl FtpContext {
    pub(crate) fn new(control: Socket, config: FtpConfig, connector: Option<TlsConnector>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                control: Some(control),
                data: None,
                parser: ReplyParser::new(),
                pending: VecDeque::new(),
                config,
                connector,
            })),
            closed: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Acquire sole ownership of the dispatcher for one task's whole
    /// lifetime — which may span several phases of the protocol (e.g.
    /// `upload`'s REST-ack / byte-push / completion-ack sequence) under
    /// a single lock acquisition, rather than one `try_lock` per phase,
    /// so the single-task invariant actually holds across multi-phase
    /// operations and not merely within one `dispatch` call.
    pub(crate) async fn begin(&self) -> FtpResult<TaskGuard> {
        if self.closed() {
            return Err(FtpError::Closed);
        }
        let inner = self
            .inner
            .clone()
            .try_lock_owned()
            .map_err(|_| FtpError::Busy)?;
        Ok(TaskGuard {
            inner,
            closed: self.closed.clone(),
            notify: self.notify.clone(),
        })
    }

    /// Run `handler` to completion, optionally sending `initial_command`
    /// first. Fails immediately with `Busy` if another task is already
    /// pending, and with `Closed` if `close` has already run or runs
    /// while this call is in flight.
    pub async fn dispatch<H>(
        &self,
        initial_command: Option<String>,
        mut handler: H,
    ) -> FtpResult<H::Output>
    where
        H: TaskHandler,
    {
        let mut guard = self.begin().await?;
        if let Some(cmd) = initial_command {
            guard.send(&cmd).await?;
        }
        guard.run(&mut handler).await
    }

    /// Tear down both sockets. Idempotent, and cancels any task currently
    /// blocked on a signal — it wakes, observes `closed()`, and returns
    /// `Closed` instead of its handler's own outcome.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        let mut inner = self.inner.lock().await;
        if let Some(control) = inner.control.as_mut() {
            control.shutdown().await;
        }
        if let Some(mut data) = inner.data.take() {
            data.shutdown().await;
        }
    }

    async fn send_command(inner: &mut Inner, cmd: &str) -> FtpResult<()> {
        log::trace!(">>> {}", redact_for_log(cmd));
        let line = format!("{cmd}\r\n");
        inner
            .control
            .as_mut()
            .expect("control socket present for the lifetime of the context")
            .write_all(line.as_bytes())
            .await
    }

    async fn next_signal(inner: &mut Inner, notify: &Notify) -> FtpResult<Signal> {
        if let Some(resp) = inner.pending.pop_front() {
            return Ok(Signal::Response(resp));
        }
        let read_timeout = inner.config.timeout();
        loop {
            let control = inner
                .control
                .as_mut()
                .expect("control socket present for the lifetime of the context");
            let outcome = tokio::select! {
                biased;
                _ = notify.notified() => return Err(FtpError::Closed),
                ev = control.next_event(read_timeout) => NextSignal::Control(ev),
                ev = data_event(&mut inner.data, read_timeout), if inner.data.is_some() => {
                    NextSignal::Data(ev)
                }
            };

            match outcome {
                NextSignal::Control(SocketEvent::Data(bytes)) => {
                    let mut responses = inner.parser.feed(&bytes)?;
                    if responses.is_empty() {
                        continue;
                    }
                    let first = responses.remove(0);
                    inner.pending.extend(responses);
                    log::trace!("<<< {} {}", first.code, first.message);
                    return Ok(Signal::Response(first));
                }
                NextSignal::Control(SocketEvent::Error(e)) => return Ok(Signal::Error(e)),
                NextSignal::Control(SocketEvent::Timeout) => return Err(FtpError::Timeout),
                NextSignal::Control(SocketEvent::Closed) => return Err(FtpError::Closed),

                NextSignal::Data(SocketEvent::Data(bytes)) => return Ok(Signal::DataChunk(bytes)),
                NextSignal::Data(SocketEvent::Closed) => return Ok(Signal::DataEnd),
                NextSignal::Data(SocketEvent::Error(e)) => return Ok(Signal::Error(e)),
                NextSignal::Data(SocketEvent::Timeout) => return Err(FtpError::Timeout),
            }
        }
    }
}

async fn data_event(data: &mut Option<Socket>, read_timeout: std::time::Duration) -> SocketEvent {
    match data {
        Some(socket) => socket.next_event(read_timeout).await,
        None => std::future::pending().await,
    }
}

/// Redact the password argument of `PASS` before it reaches the log.
fn redact_for_log(cmd: &str) -> String {
    if cmd.starts_with("PASS ") {
        "PASS ****".to_string()
    } else {
        cmd.to_string()
    }
}

/// Exclusive access to the dispatcher for the lifetime of one task,
/// however many protocol phases that task spans. Dropping the guard
/// releases the lock, exactly like a `MutexGuard`.
pub(crate) struct TaskGuard {
    inner: OwnedMutexGuard<Inner>,
    closed: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl TaskGuard {
    pub(crate) async fn send(&mut self, cmd: &str) -> FtpResult<()> {
        FtpContext::send_command(&mut self.inner, cmd).await
    }

    pub(crate) async fn next_signal(&mut self) -> FtpResult<Signal> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FtpError::Closed);
        }
        FtpContext::next_signal(&mut self.inner, &self.notify).await
    }

    /// Drive `handler` to completion against signals seen through this
    /// guard, without acquiring a fresh lock — the caller may have
    /// already sent a command, or may go on to send another once this
    /// returns, all under the one `begin()` acquisition.
    pub(crate) async fn run<H>(&mut self, handler: &mut H) -> FtpResult<H::Output>
    where
        H: TaskHandler,
    {
        loop {
            let signal = self.next_signal().await?;
            match handler.handle(signal).await {
                HandlerAction::Pending => continue,
                HandlerAction::SendRaw(cmd) => self.send(&cmd).await?,
                HandlerAction::Resolve(value) => return Ok(value),
                HandlerAction::Reject(err) => return Err(err),
            }
        }
    }

    pub(crate) async fn write_data(&mut self, bytes: &[u8]) -> FtpResult<()> {
        match self.inner.data.as_mut() {
            Some(socket) => socket.write_all(bytes).await,
            None => Err(FtpError::DataDialFailed("no data socket is open".into())),
        }
    }

    pub(crate) async fn shutdown_data(&mut self) {
        if let Some(mut socket) = self.inner.data.take() {
            socket.shutdown().await;
        }
    }

    pub(crate) async fn set_data_socket(&mut self, socket: Socket) {
        self.inner.data = Some(socket);
    }

    pub(crate) async fn upgrade_control(&mut self, host: &str) -> FtpResult<()> {
        let connector = self
            .inner
            .connector
            .clone()
            .ok_or_else(|| FtpError::TlsHandshakeFailed("no TLS connector configured".into()))?;
        let plain = self
            .inner
            .control
            .take()
            .expect("control socket present for the lifetime of the context");
        let upgraded = plain.upgrade_to_tls(&connector, host).await?;
        self.inner.control = Some(upgraded);
        Ok(())
    }

    pub(crate) fn host(&self) -> String {
        self.inner.config.host.clone()
    }

    pub(crate) fn has_tls(&self) -> bool {
        self.inner.connector.is_some()
    }

    /// Whether the control socket is *currently* TLS-wrapped, as opposed
    /// to `has_tls`'s "TLS options are configured" — distinct once
    /// explicit FTPS is in play, since a connector can be configured
    /// well before `useTLS` actually upgrades the control socket.
    pub(crate) fn control_is_tls(&self) -> bool {
        self.inner
            .control
            .as_ref()
            .map(Socket::is_tls)
            .unwrap_or(false)
    }

    /// The shared connector, if TLS is configured for this context — for
    /// wrapping a freshly-dialed data socket once the control channel is
    /// already protected.
    pub(crate) fn connector(&self) -> Option<TlsConnector> {
        self.inner.connector.clone()
    }

    pub(crate) fn data_timeout(&self) -> std::time::Duration {
        self.inner.config.timeout()
    }
}
