//! Task protocol — the contract between [`crate::context::FtpContext`]'s
//! dispatch loop and the handler driving one in-flight FTP task.
//!
//! A `Task` is never a heap-allocated record the context keeps around; it
//! is a continuation — the capability, held for the duration of one
//! `dispatch` call, to route the next [`Signal`] and decide what happens
//! next. This mirrors the way a oneshot-channel sender is a "permission to
//! complete a future" rather than a tracked object.

use crate::error::FtpError;
use crate::types::FtpResponse;
use async_trait::async_trait;

/// The classified event a handler reacts to. Distinct from
/// [`crate::socket::SocketEvent`]: raw socket bytes have already been run
/// through the reply parser (control) or left as opaque chunks (data) by
/// the time a handler sees them.
#[derive(Debug)]
pub enum Signal {
    Response(FtpResponse),
    DataChunk(Vec<u8>),
    DataEnd,
    Error(FtpError),
}

/// What a handler wants the dispatch loop to do after seeing one signal.
pub enum HandlerAction<T> {
    /// Keep waiting for the next signal; the task is still open.
    Pending,
    /// Write a follow-up command to the control socket without resolving
    /// or rejecting — e.g. issuing `RETR` after a `350` reply to `REST`.
    SendRaw(String),
    /// The task is done; this is its result.
    Resolve(T),
    /// The task failed.
    Reject(FtpError),
}

/// A pure function of `(signal, task-local state) -> HandlerAction`,
/// expressed as a trait so each command operation can carry whatever
/// state it needs (a byte sink, an accumulating buffer, a PASV address)
/// between calls. Async because some handlers push bytes into a caller
/// supplied async sink as data chunks arrive.
#[async_trait]
pub trait TaskHandler: Send {
    type Output;

    async fn handle(&mut self, signal: Signal) -> HandlerAction<Self::Output>;
}

/// Shared classification policy for commands that expect exactly one
/// control-channel reply and nothing else: 1xx keeps waiting, 2xx/3xx
/// resolves with the raw response so the caller can decide (some
/// commands treat 3xx as expected, e.g. `REST`), and 4xx/5xx rejects
/// with `ProtocolError` rather than handing the failure back as a
/// value — used by `send`, `login`, and `useDefaultSettings`.
pub struct StandardReplyHandler;

#[async_trait]
impl TaskHandler for StandardReplyHandler {
    type Output = FtpResponse;

    async fn handle(&mut self, signal: Signal) -> HandlerAction<FtpResponse> {
        match signal {
            Signal::Response(resp) if resp.is_preliminary() => HandlerAction::Pending,
            Signal::Response(resp) if resp.is_success() || resp.is_intermediate() => {
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

/// Same classification as [`StandardReplyHandler`], but a 4xx/5xx reply
/// resolves instead of rejecting — the caller has opted into treating a
/// command's failure as a value rather than an error. Backs
/// `send(cmd, ignoreErrors=true)` and the `PBSZ`/`PROT` steps
/// `useDefaultSettings` issues under TLS, both of which `spec.md`
/// explicitly marks as tolerant of a rejected reply.
pub struct IgnoreErrorsReplyHandler;

#[async_trait]
impl TaskHandler for IgnoreErrorsReplyHandler {
    type Output = FtpResponse;

    async fn handle(&mut self, signal: Signal) -> HandlerAction<FtpResponse> {
        match signal {
            Signal::Response(resp) if resp.is_preliminary() => HandlerAction::Pending,
            Signal::Response(resp) => HandlerAction::Resolve(resp),
            Signal::DataChunk(_) | Signal::DataEnd => HandlerAction::Pending,
            Signal::Error(e) => HandlerAction::Reject(e),
        }
    }
}
