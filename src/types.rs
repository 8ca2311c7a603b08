//! Shared data types: configuration and the parsed reply.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection-wide configuration for an [`crate::context::FtpContext`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpConfig {
    pub host: String,
    pub port: u16,
    /// How long `dispatch` waits for a single signal before failing with
    /// [`crate::error::FtpError::Timeout`].
    #[serde(default = "default_timeout_millis")]
    pub timeout_millis: u64,
    /// Emit `trace!`-level wire logging (with `PASS` redacted).
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub tls: Option<TlsOptions>,
}

fn default_timeout_millis() -> u64 {
    30_000
}

impl FtpConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout_millis: default_timeout_millis(),
            verbose: false,
            tls: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_millis)
    }
}

/// TLS knobs, per `spec.md` §6's "Configuration knobs".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsOptions {
    /// Implicit FTPS: TLS from the first byte, instead of explicit `AUTH TLS`.
    #[serde(default)]
    pub implicit: bool,
    /// Skip server-certificate verification entirely.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

/// A single parsed FTP reply — possibly assembled from several wire lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpResponse {
    pub code: u16,
    /// The reply body, lines joined with `\n` for multi-line replies.
    pub message: String,
}

impl FtpResponse {
    pub fn is_success(&self) -> bool {
        self.code < 400
    }

    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    pub fn is_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }
}
