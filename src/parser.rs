//! Incremental FTP reply parser (RFC 959 §4.2).
//!
//! Unlike a `BufReader::read_line`-driven codec, [`ReplyParser`] is fed
//! arbitrarily-chunked bytes as they arrive off the control socket and
//! yields zero or more complete [`FtpResponse`]s per chunk — it tolerates
//! a line split across two reads and several replies concatenated into
//! one read equally.

use crate::error::{FtpError, FtpResult};
use crate::types::FtpResponse;
use std::collections::VecDeque;

struct InProgress {
    code: u16,
    lines: Vec<String>,
}

/// Stateful accumulator; one instance lives for the lifetime of a control
/// connection.
pub struct ReplyParser {
    buf: Vec<u8>,
    in_progress: Option<InProgress>,
}

impl ReplyParser {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            in_progress: None,
        }
    }

    /// Feed newly-read bytes; returns every reply that became complete as
    /// a result, in wire order. Replies still awaiting their terminator
    /// line are held internally until the next `feed`.
    pub fn feed(&mut self, bytes: &[u8]) -> FtpResult<Vec<FtpResponse>> {
        self.buf.extend_from_slice(bytes);
        let mut out = VecDeque::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw_line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw_line);
            let line = line.trim_end_matches(['\r', '\n']);

            match &mut self.in_progress {
                None => {
                    let code = parse_code(line)?;
                    let separator = line.as_bytes().get(3).copied();
                    if !matches!(separator, Some(b'-') | Some(b' ')) {
                        return Err(FtpError::BadReply(line.to_string()));
                    }
                    let is_multi = separator == Some(b'-');
                    if is_multi {
                        self.in_progress = Some(InProgress {
                            code,
                            lines: vec![line.to_string()],
                        });
                    } else {
                        out.push_back(FtpResponse {
                            code,
                            message: line.to_string(),
                        });
                    }
                }
                Some(state) => {
                    state.lines.push(line.to_string());
                    let terminator_code = state.code;
                    let is_terminator = line.len() >= 4
                        && line.as_bytes()[3] == b' '
                        && parse_code(line).map(|c| c == terminator_code).unwrap_or(false);
                    if is_terminator {
                        let finished = self.in_progress.take().expect("checked Some above");
                        out.push_back(FtpResponse {
                            code: finished.code,
                            message: finished.lines.join("\n"),
                        });
                    }
                }
            }
        }

        Ok(out.into_iter().collect())
    }
}

impl Default for ReplyParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the leading three-digit reply code from a line.
fn parse_code(line: &str) -> FtpResult<u16> {
    if line.len() < 3 {
        return Err(FtpError::BadReply(line.to_string()));
    }
    line[..3]
        .parse::<u16>()
        .map_err(|_| FtpError::BadReply(line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_reply() {
        let mut p = ReplyParser::new();
        let out = p.feed(b"220 Welcome\r\n").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].code, 220);
        assert_eq!(out[0].message, "220 Welcome");
    }

    #[test]
    fn multi_line_reply() {
        let mut p = ReplyParser::new();
        let out = p
            .feed(b"230-Welcome to the server\r\n230-Enjoy your stay\r\n230 Logged in\r\n")
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].code, 230);
        assert_eq!(
            out[0].message,
            "230-Welcome to the server\n230-Enjoy your stay\n230 Logged in"
        );
    }

    #[test]
    fn reply_split_across_two_feeds() {
        let mut p = ReplyParser::new();
        let first = p.feed(b"150 Open").unwrap();
        assert!(first.is_empty());
        let second = p.feed(b"ing data connection\r\n").unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].message, "150 Opening data connection");
    }

    #[test]
    fn two_replies_concatenated_in_one_chunk() {
        let mut p = ReplyParser::new();
        let out = p.feed(b"200 Type set to I\r\n226 Transfer complete\r\n").unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].code, 200);
        assert_eq!(out[1].code, 226);
    }

    #[test]
    fn multi_line_reply_split_mid_block() {
        let mut p = ReplyParser::new();
        assert!(p.feed(b"211-Features:\r\n EPSV\r\n").unwrap().is_empty());
        let out = p.feed(b" UTF8\r\n211 End\r\n").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].code, 211);
    }

    #[test]
    fn malformed_leading_line_is_bad_reply() {
        let mut p = ReplyParser::new();
        let err = p.feed(b"not-a-code\r\n").unwrap_err();
        assert!(matches!(err, FtpError::BadReply(_)));
    }

    #[test]
    fn leading_line_missing_code_separator_is_bad_reply() {
        let mut p = ReplyParser::new();
        let err = p.feed(b"220Xmsg\r\n").unwrap_err();
        assert!(matches!(err, FtpError::BadReply(_)));
    }
}
