//! Transfer strategy — prepares the data socket a transfer command needs
//! before the command itself is sent. Passive mode only: active mode
//! (`PORT`/`EPRT`) is out of scope.

use crate::error::{FtpError, FtpResult};
use regex::Regex;
use std::net::IpAddr;

/// A data-channel address resolved from a `PASV`/`EPSV` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataAddress {
    pub host: IpAddr,
    pub port: u16,
}

/// A way of turning a passive-mode reply into a dialable address.
/// Default is `PASV` (RFC 959); [`ExtendedPassive`] offers `EPSV`
/// (RFC 2428) as an orthogonal, explicitly-selected alternative.
pub trait PassiveReplyParser {
    /// The command to send to request passive mode.
    fn command(&self) -> &'static str;

    /// Parse the resulting reply's message into a dialable address. The
    /// control host is supplied because `EPSV` replies omit the address
    /// entirely (same host, different port).
    fn parse(&self, control_host: IpAddr, message: &str) -> FtpResult<DataAddress>;
}

/// Standard `PASV` (RFC 959 §4.1.2). Tolerant of the `-` placeholder
/// octets some broken servers emit in place of digits, masking each
/// group down to a byte the way real-world clients do.
pub struct Passive;

impl PassiveReplyParser for Passive {
    fn command(&self) -> &'static str {
        "PASV"
    }

    fn parse(&self, _control_host: IpAddr, message: &str) -> FtpResult<DataAddress> {
        let re = Regex::new(r"([-\d]+),([-\d]+),([-\d]+),([-\d]+),([-\d]+),([-\d]+)").unwrap();
        let caps = re
            .captures(message)
            .ok_or_else(|| FtpError::BadPasvReply(message.to_string()))?;

        let nums: Vec<i64> = (1..=6)
            .map(|i| {
                caps[i]
                    .parse::<i64>()
                    .map_err(|_| FtpError::BadPasvReply(message.to_string()))
            })
            .collect::<FtpResult<Vec<_>>>()?;

        let octet = |n: i64| -> u8 { (n & 0xFF) as u8 };
        let host = IpAddr::from([
            octet(nums[0]),
            octet(nums[1]),
            octet(nums[2]),
            octet(nums[3]),
        ]);
        let port = (octet(nums[4]) as u16) * 256 + (octet(nums[5]) as u16);
        Ok(DataAddress { host, port })
    }
}

/// Extended passive mode (RFC 2428), IPv6-ready: `229 ... (|||port|)`.
/// The reply carries only the port; the host is whatever the control
/// connection is already talking to.
pub struct ExtendedPassive;

impl PassiveReplyParser for ExtendedPassive {
    fn command(&self) -> &'static str {
        "EPSV"
    }

    fn parse(&self, control_host: IpAddr, message: &str) -> FtpResult<DataAddress> {
        let re = Regex::new(r"\|\|\|([-\d]+)\|").unwrap();
        let caps = re
            .captures(message)
            .ok_or_else(|| FtpError::BadPasvReply(message.to_string()))?;
        let port = caps[1]
            .parse::<i64>()
            .map_err(|_| FtpError::BadPasvReply(message.to_string()))?;
        Ok(DataAddress {
            host: control_host,
            port: (port & 0xFFFF) as u16,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pasv_parses_standard_reply() {
        let addr = Passive
            .parse(
                "0.0.0.0".parse().unwrap(),
                "227 Entering Passive Mode (192,168,1,5,200,13).",
            )
            .unwrap();
        assert_eq!(addr.host, "192.168.1.5".parse::<IpAddr>().unwrap());
        assert_eq!(addr.port, 200 * 256 + 13);
    }

    #[test]
    fn pasv_tolerates_negative_octets() {
        let addr = Passive
            .parse(
                "0.0.0.0".parse().unwrap(),
                "227 Entering Passive Mode (10,-1,0,5,4,-1).",
            )
            .unwrap();
        // -1 & 0xFF == 255
        assert_eq!(addr.host, IpAddr::from([10, 255, 0, 5]));
        assert_eq!(addr.port, 4 * 256 + 255);
    }

    #[test]
    fn pasv_rejects_unparseable_reply() {
        let err = Passive
            .parse("0.0.0.0".parse().unwrap(), "227 nonsense")
            .unwrap_err();
        assert!(matches!(err, FtpError::BadPasvReply(_)));
    }

    #[test]
    fn epsv_parses_port_only_reply() {
        let addr = ExtendedPassive
            .parse(
                "10.0.0.2".parse().unwrap(),
                "229 Entering Extended Passive Mode (|||6446|)",
            )
            .unwrap();
        assert_eq!(addr.host, "10.0.0.2".parse::<IpAddr>().unwrap());
        assert_eq!(addr.port, 6446);
    }
}
