//! Connection target grammar
//!
//! Targets are given as `ser:<dev>[,<baud>]`, `tn:<host>[,<login>[,<passwd>]]`
//! or `ws:<host>[,<passwd>]`. A bare device name without a scheme is treated
//! as a serial port.

/// Parsed connection target
///
/// One variant per transport kind; resolved once at connect time into a
/// concrete [`Channel`](crate::Channel) implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    /// Direct serial connection
    Serial {
        /// Device path, e.g. `/dev/ttyUSB0` or `COM3`
        device: String,
        /// Baud rate
        baud: u32,
    },
    /// Telnet session (e.g. a WiPy)
    Telnet {
        host: String,
        /// Login name; prompted for when absent
        login: Option<String>,
        /// Password; prompted for when absent
        password: Option<String>,
    },
    /// WebREPL websocket session
    Websocket {
        host: String,
        /// Password; prompted for when absent
        password: Option<String>,
    },
}

/// Default baud rate for serial targets
pub const DEFAULT_BAUD: u32 = 115_200;

impl ConnectTarget {
    /// Parse a connection string.
    ///
    /// A string without one of the known scheme prefixes is taken as a
    /// serial device name; relative names are rooted under `/dev/` on
    /// non-Windows hosts.
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();

        if let Some(rest) = s.strip_prefix("ser:") {
            let mut params = rest.split(',').map(str::trim);
            let device = params
                .next()
                .filter(|d| !d.is_empty())
                .ok_or_else(|| format!("missing serial device in target: {}", s))?;
            let baud = match params.next() {
                Some(b) => b
                    .parse()
                    .map_err(|_| format!("invalid baud rate: {}", b))?,
                None => DEFAULT_BAUD,
            };
            Ok(ConnectTarget::Serial {
                device: device.to_string(),
                baud,
            })
        } else if let Some(rest) = s.strip_prefix("tn:") {
            let mut params = rest.split(',').map(str::trim);
            let host = params
                .next()
                .filter(|h| !h.is_empty())
                .ok_or_else(|| format!("missing telnet host in target: {}", s))?;
            Ok(ConnectTarget::Telnet {
                host: host.to_string(),
                login: params.next().map(str::to_string),
                password: params.next().map(str::to_string),
            })
        } else if let Some(rest) = s.strip_prefix("ws:") {
            let mut params = rest.split(',').map(str::trim);
            let host = params
                .next()
                .filter(|h| !h.is_empty())
                .ok_or_else(|| format!("missing websocket host in target: {}", s))?;
            Ok(ConnectTarget::Websocket {
                host: host.to_string(),
                password: params.next().map(str::to_string),
            })
        } else if s.is_empty() {
            Err("empty connection target".to_string())
        } else {
            // Bare name: serial device shorthand, e.g. "ttyUSB0"
            let device = if cfg!(windows) || s.starts_with('/') {
                s.to_string()
            } else {
                format!("/dev/{}", s)
            };
            Ok(ConnectTarget::Serial {
                device,
                baud: DEFAULT_BAUD,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serial_with_baud() {
        assert_eq!(
            ConnectTarget::parse("ser:/dev/ttyUSB1,9600").unwrap(),
            ConnectTarget::Serial {
                device: "/dev/ttyUSB1".to_string(),
                baud: 9600,
            }
        );
    }

    #[test]
    fn parses_serial_default_baud() {
        assert_eq!(
            ConnectTarget::parse("ser:COM3").unwrap(),
            ConnectTarget::Serial {
                device: "COM3".to_string(),
                baud: DEFAULT_BAUD,
            }
        );
    }

    #[test]
    fn parses_telnet_with_credentials() {
        assert_eq!(
            ConnectTarget::parse("tn:192.168.1.101, micro, python").unwrap(),
            ConnectTarget::Telnet {
                host: "192.168.1.101".to_string(),
                login: Some("micro".to_string()),
                password: Some("python".to_string()),
            }
        );
    }

    #[test]
    fn parses_telnet_without_credentials() {
        assert_eq!(
            ConnectTarget::parse("tn:pyboard.local").unwrap(),
            ConnectTarget::Telnet {
                host: "pyboard.local".to_string(),
                login: None,
                password: None,
            }
        );
    }

    #[test]
    fn parses_websocket() {
        assert_eq!(
            ConnectTarget::parse("ws:192.168.4.1,secret").unwrap(),
            ConnectTarget::Websocket {
                host: "192.168.4.1".to_string(),
                password: Some("secret".to_string()),
            }
        );
    }

    #[test]
    fn bare_name_is_serial_shorthand() {
        let target = ConnectTarget::parse("ttyUSB0").unwrap();
        match target {
            ConnectTarget::Serial { device, baud } => {
                assert!(device.ends_with("ttyUSB0"));
                assert_eq!(baud, DEFAULT_BAUD);
            }
            other => panic!("expected serial target, got {:?}", other),
        }
    }

    #[test]
    fn rejects_bad_baud_and_empty() {
        assert!(ConnectTarget::parse("ser:/dev/ttyUSB0,fast").is_err());
        assert!(ConnectTarget::parse("ser:").is_err());
        assert!(ConnectTarget::parse("").is_err());
    }
}
