//! Error types for mpfsh-core

use thiserror::Error;

/// Errors raised by the raw-REPL driver, the transports and the explorer
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to open the channel or to complete the transport login
    #[error("connection failed: {0}")]
    Connect(String),

    /// A raw-REPL handshake read missed its expected trailer.
    ///
    /// The stage number identifies which leg of the handshake failed:
    /// 1 = raw prompt before reset, 2 = soft reboot banner, 3 = raw banner
    /// after reset, 4 = raw banner (non-resetting transports), 5 = `>`
    /// prompt before command execution, 6 = re-sync after an echoed
    /// raw-paste probe.
    #[error("could not enter raw repl (stage {stage}): got {}", String::from_utf8_lossy(.got))]
    Handshake { stage: u8, got: Vec<u8> },

    /// An operation that needs the raw REPL was issued from friendly mode
    #[error("driver is not in raw repl mode")]
    NotInRawRepl,

    /// The device did not acknowledge a command with `OK`
    #[error("could not exec command (response: {})", String::from_utf8_lossy(.response))]
    ExecRejected { response: Vec<u8> },

    /// `follow` missed an end-of-stream marker
    #[error("timeout waiting for {stream} EOF reception")]
    EofTimeout { stream: &'static str },

    /// Flow-control framing violation during a raw-paste transfer
    #[error("raw paste failed: {0}")]
    RawPaste(String),

    /// Malformed data where the protocol allows only a fixed encoding
    /// (e.g. a corrupted hex payload during a file transfer)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The executed snippet raised on the device; both streams are kept
    #[error("remote exception: {}", String::from_utf8_lossy(.error))]
    RemoteException { output: Vec<u8>, error: Vec<u8> },

    /// Device filesystem error (file absent, directory not empty, ...)
    #[error("{0}")]
    RemoteIo(String),

    /// Transport-level read/write failure on an open channel
    #[error("channel error: {0}")]
    Channel(String),

    /// Local filesystem or subprocess failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Protocol-class errors are transient on a noisy link and may be
    /// retried; remote I/O, usage and connection errors must not be.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Error::Handshake { .. }
                | Error::ExecRejected { .. }
                | Error::EofTimeout { .. }
                | Error::RawPaste(_)
                | Error::Protocol(_)
                | Error::RemoteException { .. }
                | Error::Channel(_)
        )
    }
}

/// Result type for mpfsh operations
pub type Result<T> = std::result::Result<T, Error>;
