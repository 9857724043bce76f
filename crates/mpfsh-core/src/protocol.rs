//! Raw-REPL wire protocol constants
//!
//! These bytes and trailer strings are the compatibility contract with the
//! MicroPython firmware and must match it exactly. Note that 0x04 is
//! overloaded: it triggers a soft reset, terminates stdout and stderr, and
//! ends a raw-paste transfer; only the protocol state disambiguates it.

use std::time::Duration;

/// Ctrl-A: enter raw REPL
pub const ENTER_RAW: u8 = 0x01;
/// Ctrl-B: exit raw REPL back to the friendly REPL
pub const EXIT_RAW: u8 = 0x02;
/// Ctrl-C: interrupt a running program
pub const INTERRUPT: u8 = 0x03;
/// Ctrl-D: soft reset / EOF marker / raw-paste end
pub const EOF: u8 = 0x04;

/// Sent as `\r` plus two interrupts to stop whatever is running
pub const INTERRUPT_SEQ: &[u8] = &[b'\r', INTERRUPT, INTERRUPT];
/// Enter raw REPL, preceded by a carriage return
pub const ENTER_RAW_SEQ: &[u8] = &[b'\r', ENTER_RAW];
/// Exit raw REPL, preceded by a carriage return (no acknowledgement read)
pub const EXIT_RAW_SEQ: &[u8] = &[b'\r', EXIT_RAW];

/// Prompt printed when the raw REPL is entered and ready
pub const RAW_PROMPT: &[u8] = b"raw REPL; CTRL-B to exit\r\n>";
/// Raw REPL banner without the prompt; read separately after a soft reset
/// so boot output may precede it
pub const RAW_BANNER: &[u8] = b"raw REPL; CTRL-B to exit\r\n";
/// Banner printed while the device soft-reboots
pub const SOFT_REBOOT: &[u8] = b"soft reboot\r\n";
/// Trailer re-read when a non-raw-paste-aware firmware echoes the probe
pub const PROBE_ECHO_TRAILER: &[u8] = b"w REPL; CTRL-B to exit\r\n>";
/// Command acknowledgement in classic raw REPL mode
pub const OK: &[u8] = b"OK";

/// Raw-paste negotiation probe
pub const RAW_PASTE_PROBE: &[u8] = b"\x05A\x01";
/// Device reply: raw paste understood but refused
pub const RAW_PASTE_REFUSED: &[u8] = b"R\x00";
/// Device reply: raw paste accepted, window header follows
pub const RAW_PASTE_ACCEPTED: &[u8] = b"R\x01";
/// Mid-transfer byte granting another flow-control window
pub const WINDOW_GRANT: u8 = 0x01;

/// Default timeout for handshake and follow reads
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Short timeout for the raw-paste probe and the `OK` acknowledgement
pub const ACK_TIMEOUT: Duration = Duration::from_millis(500);
/// Settling time before the interrupt sequence is sent
pub const BOOT_SETTLE: Duration = Duration::from_millis(500);
/// Idle poll interval inside read_until
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);
