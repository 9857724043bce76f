//! mpfsh-core - MicroPython raw-REPL driver and file explorer
//!
//! This crate implements the raw-REPL protocol for talking to MicroPython
//! boards over a byte channel, plus a file explorer layered on top of it.
//!
//! # Protocol Overview
//!
//! The raw REPL is a framed mode of the MicroPython prompt: the host sends
//! a whole program terminated by 0x04 and the device replies with `OK`,
//! then stdout and stderr each terminated by 0x04. Newer firmware also
//! negotiates "raw-paste" mode, a flow-controlled variant used for bulk
//! transfers. The driver handles both, falling back transparently.
//!
//! # Supported Transports
//!
//! Anything implementing [`Channel`]: serial ports, telnet sessions and
//! WebREPL websockets live in their own crates (`mpfsh-serial`,
//! `mpfsh-net`).
//!
//! # Example
//!
//! ```ignore
//! use mpfsh_core::{Board, Explorer, FileExplorer};
//!
//! let channel = mpfsh_serial::SerialChannel::open("/dev/ttyUSB0", 115_200, false)?;
//! let mut fe = FileExplorer::new(Board::new(channel));
//! fe.setup()?;
//!
//! for entry in fe.ls(true, true)? {
//!     println!("{}", entry.name);
//! }
//! fe.put("main.py".as_ref(), "main.py")?;
//! ```

pub mod board;
pub mod cache;
pub mod channel;
pub mod error;
pub mod explorer;
pub mod literal;
pub mod protocol;
pub mod retry;
pub mod target;

#[cfg(test)]
pub(crate) mod testutil;

// Re-exports
pub use board::{Board, DataConsumer, ReplState};
pub use cache::CachingExplorer;
pub use channel::Channel;
pub use error::{Error, Result};
pub use explorer::{mpy_cross, DirEntry, EntryKind, Explorer, FileExplorer};
pub use retry::RetryPolicy;
pub use target::ConnectTarget;
