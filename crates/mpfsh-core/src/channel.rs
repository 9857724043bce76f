//! Byte channel abstraction
//!
//! A `Channel` is a duplex byte stream to the board. Implementations exist
//! for serial ports, telnet sessions and WebREPL websockets; the raw-REPL
//! driver is written against this trait only.

use crate::error::Result;

/// Duplex byte stream to a MicroPython board
///
/// The protocol driver owns exactly one channel and never shares it; the
/// link is half-duplex request/response, so no interior locking is needed.
pub trait Channel {
    /// Read up to `max` bytes.
    ///
    /// Returns whatever is buffered, blocking at most the transport's short
    /// inter-character timeout. May return fewer bytes than requested, or
    /// none at all; it never blocks indefinitely.
    fn read(&mut self, max: usize) -> Result<Vec<u8>>;

    /// Write all of `data`, returning the number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Number of bytes that can be read without blocking
    fn bytes_waiting(&mut self) -> Result<usize>;

    /// Close the channel. Best effort; further reads and writes fail.
    fn close(&mut self);

    /// Whether the transport keeps its session across a device soft reset.
    ///
    /// True for direct serial connections (the line stays open while the
    /// board reboots), false for telnet and websocket sessions (the server
    /// that carries them dies with the reset). This flag selects the
    /// enter-raw-REPL handshake variant.
    fn survives_soft_reset(&self) -> bool;
}

impl Channel for Box<dyn Channel> {
    fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        (**self).read(max)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }

    fn bytes_waiting(&mut self) -> Result<usize> {
        (**self).bytes_waiting()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn survives_soft_reset(&self) -> bool {
        (**self).survives_soft_reset()
    }
}
