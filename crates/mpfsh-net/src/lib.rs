//! Network channels for mpfsh
//!
//! Telnet (WiPy-style login) and WebREPL websocket transports. Both buffer
//! incoming bytes in a FIFO so the driver's `bytes_waiting`/`read` polling
//! contract works over stream- and message-oriented sockets alike. Neither
//! survives a device soft reset: the server carrying the session dies with
//! the reboot.

pub mod telnet;
pub mod websock;

pub use telnet::TelnetChannel;
pub use websock::WebsockChannel;
