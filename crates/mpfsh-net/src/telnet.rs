//! Telnet channel
//!
//! Speaks just enough telnet for the MicroPython (WiPy) telnet REPL: IAC
//! negotiation requests are refused, subnegotiations are skipped, and the
//! login/password dance is driven before the channel is handed over.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, trace};

use mpfsh_core::error::{Error, Result};
use mpfsh_core::Channel;

const TELNET_PORT: u16 = 23;
const LOGIN_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_TIMEOUT: Duration = Duration::from_millis(25);

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IacState {
    Data,
    Iac,
    Negotiate(u8),
    Sub,
    SubIac,
}

/// Strips telnet command sequences from the inbound stream and produces
/// the refusals the server expects for its negotiation requests.
struct IacFilter {
    state: IacState,
}

impl IacFilter {
    fn new() -> Self {
        IacFilter {
            state: IacState::Data,
        }
    }

    fn feed(&mut self, input: &[u8], data: &mut VecDeque<u8>, replies: &mut Vec<u8>) {
        for &b in input {
            self.state = match self.state {
                IacState::Data => {
                    if b == IAC {
                        IacState::Iac
                    } else {
                        data.push_back(b);
                        IacState::Data
                    }
                }
                IacState::Iac => match b {
                    IAC => {
                        // Escaped literal 0xFF
                        data.push_back(IAC);
                        IacState::Data
                    }
                    WILL | WONT | DO | DONT => IacState::Negotiate(b),
                    SB => IacState::Sub,
                    _ => IacState::Data,
                },
                IacState::Negotiate(cmd) => {
                    // Refuse every option the server proposes
                    match cmd {
                        WILL => replies.extend_from_slice(&[IAC, DONT, b]),
                        DO => replies.extend_from_slice(&[IAC, WONT, b]),
                        _ => {}
                    }
                    IacState::Data
                }
                IacState::Sub => {
                    if b == IAC {
                        IacState::SubIac
                    } else {
                        IacState::Sub
                    }
                }
                IacState::SubIac => {
                    if b == SE {
                        IacState::Data
                    } else {
                        IacState::Sub
                    }
                }
            };
        }
    }
}

/// Telnet byte channel
pub struct TelnetChannel {
    stream: Option<TcpStream>,
    fifo: VecDeque<u8>,
    filter: IacFilter,
    host: String,
}

impl TelnetChannel {
    /// Connect and log in to a telnet REPL server
    pub fn connect(host: &str, login: &str, password: &str) -> Result<Self> {
        let addr = if host.contains(':') {
            host.to_string()
        } else {
            format!("{}:{}", host, TELNET_PORT)
        };
        let stream = TcpStream::connect(&addr).map_err(|e| Error::Connect(e.to_string()))?;
        stream
            .set_nodelay(true)
            .map_err(|e| Error::Connect(e.to_string()))?;
        stream
            .set_read_timeout(Some(POLL_TIMEOUT))
            .map_err(|e| Error::Connect(e.to_string()))?;

        let mut chan = TelnetChannel {
            stream: Some(stream),
            fifo: VecDeque::new(),
            filter: IacFilter::new(),
            host: host.to_string(),
        };

        if !chan.wait_for(b"Login as:", LOGIN_TIMEOUT)? {
            return Err(Error::Connect(format!("{}: no login prompt", host)));
        }
        chan.write(login.as_bytes())?;
        chan.write(b"\r\n")?;

        if !chan.wait_for(b"Password:", LOGIN_TIMEOUT)? {
            return Err(Error::Connect(format!("{}: no password prompt", host)));
        }
        // The WiPy telnet server needs a moment between prompt and reply
        thread::sleep(Duration::from_millis(200));
        chan.write(password.as_bytes())?;
        chan.write(b"\r\n")?;

        if !chan.wait_for(b"for more information.", LOGIN_TIMEOUT)? {
            return Err(Error::Connect(format!("{}: login rejected", host)));
        }

        info!("telnet connected to {}", addr);
        Ok(chan)
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| Error::Channel(format!("telnet session to {} is closed", self.host)))
    }

    /// Pull whatever the socket has into the FIFO, answering negotiations
    fn fill(&mut self) -> Result<()> {
        let mut buf = [0u8; 512];
        let mut replies = Vec::new();
        loop {
            let stream = self.stream_mut()?;
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    trace!("telnet read < {:?}", &buf[..n]);
                    self.filter.feed(&buf[..n], &mut self.fifo, &mut replies);
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break;
                }
                Err(e) => return Err(Error::Channel(e.to_string())),
            }
        }
        if !replies.is_empty() {
            let stream = self.stream_mut()?;
            stream
                .write_all(&replies)
                .map_err(|e| Error::Channel(e.to_string()))?;
        }
        Ok(())
    }

    /// Wait until `needle` shows up in the inbound stream; consumes the
    /// stream up to and including the match
    fn wait_for(&mut self, needle: &[u8], timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            self.fill()?;
            let buf = self.fifo.make_contiguous();
            if let Some(pos) = find(buf, needle) {
                self.fifo.drain(..pos + needle.len());
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

impl Channel for TelnetChannel {
    fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        if self.fifo.is_empty() {
            self.fill()?;
        }
        let n = max.min(self.fifo.len());
        Ok(self.fifo.drain(..n).collect())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        trace!("telnet write > {:?}", data);
        // Literal 0xFF bytes must be doubled on the wire
        let mut escaped = Vec::with_capacity(data.len());
        for &b in data {
            escaped.push(b);
            if b == IAC {
                escaped.push(IAC);
            }
        }
        let stream = self.stream_mut()?;
        stream
            .write_all(&escaped)
            .map_err(|e| Error::Channel(e.to_string()))?;
        Ok(data.len())
    }

    fn bytes_waiting(&mut self) -> Result<usize> {
        if self.fifo.is_empty() {
            self.fill()?;
        }
        Ok(self.fifo.len())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            debug!("closed telnet session to {}", self.host);
        }
    }

    fn survives_soft_reset(&self) -> bool {
        false
    }
}
