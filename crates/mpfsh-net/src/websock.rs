//! WebREPL websocket channel
//!
//! Connects to the MicroPython WebREPL daemon (port 8266), answers its
//! password prompt and buffers incoming frames in a FIFO.

use std::collections::VecDeque;
use std::net::TcpStream;
use std::time::{Duration, Instant};

use log::{debug, info, trace};
use tungstenite::{Message, WebSocket};

use mpfsh_core::error::{Error, Result};
use mpfsh_core::Channel;

const WEBREPL_PORT: u16 = 8266;
const LOGIN_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_TIMEOUT: Duration = Duration::from_millis(25);

/// WebREPL websocket byte channel
pub struct WebsockChannel {
    ws: Option<WebSocket<TcpStream>>,
    fifo: VecDeque<u8>,
    host: String,
}

impl WebsockChannel {
    /// Connect to a WebREPL server and authenticate
    pub fn connect(host: &str, password: &str) -> Result<Self> {
        let addr = if host.contains(':') {
            host.to_string()
        } else {
            format!("{}:{}", host, WEBREPL_PORT)
        };

        let stream = TcpStream::connect(&addr).map_err(|e| Error::Connect(e.to_string()))?;
        stream
            .set_read_timeout(Some(LOGIN_TIMEOUT))
            .map_err(|e| Error::Connect(e.to_string()))?;

        let url = format!("ws://{}/", addr);
        let (ws, _response) = tungstenite::client::client(url.as_str(), stream)
            .map_err(|e| Error::Connect(format!("websocket handshake failed: {}", e)))?;

        ws.get_ref()
            .set_read_timeout(Some(POLL_TIMEOUT))
            .map_err(|e| Error::Connect(e.to_string()))?;

        let mut chan = WebsockChannel {
            ws: Some(ws),
            fifo: VecDeque::new(),
            host: host.to_string(),
        };

        if !chan.wait_for(b"Password:", LOGIN_TIMEOUT)? {
            return Err(Error::Connect(format!("{}: no WebREPL password prompt", host)));
        }
        chan.write(password.as_bytes())?;
        chan.write(b"\r")?;
        if !chan.wait_for(b"WebREPL connected", LOGIN_TIMEOUT)? {
            return Err(Error::Connect(format!("{}: WebREPL password rejected", host)));
        }

        info!("websocket connected to {}", url);
        Ok(chan)
    }

    fn ws_mut(&mut self) -> Result<&mut WebSocket<TcpStream>> {
        self.ws
            .as_mut()
            .ok_or_else(|| Error::Channel(format!("websocket to {} is closed", self.host)))
    }

    /// Drain pending frames into the FIFO
    fn fill(&mut self) -> Result<()> {
        loop {
            let ws = self.ws_mut()?;
            match ws.read() {
                Ok(Message::Text(text)) => {
                    trace!("websocket read < {:?}", text);
                    self.fifo.extend(text.as_bytes());
                }
                Ok(Message::Binary(data)) => {
                    trace!("websocket read < {:?}", data);
                    self.fifo.extend(&data);
                }
                Ok(Message::Close(_)) => {
                    self.ws = None;
                    break;
                }
                // Ping/pong are handled inside tungstenite
                Ok(_) => {}
                Err(tungstenite::Error::Io(e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break;
                }
                Err(tungstenite::Error::ConnectionClosed)
                | Err(tungstenite::Error::AlreadyClosed) => {
                    self.ws = None;
                    break;
                }
                Err(e) => return Err(Error::Channel(e.to_string())),
            }
        }
        Ok(())
    }

    fn wait_for(&mut self, needle: &[u8], timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            self.fill()?;
            let buf = self.fifo.make_contiguous();
            if let Some(pos) = buf.windows(needle.len()).position(|w| w == needle) {
                self.fifo.drain(..pos + needle.len());
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
        }
    }
}

impl Channel for WebsockChannel {
    fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        if self.fifo.is_empty() {
            self.fill()?;
        }
        let n = max.min(self.fifo.len());
        Ok(self.fifo.drain(..n).collect())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        trace!("websocket write > {:?}", data);
        let ws = self.ws_mut()?;
        ws.send(Message::Binary(data.to_vec()))
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
        if let Some(mut ws) = self.ws.take() {
            let _ = ws.close(None);
            let _ = ws.flush();
            debug!("closed websocket to {}", self.host);
        }
    }

    fn survives_soft_reset(&self) -> bool {
        false
    }
}
