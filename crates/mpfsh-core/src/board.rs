//! Raw-REPL protocol driver
//!
//! [`Board`] owns a [`Channel`] and speaks the MicroPython raw-REPL framing
//! over it: it puts the interpreter into raw mode, sends code, and
//! reconstructs the stdout/stderr streams the device frames between 0x04
//! markers. The remote interpreter gives no completion signal other than
//! those exact trailers, so every operation is "write bytes, read until an
//! expected suffix, within a bounded time".

use std::path::Path;
use std::thread;
use std::time::Duration;

use log::{debug, trace};

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::protocol::*;

/// REPL mode the device is believed to be in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplState {
    /// Interactive line-by-line prompt
    Friendly,
    /// Framed raw REPL; required for all file operations
    Raw,
}

/// Callback receiving device output as it arrives
pub type DataConsumer<'a> = &'a mut dyn FnMut(&[u8]);

/// Raw-REPL driver over a byte channel
pub struct Board<C> {
    con: C,
    state: ReplState,
    use_raw_paste: bool,
    timeout: Duration,
}

impl<C: Channel> Board<C> {
    pub fn new(con: C) -> Self {
        Board {
            con,
            state: ReplState::Friendly,
            use_raw_paste: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Force the raw-paste negotiation on or off.
    ///
    /// Raw paste is probed at most once per session; a refused or failed
    /// probe clears this flag for the lifetime of the driver.
    pub fn set_raw_paste(&mut self, enabled: bool) {
        self.use_raw_paste = enabled;
    }

    pub fn uses_raw_paste(&self) -> bool {
        self.use_raw_paste
    }

    /// Override the default timeout applied to handshake and follow reads
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn state(&self) -> ReplState {
        self.state
    }

    /// Access to the underlying channel, for terminal passthrough
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.con
    }

    pub fn close(&mut self) {
        self.con.close();
    }

    /// Read until the accumulated data ends with `ending` or the timeout
    /// elapses.
    ///
    /// The timeout counter is polled every 10 ms and reset whenever a byte
    /// arrives; `None` waits forever. The optional consumer streams each
    /// received chunk to a live sink. Callers must check the returned
    /// buffer's suffix themselves: a timeout returns the partial data.
    pub fn read_until(
        &mut self,
        min_bytes: usize,
        ending: &[u8],
        timeout: Option<Duration>,
        mut consumer: Option<DataConsumer<'_>>,
    ) -> Result<Vec<u8>> {
        let idle_limit = timeout.map(|t| (t.as_millis() / POLL_INTERVAL.as_millis()).max(1));

        let mut data = self.con.read(min_bytes)?;
        if !data.is_empty() {
            if let Some(c) = consumer.as_mut() {
                c(&data);
            }
        }

        let mut idle: u128 = 0;
        loop {
            if data.len() >= ending.len() && data.ends_with(ending) {
                break;
            }
            if self.con.bytes_waiting()? > 0 {
                let chunk = self.con.read(1)?;
                if !chunk.is_empty() {
                    if let Some(c) = consumer.as_mut() {
                        c(&chunk);
                    }
                    data.extend_from_slice(&chunk);
                    idle = 0;
                    continue;
                }
            }
            idle += 1;
            if let Some(limit) = idle_limit {
                if idle >= limit {
                    break;
                }
            }
            thread::sleep(POLL_INTERVAL);
        }

        trace!("read_until({:?}) -> {:?}", ending, data);
        Ok(data)
    }

    /// Accumulate exactly `n` bytes, or fewer if the timeout elapses first
    fn read_exact(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>> {
        let idle_limit = (timeout.as_millis() / POLL_INTERVAL.as_millis()).max(1);
        let mut data = Vec::with_capacity(n);
        let mut idle: u128 = 0;
        while data.len() < n {
            let chunk = self.con.read(n - data.len())?;
            if chunk.is_empty() {
                idle += 1;
                if idle >= idle_limit {
                    break;
                }
                thread::sleep(POLL_INTERVAL);
            } else {
                data.extend_from_slice(&chunk);
                idle = 0;
            }
        }
        Ok(data)
    }

    /// Discard everything the device has already sent
    fn drain_input(&mut self) -> Result<()> {
        let mut n = self.con.bytes_waiting()?;
        while n > 0 {
            self.con.read(n)?;
            n = self.con.bytes_waiting()?;
        }
        Ok(())
    }

    /// Put the device into raw REPL mode.
    ///
    /// Transports that keep their session across a soft reset (serial) also
    /// reboot the board and must re-observe the reboot banner before the raw
    /// prompt reappears; session-dropping transports (telnet, websocket)
    /// enter raw mode without a reset. Every read leg fails with its own
    /// handshake stage number so a broken link can be diagnosed.
    pub fn enter_raw_repl(&mut self) -> Result<()> {
        // Allow some time for the board to settle after open/reset
        thread::sleep(BOOT_SETTLE);

        debug!("entering raw repl (interrupting running program)");
        self.con.write(INTERRUPT_SEQ)?;
        self.drain_input()?;

        if self.con.survives_soft_reset() {
            self.con.write(ENTER_RAW_SEQ)?;
            let data = self.read_until(1, RAW_PROMPT, Some(self.timeout), None)?;
            if !data.ends_with(RAW_PROMPT) {
                return Err(Error::Handshake { stage: 1, got: data });
            }

            debug!("soft resetting board");
            self.con.write(&[EOF])?;
            let data = self.read_until(1, SOFT_REBOOT, Some(self.timeout), None)?;
            if !data.ends_with(SOFT_REBOOT) {
                return Err(Error::Handshake { stage: 2, got: data });
            }

            // Separate read so anything boot.py prints lands between the
            // reboot banner and the raw prompt instead of breaking the match
            let data = self.read_until(1, RAW_BANNER, Some(self.timeout), None)?;
            if !data.ends_with(RAW_BANNER) {
                return Err(Error::Handshake { stage: 3, got: data });
            }
        } else {
            self.con.write(ENTER_RAW_SEQ)?;
            let data = self.read_until(1, RAW_BANNER, Some(self.timeout), None)?;
            if !data.ends_with(RAW_BANNER) {
                return Err(Error::Handshake { stage: 4, got: data });
            }
        }

        self.state = ReplState::Raw;
        Ok(())
    }

    /// Leave raw REPL mode. Best effort: no acknowledgement is read.
    pub fn exit_raw_repl(&mut self) -> Result<()> {
        debug!("exiting raw repl");
        self.con.write(EXIT_RAW_SEQ)?;
        self.state = ReplState::Friendly;
        Ok(())
    }

    /// Collect the framed result of a previously sent command.
    ///
    /// Returns `(stdout, stderr)`, each stripped of its trailing 0x04.
    pub fn follow(
        &mut self,
        timeout: Option<Duration>,
        consumer: Option<DataConsumer<'_>>,
    ) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut data = self.read_until(1, &[EOF], timeout, consumer)?;
        if !data.ends_with(&[EOF]) {
            return Err(Error::EofTimeout { stream: "first" });
        }
        data.pop();

        let mut data_err = self.read_until(1, &[EOF], timeout, None)?;
        if !data_err.ends_with(&[EOF]) {
            return Err(Error::EofTimeout { stream: "second" });
        }
        data_err.pop();

        Ok((data, data_err))
    }

    /// Send a command without collecting its result.
    ///
    /// Waits for the raw prompt, negotiates raw-paste mode on the first call
    /// (at most once per session), and otherwise writes the command followed
    /// by 0x04, expecting the `OK` acknowledgement.
    pub fn exec_raw_no_follow(&mut self, command: &[u8]) -> Result<()> {
        if self.state != ReplState::Raw {
            return Err(Error::NotInRawRepl);
        }

        // Confirm the device is at its raw prompt
        let data = self.read_until(1, b">", Some(self.timeout), None)?;
        if !data.ends_with(b">") {
            return Err(Error::Handshake { stage: 5, got: data });
        }

        if self.use_raw_paste {
            self.con.write(RAW_PASTE_PROBE)?;
            let resp = self.read_exact(2, ACK_TIMEOUT)?;
            if resp == RAW_PASTE_ACCEPTED {
                // Negotiated: the whole payload goes through the
                // flow-controlled writer, and the flag stays set.
                return self.raw_paste_write(command);
            } else if resp == RAW_PASTE_REFUSED {
                debug!("device refused raw-paste mode");
            } else {
                // Old firmware echoed the probe into the prompt; re-sync on
                // the echoed banner before using the classic path.
                let data = self.read_until(1, PROBE_ECHO_TRAILER, Some(self.timeout), None)?;
                if !data.ends_with(PROBE_ECHO_TRAILER) {
                    return Err(Error::Handshake { stage: 6, got: data });
                }
            }
            // Don't probe again for this session
            self.use_raw_paste = false;
        }

        self.con.write(command)?;
        self.con.write(&[EOF])?;

        let resp = self.read_exact(2, ACK_TIMEOUT)?;
        if resp != OK {
            return Err(Error::ExecRejected { response: resp });
        }
        Ok(())
    }

    /// Flow-controlled raw-paste transfer of `command`.
    ///
    /// The device advertises a window size; 0x01 grants another window,
    /// 0x04 is an abrupt device-side end (acknowledged and treated as
    /// completion), anything else is a framing violation.
    fn raw_paste_write(&mut self, command: &[u8]) -> Result<()> {
        let header = self.read_exact(2, self.timeout)?;
        if header.len() < 2 {
            return Err(Error::RawPaste("missing window-size header".to_string()));
        }
        let window_size = u16::from_le_bytes([header[0], header[1]]) as usize;
        if window_size == 0 {
            return Err(Error::RawPaste("device advertised a zero window".to_string()));
        }
        let mut window_remain = window_size;
        trace!("raw paste: window size {}", window_size);

        let mut i = 0;
        while i < command.len() {
            while window_remain == 0 || self.con.bytes_waiting()? > 0 {
                let b = self.read_exact(1, self.timeout)?;
                match b.first() {
                    Some(&WINDOW_GRANT) => window_remain += window_size,
                    Some(&EOF) => {
                        // Device ended the transfer early; acknowledge it
                        self.con.write(&[EOF])?;
                        return Ok(());
                    }
                    Some(&other) => {
                        return Err(Error::RawPaste(format!(
                            "unexpected byte 0x{:02X} during transfer",
                            other
                        )));
                    }
                    None => {
                        return Err(Error::RawPaste(
                            "timeout waiting for flow-control window".to_string(),
                        ));
                    }
                }
            }
            let n = window_remain.min(command.len() - i);
            self.con.write(&command[i..i + n])?;
            window_remain -= n;
            i += n;
        }

        // End of data; wait for the device to acknowledge it
        self.con.write(&[EOF])?;
        let data = self.read_until(1, &[EOF], Some(self.timeout), None)?;
        if !data.ends_with(&[EOF]) {
            return Err(Error::RawPaste(format!(
                "transfer not acknowledged: {:?}",
                String::from_utf8_lossy(&data)
            )));
        }
        Ok(())
    }

    /// Execute `command` and collect `(stdout, stderr)`
    pub fn exec_raw(
        &mut self,
        command: &[u8],
        timeout: Option<Duration>,
        consumer: Option<DataConsumer<'_>>,
    ) -> Result<(Vec<u8>, Vec<u8>)> {
        self.exec_raw_no_follow(command)?;
        self.follow(timeout, consumer)
    }

    /// Execute raw bytes; a remote exception is raised as an error with
    /// both output buffers embedded
    pub fn exec_bytes(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        let (output, error) = self.exec_raw(command, Some(self.timeout), None)?;
        if !error.is_empty() {
            return Err(Error::RemoteException { output, error });
        }
        Ok(output)
    }

    /// Execute a source snippet and return its stdout
    pub fn exec(&mut self, command: &str) -> Result<Vec<u8>> {
        self.exec_bytes(command.as_bytes())
    }

    /// Execute a snippet while streaming its output live; no timeout is
    /// applied, so long-running programs can be followed indefinitely
    pub fn exec_streaming(
        &mut self,
        command: &str,
        consumer: DataConsumer<'_>,
    ) -> Result<(Vec<u8>, Vec<u8>)> {
        self.exec_raw(command.as_bytes(), None, Some(consumer))
    }

    /// Evaluate an expression on the device and return its printed value
    pub fn eval(&mut self, expression: &str) -> Result<Vec<u8>> {
        let ret = self.exec(&format!("print({})", expression))?;
        Ok(trim_ascii(&ret))
    }

    /// Execute the contents of a local file on the device
    pub fn exec_file(&mut self, path: &Path) -> Result<Vec<u8>> {
        let source = std::fs::read(path)?;
        self.exec_bytes(&source)
    }
}

fn trim_ascii(data: &[u8]) -> Vec<u8> {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    let end = data
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map(|p| p + 1)
        .unwrap_or(start);
    data[start..end].to_vec()
}
