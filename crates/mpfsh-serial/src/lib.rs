//! Serial port channel for mpfsh
//!
//! Direct serial connections keep their line open while the board reboots,
//! so this is the only transport that reports `survives_soft_reset`.

use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

use log::{debug, info, trace};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use mpfsh_core::error::{Error, Result};
use mpfsh_core::Channel;

/// Inter-character timeout for buffered reads
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial port byte channel
pub struct SerialChannel {
    port: Option<Box<dyn SerialPort>>,
    device: String,
}

impl SerialChannel {
    /// Open a serial port at the given baud rate.
    ///
    /// With `reset`, the board is hard-reset by pulsing DTR before use and
    /// the boot noise is drained, the way flashing tools reboot an ESP32.
    pub fn open(device: &str, baud: u32, reset: bool) -> Result<Self> {
        let mut port = open_port(device, baud)?;
        info!("opened serial port {} at {} baud", device, baud);

        if reset {
            info!("hard resetting device at port {}", device);
            port.write_data_terminal_ready(true)
                .map_err(|e| Error::Connect(e.to_string()))?;
            thread::sleep(Duration::from_millis(250));
            port.write_data_terminal_ready(false)
                .map_err(|e| Error::Connect(e.to_string()))?;

            drop(port);
            port = open_port(device, baud)?;

            // Drain boot output until the device goes quiet
            let mut scratch = [0u8; 256];
            loop {
                thread::sleep(Duration::from_secs(2));
                match port.bytes_to_read() {
                    Ok(0) => break,
                    Ok(_) => {
                        let _ = port.read(&mut scratch);
                    }
                    Err(e) => return Err(Error::Connect(e.to_string())),
                }
            }
        }

        Ok(SerialChannel {
            port: Some(port),
            device: device.to_string(),
        })
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| Error::Channel(format!("serial port {} is closed", self.device)))
    }
}

fn open_port(device: &str, baud: u32) -> Result<Box<dyn SerialPort>> {
    serialport::new(device, baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(READ_TIMEOUT)
        .open()
        .map_err(|e| Error::Connect(format!("{}: {}", device, e)))
}

impl Channel for SerialChannel {
    fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        let port = self.port_mut()?;
        let mut buf = vec![0u8; max.max(1)];
        match port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                trace!("serial read < {:?}", buf);
                Ok(buf)
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                Ok(Vec::new())
            }
            Err(e) => Err(Error::Channel(e.to_string())),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        trace!("serial write > {:?}", data);
        let port = self.port_mut()?;
        port.write_all(data)
            .map_err(|e| Error::Channel(e.to_string()))?;
        Ok(data.len())
    }

    fn bytes_waiting(&mut self) -> Result<usize> {
        let port = self.port_mut()?;
        port.bytes_to_read()
            .map(|n| n as usize)
            .map_err(|e| Error::Channel(e.to_string()))
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("closed serial port {}", self.device);
        }
    }

    fn survives_soft_reset(&self) -> bool {
        true
    }
}
