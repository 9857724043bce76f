//! Channel resolution for mpfsh
//!
//! The CLI talks to this crate only: a parsed [`ConnectTarget`] goes in, a
//! type-erased [`Channel`] comes out. Credentials must already be present
//! in the target; prompting for missing ones is the caller's job, keeping
//! this layer non-interactive.

use log::debug;

use mpfsh_core::error::{Error, Result};
use mpfsh_core::{Channel, ConnectTarget};
use mpfsh_net::{TelnetChannel, WebsockChannel};
use mpfsh_serial::SerialChannel;

/// Open the channel a target describes.
///
/// `reset` requests a DTR hard reset on open and only applies to serial
/// targets.
pub fn open_channel(target: &ConnectTarget, reset: bool) -> Result<Box<dyn Channel>> {
    debug!("opening channel for {:?}", target);
    match target {
        ConnectTarget::Serial { device, baud } => {
            let chan = SerialChannel::open(device, *baud, reset)?;
            Ok(Box::new(chan))
        }
        ConnectTarget::Telnet {
            host,
            login,
            password,
        } => {
            let login = login
                .as_deref()
                .ok_or_else(|| Error::Connect("telnet login required".to_string()))?;
            let password = password
                .as_deref()
                .ok_or_else(|| Error::Connect("telnet password required".to_string()))?;
            let chan = TelnetChannel::connect(host, login, password)?;
            Ok(Box::new(chan))
        }
        ConnectTarget::Websocket { host, password } => {
            let password = password
                .as_deref()
                .ok_or_else(|| Error::Connect("webrepl password required".to_string()))?;
            let chan = WebsockChannel::connect(host, password)?;
            Ok(Box::new(chan))
        }
    }
}
