//! Raw-terminal REPL passthrough
//!
//! Bridges the local terminal and the board's friendly REPL: keystrokes go
//! out as raw bytes, device output is written straight to stdout. Ctrl+]
//! returns to the shell. The caller is responsible for leaving raw-REPL
//! mode before and re-entering it after.

use std::io::{self, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use mpfsh_core::Channel;

/// Exit character: Ctrl+] (GS)
const EXIT_CHAR: u8 = 0x1d;

/// Run the passthrough terminal until the exit character is pressed or the
/// channel dies
pub fn run(chan: &mut dyn Channel) -> io::Result<()> {
    terminal::enable_raw_mode()?;
    let result = bridge(chan);
    terminal::disable_raw_mode()?;
    result
}

fn bridge(chan: &mut dyn Channel) -> io::Result<()> {
    let mut stdout = io::stdout();

    // Wake the friendly REPL so the user gets a prompt right away
    let _ = chan.write(b"\r");

    loop {
        // Device -> terminal
        match chan.bytes_waiting() {
            Ok(n) if n > 0 => {
                if let Ok(data) = chan.read(n) {
                    stdout.write_all(&data)?;
                    stdout.flush()?;
                }
            }
            Ok(_) => {}
            Err(_) => break, // channel gone; drop back to the shell
        }

        // Terminal -> device
        if !event::poll(Duration::from_millis(10))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }

        let mut buf = [0u8; 4];
        let bytes: &[u8] = match key.code {
            KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
                let b = ctrl_byte(c);
                if b == EXIT_CHAR {
                    break;
                }
                buf[0] = b;
                &buf[..1]
            }
            KeyCode::Char(c) => c.encode_utf8(&mut buf).as_bytes(),
            KeyCode::Enter => b"\r",
            KeyCode::Backspace => b"\x7f",
            KeyCode::Tab => b"\t",
            KeyCode::Esc => b"\x1b",
            KeyCode::Up => b"\x1b[A",
            KeyCode::Down => b"\x1b[B",
            KeyCode::Right => b"\x1b[C",
            KeyCode::Left => b"\x1b[D",
            KeyCode::Home => b"\x1b[H",
            KeyCode::End => b"\x1b[F",
            KeyCode::Delete => b"\x1b[3~",
            _ => continue,
        };

        if chan.write(bytes).is_err() {
            break;
        }
    }
    Ok(())
}

/// Control-key byte for a character (Ctrl+A = 0x01, Ctrl+] = 0x1D, ...)
fn ctrl_byte(c: char) -> u8 {
    let c = c.to_ascii_uppercase();
    match c {
        'A'..='Z' => c as u8 - b'A' + 1,
        '[' => 0x1b,
        '\\' => 0x1c,
        ']' => 0x1d,
        '^' => 0x1e,
        '_' => 0x1f,
        ' ' | '@' => 0x00,
        _ => c as u8,
    }
}
