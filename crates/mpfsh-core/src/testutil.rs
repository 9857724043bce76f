//! Test doubles: a scripted byte channel and an in-memory device emulator
//!
//! `MockChannel` replays canned responses and records every byte written,
//! for asserting exact wire sequences. `FakeDevice` goes further and
//! emulates the raw-REPL state machine (including raw-paste flow control)
//! over a small in-memory filesystem, so the explorer can be exercised
//! end-to-end without hardware.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::channel::Channel;
use crate::error::Result;
use crate::literal::{hexlify, unhexlify};

// ---------------------------------------------------------------------------
// MockChannel
// ---------------------------------------------------------------------------

struct Trigger {
    suffix: Vec<u8>,
    reply: Vec<u8>,
    fired: bool,
}

/// Scripted channel: replies are queued directly or armed to fire when the
/// written stream ends with a given byte sequence.
pub struct MockChannel {
    rx: VecDeque<u8>,
    pub written: Vec<u8>,
    survives: bool,
    triggers: Vec<Trigger>,
}

impl MockChannel {
    pub fn new(survives: bool) -> Self {
        MockChannel {
            rx: VecDeque::new(),
            written: Vec::new(),
            survives,
            triggers: Vec::new(),
        }
    }

    /// Make `data` immediately readable
    pub fn queue(&mut self, data: &[u8]) {
        self.rx.extend(data);
    }

    /// Queue `reply` once the written stream ends with `suffix`
    pub fn on_write(&mut self, suffix: &[u8], reply: &[u8]) {
        self.triggers.push(Trigger {
            suffix: suffix.to_vec(),
            reply: reply.to_vec(),
            fired: false,
        });
    }
}

impl Channel for MockChannel {
    fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        let n = max.min(self.rx.len());
        Ok(self.rx.drain(..n).collect())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.written.extend_from_slice(data);
        for t in &mut self.triggers {
            if !t.fired && self.written.ends_with(&t.suffix) {
                t.fired = true;
                self.rx.extend(&t.reply);
            }
        }
        Ok(data.len())
    }

    fn bytes_waiting(&mut self) -> Result<usize> {
        Ok(self.rx.len())
    }

    fn close(&mut self) {}

    fn survives_soft_reset(&self) -> bool {
        self.survives
    }
}

// ---------------------------------------------------------------------------
// FakeDevice
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DevState {
    Friendly,
    Raw,
    RawPaste,
}

const RAW_PROMPT_OUT: &[u8] = b"raw REPL; CTRL-B to exit\r\n>";

/// Emulated MicroPython board with an in-memory filesystem.
///
/// Understands the raw-REPL framing and the exact snippets the file
/// explorer generates; anything else executes as a no-op.
pub struct FakeDevice {
    out: VecDeque<u8>,
    state: DevState,
    buf: Vec<u8>,
    probe: Vec<u8>,
    paste: Vec<u8>,
    paste_unacked: usize,

    pub raw_paste_supported: bool,
    pub raw_paste_window: usize,
    pub survives: bool,
    pub sysname: String,
    pub exec_count: usize,
    pub last_command: Vec<u8>,

    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    cwd: String,
    open_write: Option<String>,
    open_read: Option<String>,
}

impl FakeDevice {
    pub fn new(raw_paste_supported: bool) -> Self {
        let mut dirs = BTreeSet::new();
        dirs.insert("/".to_string());
        dirs.insert("/flash".to_string());
        FakeDevice {
            out: VecDeque::new(),
            state: DevState::Friendly,
            buf: Vec::new(),
            probe: Vec::new(),
            paste: Vec::new(),
            paste_unacked: 0,
            raw_paste_supported,
            raw_paste_window: 32,
            survives: false,
            sysname: "esp32".to_string(),
            exec_count: 0,
            last_command: Vec::new(),
            files: BTreeMap::new(),
            dirs,
            cwd: "/flash".to_string(),
            open_write: None,
            open_read: None,
        }
    }

    pub fn add_dir(&mut self, path: &str) {
        self.dirs.insert(path.to_string());
    }

    pub fn add_file(&mut self, path: &str, data: &[u8]) {
        self.files.insert(path.to_string(), data.to_vec());
    }

    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(|v| v.as_slice())
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.dirs.contains(path)
    }

    fn emit(&mut self, data: &[u8]) {
        self.out.extend(data);
    }

    fn feed(&mut self, b: u8) {
        match self.state {
            DevState::Friendly => {
                if b == 0x01 {
                    self.state = DevState::Raw;
                    self.buf.clear();
                    self.emit(RAW_PROMPT_OUT);
                }
                // Interrupts and stray input are ignored at the prompt
            }
            DevState::Raw => self.feed_raw(b),
            DevState::RawPaste => self.feed_paste(b),
        }
    }

    fn feed_raw(&mut self, b: u8) {
        if !self.probe.is_empty() {
            self.probe.push(b);
            if self.probe == b"\x05A\x01" {
                if self.raw_paste_supported {
                    self.emit(b"R\x01");
                    let w = self.raw_paste_window as u16;
                    self.emit(&w.to_le_bytes());
                    self.state = DevState::RawPaste;
                    self.paste.clear();
                    self.paste_unacked = 0;
                } else {
                    self.emit(b"R\x00");
                }
                self.probe.clear();
            } else if !b"\x05A\x01".starts_with(self.probe.as_slice()) {
                let pending = std::mem::take(&mut self.probe);
                self.buf.extend(pending);
            }
            return;
        }

        match b {
            0x05 if self.buf.is_empty() => self.probe.push(b),
            0x01 => {
                // Ctrl-A while already raw: the device prints the banner again
                self.buf.clear();
                self.emit(RAW_PROMPT_OUT);
            }
            0x04 if self.buf.is_empty() => {
                // Soft reset; the board reboots straight back into raw mode
                self.open_write = None;
                self.open_read = None;
                self.emit(b"soft reboot\r\n");
                self.emit(RAW_PROMPT_OUT);
            }
            0x04 => {
                self.emit(b"OK");
                let cmd = std::mem::take(&mut self.buf);
                self.run(cmd);
            }
            0x02 => {
                self.state = DevState::Friendly;
                self.buf.clear();
                self.emit(b"\r\nMicroPython fake build\r\n>>> ");
            }
            0x03 => self.buf.clear(),
            b'\r' => {}
            _ => self.buf.push(b),
        }
    }

    fn feed_paste(&mut self, b: u8) {
        if b == 0x04 {
            self.emit(&[0x04]);
            let cmd = std::mem::take(&mut self.paste);
            self.state = DevState::Raw;
            self.run(cmd);
        } else {
            self.paste.push(b);
            self.paste_unacked += 1;
            if self.paste_unacked >= self.raw_paste_window {
                self.emit(&[0x01]);
                self.paste_unacked = 0;
            }
        }
    }

    fn run(&mut self, cmd: Vec<u8>) {
        self.exec_count += 1;
        self.last_command = cmd.clone();
        let text = String::from_utf8_lossy(&cmd).into_owned();
        let (out, err) = self.execute(&text);
        self.emit(&out);
        self.emit(&[0x04]);
        self.emit(&err);
        self.emit(&[0x04]);
        self.emit(b">");
    }

    fn execute(&mut self, cmd: &str) -> (Vec<u8>, Vec<u8>) {
        let cmd = cmd.trim();

        if cmd.is_empty()
            || cmd.starts_with('#')
            || cmd.starts_with("try:")
            || cmd.starts_with("import ")
        {
            return (Vec::new(), Vec::new());
        }

        if let Some(expr) = cmd.strip_prefix("print(").and_then(|r| r.strip_suffix(')')) {
            return self.eval_expr(expr);
        }

        if let Some(path) = between(cmd, "f = open('", "', 'wb')") {
            let path = path.to_string();
            if self.dirs.contains(&path) {
                return oserror(21, "EISDIR");
            }
            if !self.dirs.contains(&parent_of(&path)) {
                return oserror(2, "ENOENT");
            }
            self.files.insert(path.clone(), Vec::new());
            self.open_write = Some(path);
            return (Vec::new(), Vec::new());
        }

        if let Some(hex) = between(cmd, "f.write(ubinascii.unhexlify('", "'))") {
            let Some(path) = self.open_write.clone() else {
                return nameerror("f");
            };
            match unhexlify(hex) {
                Ok(data) => {
                    self.files.get_mut(&path).unwrap().extend_from_slice(&data);
                    (Vec::new(), Vec::new())
                }
                Err(_) => valueerror("non-hex digit found"),
            }
        } else if let Some(path) = between(cmd, "f = open('", "', 'rb')") {
            let path = path.to_string();
            if !self.files.contains_key(&path) {
                return oserror(2, "ENOENT");
            }
            self.open_read = Some(path);
            (Vec::new(), Vec::new())
        } else if cmd == "f.close()" {
            self.open_write = None;
            self.open_read = None;
            (Vec::new(), Vec::new())
        } else if cmd.starts_with("while True:") && cmd.contains("hexlify") {
            let Some(path) = self.open_read.clone() else {
                return nameerror("f");
            };
            let data = self.files.get(&path).cloned().unwrap_or_default();
            (hexlify(&data).into_bytes(), Vec::new())
        } else {
            // Anything else runs as a silent no-op
            (Vec::new(), Vec::new())
        }
    }

    fn eval_expr(&mut self, expr: &str) -> (Vec<u8>, Vec<u8>) {
        if expr == "uos.getcwd()" {
            return printed(&self.cwd);
        }
        if expr == "uos.uname()[0]" {
            return printed(&self.sysname.clone());
        }
        if let Some(dir) = between(expr, "list(uos.ilistdir('", "'))") {
            let dir = dir.to_string();
            if !self.dirs.contains(&dir) {
                return oserror(2, "ENOENT");
            }
            let mut parts = Vec::new();
            for (name, is_dir, size) in self.children(&dir) {
                let mode = if is_dir { 0x4000 } else { 0x8000 };
                parts.push(format!("('{}', {}, 0, {})", name, mode, size));
            }
            return printed(&format!("[{}]", parts.join(", ")));
        }
        if let Some(dir) = between(expr, "uos.listdir('", "')") {
            let dir = dir.to_string();
            if !self.dirs.contains(&dir) {
                return oserror(2, "ENOENT");
            }
            let names: Vec<String> = self
                .children(&dir)
                .into_iter()
                .map(|(n, _, _)| format!("'{}'", n))
                .collect();
            return printed(&format!("[{}]", names.join(", ")));
        }
        if let Some(path) = between(expr, "uos.mkdir('", "')") {
            let path = path.to_string();
            if self.dirs.contains(&path) || self.files.contains_key(&path) {
                return oserror(17, "EEXIST");
            }
            if !self.dirs.contains(&parent_of(&path)) {
                return oserror(2, "ENOENT");
            }
            self.dirs.insert(path);
            return printed("None");
        }
        if let Some(path) = between(expr, "uos.remove('", "')") {
            let path = path.to_string();
            if self.files.remove(&path).is_some() {
                return printed("None");
            }
            if self.dirs.contains(&path) {
                return oserror(21, "EISDIR");
            }
            return oserror(2, "ENOENT");
        }
        if let Some(path) = between(expr, "uos.rmdir('", "')") {
            let path = path.to_string();
            if self.dirs.contains(&path) {
                if !self.children(&path).is_empty() {
                    return oserror(39, "ENOTEMPTY");
                }
                self.dirs.remove(&path);
                return printed("None");
            }
            if self.files.contains_key(&path) {
                return oserror(20, "ENOTDIR");
            }
            return oserror(2, "ENOENT");
        }
        printed("None")
    }

    fn children(&self, dir: &str) -> Vec<(String, bool, usize)> {
        let mut out = Vec::new();
        for (path, data) in &self.files {
            if parent_of(path) == dir {
                out.push((basename(path).to_string(), false, data.len()));
            }
        }
        for path in &self.dirs {
            if path != "/" && parent_of(path) == dir {
                out.push((basename(path).to_string(), true, 0));
            }
        }
        out
    }
}

impl Channel for FakeDevice {
    fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        let n = max.min(self.out.len());
        Ok(self.out.drain(..n).collect())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        for &b in data {
            self.feed(b);
        }
        Ok(data.len())
    }

    fn bytes_waiting(&mut self) -> Result<usize> {
        Ok(self.out.len())
    }

    fn close(&mut self) {}

    fn survives_soft_reset(&self) -> bool {
        self.survives
    }
}

fn printed(s: &str) -> (Vec<u8>, Vec<u8>) {
    (format!("{}\r\n", s).into_bytes(), Vec::new())
}

fn oserror(errno: u32, sym: &str) -> (Vec<u8>, Vec<u8>) {
    (
        Vec::new(),
        format!(
            "Traceback (most recent call last):\r\n  File \"<stdin>\", line 1, in <module>\r\nOSError: [Errno {}] {}\r\n",
            errno, sym
        )
        .into_bytes(),
    )
}

fn nameerror(name: &str) -> (Vec<u8>, Vec<u8>) {
    (
        Vec::new(),
        format!(
            "Traceback (most recent call last):\r\n  File \"<stdin>\", line 1, in <module>\r\nNameError: name '{}' isn't defined\r\n",
            name
        )
        .into_bytes(),
    )
}

fn valueerror(msg: &str) -> (Vec<u8>, Vec<u8>) {
    (
        Vec::new(),
        format!(
            "Traceback (most recent call last):\r\n  File \"<stdin>\", line 1, in <module>\r\nValueError: {}\r\n",
            msg
        )
        .into_bytes(),
    )
}

fn between<'a>(s: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    s.strip_prefix(prefix)?.strip_suffix(suffix)
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(i) => path[..i].to_string(),
        None => "/".to_string(),
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
