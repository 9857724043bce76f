//! Helpers for the generated-snippet surface
//!
//! The device answers `uos.ilistdir` queries with a printed Python literal
//! (a list of tuples), and file payloads travel hex-encoded through
//! `ubinascii`. This module parses and produces those encodings.

/// One `ilistdir` tuple: entry name and mode word
pub type ListEntry = (String, u32);

/// Bit set in the ilistdir mode word for directories
pub const MODE_DIR: u32 = 0x4000;

/// Escape a path for interpolation into a single-quoted Python string
pub fn py_str_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            _ => out.push(c),
        }
    }
    out
}

/// Encode bytes as lowercase hex, as `ubinascii.hexlify` produces
pub fn hexlify(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for b in data {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Decode a hex string produced by `ubinascii.hexlify` on the device
pub fn unhexlify(s: &str) -> Result<Vec<u8>, String> {
    let s = s.trim();
    if s.len() % 2 != 0 {
        return Err(format!("odd-length hex payload ({} chars)", s.len()));
    }
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(s.len() / 2);
    for pair in bytes.chunks(2) {
        let hi = hex_val(pair[0]).ok_or_else(|| bad_hex(pair[0]))?;
        let lo = hex_val(pair[1]).ok_or_else(|| bad_hex(pair[1]))?;
        out.push(hi << 4 | lo);
    }
    Ok(out)
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn bad_hex(c: u8) -> String {
    format!("invalid hex digit {:?} in payload", c as char)
}

/// Parse the printed form of `list(uos.ilistdir(...))`.
///
/// Accepts a list of tuples whose first element is a quoted name and whose
/// second is the integer mode word; trailing tuple elements (inode, size)
/// are skipped. Example input:
/// `[('boot.py', 32768, 0, 139), ('lib', 16384, 0, 0)]`
pub fn parse_ilistdir(s: &str) -> Result<Vec<ListEntry>, String> {
    let mut p = Parser::new(s.trim());
    p.expect('[')?;
    let mut entries = Vec::new();
    p.skip_ws();
    if p.peek() == Some(']') {
        p.next();
        return Ok(entries);
    }
    loop {
        entries.push(p.tuple()?);
        p.skip_ws();
        match p.next() {
            Some(',') => p.skip_ws(),
            Some(']') => break,
            other => return Err(format!("expected ',' or ']', got {:?}", other)),
        }
        // Tolerate a trailing comma before the closing bracket
        if p.peek() == Some(']') {
            p.next();
            break;
        }
    }
    Ok(entries)
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Parser<'a> {
    fn new(s: &'a str) -> Self {
        Parser {
            chars: s.chars().peekable(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn next(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.next();
        }
    }

    fn expect(&mut self, c: char) -> Result<(), String> {
        self.skip_ws();
        match self.next() {
            Some(got) if got == c => Ok(()),
            got => Err(format!("expected {:?}, got {:?}", c, got)),
        }
    }

    fn tuple(&mut self) -> Result<ListEntry, String> {
        self.expect('(')?;
        let name = self.string()?;
        self.expect(',')?;
        let mode = self.integer()?;
        // Skip any remaining tuple elements
        self.skip_ws();
        let mut depth = 0;
        loop {
            match self.next() {
                Some('(') => depth += 1,
                Some(')') if depth == 0 => break,
                Some(')') => depth -= 1,
                Some(_) => {}
                None => return Err("unterminated tuple".to_string()),
            }
        }
        Ok((name, mode))
    }

    fn string(&mut self) -> Result<String, String> {
        self.skip_ws();
        let quote = match self.next() {
            Some(q @ ('\'' | '"')) => q,
            got => return Err(format!("expected string, got {:?}", got)),
        };
        let mut out = String::new();
        loop {
            match self.next() {
                Some('\\') => match self.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(c) => out.push(c),
                    None => return Err("unterminated escape".to_string()),
                },
                Some(c) if c == quote => break,
                Some(c) => out.push(c),
                None => return Err("unterminated string".to_string()),
            }
        }
        Ok(out)
    }

    fn integer(&mut self) -> Result<u32, String> {
        self.skip_ws();
        let mut digits = String::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric()) {
            digits.push(self.next().unwrap());
        }
        if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
            u32::from_str_radix(hex, 16).map_err(|_| format!("invalid integer: {}", digits))
        } else {
            digits
                .parse()
                .map_err(|_| format!("invalid integer: {}", digits))
        }
    }
}
