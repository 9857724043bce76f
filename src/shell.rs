//! Interactive file shell
//!
//! A command loop over the `Explorer` trait: one shell command per
//! explorer/driver operation. Local-side commands (`lls`, `lcd`, `lpwd`,
//! `mpyc`) never touch the device.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use colored::Colorize;
use indicatif::ProgressBar;
use log::debug;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use mpfsh_core::error::{Error, Result};
use mpfsh_core::{
    mpy_cross, Board, CachingExplorer, ConnectTarget, Explorer, FileExplorer,
};

use crate::term;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP: &str = "\
Documented commands:

  open <TARGET>             connect to a board (ser:/tn:/ws: or device name)
  close                     close the connection
  ls                        list remote files
  pwd / cd <DIR>            show / change the remote directory
  md <DIR>                  create a remote directory
  rm <NAME>                 remove a remote file or empty directory
  mrm <PATTERN>             remove remote files matching a pattern
  put <LOCAL> [<REMOTE>]    upload a file
  mput <PATTERN>            upload local files matching a pattern
  get <REMOTE> [<LOCAL>]    download a file
  mget <PATTERN>            download remote files matching a pattern
  cat <REMOTE>              print a remote file
  exec <STATEMENT>          run a Python statement on the board
  repl                      enter the MicroPython REPL (Ctrl+] to leave)
  mpyc <LOCAL>              compile a file with mpy-cross
  putc <LOCAL> [<REMOTE>]   compile with mpy-cross and upload
  lls / lcd <DIR> / lpwd    local directory commands
  exit                      leave the shell
";

/// Interactive shell state
pub struct Shell {
    fe: Option<Box<dyn Explorer>>,
    caching: bool,
    reset: bool,
    exit: bool,
}

impl Shell {
    pub fn new(caching: bool, reset: bool) -> Self {
        Shell {
            fe: None,
            caching,
            reset,
            exit: false,
        }
    }

    pub fn wants_exit(&self) -> bool {
        self.exit
    }

    /// Execute one shell command line. Returns false if it failed.
    pub fn run_line(&mut self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return true;
        }
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((c, r)) => (c, r.trim()),
            None => (line, ""),
        };

        let result = self.dispatch(command, rest);
        match result {
            Ok(()) => true,
            Err(e) => {
                self.error(&e.to_string());
                false
            }
        }
    }

    /// Run the interactive prompt until exit or EOF
    pub fn run_interactive(&mut self) {
        println!();
        println!(
            "{}",
            format!("** MicroPython File Shell v{} **", VERSION)
                .green()
                .bold()
        );
        println!("-- type 'help' for help, 'exit' to leave --\n");

        let mut editor = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                self.error(&format!("cannot initialize line editor: {}", e));
                return;
            }
        };
        let history = history_path();
        if let Some(path) = &history {
            let _ = editor.load_history(path);
        }

        while !self.exit {
            match editor.readline(&self.prompt()) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = editor.add_history_entry(line.trim());
                    }
                    self.run_line(&line);
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    self.error(&format!("input error: {}", e));
                    break;
                }
            }
        }

        if let Some(path) = &history {
            let _ = editor.save_history(path);
        }
        self.disconnect();
    }

    fn prompt(&self) -> String {
        let pwd = match &self.fe {
            Some(fe) => fe.pwd(),
            None => "/".to_string(),
        };
        format!("{}{}{}", "mpfs [".blue(), pwd.yellow(), "]> ".blue())
    }

    fn error(&self, msg: &str) {
        println!("\n{}\n", msg.red());
    }

    fn dispatch(&mut self, command: &str, rest: &str) -> Result<()> {
        match command {
            "help" | "?" => {
                println!("{}", HELP);
                Ok(())
            }
            "open" => self.cmd_open(rest),
            "close" => {
                self.disconnect();
                Ok(())
            }
            "ls" => self.cmd_ls(),
            "pwd" => {
                let fe = self.explorer()?;
                println!("{}", fe.pwd());
                Ok(())
            }
            "cd" => {
                let target = one_name(rest, "<REMOTE DIR>")?;
                self.explorer()?.cd(&target)
            }
            "md" => {
                let target = one_name(rest, "<REMOTE DIR>")?;
                self.explorer()?.md(&target)
            }
            "rm" => {
                let target = one_name(rest, "<REMOTE FILE>")?;
                self.explorer()?.rm(&target)
            }
            "mrm" => self.cmd_mrm(rest),
            "put" => self.cmd_put(rest),
            "mput" => self.cmd_mput(rest),
            "get" => self.cmd_get(rest),
            "mget" => self.cmd_mget(rest),
            "cat" => {
                let name = one_name(rest, "<REMOTE FILE>")?;
                let text = self.explorer()?.gets(&name)?;
                println!("{}", text);
                Ok(())
            }
            "exec" => self.cmd_exec(rest),
            "repl" => self.cmd_repl(),
            "mpyc" => {
                let src = one_name(rest, "<LOCAL FILE>")?;
                mpy_cross(Path::new(&src), None)
            }
            "putc" => self.cmd_putc(rest),
            "lls" => cmd_lls(),
            "lcd" => {
                let dir = one_name(rest, "<LOCAL DIR>")?;
                std::env::set_current_dir(&dir)?;
                Ok(())
            }
            "lpwd" => {
                println!("{}", std::env::current_dir()?.display());
                Ok(())
            }
            "exit" => {
                self.disconnect();
                self.exit = true;
                Ok(())
            }
            other => Err(Error::RemoteIo(format!("Unknown command: {}", other))),
        }
    }

    fn explorer(&mut self) -> Result<&mut Box<dyn Explorer>> {
        self.fe.as_mut().ok_or_else(|| {
            Error::Connect("Not connected to device. Use 'open' first.".to_string())
        })
    }

    fn disconnect(&mut self) {
        if let Some(mut fe) = self.fe.take() {
            debug!("disconnecting");
            fe.close();
        }
    }

    fn cmd_open(&mut self, rest: &str) -> Result<()> {
        if rest.is_empty() {
            return Err(Error::Connect("Missing argument: <TARGET>".to_string()));
        }
        self.disconnect();

        let mut target = ConnectTarget::parse(rest).map_err(Error::Connect)?;
        match &mut target {
            ConnectTarget::Telnet {
                login, password, ..
            } => {
                if login.is_none() {
                    *login = Some(prompt_line("telnet login : ")?);
                }
                if password.is_none() {
                    *password = Some(prompt_line("telnet passwd: ")?);
                }
            }
            ConnectTarget::Websocket { password, .. } => {
                if password.is_none() {
                    *password = Some(prompt_line("webrepl passwd: ")?);
                }
            }
            ConnectTarget::Serial { .. } => {}
        }

        if self.reset {
            println!("Hard resetting device ...");
        }
        let channel = mpfsh_link::open_channel(&target, self.reset)?;
        let board = Board::new(channel);

        let mut fe: Box<dyn Explorer> = if self.caching {
            Box::new(CachingExplorer::new(FileExplorer::new(board)))
        } else {
            Box::new(FileExplorer::new(board))
        };
        fe.setup()?;
        println!("Connected to {}", fe.sysname());
        self.fe = Some(fe);
        Ok(())
    }

    fn cmd_ls(&mut self) -> Result<()> {
        let fe = self.explorer()?;
        let pwd = fe.pwd();
        let entries = fe.ls(true, true)?;

        println!("\nRemote files in '{}':\n", pwd);
        if pwd != "/" {
            println!("{}", " <dir> ..".magenta());
        }
        for entry in entries {
            if entry.is_dir() {
                println!("{}", format!(" <dir> {}", entry.name).magenta());
            } else {
                println!("{}", format!("       {}", entry.name).cyan());
            }
        }
        println!();
        Ok(())
    }

    fn cmd_put(&mut self, rest: &str) -> Result<()> {
        let (local, remote) = one_or_two(rest, "<LOCAL FILE> [<REMOTE FILE>]")?;
        let remote = remote.unwrap_or_else(|| local.clone());
        self.explorer()?.put(Path::new(&local), &remote)
    }

    fn cmd_get(&mut self, rest: &str) -> Result<()> {
        let (remote, local) = one_or_two(rest, "<REMOTE FILE> [<LOCAL FILE>]")?;
        let local = local.unwrap_or_else(|| remote.clone());
        self.explorer()?.get(&remote, Path::new(&local))
    }

    fn cmd_mput(&mut self, rest: &str) -> Result<()> {
        let pattern = one_name(rest, "<SELECTION PATTERN>")?;
        let cwd = std::env::current_dir()?;
        let fe = self.fe.as_mut().ok_or_else(|| {
            Error::Connect("Not connected to device. Use 'open' first.".to_string())
        })?;
        let pb = ProgressBar::new_spinner();
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        fe.mput(&cwd, &pattern, &mut |name| {
            pb.set_message(name.to_string());
            pb.println(format!(" * put {}", name));
        })?;
        pb.finish_and_clear();
        Ok(())
    }

    fn cmd_mget(&mut self, rest: &str) -> Result<()> {
        let pattern = one_name(rest, "<SELECTION PATTERN>")?;
        let cwd = std::env::current_dir()?;
        let fe = self.fe.as_mut().ok_or_else(|| {
            Error::Connect("Not connected to device. Use 'open' first.".to_string())
        })?;
        let pb = ProgressBar::new_spinner();
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        fe.mget(&cwd, &pattern, &mut |name| {
            pb.set_message(name.to_string());
            pb.println(format!(" * get {}", name));
        })?;
        pb.finish_and_clear();
        Ok(())
    }

    fn cmd_mrm(&mut self, rest: &str) -> Result<()> {
        let pattern = one_name(rest, "<SELECTION PATTERN>")?;
        let fe = self.explorer()?;
        fe.mrm(&pattern, &mut |name| println!(" * rm {}", name))?;
        Ok(())
    }

    fn cmd_exec(&mut self, statement: &str) -> Result<()> {
        if statement.is_empty() {
            return Err(Error::RemoteIo("Missing argument: <STATEMENT>".to_string()));
        }
        let fe = self.explorer()?;
        let code = format!("{}\n", statement);
        let mut sink = |data: &[u8]| {
            let mut stdout = io::stdout();
            // EOF markers frame the stream; they are not output
            let cleaned: Vec<u8> = data.iter().copied().filter(|&b| b != 0x04).collect();
            let _ = stdout.write_all(&cleaned);
            let _ = stdout.flush();
        };
        match fe.exec_stream(&code, &mut sink) {
            Ok(()) => {
                println!();
                Ok(())
            }
            Err(Error::RemoteException { error, .. }) => {
                Err(Error::RemoteIo(String::from_utf8_lossy(&error).into_owned()))
            }
            Err(e) => Err(e),
        }
    }

    fn cmd_repl(&mut self) -> Result<()> {
        let fe = self.explorer()?;
        let pwd = fe.pwd();

        fe.teardown()?;
        println!("\n*** Exit REPL with Ctrl+] ***\n");
        if let Err(e) = term::run(fe.channel_mut()) {
            self.error(&format!("terminal error: {}", e));
        }

        // Anything may have happened on the board; rebuild the session
        let fe = self.explorer()?;
        fe.invalidate_cache();
        fe.setup()?;
        if let Err(e) = fe.cd(&pwd) {
            // The old working directory may be gone after a reset
            self.error(&e.to_string());
        }
        println!();
        Ok(())
    }

    fn cmd_putc(&mut self, rest: &str) -> Result<()> {
        let (local, remote) = one_or_two(rest, "<LOCAL FILE> [<REMOTE FILE>]")?;
        let remote = remote.unwrap_or_else(|| {
            let path = PathBuf::from(&local);
            path.with_extension("mpy")
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("{}.mpy", local))
        });

        let compiled = tempfile::NamedTempFile::new()?;
        mpy_cross(Path::new(&local), Some(compiled.path()))?;
        self.explorer()?.put(compiled.path(), &remote)
    }
}

fn cmd_lls() -> Result<()> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(".")? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() {
            dirs.push(name);
        } else {
            files.push(name);
        }
    }
    dirs.sort();
    files.sort();

    println!("\nLocal files:\n");
    for name in dirs {
        println!("{}", format!(" <dir> {}", name).magenta());
    }
    for name in files {
        println!("{}", format!("       {}", name).cyan());
    }
    println!();
    Ok(())
}

fn history_path() -> Option<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "mpfsh")?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir).ok()?;
    Some(data_dir.join("history.txt"))
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Exactly one (possibly quoted) name
fn one_name(rest: &str, usage: &str) -> Result<String> {
    let mut names = tokenize(rest)?;
    match names.len() {
        0 => Err(Error::RemoteIo(format!("Missing argument: {}", usage))),
        1 => Ok(names.remove(0)),
        _ => Err(Error::RemoteIo(format!(
            "Only one argument allowed: {}",
            usage
        ))),
    }
}

/// One mandatory and one optional (possibly quoted) name
fn one_or_two(rest: &str, usage: &str) -> Result<(String, Option<String>)> {
    let mut names = tokenize(rest)?;
    match names.len() {
        0 => Err(Error::RemoteIo(format!("Missing arguments: {}", usage))),
        1 => Ok((names.remove(0), None)),
        2 => {
            let second = names.remove(1);
            Ok((names.remove(0), Some(second)))
        }
        _ => Err(Error::RemoteIo(format!(
            "Only one or two arguments allowed: {}",
            usage
        ))),
    }
}

/// Split a command tail into names, honoring single and double quotes
fn tokenize(input: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in input.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            None => {
                if c == '\'' || c == '"' {
                    quote = Some(c);
                } else if c.is_whitespace() {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                } else {
                    current.push(c);
                }
            }
        }
    }
    if quote.is_some() {
        return Err(Error::RemoteIo(format!("Invalid filename given: {}", input)));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}
