//! mpfsh - a file shell for MicroPython boards
//!
//! Connects to a board over serial, telnet or WebREPL websocket, drives its
//! raw REPL, and exposes file transfer and execution through an interactive
//! shell.
//!
//! # Architecture
//!
//! The CLI only talks to `mpfsh-core` (driver, explorer) and `mpfsh-link`
//! (channel resolution). The raw-REPL protocol state machine lives in
//! `mpfsh_core::Board`; the shell is presentation glue on top of the
//! `Explorer` trait, so the listing cache can be layered in transparently.

mod cli;
mod shell;
mod term;

use clap::Parser;
use cli::Cli;
use shell::Shell;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if cli.nocolor {
        colored::control::set_override(false);
    }

    let mut shell = Shell::new(!cli.nocache, cli.reset);

    if let Some(board) = &cli.board {
        if !shell.run_line(&format!("open {}", board)) && cli.noninteractive {
            return std::process::ExitCode::FAILURE;
        }
    }

    if let Some(commands) = &cli.command {
        for command in commands.split(';') {
            let command = command.trim();
            if command.is_empty() || command.starts_with('#') {
                continue;
            }
            shell.run_line(command);
            if shell.wants_exit() {
                return std::process::ExitCode::SUCCESS;
            }
        }
    } else if let Some(script) = &cli.script {
        let content = match std::fs::read_to_string(script) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("cannot read script {}: {}", script.display(), e);
                return std::process::ExitCode::FAILURE;
            }
        };
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            shell.run_line(line);
            if shell.wants_exit() {
                return std::process::ExitCode::SUCCESS;
            }
        }
    }

    if !cli.noninteractive {
        shell.run_interactive();
    }

    std::process::ExitCode::SUCCESS
}
