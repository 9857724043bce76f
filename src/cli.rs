//! CLI argument parsing

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mpfsh")]
#[command(author, version, about = "MicroPython file shell", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Execute the given shell commands (separated by ;)
    #[arg(short, long)]
    pub command: Option<String>,

    /// Execute shell commands from a file
    #[arg(short, long)]
    pub script: Option<PathBuf>,

    /// Non-interactive mode (don't enter the shell)
    #[arg(short = 'n', long)]
    pub noninteractive: bool,

    /// Disable colored output
    #[arg(long)]
    pub nocolor: bool,

    /// Disable the directory listing cache
    #[arg(long)]
    pub nocache: bool,

    /// Hard reset the device via DTR on open (serial connections only)
    #[arg(long)]
    pub reset: bool,

    /// Board to open directly, e.g. ttyUSB0, ser:/dev/ttyACM0,115200,
    /// tn:192.168.1.1 or ws:192.168.1.1
    pub board: Option<String>,
}
