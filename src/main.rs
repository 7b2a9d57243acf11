//! ttyctl - terminal key viewer
//!
//! Puts the terminal in raw mode and shows the bytes each key produces,
//! with a two-line status area redrawn in place.
//!
//! # Quick Start
//!
//! ```text
//! ttyctl                 # Use the controlling terminal
//! ttyctl -d /dev/pts/4   # Use another terminal device
//! ```
//!
//! # Keys
//!
//! | Key | Action |
//! |-----|--------|
//! | q, Ctrl+C, Ctrl+D | Quit |
//! | ! | Run a shell in cooked mode, come back when it exits |
//! | anything else | Show its bytes |

use std::env;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::process::Command;
use std::sync::Mutex;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use unicode_width::UnicodeWidthChar;

use ttyctl::config::Config;
use ttyctl::signals::SignalFlags;
use ttyctl::{tty_print, Color, Device, Tty, TtyError};

/// Command line options
#[derive(Debug, Default)]
struct Options {
    /// Terminal device, overrides the config file
    device: Option<String>,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Longest byte group shown for a single key press
const MAX_KEY_BYTES: usize = 16;

/// How long to wait for the rest of an escape sequence
const SEQUENCE_GAP: Duration = Duration::from_millis(10);

const CTRL_C: u8 = 0x03;
const CTRL_D: u8 = 0x04;
const ESC: u8 = 0x1b;
const DEL: u8 = 0x7f;

fn print_version() {
    eprintln!("ttyctl {}", VERSION);
}

fn print_help() {
    eprintln!("ttyctl {} - terminal key viewer", VERSION);
    eprintln!();
    eprintln!("Usage: ttyctl [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -d, --device <PATH>   Terminal device (default: from config or /dev/tty)");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Keys:");
    eprintln!("  q, Ctrl+C, Ctrl+D     Quit");
    eprintln!("  !                     Run a shell, return when it exits");
    eprintln!();
    eprintln!("Configuration: ~/.ttyctl/config.toml");
    eprintln!("Log file:      ~/.ttyctl/ttyctl.log");
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    let mut options = Options::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-d" | "--device" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing device argument".to_string());
                }
                options.device = Some(args[i].clone());
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(options)
}

fn init_logging(config: &Config) {
    let log_path = Config::config_dir()
        .map(|dir| dir.join("ttyctl.log"))
        .unwrap_or_else(|| PathBuf::from("ttyctl.log"));

    if let Some(parent) = log_path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    // Never log to the terminal we are driving.
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter =
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let options = match parse_args() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let mut config = Config::load();
    if let Some(device) = options.device {
        config.device = device;
    }

    init_logging(&config);
    info!("ttyctl starting...");
    info!("Device: {}", config.device);

    #[cfg(not(any(unix, windows)))]
    {
        anyhow::bail!("ttyctl supports POSIX terminals and the Windows console only");
    }

    #[cfg(any(unix, windows))]
    {
        run(&config)
    }
}

#[cfg(any(unix, windows))]
fn run(config: &Config) -> anyhow::Result<()> {
    let signals = SignalFlags::install()?;
    let mut tty = match ttyctl::Terminal::open(&config.device) {
        Ok(tty) => tty,
        Err(e) => {
            error!("Failed to open terminal: {}", e);
            return Err(e.into());
        }
    };

    let mut viewer = KeyViewer::new(config);
    viewer.enter(&mut tty);
    let result = viewer.event_loop(&mut tty, &signals);
    viewer.leave(&mut tty);
    tty.close();

    match result {
        Err(TtyError::EndOfInput) => {
            info!("Input closed");
            Ok(())
        }
        Err(e) => {
            error!("Terminal read failed: {}", e);
            Err(e.into())
        }
        Ok(()) => {
            info!("ttyctl exiting");
            Ok(())
        }
    }
}

/// What a key press asks for
#[derive(Debug, PartialEq, Eq)]
enum Action {
    Quit,
    Shell,
    Show,
}

fn classify(bytes: &[u8]) -> Action {
    match bytes {
        [b'q'] | [CTRL_C] | [CTRL_D] => Action::Quit,
        [b'!'] => Action::Shell,
        _ => Action::Show,
    }
}

/// Readable rendering of raw key bytes, e.g. `ESC [ A`
fn describe(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            ESC => "ESC".to_string(),
            b' ' => "SPC".to_string(),
            DEL => "DEL".to_string(),
            0x00..=0x1f => format!("^{}", char::from(b + b'@')),
            0x21..=0x7e => char::from(b).to_string(),
            _ => format!("\\x{:02x}", b),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Longest prefix of `text` that fits in `width` columns
fn clip(text: &str, width: usize) -> &str {
    let mut used = 0;
    for (idx, ch) in text.char_indices() {
        used += ch.width().unwrap_or(0);
        if used > width {
            return &text[..idx];
        }
    }
    text
}

/// Two-line status area: size and key count, then the last key's bytes
struct KeyViewer {
    color: Color,
    show_size: bool,
    wrap: bool,
    poll_interval: Duration,
    keys: u64,
    last: Vec<u8>,
}

impl KeyViewer {
    fn new(config: &Config) -> Self {
        Self {
            color: config.status_color,
            show_size: config.status.show_size,
            wrap: config.status.wrap,
            poll_interval: config.poll_interval(),
            keys: 0,
            last: Vec::new(),
        }
    }

    fn enter<D: Device>(&self, tty: &mut Tty<D>) {
        if !self.wrap {
            tty.set_no_wrap();
        }
        self.draw(tty);
    }

    /// Erase the status area and leave the cursor at its start.
    fn leave<D: Device>(&self, tty: &mut Tty<D>) {
        tty.set_normal();
        tty.set_column(0);
        tty.clear_line();
        tty.newline();
        tty.clear_line();
        tty.move_up(1);
        tty.set_wrap();
        tty.flush();
    }

    fn event_loop<D: Device>(
        &mut self,
        tty: &mut Tty<D>,
        signals: &SignalFlags,
    ) -> Result<(), TtyError> {
        loop {
            if signals.termination_requested() {
                info!("Termination requested");
                return Ok(());
            }
            if signals.take_resize() {
                let (width, height) = tty.refresh_size();
                info!("Resize: {}x{}", width, height);
                self.draw(tty);
            }
            if !tty.input_ready(Some(self.poll_interval), true) {
                continue;
            }

            let bytes = read_key(tty)?;
            match classify(&bytes) {
                Action::Quit => return Ok(()),
                Action::Shell => self.run_shell(tty),
                Action::Show => self.record(bytes),
            }
            self.draw(tty);
        }
    }

    fn record(&mut self, bytes: Vec<u8>) {
        self.keys += 1;
        self.last = bytes;
    }

    fn status_text(&self, width: u16, height: u16) -> String {
        if self.show_size {
            format!(" {}x{} | keys: {} ", width, height, self.keys)
        } else {
            format!(" keys: {} ", self.keys)
        }
    }

    fn draw<D: Device>(&self, tty: &mut Tty<D>) {
        let width = usize::from(tty.width());
        let status = self.status_text(tty.width(), tty.height());

        tty.set_column(0);
        tty.clear_line();
        tty.set_foreground(self.color);
        tty.set_invert();
        tty.put_str(clip(&status, width));
        tty.set_normal();
        tty.newline();

        tty.clear_line();
        if !self.last.is_empty() {
            tty.set_underline();
            tty.put_str("last");
            tty.set_normal();
            let detail = format!(": {}", describe(&self.last));
            tty_print!(tty, "{}", clip(&detail, width.saturating_sub(4)));
        }
        tty.move_up(1);
        tty.set_column(0);
        tty.flush();
    }

    /// Hand the terminal to a shell in cooked mode, then take it back.
    fn run_shell<D: Device>(&self, tty: &mut Tty<D>) {
        self.leave(tty);
        tty.reset();

        let shell = shell_command();
        info!("Running shell: {}", shell);
        match Command::new(&shell).status() {
            Ok(status) => info!("Shell exited: {}", status),
            Err(e) => warn!("Failed to run {}: {}", shell, e),
        }

        tty.enter_raw();
        tty.refresh_size();
        if !self.wrap {
            tty.set_no_wrap();
        }
    }
}

/// Read one key press: a byte plus whatever follows it right away, so an
/// escape sequence shows up as one group.
fn read_key<D: Device>(tty: &mut Tty<D>) -> Result<Vec<u8>, TtyError> {
    let mut bytes = vec![tty.read_char()?];
    while bytes.len() < MAX_KEY_BYTES && tty.input_ready(Some(SEQUENCE_GAP), false) {
        bytes.push(tty.read_char()?);
    }
    Ok(bytes)
}

fn shell_command() -> String {
    #[cfg(windows)]
    let (var, fallback) = ("COMSPEC", "cmd.exe");
    #[cfg(not(windows))]
    let (var, fallback) = ("SHELL", "/bin/sh");

    env::var(var).unwrap_or_else(|_| fallback.to_string())
}
