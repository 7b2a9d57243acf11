//! ttyctl - raw-mode terminal sessions
//!
//! Puts an interactive terminal into raw mode, reads single bytes of input,
//! writes styled and positioned output with ANSI/VT sequences, and puts the
//! terminal back the way it was when the session ends.
//!
//! # Backends
//!
//! - **POSIX**: termios on a device node (`/dev/tty` by default)
//! - **Windows**: console API on `CONIN$`/`CONOUT$`
//! - **Mock**: in-memory device for tests
//!
//! # Example
//!
//! ```no_run
//! use ttyctl::{Color, Terminal};
//!
//! # fn main() -> Result<(), ttyctl::TtyError> {
//! let mut tty = Terminal::open(ttyctl::backend::DEFAULT_DEVICE)?;
//! tty.set_foreground(Color::Green);
//! ttyctl::tty_print!(tty, "{} columns", tty.width());
//! tty.set_normal();
//! tty.newline();
//! tty.flush();
//! let key = tty.read_char()?;
//! tty.close();
//! # let _ = key;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod core;
pub mod signals;

pub use crate::core::device::{Color, Device};
pub use crate::core::error::{Result, TtyError};
pub use crate::core::sequence::ControlSequence;
pub use crate::core::session::{Tty, FALLBACK_SIZE, FORMAT_BUFFER_CAPACITY};

#[cfg(any(unix, windows))]
pub use crate::backend::Terminal;
