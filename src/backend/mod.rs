//! Terminal backends.
//!
//! - **posix**: termios driver on a device node such as `/dev/tty`
//! - **console**: Windows console API through `CONIN$`/`CONOUT$`
//! - **mock**: in-memory device for tests
//!
//! [`NativeDevice`] is whichever of the first two the target supports.

pub mod mock;

#[cfg(unix)]
pub mod posix;

#[cfg(windows)]
pub mod console;

#[cfg(unix)]
pub use posix::{PosixDevice as NativeDevice, DEFAULT_DEVICE};

#[cfg(windows)]
pub use console::{ConsoleDevice as NativeDevice, DEFAULT_DEVICE};

#[cfg(any(unix, windows))]
use crate::core::{error::Result, session::Tty};

/// Session on the platform's own terminal.
#[cfg(any(unix, windows))]
pub type Terminal = Tty<NativeDevice>;

#[cfg(any(unix, windows))]
impl Tty<NativeDevice> {
    /// Open the terminal at `path` (ignored on Windows) and put it in raw mode.
    pub fn open(path: &str) -> Result<Self> {
        Self::with_device(NativeDevice::open(path)?)
    }
}
