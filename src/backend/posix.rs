//! POSIX terminal driver backend.
//!
//! Opens the terminal device by path, once for reading and once for
//! buffered writing, and drives it through rustix's termios API.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::time::Duration;

use rustix::event::{poll, PollFd, PollFlags, Timespec};
use rustix::io::Errno;
use rustix::termios::{
    self, InputModes, LocalModes, OptionalActions, OutputModes, SpecialCodeIndex, Termios,
};

use crate::core::device::Device;
use crate::core::error::{Result, TtyError};

/// Controlling terminal of the process.
pub const DEFAULT_DEVICE: &str = "/dev/tty";

const OUTPUT_BUFFER_SIZE: usize = 4096;

/// A terminal opened through its device node.
#[derive(Debug)]
pub struct PosixDevice {
    input: File,
    output: BufWriter<File>,
}

impl PosixDevice {
    /// Open `path` for input and output.
    pub fn open(path: &str) -> Result<Self> {
        let unavailable = |source| TtyError::DeviceUnavailable {
            path: path.to_string(),
            source,
        };
        let input = OpenOptions::new().read(true).open(path).map_err(unavailable)?;
        let output = OpenOptions::new().write(true).open(path).map_err(unavailable)?;

        Ok(Self {
            input,
            output: BufWriter::with_capacity(OUTPUT_BUFFER_SIZE, output),
        })
    }
}

impl Device for PosixDevice {
    type Mode = Termios;

    fn capture_mode(&mut self) -> io::Result<Termios> {
        Ok(termios::tcgetattr(&self.input)?)
    }

    fn raw_mode(&self, original: &Termios) -> Termios {
        let mut raw = original.clone();
        raw.input_modes.remove(InputModes::ICRNL);
        // No ONLCR: newline() already writes CRLF.
        raw.output_modes.remove(OutputModes::OPOST);
        raw.local_modes
            .remove(LocalModes::ICANON | LocalModes::ECHO | LocalModes::ISIG);
        raw.special_codes[SpecialCodeIndex::VMIN] = 1;
        raw.special_codes[SpecialCodeIndex::VTIME] = 0;
        raw
    }

    // Both handles refer to the same device, so one tcsetattr covers them.
    fn apply_mode(&mut self, mode: &Termios) -> io::Result<()> {
        Ok(termios::tcsetattr(&self.input, OptionalActions::Now, mode)?)
    }

    fn window_size(&mut self) -> io::Result<(u16, u16)> {
        let ws = termios::tcgetwinsize(self.output.get_ref())?;
        Ok((ws.ws_col, ws.ws_row))
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.input.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn wait_input(&mut self, timeout: Option<Duration>) -> io::Result<bool> {
        let timespec = timeout.map(|t| Timespec {
            tv_sec: i64::try_from(t.as_secs()).unwrap_or(i64::MAX),
            tv_nsec: t.subsec_nanos() as _,
        });
        let mut fds = [PollFd::new(&self.input, PollFlags::IN)];
        match poll(&mut fds, timespec.as_ref()) {
            Ok(0) => Ok(false),
            Ok(_) => Ok(!fds[0].revents().is_empty()),
            Err(e) if e == Errno::INTR => Err(io::ErrorKind::Interrupted.into()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.output.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }
}
