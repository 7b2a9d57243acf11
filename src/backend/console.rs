//! Windows console backend
//!
//! Talks to the console through the `CONIN$` and `CONOUT$` pseudo-files so
//! it works even when stdin/stdout are redirected. Escape sequences are
//! handled by the console itself once virtual-terminal processing is on.

use std::io;
use std::time::Duration;

use windows::core::{s, PCSTR};
use windows::Win32::Foundation::{
    CloseHandle, GENERIC_READ, GENERIC_WRITE, HANDLE, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows::Win32::Storage::FileSystem::{
    CreateFileA, ReadFile, WriteFile, FILE_FLAGS_AND_ATTRIBUTES, FILE_SHARE_READ,
    FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows::Win32::System::Console::{
    GetConsoleMode, GetConsoleScreenBufferInfo, SetConsoleMode, CONSOLE_MODE,
    CONSOLE_SCREEN_BUFFER_INFO, DISABLE_NEWLINE_AUTO_RETURN, ENABLE_ECHO_INPUT,
    ENABLE_LINE_INPUT, ENABLE_PROCESSED_INPUT, ENABLE_PROCESSED_OUTPUT,
    ENABLE_VIRTUAL_TERMINAL_INPUT, ENABLE_VIRTUAL_TERMINAL_PROCESSING,
};
use windows::Win32::System::Threading::{WaitForSingleObject, INFINITE};

use crate::core::device::Device;
use crate::core::error::{Result, TtyError};

/// Accepted for symmetry with the POSIX backend; the console is always
/// reached through `CONIN$`/`CONOUT$`.
pub const DEFAULT_DEVICE: &str = "CON";

/// Input and output console modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleModes {
    input: CONSOLE_MODE,
    output: CONSOLE_MODE,
}

/// Raw input: no line editing, echo or Ctrl+C processing; VT input.
/// Raw output: VT processing, and LF without an implied CR.
fn raw_modes(original: ConsoleModes) -> ConsoleModes {
    let input = (original.input.0
        & !(ENABLE_PROCESSED_INPUT.0 | ENABLE_LINE_INPUT.0 | ENABLE_ECHO_INPUT.0))
        | ENABLE_VIRTUAL_TERMINAL_INPUT.0;
    let output = original.output.0
        | ENABLE_PROCESSED_OUTPUT.0
        | ENABLE_VIRTUAL_TERMINAL_PROCESSING.0
        | DISABLE_NEWLINE_AUTO_RETURN.0;

    ConsoleModes {
        input: CONSOLE_MODE(input),
        output: CONSOLE_MODE(output),
    }
}

/// The attached console.
#[derive(Debug)]
pub struct ConsoleDevice {
    hin: HANDLE,
    hout: HANDLE,
}

impl ConsoleDevice {
    /// Open the console input and output buffers. `path` is ignored.
    pub fn open(path: &str) -> Result<Self> {
        let hin = open_console(s!("CONIN$"), "CONIN$", path)?;
        let hout = match open_console(s!("CONOUT$"), "CONOUT$", path) {
            Ok(handle) => handle,
            Err(e) => {
                unsafe {
                    let _ = CloseHandle(hin);
                }
                return Err(e);
            }
        };
        Ok(Self { hin, hout })
    }
}

fn open_console(file: PCSTR, name: &str, path: &str) -> Result<HANDLE> {
    unsafe {
        CreateFileA(
            file,
            (GENERIC_READ | GENERIC_WRITE).0,
            FILE_SHARE_READ | FILE_SHARE_WRITE,
            None,
            OPEN_EXISTING,
            FILE_FLAGS_AND_ATTRIBUTES(0),
            HANDLE::default(),
        )
    }
    .map_err(|e| TtyError::DeviceUnavailable {
        path: format!("{name} ({path})"),
        source: e.into(),
    })
}

impl Device for ConsoleDevice {
    type Mode = ConsoleModes;

    fn capture_mode(&mut self) -> io::Result<ConsoleModes> {
        let mut input = CONSOLE_MODE::default();
        let mut output = CONSOLE_MODE::default();
        unsafe {
            GetConsoleMode(self.hin, &mut input)?;
            GetConsoleMode(self.hout, &mut output)?;
        }
        Ok(ConsoleModes { input, output })
    }

    fn raw_mode(&self, original: &ConsoleModes) -> ConsoleModes {
        raw_modes(*original)
    }

    fn apply_mode(&mut self, mode: &ConsoleModes) -> io::Result<()> {
        // Try both handles even if the first one fails.
        let input = unsafe { SetConsoleMode(self.hin, mode.input) };
        let output = unsafe { SetConsoleMode(self.hout, mode.output) };
        input?;
        output?;
        Ok(())
    }

    fn window_size(&mut self) -> io::Result<(u16, u16)> {
        let mut info = CONSOLE_SCREEN_BUFFER_INFO::default();
        unsafe {
            GetConsoleScreenBufferInfo(self.hout, &mut info)?;
        }
        let window = info.srWindow;
        let width = i32::from(window.Right) - i32::from(window.Left) + 1;
        let height = i32::from(window.Bottom) - i32::from(window.Top) + 1;
        Ok((
            u16::try_from(width).unwrap_or(0),
            u16::try_from(height).unwrap_or(0),
        ))
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        let mut read: u32 = 0;
        unsafe {
            ReadFile(self.hin, Some(&mut byte[..]), Some(&mut read), None)?;
        }
        Ok((read > 0).then_some(byte[0]))
    }

    // Console waits are not cut short by signals, so this never reports
    // `Interrupted`. Any pending console event (focus, key-up) counts as ready.
    fn wait_input(&mut self, timeout: Option<Duration>) -> io::Result<bool> {
        let millis = match timeout {
            Some(t) => u32::try_from(t.as_millis()).unwrap_or(INFINITE - 1),
            None => INFINITE,
        };
        let result = unsafe { WaitForSingleObject(self.hin, millis) };
        if result == WAIT_OBJECT_0 {
            Ok(true)
        } else if result == WAIT_TIMEOUT {
            Ok(false)
        } else {
            Err(io::Error::last_os_error())
        }
    }

    fn write_all(&mut self, mut bytes: &[u8]) -> io::Result<()> {
        while !bytes.is_empty() {
            let mut written: u32 = 0;
            unsafe {
                WriteFile(self.hout, Some(bytes), Some(&mut written), None)?;
            }
            if written == 0 {
                return Err(io::ErrorKind::WriteZero.into());
            }
            bytes = &bytes[written as usize..];
        }
        Ok(())
    }

    // Console writes are unbuffered.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.hin);
            let _ = CloseHandle(self.hout);
        }
    }
}
