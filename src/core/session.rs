//! Terminal session
//!
//! Owns a [`Device`], the mode it had when the session opened, the tracked
//! foreground color and the last queried geometry. The original mode is put
//! back when the session is closed or dropped.

use std::fmt;
use std::io;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::device::{Color, Device};
use super::error::{Result, TtyError};
use super::sequence::{ControlSequence, SGR_INVERT, SGR_NORMAL, SGR_UNDERLINE};

/// Largest rendering [`Tty::print`] writes in one call; the rest is dropped.
pub const FORMAT_BUFFER_CAPACITY: usize = 1024;

/// Geometry reported when the device cannot tell.
pub const FALLBACK_SIZE: (u16, u16) = (80, 25);

/// Write formatted output to a [`Tty`], `print!`-style.
///
/// ```ignore
/// tty_print!(tty, "{} matches", count);
/// ```
#[macro_export]
macro_rules! tty_print {
    ($tty:expr, $($arg:tt)*) => {
        $tty.print(::std::format_args!($($arg)*))
    };
}

/// A terminal in raw mode.
pub struct Tty<D: Device> {
    device: D,
    /// Captured once at open, applied by reset and close.
    original_mode: D::Mode,
    raw_mode: D::Mode,
    /// Last color emitted by `set_foreground`; `None` after `set_normal`.
    fg_color: Option<Color>,
    width: u16,
    height: u16,
    closed: bool,
}

impl<D: Device> Tty<D> {
    /// Take control of `device`: snapshot its mode, switch to raw mode and
    /// query its geometry.
    ///
    /// Only a failed mode snapshot is fatal. If the raw mode cannot be
    /// applied the session still opens in whatever mode the device is in.
    pub fn with_device(mut device: D) -> Result<Self> {
        let original_mode = device.capture_mode().map_err(TtyError::ModeQueryFailed)?;
        let raw_mode = device.raw_mode(&original_mode);

        let mut tty = Self {
            device,
            original_mode,
            raw_mode,
            fg_color: None,
            width: FALLBACK_SIZE.0,
            height: FALLBACK_SIZE.1,
            closed: false,
        };

        tty.enter_raw();
        tty.refresh_size();
        tty.set_normal();

        info!("Terminal session opened ({}x{})", tty.width, tty.height);
        Ok(tty)
    }

    /// Restore the original mode and release the device.
    pub fn close(mut self) {
        self.shutdown();
    }

    /// Give the terminal back its original mode but keep the handles, e.g.
    /// while a child process owns the terminal. Use [`Tty::enter_raw`] to
    /// come back.
    pub fn reset(&mut self) {
        self.flush();
        if let Err(e) = self.device.apply_mode(&self.original_mode) {
            warn!("Failed to restore terminal mode: {}", e);
        }
    }

    /// Apply the raw mode derived at open.
    pub fn enter_raw(&mut self) {
        if let Err(e) = self.device.apply_mode(&self.raw_mode) {
            warn!("Failed to set raw terminal mode: {}", e);
        }
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.reset();
        debug!("Terminal session closed");
    }

    /// Query the live geometry and cache it. Falls back to 80x25 when the
    /// device cannot report a usable size.
    pub fn refresh_size(&mut self) -> (u16, u16) {
        let (width, height) = match self.device.window_size() {
            Ok((width, height)) if width > 0 && height > 0 => (width, height),
            Ok((width, height)) => {
                debug!("Terminal reported {}x{}, using fallback size", width, height);
                FALLBACK_SIZE
            }
            Err(e) => {
                debug!("Failed to query terminal size: {}", e);
                FALLBACK_SIZE
            }
        };
        self.width = width;
        self.height = height;
        (width, height)
    }

    /// Cached width from the last [`Tty::refresh_size`].
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Cached height from the last [`Tty::refresh_size`].
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Cached `(width, height)`.
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Currently tracked foreground color.
    pub fn foreground(&self) -> Option<Color> {
        self.fg_color
    }

    /// Block until one byte of input arrives.
    ///
    /// Escape sequences come through one byte at a time. End of input is
    /// reported as [`TtyError::EndOfInput`] and left to the caller.
    pub fn read_char(&mut self) -> Result<u8> {
        match self.device.read_byte() {
            Ok(Some(byte)) => Ok(byte),
            Ok(None) => Err(TtyError::EndOfInput),
            Err(e) => Err(TtyError::Read(e)),
        }
    }

    /// Whether [`Tty::read_char`] would return within `timeout` (`None` waits
    /// indefinitely). Never consumes input.
    ///
    /// With `interruptible`, a signal arriving during the wait ends it and
    /// counts as not ready; otherwise the wait resumes for the time left.
    pub fn input_ready(&mut self, timeout: Option<Duration>, interruptible: bool) -> bool {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        loop {
            let remaining = match (timeout, deadline) {
                (Some(_), Some(deadline)) => {
                    Some(deadline.saturating_duration_since(Instant::now()))
                }
                _ => None,
            };
            match self.device.wait_input(remaining) {
                Ok(ready) => return ready,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    if interruptible {
                        return false;
                    }
                }
                Err(e) => {
                    warn!("Failed to poll terminal input: {}", e);
                    return false;
                }
            }
        }
    }

    /// Write bytes verbatim. Failures are logged, not returned.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        if let Err(e) = self.device.write_all(bytes) {
            debug!("Failed to write to terminal: {}", e);
        }
    }

    /// Write a string verbatim.
    pub fn put_str(&mut self, s: &str) {
        self.write_raw(s.as_bytes());
    }

    /// Write one character, UTF-8 encoded.
    pub fn put_char(&mut self, ch: char) {
        let mut buf = [0u8; 4];
        self.write_raw(ch.encode_utf8(&mut buf).as_bytes());
    }

    /// Render `args` into a [`FORMAT_BUFFER_CAPACITY`]-byte buffer and write
    /// it. Anything past the capacity is silently dropped.
    pub fn print(&mut self, args: fmt::Arguments<'_>) {
        let mut buf = FormatBuffer::new();
        // FormatBuffer never fails; a Display impl error just ends the render early.
        let _ = fmt::write(&mut buf, args);
        self.write_raw(buf.as_bytes());
    }

    pub fn flush(&mut self) {
        if let Err(e) = self.device.flush() {
            debug!("Failed to flush terminal output: {}", e);
        }
    }

    fn emit(&mut self, seq: ControlSequence) {
        self.print(format_args!("{seq}"));
    }

    /// Set the foreground color, skipping the write if it is already active.
    pub fn set_foreground(&mut self, color: Color) {
        if self.fg_color != Some(color) {
            self.emit(ControlSequence::Sgr(color.foreground_code()));
            self.fg_color = Some(color);
        }
    }

    pub fn set_invert(&mut self) {
        self.emit(ControlSequence::Sgr(SGR_INVERT));
    }

    pub fn set_underline(&mut self) {
        self.emit(ControlSequence::Sgr(SGR_UNDERLINE));
    }

    /// Reset every attribute. The next `set_foreground` always writes.
    pub fn set_normal(&mut self) {
        self.emit(ControlSequence::Sgr(SGR_NORMAL));
        self.fg_color = None;
    }

    pub fn set_no_wrap(&mut self) {
        self.emit(ControlSequence::NoWrap);
    }

    pub fn set_wrap(&mut self) {
        self.emit(ControlSequence::Wrap);
    }

    /// CR LF; raw mode does not add the carriage return for us.
    pub fn newline(&mut self) {
        self.write_raw(b"\r\n");
    }

    pub fn clear_line(&mut self) {
        self.emit(ControlSequence::ClearLine);
    }

    /// Move to 0-based column `col`.
    pub fn set_column(&mut self, col: u16) {
        self.emit(ControlSequence::Column(col));
    }

    pub fn move_up(&mut self, rows: u16) {
        self.emit(ControlSequence::Up(rows));
    }
}

impl<D: Device> Drop for Tty<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<D: Device> fmt::Debug for Tty<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tty")
            .field("fg_color", &self.fg_color)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Fixed-size stack buffer that keeps the first bytes written to it.
struct FormatBuffer {
    bytes: [u8; FORMAT_BUFFER_CAPACITY],
    len: usize,
}

impl FormatBuffer {
    fn new() -> Self {
        Self {
            bytes: [0; FORMAT_BUFFER_CAPACITY],
            len: 0,
        }
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl fmt::Write for FormatBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let n = s.len().min(FORMAT_BUFFER_CAPACITY - self.len);
        self.bytes[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockDevice, MockHandle, MockMode, MockState};

    fn open() -> (Tty<MockDevice>, MockHandle) {
        let (device, handle) = MockDevice::pair();
        let mut tty = Tty::with_device(device).unwrap();
        tty.flush();
        handle.take_output();
        (tty, handle)
    }

    fn written(tty: &mut Tty<MockDevice>, handle: &MockHandle) -> Vec<u8> {
        tty.flush();
        handle.take_output()
    }

    #[test]
    fn test_open_enters_raw_mode() {
        let (device, handle) = MockDevice::pair();
        let mut tty = Tty::with_device(device).unwrap();

        let mode = handle.mode();
        assert!(!mode.contains(MockMode::CANONICAL));
        assert!(!mode.contains(MockMode::ECHO));
        assert!(mode.contains(MockMode::VT_INPUT | MockMode::VT_OUTPUT));
        assert_eq!(tty.size(), (80, 24));
        assert_eq!(tty.foreground(), None);

        // Opening resets attributes once.
        assert_eq!(written(&mut tty, &handle), b"\x1b[0m".to_vec());
    }

    #[test]
    fn test_close_restores_original_mode() {
        let (tty, handle) = open();
        assert_ne!(handle.mode(), MockMode::cooked());

        tty.close();
        assert_eq!(handle.mode(), MockMode::cooked());
        assert!(handle.released());
    }

    #[test]
    fn test_close_restores_after_many_transitions() {
        let (mut tty, handle) = open();
        tty.reset();
        tty.enter_raw();
        tty.reset();
        tty.reset();
        tty.enter_raw();
        tty.set_foreground(Color::Red);
        tty.close();

        let state = handle.state();
        assert_eq!(state.mode, MockMode::cooked());
        assert_eq!(state.applied.last(), Some(&MockMode::cooked()));
        assert!(state.released);
    }

    #[test]
    fn test_drop_restores_original_mode() {
        let (device, handle) = MockDevice::pair();
        {
            let _tty = Tty::with_device(device).unwrap();
            assert_ne!(handle.mode(), MockMode::cooked());
        }
        assert_eq!(handle.mode(), MockMode::cooked());
        assert!(handle.released());
    }

    #[test]
    fn test_close_restores_exactly_once() {
        let (tty, handle) = open();
        let before = handle.state().applied.len();
        tty.close();
        assert_eq!(handle.state().applied.len(), before + 1);
    }

    #[test]
    fn test_close_flushes_pending_output() {
        let (mut tty, handle) = open();
        tty.put_str("bye");
        tty.close();
        assert_eq!(handle.output(), b"bye".to_vec());
    }

    #[test]
    fn test_close_releases_even_if_restore_fails() {
        let (tty, handle) = open();
        handle.state().fail_apply = true;
        tty.close();
        assert!(handle.released());
    }

    #[test]
    fn test_open_fails_when_mode_unreadable() {
        let (device, handle) = MockDevice::with_state(MockState {
            fail_capture: true,
            ..MockState::default()
        });
        let result = Tty::with_device(device);
        assert!(matches!(result, Err(TtyError::ModeQueryFailed(_))));
        assert!(handle.state().applied.is_empty());
        assert!(handle.released());
    }

    #[test]
    fn test_open_survives_raw_mode_failure() {
        let (device, handle) = MockDevice::with_state(MockState {
            fail_apply: true,
            ..MockState::default()
        });
        let tty = Tty::with_device(device).unwrap();
        assert_eq!(handle.mode(), MockMode::cooked());
        tty.close();
        assert!(handle.released());
    }

    #[test]
    fn test_reset_keeps_session_usable() {
        let (mut tty, handle) = open();
        tty.reset();
        tty.reset();
        assert_eq!(handle.mode(), MockMode::cooked());
        assert!(!handle.released());

        tty.enter_raw();
        assert!(!handle.mode().contains(MockMode::ECHO));
        tty.put_str("x");
        assert_eq!(written(&mut tty, &handle), b"x".to_vec());
    }

    #[test]
    fn test_foreground_suppression() {
        let (mut tty, handle) = open();
        tty.set_foreground(Color::Red);
        tty.set_foreground(Color::Red);
        assert_eq!(written(&mut tty, &handle), b"\x1b[31m".to_vec());

        tty.set_foreground(Color::Blue);
        tty.set_foreground(Color::Green);
        assert_eq!(written(&mut tty, &handle), b"\x1b[34m\x1b[32m".to_vec());
        assert_eq!(tty.foreground(), Some(Color::Green));
    }

    #[test]
    fn test_first_foreground_is_never_suppressed() {
        let (mut tty, handle) = open();
        tty.set_foreground(Color::Default);
        assert_eq!(written(&mut tty, &handle), b"\x1b[39m".to_vec());
    }

    #[test]
    fn test_set_normal_resets_color_tracking() {
        let (mut tty, handle) = open();
        tty.set_foreground(Color::Green);
        tty.set_normal();
        tty.set_foreground(Color::Green);
        assert_eq!(
            written(&mut tty, &handle),
            b"\x1b[32m\x1b[0m\x1b[32m".to_vec()
        );
    }

    #[test]
    fn test_attributes_do_not_touch_color_tracking() {
        let (mut tty, handle) = open();
        tty.set_foreground(Color::Red);
        tty.set_invert();
        tty.set_underline();
        tty.set_foreground(Color::Red);
        assert_eq!(
            written(&mut tty, &handle),
            b"\x1b[31m\x1b[7m\x1b[4m".to_vec()
        );
    }

    #[test]
    fn test_newline_is_crlf() {
        let (mut tty, handle) = open();
        tty.newline();
        assert_eq!(written(&mut tty, &handle), b"\r\n".to_vec());
    }

    #[test]
    fn test_control_sequences() {
        let (mut tty, handle) = open();

        tty.set_column(5);
        assert_eq!(written(&mut tty, &handle), b"\x1b[6G".to_vec());
        tty.move_up(3);
        assert_eq!(written(&mut tty, &handle), b"\x1b[3A".to_vec());
        tty.clear_line();
        assert_eq!(written(&mut tty, &handle), b"\x1b[K".to_vec());
        tty.set_normal();
        assert_eq!(written(&mut tty, &handle), b"\x1b[0m".to_vec());
        tty.set_no_wrap();
        tty.set_wrap();
        assert_eq!(written(&mut tty, &handle), b"\x1b[?7l\x1b[?7h".to_vec());
    }

    #[test]
    fn test_output_waits_for_flush() {
        let (mut tty, handle) = open();
        tty.put_char('é');
        assert!(handle.output().is_empty());
        tty.flush();
        assert_eq!(handle.output(), "é".as_bytes().to_vec());
    }

    #[test]
    fn test_geometry_fallback() {
        let (mut tty, handle) = open();
        handle.state().size = None;
        assert_eq!(tty.refresh_size(), (80, 25));
        assert_eq!((tty.width(), tty.height()), (80, 25));

        handle.state().size = Some((0, 0));
        assert_eq!(tty.refresh_size(), (80, 25));
    }

    #[test]
    fn test_geometry_is_a_snapshot() {
        let (mut tty, handle) = open();
        handle.state().size = Some((132, 43));
        assert_eq!(tty.size(), (80, 24));
        assert_eq!(tty.refresh_size(), (132, 43));
        assert_eq!(tty.size(), (132, 43));
    }

    #[test]
    fn test_open_with_unknown_geometry() {
        let (device, _handle) = MockDevice::with_state(MockState {
            size: None,
            ..MockState::default()
        });
        let tty = Tty::with_device(device).unwrap();
        assert_eq!(tty.size(), FALLBACK_SIZE);
    }

    #[test]
    fn test_read_char_passes_bytes_through() {
        let (mut tty, handle) = open();
        handle.push_input(b"\x1b[A");
        assert_eq!(tty.read_char().unwrap(), 0x1b);
        assert_eq!(tty.read_char().unwrap(), b'[');
        assert_eq!(tty.read_char().unwrap(), b'A');
    }

    #[test]
    fn test_read_char_end_of_input() {
        let (mut tty, _handle) = open();
        assert!(matches!(tty.read_char(), Err(TtyError::EndOfInput)));
    }

    #[test]
    fn test_read_char_error() {
        let (mut tty, handle) = open();
        handle.state().fail_read = true;
        assert!(matches!(tty.read_char(), Err(TtyError::Read(_))));
    }

    #[test]
    fn test_input_ready_does_not_consume() {
        let (mut tty, handle) = open();
        assert!(!tty.input_ready(Some(Duration::ZERO), false));

        handle.push_input(b"ab");
        for _ in 0..5 {
            assert!(tty.input_ready(Some(Duration::from_millis(10)), true));
        }
        assert_eq!(tty.read_char().unwrap(), b'a');
        assert!(tty.input_ready(None, false));
        assert_eq!(tty.read_char().unwrap(), b'b');
        assert!(!tty.input_ready(Some(Duration::ZERO), false));
    }

    #[test]
    fn test_input_ready_interruptible() {
        let (mut tty, handle) = open();
        handle.push_input(b"k");
        handle.state().interrupts = 1;

        assert!(!tty.input_ready(Some(Duration::from_millis(100)), true));
        assert!(tty.input_ready(Some(Duration::from_millis(100)), true));
        assert_eq!(tty.read_char().unwrap(), b'k');
    }

    #[test]
    fn test_input_ready_retries_when_not_interruptible() {
        let (mut tty, handle) = open();
        handle.push_input(b"k");
        handle.state().interrupts = 3;

        assert!(tty.input_ready(Some(Duration::from_millis(100)), false));
        assert_eq!(handle.state().interrupts, 0);
    }

    #[test]
    fn test_print_formats() {
        let (mut tty, handle) = open();
        tty_print!(tty, "{} of {}", 3, 10);
        assert_eq!(written(&mut tty, &handle), b"3 of 10".to_vec());
    }

    #[test]
    fn test_print_truncates_to_capacity() {
        let (mut tty, handle) = open();
        let long = "x".repeat(FORMAT_BUFFER_CAPACITY + 500);
        tty_print!(tty, "> {}", long);

        let out = written(&mut tty, &handle);
        assert_eq!(out.len(), FORMAT_BUFFER_CAPACITY);
        assert_eq!(&out[..2], b"> ");
        assert!(out[2..].iter().all(|&b| b == b'x'));
    }

    #[test]
    fn test_write_failures_are_absorbed() {
        let (mut tty, handle) = open();
        handle.state().fail_write = true;
        tty.set_foreground(Color::Red);
        tty.newline();
        tty_print!(tty, "lost");
        tty.flush();
        assert!(handle.output().is_empty());
        // Color tracking follows the setter even if the device dropped the bytes.
        assert_eq!(tty.foreground(), Some(Color::Red));
    }
}
