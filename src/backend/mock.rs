//! In-memory terminal for tests.
//!
//! The device state lives behind an `Arc<Mutex<_>>` so a test keeps a
//! [`MockHandle`] after the device has been moved into a session and can
//! still inspect mode history, output and release after `close`.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bitflags::bitflags;

use crate::core::device::Device;

bitflags! {
    /// Mode bits of the fake terminal.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct MockMode: u16 {
        const CANONICAL     = 0b0000_0001;
        const ECHO          = 0b0000_0010;
        const SIGNALS       = 0b0000_0100;
        const CR_TO_NL      = 0b0000_1000;
        const VT_INPUT      = 0b0001_0000;
        const VT_OUTPUT     = 0b0010_0000;
    }
}

impl MockMode {
    /// Typical cooked terminal.
    pub fn cooked() -> Self {
        MockMode::CANONICAL | MockMode::ECHO | MockMode::SIGNALS | MockMode::CR_TO_NL
    }
}

/// Everything the fake terminal records or replays.
#[derive(Debug)]
pub struct MockState {
    /// Mode currently in effect.
    pub mode: MockMode,
    /// Every mode applied, in order.
    pub applied: Vec<MockMode>,
    /// Bytes written and flushed.
    pub output: Vec<u8>,
    /// Bytes written but not yet flushed.
    pub pending: Vec<u8>,
    /// Scripted input; reads past the end report end of input.
    pub input: VecDeque<u8>,
    /// Scripted geometry; `None` makes the query fail.
    pub size: Option<(u16, u16)>,
    /// Interrupts to deliver to the next input waits.
    pub interrupts: usize,
    pub fail_capture: bool,
    pub fail_apply: bool,
    pub fail_write: bool,
    pub fail_read: bool,
    /// Set when the device is dropped.
    pub released: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            mode: MockMode::cooked(),
            applied: Vec::new(),
            output: Vec::new(),
            pending: Vec::new(),
            input: VecDeque::new(),
            size: Some((80, 24)),
            interrupts: 0,
            fail_capture: false,
            fail_apply: false,
            fail_write: false,
            fail_read: false,
            released: false,
        }
    }
}

/// Test-side view of a [`MockDevice`].
#[derive(Clone, Debug)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        // A poisoned lock only means another test assertion panicked.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Flushed output so far.
    pub fn output(&self) -> Vec<u8> {
        self.state().output.clone()
    }

    /// Drain flushed output.
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut self.state().output)
    }

    pub fn push_input(&self, bytes: &[u8]) {
        self.state().input.extend(bytes.iter().copied());
    }

    pub fn mode(&self) -> MockMode {
        self.state().mode
    }

    pub fn released(&self) -> bool {
        self.state().released
    }
}

/// Fake terminal device.
#[derive(Debug)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    /// Create a device in cooked mode and the handle that observes it.
    pub fn pair() -> (Self, MockHandle) {
        Self::with_state(MockState::default())
    }

    pub fn with_state(state: MockState) -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(state));
        (
            Self {
                state: state.clone(),
            },
            MockHandle { state },
        )
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Device for MockDevice {
    type Mode = MockMode;

    fn capture_mode(&mut self) -> io::Result<MockMode> {
        let state = self.state();
        if state.fail_capture {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "not a terminal"));
        }
        Ok(state.mode)
    }

    fn raw_mode(&self, original: &MockMode) -> MockMode {
        let mut raw = *original;
        raw.remove(MockMode::CANONICAL | MockMode::ECHO | MockMode::SIGNALS | MockMode::CR_TO_NL);
        raw.insert(MockMode::VT_INPUT | MockMode::VT_OUTPUT);
        raw
    }

    fn apply_mode(&mut self, mode: &MockMode) -> io::Result<()> {
        let mut state = self.state();
        if state.fail_apply {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "mode locked"));
        }
        state.mode = *mode;
        state.applied.push(*mode);
        Ok(())
    }

    fn window_size(&mut self) -> io::Result<(u16, u16)> {
        self.state()
            .size
            .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "no geometry"))
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut state = self.state();
        if state.fail_read {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device gone"));
        }
        Ok(state.input.pop_front())
    }

    fn wait_input(&mut self, _timeout: Option<Duration>) -> io::Result<bool> {
        let mut state = self.state();
        if state.interrupts > 0 {
            state.interrupts -= 1;
            return Err(io::ErrorKind::Interrupted.into());
        }
        Ok(!state.input.is_empty())
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.state();
        if state.fail_write {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device gone"));
        }
        state.pending.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.state();
        let pending = std::mem::take(&mut state.pending);
        state.output.extend_from_slice(&pending);
        Ok(())
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.state().released = true;
    }
}
