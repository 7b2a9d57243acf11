//! Resize and termination notifications.
//!
//! The session never listens for signals. An application that wants to
//! react to them installs [`SignalFlags`], waits for input with
//! `input_ready(.., true)` so a signal ends the wait, and then checks the
//! flags: re-query geometry after a resize, close the session on
//! termination.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(unix)]
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM, SIGWINCH};
#[cfg(unix)]
use signal_hook::SigId;

/// Flags set from signal handlers and read by the application loop.
#[derive(Debug)]
pub struct SignalFlags {
    resized: Arc<AtomicBool>,
    terminate: Arc<AtomicBool>,
    #[cfg(unix)]
    ids: Vec<SigId>,
}

impl SignalFlags {
    /// Register for window-size changes and termination requests.
    ///
    /// On Windows there is nothing to register and the flags never fire.
    pub fn install() -> io::Result<Self> {
        #[cfg_attr(not(unix), allow(unused_mut))]
        let mut flags = Self {
            resized: Arc::new(AtomicBool::new(false)),
            terminate: Arc::new(AtomicBool::new(false)),
            #[cfg(unix)]
            ids: Vec::new(),
        };

        #[cfg(unix)]
        {
            flags
                .ids
                .push(signal_hook::flag::register(SIGWINCH, flags.resized.clone())?);
            for signal in [SIGTERM, SIGHUP, SIGINT] {
                flags
                    .ids
                    .push(signal_hook::flag::register(signal, flags.terminate.clone())?);
            }
        }

        Ok(flags)
    }

    /// Whether the window changed size since the last call.
    pub fn take_resize(&self) -> bool {
        self.resized.swap(false, Ordering::SeqCst)
    }

    pub fn termination_requested(&self) -> bool {
        self.terminate.load(Ordering::SeqCst)
    }
}

#[cfg(unix)]
impl Drop for SignalFlags {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Signal disposition is process-wide.
    static LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_resize_flag() {
        let _guard = LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let flags = SignalFlags::install().unwrap();
        assert!(!flags.take_resize());

        signal_hook::low_level::raise(SIGWINCH).unwrap();
        assert!(flags.take_resize());
        assert!(!flags.take_resize());
        assert!(!flags.termination_requested());
    }

    #[test]
    fn test_termination_flag() {
        let _guard = LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let flags = SignalFlags::install().unwrap();

        signal_hook::low_level::raise(SIGHUP).unwrap();
        assert!(flags.termination_requested());
        // Stays set.
        assert!(flags.termination_requested());
    }
}
