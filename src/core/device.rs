//! Backend seam between the portable session and a platform terminal.
//!
//! A [`Device`] owns the input and output handles of one terminal and knows
//! how to snapshot, derive and apply its mode. The mode type is opaque to
//! everything outside the backend.

use std::io;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::sequence::SGR_FOREGROUND;

/// Platform terminal behind a [`Tty`](super::session::Tty).
///
/// Handles are released when the device is dropped.
pub trait Device {
    /// Snapshot of the terminal mode.
    type Mode: Clone;

    /// Read the mode currently in effect.
    fn capture_mode(&mut self) -> io::Result<Self::Mode>;

    /// Derive the raw mode from `original` without touching the device.
    fn raw_mode(&self, original: &Self::Mode) -> Self::Mode;

    /// Apply `mode` to both handles.
    fn apply_mode(&mut self, mode: &Self::Mode) -> io::Result<()>;

    /// Live geometry as (width, height) in cells.
    fn window_size(&mut self) -> io::Result<(u16, u16)>;

    /// Block for one byte of input. `Ok(None)` means end of input.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Wait until input is readable, at most `timeout` (`None` waits forever).
    ///
    /// Must not consume input. A wait cut short by a signal reports
    /// `ErrorKind::Interrupted`.
    fn wait_input(&mut self, timeout: Option<Duration>) -> io::Result<bool>;

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

/// The eight ANSI foreground colors plus the terminal default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    Default,
}

impl Color {
    /// Color index as used by SGR 30..=39.
    pub fn index(self) -> u8 {
        match self {
            Color::Black => 0,
            Color::Red => 1,
            Color::Green => 2,
            Color::Yellow => 3,
            Color::Blue => 4,
            Color::Magenta => 5,
            Color::Cyan => 6,
            Color::White => 7,
            Color::Default => 9,
        }
    }

    /// Look up a color by index; 8 is not a color.
    pub fn from_index(index: u8) -> Option<Self> {
        Some(match index {
            0 => Color::Black,
            1 => Color::Red,
            2 => Color::Green,
            3 => Color::Yellow,
            4 => Color::Blue,
            5 => Color::Magenta,
            6 => Color::Cyan,
            7 => Color::White,
            9 => Color::Default,
            _ => return None,
        })
    }

    /// SGR parameter selecting this color as foreground.
    pub fn foreground_code(self) -> u8 {
        SGR_FOREGROUND + self.index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_codes() {
        assert_eq!(Color::Black.foreground_code(), 30);
        assert_eq!(Color::Green.foreground_code(), 32);
        assert_eq!(Color::White.foreground_code(), 37);
        assert_eq!(Color::Default.foreground_code(), 39);
    }

    #[test]
    fn test_color_index_lookup() {
        for index in (0..=7).chain([9]) {
            let color = Color::from_index(index).unwrap();
            assert_eq!(color.index(), index);
        }
        assert_eq!(Color::from_index(8), None);
        assert_eq!(Color::from_index(10), None);
    }
}
