//! ANSI/VT control sequences emitted by the session.
//!
//! Every sequence follows `ESC '[' <params> <final>`. Only the handful the
//! session needs are modelled; nothing here parses input.

use std::fmt;

/// Escape byte that introduces every control sequence.
pub const ESC: char = '\x1b';

/// SGR code that resets all attributes.
pub const SGR_NORMAL: u8 = 0;
/// SGR code for underline.
pub const SGR_UNDERLINE: u8 = 4;
/// SGR code for reverse video.
pub const SGR_INVERT: u8 = 7;
/// Base SGR code for foreground colors (30..=37, 39).
pub const SGR_FOREGROUND: u8 = 30;

/// A single control sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSequence {
    /// Select Graphic Rendition: `ESC [ n m`
    Sgr(u8),
    /// DEC private mode 7 reset (autowrap off): `ESC [ ? 7 l`
    NoWrap,
    /// DEC private mode 7 set (autowrap on): `ESC [ ? 7 h`
    Wrap,
    /// Erase from cursor to end of line: `ESC [ K`
    ClearLine,
    /// Cursor to absolute column, 0-based here, 1-based on the wire: `ESC [ n G`
    Column(u16),
    /// Cursor up n rows: `ESC [ n A`
    Up(u16),
}

impl fmt::Display for ControlSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ControlSequence::Sgr(code) => write!(f, "{ESC}[{code}m"),
            ControlSequence::NoWrap => write!(f, "{ESC}[?7l"),
            ControlSequence::Wrap => write!(f, "{ESC}[?7h"),
            ControlSequence::ClearLine => write!(f, "{ESC}[K"),
            ControlSequence::Column(col) => write!(f, "{ESC}[{}G", u32::from(col) + 1),
            ControlSequence::Up(rows) => write!(f, "{ESC}[{rows}A"),
        }
    }
}
