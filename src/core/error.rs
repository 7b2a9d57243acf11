//! Error type for terminal sessions.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TtyError {
    #[error("Failed to open terminal device {path}: {source}")]
    DeviceUnavailable {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read terminal mode: {0}")]
    ModeQueryFailed(#[source] io::Error),

    /// The input stream is closed. The caller decides whether that ends the
    /// program; the session stays valid and can still be closed.
    #[error("End of terminal input")]
    EndOfInput,

    #[error("Failed to read from terminal: {0}")]
    Read(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, TtyError>;
