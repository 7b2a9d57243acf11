//! Core terminal session components.
//!
//! - **device**: backend trait and the color model
//! - **sequence**: ANSI/VT control sequences
//! - **session**: `Tty`, the raw-mode session built on a device
//! - **error**: session errors
//!
//! # Architecture
//!
//! ```text
//! Tty<D: Device>
//! ├── D (input + output handles)
//! ├── original mode (restored on reset/close/drop)
//! ├── tracked foreground color
//! └── cached geometry
//! ```

pub mod device;
pub mod error;
pub mod sequence;
pub mod session;
