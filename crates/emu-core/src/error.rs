//! Error types for emulator core

use thiserror::Error;

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, EmulatorError>;

/// Errors that can surface to a caller. Every other failure mode the core
/// encounters (unmapped bus access, illegal opcode) is recovered locally and
/// is never represented here — see the debug snapshot and `tracing` events.
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("not an iNES image: missing 'NES\\x1A' magic")]
    BadMagic,

    #[error("iNES image truncated: expected at least {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("unsupported mapper: {0}")]
    UnsupportedMapper(u8),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
