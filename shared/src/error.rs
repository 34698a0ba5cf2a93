/*!
Common error types for the beam-steering ground station components.
*/

use thiserror::Error;

/// Common result type used throughout the shared library
pub type Result<T> = std::result::Result<T, SharedError>;

/// Errors raised while decoding a frame off the radio link
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed frame: expected {expected} bytes, got {actual}")]
    MalformedFrame { expected: usize, actual: usize },

    #[error("Unknown command opcode: {0}")]
    UnknownOpcode(u8),
}

/// Errors raised while turning operator input into a command packet
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("Please enter a valid opcode between 0 and 2")]
    InvalidOpcode,

    #[error("Phase Shifter Input Value Error Please Enter a Value Between 0 and 353")]
    InvalidPhaseShifterRange,

    #[error("Please enter an integer main beam angle")]
    InvalidBeamAngle,

    #[error("Unsupported mode selector: {0:?}")]
    UnsupportedMode(String),
}

impl AssemblyError {
    /// Whether the operator should see this error in the error label.
    ///
    /// An unrecognised mode selector aborts assembly without a message.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::UnsupportedMode(_))
    }
}

/// Comprehensive error type for all shared operations
#[derive(Error, Debug)]
pub enum SharedError {
    /// Frame decoding errors
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Command assembly errors
    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    /// I/O errors (sockets, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Radio link errors
    #[error("Link error: {0}")]
    Link(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SharedError {
    /// Create a new radio link error
    pub fn link(msg: impl Into<String>) -> Self {
        Self::Link(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
