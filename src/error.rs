//! # Error Types
//!
//! Custom error types for ARDrone Link using `thiserror`.
//!
//! Each concern has its own error enum so callers can match precisely;
//! [`DroneError`] aggregates them for the connection-level API.

use thiserror::Error;

/// Errors raised while building or packing an AT command.
///
/// All of these are raised before any I/O takes place.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    /// More positional values than the command has parameters
    #[error("AT*{command} takes {expected} arguments, got {given}")]
    TooManyArguments {
        command: &'static str,
        expected: usize,
        given: usize,
    },

    /// Same parameter given by position and by name
    #[error("argument '{name}' of AT*{command} given by name and position")]
    DuplicateArgument { command: &'static str, name: String },

    /// Name that is not a parameter of the command
    #[error("AT*{command} has no parameter named '{name}'")]
    UnknownArgument { command: &'static str, name: String },

    /// Integer whose unsigned bit length exceeds 32
    #[error("value {value} of '{name}' does not fit in 32 bits")]
    IntegerOutOfRange { name: &'static str, value: i64 },

    /// Finite float that rounds to infinity in single precision
    #[error("value {value} of '{name}' overflows a 32-bit float")]
    FloatOutOfRange { name: &'static str, value: f64 },

    /// Value kind the parameter does not accept
    #[error("'{name}' does not accept {found} values")]
    UnsupportedValue {
        name: &'static str,
        found: &'static str,
    },

    /// Parameter left unset and without a default at pack time
    #[error("argument '{name}' of AT*{command} is not set")]
    MissingArgument {
        command: &'static str,
        name: &'static str,
    },
}

/// Errors raised while decoding one NavData datagram.
///
/// Each one discards only the datagram being decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavDataError {
    /// Buffer ended inside the metadata, an option header or a record
    #[error("navdata truncated at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Option tag without a registered layout
    #[error("unknown navdata option tag 0x{tag:04X} at offset {offset}")]
    UnknownTag { tag: u16, offset: usize },

    /// Declared record size differs from the registered layout
    #[error("navdata option 0x{tag:04X} declares {actual} bytes, layout has {expected}")]
    SizeMismatch {
        tag: u16,
        expected: usize,
        actual: usize,
    },

    /// No checksum record in the frame
    #[error("navdata checksum not present")]
    ChecksumAbsent,

    /// Checksum record disagrees with the computed sum
    #[error("incorrect navdata checksum: calculated {calculated}, reported {reported}")]
    ChecksumMismatch { calculated: u32, reported: u32 },
}

/// Errors raised by the dispatch scheduler lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Operation not allowed in the scheduler's current state
    #[error("cannot {operation} a scheduler that is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
}

/// Errors raised while de-encapsulating the video stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VideoError {
    /// Header does not start with the `PaVE` signature
    #[error("invalid PaVE signature: {0:02X?}")]
    InvalidSignature([u8; 4]),

    /// Declared header size is smaller than the fixed header
    #[error("PaVE header size {0} is smaller than the fixed header")]
    InvalidHeaderSize(u16),
}

/// Main error type for ARDrone Link
#[derive(Debug, Error)]
pub enum DroneError {
    /// AT command construction or packing errors
    #[error("AT command error: {0}")]
    Command(#[from] CommandError),

    /// NavData decoding errors
    #[error("NavData error: {0}")]
    NavData(#[from] NavDataError),

    /// Scheduler lifecycle errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Video stream errors
    #[error("Video error: {0}")]
    Video(#[from] VideoError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Device configuration read timed out
    #[error("Timed out waiting for device configuration")]
    ConfigTimeout,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ARDrone Link
pub type Result<T> = std::result::Result<T, DroneError>;
