// src/error.rs
//
// Error taxonomy for sessions, the relay and its hosts.

use thiserror::Error;

/// Configuration problems detected when a session is created.
///
/// These never surface from the real-time callback; `relay::create`
/// rejects the configuration before any slot is allocated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid chunk size: {0} (must be > 0)")]
    InvalidChunkSize(usize),

    #[error("invalid quantum: {0} (must be > 0)")]
    InvalidQuantum(usize),

    #[error("chunk size {chunk_size} is not a multiple of the quantum {quantum}")]
    QuantumMismatch { chunk_size: usize, quantum: usize },

    #[error("invalid slot count: {0} (must be >= 2)")]
    InvalidSlotCount(usize),

    #[error("invalid sampling rate: {0}")]
    InvalidSamplingRate(u32),
}

/// Errors reported to the control context.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The engine refused the input during `init`. The engine handle has
    /// already been released.
    #[error("malformed input: engine rejected the sequence data")]
    MalformedInput,

    /// The engine failed while generating; the session is over.
    #[error("engine failure: {0}")]
    EngineFailure(String),

    /// A required host capability is missing (engine not compiled,
    /// shared memory unavailable).
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    #[error("no session has been created")]
    NoSession,

    /// The other side of a control channel went away.
    #[error("{0} context disconnected")]
    Disconnected(&'static str),

    #[error("GD3 metadata error: {0}")]
    Gd3(String),
}

pub type RelayResult<T> = Result<T, RelayError>;

/// A runtime failure raised by the synthesis engine during `play`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineFault {
    pub message: String,
}

impl EngineFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<EngineFault> for RelayError {
    fn from(fault: EngineFault) -> Self {
        RelayError::EngineFailure(fault.message)
    }
}
