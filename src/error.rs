//! Error types for the replication recovery engine
//!
//! Only data-dependent failures are modelled here. Contract violations by a
//! collaborator (non-increasing blob ids, out-of-range part indices, blob size
//! mismatches) are assertions and abort the process instead.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the replication recovery engine
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    // =========================================================================
    // Erasure Coding Errors
    // =========================================================================
    /// Invalid erasure scheme
    #[error("Invalid EC configuration: {0}")]
    InvalidEcConfig(String),

    /// EC encoding failed
    #[error("EC encoding failed: {0}")]
    EcEncodingFailed(String),

    /// EC restoration failed
    #[error("EC restoration failed: {0}")]
    EcRestoreFailed(String),

    /// Insufficient parts for restoration
    #[error("Insufficient parts for restoration: have {available}, need {required}")]
    InsufficientParts { available: usize, required: usize },

    // =========================================================================
    // Record Errors
    // =========================================================================
    /// Local record could not be built, parsed or merged
    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    /// Peer part fetch failed
    #[error("Peer fetch failed: {0}")]
    PeerFetch(String),

    /// Recovered record commit failed
    #[error("Commit failed: {0}")]
    Commit(String),

    /// Phantom check failed
    #[error("Phantom check failed: {0}")]
    PhantomCheck(String),

    /// Planner failed to produce the next task
    #[error("Planning failed: {0}")]
    Plan(String),
}

/// Failures of the local record codec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Buffer ended before the record did
    #[error("record truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// Bytes left over after the last part payload
    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),

    /// Part position does not fit the scheme
    #[error("part position {position} out of range for {total_parts} parts")]
    PositionOutOfRange { position: u8, total_parts: u8 },

    /// Number of buffers does not match the positions bitmap
    #[error("{buffers} part buffers for {positions} part positions")]
    PartCountMismatch { buffers: usize, positions: usize },

    /// Two records addressed to one blob disagree on a header field
    #[error("records disagree on {field}: {left} vs {right}")]
    HeaderMismatch {
        field: &'static str,
        left: u32,
        right: u32,
    },

    /// Two records carry different payloads for the same part
    #[error("conflicting payloads for part {position}: {left} vs {right} bytes")]
    ConflictingPart {
        position: u8,
        left: usize,
        right: usize,
    },
}
