//! Blob Replication Recovery Engine
//!
//! Restores the erasure-coded parts a storage node lost from the parts held
//! by its peers, and turns them into local records ready to be committed.
//!
//! # Architecture
//!
//! ```text
//! ReplPlanner ─▶ RecoveryMachine ◀─ PeerPartSource
//!                     │  ▲
//!                     │  └── PhantomChecker
//!                     ▼
//!              RecordCommitter
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Reed-Solomon coder and in-memory port implementations
//! - [`config`] - YAML configuration
//! - [`domain`] - Blob identity and ports (traits)
//! - [`ec`] - Erasure scheme and Reed-Solomon encoder/decoder
//! - [`error`] - Error types
//! - [`metrics`] - Prometheus replication counters
//! - [`repl`] - Recovery machine, record codec and job driver

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ec;
pub mod error;
pub mod metrics;
pub mod repl;

// Re-export commonly used types
pub use config::ReplConfig;
pub use domain::{BlobId, ErasureCoder};
pub use ec::ErasureScheme;
pub use error::{Error, Result};
pub use metrics::ReplMonGroup;
pub use repl::{
    PartMask, PartSet, RecoveredBlob, RecoveredBlobsQueue, RecoveryMachine, ReplInfo, ReplJob,
    ReplReport,
};
