//! Domain Layer
//!
//! Value objects shared by the recovery engine and the trait abstractions
//! (ports) for its collaborators.
//!
//! - **Blob id** (`blob_id.rs`) - Ordered blob identity
//! - **Ports** (`ports.rs`) - Trait abstractions for external dependencies

pub mod blob_id;
pub mod ports;

pub use blob_id::BlobId;
pub use ports::{
    ErasureCoder, PeerPartSource, PhantomChecker, PhantomVerdict, PlanItem, RecordCommitter,
    ReplPlanner,
};
