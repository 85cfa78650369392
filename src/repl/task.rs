//! Lost-blob tasks and the peer requests built from them.

use serde::Serialize;

use crate::domain::blob_id::BlobId;
use crate::repl::parts::PartMask;

/// Opaque ownership/replication-state metadata of a blob, only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Ingress(pub u64);

impl std::fmt::Display for Ingress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// A blob known to lack some of its local parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LostBlob {
    /// Whole-blob id
    pub id: BlobId,
    /// Parts this node has to recover
    pub parts_to_recover: PartMask,
    /// The blob may never have been written successfully
    pub possible_phantom: bool,
    pub ingress: Ingress,
}

impl LostBlob {
    pub fn new(id: BlobId, parts_to_recover: PartMask, possible_phantom: bool, ingress: Ingress) -> Self {
        Self {
            id,
            parts_to_recover,
            possible_phantom,
            ingress,
        }
    }
}

/// Request for the parts of one blob, sent to the peer-fetch layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRequest {
    pub id: BlobId,
    pub parts: PartMask,
    pub ingress: Ingress,
}
