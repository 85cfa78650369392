//! Huge blob classification.

use crate::domain::blob_id::BlobId;
use crate::ec::scheme::ErasureScheme;

/// Decides whether a blob is stored as independent per-part records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HugeBlobCtx {
    threshold: usize,
}

impl HugeBlobCtx {
    /// `threshold` is compared against the size of one erasure-coded part,
    /// not the whole blob: with 4+2 and a threshold of 1024 bytes, blobs of
    /// 4093 bytes and more are huge.
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// Huge when `part_size(blob_size) >= threshold`.
    pub fn is_huge_blob(&self, scheme: &ErasureScheme, id: BlobId) -> bool {
        scheme.part_size(id.blob_size()) >= self.threshold
    }
}
