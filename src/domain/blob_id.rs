//! Blob identity value object.

use serde::{Deserialize, Serialize};

/// Identity of a blob, optionally narrowed to one erasure part.
///
/// Ids compare lexicographically by tablet, channel, generation, step,
/// cookie, blob size and finally part id, so a part id always sorts right
/// after its whole-blob id and before the next blob.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct BlobId {
    tablet_id: u64,
    channel: u8,
    generation: u32,
    step: u32,
    cookie: u32,
    blob_size: u32,
    part_id: u8,
}

impl BlobId {
    /// Create a whole-blob id (part id 0).
    pub fn new(
        tablet_id: u64,
        generation: u32,
        step: u32,
        channel: u8,
        cookie: u32,
        blob_size: u32,
    ) -> Self {
        Self {
            tablet_id,
            channel,
            generation,
            step,
            cookie,
            blob_size,
            part_id: 0,
        }
    }

    /// Largest possible id, used as a flush boundary.
    pub fn max() -> Self {
        Self {
            tablet_id: u64::MAX,
            channel: u8::MAX,
            generation: u32::MAX,
            step: u32::MAX,
            cookie: u32::MAX,
            blob_size: u32::MAX,
            part_id: u8::MAX,
        }
    }

    /// Same blob narrowed to part `part_id` (1-based, 0 means whole blob).
    pub fn with_part(self, part_id: u8) -> Self {
        Self { part_id, ..self }
    }

    /// Whole-blob portion of this id.
    pub fn full_id(self) -> Self {
        self.with_part(0)
    }

    pub fn tablet_id(&self) -> u64 {
        self.tablet_id
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn cookie(&self) -> u32 {
        self.cookie
    }

    pub fn blob_size(&self) -> u32 {
        self.blob_size
    }

    pub fn part_id(&self) -> u8 {
        self.part_id
    }

    /// Zero-based part position, if this id designates a single part.
    pub fn part_position(&self) -> Option<u8> {
        self.part_id.checked_sub(1)
    }
}

impl std::fmt::Display for BlobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}:{}:{}:{}:{}:{}:{}]",
            self.tablet_id,
            self.generation,
            self.step,
            self.channel,
            self.cookie,
            self.blob_size,
            self.part_id
        )
    }
}
