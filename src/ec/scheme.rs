//! Erasure scheme description
//!
//! The scheme fixes how many parts a blob is split into and how many of
//! them are required to restore the rest. Part buffers of one blob all have
//! the same size, derived from the blob size.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::repl::parts::MAX_PARTS;

/// Data + parity part layout of an erasure-coded group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErasureScheme {
    data_parts: u8,
    parity_parts: u8,
}

impl ErasureScheme {
    /// Create a k+m scheme.
    pub fn new(data_parts: u8, parity_parts: u8) -> Result<Self> {
        if data_parts == 0 {
            return Err(Error::InvalidEcConfig(
                "data_parts must be greater than 0".to_string(),
            ));
        }
        if parity_parts == 0 {
            return Err(Error::InvalidEcConfig(
                "parity_parts must be greater than 0".to_string(),
            ));
        }
        let total = u16::from(data_parts) + u16::from(parity_parts);
        if total > u16::from(MAX_PARTS) {
            return Err(Error::InvalidEcConfig(format!(
                "total part count {} exceeds the maximum of {}",
                total, MAX_PARTS
            )));
        }

        Ok(Self {
            data_parts,
            parity_parts,
        })
    }

    /// The common 4+2 block scheme.
    pub fn block_4_2() -> Self {
        Self {
            data_parts: 4,
            parity_parts: 2,
        }
    }

    pub fn data_parts(&self) -> u8 {
        self.data_parts
    }

    pub fn parity_parts(&self) -> u8 {
        self.parity_parts
    }

    pub fn total_part_count(&self) -> u8 {
        self.data_parts + self.parity_parts
    }

    /// Fewest parts from which every other part can be restored.
    pub fn minimal_restorable_part_count(&self) -> u8 {
        self.data_parts
    }

    /// Size of every part of a blob of `blob_size` bytes.
    pub fn part_size(&self, blob_size: u32) -> usize {
        (blob_size as usize).div_ceil(usize::from(self.data_parts))
    }
}

impl std::fmt::Display for ErasureScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}+{}", self.data_parts, self.parity_parts)
    }
}
