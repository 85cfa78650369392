//! Erasure Coding Encoder/Decoder
//!
//! Implements Reed-Solomon splitting and restoration of blob parts using the
//! `reed-solomon-erasure` crate. A blob of `n` bytes becomes `k` data parts of
//! `ceil(n / k)` bytes (the last one zero-padded) followed by `m` parity parts.

use crate::ec::scheme::ErasureScheme;
use crate::error::{Error, Result};
use reed_solomon_erasure::galois_8::ReedSolomon;
use std::sync::Arc;
use tracing::{debug, instrument};

fn build_codec(scheme: ErasureScheme) -> Result<Arc<ReedSolomon>> {
    let rs = ReedSolomon::new(
        usize::from(scheme.data_parts()),
        usize::from(scheme.parity_parts()),
    )
    .map_err(|e| Error::InvalidEcConfig(format!("Failed to create Reed-Solomon codec: {}", e)))?;
    Ok(Arc::new(rs))
}

// =============================================================================
// EC Encoder
// =============================================================================

/// Splits blobs into data parts and computes the parity parts
pub struct EcEncoder {
    rs: Arc<ReedSolomon>,
    scheme: ErasureScheme,
}

impl EcEncoder {
    /// Create a new encoder for the given scheme
    pub fn new(scheme: ErasureScheme) -> Result<Self> {
        Ok(Self {
            rs: build_codec(scheme)?,
            scheme,
        })
    }

    /// Encode a blob into all of its parts (data parts followed by parity parts)
    ///
    /// Every part is `scheme.part_size(data.len())` bytes long.
    #[instrument(skip(self, data), fields(data_len = data.len()))]
    pub fn encode(&self, data: &[u8]) -> Result<Vec<Vec<u8>>> {
        let part_size = data.len().div_ceil(usize::from(self.scheme.data_parts()));
        let total = usize::from(self.scheme.total_part_count());
        let mut parts: Vec<Vec<u8>> = Vec::with_capacity(total);

        for chunk_idx in 0..usize::from(self.scheme.data_parts()) {
            let start = chunk_idx * part_size;
            let end = std::cmp::min(start + part_size, data.len());

            let mut part = if start < data.len() {
                data[start..end].to_vec()
            } else {
                Vec::new()
            };
            part.resize(part_size, 0);
            parts.push(part);
        }

        for _ in 0..self.scheme.parity_parts() {
            parts.push(vec![0u8; part_size]);
        }

        self.rs
            .encode(&mut parts)
            .map_err(|e| Error::EcEncodingFailed(format!("Reed-Solomon encoding failed: {}", e)))?;

        debug!(
            "Encoded {} bytes into {} parts of {} bytes each",
            data.len(),
            total,
            part_size
        );

        Ok(parts)
    }
}

// =============================================================================
// EC Decoder
// =============================================================================

/// Restores missing parts from the present ones
pub struct EcDecoder {
    rs: Arc<ReedSolomon>,
    scheme: ErasureScheme,
}

impl EcDecoder {
    /// Create a new decoder for the given scheme
    pub fn new(scheme: ErasureScheme) -> Result<Self> {
        Ok(Self {
            rs: build_codec(scheme)?,
            scheme,
        })
    }

    /// Fill in every missing part, data and parity alike
    ///
    /// At least `minimal_restorable_part_count` parts must be present.
    #[instrument(skip(self, parts))]
    pub fn restore(&self, parts: &mut [Option<Vec<u8>>]) -> Result<()> {
        if parts.len() != usize::from(self.scheme.total_part_count()) {
            return Err(Error::InvalidEcConfig(format!(
                "Expected {} parts, got {}",
                self.scheme.total_part_count(),
                parts.len()
            )));
        }

        let available = parts.iter().filter(|p| p.is_some()).count();
        let required = usize::from(self.scheme.minimal_restorable_part_count());
        if available < required {
            return Err(Error::InsufficientParts {
                available,
                required,
            });
        }

        self.rs
            .reconstruct(parts)
            .map_err(|e| Error::EcRestoreFailed(format!("Reed-Solomon restoration failed: {}", e)))?;

        debug!(
            "Restored parts from {}/{} available",
            available,
            self.scheme.total_part_count()
        );

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
