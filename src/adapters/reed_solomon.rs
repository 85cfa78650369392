//! Reed-Solomon Coder Adapter
//!
//! Implements the `ErasureCoder` port using the Reed-Solomon erasure coding library.

use crate::domain::ports::ErasureCoder;
use crate::ec::encoder::{EcDecoder, EcEncoder};
use crate::ec::scheme::ErasureScheme;
use crate::error::Result;

/// Reed-Solomon based erasure coding adapter.
///
/// Wraps `EcEncoder` and `EcDecoder` to implement the `ErasureCoder` port.
pub struct ReedSolomonCoder {
    encoder: EcEncoder,
    decoder: EcDecoder,
    scheme: ErasureScheme,
}

impl std::fmt::Debug for ReedSolomonCoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReedSolomonCoder")
            .field("scheme", &self.scheme)
            .finish()
    }
}

impl ReedSolomonCoder {
    /// Create a new Reed-Solomon coder for the scheme.
    pub fn new(scheme: ErasureScheme) -> Result<Self> {
        Ok(Self {
            encoder: EcEncoder::new(scheme)?,
            decoder: EcDecoder::new(scheme)?,
            scheme,
        })
    }

    /// Create the standard 4+2 configuration.
    pub fn standard_4_2() -> Result<Self> {
        Self::new(ErasureScheme::block_4_2())
    }
}

impl ErasureCoder for ReedSolomonCoder {
    fn scheme(&self) -> ErasureScheme {
        self.scheme
    }

    fn split(&self, data: &[u8]) -> Result<Vec<Vec<u8>>> {
        self.encoder.encode(data)
    }

    fn restore(&self, parts: &mut [Option<Vec<u8>>]) -> Result<()> {
        self.decoder.restore(parts)
    }
}
