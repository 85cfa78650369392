//! Erasure Coding Module
//!
//! Block erasure coding of blob payloads into data and parity parts.
//!
//! # Components
//!
//! - **Scheme** (`scheme.rs`): the k+m layout and the part size rule
//! - **Encoder/Decoder** (`encoder.rs`): Reed-Solomon splitting and
//!   restoration using the `reed-solomon-erasure` crate
//!
//! # Usage
//!
//! ```rust,ignore
//! use blobrepl::ec::{EcDecoder, EcEncoder, ErasureScheme};
//!
//! let scheme = ErasureScheme::block_4_2();
//! let encoder = EcEncoder::new(scheme)?;
//! let decoder = EcDecoder::new(scheme)?;
//!
//! let encoded = encoder.encode(b"Hello, World!")?;
//! let mut parts: Vec<Option<Vec<u8>>> = encoded.iter().cloned().map(Some).collect();
//! parts[0] = None;
//! parts[3] = None;
//!
//! decoder.restore(&mut parts)?;
//! assert_eq!(parts[0].as_ref(), Some(&encoded[0]));
//! ```

pub mod encoder;
pub mod scheme;

#[cfg(test)]
mod proptest;

pub use encoder::{EcDecoder, EcEncoder};
pub use scheme::ErasureScheme;
