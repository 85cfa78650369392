//! Property-Based Tests for Erasure Coding
//!
//! # Test Properties
//!
//! 1. **Restoration**: any `data_parts` surviving parts restore every lost part
//!    and the data parts reassemble the payload
//! 2. **Part size**: every encoded part is `part_size(blob_size)` bytes
//! 3. **Determinism**: same payload always produces the same parts
//! 4. **Insufficiency**: fewer than `data_parts` survivors are rejected

#![cfg(test)]

use proptest::prelude::*;

use super::encoder::{EcDecoder, EcEncoder};
use super::scheme::ErasureScheme;
use crate::error::Error;

// =============================================================================
// Property Strategies
// =============================================================================

/// Small k+m schemes for faster tests.
fn scheme_strategy() -> impl Strategy<Value = ErasureScheme> {
    (2u8..=6, 1u8..=3).prop_map(|(k, m)| ErasureScheme::new(k, m).unwrap())
}

fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..4000)
}

/// Scheme plus a set of part positions to lose, at most `parity_parts` of them.
fn loss_strategy() -> impl Strategy<Value = (ErasureScheme, Vec<usize>)> {
    scheme_strategy().prop_flat_map(|scheme| {
        let total = usize::from(scheme.total_part_count());
        let max = usize::from(scheme.parity_parts());
        (
            Just(scheme),
            prop::collection::vec(0..total, 0..=max).prop_map(|mut lost| {
                lost.sort_unstable();
                lost.dedup();
                lost
            }),
        )
    })
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_restore_recovers_lost_parts(
        (scheme, lost) in loss_strategy(),
        payload in payload_strategy(),
    ) {
        let encoder = EcEncoder::new(scheme)?;
        let decoder = EcDecoder::new(scheme)?;
        let parts = encoder.encode(&payload)?;

        let mut gathered: Vec<Option<Vec<u8>>> = parts.iter().cloned().map(Some).collect();
        for &position in &lost {
            gathered[position] = None;
        }
        decoder.restore(&mut gathered)?;

        for (restored, original) in gathered.iter().zip(&parts) {
            prop_assert_eq!(restored.as_ref(), Some(original));
        }
    }

    #[test]
    fn prop_restored_data_parts_hold_payload(
        (scheme, lost) in loss_strategy(),
        payload in payload_strategy(),
    ) {
        let encoder = EcEncoder::new(scheme)?;
        let decoder = EcDecoder::new(scheme)?;

        let mut gathered: Vec<Option<Vec<u8>>> = encoder.encode(&payload)?.into_iter().map(Some).collect();
        for &position in &lost {
            gathered[position] = None;
        }
        decoder.restore(&mut gathered)?;

        let joined: Vec<u8> = gathered
            .iter()
            .take(usize::from(scheme.data_parts()))
            .flatten()
            .flatten()
            .copied()
            .collect();
        prop_assert_eq!(&joined[..payload.len()], &payload[..]);
    }

    #[test]
    fn prop_part_size_matches_scheme(
        scheme in scheme_strategy(),
        payload in payload_strategy(),
    ) {
        let parts = EcEncoder::new(scheme)?.encode(&payload)?;
        let expected = scheme.part_size(payload.len() as u32);

        prop_assert_eq!(parts.len(), usize::from(scheme.total_part_count()));
        for part in &parts {
            prop_assert_eq!(part.len(), expected);
        }
    }

    #[test]
    fn prop_encoding_is_deterministic(
        scheme in scheme_strategy(),
        payload in payload_strategy(),
    ) {
        let encoder = EcEncoder::new(scheme)?;
        prop_assert_eq!(encoder.encode(&payload)?, encoder.encode(&payload)?);
    }

    #[test]
    fn prop_too_few_parts_rejected(
        scheme in scheme_strategy(),
        payload in payload_strategy(),
    ) {
        let decoder = EcDecoder::new(scheme)?;
        let mut gathered: Vec<Option<Vec<u8>>> = EcEncoder::new(scheme)?.encode(&payload)?.into_iter().map(Some).collect();

        // keep one part fewer than required
        let keep = usize::from(scheme.data_parts()) - 1;
        for part in gathered.iter_mut().skip(keep) {
            *part = None;
        }

        let result = decoder.restore(&mut gathered);
        let insufficient = matches!(result, Err(Error::InsufficientParts { .. }));
        prop_assert!(insufficient);
    }
}
