//! Property-Based Tests for Part Masks and Records
//!
//! # Test Properties
//!
//! 1. **Mask algebra**: set operations agree with per-position membership
//! 2. **Iteration**: positions come out ascending, once each
//! 3. **Merge union**: merging disjoint records keeps every payload
//! 4. **Header-only parts**: a data payload always supersedes an empty one

#![cfg(test)]

use proptest::prelude::*;

use super::arena::RecordArena;
use super::disk_blob::DiskBlob;
use super::parts::PartMask;

// =============================================================================
// Property Strategies
// =============================================================================

/// Total part count and a bitmap that fits it.
fn mask_strategy() -> impl Strategy<Value = (u8, u32)> {
    (1u8..=32).prop_flat_map(|size| {
        let full = PartMask::full(size).bits();
        (Just(size), any::<u32>().prop_map(move |bits| bits & full))
    })
}

/// Two disjoint masks of a 6-part scheme.
fn disjoint_masks() -> impl Strategy<Value = (PartMask, PartMask)> {
    (0u32..64, 0u32..64).prop_map(|(a, b)| {
        let left = PartMask::from_bits(a, 6);
        let right = PartMask::from_bits(b & !a, 6);
        (left, right)
    })
}

fn payloads_for(mask: PartMask, len: usize, seed: u8) -> Vec<Vec<u8>> {
    mask.iter()
        .map(|position| vec![seed.wrapping_add(position); len])
        .collect()
}

// =============================================================================
// Part Mask Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_set_operations_match_membership(
        (size, a) in mask_strategy(),
        b in any::<u32>(),
    ) {
        let left = PartMask::from_bits(a, size);
        let right = PartMask::from_bits(b & PartMask::full(size).bits(), size);

        for position in 0..size {
            let (l, r) = (left.get(position), right.get(position));
            prop_assert_eq!(left.union(right).get(position), l || r);
            prop_assert_eq!(left.intersection(right).get(position), l && r);
            prop_assert_eq!(left.difference(right).get(position), l && !r);
        }
    }

    #[test]
    fn prop_iteration_is_ascending((size, bits) in mask_strategy()) {
        let mask = PartMask::from_bits(bits, size);
        let positions: Vec<u8> = mask.iter().collect();

        prop_assert_eq!(positions.len() as u32, mask.count());
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(PartMask::from_positions(&positions, size), mask);

        let mut walked = Vec::new();
        let mut next = mask.first_position();
        while let Some(position) = next {
            walked.push(position);
            next = mask.next_position(position);
        }
        prop_assert_eq!(walked, positions);
    }
}

// =============================================================================
// Record Merge Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_merge_disjoint_keeps_all_parts(
        (left, right) in disjoint_masks(),
        len in 1usize..64,
    ) {
        prop_assume!(!left.is_empty() && !right.is_empty());
        let mut arena = RecordArena::default();

        let a = DiskBlob::create_from_distinct_parts(&payloads_for(left, len, 1), left, 600, &mut arena)?;
        let b = DiskBlob::create_from_distinct_parts(&payloads_for(right, len, 101), right, 600, &mut arena)?;

        let (merged, parts) = DiskBlob::merge(&a, &b, &mut arena)?;
        let (swapped, swapped_parts) = DiskBlob::merge(&b, &a, &mut arena)?;
        prop_assert_eq!(parts, left.union(right));
        prop_assert_eq!(swapped_parts, parts);
        prop_assert_eq!(&merged, &swapped);

        let blob = DiskBlob::parse(&merged)?;
        for position in parts {
            let seed = if left.get(position) { 1u8 } else { 101 };
            let expected = vec![seed.wrapping_add(position); len];
            prop_assert_eq!(blob.part(position).map(|p| p.to_vec()), Some(expected));
        }
    }

    #[test]
    fn prop_data_supersedes_header_only(
        position in 0u8..6,
        len in 1usize..64,
        header_first in any::<bool>(),
    ) {
        let mut arena = RecordArena::default();
        let mask = PartMask::one_hot(position, 6);
        let empty: [&[u8]; 1] = [&[]];
        let header = DiskBlob::create_from_distinct_parts(&empty, mask, 600, &mut arena)?;
        let data = DiskBlob::create(600, position, 6, &vec![7u8; len], &mut arena)?;

        let (merged, parts) = if header_first {
            DiskBlob::merge(&header, &data, &mut arena)?
        } else {
            DiskBlob::merge(&data, &header, &mut arena)?
        };

        prop_assert_eq!(parts, mask);
        prop_assert_eq!(merged, data);
    }
}
