//! Fixed-capacity bitmask over erasure part positions (or peer indices).

use serde::{Deserialize, Serialize};

/// Largest number of positions a mask can hold.
pub const MAX_PARTS: u8 = 32;

/// Set of part positions `0..size`.
///
/// Bits at or beyond `size` are never set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PartMask {
    bits: u32,
    size: u8,
}

fn mask_for(size: u8) -> u32 {
    if size >= MAX_PARTS {
        u32::MAX
    } else {
        (1u32 << size) - 1
    }
}

impl PartMask {
    /// Empty mask for `size` positions.
    pub fn empty(size: u8) -> Self {
        assert!(size <= MAX_PARTS, "part mask size {size} exceeds {MAX_PARTS}");
        Self { bits: 0, size }
    }

    /// Mask with all `size` positions set.
    pub fn full(size: u8) -> Self {
        assert!(size <= MAX_PARTS, "part mask size {size} exceeds {MAX_PARTS}");
        Self {
            bits: mask_for(size),
            size,
        }
    }

    /// Mask with only `position` set.
    pub fn one_hot(position: u8, size: u8) -> Self {
        let mut mask = Self::empty(size);
        mask.set(position);
        mask
    }

    /// Mask from raw bits; panics if a bit lies outside `size`.
    pub fn from_bits(bits: u32, size: u8) -> Self {
        assert!(size <= MAX_PARTS, "part mask size {size} exceeds {MAX_PARTS}");
        assert_eq!(
            bits & !mask_for(size),
            0,
            "bits {bits:#b} do not fit a mask of {size} positions"
        );
        Self { bits, size }
    }

    /// Mask from a list of positions.
    pub fn from_positions(positions: &[u8], size: u8) -> Self {
        let mut mask = Self::empty(size);
        for &position in positions {
            mask.set(position);
        }
        mask
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn size(&self) -> u8 {
        self.size
    }

    pub fn get(&self, position: u8) -> bool {
        position < self.size && self.bits & (1 << position) != 0
    }

    pub fn set(&mut self, position: u8) {
        assert!(
            position < self.size,
            "part position {position} out of range for {} positions",
            self.size
        );
        self.bits |= 1 << position;
    }

    pub fn clear(&mut self, position: u8) {
        if position < self.size {
            self.bits &= !(1 << position);
        }
    }

    pub fn count(&self) -> u32 {
        self.bits.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
            size: self.size.max(other.size),
        }
    }

    pub fn intersection(self, other: Self) -> Self {
        Self {
            bits: self.bits & other.bits,
            size: self.size.max(other.size),
        }
    }

    /// Positions in `self` but not in `other`.
    pub fn difference(self, other: Self) -> Self {
        Self {
            bits: self.bits & !other.bits,
            size: self.size.max(other.size),
        }
    }

    /// Lowest set position.
    pub fn first_position(&self) -> Option<u8> {
        if self.bits == 0 {
            None
        } else {
            Some(self.bits.trailing_zeros() as u8)
        }
    }

    /// Lowest set position strictly greater than `position`.
    pub fn next_position(&self, position: u8) -> Option<u8> {
        if position >= MAX_PARTS - 1 {
            return None;
        }
        let rest = self.bits & !((1u32 << (position + 1)) - 1);
        if rest == 0 {
            None
        } else {
            Some(rest.trailing_zeros() as u8)
        }
    }

    /// Set positions in ascending order.
    pub fn iter(&self) -> Positions {
        Positions { bits: self.bits }
    }
}

/// Ascending iterator over the set positions of a [`PartMask`].
#[derive(Debug, Clone)]
pub struct Positions {
    bits: u32,
}

impl Iterator for Positions {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.bits == 0 {
            return None;
        }
        let position = self.bits.trailing_zeros() as u8;
        self.bits &= self.bits - 1;
        Some(position)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.bits.count_ones() as usize;
        (n, Some(n))
    }
}

impl IntoIterator for PartMask {
    type Item = u8;
    type IntoIter = Positions;

    fn into_iter(self) -> Positions {
        self.iter()
    }
}

impl std::fmt::Display for PartMask {
    /// Positions rendered left to right, e.g. `110100` for {0, 1, 3} of 6.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for position in 0..self.size {
            f.write_str(if self.get(position) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for PartMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PartMask({self})")
    }
}
