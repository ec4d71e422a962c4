//! Fixed-size bit set over dense indices.
//!
//! Used for the per-block `live_in`/`live_out`/`kill` sets (indexed by
//! `ValueId`) and for loop membership (indexed by `BlockId`).

use std::fmt;

/// A bit set with a fixed universe `0..universe`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitSet {
    words: Vec<u64>,
    universe: usize,
}

/// Set of live SSA values, indexed by `ValueId::index()`.
pub type LiveSet = BitSet;

impl BitSet {
    /// An empty set over `0..universe`.
    #[must_use]
    pub fn new_empty(universe: usize) -> Self {
        Self {
            words: vec![0; universe.div_ceil(64)],
            universe,
        }
    }

    /// Size of the index universe (not the number of members).
    #[inline]
    pub fn universe(&self) -> usize {
        self.universe
    }

    #[inline]
    pub fn contains(&self, idx: usize) -> bool {
        idx < self.universe && (self.words[idx / 64] >> (idx % 64)) & 1 == 1
    }

    /// Add `idx`. Returns `true` if it was not already present.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is outside the universe.
    pub fn insert(&mut self, idx: usize) -> bool {
        assert!(
            idx < self.universe,
            "bit {idx} out of range for set of {}",
            self.universe
        );
        let word = &mut self.words[idx / 64];
        let mask = 1_u64 << (idx % 64);
        let added = *word & mask == 0;
        *word |= mask;
        added
    }

    pub fn remove(&mut self, idx: usize) {
        if idx < self.universe {
            self.words[idx / 64] &= !(1_u64 << (idx % 64));
        }
    }

    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// `self |= other`. Returns `true` if `self` grew.
    pub fn union_with(&mut self, other: &Self) -> bool {
        debug_assert_eq!(self.universe, other.universe);
        let mut changed = false;
        for (a, &b) in self.words.iter_mut().zip(&other.words) {
            let merged = *a | b;
            changed |= merged != *a;
            *a = merged;
        }
        changed
    }

    /// `self |= other - exclude`. Returns `true` if `self` grew.
    pub fn union_if_not_in(&mut self, other: &Self, exclude: &Self) -> bool {
        debug_assert_eq!(self.universe, other.universe);
        debug_assert_eq!(self.universe, exclude.universe);
        let mut changed = false;
        for ((a, &b), &x) in self.words.iter_mut().zip(&other.words).zip(&exclude.words) {
            let merged = *a | (b & !x);
            changed |= merged != *a;
            *a = merged;
        }
        changed
    }

    /// Members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(w, &bits)| {
            let mut rest = bits;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(w * 64 + bit)
            })
        })
    }
}

impl fmt::Debug for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
