//! Bit-packed binary rows.
//!
//! [`BitRow`] stores one feature row (or a meta-feature union) as 64-bit
//! words, so the inner search loop gets word-wide OR and hardware popcount
//! instead of per-element arithmetic.

use serde::{Deserialize, Serialize};

const WORD_BITS: usize = 64;

/// A fixed-length bit vector over sample columns.
///
/// Invariant: bits at positions `>= len` are always zero, so `count_ones`
/// and equality work directly on the words.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitRow {
    words: Vec<u64>,
    len: usize,
}

impl BitRow {
    /// All-zero row of the given length.
    pub fn zeros(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD_BITS)],
            len,
        }
    }

    /// Build from a 0/1 slice interpreted as booleans.
    pub fn from_bools(bits: &[bool]) -> Self {
        let mut row = Self::zeros(bits.len());
        for (i, &bit) in bits.iter().enumerate() {
            if bit {
                row.set(i);
            }
        }
        row
    }

    /// Number of sample columns.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the row has zero columns.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read bit `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= len`.
    #[inline]
    pub fn get(&self, i: usize) -> bool {
        assert!(i < self.len, "bit index {} out of range {}", i, self.len);
        self.words[i / WORD_BITS] >> (i % WORD_BITS) & 1 == 1
    }

    /// Set bit `i` to one.
    #[inline]
    pub fn set(&mut self, i: usize) {
        assert!(i < self.len, "bit index {} out of range {}", i, self.len);
        self.words[i / WORD_BITS] |= 1u64 << (i % WORD_BITS);
    }

    /// Elementwise OR with another row of the same length.
    ///
    /// # Panics
    ///
    /// Panics if the lengths differ.
    pub fn or_assign(&mut self, other: &BitRow) {
        assert_eq!(self.len, other.len, "length mismatch in OR");
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w |= o;
        }
    }

    /// `self | other` as a new row.
    pub fn or(&self, other: &BitRow) -> BitRow {
        let mut out = self.clone();
        out.or_assign(other);
        out
    }

    /// Number of set bits.
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Whether every bit is set.
    #[inline]
    pub fn is_all_ones(&self) -> bool {
        self.count_ones() == self.len
    }

    /// Whether no bit is set.
    #[inline]
    pub fn is_all_zeros(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Indices of set bits, ascending.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |&i| self.get(i))
    }

    /// Expand to a boolean vector (mostly for result records and tests).
    pub fn to_bools(&self) -> Vec<bool> {
        (0..self.len).map(|i| self.get(i)).collect()
    }

    /// Row with columns rearranged so that new column `j` reads old column
    /// `perm[j]`.
    ///
    /// # Panics
    ///
    /// Panics if `perm` is not a permutation of `0..len`.
    pub fn permuted(&self, perm: &[usize]) -> BitRow {
        assert_eq!(perm.len(), self.len, "permutation length mismatch");
        let mut out = BitRow::zeros(self.len);
        for (j, &src) in perm.iter().enumerate() {
            if self.get(src) {
                out.set(j);
            }
        }
        out
    }
}

impl std::fmt::Debug for BitRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BitRow[")?;
        for i in 0..self.len {
            write!(f, "{}", u8::from(self.get(i)))?;
        }
        write!(f, "]")
    }
}
