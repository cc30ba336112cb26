//! Fixed-size document bitmaps.

use bit_vec::BitVec;

/// A bitmap over `[0, len)` with a cached population count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitVector {
    bits: BitVec,
    count: usize,
}

impl BitVector {
    pub fn new(len: usize) -> Self {
        BitVector {
            bits: BitVec::from_elem(len, false),
            count: 0,
        }
    }

    /// A bitmap with every bit set.
    pub fn full(len: usize) -> Self {
        BitVector {
            bits: BitVec::from_elem(len, true),
            count: len,
        }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Out-of-range bits read as unset.
    pub fn get(&self, bit: usize) -> bool {
        self.bits.get(bit).unwrap_or(false)
    }

    /// Set `bit`, growing the bitmap if needed.
    pub fn set(&mut self, bit: usize) {
        if bit >= self.bits.len() {
            self.bits.grow(bit + 1 - self.bits.len(), false);
        }
        if !self.bits[bit] {
            self.bits.set(bit, true);
            self.count += 1;
        }
    }

    pub fn unset(&mut self, bit: usize) {
        if self.get(bit) {
            self.bits.set(bit, false);
            self.count -= 1;
        }
    }

    /// First set bit at or after `from`.
    pub fn next_set(&self, from: usize) -> Option<usize> {
        (from..self.bits.len()).find(|&i| self.bits[i])
    }

    /// Iterate over the set bits in ascending order.
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(i, bit)| bit.then_some(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_count() {
        let mut bv = BitVector::new(10);
        assert_eq!(bv.count(), 0);
        bv.set(3);
        bv.set(3);
        bv.set(7);
        assert_eq!(bv.count(), 2);
        assert!(bv.get(3));
        assert!(!bv.get(4));
        assert!(!bv.get(100));

        bv.unset(3);
        bv.unset(3);
        assert_eq!(bv.count(), 1);
        assert_eq!(bv.iter_set().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_grow_and_next_set() {
        let mut bv = BitVector::new(2);
        bv.set(64);
        assert_eq!(bv.len(), 65);
        assert_eq!(bv.next_set(0), Some(64));
        assert_eq!(bv.next_set(65), None);

        let full = BitVector::full(4);
        assert_eq!(full.count(), 4);
        assert_eq!(full.iter_set().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }
}
