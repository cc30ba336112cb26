//! Scoring formula policy.
//!
//! [`DefaultSimilarity`] is the classic TF-IDF vector-space formula:
//!
//! - `tf(freq) = sqrt(freq)`
//! - `idf(df, n) = ln(n / (df + 1)) + 1`
//! - `length_norm(n) = 1 / sqrt(n)`
//! - `query_norm(s) = 1 / sqrt(s)`
//! - `coord(overlap, max) = overlap / max`
//! - `sloppy_freq(d) = 1 / (d + 1)`
//!
//! Field norms are stored as one byte per document using a lossy 8-bit float
//! (3 mantissa bits, exponent bias 15).

use std::fmt::Debug;
use std::sync::LazyLock;

use crate::lexical::term::Term;
use crate::search::searcher::Searcher;

static NORM_TABLE: LazyLock<[f32; 256]> = LazyLock::new(|| {
    let mut table = [0.0f32; 256];
    for (b, slot) in table.iter_mut().enumerate() {
        *slot = byte_to_float(b as u8);
    }
    table
});

/// Encode a non-negative float into one byte.
pub fn float_to_byte(f: f32) -> u8 {
    let bits = f.to_bits() as i32;
    let small = bits >> (24 - 3);
    let zero = (63 - 15) << 3;
    if small <= zero {
        if bits <= 0 { 0 } else { 1 }
    } else if small >= zero + 0x100 {
        255
    } else {
        (small - zero) as u8
    }
}

/// Decode a byte produced by [`float_to_byte`].
pub fn byte_to_float(b: u8) -> f32 {
    if b == 0 {
        return 0.0;
    }
    let bits = ((b as u32) << (24 - 3)) + ((63 - 15) << 24);
    f32::from_bits(bits)
}

pub trait Similarity: Send + Sync + Debug {
    /// Normalization factor for a field containing `num_terms` tokens.
    fn length_norm(&self, field: &str, num_terms: u32) -> f32;

    fn query_norm(&self, sum_of_squared_weights: f32) -> f32;

    fn tf(&self, freq: f32) -> f32;

    /// Frequency contribution of a sloppy match `distance` positions apart.
    fn sloppy_freq(&self, distance: u32) -> f32;

    fn idf(&self, doc_freq: u64, num_docs: u64) -> f32;

    /// Score factor for matching `overlap` of `max_overlap` clauses.
    fn coord(&self, overlap: usize, max_overlap: usize) -> f32;

    fn decode_norm(&self, b: u8) -> f32 {
        NORM_TABLE[b as usize]
    }

    fn encode_norm(&self, f: f32) -> u8 {
        float_to_byte(f)
    }

    fn idf_term(&self, term: &Term, searcher: &dyn Searcher) -> f32 {
        self.idf(searcher.doc_freq(term), searcher.max_doc())
    }

    /// Sum of the idfs of `terms`.
    fn idf_phrase(&self, terms: &[Term], searcher: &dyn Searcher) -> f32 {
        terms.iter().map(|term| self.idf_term(term, searcher)).sum()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSimilarity;

impl Similarity for DefaultSimilarity {
    fn length_norm(&self, _field: &str, num_terms: u32) -> f32 {
        1.0 / (num_terms.max(1) as f32).sqrt()
    }

    fn query_norm(&self, sum_of_squared_weights: f32) -> f32 {
        if sum_of_squared_weights <= 0.0 {
            return 1.0;
        }
        1.0 / sum_of_squared_weights.sqrt()
    }

    fn tf(&self, freq: f32) -> f32 {
        freq.sqrt()
    }

    fn sloppy_freq(&self, distance: u32) -> f32 {
        1.0 / (distance as f32 + 1.0)
    }

    fn idf(&self, doc_freq: u64, num_docs: u64) -> f32 {
        ((num_docs as f64 / (doc_freq as f64 + 1.0)).ln() + 1.0) as f32
    }

    fn coord(&self, overlap: usize, max_overlap: usize) -> f32 {
        if max_overlap == 0 {
            return 0.0;
        }
        overlap as f32 / max_overlap as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_norm_encoding() {
        assert_eq!(float_to_byte(0.0), 0);
        assert_eq!(float_to_byte(1.0), 124);
        assert_eq!(byte_to_float(124), 1.0);
        assert_eq!(float_to_byte(f32::INFINITY), 255);
        assert_eq!(float_to_byte(1e-30), 1);
        assert_eq!(float_to_byte(-1.0), 0);

        let sim = DefaultSimilarity;
        for n in [1u32, 2, 3, 10, 100] {
            let norm = sim.length_norm("body", n);
            let decoded = sim.decode_norm(sim.encode_norm(norm));
            assert!(decoded <= norm);
            assert!(decoded > norm * 0.75);
        }
    }

    #[test]
    fn test_default_formulas() {
        let sim = DefaultSimilarity;
        assert_eq!(sim.tf(4.0), 2.0);
        assert_eq!(sim.sloppy_freq(0), 1.0);
        assert_eq!(sim.sloppy_freq(3), 0.25);
        assert_eq!(sim.coord(1, 2), 0.5);
        assert_eq!(sim.coord(0, 0), 0.0);
        assert_eq!(sim.query_norm(4.0), 0.5);
        assert_eq!(sim.length_norm("f", 4), 0.5);

        let idf = sim.idf(1, 10);
        assert!((idf - ((10.0f32 / 2.0).ln() + 1.0)).abs() < 1e-6);
        assert!(sim.idf(0, 10) > sim.idf(5, 10));
    }
}
