//! Shared primitives used across Glaive components.

pub mod bit_vector;
pub mod levenshtein;
pub mod multimapper;
pub mod priority_queue;
pub mod varint;
pub mod wildcard;
