//! Fuzzy queries.
//!
//! A fuzzy query matches terms within a Levenshtein edit distance of its text.
//! The distance is turned into a similarity,
//!
//! ```text
//! similarity = 1 - distance / (prefix_length + min(len(text), len(term)))
//! ```
//!
//! measured on the characters after the shared prefix, and every term whose
//! similarity beats `min_similarity` joins a [`MultiTermQuery`] with a boost
//! scaled into `(0, 1]`. An exact match gets boost 1.

use std::fmt;

use log::debug;

use crate::error::{GlaiveError, Result};
use crate::lexical::reader::IndexReader;
use crate::query::multi_term::MultiTermQuery;
use crate::query::{Query, boost_suffix};
use crate::search::DEFAULT_MAX_TERMS;
use crate::util::levenshtein::bounded_distance;

pub const DEFAULT_MIN_SIMILARITY: f32 = 0.5;
pub const DEFAULT_PREFIX_LENGTH: usize = 0;

#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyQuery {
    field: String,
    text: String,
    min_similarity: f32,
    /// Leading characters that must match exactly.
    prefix_length: usize,
    max_terms: usize,
    boost: f32,
}

impl FuzzyQuery {
    pub fn new<F: Into<String>, T: Into<String>>(field: F, text: T) -> Self {
        FuzzyQuery {
            field: field.into(),
            text: text.into(),
            min_similarity: DEFAULT_MIN_SIMILARITY,
            prefix_length: DEFAULT_PREFIX_LENGTH,
            max_terms: DEFAULT_MAX_TERMS,
            boost: 1.0,
        }
    }

    /// Set the similarity a term must exceed. Must lie in `[0, 1)`.
    pub fn with_min_similarity(mut self, min_similarity: f32) -> Result<Self> {
        if !(0.0..1.0).contains(&min_similarity) {
            return Err(GlaiveError::invalid_argument(format!(
                "min_similarity must be in [0, 1), got {min_similarity}"
            )));
        }
        self.min_similarity = min_similarity;
        Ok(self)
    }

    pub fn with_prefix_length(mut self, prefix_length: usize) -> Self {
        self.prefix_length = prefix_length;
        self
    }

    /// Cap the expansion at the `max_terms` most similar terms.
    pub fn with_max_terms(mut self, max_terms: usize) -> Result<Self> {
        if max_terms == 0 {
            return Err(GlaiveError::invalid_argument(
                "max_terms must be greater than 0",
            ));
        }
        self.max_terms = max_terms;
        Ok(self)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn min_similarity(&self) -> f32 {
        self.min_similarity
    }

    pub fn prefix_length(&self) -> usize {
        self.prefix_length
    }

    pub fn max_terms(&self) -> usize {
        self.max_terms
    }

    pub fn boost(&self) -> f32 {
        self.boost
    }

    pub fn set_boost(&mut self, boost: f32) {
        self.boost = boost;
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub(crate) fn rewrite(&self, reader: &dyn IndexReader) -> Result<Query> {
        let chars: Vec<char> = self.text.chars().collect();
        let pre_len = self.prefix_length.min(chars.len());
        let prefix: String = chars[..pre_len].iter().collect();
        let rest = &chars[pre_len..];

        let mut multi =
            MultiTermQuery::with_max_terms(self.field.clone(), self.max_terms)?.with_boost(self.boost);
        let mut examined = 0usize;
        let mut terms = reader.terms_from(&self.field, &prefix)?;
        while terms.next()? {
            let text = terms.term();
            let Some(suffix) = text.strip_prefix(prefix.as_str()) else {
                break;
            };
            examined += 1;
            let candidate: Vec<char> = suffix.chars().collect();
            let similarity = self.similarity(rest, &candidate, pre_len);
            if similarity > self.min_similarity {
                let boost = (similarity - self.min_similarity) / (1.0 - self.min_similarity);
                multi.add_term_boost(text, boost);
            }
        }

        debug!("{self} examined {examined} terms and kept {}", multi.len());
        Ok(Query::MultiTerm(multi))
    }

    fn similarity(&self, text: &[char], target: &[char], pre_len: usize) -> f32 {
        let (m, n) = (text.len(), target.len());
        if m == 0 || n == 0 {
            if m == n {
                return 1.0;
            }
            return if pre_len == 0 {
                0.0
            } else {
                1.0 - m.max(n) as f32 / pre_len as f32
            };
        }

        let scale_len = pre_len + m.min(n);
        let max_distance = ((1.0 - self.min_similarity) * scale_len as f32) as usize;
        match bounded_distance(text, target, max_distance) {
            Some(distance) => 1.0 - distance as f32 / scale_len as f32,
            None => 0.0,
        }
    }
}

impl fmt::Display for FuzzyQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}~{}{}",
            self.field,
            self.text,
            self.min_similarity,
            boost_suffix(self.boost)
        )
    }
}
