//! Wildcard queries.
//!
//! `?` matches any single byte and `*` any run of bytes. Matching terms are
//! found by scanning the term dictionary from the literal prefix before the
//! first wildcard, so patterns starting with a wildcard scan the whole field.

use std::fmt;

use crate::error::Result;
use crate::lexical::reader::IndexReader;
use crate::query::prefix::{PrefixQuery, expand_pattern};
use crate::query::term::TermQuery;
use crate::query::{Query, boost_suffix};
use crate::search::SearchConfig;
use crate::search::filter::{TermPattern, TermPatternFilter};

#[derive(Debug, Clone, PartialEq)]
pub struct WildcardQuery {
    field: String,
    pattern: String,
    boost: f32,
}

impl WildcardQuery {
    pub fn new<F: Into<String>, P: Into<String>>(field: F, pattern: P) -> Self {
        WildcardQuery {
            field: field.into(),
            pattern: pattern.into(),
            boost: 1.0,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
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

    pub(crate) fn rewrite(&self, reader: &dyn IndexReader, config: &SearchConfig) -> Result<Query> {
        let first_wild = self.pattern.find(['*', '?']);
        match first_wild {
            None => {
                return Ok(TermQuery::new(self.field.clone(), self.pattern.clone())
                    .with_boost(self.boost)
                    .into());
            }
            Some(i) if i == self.pattern.len() - 1 && self.pattern.ends_with('*') => {
                return Ok(PrefixQuery::new(self.field.clone(), &self.pattern[..i])
                    .with_boost(self.boost)
                    .into());
            }
            Some(_) => {}
        }

        let pattern = TermPattern::Wildcard(self.pattern.clone());
        expand_pattern(reader, config, &self.field, pattern, self.boost, || {
            TermPatternFilter::wildcard(self.field.clone(), self.pattern.clone())
        })
    }
}

impl fmt::Display for WildcardQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.field, self.pattern, boost_suffix(self.boost))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::lexical::memory::MemoryIndex;
    use crate::search::searcher::{IndexSearcher, Searcher};

    fn searcher() -> IndexSearcher {
        let mut index = MemoryIndex::new();
        for text in ["bat", "bet", "boat", "but", "abbot"] {
            index.add_document(&[("body", text)]).unwrap();
        }
        IndexSearcher::new(Arc::new(index))
    }

    #[test]
    fn test_degenerate_patterns() {
        let s = searcher();
        let q: Query = WildcardQuery::new("body", "bat").into();
        assert_eq!(
            q.rewrite(s.reader(), s.config()).unwrap(),
            Query::Term(TermQuery::new("body", "bat"))
        );
        let q: Query = WildcardQuery::new("body", "bo*").into();
        assert_eq!(
            q.rewrite(s.reader(), s.config()).unwrap(),
            Query::Prefix(PrefixQuery::new("body", "bo"))
        );
    }

    #[test]
    fn test_wildcard_matches() {
        let s = searcher();
        let docs = |pattern: &str| {
            let q: Query = WildcardQuery::new("body", pattern).into();
            let weight = s.create_weight(&q).unwrap();
            match weight.scorer(s.reader()).unwrap() {
                Some(mut scorer) => scorer.collect_docs().unwrap(),
                None => Vec::new(),
            }
        };
        assert_eq!(docs("b?t"), vec![0, 1, 3]);
        assert_eq!(docs("b*t"), vec![0, 1, 2, 3]);
        assert_eq!(docs("*o*"), vec![2, 4]);
        assert!(docs("x?z").is_empty());
    }
}
