//! Prefix queries.

use std::fmt;

use log::debug;

use crate::error::Result;
use crate::lexical::reader::IndexReader;
use crate::query::constant_score::ConstantScoreQuery;
use crate::query::multi_term::MultiTermQuery;
use crate::query::{Query, boost_suffix};
use crate::search::SearchConfig;
use crate::search::filter::{TermPattern, TermPatternFilter, for_each_pattern_term};

/// Matches documents containing a term that starts with a prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefixQuery {
    field: String,
    prefix: String,
    boost: f32,
}

impl PrefixQuery {
    pub fn new<F: Into<String>, P: Into<String>>(field: F, prefix: P) -> Self {
        PrefixQuery {
            field: field.into(),
            prefix: prefix.into(),
            boost: 1.0,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
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
        let pattern = TermPattern::Prefix(self.prefix.clone());
        expand_pattern(reader, config, &self.field, pattern, self.boost, || {
            TermPatternFilter::prefix(self.field.clone(), self.prefix.clone())
        })
    }
}

/// Expand the terms matching `pattern` into a multi-term query, or into a
/// constant-score filter query when there are more than `max_terms`.
pub(crate) fn expand_pattern<F>(
    reader: &dyn IndexReader,
    config: &SearchConfig,
    field: &str,
    pattern: TermPattern,
    boost: f32,
    filter: F,
) -> Result<Query>
where
    F: FnOnce() -> TermPatternFilter,
{
    let mut multi = MultiTermQuery::with_max_terms(field, config.max_terms)?.with_boost(boost);
    let mut count = 0;
    for_each_pattern_term(reader, field, &pattern, |text, _| {
        count += 1;
        if count > config.max_terms {
            return false;
        }
        multi.add_term(text);
        true
    })?;

    if count > config.max_terms {
        debug!(
            "{pattern:?} on {field} matches more than {} terms, rewriting to a constant score filter",
            config.max_terms
        );
        return Ok(ConstantScoreQuery::new(filter()).with_boost(boost).into());
    }
    Ok(Query::MultiTerm(multi))
}

impl fmt::Display for PrefixQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}*{}", self.field, self.prefix, boost_suffix(self.boost))
    }
}
