//! Term range queries.

use std::fmt;

use log::debug;

use crate::error::{GlaiveError, Result};
use crate::lexical::reader::IndexReader;
use crate::query::constant_score::ConstantScoreQuery;
use crate::query::multi_term::MultiTermQuery;
use crate::query::{Query, boost_suffix};
use crate::search::SearchConfig;
use crate::search::filter::RangeFilter;

/// Bound type for range queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Bound<T> {
    /// Inclusive bound.
    Included(T),
    /// Exclusive bound.
    Excluded(T),
    /// Unbounded (no limit).
    Unbounded,
}

impl<T: PartialOrd> Bound<T> {
    /// Check if a value satisfies this bound as a lower bound.
    pub fn contains_lower(&self, value: &T) -> bool {
        match self {
            Bound::Included(bound) => value >= bound,
            Bound::Excluded(bound) => value > bound,
            Bound::Unbounded => true,
        }
    }

    /// Check if a value satisfies this bound as an upper bound.
    pub fn contains_upper(&self, value: &T) -> bool {
        match self {
            Bound::Included(bound) => value <= bound,
            Bound::Excluded(bound) => value < bound,
            Bound::Unbounded => true,
        }
    }
}

impl<T> Bound<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Bound::Included(v) | Bound::Excluded(v) => Some(v),
            Bound::Unbounded => None,
        }
    }
}

/// A validated range over the terms of one field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TermRange {
    field: String,
    lower: Bound<String>,
    upper: Bound<String>,
}

impl TermRange {
    pub fn new<F: Into<String>>(field: F, lower: Bound<String>, upper: Bound<String>) -> Result<Self> {
        let field = field.into();
        match (lower.value(), upper.value()) {
            (None, None) => {
                return Err(GlaiveError::invalid_argument(format!(
                    "range on field {field} needs at least one bound"
                )));
            }
            (Some(l), Some(u)) if l > u => {
                return Err(GlaiveError::invalid_argument(format!(
                    "lower bound {l} is greater than upper bound {u} on field {field}"
                )));
            }
            _ => {}
        }
        Ok(TermRange {
            field,
            lower,
            upper,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn lower(&self) -> &Bound<String> {
        &self.lower
    }

    pub fn upper(&self) -> &Bound<String> {
        &self.upper
    }

    pub fn contains(&self, text: &str) -> bool {
        let text = text.to_string();
        self.lower.contains_lower(&text) && self.upper.contains_upper(&text)
    }

    /// Visit every indexed term of the range in order, with its document
    /// frequency. Stops early when `visit` returns `false`.
    pub fn for_each_term<F>(&self, reader: &dyn IndexReader, mut visit: F) -> Result<()>
    where
        F: FnMut(&str, u64) -> bool,
    {
        let start = self.lower.value().map_or("", String::as_str);
        let mut terms = reader.terms_from(&self.field, start)?;
        while terms.next()? {
            let text = terms.term().to_string();
            if !self.upper.contains_upper(&text) {
                break;
            }
            if !self.lower.contains_lower(&text) {
                continue;
            }
            if !visit(&text, terms.doc_freq()) {
                break;
            }
        }
        Ok(())
    }
}

impl fmt::Display for TermRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.field)?;
        match &self.lower {
            Bound::Included(l) => write!(f, "[{l}")?,
            Bound::Excluded(l) => write!(f, "{{{l}")?,
            Bound::Unbounded => write!(f, "<")?,
        }
        write!(f, " ")?;
        match &self.upper {
            Bound::Included(u) => write!(f, "{u}]"),
            Bound::Excluded(u) => write!(f, "{u}}}"),
            Bound::Unbounded => write!(f, ">"),
        }
    }
}

/// Matches documents with a term of `field` inside a range.
///
/// The query rewrites into a [`MultiTermQuery`] over the matching terms, or
/// into a constant-score query over a [`RangeFilter`] when the range holds
/// more than `max_terms` terms.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    range: TermRange,
    boost: f32,
}

impl RangeQuery {
    pub fn new<F: Into<String>>(field: F, lower: Bound<String>, upper: Bound<String>) -> Result<Self> {
        Ok(RangeQuery {
            range: TermRange::new(field, lower, upper)?,
            boost: 1.0,
        })
    }

    /// Create a range query for values greater than or equal to the given value.
    pub fn greater_than_or_equal<F: Into<String>, V: Into<String>>(field: F, value: V) -> Self {
        RangeQuery {
            range: TermRange {
                field: field.into(),
                lower: Bound::Included(value.into()),
                upper: Bound::Unbounded,
            },
            boost: 1.0,
        }
    }

    /// Create a range query for values greater than the given value.
    pub fn greater_than<F: Into<String>, V: Into<String>>(field: F, value: V) -> Self {
        RangeQuery {
            range: TermRange {
                field: field.into(),
                lower: Bound::Excluded(value.into()),
                upper: Bound::Unbounded,
            },
            boost: 1.0,
        }
    }

    /// Create a range query for values less than or equal to the given value.
    pub fn less_than_or_equal<F: Into<String>, V: Into<String>>(field: F, value: V) -> Self {
        RangeQuery {
            range: TermRange {
                field: field.into(),
                lower: Bound::Unbounded,
                upper: Bound::Included(value.into()),
            },
            boost: 1.0,
        }
    }

    /// Create a range query for values less than the given value.
    pub fn less_than<F: Into<String>, V: Into<String>>(field: F, value: V) -> Self {
        RangeQuery {
            range: TermRange {
                field: field.into(),
                lower: Bound::Unbounded,
                upper: Bound::Excluded(value.into()),
            },
            boost: 1.0,
        }
    }

    pub fn range(&self) -> &TermRange {
        &self.range
    }

    pub fn field(&self) -> &str {
        self.range.field()
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
        let mut multi = MultiTermQuery::with_max_terms(self.range.field(), config.max_terms)?
            .with_boost(self.boost);
        let mut count = 0;
        self.range.for_each_term(reader, |text, _| {
            count += 1;
            if count > config.max_terms {
                return false;
            }
            multi.add_term(text);
            true
        })?;

        if count > config.max_terms {
            debug!(
                "{self} matches more than {} terms, rewriting to a constant score filter",
                config.max_terms
            );
            let filter = RangeFilter::from_range(self.range.clone());
            return Ok(ConstantScoreQuery::new(filter).with_boost(self.boost).into());
        }
        Ok(Query::MultiTerm(multi))
    }
}

impl fmt::Display for RangeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.range, boost_suffix(self.boost))
    }
}
