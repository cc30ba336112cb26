//! Queries, weights and scorers.
//!
//! A [`Query`] is a declarative description of what to match. Searching turns
//! it into executable form in three steps:
//!
//! 1. [`Query::rewrite`] expands queries that cannot score directly (prefix,
//!    wildcard, fuzzy and range queries enumerate the term dictionary) and
//!    collapses degenerate ones. Rewriting is repeated until the query stops
//!    changing.
//! 2. [`Query::create_weight`] binds the rewritten query to a searcher's
//!    similarity and global statistics, producing a [`weight::Weight`]. The
//!    weight is normalized in two passes (sum of squared weights, then
//!    `normalize`) so that scores are comparable across queries.
//! 3. [`weight::Weight::scorer`] binds the weight to one index reader and
//!    returns a [`scorer::Scorer`], a forward-only cursor over matching
//!    documents.
//!
//! # Examples
//!
//! ```
//! use glaive::query::{Query, boolean::BooleanQuery, term::TermQuery};
//!
//! let query: Query = BooleanQuery::new()
//!     .must(TermQuery::new("body", "cat"))
//!     .must_not(TermQuery::new("body", "dog"))
//!     .into();
//! assert_eq!(query.to_string(), "+body:cat -body:dog");
//! ```

pub mod boolean;
pub mod boolean_scorer;
pub mod conjunction;
pub mod constant_score;
pub mod disjunction;
pub mod filtered;
pub mod fuzzy;
pub mod match_all;
pub mod multi_term;
pub mod parser;
pub mod phrase;
pub mod prefix;
pub mod range;
pub mod scorer;
pub mod span;
pub mod term;
pub mod weight;
pub mod wildcard;

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use ahash::AHashSet;
use log::trace;

use crate::error::Result;
use crate::lexical::reader::IndexReader;
use crate::lexical::term::Term;
use crate::lexical::term_vector::TermVector;
use crate::search::SearchConfig;
use crate::search::highlight::MatchVector;
use crate::search::searcher::Searcher;

use self::boolean::{BooleanQuery, Occur};
use self::constant_score::ConstantScoreQuery;
use self::filtered::FilteredQuery;
use self::fuzzy::FuzzyQuery;
use self::match_all::MatchAllQuery;
use self::multi_term::MultiTermQuery;
use self::phrase::PhraseQuery;
use self::prefix::PrefixQuery;
use self::range::RangeQuery;
use self::span::SpanQuery;
use self::term::TermQuery;
use self::weight::Weight;
use self::wildcard::WildcardQuery;

/// Any query the engine can execute.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Term(TermQuery),
    MultiTerm(MultiTermQuery),
    Boolean(BooleanQuery),
    Phrase(PhraseQuery),
    Range(RangeQuery),
    Wildcard(WildcardQuery),
    Prefix(PrefixQuery),
    Fuzzy(FuzzyQuery),
    Filtered(FilteredQuery),
    ConstantScore(ConstantScoreQuery),
    MatchAll(MatchAllQuery),
    Span(SpanQuery),
}

impl Query {
    pub fn boost(&self) -> f32 {
        match self {
            Query::Term(q) => q.boost(),
            Query::MultiTerm(q) => q.boost(),
            Query::Boolean(q) => q.boost(),
            Query::Phrase(q) => q.boost(),
            Query::Range(q) => q.boost(),
            Query::Wildcard(q) => q.boost(),
            Query::Prefix(q) => q.boost(),
            Query::Fuzzy(q) => q.boost(),
            Query::Filtered(q) => q.boost(),
            Query::ConstantScore(q) => q.boost(),
            Query::MatchAll(q) => q.boost(),
            Query::Span(q) => q.boost(),
        }
    }

    pub fn set_boost(&mut self, boost: f32) {
        match self {
            Query::Term(q) => q.set_boost(boost),
            Query::MultiTerm(q) => q.set_boost(boost),
            Query::Boolean(q) => q.set_boost(boost),
            Query::Phrase(q) => q.set_boost(boost),
            Query::Range(q) => q.set_boost(boost),
            Query::Wildcard(q) => q.set_boost(boost),
            Query::Prefix(q) => q.set_boost(boost),
            Query::Fuzzy(q) => q.set_boost(boost),
            Query::Filtered(q) => q.set_boost(boost),
            Query::ConstantScore(q) => q.set_boost(boost),
            Query::MatchAll(q) => q.set_boost(boost),
            Query::Span(q) => q.set_boost(boost),
        }
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.set_boost(boost);
        self
    }

    /// Rewrite one level against `reader`.
    ///
    /// Returns an equal query when nothing changed. Use
    /// [`Searcher::rewrite`] (or [`rewrite_fully`]) to reach the fixed point.
    pub fn rewrite(&self, reader: &dyn IndexReader, config: &SearchConfig) -> Result<Query> {
        match self {
            Query::Term(_) | Query::MatchAll(_) | Query::ConstantScore(_) => Ok(self.clone()),
            Query::MultiTerm(q) => q.rewrite(),
            Query::Boolean(q) => q.rewrite(reader, config),
            Query::Phrase(q) => q.rewrite(),
            Query::Range(q) => q.rewrite(reader, config),
            Query::Wildcard(q) => q.rewrite(reader, config),
            Query::Prefix(q) => q.rewrite(reader, config),
            Query::Fuzzy(q) => q.rewrite(reader),
            Query::Filtered(q) => q.rewrite(reader, config),
            Query::Span(q) => Ok(Query::Span(q.rewrite(reader, config)?)),
        }
    }

    /// Add every term this query depends on to `terms`.
    pub fn extract_terms(&self, terms: &mut BTreeSet<Term>) {
        match self {
            Query::Term(q) => {
                terms.insert(q.term().clone());
            }
            Query::MultiTerm(q) => q.extract_terms(terms),
            Query::Boolean(q) => {
                for clause in q.clauses() {
                    clause.query.extract_terms(terms);
                }
            }
            Query::Phrase(q) => q.extract_terms(terms),
            Query::Filtered(q) => q.query().extract_terms(terms),
            Query::Span(q) => q.extract_terms(terms),
            Query::Range(_)
            | Query::Wildcard(_)
            | Query::Prefix(_)
            | Query::Fuzzy(_)
            | Query::ConstantScore(_)
            | Query::MatchAll(_) => {}
        }
    }

    /// The set of terms this query depends on.
    pub fn terms(&self) -> BTreeSet<Term> {
        let mut terms = BTreeSet::new();
        self.extract_terms(&mut terms);
        terms
    }

    /// Bind an already rewritten query to `searcher`.
    ///
    /// The returned weight is not normalized yet; [`weight::build_weight`]
    /// runs the whole protocol.
    pub fn create_weight(&self, searcher: &dyn Searcher) -> Result<Box<dyn Weight>> {
        match self {
            Query::Term(q) => q.create_weight(self, searcher),
            Query::MultiTerm(q) => q.create_weight(self, searcher),
            Query::Boolean(q) => q.create_weight(self, searcher),
            Query::Phrase(q) => q.create_weight(self, searcher),
            Query::Filtered(q) => q.create_weight(self, searcher),
            Query::ConstantScore(q) => q.create_weight(self, searcher),
            Query::MatchAll(q) => q.create_weight(self, searcher),
            Query::Span(q) => q.create_weight(self, searcher),
            Query::Range(_) | Query::Wildcard(_) | Query::Prefix(_) | Query::Fuzzy(_) => {
                Err(crate::error::GlaiveError::unsupported(format!(
                    "{self} must be rewritten before it can be weighted"
                )))
            }
        }
    }

    /// Add the token-position ranges this query matches in `tv`.
    ///
    /// Only rewritten queries contribute; expansion queries have no match
    /// vector of their own.
    pub fn match_vector(&self, tv: &TermVector, mv: &mut MatchVector) -> Result<()> {
        match self {
            Query::Term(q) => {
                if q.term().field == tv.field {
                    add_term_positions(tv, &q.term().text, mv);
                }
            }
            Query::MultiTerm(q) => {
                if q.field() == tv.field {
                    for text in q.term_texts() {
                        add_term_positions(tv, text, mv);
                    }
                }
            }
            Query::Boolean(q) => {
                for clause in q.clauses() {
                    if clause.occur != Occur::MustNot {
                        clause.query.match_vector(tv, mv)?;
                    }
                }
            }
            Query::Phrase(q) => q.match_vector(tv, mv),
            Query::Filtered(q) => q.query().match_vector(tv, mv)?,
            Query::Span(q) => q.match_vector(tv, mv)?,
            Query::Range(_)
            | Query::Wildcard(_)
            | Query::Prefix(_)
            | Query::Fuzzy(_)
            | Query::ConstantScore(_)
            | Query::MatchAll(_) => {}
        }
        Ok(())
    }
}

pub(crate) fn add_term_positions(tv: &TermVector, text: &str, mv: &mut MatchVector) {
    if let Some(term) = tv.get_term(text) {
        for &pos in &term.positions {
            mv.add(pos as usize, pos as usize);
        }
    }
}

/// Render a boost suffix, empty for the neutral boost.
pub(crate) fn boost_suffix(boost: f32) -> String {
    if boost == 1.0 {
        String::new()
    } else {
        format!("^{boost}")
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Term(q) => q.fmt(f),
            Query::MultiTerm(q) => q.fmt(f),
            Query::Boolean(q) => q.fmt(f),
            Query::Phrase(q) => q.fmt(f),
            Query::Range(q) => q.fmt(f),
            Query::Wildcard(q) => q.fmt(f),
            Query::Prefix(q) => q.fmt(f),
            Query::Fuzzy(q) => q.fmt(f),
            Query::Filtered(q) => q.fmt(f),
            Query::ConstantScore(q) => q.fmt(f),
            Query::MatchAll(q) => q.fmt(f),
            Query::Span(q) => q.fmt(f),
        }
    }
}

impl Eq for Query {}

impl Hash for Query {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

macro_rules! impl_from_query {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Query {
                fn from(q: $ty) -> Self {
                    Query::$variant(q)
                }
            }
        )*
    };
}

impl_from_query! {
    Term => TermQuery,
    MultiTerm => MultiTermQuery,
    Boolean => BooleanQuery,
    Phrase => PhraseQuery,
    Range => RangeQuery,
    Wildcard => WildcardQuery,
    Prefix => PrefixQuery,
    Fuzzy => FuzzyQuery,
    Filtered => FilteredQuery,
    ConstantScore => ConstantScoreQuery,
    MatchAll => MatchAllQuery,
    Span => SpanQuery,
}

/// Rewrite `query` against `reader` until it stops changing.
pub fn rewrite_fully(
    query: &Query,
    reader: &dyn IndexReader,
    config: &SearchConfig,
) -> Result<Query> {
    let mut current = query.clone();
    let mut iterations = 0;
    loop {
        let rewritten = current.rewrite(reader, config)?;
        iterations += 1;
        if rewritten == current {
            trace!("rewrite of {query} settled after {iterations} iteration(s)");
            return Ok(rewritten);
        }
        trace!("rewrite iteration {iterations}: {current} -> {rewritten}");
        current = rewritten;
    }
}

/// Merge the rewrites of one query against several readers.
///
/// Coordination-disabled boolean queries made only of optional clauses are
/// split into their clauses; the distinct queries are then re-joined into a
/// single optional boolean query, or returned as-is when only one remains.
pub fn combine(queries: &[Query]) -> Query {
    let mut candidates: Vec<&Query> = Vec::with_capacity(queries.len());
    for query in queries {
        match query {
            Query::Boolean(bq) if bq.is_splittable() => {
                candidates.extend(bq.clauses().iter().map(|clause| &clause.query));
            }
            _ => candidates.push(query),
        }
    }

    let mut seen: AHashSet<&Query> = AHashSet::with_capacity(candidates.len());
    let mut unique: Vec<Query> = candidates
        .into_iter()
        .filter(|q| seen.insert(*q))
        .cloned()
        .collect();

    if unique.len() == 1 {
        return unique.remove(0);
    }
    let mut combined = BooleanQuery::new().with_coord_disabled(true);
    for q in unique {
        combined.add_clause(q, Occur::Should);
    }
    Query::Boolean(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(q: &Query) -> u64 {
        let mut h = DefaultHasher::new();
        q.hash(&mut h);
        h.finish()
    }

    #[test]
    fn test_structural_equality_and_hash() {
        let a: Query = TermQuery::new("body", "cat").into();
        let b: Query = TermQuery::new("body", "cat").into();
        let c: Query = TermQuery::new("body", "cat").with_boost(2.0).into();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, c);
        assert_eq!(c.to_string(), "body:cat^2");
    }

    #[test]
    fn test_combine_dedupes() {
        let cat: Query = TermQuery::new("body", "cat").into();
        let dog: Query = TermQuery::new("body", "dog").into();

        assert_eq!(combine(&[cat.clone(), cat.clone()]), cat);

        let split: Query = BooleanQuery::new()
            .with_coord_disabled(true)
            .should(cat.clone())
            .should(dog.clone())
            .into();
        let combined = combine(&[split, dog.clone(), cat.clone()]);
        let Query::Boolean(bq) = &combined else {
            panic!("expected a boolean query, got {combined}");
        };
        assert!(bq.is_coord_disabled());
        assert_eq!(bq.clauses().len(), 2);
        assert_eq!(bq.clauses()[0].query, cat);
        assert_eq!(bq.clauses()[1].query, dog);
    }

    #[test]
    fn test_combine_keeps_first_seen_order() {
        let queries: Vec<Query> = (0..200)
            .map(|i| TermQuery::new("body", format!("t{}", i % 50)).into())
            .collect();
        let Query::Boolean(bq) = combine(&queries) else {
            panic!("expected a boolean query");
        };
        let texts: Vec<String> = bq.clauses().iter().map(|c| c.query.to_string()).collect();
        let expected: Vec<String> = (0..50).map(|i| format!("body:t{i}")).collect();
        assert_eq!(texts, expected);
    }

    #[test]
    fn test_extract_terms() {
        let q: Query = BooleanQuery::new()
            .must(TermQuery::new("body", "cat"))
            .should(PhraseQuery::new("body").term("black", 1).term("dog", 1))
            .into();
        let terms: Vec<String> = q.terms().into_iter().map(|t| t.text).collect();
        assert_eq!(terms, vec!["black", "cat", "dog"]);
    }
}
