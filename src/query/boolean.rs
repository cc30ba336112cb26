//! Boolean combinations of queries.

use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::error::{GlaiveError, Result};
use crate::lexical::DocId;
use crate::lexical::reader::IndexReader;
use crate::query::boolean_scorer::BooleanScorer;
use crate::query::scorer::{Scorer, ScorerKind};
use crate::query::weight::Weight;
use crate::query::{Query, boost_suffix};
use crate::search::SearchConfig;
use crate::search::explanation::Explanation;
use crate::search::searcher::Searcher;
use crate::search::similarity::Similarity;

/// How a clause takes part in a boolean query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occur {
    /// The clause must match.
    Must,
    /// The clause may match and adds to the score when it does.
    Should,
    /// Documents matching the clause are excluded.
    MustNot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanClause {
    pub query: Query,
    pub occur: Occur,
}

impl BooleanClause {
    pub fn new(query: Query, occur: Occur) -> Self {
        BooleanClause { query, occur }
    }

    pub fn is_required(&self) -> bool {
        self.occur == Occur::Must
    }

    pub fn is_prohibited(&self) -> bool {
        self.occur == Occur::MustNot
    }
}

/// A query matching documents by combining clauses.
///
/// Documents must match every [`Occur::Must`] clause and no
/// [`Occur::MustNot`] clause. Without required clauses at least one optional
/// clause (or `min_should_match` of them) must match. Scores are the sum of
/// the matching clause scores times a coordination factor rewarding documents
/// that match more clauses.
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanQuery {
    clauses: Vec<BooleanClause>,
    coord_disabled: bool,
    min_should_match: usize,
    boost: f32,
}

impl BooleanQuery {
    pub fn new() -> Self {
        BooleanQuery {
            clauses: Vec::new(),
            coord_disabled: false,
            min_should_match: 0,
            boost: 1.0,
        }
    }

    pub fn clauses(&self) -> &[BooleanClause] {
        &self.clauses
    }

    pub fn add_clause<Q: Into<Query>>(&mut self, query: Q, occur: Occur) {
        self.clauses.push(BooleanClause::new(query.into(), occur));
    }

    pub fn must<Q: Into<Query>>(mut self, query: Q) -> Self {
        self.add_clause(query, Occur::Must);
        self
    }

    pub fn should<Q: Into<Query>>(mut self, query: Q) -> Self {
        self.add_clause(query, Occur::Should);
        self
    }

    pub fn must_not<Q: Into<Query>>(mut self, query: Q) -> Self {
        self.add_clause(query, Occur::MustNot);
        self
    }

    pub fn is_coord_disabled(&self) -> bool {
        self.coord_disabled
    }

    /// Disable the coordination factor, for queries whose clauses are
    /// alternatives of one another (expanded terms, for instance).
    pub fn with_coord_disabled(mut self, disabled: bool) -> Self {
        self.coord_disabled = disabled;
        self
    }

    pub fn min_should_match(&self) -> usize {
        self.min_should_match
    }

    /// Require at least `min` optional clauses to match.
    pub fn with_min_should_match(mut self, min: usize) -> Self {
        self.min_should_match = min;
        self
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

    /// Whether this query is a plain union of alternatives that can be split
    /// into its clauses when merging rewrites.
    pub fn is_splittable(&self) -> bool {
        self.coord_disabled
            && self.min_should_match == 0
            && self.clauses.iter().all(|c| c.occur == Occur::Should)
    }

    pub(crate) fn rewrite(&self, reader: &dyn IndexReader, config: &SearchConfig) -> Result<Query> {
        if self.clauses.len() > config.max_clause_count {
            return Err(GlaiveError::state(format!(
                "boolean query has {} clauses, more than the maximum of {}",
                self.clauses.len(),
                config.max_clause_count
            )));
        }

        if let [clause] = self.clauses.as_slice() {
            let collapsible = match clause.occur {
                Occur::Must => self.min_should_match == 0,
                Occur::Should => self.min_should_match <= 1,
                Occur::MustNot => false,
            };
            if collapsible {
                let mut rewritten = clause.query.rewrite(reader, config)?;
                let boost = rewritten.boost() * self.boost;
                rewritten.set_boost(boost);
                return Ok(rewritten);
            }
        }

        let mut rewritten = self.clone();
        for clause in rewritten.clauses.iter_mut() {
            clause.query = clause.query.rewrite(reader, config)?;
        }
        Ok(Query::Boolean(rewritten))
    }

    pub(crate) fn create_weight(
        &self,
        query: &Query,
        searcher: &dyn Searcher,
    ) -> Result<Box<dyn Weight>> {
        let mut weights = Vec::with_capacity(self.clauses.len());
        for clause in &self.clauses {
            weights.push(clause.query.create_weight(searcher)?);
        }
        Ok(Box::new(BooleanWeight {
            query: query.clone(),
            similarity: searcher.similarity(),
            occurs: self.clauses.iter().map(|c| c.occur).collect(),
            weights,
            coord_disabled: self.coord_disabled,
            min_should_match: self.min_should_match,
            boost: self.boost,
        }))
    }
}

impl Default for BooleanQuery {
    fn default() -> Self {
        BooleanQuery::new()
    }
}

impl fmt::Display for BooleanQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let boosted = self.boost != 1.0;
        if boosted {
            write!(f, "(")?;
        }
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            match clause.occur {
                Occur::Must => write!(f, "+")?,
                Occur::MustNot => write!(f, "-")?,
                Occur::Should => {}
            }
            match &clause.query {
                Query::Boolean(sub) => write!(f, "({sub})")?,
                sub => write!(f, "{sub}")?,
            }
        }
        if self.min_should_match > 0 {
            write!(f, "~{}", self.min_should_match)?;
        }
        if boosted {
            write!(f, "){}", boost_suffix(self.boost))?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct BooleanWeight {
    query: Query,
    similarity: Arc<dyn Similarity>,
    occurs: Vec<Occur>,
    weights: Vec<Box<dyn Weight>>,
    coord_disabled: bool,
    min_should_match: usize,
    boost: f32,
}

impl BooleanWeight {
    fn coord(&self, overlap: usize, max_overlap: usize) -> f32 {
        if self.coord_disabled {
            1.0
        } else {
            self.similarity.coord(overlap, max_overlap)
        }
    }
}

impl Weight for BooleanWeight {
    fn query(&self) -> &Query {
        &self.query
    }

    fn value(&self) -> f32 {
        self.boost
    }

    fn sum_of_squared_weights(&mut self) -> f32 {
        let mut sum = 0.0;
        for (weight, occur) in self.weights.iter_mut().zip(&self.occurs) {
            let s = weight.sum_of_squared_weights();
            if *occur != Occur::MustNot {
                sum += s;
            }
        }
        sum * self.boost * self.boost
    }

    fn normalize(&mut self, norm: f32) {
        let norm = norm * self.boost;
        for weight in self.weights.iter_mut() {
            weight.normalize(norm);
        }
    }

    fn scorer(&self, reader: &dyn IndexReader) -> Result<Option<Scorer>> {
        let mut required = Vec::new();
        let mut optional = Vec::new();
        let mut prohibited = Vec::new();
        for (weight, occur) in self.weights.iter().zip(&self.occurs) {
            match (weight.scorer(reader)?, occur) {
                (Some(s), Occur::Must) => required.push(s),
                (Some(s), Occur::Should) => optional.push(s),
                (Some(s), Occur::MustNot) => prohibited.push(s),
                (None, Occur::Must) => return Ok(None),
                (None, _) => {}
            }
        }

        let max_coord = self.occurs.iter().filter(|&&o| o != Occur::MustNot).count();
        if required.is_empty() && optional.is_empty() {
            debug!("{} has no clause that can match", self.query);
            return Ok(Some(Scorer::empty()));
        }
        let coord_factors = (0..=max_coord).map(|i| self.coord(i, max_coord)).collect();
        let scorer = BooleanScorer::new(
            required,
            optional,
            prohibited,
            self.min_should_match,
            coord_factors,
        )?;
        Ok(Some(Scorer::new(ScorerKind::Boolean(scorer))))
    }

    fn explain(&self, reader: &dyn IndexReader, doc: DocId) -> Result<Explanation> {
        let mut sum_expl = Explanation::new(0.0, "sum of:");
        let mut coord = 0;
        let mut max_coord = 0;
        let mut should_matched = 0;
        let mut sum = 0.0;

        for (weight, occur) in self.weights.iter().zip(&self.occurs) {
            let explanation = weight.explain(reader, doc)?;
            if *occur != Occur::MustNot {
                max_coord += 1;
            }
            if explanation.value > 0.0 {
                match occur {
                    Occur::MustNot => return Ok(Explanation::new(0.0, "match prohibited")),
                    Occur::Should => should_matched += 1,
                    Occur::Must => {}
                }
                sum += explanation.value;
                coord += 1;
                sum_expl.add_detail(explanation);
            } else if *occur == Occur::Must {
                return Ok(Explanation::new(0.0, "match required"));
            }
        }

        let min_should = if self.occurs.contains(&Occur::Must) {
            self.min_should_match
        } else {
            self.min_should_match.max(1)
        };
        if should_matched < min_should {
            return Ok(Explanation::new(
                0.0,
                format!("failed to match {min_should} optional clause(s), matched {should_matched}"),
            ));
        }

        sum_expl.value = sum;
        if coord == 1 {
            sum_expl = sum_expl.details.remove(0);
        }

        let coord_factor = self.coord(coord, max_coord);
        if coord_factor == 1.0 {
            return Ok(sum_expl);
        }
        Ok(Explanation::new(sum * coord_factor, "product of:")
            .with_detail(sum_expl)
            .with_detail(Explanation::new(
                coord_factor,
                format!("coord({coord}/{max_coord})"),
            )))
    }
}
