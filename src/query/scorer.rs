//! The scorer cursor.
//!
//! Every scorer moves through three states: before its first document,
//! positioned on a matching document, and exhausted. [`Scorer`] owns that
//! state machine and delegates the actual matching to one of the scorer kinds,
//! so the kinds only have to find "the next match at or after a document".
//! Documents reported by one scorer strictly increase, and an exhausted scorer
//! never moves again.

use crate::error::{GlaiveError, Result};
use crate::lexical::DocId;
use crate::query::boolean_scorer::{BooleanScorer, ReqExclScorer, ReqOptScorer};
use crate::query::conjunction::ConjunctionScorer;
use crate::query::constant_score::ConstantScoreScorer;
use crate::query::disjunction::DisjunctionScorer;
use crate::query::filtered::FilteredScorer;
use crate::query::match_all::MatchAllScorer;
use crate::query::multi_term::MultiTermScorer;
use crate::query::phrase::PhraseScorer;
use crate::query::span::SpanScorer;
use crate::query::term::TermScorer;

/// Sentinel document reported by an exhausted scorer.
pub const NO_MORE_DOCS: DocId = DocId::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScorerState {
    BeforeFirst,
    Positioned(DocId),
    Exhausted,
}

/// The matching logic behind a [`Scorer`].
pub(crate) trait DocCursor {
    /// The next match after the previous one, or the first match.
    fn next_doc(&mut self) -> Result<Option<DocId>>;

    /// The first match `>= target`. `target` is always past the previous
    /// match.
    fn skip_to_doc(&mut self, target: DocId) -> Result<Option<DocId>>;

    fn score(&mut self, doc: DocId) -> Result<f32>;

    /// Score together with the number of boolean clauses that matched.
    fn score_counted(&mut self, doc: DocId) -> Result<(f32, usize)> {
        Ok((self.score(doc)?, 1))
    }
}

#[derive(Debug)]
pub(crate) enum ScorerKind {
    Empty,
    Term(TermScorer),
    MultiTerm(MultiTermScorer),
    Boolean(BooleanScorer),
    Conjunction(ConjunctionScorer),
    Disjunction(DisjunctionScorer),
    ReqExcl(ReqExclScorer),
    ReqOpt(ReqOptScorer),
    Phrase(PhraseScorer),
    Span(SpanScorer),
    ConstantScore(ConstantScoreScorer),
    MatchAll(MatchAllScorer),
    Filtered(FilteredScorer),
    #[cfg(test)]
    List(tests::ListScorer),
}

macro_rules! dispatch {
    ($kind:expr, $s:ident => $body:expr, $empty:expr) => {
        match $kind {
            ScorerKind::Empty => $empty,
            ScorerKind::Term($s) => $body,
            ScorerKind::MultiTerm($s) => $body,
            ScorerKind::Boolean($s) => $body,
            ScorerKind::Conjunction($s) => $body,
            ScorerKind::Disjunction($s) => $body,
            ScorerKind::ReqExcl($s) => $body,
            ScorerKind::ReqOpt($s) => $body,
            ScorerKind::Phrase($s) => $body,
            ScorerKind::Span($s) => $body,
            ScorerKind::ConstantScore($s) => $body,
            ScorerKind::MatchAll($s) => $body,
            ScorerKind::Filtered($s) => $body,
            #[cfg(test)]
            ScorerKind::List($s) => $body,
        }
    };
}

/// A forward-only cursor over matching documents and their scores.
#[derive(Debug)]
pub struct Scorer {
    state: ScorerState,
    pub(crate) kind: ScorerKind,
}

impl Scorer {
    pub(crate) fn new(kind: ScorerKind) -> Self {
        Scorer {
            state: ScorerState::BeforeFirst,
            kind,
        }
    }

    /// A scorer that matches nothing.
    pub fn empty() -> Self {
        Scorer::new(ScorerKind::Empty)
    }

    pub fn state(&self) -> ScorerState {
        self.state
    }

    /// The current document. Meaningless before the first `next`/`skip_to`;
    /// [`NO_MORE_DOCS`] once exhausted.
    pub fn doc(&self) -> DocId {
        match self.state {
            ScorerState::BeforeFirst => 0,
            ScorerState::Positioned(doc) => doc,
            ScorerState::Exhausted => NO_MORE_DOCS,
        }
    }

    /// Advance to the next matching document.
    pub fn next(&mut self) -> Result<bool> {
        if self.state == ScorerState::Exhausted {
            return Ok(false);
        }
        let found = dispatch!(&mut self.kind, s => s.next_doc()?, None);
        Ok(self.settle(found))
    }

    /// Advance to the first matching document `>= target`. Never moves
    /// backwards: a target at or before the current document advances to the
    /// next match.
    pub fn skip_to(&mut self, target: DocId) -> Result<bool> {
        let target = match self.state {
            ScorerState::Exhausted => return Ok(false),
            ScorerState::BeforeFirst => target,
            ScorerState::Positioned(doc) => {
                if doc == NO_MORE_DOCS - 1 {
                    self.state = ScorerState::Exhausted;
                    return Ok(false);
                }
                target.max(doc + 1)
            }
        };
        let found = dispatch!(&mut self.kind, s => s.skip_to_doc(target)?, None);
        Ok(self.settle(found))
    }

    fn settle(&mut self, found: Option<DocId>) -> bool {
        match found {
            Some(doc) => {
                debug_assert!(
                    !matches!(self.state, ScorerState::Positioned(prev) if prev >= doc),
                    "scorer moved backwards to {doc} from {:?}",
                    self.state
                );
                self.state = ScorerState::Positioned(doc);
                true
            }
            None => {
                self.state = ScorerState::Exhausted;
                false
            }
        }
    }

    /// Score of the current document.
    pub fn score(&mut self) -> Result<f32> {
        Ok(self.score_counted()?.0)
    }

    pub(crate) fn score_counted(&mut self) -> Result<(f32, usize)> {
        let ScorerState::Positioned(doc) = self.state else {
            return Err(GlaiveError::state(format!(
                "score requested from a scorer in state {:?}",
                self.state
            )));
        };
        dispatch!(&mut self.kind, s => s.score_counted(doc), Ok((0.0, 0)))
    }

    /// Collect every remaining document, for tests and diagnostics.
    pub fn collect_docs(&mut self) -> Result<Vec<DocId>> {
        let mut docs = Vec::new();
        while self.next()? {
            docs.push(self.doc());
        }
        Ok(docs)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A scorer kind over a fixed list of `(doc, score)` pairs.
    #[derive(Debug)]
    pub(crate) struct ListScorer {
        hits: Vec<(DocId, f32)>,
        idx: usize,
    }

    impl DocCursor for ListScorer {
        fn next_doc(&mut self) -> Result<Option<DocId>> {
            let hit = self.hits.get(self.idx).map(|&(doc, _)| doc);
            self.idx += 1;
            Ok(hit)
        }

        fn skip_to_doc(&mut self, target: DocId) -> Result<Option<DocId>> {
            while let Some(&(doc, _)) = self.hits.get(self.idx) {
                if doc >= target {
                    break;
                }
                self.idx += 1;
            }
            self.next_doc()
        }

        fn score(&mut self, doc: DocId) -> Result<f32> {
            Ok(self
                .hits
                .iter()
                .find(|&&(d, _)| d == doc)
                .map_or(0.0, |&(_, s)| s))
        }
    }

    /// A scorer over fixed hits.
    pub(crate) fn list_scorer(hits: &[(DocId, f32)]) -> Scorer {
        Scorer::new(ScorerKind::List(ListScorer {
            hits: hits.to_vec(),
            idx: 0,
        }))
    }

    /// A scorer over fixed documents, each scoring 1.0.
    pub(crate) fn doc_scorer(docs: &[DocId]) -> Scorer {
        let hits: Vec<(DocId, f32)> = docs.iter().map(|&d| (d, 1.0)).collect();
        list_scorer(&hits)
    }

    #[test]
    fn test_empty_scorer() {
        let mut scorer = Scorer::empty();
        assert_eq!(scorer.state(), ScorerState::BeforeFirst);
        assert!(!scorer.next().unwrap());
        assert_eq!(scorer.state(), ScorerState::Exhausted);
        assert_eq!(scorer.doc(), NO_MORE_DOCS);
        assert!(!scorer.skip_to(0).unwrap());
        assert!(scorer.score().is_err());
    }

    #[test]
    fn test_skip_to_never_moves_backwards() {
        let mut scorer = doc_scorer(&[1, 4, 7]);
        assert!(scorer.skip_to(4).unwrap());
        assert_eq!(scorer.doc(), 4);
        assert!(scorer.skip_to(2).unwrap());
        assert_eq!(scorer.doc(), 7);
        assert!(!scorer.skip_to(7).unwrap());
        assert!(!scorer.next().unwrap());
    }

    #[test]
    fn test_score_requires_position() {
        let mut scorer = list_scorer(&[(3, 2.5)]);
        assert!(scorer.score().is_err());
        assert!(scorer.next().unwrap());
        assert_eq!(scorer.score().unwrap(), 2.5);
        assert_eq!(scorer.collect_docs().unwrap(), Vec::<DocId>::new());
    }
}
