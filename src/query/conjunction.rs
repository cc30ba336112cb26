//! Intersection of several scorers.

use crate::error::Result;
use crate::lexical::DocId;
use crate::query::scorer::{DocCursor, Scorer, ScorerState};

/// Matches documents on which every sub-scorer agrees.
///
/// The sub-scorers form a ring ordered by current document. The scorer at
/// the front of the ring always lags, so it is skipped to the document of the
/// one behind it until the front catches up with the back.
#[derive(Debug)]
pub(crate) struct ConjunctionScorer {
    scorers: Vec<Scorer>,
    first_idx: usize,
    first_time: bool,
    more: bool,
}

impl ConjunctionScorer {
    pub(crate) fn new(scorers: Vec<Scorer>) -> Self {
        let more = !scorers.is_empty();
        ConjunctionScorer {
            scorers,
            first_idx: 0,
            first_time: true,
            more,
        }
    }

    fn last_idx(&self) -> usize {
        (self.first_idx + self.scorers.len() - 1) % self.scorers.len()
    }

    fn sort_scorers(&mut self) {
        self.scorers.sort_by_key(|s| s.doc());
        self.first_idx = 0;
    }

    fn init(&mut self, advance: bool) -> Result<()> {
        self.first_time = false;
        if advance {
            for scorer in self.scorers.iter_mut() {
                if !scorer.next()? {
                    self.more = false;
                    return Ok(());
                }
            }
            self.sort_scorers();
        }
        Ok(())
    }

    fn do_next(&mut self) -> Result<Option<DocId>> {
        let n = self.scorers.len();
        let mut last_doc = self.scorers[self.last_idx()].doc();
        while self.more && self.scorers[self.first_idx].doc() < last_doc {
            self.more = self.scorers[self.first_idx].skip_to(last_doc)?;
            last_doc = self.scorers[self.first_idx].doc();
            self.first_idx = (self.first_idx + 1) % n;
        }
        Ok(if self.more {
            Some(self.scorers[self.first_idx].doc())
        } else {
            None
        })
    }
}

impl DocCursor for ConjunctionScorer {
    fn next_doc(&mut self) -> Result<Option<DocId>> {
        if self.scorers.is_empty() {
            return Ok(None);
        }
        if self.first_time {
            self.init(true)?;
        } else if self.more {
            let last = self.last_idx();
            self.more = self.scorers[last].next()?;
        }
        self.do_next()
    }

    fn skip_to_doc(&mut self, target: DocId) -> Result<Option<DocId>> {
        if self.scorers.is_empty() {
            return Ok(None);
        }
        if self.first_time {
            self.init(false)?;
        }
        for scorer in self.scorers.iter_mut() {
            if !self.more {
                break;
            }
            // Sub-scorers already at or past the target stay put.
            if scorer.state() == ScorerState::BeforeFirst || scorer.doc() < target {
                self.more = scorer.skip_to(target)?;
            }
        }
        if self.more {
            self.sort_scorers();
        }
        self.do_next()
    }

    fn score(&mut self, doc: DocId) -> Result<f32> {
        Ok(self.score_counted(doc)?.0)
    }

    fn score_counted(&mut self, _doc: DocId) -> Result<(f32, usize)> {
        let mut total = 0.0;
        let mut count = 0;
        for scorer in self.scorers.iter_mut() {
            let (score, matched) = scorer.score_counted()?;
            total += score;
            count += matched;
        }
        Ok((total, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::scorer::ScorerKind;
    use crate::query::scorer::tests::{doc_scorer, list_scorer};

    fn conjunction(lists: &[&[DocId]]) -> Scorer {
        let subs = lists.iter().map(|docs| doc_scorer(docs)).collect();
        Scorer::new(ScorerKind::Conjunction(ConjunctionScorer::new(subs)))
    }

    #[test]
    fn test_intersection() {
        let mut scorer = conjunction(&[&[1, 3, 5, 7, 9, 11], &[2, 3, 7, 8, 11], &[0, 3, 4, 7, 11, 12]]);
        assert_eq!(scorer.collect_docs().unwrap(), vec![3, 7, 11]);
    }

    #[test]
    fn test_skip_to_first() {
        let mut scorer = conjunction(&[&[1, 3, 5, 7], &[3, 5, 7]]);
        assert!(scorer.skip_to(4).unwrap());
        assert_eq!(scorer.doc(), 5);
        assert!(scorer.next().unwrap());
        assert_eq!(scorer.doc(), 7);
        assert!(!scorer.next().unwrap());
    }

    #[test]
    fn test_disjoint_and_empty() {
        assert!(conjunction(&[&[1, 3], &[2, 4]]).collect_docs().unwrap().is_empty());
        assert!(conjunction(&[&[1, 3], &[]]).collect_docs().unwrap().is_empty());
        assert!(conjunction(&[]).collect_docs().unwrap().is_empty());
    }

    #[test]
    fn test_scores_sum_and_count() {
        let subs = vec![list_scorer(&[(2, 1.5), (4, 1.0)]), list_scorer(&[(4, 2.0)])];
        let mut scorer = Scorer::new(ScorerKind::Conjunction(ConjunctionScorer::new(subs)));
        assert!(scorer.next().unwrap());
        assert_eq!(scorer.doc(), 4);
        assert_eq!(scorer.score_counted().unwrap(), (3.0, 2));
    }
}
