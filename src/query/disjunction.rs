//! Union of several scorers with a minimum number of agreeing matches.

use crate::error::{GlaiveError, Result};
use crate::lexical::DocId;
use crate::query::scorer::{DocCursor, Scorer};
use crate::util::priority_queue::PriorityQueue;

fn scorer_lt(a: &Scorer, b: &Scorer) -> bool {
    a.doc() < b.doc()
}

/// Matches documents on which at least `min_matches` sub-scorers agree.
///
/// Sub-scorers sit in a heap ordered by current document. Each step pops
/// every scorer positioned on the smallest document, summing their scores,
/// and reports the document only when enough of them agreed.
#[derive(Debug)]
pub(crate) struct DisjunctionScorer {
    pending: Vec<Scorer>,
    queue: PriorityQueue<Scorer>,
    min_matches: usize,
    initialized: bool,
    curr_doc: Option<DocId>,
    curr_score: f32,
    num_matches: usize,
}

impl DisjunctionScorer {
    pub(crate) fn new(scorers: Vec<Scorer>, min_matches: usize) -> Result<Self> {
        if min_matches == 0 {
            return Err(GlaiveError::invalid_argument(
                "min_num_matches must be at least 1",
            ));
        }
        let capacity = scorers.len();
        let lt: fn(&Scorer, &Scorer) -> bool = scorer_lt;
        Ok(DisjunctionScorer {
            pending: scorers,
            queue: PriorityQueue::new(capacity, lt),
            min_matches,
            initialized: false,
            curr_doc: None,
            curr_score: 0.0,
            num_matches: 0,
        })
    }

    fn init(&mut self) -> Result<()> {
        self.initialized = true;
        for mut scorer in std::mem::take(&mut self.pending) {
            if scorer.next()? {
                self.queue.push(scorer);
            }
        }
        Ok(())
    }

    /// Consume the group of scorers on the smallest document until a group
    /// of at least `min_matches` is found.
    fn advance_after_current(&mut self) -> Result<Option<DocId>> {
        loop {
            let Some(top) = self.queue.top_mut() else {
                return Ok(None);
            };
            let doc = top.doc();
            let (score, matched) = top.score_counted()?;
            self.curr_doc = Some(doc);
            self.curr_score = score;
            self.num_matches = matched;

            loop {
                let Some(top) = self.queue.top_mut() else {
                    break;
                };
                if top.next()? {
                    self.queue.down();
                } else {
                    self.queue.pop();
                }
                let Some(top) = self.queue.top_mut() else {
                    break;
                };
                if top.doc() != doc {
                    break;
                }
                let (score, matched) = top.score_counted()?;
                self.curr_score += score;
                self.num_matches += matched;
            }

            if self.num_matches >= self.min_matches {
                return Ok(Some(doc));
            }
            if self.queue.len() < self.min_matches {
                return Ok(None);
            }
        }
    }
}

impl DocCursor for DisjunctionScorer {
    fn next_doc(&mut self) -> Result<Option<DocId>> {
        if !self.initialized {
            self.init()?;
        }
        if self.queue.len() < self.min_matches {
            return Ok(None);
        }
        self.advance_after_current()
    }

    fn skip_to_doc(&mut self, target: DocId) -> Result<Option<DocId>> {
        if !self.initialized {
            self.init()?;
        }
        loop {
            if self.queue.len() < self.min_matches {
                return Ok(None);
            }
            let Some(top) = self.queue.top_mut() else {
                return Ok(None);
            };
            if top.doc() >= target {
                return self.advance_after_current();
            }
            if top.skip_to(target)? {
                self.queue.down();
            } else {
                self.queue.pop();
            }
        }
    }

    fn score(&mut self, _doc: DocId) -> Result<f32> {
        Ok(self.curr_score)
    }

    fn score_counted(&mut self, _doc: DocId) -> Result<(f32, usize)> {
        Ok((self.curr_score, self.num_matches))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::scorer::ScorerKind;
    use crate::query::scorer::tests::{doc_scorer, list_scorer};

    fn disjunction(lists: &[&[DocId]], min: usize) -> Scorer {
        let subs = lists.iter().map(|docs| doc_scorer(docs)).collect();
        Scorer::new(ScorerKind::Disjunction(
            DisjunctionScorer::new(subs, min).unwrap(),
        ))
    }

    const LISTS: [&[DocId]; 3] = [&[1, 2, 5, 8], &[2, 3, 5], &[0, 2, 8, 9]];

    #[test]
    fn test_union() {
        let mut scorer = disjunction(&LISTS, 1);
        assert_eq!(scorer.collect_docs().unwrap(), vec![0, 1, 2, 3, 5, 8, 9]);
    }

    #[test]
    fn test_min_matches_boundaries() {
        assert_eq!(disjunction(&LISTS, 2).collect_docs().unwrap(), vec![2, 5, 8]);
        // Every scorer must agree.
        assert_eq!(disjunction(&LISTS, 3).collect_docs().unwrap(), vec![2]);
        // More required matches than scorers.
        assert!(disjunction(&LISTS, 4).collect_docs().unwrap().is_empty());
    }

    #[test]
    fn test_remaining_scorers_equal_to_minimum() {
        // After doc 4 only two scorers remain, exactly the minimum.
        let lists: [&[DocId]; 3] = [&[4], &[4, 6, 7], &[1, 6]];
        assert_eq!(disjunction(&lists, 2).collect_docs().unwrap(), vec![4, 6]);
    }

    #[test]
    fn test_zero_minimum_is_rejected() {
        let err = DisjunctionScorer::new(vec![doc_scorer(&[1])], 0).unwrap_err();
        assert!(matches!(err, GlaiveError::InvalidArgument(_)));
    }

    #[test]
    fn test_skip_to_with_minimum() {
        let mut scorer = disjunction(&LISTS, 2);
        assert!(scorer.skip_to(3).unwrap());
        assert_eq!(scorer.doc(), 5);
        assert!(scorer.skip_to(6).unwrap());
        assert_eq!(scorer.doc(), 8);
        assert!(!scorer.next().unwrap());
    }

    #[test]
    fn test_scores_and_counts() {
        let subs = vec![
            list_scorer(&[(1, 0.5), (3, 1.0)]),
            list_scorer(&[(3, 2.0)]),
        ];
        let mut scorer = Scorer::new(ScorerKind::Disjunction(
            DisjunctionScorer::new(subs, 1).unwrap(),
        ));
        assert!(scorer.next().unwrap());
        assert_eq!(scorer.score_counted().unwrap(), (0.5, 1));
        assert!(scorer.next().unwrap());
        assert_eq!(scorer.doc(), 3);
        assert_eq!(scorer.score_counted().unwrap(), (3.0, 2));
    }
}
