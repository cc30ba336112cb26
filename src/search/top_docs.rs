//! Search results.

use std::fmt;

use serde::Serialize;

use crate::lexical::DocId;
use crate::search::sort::SortValue;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub doc: DocId,
    pub score: f32,
    /// One value per sort field when the search was sorted, else empty.
    pub sort_values: Vec<SortValue>,
}

impl Hit {
    pub fn new(doc: DocId, score: f32) -> Self {
        Hit {
            doc,
            score,
            sort_values: Vec::new(),
        }
    }
}

/// The retained hits of one search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopDocs {
    /// Every document that matched and passed the filters, retained or not.
    pub total_hits: usize,
    pub hits: Vec<Hit>,
    pub max_score: f32,
}

impl TopDocs {
    pub fn empty() -> Self {
        TopDocs {
            total_hits: 0,
            hits: Vec::new(),
            max_score: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn docs(&self) -> Vec<DocId> {
        self.hits.iter().map(|hit| hit.doc).collect()
    }
}

impl fmt::Display for TopDocs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} hits sorted by <score, doc_num>", self.total_hits)?;
        for hit in &self.hits {
            writeln!(f, "\t{}:{:.6}", hit.doc, hit.score)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let top = TopDocs {
            total_hits: 3,
            hits: vec![Hit::new(2, 1.5), Hit::new(0, 0.25)],
            max_score: 1.5,
        };
        assert_eq!(
            top.to_string(),
            "3 hits sorted by <score, doc_num>\n\t2:1.500000\n\t0:0.250000\n"
        );
        assert_eq!(top.docs(), vec![2, 0]);
        assert!(TopDocs::empty().is_empty());
    }
}
