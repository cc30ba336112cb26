//! Weights: queries bound to a searcher's statistics.
//!
//! Weight creation is a two-pass protocol. The searcher first asks the
//! weight tree for its sum of squared weights, derives a query norm from that
//! global aggregate, and then pushes the norm back down with
//! [`Weight::normalize`]. Only after normalization are weight values final.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::Result;
use crate::lexical::DocId;
use crate::lexical::reader::IndexReader;
use crate::query::Query;
use crate::query::scorer::Scorer;
use crate::search::explanation::Explanation;
use crate::search::searcher::Searcher;
use crate::search::similarity::Similarity;

pub trait Weight: Send + Sync + Debug {
    /// The rewritten query this weight was created from.
    fn query(&self) -> &Query;

    /// The final weight value, valid after [`Weight::normalize`].
    fn value(&self) -> f32;

    fn sum_of_squared_weights(&mut self) -> f32;

    fn normalize(&mut self, norm: f32);

    /// A scorer over `reader`, or `None` when nothing in `reader` can match.
    fn scorer(&self, reader: &dyn IndexReader) -> Result<Option<Scorer>>;

    /// Explain the score of `doc` without touching any live scorer.
    fn explain(&self, reader: &dyn IndexReader, doc: DocId) -> Result<Explanation>;
}

/// Rewrite `query`, create its weight and normalize it.
pub fn build_weight(query: &Query, searcher: &dyn Searcher) -> Result<Box<dyn Weight>> {
    let rewritten = searcher.rewrite(query)?;
    let mut weight = rewritten.create_weight(searcher)?;
    let sum = weight.sum_of_squared_weights();
    let norm = searcher.similarity().query_norm(sum);
    weight.normalize(norm);
    Ok(weight)
}

/// The idf-based weight state shared by the leaf weights.
#[derive(Debug, Clone)]
pub(crate) struct WeightCore {
    pub similarity: Arc<dyn Similarity>,
    pub boost: f32,
    pub idf: f32,
    pub qweight: f32,
    pub qnorm: f32,
    pub value: f32,
}

impl WeightCore {
    pub fn new(similarity: Arc<dyn Similarity>, boost: f32, idf: f32) -> Self {
        WeightCore {
            similarity,
            boost,
            idf,
            qweight: 0.0,
            qnorm: 0.0,
            value: boost,
        }
    }

    pub fn sum_of_squared_weights(&mut self) -> f32 {
        self.qweight = self.idf * self.boost;
        self.qweight * self.qweight
    }

    pub fn normalize(&mut self, norm: f32) {
        self.qnorm = norm;
        self.qweight *= norm;
        self.value = self.qweight * self.idf;
    }

    pub fn field_norm(&self, norms: Option<&Arc<Vec<u8>>>, doc: DocId) -> f32 {
        match norms.and_then(|n| n.get(doc as usize)) {
            Some(&b) => self.similarity.decode_norm(b),
            None => 1.0,
        }
    }

    /// The `query_weight × field_weight` breakdown shared by term-like
    /// weights. `tf` explains the frequency part for `doc`.
    pub fn explain_product(
        &self,
        reader: &dyn IndexReader,
        query: &Query,
        field: &str,
        idf_description: String,
        tf: Explanation,
        doc: DocId,
    ) -> Explanation {
        let query_str = query.to_string();

        let mut query_expl = Explanation::new(
            self.boost * self.idf * self.qnorm,
            format!("query_weight({query_str}), product of:"),
        );
        if self.boost != 1.0 {
            query_expl.add_detail(Explanation::new(self.boost, "boost"));
        }
        query_expl.add_detail(Explanation::new(self.idf, idf_description.clone()));
        query_expl.add_detail(Explanation::new(self.qnorm, "query_norm"));

        let norms = reader.norms(field);
        let field_norm = self.field_norm(norms.as_ref(), doc);
        let tf_value = tf.value;
        let field_expl = Explanation::new(
            tf_value * self.idf * field_norm,
            format!("field_weight({query_str} in {doc}), product of:"),
        )
        .with_detail(tf)
        .with_detail(Explanation::new(self.idf, idf_description))
        .with_detail(Explanation::new(
            field_norm,
            format!("field_norm(field={field}, doc={doc})"),
        ));

        if query_expl.value == 1.0 {
            return field_expl;
        }
        Explanation::new(
            query_expl.value * field_expl.value,
            format!("weight({query_str} in {doc}), product of:"),
        )
        .with_detail(query_expl)
        .with_detail(field_expl)
    }
}
