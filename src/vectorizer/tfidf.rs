use std::marker::PhantomData;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    error::{PipelineError, Result, Stage},
    vectorizer::{TermCounts, WeightedVector},
};

/// Weights at or below this are treated as zero and not stored.
pub const WEIGHT_EPSILON: f64 = 1e-12;

/// TF-IDF calculation strategy.
///
/// By implementing this trait a different weighting scheme can be plugged
/// into `TfIdfModel<E>`. `DefaultTfIdfEngine` does raw-count TF, log2 IDF and
/// unit-length normalization.
pub trait TfIdfEngine {
    /// local weight of a term occurring `count` times in a document
    fn tf(count: u32) -> f64;
    /// global weight of a term found in `doc_freq` of `num_docs` documents
    fn idf(num_docs: u64, doc_freq: u64) -> f64;
    /// in-place normalization of one document's weights
    fn normalize(weights: &mut [f64]);
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DefaultTfIdfEngine;

impl TfIdfEngine for DefaultTfIdfEngine {
    #[inline]
    fn tf(count: u32) -> f64 {
        count as f64
    }

    #[inline]
    fn idf(num_docs: u64, doc_freq: u64) -> f64 {
        if doc_freq == 0 {
            return 0.0;
        }
        (num_docs as f64 / doc_freq as f64).log2()
    }

    fn normalize(weights: &mut [f64]) {
        let norm = weights.iter().map(|w| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            weights.iter_mut().for_each(|w| *w /= norm);
        }
    }
}

/// IDF statistics fitted once on the training corpus.
///
/// The same fitted model must weight every later query batch; refitting on a
/// query batch makes its vectors incomparable with the topics learned at
/// training time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfIdfModel<E = DefaultTfIdfEngine> {
    /// idf per term id
    idf: Vec<f64>,
    /// documents the statistics were fitted on
    num_docs: u64,
    #[serde(skip)]
    _marker: PhantomData<E>,
}

impl<E> TfIdfModel<E>
where
    E: TfIdfEngine,
{
    /// Fit document frequencies over `corpus`, with ids in `0..num_terms`.
    pub fn fit(corpus: &[TermCounts], num_terms: usize) -> Result<Self> {
        if corpus.is_empty() {
            return Err(PipelineError::config(
                Stage::Encode,
                "cannot fit tf-idf statistics on an empty corpus",
            ));
        }
        let mut doc_freq = vec![0u64; num_terms];
        for (record, counts) in corpus.iter().enumerate() {
            for (id, _) in counts.iter() {
                let slot = doc_freq.get_mut(id as usize).ok_or_else(|| {
                    PipelineError::input(
                        Stage::Encode,
                        record,
                        format!("term id {id} outside vocabulary of {num_terms} terms"),
                    )
                })?;
                *slot += 1;
            }
        }
        let num_docs = corpus.len() as u64;
        let idf = doc_freq.iter().map(|&df| E::idf(num_docs, df)).collect();
        Ok(Self {
            idf,
            num_docs,
            _marker: PhantomData,
        })
    }

    #[inline]
    pub fn num_docs(&self) -> u64 {
        self.num_docs
    }

    #[inline]
    pub fn num_terms(&self) -> usize {
        self.idf.len()
    }

    #[inline]
    pub fn idf(&self, id: u32) -> f64 {
        self.idf.get(id as usize).copied().unwrap_or(0.0)
    }

    /// Weight one document. Ids unknown to the fitted statistics weigh 0.
    pub fn weight(&self, counts: &TermCounts) -> WeightedVector {
        if counts.is_empty() {
            return WeightedVector::new();
        }
        let mut ids = Vec::with_capacity(counts.nnz());
        let mut weights = Vec::with_capacity(counts.nnz());
        for (id, count) in counts.iter() {
            ids.push(id);
            weights.push(E::tf(count) * self.idf(id));
        }
        E::normalize(&mut weights);
        let pairs = ids
            .into_iter()
            .zip(weights)
            .filter(|(_, w)| w.abs() > WEIGHT_EPSILON);
        WeightedVector::from_pairs(pairs)
    }

    /// Weight a batch in parallel, keeping input order.
    pub fn weight_corpus(&self, corpus: &[TermCounts]) -> Vec<WeightedVector>
    where
        E: Sync,
    {
        corpus.par_iter().map(|c| self.weight(c)).collect()
    }
}
