use rayon::prelude::*;
use tracing::{debug, warn};

use crate::vectorizer::{
    tfidf::{DefaultTfIdfEngine, TfIdfEngine, TfIdfModel},
    vocab::Vocabulary,
    TermCounts, WeightedVector,
};

/// Encodes token sequences against a frozen vocabulary and tf-idf fit.
///
/// Borrowing both makes it impossible to encode with statistics other than
/// the ones the encoder was created with.
#[derive(Debug, Clone, Copy)]
pub struct DocumentEncoder<'a, E = DefaultTfIdfEngine> {
    vocabulary: &'a Vocabulary,
    tfidf: &'a TfIdfModel<E>,
}

impl<'a, E> DocumentEncoder<'a, E>
where
    E: TfIdfEngine + Sync,
{
    pub fn new(vocabulary: &'a Vocabulary, tfidf: &'a TfIdfModel<E>) -> Self {
        Self { vocabulary, tfidf }
    }

    #[inline]
    pub fn count_vector<T: AsRef<str>>(&self, tokens: &[T]) -> TermCounts {
        self.vocabulary.count_vector(tokens)
    }

    #[inline]
    pub fn encode<T: AsRef<str>>(&self, tokens: &[T]) -> WeightedVector {
        self.tfidf.weight(&self.count_vector(tokens))
    }

    /// Encode a batch, in parallel and in input order.
    ///
    /// Documents left with no weighted terms stay in the output as empty
    /// vectors; they are reported once per batch.
    pub fn encode_corpus<T>(&self, docs: &[Vec<T>]) -> Vec<WeightedVector>
    where
        T: AsRef<str> + Sync,
    {
        let counts: Vec<TermCounts> = docs.par_iter().map(|d| self.count_vector(d)).collect();
        let vectors = self.tfidf.weight_corpus(&counts);
        let degenerate: Vec<usize> = vectors
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_empty())
            .map(|(i, _)| i)
            .collect();
        if !degenerate.is_empty() {
            debug!(records = ?degenerate, "documents without weighted terms");
            warn!(
                degenerate = degenerate.len(),
                total = vectors.len(),
                "some documents have no surviving terms; they get empty vectors"
            );
        }
        vectors
    }
}
