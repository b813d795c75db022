use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::{PipelineError, Result, Stage},
    vectorizer::TermCounts,
};

/// Frozen term vocabulary.
///
/// Term ids are dense (`0..len`) and follow first-seen order over the
/// training corpus. Every encoding, at training and at query time, must go
/// through the same instance; a different vocabulary renumbers terms and
/// makes topic assignments meaningless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    /// term -> document frequency; the term id is the map index
    #[serde(with = "indexmap::map::serde_seq")]
    terms: IndexMap<String, u64>,
    /// documents in the corpus the vocabulary was built from
    num_docs: u64,
}

impl Vocabulary {
    #[inline]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    #[inline]
    pub fn num_docs(&self) -> u64 {
        self.num_docs
    }

    #[inline]
    pub fn id(&self, term: &str) -> Option<u32> {
        self.terms.get_index_of(term).map(|i| i as u32)
    }

    #[inline]
    pub fn term(&self, id: u32) -> Option<&str> {
        self.terms.get_index(id as usize).map(|(t, _)| t.as_str())
    }

    #[inline]
    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains_key(term)
    }

    /// Number of training documents containing the term.
    #[inline]
    pub fn doc_freq(&self, id: u32) -> u64 {
        self.terms.get_index(id as usize).map_or(0, |(_, df)| *df)
    }

    /// `(id, term, doc_freq)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str, u64)> + '_ {
        self.terms
            .iter()
            .enumerate()
            .map(|(i, (t, df))| (i as u32, t.as_str(), *df))
    }

    /// Terms in id order, for rendering topics.
    pub fn terms(&self) -> Vec<String> {
        self.terms.keys().cloned().collect()
    }

    /// Bag-of-words for one token sequence.
    /// Tokens outside the vocabulary were pruned on purpose and are dropped.
    pub fn count_vector<T>(&self, tokens: &[T]) -> TermCounts
    where
        T: AsRef<str>,
    {
        let (inds, vals): (Vec<u32>, Vec<u32>) = tokens
            .iter()
            .filter_map(|tok| self.id(tok.as_ref()))
            .map(|id| (id, 1u32))
            .unzip();
        TermCounts::from_unsorted(inds, vals)
    }
}

/// Builds a `Vocabulary` with a two-sided document-frequency filter.
///
/// A term survives when it occurs in at least `min_doc_count` documents and
/// in at most `max_doc_fraction` of all documents. When more than `keep_n`
/// terms survive only the `keep_n` most frequent are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyBuilder {
    pub min_doc_count: u64,
    pub max_doc_fraction: f64,
    pub keep_n: Option<usize>,
}

impl Default for VocabularyBuilder {
    fn default() -> Self {
        Self {
            min_doc_count: 15,
            max_doc_fraction: 0.5,
            keep_n: Some(100_000),
        }
    }
}

impl VocabularyBuilder {
    pub fn new(min_doc_count: u64, max_doc_fraction: f64) -> Self {
        Self {
            min_doc_count,
            max_doc_fraction,
            ..Self::default()
        }
    }

    pub fn keep_n(mut self, keep_n: Option<usize>) -> Self {
        self.keep_n = keep_n;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.max_doc_fraction > 0.0 && self.max_doc_fraction <= 1.0) {
            return Err(PipelineError::config(
                Stage::Vocabulary,
                format!("max_doc_fraction must be in (0, 1], got {}", self.max_doc_fraction),
            ));
        }
        if self.keep_n == Some(0) {
            return Err(PipelineError::config(Stage::Vocabulary, "keep_n must be positive"));
        }
        Ok(())
    }

    /// Whether a term with document frequency `df` passes the filter.
    #[inline]
    pub fn retains(&self, df: u64, num_docs: u64) -> bool {
        df >= self.min_doc_count && (df as f64) <= self.max_doc_fraction * num_docs as f64
    }

    pub fn build<T>(&self, corpus: &[Vec<T>]) -> Result<Vocabulary>
    where
        T: AsRef<str>,
    {
        self.validate()?;
        if corpus.is_empty() {
            return Err(PipelineError::config(
                Stage::Vocabulary,
                "cannot build a vocabulary from an empty corpus",
            ));
        }
        let num_docs = corpus.len() as u64;

        // term -> (df, last document that counted it)
        let mut seen: IndexMap<String, (u64, usize)> = IndexMap::new();
        for (doc_idx, doc) in corpus.iter().enumerate() {
            for tok in doc {
                let tok = tok.as_ref();
                match seen.get_mut(tok) {
                    Some((df, last)) => {
                        if *last != doc_idx {
                            *df += 1;
                            *last = doc_idx;
                        }
                    }
                    None => {
                        seen.insert(tok.to_string(), (1, doc_idx));
                    }
                }
            }
        }
        let distinct = seen.len();

        let mut retained: Vec<(String, u64)> = seen
            .into_iter()
            .map(|(term, (df, _))| (term, df))
            .filter(|(_, df)| self.retains(*df, num_docs))
            .collect();

        if let Some(keep_n) = self.keep_n {
            if retained.len() > keep_n {
                let mut order: Vec<usize> = (0..retained.len()).collect();
                // stable: equal df keeps first-seen order
                order.sort_by(|&a, &b| retained[b].1.cmp(&retained[a].1));
                let mut keep = vec![false; retained.len()];
                for &i in order.iter().take(keep_n) {
                    keep[i] = true;
                }
                let mut flags = keep.into_iter();
                retained.retain(|_| flags.next().unwrap_or(false));
            }
        }

        if retained.is_empty() {
            return Err(PipelineError::config(
                Stage::Vocabulary,
                format!(
                    "frequency filter (min_doc_count={}, max_doc_fraction={}) removed all {} terms of {} documents",
                    self.min_doc_count, self.max_doc_fraction, distinct, num_docs
                ),
            ));
        }

        let terms: IndexMap<String, u64> = retained.into_iter().collect();
        debug!(distinct, kept = terms.len(), "vocabulary filter applied");
        info!(
            docs = num_docs,
            terms = terms.len(),
            removed = distinct - terms.len(),
            "built vocabulary"
        );
        Ok(Vocabulary { terms, num_docs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Vec<&'static str>> {
        vec![
            vec!["stock", "market", "ralli", "today"],
            vec!["market", "fall", "sharp", "today", "market"],
            vec!["weather", "turn", "cold", "today"],
        ]
    }

    #[test]
    fn ids_follow_first_seen_order() {
        let vocab = VocabularyBuilder::new(1, 1.0).build(&corpus()).unwrap();
        assert_eq!(vocab.len(), 9);
        assert_eq!(vocab.id("stock"), Some(0));
        assert_eq!(vocab.id("market"), Some(1));
        assert_eq!(vocab.id("fall"), Some(4));
        assert_eq!(vocab.term(8), Some("cold"));
        // counted per document, not per occurrence
        assert_eq!(vocab.doc_freq(1), 2);
        assert_eq!(vocab.doc_freq(3), 3);
    }

    #[test]
    fn max_fraction_drops_ubiquitous_terms_and_compacts_ids() {
        let vocab = VocabularyBuilder::new(1, 0.9).build(&corpus()).unwrap();
        assert!(!vocab.contains("today"));
        assert_eq!(vocab.len(), 8);
        assert_eq!(vocab.id("fall"), Some(3));
        let ids: Vec<u32> = vocab.iter().map(|(id, _, _)| id).collect();
        assert_eq!(ids, (0..8).collect::<Vec<u32>>());
    }

    #[test]
    fn min_count_drops_rare_terms() {
        let vocab = VocabularyBuilder::new(2, 1.0).build(&corpus()).unwrap();
        assert_eq!(vocab.terms(), vec!["market".to_string(), "today".to_string()]);
    }

    #[test]
    fn keep_n_keeps_most_frequent() {
        let vocab = VocabularyBuilder::new(1, 1.0)
            .keep_n(Some(2))
            .build(&corpus())
            .unwrap();
        assert_eq!(vocab.terms(), vec!["market".to_string(), "today".to_string()]);
    }

    #[test]
    fn filter_invariants_hold_for_every_term() {
        let docs: Vec<Vec<String>> = (0..40)
            .map(|i| (0..6).map(|j| format!("t{}", (i * j + j) % 13)).collect())
            .collect();
        let builder = VocabularyBuilder::new(5, 0.5);
        let vocab = builder.build(&docs).unwrap();
        for (_, term, df) in vocab.iter() {
            assert!(df >= 5, "{term} df={df}");
            assert!(df as f64 <= 0.5 * 40.0, "{term} df={df}");
        }
        // every removed term violates a bound
        let mut all: Vec<String> = docs.iter().flatten().cloned().collect();
        all.sort();
        all.dedup();
        for term in all.iter().filter(|t| !vocab.contains(t)) {
            let df = docs.iter().filter(|d| d.contains(term)).count() as u64;
            assert!(!builder.retains(df, 40), "{term} df={df} should have been kept");
        }
    }

    #[test]
    fn building_twice_is_identical() {
        let a = VocabularyBuilder::new(1, 0.9).build(&corpus()).unwrap();
        let b = VocabularyBuilder::new(1, 0.9).build(&corpus()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_empty_corpus_and_empty_result() {
        let empty: Vec<Vec<String>> = Vec::new();
        let err = VocabularyBuilder::default().build(&empty).unwrap_err();
        assert_eq!(err.stage(), Stage::Vocabulary);

        let err = VocabularyBuilder::new(10, 0.5).build(&corpus()).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));

        let err = VocabularyBuilder::new(1, 0.0).build(&corpus()).unwrap_err();
        assert!(err.to_string().contains("max_doc_fraction"));
    }

    #[test]
    fn count_vector_drops_unknown_tokens() {
        let vocab = VocabularyBuilder::new(1, 1.0).build(&corpus()).unwrap();
        let counts = vocab.count_vector(&["market", "zebra", "market", "stock"]);
        assert_eq!(counts.indices(), &[0, 1]);
        assert_eq!(counts.values(), &[1, 2]);
        assert!(vocab.count_vector(&["zebra"]).is_empty());
    }
}
