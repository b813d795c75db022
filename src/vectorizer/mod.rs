pub mod encoder;
pub mod tfidf;
pub mod vocab;

use crate::utils::math::sparse::SparseVec;

/// Raw term counts of one document, keyed by term id.
pub type TermCounts = SparseVec<u32>;

/// Term-importance weights of one document, keyed by term id.
/// Absent ids have implicit weight 0; an empty vector is a valid document.
pub type WeightedVector = SparseVec<f64>;

pub use encoder::DocumentEncoder;
pub use tfidf::{DefaultTfIdfEngine, TfIdfEngine, TfIdfModel};
pub use vocab::{Vocabulary, VocabularyBuilder};
