pub mod lemma;
pub mod tokenizer;

pub use lemma::VerbLemmatizer;
pub use tokenizer::Tokenizer;
