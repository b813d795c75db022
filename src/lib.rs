/// This crate is a topic-modeling pipeline for short news headlines.
pub mod analyzer;
pub mod assign;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod utils;
pub mod vectorizer;

/// Pipeline
/// The top-level struct of this crate. It runs the stages in order:
/// - tokenize headline text
/// - build a filtered vocabulary
/// - encode documents as TF-IDF weighted vectors
/// - train an LDA topic model on a pool of worker threads
/// - assign each record its best topic
///
/// A `Pipeline` holds a validated `PipelineConfig` and a `Tokenizer`.
/// Every stage returns `Err` on a corpus-level or configuration problem and
/// nothing partially built is returned.
pub use pipeline::Pipeline;

/// Input record
/// An ordered set of string columns; `publish_date` and `headline_text` are
/// required. Serializes as a flat JSON object.
pub use pipeline::DocumentRecord;

/// Stage artifacts
/// - `PreparedCorpus`: tokens, vocabulary, idf statistics and weighted vectors
///   of the training records
/// - `TrainedPipeline`: vocabulary, idf statistics and model; what query
///   batches are encoded and scored with
///
/// # Serialization
/// Both are stored as CBOR.
pub use pipeline::{PreparedCorpus, TrainedPipeline};

/// Tokenizer
/// Lowercases, splits on non-letters, keeps tokens of 3 to 15 characters,
/// drops stopwords, then reduces each token to a verb lemma and an English
/// Snowball stem. Output order follows the input; duplicates are kept.
pub use analyzer::Tokenizer;

/// Vocabulary and its builder
/// `VocabularyBuilder` counts document frequencies and keeps terms found in
/// at least `min_doc_count` documents and at most `max_doc_fraction` of
/// them. The resulting `Vocabulary` assigns dense ids in first-seen order
/// and is immutable.
pub use vectorizer::{Vocabulary, VocabularyBuilder};

/// TF IDF Calculation Engine Trait
/// A trait that defines the behavior of a TF-IDF calculation engine.
///
/// By implementing this trait, you can plug different TF-IDF calculation strategies
/// into `TfIdfModel<E>`.
/// A default implementation, `DefaultTfIdfEngine`, is provided: raw-count TF,
/// log2 IDF and unit-length normalization.
pub use vectorizer::{DefaultTfIdfEngine, TfIdfEngine, TfIdfModel};

/// Document encoder
/// Turns token sequences into weighted vectors against a frozen vocabulary
/// and idf fit. Unknown terms are dropped silently.
pub use vectorizer::DocumentEncoder;

/// Sparse vectors
/// - `TermCounts`: raw term counts of one document
/// - `WeightedVector`: TF-IDF weights of one document
pub use vectorizer::{TermCounts, WeightedVector};

/// Topic model
/// LDA fitted by batch variational Bayes. Immutable after training:
/// `infer` gives a document's topic distribution, `show_topic` and
/// `print_topic` render a topic's top terms.
///
/// # Serialization
/// Supported. Only the parameters are stored; derived caches are rebuilt on
/// load.
pub use model::{TopicModel, TrainParams};

/// Topic assignment
/// - `TopicAssignment`: all topics of one document, best first
/// - `TopicAssigner`: batch assignment into a `ResultTable`
pub use assign::{assign, ResultRecord, ResultTable, TopicAssigner, TopicAssignment};

/// Pipeline configuration
/// All tunables of a run in one serde struct: vocabulary filter
/// (`min_doc_count`, `max_doc_fraction`, `keep_n`), training (`num_topics`,
/// `passes`, `workers`, `iterations`, `gamma_threshold`, `seed`) and output
/// (`top_terms`).
/// `PipelineConfig::from_env` overlays `TOPICS_*` environment variables on
/// the defaults; `validate` rejects unusable values before any stage runs.
pub use config::PipelineConfig;

/// Errors
/// `PipelineError` covers the fatal cases only:
/// - `Input`: a record is missing a required column
/// - `Configuration`: hyperparameters or corpus shape cannot give a usable model
/// - `WorkerPool`, `Persist`, `Io`: thread pool start-up and artifact I/O
///
/// Every error reports the `Stage` it came from. Per-document anomalies never
/// become errors; they degrade to empty vectors.
pub use error::{PipelineError, Result, Stage};
