//! Stage orchestration: records in, prepared corpus, trained model, result
//! table out.

use std::io::{Read, Write};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    analyzer::Tokenizer,
    assign::{ResultTable, TopicAssigner},
    config::PipelineConfig,
    error::{PipelineError, Result, Stage},
    model::TopicModel,
    vectorizer::{DocumentEncoder, TermCounts, TfIdfModel, Vocabulary, WeightedVector},
};

pub const PUBLISH_DATE: &str = "publish_date";
pub const HEADLINE_TEXT: &str = "headline_text";

/// One input row. Columns keep their input order and travel unchanged into
/// the result table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentRecord {
    columns: IndexMap<String, String>,
}

impl DocumentRecord {
    pub const REQUIRED_COLUMNS: [&'static str; 2] = [PUBLISH_DATE, HEADLINE_TEXT];

    pub fn new(publish_date: impl Into<String>, headline_text: impl Into<String>) -> Self {
        let mut columns = IndexMap::new();
        columns.insert(PUBLISH_DATE.to_string(), publish_date.into());
        columns.insert(HEADLINE_TEXT.to_string(), headline_text.into());
        Self { columns }
    }

    pub fn from_columns(columns: IndexMap<String, String>) -> Self {
        Self { columns }
    }

    #[inline]
    pub fn columns(&self) -> &IndexMap<String, String> {
        &self.columns
    }

    #[inline]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }

    /// Headline text; empty when the column is absent.
    #[inline]
    pub fn headline(&self) -> &str {
        self.get(HEADLINE_TEXT).unwrap_or_default()
    }

    /// Fails with an input error naming the first missing required column.
    pub fn validate(&self, stage: Stage, index: usize) -> Result<()> {
        match Self::REQUIRED_COLUMNS.iter().find(|c| !self.columns.contains_key(**c)) {
            Some(missing) => Err(PipelineError::input(
                stage,
                index,
                format!("missing required column `{missing}`"),
            )),
            None => Ok(()),
        }
    }
}

fn validate_all(records: &[DocumentRecord], stage: Stage) -> Result<()> {
    records
        .iter()
        .enumerate()
        .try_for_each(|(i, r)| r.validate(stage, i))
}

/// Output of the prepare stage: everything training needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedCorpus {
    /// processed tokens per record
    pub tokens: Vec<Vec<String>>,
    pub vocabulary: Vocabulary,
    pub tfidf: TfIdfModel,
    /// weighted vectors per record, aligned with `tokens`
    pub vectors: Vec<WeightedVector>,
}

impl PreparedCorpus {
    #[inline]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Encode as CBOR and flush `writer`; a failed flush is an error, so a
    /// buffered writer never leaves a silently truncated artifact.
    pub fn to_writer<W: Write>(&self, mut writer: W) -> Result<()> {
        serde_cbor::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_cbor::from_reader(reader)?)
    }
}

/// Artifact of a training run: the frozen vocabulary and idf statistics the
/// model was trained against, plus the model itself. Query batches are always
/// encoded with these, never refitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedPipeline {
    pub vocabulary: Vocabulary,
    pub tfidf: TfIdfModel,
    pub model: TopicModel,
}

impl TrainedPipeline {
    pub fn new(prepared: PreparedCorpus, model: TopicModel) -> Self {
        Self {
            vocabulary: prepared.vocabulary,
            tfidf: prepared.tfidf,
            model,
        }
    }

    #[inline]
    pub fn encoder(&self) -> DocumentEncoder<'_> {
        DocumentEncoder::new(&self.vocabulary, &self.tfidf)
    }

    /// Encode as CBOR and flush `writer`; a failed flush is an error, so a
    /// buffered writer never leaves a silently truncated artifact.
    pub fn to_writer<W: Write>(&self, mut writer: W) -> Result<()> {
        serde_cbor::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let trained: Self = serde_cbor::from_reader(reader)?;
        trained.check()?;
        Ok(trained)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_cbor::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let trained: Self = serde_cbor::from_slice(bytes)?;
        trained.check()?;
        Ok(trained)
    }

    /// The three parts must agree on the vocabulary size.
    fn check(&self) -> Result<()> {
        let v = self.vocabulary.len();
        if self.tfidf.num_terms() != v || self.model.num_terms() != v {
            return Err(PipelineError::config(
                Stage::Persist,
                format!(
                    "artifact parts disagree: vocabulary {v} terms, tf-idf {}, model {}",
                    self.tfidf.num_terms(),
                    self.model.num_terms()
                ),
            ));
        }
        Ok(())
    }
}

/// Runs the stages with one configuration and one tokenizer.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    tokenizer: Tokenizer,
}

impl Pipeline {
    /// Pipeline with the default English tokenizer. The configuration is
    /// validated here, before any stage runs.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_tokenizer(config, Tokenizer::new())
    }

    pub fn with_tokenizer(config: PipelineConfig, tokenizer: Tokenizer) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, tokenizer })
    }

    #[inline]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[inline]
    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    fn tokenize(&self, records: &[DocumentRecord]) -> Vec<Vec<String>> {
        let headlines: Vec<&str> = records.iter().map(DocumentRecord::headline).collect();
        self.tokenizer.tokenize_corpus(&headlines)
    }

    /// Tokenize, build the vocabulary, fit idf and encode the training records.
    pub fn prepare(&self, records: &[DocumentRecord]) -> Result<PreparedCorpus> {
        validate_all(records, Stage::Prepare)?;
        let tokens = self.tokenize(records);
        let vocabulary = self.config.vocabulary_builder().build(&tokens)?;
        let counts: Vec<TermCounts> = tokens.iter().map(|t| vocabulary.count_vector(t)).collect();
        let tfidf: TfIdfModel = TfIdfModel::fit(&counts, vocabulary.len())?;
        let vectors = DocumentEncoder::new(&vocabulary, &tfidf).encode_corpus(&tokens);
        info!(
            records = records.len(),
            terms = vocabulary.len(),
            empty = vectors.iter().filter(|v| v.is_empty()).count(),
            "prepared corpus"
        );
        Ok(PreparedCorpus {
            tokens,
            vocabulary,
            tfidf,
            vectors,
        })
    }

    pub fn train(&self, prepared: &PreparedCorpus) -> Result<TopicModel> {
        TopicModel::train(&prepared.vectors, &prepared.vocabulary, &self.config.train_params())
    }

    /// `prepare` followed by `train`.
    pub fn fit(&self, records: &[DocumentRecord]) -> Result<TrainedPipeline> {
        let prepared = self.prepare(records)?;
        let model = self.train(&prepared)?;
        Ok(TrainedPipeline::new(prepared, model))
    }

    /// Tag every record with its best topic. The trained artifact is only
    /// read.
    pub fn assign(&self, trained: &TrainedPipeline, records: &[DocumentRecord]) -> Result<ResultTable> {
        validate_all(records, Stage::Assign)?;
        let tokens = self.tokenize(records);
        let vectors = trained.encoder().encode_corpus(&tokens);
        TopicAssigner::new(&trained.model)
            .top_terms(self.config.top_terms)
            .assign_batch(records, &tokens, &vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_column_names_record_and_stage() {
        let mut columns = IndexMap::new();
        columns.insert(PUBLISH_DATE.to_string(), "20200101".to_string());
        let records = vec![
            DocumentRecord::new("20200101", "markets rally"),
            DocumentRecord::from_columns(columns),
        ];
        let err = validate_all(&records, Stage::Prepare).unwrap_err();
        match err {
            PipelineError::Input { stage, record, reason } => {
                assert_eq!(stage, Stage::Prepare);
                assert_eq!(record, 1);
                assert!(reason.contains(HEADLINE_TEXT));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn record_serializes_as_flat_object() {
        let record = DocumentRecord::new("20200101", "markets rally");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"publish_date":"20200101","headline_text":"markets rally"}"#);
        let back: DocumentRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("no space left on device"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::other("no space left on device"))
        }
    }

    fn small_pipeline() -> Pipeline {
        let config = PipelineConfig {
            min_doc_count: 1,
            max_doc_fraction: 1.0,
            num_topics: 2,
            ..PipelineConfig::default()
        };
        Pipeline::with_tokenizer(config, Tokenizer::with_stopwords(["the"])).unwrap()
    }

    fn headlines(texts: &[&str]) -> Vec<DocumentRecord> {
        texts.iter().map(|t| DocumentRecord::new("20200101", *t)).collect()
    }

    #[test]
    fn buffered_write_failure_is_reported() {
        let p = small_pipeline();
        let trained = p
            .fit(&headlines(&["stock markets rally", "cold weather storm", "markets fall"]))
            .unwrap();
        let prepared = p.prepare(&headlines(&["stock markets rally", "cold storm"])).unwrap();

        // both artifacts fit in the buffer, so only the flush can fail
        let err = trained
            .to_writer(std::io::BufWriter::new(FailingSink))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
        assert_eq!(err.stage(), Stage::Persist);
        let err = prepared
            .to_writer(std::io::BufWriter::new(FailingSink))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));

        let mut bytes = Vec::new();
        trained.to_writer(&mut bytes).unwrap();
        assert_eq!(TrainedPipeline::from_reader(bytes.as_slice()).unwrap(), trained);
    }

    #[test]
    fn prepared_vectors_match_the_encoder() {
        let p = small_pipeline();
        let prepared = p
            .prepare(&headlines(&["stock markets rally", "!!", "cold weather storm", "markets"]))
            .unwrap();
        assert_eq!(prepared.len(), 4);
        assert!(prepared.tokens[1].is_empty());
        assert!(prepared.vectors[1].is_empty());

        let encoder = DocumentEncoder::new(&prepared.vocabulary, &prepared.tfidf);
        for (tokens, vector) in prepared.tokens.iter().zip(&prepared.vectors) {
            assert_eq!(&encoder.encode(tokens), vector);
        }
    }

    #[test]
    fn invalid_config_is_rejected_before_any_stage() {
        let config = PipelineConfig {
            num_topics: 0,
            ..PipelineConfig::default()
        };
        let err = Pipeline::with_tokenizer(config, Tokenizer::with_stopwords(["the"])).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
    }
}
