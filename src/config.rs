use std::{env, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    error::{PipelineError, Result, Stage},
    model::TrainParams,
    vectorizer::VocabularyBuilder,
};

/// All tunables of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// terms in fewer documents are dropped
    pub min_doc_count: u64,
    /// terms in more than this fraction of documents are dropped
    pub max_doc_fraction: f64,
    /// cap on vocabulary size after filtering; `None` keeps everything
    pub keep_n: Option<usize>,
    pub num_topics: usize,
    pub passes: usize,
    pub workers: usize,
    pub iterations: usize,
    pub gamma_threshold: f64,
    pub seed: u64,
    /// terms rendered per topic in result rows
    pub top_terms: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let vocab = VocabularyBuilder::default();
        let train = TrainParams::default();
        Self {
            min_doc_count: vocab.min_doc_count,
            max_doc_fraction: vocab.max_doc_fraction,
            keep_n: vocab.keep_n,
            num_topics: train.num_topics,
            passes: train.passes,
            workers: train.workers,
            iterations: train.iterations,
            gamma_threshold: train.gamma_threshold,
            seed: train.seed,
            top_terms: crate::assign::DEFAULT_TOP_TERMS,
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by `TOPICS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `TOPICS_*` key.
    /// `TOPICS_KEEP_N=0` disables the vocabulary cap.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        set(&lookup, "TOPICS_MIN_DOC_COUNT", &mut config.min_doc_count)?;
        set(&lookup, "TOPICS_MAX_DOC_FRACTION", &mut config.max_doc_fraction)?;
        let mut keep_n = config.keep_n.unwrap_or(0);
        set(&lookup, "TOPICS_KEEP_N", &mut keep_n)?;
        config.keep_n = (keep_n > 0).then_some(keep_n);
        set(&lookup, "TOPICS_NUM_TOPICS", &mut config.num_topics)?;
        set(&lookup, "TOPICS_PASSES", &mut config.passes)?;
        set(&lookup, "TOPICS_WORKERS", &mut config.workers)?;
        set(&lookup, "TOPICS_ITERATIONS", &mut config.iterations)?;
        set(&lookup, "TOPICS_GAMMA_THRESHOLD", &mut config.gamma_threshold)?;
        set(&lookup, "TOPICS_SEED", &mut config.seed)?;
        set(&lookup, "TOPICS_TOP_TERMS", &mut config.top_terms)?;
        Ok(config)
    }

    pub fn vocabulary_builder(&self) -> VocabularyBuilder {
        VocabularyBuilder {
            min_doc_count: self.min_doc_count,
            max_doc_fraction: self.max_doc_fraction,
            keep_n: self.keep_n,
        }
    }

    pub fn train_params(&self) -> TrainParams {
        TrainParams {
            num_topics: self.num_topics,
            passes: self.passes,
            workers: self.workers,
            iterations: self.iterations,
            gamma_threshold: self.gamma_threshold,
            seed: self.seed,
            alpha: None,
            eta: None,
        }
    }

    /// Check every tunable up front so a run fails before any work is done.
    pub fn validate(&self) -> Result<()> {
        self.vocabulary_builder().validate()?;
        self.train_params().validate()?;
        if self.top_terms == 0 {
            return Err(PipelineError::config(Stage::Config, "top_terms must be positive"));
        }
        Ok(())
    }
}

fn set<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *slot = raw.trim().parse().map_err(|e: T::Err| {
            PipelineError::config(Stage::Config, format!("{key}={raw:?}: {e}"))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.min_doc_count, 15);
        assert_eq!(c.max_doc_fraction, 0.5);
        assert_eq!(c.keep_n, Some(100_000));
        assert_eq!((c.num_topics, c.passes, c.workers), (5, 2, 2));
        assert_eq!(c.seed, 42);
        assert_eq!(c.top_terms, 10);
        c.validate().unwrap();
    }

    #[test]
    fn overrides_from_lookup() {
        let c = PipelineConfig::from_lookup(lookup(&[
            ("TOPICS_MIN_DOC_COUNT", "1"),
            ("TOPICS_MAX_DOC_FRACTION", " 1.0 "),
            ("TOPICS_KEEP_N", "0"),
            ("TOPICS_WORKERS", "4"),
        ]))
        .unwrap();
        assert_eq!(c.min_doc_count, 1);
        assert_eq!(c.max_doc_fraction, 1.0);
        assert_eq!(c.keep_n, None);
        assert_eq!(c.workers, 4);
        assert_eq!(c.num_topics, 5);
        assert_eq!(c.vocabulary_builder().min_doc_count, 1);
        assert_eq!(c.train_params().workers, 4);
    }

    #[test]
    fn unparsable_value_is_configuration_error() {
        let err = PipelineConfig::from_lookup(lookup(&[("TOPICS_PASSES", "two")])).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { stage: Stage::Config, .. }));
        assert!(err.to_string().contains("TOPICS_PASSES"));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let c = PipelineConfig {
            max_doc_fraction: 0.0,
            ..PipelineConfig::default()
        };
        assert!(c.validate().is_err());
        let c = PipelineConfig {
            workers: 0,
            ..PipelineConfig::default()
        };
        assert!(c.validate().is_err());
    }
}
