use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::{PipelineError, Result, Stage},
    model::{estep::ShardStats, TopicModel},
    vectorizer::{Vocabulary, WeightedVector},
};

/// Training hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainParams {
    /// topic count `K`
    pub num_topics: usize,
    /// full sweeps over the corpus
    pub passes: usize,
    /// worker threads per pass
    pub workers: usize,
    /// max fixed-point iterations per document
    pub iterations: usize,
    /// per-document convergence threshold on mean |Δgamma|
    pub gamma_threshold: f64,
    /// seed of the topic initialisation
    pub seed: u64,
    /// document-topic prior; `None` means 1/K
    pub alpha: Option<f64>,
    /// topic-term prior; `None` means 1/K
    pub eta: Option<f64>,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            num_topics: 5,
            passes: 2,
            workers: 2,
            iterations: 50,
            gamma_threshold: 0.001,
            seed: 42,
            alpha: None,
            eta: None,
        }
    }
}

impl TrainParams {
    pub fn new(num_topics: usize, passes: usize, workers: usize) -> Self {
        Self {
            num_topics,
            passes,
            workers,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(PipelineError::config(Stage::Train, reason));
        if self.num_topics == 0 {
            return fail("num_topics must be positive".into());
        }
        if self.passes == 0 {
            return fail("passes must be positive".into());
        }
        if self.workers == 0 {
            return fail("workers must be positive".into());
        }
        if self.iterations == 0 {
            return fail("iterations must be positive".into());
        }
        if !(self.gamma_threshold > 0.0) {
            return fail(format!("gamma_threshold must be positive, got {}", self.gamma_threshold));
        }
        for (name, prior) in [("alpha", self.alpha), ("eta", self.eta)] {
            if let Some(p) = prior {
                if !(p > 0.0 && p.is_finite()) {
                    return fail(format!("{name} must be a positive finite number, got {p}"));
                }
            }
        }
        Ok(())
    }
}

impl TopicModel {
    /// Fit `params.num_topics` topics on a weighted corpus encoded with
    /// `vocabulary`.
    ///
    /// Each pass splits the corpus into `params.workers` contiguous shards;
    /// every shard runs the E-step on its own pool thread and returns its
    /// statistics. Shards are merged in shard order and only then is the
    /// model updated, so no worker ever writes to shared topic state and the
    /// result does not depend on thread scheduling.
    pub fn train(
        corpus: &[WeightedVector],
        vocabulary: &Vocabulary,
        params: &TrainParams,
    ) -> Result<TopicModel> {
        params.validate()?;
        let num_terms = vocabulary.len();
        if corpus.is_empty() {
            return Err(PipelineError::config(Stage::Train, "cannot train on an empty corpus"));
        }
        if params.num_topics >= num_terms {
            return Err(PipelineError::config(
                Stage::Train,
                format!(
                    "num_topics ({}) must be smaller than the vocabulary size ({num_terms})",
                    params.num_topics
                ),
            ));
        }
        if let Some((record, id)) = corpus
            .iter()
            .enumerate()
            .find_map(|(i, v)| v.max_index().filter(|&id| id as usize >= num_terms).map(|id| (i, id)))
        {
            return Err(PipelineError::input(
                Stage::Train,
                record,
                format!("term id {id} outside vocabulary of {num_terms} terms; encoded with another vocabulary?"),
            ));
        }

        let k = params.num_topics;
        let alpha = vec![params.alpha.unwrap_or(1.0 / k as f64); k];
        let eta = params.eta.unwrap_or(1.0 / k as f64);

        let mut rng = StdRng::seed_from_u64(params.seed);
        let lambda: Vec<Vec<f64>> = (0..k)
            .map(|_| (0..num_terms).map(|_| 0.9 + 0.2 * rng.random::<f64>()).collect())
            .collect();
        let mut model = TopicModel::from_parts(
            alpha,
            eta,
            lambda,
            vocabulary.terms(),
            params.iterations,
            params.gamma_threshold,
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(params.workers)
            .thread_name(|i| format!("lda-worker-{i}"))
            .build()?;
        let shard_len = corpus.len().div_ceil(params.workers);
        info!(
            docs = corpus.len(),
            terms = num_terms,
            topics = k,
            passes = params.passes,
            workers = params.workers,
            shard_len,
            "training topic model"
        );

        for pass in 0..params.passes {
            let estep = model.estep_params();
            let partials: Vec<ShardStats> = pool.install(|| {
                corpus
                    .par_chunks(shard_len)
                    .map(|shard| estep.shard(shard, num_terms))
                    .collect()
            });
            debug!(pass, shards = partials.len(), "pass statistics collected");

            let merged = partials
                .iter()
                .fold(ShardStats::zeros(k, num_terms), |mut acc, part| {
                    acc.merge(part);
                    acc
                });
            model.update_lambda(&merged.sstats);

            info!(
                pass = pass + 1,
                passes = params.passes,
                docs = merged.docs,
                converged = merged.converged,
                mean_iterations = merged.iterations as f64 / merged.docs.max(1) as f64,
                "finished pass"
            );
        }
        Ok(model)
    }
}
