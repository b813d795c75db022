pub(crate) mod estep;
pub mod serde;
pub mod trainer;

use crate::{
    model::estep::EStepParams,
    utils::math::special::exp_dirichlet_expectation,
    vectorizer::WeightedVector,
};

pub use trainer::TrainParams;

/// Latent Dirichlet Allocation model over a frozen vocabulary.
///
/// Holds `K` topics, each a Dirichlet over all vocabulary terms
/// (`lambda`, K x V). Immutable once training returns: the only operations
/// offered are inference for a document and topic inspection, both `&self`,
/// so a trained model can be shared across threads freely.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicModel {
    pub(crate) num_topics: usize,
    /// document-topic prior, one entry per topic
    pub(crate) alpha: Vec<f64>,
    /// topic-term prior
    pub(crate) eta: f64,
    /// variational topic-term parameters, K x V
    pub(crate) lambda: Vec<Vec<f64>>,
    /// term strings by id, for rendering
    pub(crate) id2word: Vec<String>,
    pub(crate) iterations: usize,
    pub(crate) gamma_threshold: f64,
    /// exp(E[log beta]) derived from `lambda`; never serialized
    pub(crate) exp_elog_beta: Vec<Vec<f64>>,
}

impl TopicModel {
    /// Assemble a model and derive its cache.
    pub(crate) fn from_parts(
        alpha: Vec<f64>,
        eta: f64,
        lambda: Vec<Vec<f64>>,
        id2word: Vec<String>,
        iterations: usize,
        gamma_threshold: f64,
    ) -> Self {
        let mut model = Self {
            num_topics: alpha.len(),
            alpha,
            eta,
            lambda,
            id2word,
            iterations,
            gamma_threshold,
            exp_elog_beta: Vec::new(),
        };
        model.refresh_cache();
        model
    }

    pub(crate) fn refresh_cache(&mut self) {
        self.exp_elog_beta = self
            .lambda
            .iter()
            .map(|row| exp_dirichlet_expectation(row))
            .collect();
    }

    pub(crate) fn estep_params(&self) -> EStepParams<'_> {
        EStepParams {
            alpha: &self.alpha,
            exp_elog_beta: &self.exp_elog_beta,
            max_iterations: self.iterations,
            gamma_threshold: self.gamma_threshold,
        }
    }

    /// M-step: replace topic parameters with prior + merged statistics.
    pub(crate) fn update_lambda(&mut self, sstats: &[Vec<f64>]) {
        for (row, stats) in self.lambda.iter_mut().zip(sstats) {
            for (l, s) in row.iter_mut().zip(stats) {
                *l = self.eta + s;
            }
        }
        self.refresh_cache();
    }

    #[inline]
    pub fn num_topics(&self) -> usize {
        self.num_topics
    }

    #[inline]
    pub fn num_terms(&self) -> usize {
        self.id2word.len()
    }

    #[inline]
    pub fn alpha(&self) -> &[f64] {
        &self.alpha
    }

    #[inline]
    pub fn eta(&self) -> f64 {
        self.eta
    }

    /// Raw variational parameters of topic `topic_id`.
    #[inline]
    pub fn lambda(&self, topic_id: usize) -> Option<&[f64]> {
        self.lambda.get(topic_id).map(Vec::as_slice)
    }

    /// Topic-probability distribution for one document.
    ///
    /// Always `num_topics` non-negative entries summing to 1. An empty vector
    /// yields the normalized prior. Term ids beyond the vocabulary are ignored.
    pub fn infer(&self, doc: &WeightedVector) -> Vec<f64> {
        let doc = match doc.max_index() {
            Some(max) if max as usize >= self.num_terms() => {
                doc.map_values(|id, w| if (id as usize) < self.num_terms() { w } else { 0.0 })
            }
            _ => doc.clone(),
        };
        let posterior = self.estep_params().infer(&doc, None);
        let total: f64 = posterior.gamma.iter().sum();
        posterior.gamma.iter().map(|g| g / total).collect()
    }

    /// Normalized term distribution of a topic, indexed by term id.
    pub fn topic_distribution(&self, topic_id: usize) -> Option<Vec<f64>> {
        let row = self.lambda.get(topic_id)?;
        let total: f64 = row.iter().sum();
        Some(row.iter().map(|l| l / total).collect())
    }

    /// Top `topn` terms of a topic with their probabilities, highest first
    /// (ties by ascending term id).
    pub fn show_topic(&self, topic_id: usize, topn: usize) -> Option<Vec<(&str, f64)>> {
        let dist = self.topic_distribution(topic_id)?;
        let mut ranked: Vec<(usize, f64)> = dist.into_iter().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        Some(
            ranked
                .into_iter()
                .take(topn)
                .map(|(id, p)| (self.id2word[id].as_str(), p))
                .collect(),
        )
    }

    /// Human-readable topic, e.g. `0.054*"market" + 0.031*"stock"`.
    pub fn print_topic(&self, topic_id: usize, topn: usize) -> Option<String> {
        let terms = self.show_topic(topic_id, topn)?;
        Some(
            terms
                .iter()
                .map(|(term, p)| format!("{p:.3}*\"{term}\""))
                .collect::<Vec<_>>()
                .join(" + "),
        )
    }
}
