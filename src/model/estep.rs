//! Per-document variational E-step and the partial statistics workers emit.

use crate::{utils::math::special::exp_dirichlet_expectation, vectorizer::WeightedVector};

/// Guards divisions by a vanishing normalizer.
const PHINORM_FLOOR: f64 = 1e-100;

/// Posterior Dirichlet parameters of one document.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DocumentPosterior {
    pub gamma: Vec<f64>,
    /// fixed-point iterations actually run
    pub iterations: usize,
    pub converged: bool,
}

/// Settings of the per-document fixed-point loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EStepParams<'a> {
    pub alpha: &'a [f64],
    /// exp(E[log beta]), K x V
    pub exp_elog_beta: &'a [Vec<f64>],
    pub max_iterations: usize,
    pub gamma_threshold: f64,
}

/// Sufficient statistics of one shard. Produced by a worker, read-only once
/// returned, merged by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ShardStats {
    /// K x V expected topic-term weights
    pub sstats: Vec<Vec<f64>>,
    pub docs: usize,
    pub iterations: usize,
    /// documents whose gamma settled before the iteration cap
    pub converged: usize,
}

impl ShardStats {
    pub fn zeros(num_topics: usize, num_terms: usize) -> Self {
        Self {
            sstats: vec![vec![0.0; num_terms]; num_topics],
            docs: 0,
            iterations: 0,
            converged: 0,
        }
    }

    pub fn merge(&mut self, other: &ShardStats) {
        for (row, other_row) in self.sstats.iter_mut().zip(&other.sstats) {
            for (a, b) in row.iter_mut().zip(other_row) {
                *a += *b;
            }
        }
        self.docs += other.docs;
        self.iterations += other.iterations;
        self.converged += other.converged;
    }
}

impl<'a> EStepParams<'a> {
    #[inline]
    fn num_topics(&self) -> usize {
        self.alpha.len()
    }

    /// Fit gamma for one document; when `stats` is given, add the document's
    /// expected topic-term weights to it.
    ///
    /// An empty document keeps the prior (`gamma = alpha`).
    pub fn infer(&self, doc: &WeightedVector, stats: Option<&mut ShardStats>) -> DocumentPosterior {
        let k = self.num_topics();
        if doc.is_empty() {
            if let Some(stats) = stats {
                stats.docs += 1;
                stats.converged += 1;
            }
            return DocumentPosterior {
                gamma: self.alpha.to_vec(),
                iterations: 0,
                converged: true,
            };
        }

        let ids: Vec<usize> = doc.indices().iter().map(|&i| i as usize).collect();
        let cts: Vec<f64> = doc.values().to_vec();
        let total: f64 = cts.iter().sum();

        // beta restricted to this document's terms, K x n
        let beta_d: Vec<Vec<f64>> = self
            .exp_elog_beta
            .iter()
            .map(|row| ids.iter().map(|&w| row[w]).collect())
            .collect();

        let mut gamma: Vec<f64> = self.alpha.iter().map(|a| a + total / k as f64).collect();
        let mut exp_elog_theta = exp_dirichlet_expectation(&gamma);
        let mut phinorm = phi_norm(&exp_elog_theta, &beta_d, ids.len());

        let mut iterations = 0;
        let mut converged = false;
        for _ in 0..self.max_iterations {
            iterations += 1;
            let last_gamma = gamma.clone();
            for t in 0..k {
                let acc: f64 = beta_d[t]
                    .iter()
                    .zip(cts.iter().zip(&phinorm))
                    .map(|(b, (c, p))| c / p * b)
                    .sum();
                gamma[t] = self.alpha[t] + exp_elog_theta[t] * acc;
            }
            exp_elog_theta = exp_dirichlet_expectation(&gamma);
            phinorm = phi_norm(&exp_elog_theta, &beta_d, ids.len());

            let mean_change = gamma
                .iter()
                .zip(&last_gamma)
                .map(|(a, b)| (a - b).abs())
                .sum::<f64>()
                / k as f64;
            if mean_change < self.gamma_threshold {
                converged = true;
                break;
            }
        }

        if let Some(stats) = stats {
            for t in 0..k {
                let row = &mut stats.sstats[t];
                for (n, &w) in ids.iter().enumerate() {
                    row[w] += exp_elog_theta[t] * cts[n] / phinorm[n] * beta_d[t][n];
                }
            }
            stats.docs += 1;
            stats.iterations += iterations;
            stats.converged += usize::from(converged);
        }

        DocumentPosterior {
            gamma,
            iterations,
            converged,
        }
    }

    /// E-step over a whole shard.
    pub fn shard(&self, docs: &[WeightedVector], num_terms: usize) -> ShardStats {
        let mut stats = ShardStats::zeros(self.num_topics(), num_terms);
        for doc in docs {
            self.infer(doc, Some(&mut stats));
        }
        stats
    }
}

fn phi_norm(exp_elog_theta: &[f64], beta_d: &[Vec<f64>], n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            exp_elog_theta
                .iter()
                .zip(beta_d)
                .map(|(th, row)| th * row[i])
                .sum::<f64>()
                + PHINORM_FLOOR
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params<'a>(alpha: &'a [f64], beta: &'a [Vec<f64>]) -> EStepParams<'a> {
        EStepParams {
            alpha,
            exp_elog_beta: beta,
            max_iterations: 50,
            gamma_threshold: 1e-3,
        }
    }

    #[test]
    fn empty_document_keeps_prior_and_adds_nothing() {
        let alpha = [0.5, 0.5];
        let beta = vec![vec![0.5, 0.5], vec![0.5, 0.5]];
        let mut stats = ShardStats::zeros(2, 2);
        let post = params(&alpha, &beta).infer(&WeightedVector::new(), Some(&mut stats));
        assert_eq!(post.gamma, vec![0.5, 0.5]);
        assert!(post.converged);
        assert_eq!((stats.docs, stats.converged), (1, 1));
        assert!(stats.sstats.iter().flatten().all(|v| *v == 0.0));
    }

    #[test]
    fn gamma_mass_matches_document_weight() {
        let alpha = [0.5, 0.5];
        let beta = vec![vec![0.9, 0.1], vec![0.1, 0.9]];
        let doc = WeightedVector::from_pairs(vec![(0u32, 0.8), (1, 0.6)]);
        let mut stats = ShardStats::zeros(2, 2);
        let post = params(&alpha, &beta).infer(&doc, Some(&mut stats));
        let gamma_sum: f64 = post.gamma.iter().sum();
        assert!((gamma_sum - (1.0 + 1.4)).abs() < 1e-6);
        // the statistics distribute exactly the document's weight
        let stat_sum: f64 = stats.sstats.iter().flatten().sum();
        assert!((stat_sum - 1.4).abs() < 1e-6);
    }

    #[test]
    fn topic_matching_the_terms_wins() {
        let alpha = [0.5, 0.5];
        let beta = vec![vec![0.9, 0.1], vec![0.1, 0.9]];
        let doc = WeightedVector::from_pairs(vec![(1u32, 1.0)]);
        let post = params(&alpha, &beta).infer(&doc, None);
        assert!(post.gamma[1] > post.gamma[0]);
        assert!(post.converged && post.iterations < 50);
    }

    #[test]
    fn merge_adds_shards() {
        let mut a = ShardStats::zeros(1, 2);
        a.sstats[0][1] = 1.0;
        a.docs = 2;
        let mut b = ShardStats::zeros(1, 2);
        b.sstats[0][1] = 0.5;
        b.docs = 3;
        a.merge(&b);
        assert_eq!(a.sstats[0], vec![0.0, 1.5]);
        assert_eq!(a.docs, 5);
    }
}
