use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::{PipelineError, Result, Stage},
    model::TopicModel,
    pipeline::DocumentRecord,
    vectorizer::WeightedVector,
};

/// Terms rendered per topic in result rows.
pub const DEFAULT_TOP_TERMS: usize = 10;

/// Ranked topics of one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicAssignment {
    /// (topic id, probability), descending by probability, ties by ascending id
    pub list: Vec<(usize, f64)>,
}

impl TopicAssignment {
    pub fn from_distribution(dist: Vec<f64>) -> Self {
        let mut assignment = TopicAssignment {
            list: dist.into_iter().enumerate().collect(),
        };
        assignment.sort_by_score();
        assignment
    }

    /// Sort by descending score; equal scores keep ascending topic id.
    pub fn sort_by_score(&mut self) -> &mut Self {
        self.list
            .sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        self
    }

    /// Highest-scoring topic.
    #[inline]
    pub fn best(&self) -> Option<(usize, f64)> {
        self.list.first().copied()
    }
}

/// Rank every topic of `model` for one weighted document.
pub fn assign(model: &TopicModel, vector: &WeightedVector) -> TopicAssignment {
    TopicAssignment::from_distribution(model.infer(vector))
}

/// One output row: the input columns plus the assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(flatten)]
    pub columns: IndexMap<String, String>,
    pub processed_text: Vec<String>,
    pub topic_number: usize,
    pub score: f64,
    pub topic: String,
}

/// Results for a query batch, one row per input record, in input order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultTable {
    pub rows: Vec<ResultRecord>,
}

impl ResultTable {
    pub const ADDED_COLUMNS: [&'static str; 4] = ["processed_text", "topic_number", "score", "topic"];

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names: the input columns of the first row, then the added ones.
    pub fn columns(&self) -> Vec<String> {
        let mut cols: Vec<String> = self
            .rows
            .first()
            .map(|r| r.columns.keys().cloned().collect())
            .unwrap_or_default();
        cols.extend(Self::ADDED_COLUMNS.iter().map(|c| c.to_string()));
        cols
    }
}

/// Batch inference against a trained model. Holds only shared references, so
/// the model is never modified.
#[derive(Debug, Clone, Copy)]
pub struct TopicAssigner<'a> {
    model: &'a TopicModel,
    top_terms: usize,
}

impl<'a> TopicAssigner<'a> {
    pub fn new(model: &'a TopicModel) -> Self {
        Self {
            model,
            top_terms: DEFAULT_TOP_TERMS,
        }
    }

    pub fn top_terms(mut self, top_terms: usize) -> Self {
        self.top_terms = top_terms;
        self
    }

    #[inline]
    pub fn assign(&self, vector: &WeightedVector) -> TopicAssignment {
        assign(self.model, vector)
    }

    /// Assign the best topic to every record.
    ///
    /// `tokens[i]` and `vectors[i]` must belong to `records[i]`. Rows are
    /// computed independently and collected once into the table.
    pub fn assign_batch(
        &self,
        records: &[DocumentRecord],
        tokens: &[Vec<String>],
        vectors: &[WeightedVector],
    ) -> Result<ResultTable> {
        if tokens.len() != records.len() || vectors.len() != records.len() {
            return Err(PipelineError::input(
                Stage::Assign,
                records.len().min(tokens.len()).min(vectors.len()),
                format!(
                    "batch shape mismatch: {} records, {} token lists, {} vectors",
                    records.len(),
                    tokens.len(),
                    vectors.len()
                ),
            ));
        }

        // rendering is per topic, not per document
        let rendered: Vec<String> = (0..self.model.num_topics())
            .map(|t| self.model.print_topic(t, self.top_terms).unwrap_or_default())
            .collect();

        let rows: Vec<ResultRecord> = records
            .par_iter()
            .zip(tokens.par_iter())
            .zip(vectors.par_iter())
            .map(|((record, toks), vector)| {
                let (topic_number, score) = self.assign(vector).best().unwrap_or((0, 0.0));
                ResultRecord {
                    columns: record.columns().clone(),
                    processed_text: toks.clone(),
                    topic_number,
                    score,
                    topic: rendered[topic_number].clone(),
                }
            })
            .collect();

        info!(rows = rows.len(), topics = rendered.len(), "assigned topics");
        Ok(ResultTable { rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> TopicModel {
        TopicModel::from_parts(
            vec![0.5, 0.5, 0.5],
            0.5,
            vec![
                vec![8.0, 1.0, 1.0],
                vec![1.0, 1.0, 8.0],
                vec![1.0, 8.0, 1.0],
            ],
            vec!["stock".into(), "vote".into(), "storm".into()],
            50,
            1e-3,
        )
    }

    #[test]
    fn ranking_is_non_increasing_with_id_tiebreak() {
        let a = TopicAssignment::from_distribution(vec![0.2, 0.4, 0.2, 0.2]);
        assert_eq!(a.list.iter().map(|p| p.0).collect::<Vec<_>>(), vec![1, 0, 2, 3]);
        assert!(a.list.windows(2).all(|w| w[0].1 >= w[1].1));
        assert_eq!(a.best(), Some((1, 0.4)));
    }

    #[test]
    fn assign_ranks_all_topics() {
        let m = model();
        let a = assign(&m, &WeightedVector::from_pairs(vec![(2u32, 1.0)]));
        assert_eq!(a.list.len(), 3);
        assert_eq!(a.best().unwrap().0, 1);
    }

    #[test]
    fn empty_vector_gets_prior_topic() {
        let a = assign(&model(), &WeightedVector::new());
        assert_eq!(a.best(), Some((0, 1.0 / 3.0)));
    }

    #[test]
    fn batch_appends_columns_in_order() {
        let m = model();
        let records = vec![
            DocumentRecord::new("20200101", "storm warning"),
            DocumentRecord::new("20200102", "stock slump"),
        ];
        let tokens = vec![vec!["storm".to_string()], vec!["stock".to_string()]];
        let vectors = vec![
            WeightedVector::from_pairs(vec![(2u32, 1.0)]),
            WeightedVector::from_pairs(vec![(0u32, 1.0)]),
        ];
        let table = TopicAssigner::new(&m)
            .top_terms(2)
            .assign_batch(&records, &tokens, &vectors)
            .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].topic_number, 1);
        assert_eq!(table.rows[1].topic_number, 0);
        assert!(table.rows[0].topic.starts_with("0.800*\"storm\""));
        assert_eq!(table.rows[1].columns["headline_text"], "stock slump");
        assert!(table.rows.iter().all(|r| (0.0..=1.0).contains(&r.score)));
        assert_eq!(
            table.columns(),
            vec!["publish_date", "headline_text", "processed_text", "topic_number", "score", "topic"]
        );
    }

    #[test]
    fn batch_rejects_misaligned_inputs() {
        let m = model();
        let records = vec![DocumentRecord::new("20200101", "storm")];
        let err = TopicAssigner::new(&m).assign_batch(&records, &[], &[]).unwrap_err();
        assert_eq!(err.stage(), Stage::Assign);
    }
}
