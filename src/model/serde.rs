use serde::{de, ser::SerializeStruct, Deserialize, Deserializer, Serialize};

use crate::model::TopicModel;

/// Serializable form of `TopicModel`.
/// It carries no derived cache; `into_topic_model` validates the shapes and
/// rebuilds the cache.
#[derive(Debug, Deserialize)]
pub struct ModelData {
    pub alpha: Vec<f64>,
    pub eta: f64,
    pub lambda: Vec<Vec<f64>>,
    pub id2word: Vec<String>,
    pub iterations: usize,
    pub gamma_threshold: f64,
}

impl ModelData {
    pub fn into_topic_model(self) -> Result<TopicModel, String> {
        let k = self.alpha.len();
        if k == 0 {
            return Err("model has no topics".into());
        }
        if self.lambda.len() != k {
            return Err(format!("{} topic rows for {k} topics", self.lambda.len()));
        }
        let v = self.id2word.len();
        if let Some(row) = self.lambda.iter().position(|row| row.len() != v) {
            return Err(format!("topic {row} has {} terms, vocabulary has {v}", self.lambda[row].len()));
        }
        if self.lambda.iter().flatten().any(|l| !(*l > 0.0 && l.is_finite())) {
            return Err("topic parameters must be positive".into());
        }
        if let Some(a) = self.alpha.iter().find(|a| !(**a > 0.0 && a.is_finite())) {
            return Err(format!("alpha must be positive and finite, got {a}"));
        }
        if !(self.eta > 0.0 && self.eta.is_finite()) {
            return Err(format!("eta must be positive and finite, got {}", self.eta));
        }
        if self.iterations == 0 {
            return Err("iterations must be positive".into());
        }
        if !(self.gamma_threshold > 0.0) {
            return Err(format!("gamma_threshold must be positive, got {}", self.gamma_threshold));
        }
        Ok(TopicModel::from_parts(
            self.alpha,
            self.eta,
            self.lambda,
            self.id2word,
            self.iterations,
            self.gamma_threshold,
        ))
    }
}

impl Serialize for TopicModel {
    /// The derived `exp(E[log beta])` cache is left out; it is recomputed on load.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("TopicModel", 6)?;
        state.serialize_field("alpha", &self.alpha)?;
        state.serialize_field("eta", &self.eta)?;
        state.serialize_field("lambda", &self.lambda)?;
        state.serialize_field("id2word", &self.id2word)?;
        state.serialize_field("iterations", &self.iterations)?;
        state.serialize_field("gamma_threshold", &self.gamma_threshold)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for TopicModel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        ModelData::deserialize(deserializer)?
            .into_topic_model()
            .map_err(de::Error::custom)
    }
}
