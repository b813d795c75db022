use std::fmt;

use thiserror::Error;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Prepare,
    Vocabulary,
    Encode,
    Train,
    Assign,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Prepare => "prepare",
            Stage::Vocabulary => "vocabulary",
            Stage::Encode => "encode",
            Stage::Train => "train",
            Stage::Assign => "assign",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Corpus-level and configuration-level failures.
///
/// Per-document anomalies (a headline that tokenizes to nothing, a query term
/// missing from the vocabulary) never surface here; they degrade to empty
/// vectors instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed or missing columns in an input record.
    #[error("[{stage}] record {record}: {reason}")]
    Input {
        stage: Stage,
        record: usize,
        reason: String,
    },

    /// Hyperparameters or corpus shape that cannot produce a usable model.
    #[error("[{stage}] configuration error: {reason}")]
    Configuration { stage: Stage, reason: String },

    #[error("[train] could not start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("[persist] model artifact: {0}")]
    Persist(#[from] serde_cbor::Error),

    /// Writing an artifact failed after encoding, e.g. on the final flush.
    #[error("[persist] artifact write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub(crate) fn config(stage: Stage, reason: impl Into<String>) -> Self {
        PipelineError::Configuration {
            stage,
            reason: reason.into(),
        }
    }

    pub(crate) fn input(stage: Stage, record: usize, reason: impl Into<String>) -> Self {
        PipelineError::Input {
            stage,
            record,
            reason: reason.into(),
        }
    }

    /// Stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Input { stage, .. } | PipelineError::Configuration { stage, .. } => *stage,
            PipelineError::WorkerPool(_) => Stage::Train,
            PipelineError::Persist(_) | PipelineError::Io(_) => Stage::Persist,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
