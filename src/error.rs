use chrono::NaiveDate;
use thiserror::Error;

use crate::forest::ClassifierError;
use crate::split::SplitError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no match records to process")]
    NoRecords,

    #[error("unknown feature `{0}`")]
    UnknownFeature(String),

    #[error("feature `{0}` describes the current match and would leak the outcome")]
    LeakingFeature(String),

    #[error("feature `{feature}` is undefined for {team} on {date}")]
    MissingFeatureValue {
        feature: String,
        team: String,
        date: NaiveDate,
    },

    #[error("split failed: {0}")]
    Split(#[from] SplitError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error("label count mismatch: {actual} actual vs {predicted} predicted")]
    LabelMismatch { actual: usize, predicted: usize },

    #[error("nothing to evaluate")]
    EmptyEvaluation,
}

impl PipelineError {
    /// Errors that make the cutoff or dataset unusable, as opposed to bad input
    /// rows which are dropped with a warning.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidConfig(_)
                | PipelineError::Split(_)
                | PipelineError::UnknownFeature(_)
                | PipelineError::LeakingFeature(_)
        )
    }
}
