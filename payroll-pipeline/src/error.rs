use thiserror::Error;
use tokio::task::JoinError;

use crate::lifecycle::StageState;
use crate::sink::SinkError;
use crate::source::SourceError;

/// Errors that end a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid pipeline options: {0}")]
    InvalidOptions(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    /// The upstream queue closed without an end-of-stream marker.
    #[error("{stage}: upstream stage stopped without sending end-of-stream")]
    UpstreamAborted { stage: &'static str },

    /// The downstream queue stopped accepting items.
    #[error("{stage}: downstream stage is no longer receiving")]
    DownstreamClosed { stage: &'static str },

    #[error("{stage}: cannot move from {from} to {to}")]
    InvalidTransition {
        stage: &'static str,
        from: StageState,
        to: StageState,
    },

    #[error("{stage} task failed: {message}")]
    TaskFailed {
        stage: &'static str,
        message: String,
    },
}

impl PipelineError {
    pub(crate) fn task_failed(
        stage: &'static str,
        err: JoinError,
    ) -> Self {
        Self::TaskFailed {
            stage,
            message: err.to_string(),
        }
    }

    /// True for errors that only report that a neighbouring stage went away.
    ///
    /// These are consequences of a failure elsewhere and are never the root
    /// cause of an aborted run when another stage reported a different error.
    pub fn is_propagated(&self) -> bool {
        matches!(
            self,
            Self::UpstreamAborted { .. } | Self::DownstreamClosed { .. }
        )
    }
}
