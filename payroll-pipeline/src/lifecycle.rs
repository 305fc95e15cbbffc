//! Stage lifecycle shared by the source, engine and sink.
//!
//! Every stage moves strictly forward through
//! `Idle → Running → Draining → Terminated`. A stage enters `Draining` when it
//! produces or receives the end-of-stream marker and `Terminated` once the
//! work it already accepted has been handed on or flushed.

use std::fmt;

use tracing::debug;

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Idle,
    Running,
    Draining,
    Terminated,
}

impl StageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Terminated => "terminated",
        }
    }

    /// Whether `next` is the single state that may follow `self`.
    pub fn can_advance_to(
        self,
        next: StageState,
    ) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Draining)
                | (Self::Draining, Self::Terminated)
        )
    }
}

impl fmt::Display for StageState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final state of a stage and how many items it handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: &'static str,
    pub state: StageState,
    pub items: usize,
}

/// Tracks one stage's position in the lifecycle.
#[derive(Debug)]
pub struct StageLifecycle {
    stage: &'static str,
    state: StageState,
}

impl StageLifecycle {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            state: StageState::Idle,
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn state(&self) -> StageState {
        self.state
    }

    /// Moves to `next`, rejecting anything but the next forward step.
    pub fn advance(
        &mut self,
        next: StageState,
    ) -> Result<(), PipelineError> {
        if !self.state.can_advance_to(next) {
            return Err(PipelineError::InvalidTransition {
                stage: self.stage,
                from: self.state,
                to: next,
            });
        }
        debug!(stage = self.stage, from = %self.state, to = %next, "stage transition");
        self.state = next;
        Ok(())
    }

    pub fn report(
        &self,
        items: usize,
    ) -> StageReport {
        StageReport {
            stage: self.stage,
            state: self.state,
            items,
        }
    }
}
