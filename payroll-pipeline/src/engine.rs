//! Tax computation stage.
//!
//! A pool of async workers shares the input queue. Each record is taken by
//! exactly one worker. Completion is driven only by the end-of-stream
//! marker: whichever worker receives it marks the stream drained, the other
//! workers see that before their next dequeue and stop, and once every worker
//! has stopped a single marker is forwarded downstream.

use std::sync::Arc;

use chrono::Local;
use payroll_core::{ComputationResult, EmployeeRecord, TaxPolicy};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, trace};

use crate::error::PipelineError;
use crate::lifecycle::{StageLifecycle, StageReport, StageState};
use crate::queue::{Envelope, QueueReceiver, QueueSender};

pub const ENGINE_STAGE: &str = "tax engine";

struct ReceiverState<T> {
    receiver: QueueReceiver<T>,
    drained: bool,
}

/// Input queue shared by every engine worker.
struct SharedReceiver<T> {
    state: Mutex<ReceiverState<T>>,
}

impl<T> SharedReceiver<T> {
    fn new(receiver: QueueReceiver<T>) -> Self {
        Self {
            state: Mutex::new(ReceiverState {
                receiver,
                drained: false,
            }),
        }
    }

    /// Next item for the calling worker, or `None` once end-of-stream has
    /// been received by any worker.
    async fn next(&self) -> Result<Option<T>, PipelineError> {
        // Held across the receive so the drained flag and the queue stay consistent.
        let mut state = self.state.lock().await;
        if state.drained {
            return Ok(None);
        }

        match state.receiver.recv().await {
            Some(Envelope::Item(item)) => Ok(Some(item)),
            Some(Envelope::EndOfStream) => {
                state.drained = true;
                Ok(None)
            }
            None => Err(PipelineError::UpstreamAborted {
                stage: ENGINE_STAGE,
            }),
        }
    }
}

/// Applies a [`TaxPolicy`] to every record with one or more workers.
pub struct TaxEngine {
    policy: Arc<TaxPolicy>,
    workers: usize,
}

impl TaxEngine {
    /// `workers` is raised to 1 if zero.
    pub fn new(
        policy: Arc<TaxPolicy>,
        workers: usize,
    ) -> Self {
        Self {
            policy,
            workers: workers.max(1),
        }
    }

    /// Runs all workers to completion, then forwards end-of-stream.
    ///
    /// With a single worker results leave in input order. With several the
    /// order is unspecified.
    pub async fn run(
        self,
        input: QueueReceiver<EmployeeRecord>,
        output: QueueSender<ComputationResult>,
    ) -> Result<StageReport, PipelineError> {
        let mut lifecycle = StageLifecycle::new(ENGINE_STAGE);
        lifecycle.advance(StageState::Running)?;
        debug!(workers = self.workers, "starting tax engine workers");

        let input = Arc::new(SharedReceiver::new(input));
        let mut workers = JoinSet::new();
        for worker_id in 0..self.workers {
            workers.spawn(engine_worker(
                worker_id,
                Arc::clone(&input),
                Arc::clone(&self.policy),
                output.clone(),
            ));
        }
        drop(input);

        let mut computed = 0;
        let mut failure = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(count)) => computed += count,
                Ok(Err(err)) => {
                    if failure.is_none() {
                        workers.abort_all();
                        failure = Some(err);
                    }
                }
                Err(err) if err.is_cancelled() => {}
                Err(err) => {
                    if failure.is_none() {
                        workers.abort_all();
                        failure = Some(PipelineError::task_failed(ENGINE_STAGE, err));
                    }
                }
            }
        }
        if let Some(err) = failure {
            return Err(err);
        }

        lifecycle.advance(StageState::Draining)?;
        output
            .send(Envelope::EndOfStream)
            .await
            .map_err(|_| PipelineError::DownstreamClosed {
                stage: ENGINE_STAGE,
            })?;
        lifecycle.advance(StageState::Terminated)?;

        Ok(lifecycle.report(computed))
    }
}

async fn engine_worker(
    worker_id: usize,
    input: Arc<SharedReceiver<EmployeeRecord>>,
    policy: Arc<TaxPolicy>,
    output: QueueSender<ComputationResult>,
) -> Result<usize, PipelineError> {
    debug!(worker_id, "tax engine worker started");

    let mut computed = 0;
    while let Some(record) = input.next().await? {
        trace!(worker_id, employee_id = %record.employee_id, "computing deductions");
        let result = ComputationResult::compute(record, &policy, Local::now().naive_local());
        output
            .send(Envelope::Item(result))
            .await
            .map_err(|_| PipelineError::DownstreamClosed {
                stage: ENGINE_STAGE,
            })?;
        computed += 1;
    }

    debug!(worker_id, computed, "tax engine worker finished");
    Ok(computed)
}
