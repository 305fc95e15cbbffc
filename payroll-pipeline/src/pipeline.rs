//! Three-stage pipeline: record source, tax engine, result sink.
//!
//! ```text
//!  records ──► [source] ──queue──► [engine × N] ──queue──► [sink] ──► output
//! ```
//!
//! The source and sink do blocking IO and run on the blocking thread pool.
//! The engine workers are async tasks. Both queues are bounded, so a slow sink
//! eventually stalls the source instead of buffering the whole input.
//!
//! A run succeeds only if every stage reaches
//! [`StageState::Terminated`](crate::lifecycle::StageState::Terminated). When
//! a stage fails, its neighbours see a closed queue and stop too; the error
//! returned is the one that started the shutdown.

use std::sync::Arc;

use payroll_core::{EmployeeRecord, TaxPolicy};
use tokio::task;
use tracing::{debug, error, info};

use crate::engine::{ENGINE_STAGE, TaxEngine};
use crate::error::PipelineError;
use crate::lifecycle::{StageReport, StageState};
use crate::queue;
use crate::sink::{self, ResultSink, SINK_STAGE};
use crate::source::{self, SOURCE_STAGE, SourceError};

pub const DEFAULT_WORKERS: usize = 1;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Number of engine workers. Output order follows input order only when
    /// this is 1.
    pub workers: usize,
    /// Capacity of each inter-stage queue.
    pub queue_capacity: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl PipelineOptions {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.workers == 0 {
            return Err(PipelineError::InvalidOptions(
                "at least one engine worker is required".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(PipelineError::InvalidOptions(
                "queue capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-stage reports of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    pub source: StageReport,
    pub engine: StageReport,
    pub sink: StageReport,
}

impl PipelineSummary {
    /// Every stage terminated and every record read was written.
    pub fn is_complete(&self) -> bool {
        [&self.source, &self.engine, &self.sink]
            .iter()
            .all(|report| report.state == StageState::Terminated)
            && self.source.items == self.engine.items
            && self.engine.items == self.sink.items
    }
}

/// Result of a successful run. The sink is handed back after it has been
/// finished.
#[derive(Debug)]
pub struct PipelineOutput<S> {
    pub summary: PipelineSummary,
    pub sink: S,
}

/// A configured pipeline. One instance can execute any number of runs; each
/// run gets its own queues.
#[derive(Debug, Clone)]
pub struct Pipeline {
    options: PipelineOptions,
    policy: Arc<TaxPolicy>,
}

impl Pipeline {
    pub fn new(
        options: PipelineOptions,
        policy: Arc<TaxPolicy>,
    ) -> Result<Self, PipelineError> {
        options.validate()?;
        Ok(Self { options, policy })
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Streams `records` through the engine into `sink`.
    ///
    /// Returns once all three stages have stopped. On success `sink` has been
    /// finished and is returned with the stage reports.
    pub async fn run<I, S>(
        &self,
        records: I,
        sink: S,
    ) -> Result<PipelineOutput<S>, PipelineError>
    where
        I: IntoIterator<Item = Result<EmployeeRecord, SourceError>>,
        I::IntoIter: Send + 'static,
        S: ResultSink + 'static,
    {
        info!(
            workers = self.options.workers,
            queue_capacity = self.options.queue_capacity,
            "starting pipeline"
        );

        let (record_tx, record_rx) = queue::bounded(self.options.queue_capacity);
        let (result_tx, result_rx) = queue::bounded(self.options.queue_capacity);

        let records = records.into_iter();
        let source = task::spawn_blocking(move || source::produce(records, record_tx));

        let engine = tokio::spawn(
            TaxEngine::new(Arc::clone(&self.policy), self.options.workers)
                .run(record_rx, result_tx),
        );

        let sink = task::spawn_blocking(move || {
            let mut sink = sink;
            sink::consume(&mut sink, result_rx).map(|report| (report, sink))
        });

        let (source, engine, sink) = tokio::join!(source, engine, sink);
        let source = source.map_err(|err| PipelineError::task_failed(SOURCE_STAGE, err))?;
        let engine = engine.map_err(|err| PipelineError::task_failed(ENGINE_STAGE, err))?;
        let sink = sink.map_err(|err| PipelineError::task_failed(SINK_STAGE, err))?;

        let failure = match (source, engine, sink) {
            (Ok(source), Ok(engine), Ok((sink_report, sink))) => {
                let summary = PipelineSummary {
                    source,
                    engine,
                    sink: sink_report,
                };
                info!(records = summary.sink.items, "pipeline finished");
                return Ok(PipelineOutput { summary, sink });
            }
            (Err(err), engine, sink) => root_cause(err, [engine.err(), sink.err()]),
            (Ok(_), Err(err), sink) => root_cause(err, [sink.err()]),
            (Ok(_), Ok(_), Err(err)) => err,
        };
        error!(error = %failure, "pipeline aborted");
        Err(failure)
    }
}

/// Picks the error that started a shutdown: the first stage error, in
/// pipeline order, that is not just a reaction to a neighbour going away.
/// Falls back to `first` when every error is propagated.
fn root_cause<I>(
    first: PipelineError,
    later: I,
) -> PipelineError
where
    I: IntoIterator<Item = Option<PipelineError>>,
{
    let mut errors = vec![first];
    errors.extend(later.into_iter().flatten());
    for err in &errors {
        debug!(error = %err, "stage failed");
    }

    let index = errors
        .iter()
        .position(|err| !err.is_propagated())
        .unwrap_or(0);
    errors.swap_remove(index)
}
