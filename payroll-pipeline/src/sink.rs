//! Result persistence.
//!
//! ## Output format
//!
//! [`CsvResultSink`] writes one headerless CSV row per employee:
//!
//! | Column             | Example               |
//! |--------------------|-----------------------|
//! | employee id        | `E1`                  |
//! | income             | `10000`               |
//! | social insurance   | `1050.00`             |
//! | tax                | `535.00`              |
//! | net income         | `8415.00`             |
//! | computed at        | `2024-01-31 09:30:00` |
//!
//! Amounts are rounded half-up to two decimals at this point and nowhere
//! earlier.

use std::io::{Read, Write};

use payroll_core::ComputationResult;
use payroll_core::calculations::common::format_amount;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::trace;

use crate::error::PipelineError;
use crate::lifecycle::{StageLifecycle, StageReport, StageState};
use crate::queue::{Envelope, QueueReceiver};

pub const SINK_STAGE: &str = "result sink";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write result for '{employee_id}': {source}")]
    Write {
        employee_id: String,
        #[source]
        source: csv::Error,
    },

    #[error("failed to flush output: {0}")]
    Flush(#[from] std::io::Error),
}

/// Destination for computed results.
pub trait ResultSink: Send {
    /// Persists one result. Called once per result, in arrival order.
    fn write(
        &mut self,
        result: &ComputationResult,
    ) -> Result<(), SinkError>;

    /// Called once after the last result; flushes anything buffered.
    fn finish(&mut self) -> Result<(), SinkError>;
}

/// Writes results as CSV rows.
pub struct CsvResultSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvResultSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(writer),
        }
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer
            .into_inner()
            .map_err(|err| SinkError::Flush(err.into_error()))
    }
}

impl<W: Write + Send> ResultSink for CsvResultSink<W> {
    fn write(
        &mut self,
        result: &ComputationResult,
    ) -> Result<(), SinkError> {
        let income = result.income.to_string();
        let social_insurance = format_amount(result.social_insurance);
        let tax = format_amount(result.tax);
        let net_income = format_amount(result.net_income);
        let computed_at = result.formatted_timestamp();

        self.writer
            .write_record([
                result.employee_id.as_str(),
                income.as_str(),
                social_insurance.as_str(),
                tax.as_str(),
                net_income.as_str(),
                computed_at.as_str(),
            ])
            .map_err(|source| SinkError::Write {
                employee_id: result.employee_id.clone(),
                source,
            })
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps results in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    results: Vec<ComputationResult>,
    finished: bool,
}

impl MemorySink {
    pub fn results(&self) -> &[ComputationResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<ComputationResult> {
        self.results
    }

    /// True once [`ResultSink::finish`] has been called.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl ResultSink for MemorySink {
    fn write(
        &mut self,
        result: &ComputationResult,
    ) -> Result<(), SinkError> {
        self.results.push(result.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.finished = true;
        Ok(())
    }
}

/// One row of a results file, as read back from disk.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResultRow {
    pub employee_id: String,
    pub income: u64,
    pub social_insurance: Decimal,
    pub tax: Decimal,
    pub net_income: Decimal,
    pub computed_at: String,
}

/// Parses rows written by [`CsvResultSink`].
pub fn read_results<R: Read>(reader: R) -> Result<Vec<ResultRow>, csv::Error> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(reader)
        .deserialize()
        .collect()
}

/// Runs the sink stage: persists results until the end-of-stream marker,
/// then finishes the sink.
///
/// Blocks on the queue, so it must run on a blocking thread.
pub fn consume<S: ResultSink>(
    sink: &mut S,
    mut input: QueueReceiver<ComputationResult>,
) -> Result<StageReport, PipelineError> {
    let mut lifecycle = StageLifecycle::new(SINK_STAGE);
    lifecycle.advance(StageState::Running)?;

    let mut written = 0;
    loop {
        match input.blocking_recv() {
            Some(Envelope::Item(result)) => {
                trace!(employee_id = %result.employee_id, "writing result");
                sink.write(&result)?;
                written += 1;
            }
            Some(Envelope::EndOfStream) => break,
            None => return Err(PipelineError::UpstreamAborted { stage: SINK_STAGE }),
        }
    }

    lifecycle.advance(StageState::Draining)?;
    sink.finish()?;
    lifecycle.advance(StageState::Terminated)?;

    Ok(lifecycle.report(written))
}
