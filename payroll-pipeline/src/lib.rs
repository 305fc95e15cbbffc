//! Streaming payroll deduction pipeline.
//!
//! Employee income records are read lazily from CSV, pushed through a pool of
//! tax engine workers and written to a [`ResultSink`]. Stages are connected by
//! bounded queues and shut down in order on an explicit end-of-stream marker.
//!
//! | Module        | Role                                                  |
//! |---------------|-------------------------------------------------------|
//! | [`config`]    | city rate tables and the derived [`TaxPolicy`]        |
//! | [`source`]    | CSV record reader and the source stage                |
//! | [`engine`]    | worker pool applying the policy to each record        |
//! | [`sink`]      | CSV result writer and the sink stage                  |
//! | [`pipeline`]  | wires the three stages together for one run           |
//! | [`lifecycle`] | per-stage state machine                               |
//! | [`queue`]     | bounded queues carrying the end-of-stream marker      |
//!
//! [`TaxPolicy`]: payroll_core::TaxPolicy

pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod pipeline;
pub mod queue;
pub mod sink;
pub mod source;

pub use config::{ConfigError, PayrollConfig};
pub use error::PipelineError;
pub use pipeline::{Pipeline, PipelineOptions, PipelineOutput, PipelineSummary};
pub use sink::{CsvResultSink, MemorySink, ResultSink, SinkError};
pub use source::{RecordFormatError, RecordSource, SourceError};
