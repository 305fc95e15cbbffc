//! Employee income records.
//!
//! ## Input format
//!
//! One record per line, no header row:
//!
//! ```text
//! employee_id,income
//! ```
//!
//! `income` must be a non-negative integer. Whitespace around either field is
//! ignored. Quotes have no special meaning, so a comma always separates
//! fields and a record never spans lines. Blank lines are skipped by the csv
//! reader before a record is parsed; each gap is logged at `debug` and counted
//! in [`RecordSource::skipped_blank_lines`]. Any other malformed line is fatal.

use std::io::Read;

use csv::StringRecord;
use payroll_core::EmployeeRecord;
use thiserror::Error;
use tracing::{debug, trace};

use crate::error::PipelineError;
use crate::lifecycle::{StageLifecycle, StageReport, StageState};
use crate::queue::{Envelope, QueueSender};

pub const SOURCE_STAGE: &str = "record source";

/// A line that cannot be turned into an [`EmployeeRecord`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordFormatError {
    #[error("line {line}: expected 2 comma-separated fields, found {found}")]
    FieldCount { line: u64, found: usize },

    #[error("line {line}: employee id is empty")]
    EmptyEmployeeId { line: u64 },

    #[error("line {line}: income '{value}' is not a non-negative integer")]
    InvalidIncome { line: u64, value: String },

    #[error("line {line}: input is not valid UTF-8")]
    InvalidUtf8 { line: u64 },

    #[error("malformed input: {0}")]
    Malformed(String),
}

/// Errors produced while reading records.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid record: {0}")]
    Format(#[from] RecordFormatError),

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for SourceError {
    fn from(err: csv::Error) -> Self {
        let message = err.to_string();
        match err.into_kind() {
            csv::ErrorKind::Io(io) => SourceError::Io(io),
            csv::ErrorKind::Utf8 { pos, .. } => {
                RecordFormatError::InvalidUtf8 {
                    line: pos.map_or(0, |p| p.line()),
                }
                .into()
            }
            _ => RecordFormatError::Malformed(message).into(),
        }
    }
}

/// Lazy reader of employee records.
///
/// Records are parsed one line at a time as the iterator is advanced, so the
/// whole input never needs to fit in memory. The iterator is single-pass.
pub struct RecordSource<R: Read> {
    records: csv::StringRecordsIntoIter<R>,
    last_line: u64,
    skipped_blank_lines: u64,
}

impl<R: Read> RecordSource<R> {
    pub fn new(reader: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // field count is checked per line
            .trim(csv::Trim::All)
            .quoting(false)
            .from_reader(reader);

        Self {
            records: reader.into_records(),
            last_line: 0,
            skipped_blank_lines: 0,
        }
    }

    /// Blank lines passed over so far.
    pub fn skipped_blank_lines(&self) -> u64 {
        self.skipped_blank_lines
    }

    fn note_line(
        &mut self,
        record: &StringRecord,
    ) {
        let Some(line) = record.position().map(|p| p.line()) else {
            return;
        };
        let skipped = line.saturating_sub(self.last_line + 1);
        if skipped > 0 {
            debug!(line, skipped, "skipped blank lines");
            self.skipped_blank_lines += skipped;
        }
        self.last_line = line;
    }
}

impl<R: Read> Iterator for RecordSource<R> {
    type Item = Result<EmployeeRecord, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(err) => return Some(Err(err.into())),
        };
        self.note_line(&record);
        Some(parse_record(&record).map_err(SourceError::from))
    }
}

fn parse_record(record: &StringRecord) -> Result<EmployeeRecord, RecordFormatError> {
    let line = record.position().map_or(0, |p| p.line());

    if record.len() != 2 {
        return Err(RecordFormatError::FieldCount {
            line,
            found: record.len(),
        });
    }

    let employee_id = &record[0];
    if employee_id.is_empty() {
        return Err(RecordFormatError::EmptyEmployeeId { line });
    }

    let income = record[1]
        .parse::<u64>()
        .map_err(|_| RecordFormatError::InvalidIncome {
            line,
            value: record[1].to_string(),
        })?;

    Ok(EmployeeRecord::new(employee_id, income))
}

/// Runs the source stage: pushes every record into `output`, then the
/// end-of-stream marker.
///
/// Blocks while the queue is full, so it must run on a blocking thread. On the
/// first bad record it returns without sending the marker, which downstream
/// stages observe as an aborted upstream.
pub fn produce<I>(
    records: I,
    output: QueueSender<EmployeeRecord>,
) -> Result<StageReport, PipelineError>
where
    I: Iterator<Item = Result<EmployeeRecord, SourceError>>,
{
    let mut lifecycle = StageLifecycle::new(SOURCE_STAGE);
    lifecycle.advance(StageState::Running)?;

    let closed = |_| PipelineError::DownstreamClosed {
        stage: SOURCE_STAGE,
    };

    let mut produced = 0;
    for record in records {
        let record = record?;
        trace!(employee_id = %record.employee_id, "record read");
        output.blocking_send(Envelope::Item(record)).map_err(closed)?;
        produced += 1;
    }

    lifecycle.advance(StageState::Draining)?;
    output.blocking_send(Envelope::EndOfStream).map_err(closed)?;
    lifecycle.advance(StageState::Terminated)?;

    Ok(lifecycle.report(produced))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::queue;

    fn read_all(input: &str) -> Vec<Result<EmployeeRecord, SourceError>> {
        RecordSource::new(input.as_bytes()).collect()
    }

    fn format_error(result: &Result<EmployeeRecord, SourceError>) -> &RecordFormatError {
        match result {
            Err(SourceError::Format(err)) => err,
            other => panic!("expected a format error, got {other:?}"),
        }
    }

    // =========================================================================
    // RecordSource tests
    // =========================================================================

    #[test]
    fn test_parse_valid_lines() {
        let records: Vec<_> = RecordSource::new("E1,10000\nE2,3000\n".as_bytes())
            .collect::<Result<_, _>>()
            .expect("valid input");

        assert_eq!(
            records,
            vec![EmployeeRecord::new("E1", 10000), EmployeeRecord::new("E2", 3000)]
        );
    }

    #[test]
    fn test_parse_trims_whitespace_and_skips_blank_lines() {
        let records: Vec<_> = RecordSource::new(" E1 , 10000 \n\nE2,0".as_bytes())
            .collect::<Result<_, _>>()
            .expect("valid input");

        assert_eq!(
            records,
            vec![EmployeeRecord::new("E1", 10000), EmployeeRecord::new("E2", 0)]
        );
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(read_all("").is_empty());
    }

    #[test]
    fn test_parse_is_lazy() {
        let mut source = RecordSource::new("E1,100\nbroken\n".as_bytes());

        let first = source.next().expect("first line").expect("valid first line");
        assert_eq!(first, EmployeeRecord::new("E1", 100));

        let second = source.next().expect("second line");
        assert_eq!(
            format_error(&second),
            &RecordFormatError::FieldCount { line: 2, found: 1 }
        );
    }

    #[test]
    fn test_parse_too_many_fields() {
        let results = read_all("E1,100,extra\n");

        assert_eq!(
            format_error(&results[0]),
            &RecordFormatError::FieldCount { line: 1, found: 3 }
        );
    }

    #[test]
    fn test_parse_empty_employee_id() {
        let results = read_all(",100\n");

        assert_eq!(
            format_error(&results[0]),
            &RecordFormatError::EmptyEmployeeId { line: 1 }
        );
    }

    #[test]
    fn test_parse_negative_income() {
        let results = read_all("E1,100\nE2,-5\n");

        assert!(results[0].is_ok());
        assert_eq!(
            format_error(&results[1]),
            &RecordFormatError::InvalidIncome {
                line: 2,
                value: "-5".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_fractional_income() {
        let results = read_all("E1,100.50\n");

        assert_eq!(
            format_error(&results[0]),
            &RecordFormatError::InvalidIncome {
                line: 1,
                value: "100.50".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_quotes_are_plain_characters() {
        let results = read_all("\"E1,x\",100\n");

        assert_eq!(
            format_error(&results[0]),
            &RecordFormatError::FieldCount { line: 1, found: 3 }
        );
    }

    #[test]
    fn test_parse_quoted_field_does_not_span_lines() {
        let mut source = RecordSource::new("\"E1\nE2\",100\nE3,5\n".as_bytes());

        let first = source.next().expect("first line");
        assert_eq!(
            format_error(&first),
            &RecordFormatError::FieldCount { line: 1, found: 1 }
        );
    }

    #[test]
    fn test_produce_aborts_on_line_with_unbalanced_quote() {
        let (tx, mut rx) = queue::bounded(8);

        let err = produce(RecordSource::new("\"E1\nE2\",100\n".as_bytes()), tx)
            .expect_err("first line is malformed");

        assert!(matches!(err, PipelineError::Source(SourceError::Format(_))));
        assert_eq!(rx.blocking_recv(), None);
    }

    #[test]
    fn test_parse_counts_skipped_blank_lines() {
        let mut source = RecordSource::new("E1,1\n\n\nE2,2\n\nE3,3\n".as_bytes());

        let records: Vec<_> = source.by_ref().collect::<Result<_, _>>().expect("valid input");

        assert_eq!(records.len(), 3);
        assert_eq!(source.skipped_blank_lines(), 3);
    }

    #[test]
    fn test_parse_invalid_utf8() {
        let bytes: &[u8] = b"E1,100\n\xff\xfe,200\n";

        let results: Vec<_> = RecordSource::new(bytes).collect();

        assert!(results[0].is_ok());
        assert_eq!(
            format_error(&results[1]),
            &RecordFormatError::InvalidUtf8 { line: 2 }
        );
    }

    // =========================================================================
    // produce tests
    // =========================================================================

    #[test]
    fn test_produce_sends_items_then_end_of_stream() {
        let (tx, mut rx) = queue::bounded(8);

        let report = produce(RecordSource::new("E1,1\nE2,2\n".as_bytes()), tx).expect("produce");

        assert_eq!(report.items, 2);
        assert_eq!(report.state, StageState::Terminated);
        assert_eq!(
            rx.blocking_recv(),
            Some(Envelope::Item(EmployeeRecord::new("E1", 1)))
        );
        assert_eq!(
            rx.blocking_recv(),
            Some(Envelope::Item(EmployeeRecord::new("E2", 2)))
        );
        assert_eq!(rx.blocking_recv(), Some(Envelope::EndOfStream));
        assert_eq!(rx.blocking_recv(), None);
    }

    #[test]
    fn test_produce_empty_input_sends_only_end_of_stream() {
        let (tx, mut rx) = queue::bounded(1);

        let report = produce(RecordSource::new("".as_bytes()), tx).expect("produce");

        assert_eq!(report.items, 0);
        assert_eq!(rx.blocking_recv(), Some(Envelope::EndOfStream));
        assert_eq!(rx.blocking_recv(), None);
    }

    #[test]
    fn test_produce_stops_without_marker_on_bad_record() {
        let (tx, mut rx) = queue::bounded(8);

        let err = produce(RecordSource::new("E1,1\nbad\nE3,3\n".as_bytes()), tx)
            .expect_err("bad line aborts");

        assert!(matches!(err, PipelineError::Source(SourceError::Format(_))));
        assert_eq!(
            rx.blocking_recv(),
            Some(Envelope::Item(EmployeeRecord::new("E1", 1)))
        );
        assert_eq!(rx.blocking_recv(), None);
    }

    #[test]
    fn test_produce_reports_closed_queue() {
        let (tx, rx) = queue::bounded(1);
        drop(rx);

        let err = produce(RecordSource::new("E1,1\n".as_bytes()), tx).expect_err("no receiver");

        assert!(matches!(
            err,
            PipelineError::DownstreamClosed {
                stage: SOURCE_STAGE
            }
        ));
    }
}
