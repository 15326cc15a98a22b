//! Record-at-a-time batch engine.
//!
//! An engine pulls records from its source one at a time and pushes each
//! record through the whole stage chain before reading the next:
//!
//! ```text
//! READ -> FILTER -> MAP -> VALIDATE -> PROCESS
//!                                        |
//!         FILTERED | IGNORED | REJECTED | ERROR | SUCCESS
//! ```
//!
//! Every record read reaches exactly one outcome, counted in the run's
//! [`Report`]. Record-level outcomes never stop the run; only a source
//! failure does. Engines are built with [`Engine::builder`] and run once.

use chrono::Local;
use tokio_util::sync::CancellationToken;

use crate::builder::EngineBuilder;
use crate::error::{EngineError, SourceError};
use crate::record::Record;
use crate::report::{RecordOutcome, Report, Status};
use crate::source::RecordSource;
use crate::stage::{
    ErrorHandler, Identity, RecordFilter, RecordMapper, RecordProcessor, RecordValidator,
};

/// Callback invoked after each record outcome with the in-progress report.
pub type RecordCallback = Box<dyn FnMut(&Report) + Send>;

/// One configured run over a source.
///
/// `P` is the payload type after mapping, seen by validators, the processor
/// and the error handler.
pub struct Engine<S: RecordSource, P> {
    pub(crate) name: String,
    pub(crate) source: S,
    pub(crate) filters: Vec<Box<dyn RecordFilter<S::Payload>>>,
    pub(crate) mapper: Box<dyn RecordMapper<S::Payload, Output = P>>,
    pub(crate) validators: Vec<Box<dyn RecordValidator<P>>>,
    pub(crate) processor: Box<dyn RecordProcessor<P>>,
    pub(crate) error_handler: Box<dyn ErrorHandler<P>>,
    pub(crate) limit: Option<u64>,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) on_record: Option<RecordCallback>,
}

impl<S: RecordSource> Engine<S, S::Payload> {
    /// Start configuring an engine reading from `source`.
    pub fn builder(source: S) -> EngineBuilder<S, Identity<S::Payload>> {
        EngineBuilder::new(source)
    }
}

impl<S: RecordSource, P> Engine<S, P> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute the run to completion.
    ///
    /// Returns the finished report, or a report with status `Aborted` when
    /// the cancellation token fired. A source failure aborts the run and is
    /// returned as [`EngineError::Source`], carrying the partial report.
    pub fn run(mut self) -> Result<Report, EngineError> {
        let started = Local::now();
        let mut report = Report::new(self.source.description());
        tracing::info!(engine = %self.name, source = %report.data_source(), "engine starting");

        if let Err(error) = self.source.open() {
            report.start(started, None);
            return Err(self.abort(report, error));
        }
        report.start(started, self.source.total_count());

        let mut read: u64 = 0;
        let status = loop {
            if self.cancellation.as_ref().is_some_and(|t| t.is_cancelled()) {
                tracing::warn!(
                    engine = %self.name,
                    records = read,
                    "cancellation requested, stopping run"
                );
                break Status::Aborted;
            }
            if self.limit.is_some_and(|limit| read >= limit) {
                tracing::debug!(engine = %self.name, records = read, "record limit reached");
                break Status::Finished;
            }
            if !self.source.has_next() {
                break Status::Finished;
            }

            let record = match self.source.read_next() {
                Ok(record) => record,
                Err(error) => return Err(self.abort(report, error)),
            };
            read += 1;
            if let Some(total) = report.total_records()
                && read == total + 1
            {
                tracing::warn!(
                    engine = %self.name,
                    total,
                    "source delivered more records than announced"
                );
            }
            report.set_current_record_number(read);

            let outcome = self.handle(record);
            report.record_outcome(outcome);

            if let Some(callback) = self.on_record.as_mut() {
                callback(&report);
            }
        };

        self.close_source();
        report.set_result(self.processor.computation_result());
        report.complete(status, Local::now());
        tracing::info!(
            engine = %self.name,
            status = %report.status(),
            records = report.current_record_number(),
            duration_ms = report.duration_ms(),
            "engine finished"
        );
        Ok(report)
    }

    /// Walk one record through the stage chain.
    fn handle(&mut self, record: Record<S::Payload>) -> RecordOutcome {
        let number = record.number();

        for filter in self.filters.iter_mut() {
            if filter.excludes(&record) {
                tracing::debug!(
                    engine = %self.name,
                    record = number,
                    filter = filter.name(),
                    "record filtered"
                );
                return RecordOutcome::Filtered;
            }
        }

        let record = match self.mapper.map(record) {
            Ok(record) => record,
            Err(error) => {
                tracing::debug!(
                    engine = %self.name,
                    record = number,
                    reason = %error,
                    "record ignored"
                );
                return RecordOutcome::Ignored;
            }
        };

        for validator in self.validators.iter_mut() {
            if let Err(error) = validator.validate(&record) {
                tracing::debug!(
                    engine = %self.name,
                    record = number,
                    validator = validator.name(),
                    reason = %error,
                    "record rejected"
                );
                return RecordOutcome::Rejected;
            }
        }

        match self.processor.process(&record) {
            Ok(()) => RecordOutcome::Success,
            Err(error) => {
                self.error_handler.handle(&record, &*error);
                RecordOutcome::Error
            }
        }
    }

    fn abort(&mut self, mut report: Report, error: SourceError) -> EngineError {
        tracing::error!(engine = %self.name, error = %error, "source failure, aborting run");
        self.close_source();
        report.set_result(self.processor.computation_result());
        report.complete(Status::Aborted, Local::now());
        EngineError::Source {
            engine: self.name.clone(),
            report: Box::new(report),
            error,
        }
    }

    fn close_source(&mut self) {
        if let Err(error) = self.source.close() {
            tracing::warn!(engine = %self.name, error = %error, "failed to close source");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BoxError, MappingError, ValidationError};
    use crate::source::IterSource;
    use crate::stage::{CollectingProcessor, CountingProcessor};
    use std::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Source that fails on a given record number and tracks closing.
    struct FailingSource {
        next: u64,
        fail_at: u64,
        closed: Arc<Mutex<bool>>,
    }

    impl RecordSource for FailingSource {
        type Payload = u64;

        fn has_next(&mut self) -> bool {
            true
        }

        fn read_next(&mut self) -> Result<Record<u64>, SourceError> {
            self.next += 1;
            if self.next == self.fail_at {
                return Err(SourceError::Malformed {
                    number: self.next,
                    detail: "bad bytes".to_string(),
                });
            }
            Ok(Record::numbered(self.next, self.next))
        }

        fn total_count(&self) -> Option<u64> {
            Some(10)
        }

        fn description(&self) -> String {
            "Failing".to_string()
        }

        fn close(&mut self) -> Result<(), SourceError> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    /// Wraps a source and counts calls to `close`.
    struct CloseCounting<S> {
        inner: S,
        closes: Arc<AtomicUsize>,
    }

    impl<S> CloseCounting<S> {
        fn new(inner: S) -> (Self, Arc<AtomicUsize>) {
            let closes = Arc::new(AtomicUsize::new(0));
            let source = Self {
                inner,
                closes: Arc::clone(&closes),
            };
            (source, closes)
        }
    }

    impl<S: RecordSource> RecordSource for CloseCounting<S> {
        type Payload = S::Payload;

        fn has_next(&mut self) -> bool {
            self.inner.has_next()
        }

        fn read_next(&mut self) -> Result<Record<S::Payload>, SourceError> {
            self.inner.read_next()
        }

        fn total_count(&self) -> Option<u64> {
            self.inner.total_count()
        }

        fn description(&self) -> String {
            self.inner.description()
        }

        fn close(&mut self) -> Result<(), SourceError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.inner.close()
        }
    }

    #[test]
    fn test_all_success() {
        let report = Engine::builder(IterSource::new(1..=5))
            .processor(CountingProcessor::new())
            .build()
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.status(), Status::Finished);
        assert_eq!(report.total_records(), Some(5));
        assert_eq!(report.current_record_number(), 5);
        assert_eq!(report.success_records(), 5);
        assert_eq!(report.result(), Some("5"));
        assert_eq!(report.data_source(), "In-Memory");
        assert!(report.end_time().is_some());
    }

    #[test]
    fn test_each_outcome_counted_once() {
        // 1..=10: 1,2 filtered; 3,4 ignored; 5,6 rejected; 7,8 errors; 9,10 success
        let report = Engine::builder(IterSource::new(1u32..=10))
            .filter(|r: &Record<u32>| *r.payload() <= 2)
            .mapper(|r: Record<u32>| {
                if matches!(*r.payload(), 3 | 4) {
                    Err(MappingError::new("unusable"))
                } else {
                    Ok(r.map(|n| n.to_string()))
                }
            })
            .validator(|r: &Record<String>| match r.payload().as_str() {
                "5" | "6" => Err(ValidationError::new("invalid")),
                _ => Ok(()),
            })
            .processor(|r: &Record<String>| -> Result<(), BoxError> {
                match r.payload().as_str() {
                    "7" | "8" => Err("processing failed".into()),
                    _ => Ok(()),
                }
            })
            .error_handler(|_: &Record<String>, _: &(dyn Error + 'static)| {})
            .build()
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.filtered_records(), 2);
        assert_eq!(report.ignored_records(), 2);
        assert_eq!(report.rejected_records(), 2);
        assert_eq!(report.error_records(), 2);
        assert_eq!(report.success_records(), 2);
        assert_eq!(report.handled_records(), report.current_record_number());
        assert_eq!(report.formatted_filtered_records(), "2 (20.0%)");
    }

    #[test]
    fn test_first_excluding_filter_short_circuits() {
        let second_calls = Arc::new(Mutex::new(0));
        let calls = Arc::clone(&second_calls);
        let report = Engine::builder(IterSource::new(vec![1, 2, 3]))
            .filter(|_: &Record<i32>| true)
            .filter(move |_: &Record<i32>| {
                *calls.lock().unwrap() += 1;
                false
            })
            .processor(CountingProcessor::new())
            .build()
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.filtered_records(), 3);
        assert_eq!(*second_calls.lock().unwrap(), 0);
        assert_eq!(report.result(), Some("0"));
    }

    #[test]
    fn test_source_failure_aborts_with_partial_report() {
        let closed = Arc::new(Mutex::new(false));
        let source = FailingSource {
            next: 0,
            fail_at: 4,
            closed: Arc::clone(&closed),
        };
        let err = Engine::builder(source)
            .processor(CountingProcessor::new())
            .build()
            .unwrap()
            .run()
            .unwrap_err();

        let report = err.report();
        assert_eq!(report.status(), Status::Aborted);
        assert_eq!(report.current_record_number(), 3);
        assert_eq!(report.success_records(), 3);
        assert!(report.end_time().is_some());
        assert!(*closed.lock().unwrap());
        assert!(err.to_string().contains("bad bytes"));
    }

    #[test]
    fn test_limit_stops_normally() {
        let report = Engine::builder(IterSource::new(1..=100))
            .limit(7)
            .processor(CountingProcessor::new())
            .build()
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(report.status(), Status::Finished);
        assert_eq!(report.current_record_number(), 7);
        assert_eq!(report.success_records(), 7);
    }

    #[test]
    fn test_cancellation_between_records() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let report = Engine::builder(IterSource::new(1..=10))
            .cancellation_token(token)
            .processor(move |r: &Record<i32>| -> Result<(), BoxError> {
                if r.number() == 3 {
                    trigger.cancel();
                }
                Ok(())
            })
            .build()
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.status(), Status::Aborted);
        assert_eq!(report.current_record_number(), 3);
        assert_eq!(report.handled_records(), 3);
    }

    #[test]
    fn test_source_closed_once_when_finished() {
        let (source, closes) = CloseCounting::new(IterSource::new(1..=5));
        let report = Engine::builder(source)
            .processor(CountingProcessor::new())
            .build()
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(report.status(), Status::Finished);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_source_closed_once_at_limit() {
        let (source, closes) = CloseCounting::new(IterSource::new(1..=100));
        let report = Engine::builder(source)
            .limit(4)
            .processor(CountingProcessor::new())
            .build()
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(report.current_record_number(), 4);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_source_closed_once_when_cancelled() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let (source, closes) = CloseCounting::new(IterSource::new(1..=10));
        let report = Engine::builder(source)
            .cancellation_token(token)
            .processor(move |r: &Record<i32>| -> Result<(), BoxError> {
                if r.number() == 2 {
                    trigger.cancel();
                }
                Ok(())
            })
            .build()
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(report.status(), Status::Aborted);
        assert_eq!(report.current_record_number(), 2);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_source_closed_once_when_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let (source, closes) = CloseCounting::new(IterSource::new(1..=10));
        let report = Engine::builder(source)
            .cancellation_token(token)
            .processor(CountingProcessor::new())
            .build()
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(report.status(), Status::Aborted);
        assert_eq!(report.current_record_number(), 0);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_progress_callback_sees_running_report() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        Engine::builder(IterSource::new(vec!["a", "b", "c", "d"]))
            .processor(CollectingProcessor::new())
            .on_record(move |report: &Report| {
                sink.lock()
                    .unwrap()
                    .push((report.status(), report.formatted_progress()));
            })
            .build()
            .unwrap()
            .run()
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[1], (Status::Running, "2/4 (50.0%)".to_string()));
    }

    #[test]
    fn test_engine_is_send() {
        fn assert_send<T: Send>(_: &T) {}
        let engine = Engine::builder(IterSource::new(vec![1u8]))
            .processor(CountingProcessor::new())
            .build()
            .unwrap();
        assert_send(&engine);
        let handle = std::thread::spawn(move || engine.run());
        assert_eq!(handle.join().unwrap().unwrap().success_records(), 1);
    }
}
