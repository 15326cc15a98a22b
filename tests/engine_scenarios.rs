//! End-to-end engine scenarios: outcome accounting, failure policy and
//! progress reporting.

use std::error::Error;
use std::sync::{Arc, Mutex};

use batch_pipelines::{
    BoxError, CountingProcessor, Engine, IterSource, MappingError, Record, RecordSource, Report,
    SourceError, Status, ValidationError,
};

/// Ten records, two reaching each outcome, in the order
/// filtered, ignored, rejected, error, success.
fn outcome_for(n: u32) -> &'static str {
    match n {
        1 | 2 => "filter",
        3 | 4 => "ignore",
        5 | 6 => "reject",
        7 | 8 => "fail",
        _ => "ok",
    }
}

fn ten_record_engine(
    progress: Arc<Mutex<Vec<String>>>,
) -> Engine<IterSource<std::ops::RangeInclusive<u32>>, u32> {
    Engine::builder(IterSource::new(1u32..=10))
        .name("scenario")
        .filter(|r: &Record<u32>| outcome_for(*r.payload()) == "filter")
        .mapper(|r: Record<u32>| {
            if outcome_for(*r.payload()) == "ignore" {
                Err(MappingError::new("unusable"))
            } else {
                Ok(r)
            }
        })
        .validator(|r: &Record<u32>| {
            if outcome_for(*r.payload()) == "reject" {
                Err(ValidationError::new("invalid"))
            } else {
                Ok(())
            }
        })
        .processor(|r: &Record<u32>| -> Result<(), BoxError> {
            if outcome_for(*r.payload()) == "fail" {
                Err(format!("cannot process {}", r.payload()).into())
            } else {
                Ok(())
            }
        })
        .error_handler(|_: &Record<u32>, _: &(dyn Error + 'static)| {})
        .on_record(move |report: &Report| {
            progress.lock().unwrap().push(report.formatted_progress());
        })
        .build()
        .unwrap()
}

#[test]
fn test_two_records_per_outcome() {
    let progress = Arc::new(Mutex::new(Vec::new()));
    let report = ten_record_engine(Arc::clone(&progress)).run().unwrap();

    assert_eq!(report.status(), Status::Finished);
    assert_eq!(report.current_record_number(), 10);
    assert_eq!(report.total_records(), Some(10));
    assert_eq!(report.handled_records(), report.current_record_number());

    assert_eq!(report.formatted_filtered_records(), "2 (20.0%)");
    assert_eq!(report.formatted_ignored_records(), "2 (20.0%)");
    assert_eq!(report.formatted_rejected_records(), "2 (20.0%)");
    assert_eq!(report.formatted_error_records(), "2 (20.0%)");
    assert_eq!(report.formatted_success_records(), "2 (20.0%)");

    let progress = progress.lock().unwrap();
    assert_eq!(progress[1], "2/10 (20.0%)");
    assert_eq!(progress[9], "10/10 (100.0%)");
}

#[test]
fn test_processing_error_does_not_halt_run() {
    let handled = Arc::new(Mutex::new(Vec::new()));
    let processed = Arc::new(Mutex::new(Vec::new()));
    let handled_sink = Arc::clone(&handled);
    let processed_sink = Arc::clone(&processed);

    let report = Engine::builder(IterSource::new(1u32..=10))
        .processor(move |r: &Record<u32>| -> Result<(), BoxError> {
            processed_sink.lock().unwrap().push(r.number());
            if r.number() == 5 {
                return Err("record five is broken".into());
            }
            Ok(())
        })
        .error_handler(move |r: &Record<u32>, e: &(dyn Error + 'static)| {
            handled_sink.lock().unwrap().push((r.number(), e.to_string()));
        })
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(report.status(), Status::Finished);
    assert_eq!(report.error_records(), 1);
    assert_eq!(report.success_records(), 9);
    assert_eq!(*processed.lock().unwrap(), (1..=10).collect::<Vec<u64>>());
    assert_eq!(
        *handled.lock().unwrap(),
        vec![(5, "record five is broken".to_string())]
    );
}

#[test]
fn test_unknown_total_reports_not_available() {
    let stream = (1..).take_while(|n: &u32| *n <= 25);
    let report = Engine::builder(IterSource::new(stream))
        .processor(CountingProcessor::new())
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(report.total_records(), None);
    assert_eq!(report.current_record_number(), 25);
    assert_eq!(report.formatted_average_record_processing_time(), "N/A");
    assert_eq!(report.formatted_progress(), "N/A");
    assert_eq!(report.result(), Some("25"));
}

#[test]
fn test_empty_source_finishes() {
    let report = Engine::builder(IterSource::new(Vec::<String>::new()))
        .processor(CountingProcessor::new())
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(report.status(), Status::Finished);
    assert_eq!(report.current_record_number(), 0);
    assert_eq!(report.formatted_progress(), "N/A");
    assert!(report.to_string().contains("Result: 0"));
}

/// Source whose `open` fails.
struct Unreachable;

impl RecordSource for Unreachable {
    type Payload = ();

    fn open(&mut self) -> Result<(), SourceError> {
        Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no such table").into())
    }

    fn has_next(&mut self) -> bool {
        false
    }

    fn read_next(&mut self) -> Result<Record<()>, SourceError> {
        unreachable!("never opened")
    }

    fn description(&self) -> String {
        "Unreachable".to_string()
    }
}

#[test]
fn test_open_failure_aborts() {
    let err = Engine::builder(Unreachable)
        .processor(CountingProcessor::new())
        .build()
        .unwrap()
        .run()
        .unwrap_err();

    let report = err.into_report();
    assert_eq!(report.status(), Status::Aborted);
    assert_eq!(report.current_record_number(), 0);
    assert_eq!(report.data_source(), "Unreachable");
}

#[test]
fn test_parallel_runs_are_independent() {
    let handles: Vec<_> = (1..=4u32)
        .map(|n| {
            std::thread::spawn(move || {
                Engine::builder(IterSource::new(0..n * 10))
                    .name(format!("worker-{n}"))
                    .filter(|r: &Record<u32>| r.payload() % 2 == 1)
                    .processor(CountingProcessor::new())
                    .build()
                    .unwrap()
                    .run()
                    .unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let n = (i as u64) + 1;
        let report = handle.join().unwrap();
        assert_eq!(report.current_record_number(), n * 10);
        assert_eq!(report.filtered_records(), n * 5);
        assert_eq!(report.success_records(), n * 5);
    }
}
