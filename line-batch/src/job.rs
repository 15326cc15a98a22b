//! Job execution: wires a line source through the configured stages.
//!
//! Without routing, processed records are counted. With routing, the
//! engine's processor is a content-based dispatcher with one bounded queue
//! per route value plus a default queue, each drained by a consumer engine
//! on its own thread.

use std::thread::{self, JoinHandle};

use batch_pipelines::dispatch::{Receiver, bounded};
use batch_pipelines::{
    ContentBasedDispatcherBuilder, CountingProcessor, Engine, EngineBuilder, QueueSource, Record,
    RecordMapper, RecordSource, Report,
};

use crate::config::{JobConfig, RoutingConfig};
use crate::error::JobError;
use crate::fields::{DelimitedMapper, LineFilter, RequiredField};

/// Name of the queue receiving records that match no route.
pub const DEFAULT_ROUTE: &str = "(other)";

/// Result of a job run.
#[derive(Debug)]
pub struct JobOutcome {
    pub report: Report,
    /// Records received per route, in route order, then the default route.
    /// Empty when routing is not configured.
    pub routes: Vec<(String, u64)>,
}

type Fields = Vec<String>;

/// Run `source` through the stages described by `config`.
///
/// A source failure is returned as [`JobError::Engine`]; its report holds
/// the partial accounting.
pub fn run_job<S>(source: S, config: &JobConfig) -> Result<JobOutcome, JobError>
where
    S: RecordSource<Payload = String> + 'static,
{
    let mut builder = Engine::builder(source)
        .name(config.name.clone())
        .filter(LineFilter::new(
            config.keep_blank,
            config.exclude_prefix.clone(),
        ))
        .mapper(DelimitedMapper::new(config.delimiter, config.fields));

    for &index in &config.required {
        builder = builder.validator(RequiredField::new(index));
    }
    if let Some(limit) = config.limit {
        builder = builder.limit(limit);
    }

    match &config.routing {
        None => {
            let report = builder.processor(CountingProcessor::new()).build()?.run()?;
            Ok(JobOutcome {
                report,
                routes: Vec::new(),
            })
        }
        Some(routing) => run_routed(builder, routing),
    }
}

fn run_routed<S, M>(
    builder: EngineBuilder<S, M>,
    routing: &RoutingConfig,
) -> Result<JobOutcome, JobError>
where
    S: RecordSource<Payload = String>,
    M: RecordMapper<String, Output = Fields> + 'static,
{
    let mut dispatch = ContentBasedDispatcherBuilder::new();
    let mut consumers = Vec::with_capacity(routing.routes.len() + 1);

    for value in &routing.routes {
        let (tx, rx) = bounded(routing.queue_capacity);
        consumers.push(spawn_consumer(value.clone(), rx));
        let field = routing.field;
        let expected = value.clone();
        dispatch = dispatch
            .when(move |r: &Record<Fields>| {
                r.payload().get(field).is_some_and(|v| *v == expected)
            })
            .dispatch_to(tx);
    }
    let (tx, rx) = bounded(routing.queue_capacity);
    consumers.push(spawn_consumer(DEFAULT_ROUTE.to_string(), rx));
    let dispatcher = dispatch.otherwise(tx).build()?;

    // The engine owns the dispatcher; it is dropped when the run ends,
    // which closes every queue and lets the consumers finish.
    let result = builder.processor(dispatcher).build().map_err(JobError::from).and_then(
        |engine| engine.run().map_err(JobError::from),
    );

    let mut routes = Vec::with_capacity(consumers.len());
    for (name, handle) in consumers {
        match handle.join() {
            Ok(count) => routes.push((name, count)),
            Err(_) => return Err(JobError::Consumer(name)),
        }
    }

    let report = result?;
    Ok(JobOutcome { report, routes })
}

fn spawn_consumer(name: String, rx: Receiver<Record<Fields>>) -> (String, JoinHandle<u64>) {
    let source = QueueSource::new(name.clone(), rx);
    let thread_name = name.clone();
    let handle = thread::spawn(move || {
        let engine = Engine::builder(source)
            .name(thread_name)
            .processor(CountingProcessor::new())
            .build();
        match engine.map(|e| e.run()) {
            Ok(Ok(report)) => report.success_records(),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "route consumer aborted");
                e.report().success_records()
            }
            Err(e) => {
                tracing::error!(error = %e, "route consumer misconfigured");
                0
            }
        }
    });
    (name, handle)
}
