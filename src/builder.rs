//! Engine assembly.
//!
//! The builder wires a source, an ordered stage chain and an error handler
//! into an [`Engine`]. Stages are registered in pipeline order: filters see
//! the source payload, each mapper changes the payload type seen by later
//! stages, and validators, the processor and the error handler see the
//! final mapped type. Wiring problems are collected while building and
//! surfaced by [`EngineBuilder::build`] as a [`ConfigError`].

use tokio_util::sync::CancellationToken;

use crate::engine::{Engine, RecordCallback};
use crate::error::ConfigError;
use crate::report::Report;
use crate::source::RecordSource;
use crate::stage::{
    Chain, ErrorHandler, Identity, LoggingErrorHandler, RecordFilter, RecordMapper,
    RecordProcessor, RecordValidator,
};

const DEFAULT_ENGINE_NAME: &str = "engine";

/// Fluent builder for [`Engine`].
///
/// `M` is the mapping chain accumulated so far; it starts as the identity.
pub struct EngineBuilder<S, M>
where
    S: RecordSource,
    M: RecordMapper<S::Payload>,
{
    name: String,
    source: S,
    filters: Vec<Box<dyn RecordFilter<S::Payload>>>,
    mapper: M,
    validators: Vec<Box<dyn RecordValidator<M::Output>>>,
    processor: Option<Box<dyn RecordProcessor<M::Output>>>,
    error_handler: Option<Box<dyn ErrorHandler<M::Output>>>,
    limit: Option<u64>,
    cancellation: Option<CancellationToken>,
    on_record: Option<RecordCallback>,
    misuse: Option<ConfigError>,
}

impl<S: RecordSource> EngineBuilder<S, Identity<S::Payload>> {
    pub fn new(source: S) -> Self {
        Self {
            name: DEFAULT_ENGINE_NAME.to_string(),
            source,
            filters: Vec::new(),
            mapper: Identity::default(),
            validators: Vec::new(),
            processor: None,
            error_handler: None,
            limit: None,
            cancellation: None,
            on_record: None,
            misuse: None,
        }
    }
}

impl<S, M> EngineBuilder<S, M>
where
    S: RecordSource,
    M: RecordMapper<S::Payload> + 'static,
{
    /// Name used in log output and error messages.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append a filter. Filters run in registration order; the first one
    /// excluding a record ends its journey.
    pub fn filter(mut self, filter: impl RecordFilter<S::Payload> + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Append a mapper to the mapping chain.
    ///
    /// Mappers must be registered before any validator, processor or error
    /// handler, since those are typed by the final payload. Registering one
    /// afterwards discards them and makes [`build`](Self::build) fail.
    pub fn mapper<N>(self, mapper: N) -> EngineBuilder<S, Chain<M, N>>
    where
        N: RecordMapper<M::Output> + 'static,
    {
        let misuse = self.misuse.or_else(|| {
            let stage = if !self.validators.is_empty() {
                Some("validator")
            } else if self.processor.is_some() {
                Some("processor")
            } else if self.error_handler.is_some() {
                Some("error handler")
            } else {
                None
            };
            stage.map(|stage| ConfigError::MapperOutOfOrder {
                engine: self.name.clone(),
                stage,
            })
        });

        EngineBuilder {
            name: self.name,
            source: self.source,
            filters: self.filters,
            mapper: Chain::new(self.mapper, mapper),
            validators: Vec::new(),
            processor: None,
            error_handler: None,
            limit: self.limit,
            cancellation: self.cancellation,
            on_record: self.on_record,
            misuse,
        }
    }

    /// Append a validator. Validators run in registration order after
    /// mapping; the first rejection ends the record's journey.
    pub fn validator(mut self, validator: impl RecordValidator<M::Output> + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Set the business processor. Required.
    pub fn processor(mut self, processor: impl RecordProcessor<M::Output> + 'static) -> Self {
        self.processor = Some(Box::new(processor));
        self
    }

    /// Set the processing error handler. Defaults to
    /// [`LoggingErrorHandler`].
    pub fn error_handler(mut self, handler: impl ErrorHandler<M::Output> + 'static) -> Self {
        self.error_handler = Some(Box::new(handler));
        self
    }

    /// Stop after reading `limit` records.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Token examined before every read; once cancelled, the run stops with
    /// status `Aborted`.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Callback receiving the in-progress report after every record.
    pub fn on_record(mut self, callback: impl FnMut(&Report) + Send + 'static) -> Self {
        self.on_record = Some(Box::new(callback));
        self
    }

    pub fn build(self) -> Result<Engine<S, M::Output>, ConfigError> {
        if let Some(misuse) = self.misuse {
            return Err(misuse);
        }
        if self.limit == Some(0) {
            return Err(ConfigError::ZeroLimit(self.name));
        }
        let Some(processor) = self.processor else {
            return Err(ConfigError::MissingProcessor(self.name));
        };
        let error_handler = self
            .error_handler
            .unwrap_or_else(|| Box::new(LoggingErrorHandler));

        Ok(Engine {
            name: self.name,
            source: self.source,
            filters: self.filters,
            mapper: Box::new(self.mapper),
            validators: self.validators,
            processor,
            error_handler,
            limit: self.limit,
            cancellation: self.cancellation,
            on_record: self.on_record,
        })
    }
}
