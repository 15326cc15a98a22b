//! # batch-pipelines
//!
//! A record-at-a-time batch processing engine.
//!
//! An [`Engine`] reads discrete records from a [`RecordSource`], pushes each
//! one through an ordered chain of stages, and accounts for every record in
//! a [`Report`]:
//!
//! - **Filters** exclude records (counted as filtered)
//! - **Mappers** turn a record into a record of another payload type
//!   (unusable records are counted as ignored)
//! - **Validators** reject invalid records (counted as rejected)
//! - **Processor** runs business logic (failures are counted as errors and
//!   handed to the error handler; they never stop the run)
//!
//! A [`ContentBasedDispatcher`] fans records out to bounded destination
//! queues by predicate, either directly or as the engine's processor.
//!
//! ## Example
//!
//! ```
//! use batch_pipelines::{CountingProcessor, Engine, IterSource, MappingError, Record, Status};
//!
//! let lines = vec!["12", "# comment", "x", "30"];
//!
//! let report = Engine::builder(IterSource::new(lines))
//!     .filter(|r: &Record<&str>| r.payload().starts_with('#'))
//!     .mapper(|r: Record<&str>| {
//!         r.try_map(|s| s.parse::<u32>())
//!             .map_err(|e| MappingError::new(e.to_string()))
//!     })
//!     .processor(CountingProcessor::new())
//!     .build()?
//!     .run()?;
//!
//! assert_eq!(report.status(), Status::Finished);
//! assert_eq!(report.filtered_records(), 1);
//! assert_eq!(report.ignored_records(), 1);
//! assert_eq!(report.success_records(), 2);
//! assert_eq!(report.formatted_success_records(), "2 (50.0%)");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builder;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod record;
pub mod report;
pub mod source;
pub mod stage;

pub use builder::EngineBuilder;
pub use dispatch::{
    ContentBasedDispatcher, ContentBasedDispatcherBuilder, Destination, Dispatched, PendingRoute,
    Predicate,
};
pub use engine::{Engine, RecordCallback};
pub use error::{
    BoxError, ConfigError, DispatchError, EngineError, MappingError, SourceError, ValidationError,
};
pub use record::{Header, Record};
pub use report::{NOT_AVAILABLE, RecordOutcome, Report, Status};
pub use source::{IterSource, QueueSource, RecordSource};
pub use stage::{
    Chain, CollectingProcessor, CountingProcessor, ErrorHandler, Identity, LoggingErrorHandler,
    RecordFilter, RecordMapper, RecordProcessor, RecordValidator,
};
pub use tokio_util::sync::CancellationToken;
