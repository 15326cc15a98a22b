//! Error taxonomy.
//!
//! Only configuration errors (raised by builders) and source errors
//! (raised by [`Engine::run`](crate::Engine::run)) escape the engine.
//! Record-level signals ([`MappingError`], [`ValidationError`] and
//! processing failures) are absorbed into the [`Report`].

use crate::record::Record;
use crate::report::Report;

/// Boxed error raised by business code (processors, foreign sources).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Invalid builder usage, detected before any record is processed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot build a content-based dispatcher with an empty predicate/destination mapping")]
    EmptyDispatchMapping,

    #[error("a default destination is already registered; call otherwise() at most once")]
    DuplicateDefault,

    #[error("engine [{0}]: no record processor configured")]
    MissingProcessor(String),

    #[error("engine [{engine}]: mapper registered after the {stage}; mappers must precede validators, processor and error handler")]
    MapperOutOfOrder { engine: String, stage: &'static str },

    #[error("engine [{0}]: record limit must be greater than zero")]
    ZeroLimit(String),
}

/// Failure of the record source. Fatal to a run.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed input at record {number}: {detail}")]
    Malformed { number: u64, detail: String },

    #[error("{0}")]
    Other(BoxError),
}

impl SourceError {
    pub fn other(error: impl Into<BoxError>) -> Self {
        SourceError::Other(error.into())
    }
}

/// Error returned by [`Engine::run`](crate::Engine::run).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The source failed to open, or failed while reading. The boxed report
    /// has status `Aborted` and holds the counters accumulated so far.
    #[error("engine [{engine}] aborted: {error}")]
    Source {
        engine: String,
        report: Box<Report>,
        #[source]
        error: SourceError,
    },
}

impl EngineError {
    /// The partial report of the aborted run.
    pub fn report(&self) -> &Report {
        match self {
            EngineError::Source { report, .. } => report,
        }
    }

    pub fn into_report(self) -> Report {
        match self {
            EngineError::Source { report, .. } => *report,
        }
    }
}

/// A mapper could not produce a usable record. The record is ignored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct MappingError {
    reason: String,
}

impl MappingError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// A validator found the record invalid. The record is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct ValidationError {
    reason: String,
}

impl ValidationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// A destination queue could not accept a record because every receiver
/// was dropped. The undelivered record is handed back.
#[derive(thiserror::Error)]
#[error("destination {destination} disconnected; record {} not delivered", .record.number())]
pub struct DispatchError<P> {
    pub destination: String,
    pub record: Record<P>,
}

impl<P> std::fmt::Debug for DispatchError<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchError")
            .field("destination", &self.destination)
            .field("record", &self.record.number())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::MissingProcessor("orders".to_string());
        assert_eq!(err.to_string(), "engine [orders]: no record processor configured");

        let err = ConfigError::MapperOutOfOrder {
            engine: "orders".to_string(),
            stage: "validator",
        };
        assert!(err.to_string().contains("after the validator"));
    }

    #[test]
    fn test_source_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated");
        let err: SourceError = io.into();
        assert_eq!(err.to_string(), "io: truncated");
    }

    #[test]
    fn test_dispatch_error_message() {
        let err = DispatchError {
            destination: "route 0".to_string(),
            record: Record::numbered(4, ()),
        };
        assert_eq!(
            err.to_string(),
            "destination route 0 disconnected; record 4 not delivered"
        );
    }
}
