//! Stage contracts.
//!
//! Each stage is a single-method capability over one record. The engine
//! holds ordered chains of boxed stages and walks them once per record:
//!
//! - [`RecordFilter`] - asked whether to exclude the record
//! - [`RecordMapper`] - turns a record into a record of another payload type
//! - [`RecordValidator`] - accepts or rejects the mapped record
//! - [`RecordProcessor`] - business processing of a fully prepared record
//! - [`ErrorHandler`] - side-effecting recovery after a processing failure
//!
//! Closures implement every contract, so ad-hoc stages need no new types.

use std::error::Error;
use std::marker::PhantomData;

use crate::error::{BoxError, MappingError, ValidationError};
use crate::record::Record;

/// Decides whether a record leaves the pipeline before mapping.
pub trait RecordFilter<P>: Send {
    /// Return `true` to exclude the record. Exclusion is not an error.
    fn excludes(&mut self, record: &Record<P>) -> bool;

    /// Display name used in log output.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<P, F> RecordFilter<P> for F
where
    F: FnMut(&Record<P>) -> bool + Send,
{
    fn excludes(&mut self, record: &Record<P>) -> bool {
        self(record)
    }
}

/// Transforms a record into a record of (possibly) another payload type.
pub trait RecordMapper<P>: Send {
    type Output;

    /// Map the record, or report it as unusable. Unusable records are
    /// counted as ignored.
    fn map(&mut self, record: Record<P>) -> Result<Record<Self::Output>, MappingError>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<P, Q, F> RecordMapper<P> for F
where
    F: FnMut(Record<P>) -> Result<Record<Q>, MappingError> + Send,
{
    type Output = Q;

    fn map(&mut self, record: Record<P>) -> Result<Record<Q>, MappingError> {
        self(record)
    }
}

/// Checks a mapped record. An invalid record is rejected.
pub trait RecordValidator<P>: Send {
    fn validate(&mut self, record: &Record<P>) -> Result<(), ValidationError>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<P, F> RecordValidator<P> for F
where
    F: FnMut(&Record<P>) -> Result<(), ValidationError> + Send,
{
    fn validate(&mut self, record: &Record<P>) -> Result<(), ValidationError> {
        self(record)
    }
}

/// Business processing of a filtered, mapped and validated record.
pub trait RecordProcessor<P>: Send {
    /// Process the record. A failure is handed to the [`ErrorHandler`]
    /// and counted as an error; it never stops the run.
    fn process(&mut self, record: &Record<P>) -> Result<(), BoxError>;

    /// Final computation result, stored in the report when the run ends.
    fn computation_result(&self) -> Option<String> {
        None
    }

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<P, F> RecordProcessor<P> for F
where
    F: FnMut(&Record<P>) -> Result<(), BoxError> + Send,
{
    fn process(&mut self, record: &Record<P>) -> Result<(), BoxError> {
        self(record)
    }
}

/// Invoked synchronously when a processor fails.
pub trait ErrorHandler<P>: Send {
    fn handle(&mut self, record: &Record<P>, error: &(dyn Error + 'static));
}

impl<P, F> ErrorHandler<P> for F
where
    F: FnMut(&Record<P>, &(dyn Error + 'static)) + Send,
{
    fn handle(&mut self, record: &Record<P>, error: &(dyn Error + 'static)) {
        self(record, error)
    }
}

/// Default error handler: logs at error severity and carries on.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingErrorHandler;

impl<P> ErrorHandler<P> for LoggingErrorHandler {
    fn handle(&mut self, record: &Record<P>, error: &(dyn Error + 'static)) {
        tracing::error!(record = record.number(), error = %error, "error while processing record");
    }
}

/// Counts processed records and reports the count as the computation
/// result.
#[derive(Debug, Default, Clone, Copy)]
pub struct CountingProcessor {
    count: u64,
}

impl CountingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl<P> RecordProcessor<P> for CountingProcessor {
    fn process(&mut self, _record: &Record<P>) -> Result<(), BoxError> {
        self.count += 1;
        Ok(())
    }

    fn computation_result(&self) -> Option<String> {
        Some(self.count.to_string())
    }

    fn name(&self) -> &str {
        "COUNT"
    }
}

/// Collects processed payloads; the result is the collected count.
#[derive(Debug)]
pub struct CollectingProcessor<P> {
    items: Vec<P>,
}

impl<P> Default for CollectingProcessor<P> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<P> CollectingProcessor<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[P] {
        &self.items
    }
}

impl<P: Clone + Send> RecordProcessor<P> for CollectingProcessor<P> {
    fn process(&mut self, record: &Record<P>) -> Result<(), BoxError> {
        self.items.push(record.payload().clone());
        Ok(())
    }

    fn computation_result(&self) -> Option<String> {
        Some(self.items.len().to_string())
    }

    fn name(&self) -> &str {
        "COLLECT"
    }
}

// ---------------------------------------------------------------------------
// Mapper composition
// ---------------------------------------------------------------------------

/// Identity mapper: the start of every mapping chain.
pub struct Identity<P>(PhantomData<fn(P) -> P>);

impl<P> Default for Identity<P> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<P> RecordMapper<P> for Identity<P> {
    type Output = P;

    fn map(&mut self, record: Record<P>) -> Result<Record<P>, MappingError> {
        Ok(record)
    }

    fn name(&self) -> &str {
        "IDENTITY"
    }
}

/// Two mappers run in order; the first failure short-circuits.
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A, B> Chain<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<P, A, B> RecordMapper<P> for Chain<A, B>
where
    A: RecordMapper<P>,
    B: RecordMapper<A::Output>,
{
    type Output = B::Output;

    fn map(&mut self, record: Record<P>) -> Result<Record<B::Output>, MappingError> {
        let record = self.first.map(record)?;
        self.second.map(record)
    }

    fn name(&self) -> &str {
        self.second.name()
    }
}
