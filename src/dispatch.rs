//! Content-based record dispatcher.
//!
//! Routes each record to the destination queue of the first predicate that
//! accepts it, in registration order. A record matching no predicate goes to
//! the default destination when one is registered, and is dropped otherwise.
//!
//! The routing table is assembled with a two-phase fluent builder:
//!
//! ```
//! use batch_pipelines::{ContentBasedDispatcherBuilder, Dispatched, Record, dispatch::bounded};
//!
//! let (big_tx, big_rx) = bounded::<u32>(8);
//! let (rest_tx, rest_rx) = bounded::<u32>(8);
//!
//! let dispatcher = ContentBasedDispatcherBuilder::new()
//!     .when(|r: &Record<u32>| *r.payload() >= 100)
//!     .dispatch_to(big_tx)
//!     .otherwise(rest_tx)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(dispatcher.dispatch(Record::numbered(1, 250)).unwrap(), Dispatched::Route(0));
//! assert_eq!(dispatcher.dispatch(Record::numbered(2, 7)).unwrap(), Dispatched::Default);
//! assert_eq!(big_rx.len(), 1);
//! assert_eq!(rest_rx.len(), 1);
//! ```
//!
//! `when` yields a [`PendingRoute`], the only type with `dispatch_to`, so a
//! destination without a preceding predicate does not compile:
//!
//! ```compile_fail
//! use batch_pipelines::{ContentBasedDispatcherBuilder, dispatch::bounded};
//!
//! let (tx, _rx) = bounded::<u32>(8);
//! let _ = ContentBasedDispatcherBuilder::new().dispatch_to(tx);
//! ```
//!
//! Destination queues are bounded; a full queue blocks the dispatching
//! thread until a consumer takes a record. This is the only backpressure
//! mechanism between the engine and its consumers.

pub use crossbeam_channel::{Receiver, Sender};

use crate::error::{BoxError, ConfigError, DispatchError};
use crate::record::Record;
use crate::stage::RecordProcessor;

/// Create a bounded destination queue.
///
/// The sender goes to the dispatcher; the receiver can be cloned and
/// drained by any number of consumer threads.
pub fn bounded<P>(capacity: usize) -> (Sender<Record<P>>, Receiver<Record<P>>) {
    crossbeam_channel::bounded(capacity)
}

/// Routing condition evaluated against a record.
pub trait Predicate<P>: Send {
    fn matches(&self, record: &Record<P>) -> bool;
}

impl<P, F> Predicate<P> for F
where
    F: Fn(&Record<P>) -> bool + Send,
{
    fn matches(&self, record: &Record<P>) -> bool {
        self(record)
    }
}

/// Bounded blocking queue accepting dispatched records.
pub trait Destination<P>: Send {
    /// Enqueue the record, blocking while the queue is full. Hands the
    /// record back if no receiver is left.
    fn put(&self, record: Record<P>) -> Result<(), Record<P>>;
}

impl<P: Send> Destination<P> for Sender<Record<P>> {
    fn put(&self, record: Record<P>) -> Result<(), Record<P>> {
        self.send(record).map_err(|e| e.into_inner())
    }
}

impl<P: Send> Destination<P> for std::sync::mpsc::SyncSender<Record<P>> {
    fn put(&self, record: Record<P>) -> Result<(), Record<P>> {
        self.send(record).map_err(|e| e.0)
    }
}

/// Where a record was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// Index of the matching route, in registration order.
    Route(usize),
    Default,
    /// No predicate matched and no default is registered.
    Dropped,
}

struct Route<P> {
    predicate: Box<dyn Predicate<P>>,
    destination: Box<dyn Destination<P>>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Fluent builder for [`ContentBasedDispatcher`].
pub struct ContentBasedDispatcherBuilder<P> {
    routes: Vec<Route<P>>,
    default: Option<Box<dyn Destination<P>>>,
    defaults_registered: usize,
}

impl<P> Default for ContentBasedDispatcherBuilder<P> {
    fn default() -> Self {
        Self {
            routes: Vec::new(),
            default: None,
            defaults_registered: 0,
        }
    }
}

impl<P: 'static> ContentBasedDispatcherBuilder<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a route. The predicate is pending until
    /// [`PendingRoute::dispatch_to`] binds it to a destination.
    pub fn when(self, predicate: impl Predicate<P> + 'static) -> PendingRoute<P> {
        PendingRoute {
            builder: self,
            predicate: Box::new(predicate),
        }
    }

    /// Catch-all destination for records matching no predicate.
    ///
    /// At most one default may be registered; a second call makes
    /// [`build`](Self::build) fail.
    pub fn otherwise(mut self, destination: impl Destination<P> + 'static) -> Self {
        self.default = Some(Box::new(destination));
        self.defaults_registered += 1;
        self
    }

    pub fn build(self) -> Result<ContentBasedDispatcher<P>, ConfigError> {
        if self.defaults_registered > 1 {
            return Err(ConfigError::DuplicateDefault);
        }
        if self.routes.is_empty() && self.default.is_none() {
            return Err(ConfigError::EmptyDispatchMapping);
        }
        Ok(ContentBasedDispatcher {
            routes: self.routes,
            default: self.default,
        })
    }
}

/// A predicate waiting for its destination.
pub struct PendingRoute<P> {
    builder: ContentBasedDispatcherBuilder<P>,
    predicate: Box<dyn Predicate<P>>,
}

impl<P: 'static> PendingRoute<P> {
    pub fn dispatch_to(
        self,
        destination: impl Destination<P> + 'static,
    ) -> ContentBasedDispatcherBuilder<P> {
        let mut builder = self.builder;
        builder.routes.push(Route {
            predicate: self.predicate,
            destination: Box::new(destination),
        });
        builder
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Routes records to destination queues by content.
pub struct ContentBasedDispatcher<P> {
    routes: Vec<Route<P>>,
    default: Option<Box<dyn Destination<P>>>,
}

impl<P> ContentBasedDispatcher<P> {
    /// Number of predicate routes, excluding the default.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Forward the record to the first matching destination.
    ///
    /// Blocks while that destination is full.
    pub fn dispatch(&self, record: Record<P>) -> Result<Dispatched, DispatchError<P>> {
        if let Some(index) = self.routes.iter().position(|r| r.predicate.matches(&record)) {
            return self.routes[index]
                .destination
                .put(record)
                .map(|()| Dispatched::Route(index))
                .map_err(|record| DispatchError {
                    destination: format!("route {index}"),
                    record,
                });
        }

        match &self.default {
            Some(destination) => destination
                .put(record)
                .map(|()| Dispatched::Default)
                .map_err(|record| DispatchError {
                    destination: "default".to_string(),
                    record,
                }),
            None => {
                tracing::warn!(
                    record = record.number(),
                    "no route matched and no default destination, dropping record"
                );
                Ok(Dispatched::Dropped)
            }
        }
    }

    /// Drop every destination sender.
    ///
    /// Consumers draining the queues see the end of the stream once the
    /// queued records are taken.
    pub fn close(self) {
        tracing::debug!(
            routes = self.routes.len(),
            default = self.default.is_some(),
            "closing dispatcher"
        );
    }
}

/// The dispatcher as the engine's processor: each record is cloned into its
/// destination. A disconnected destination is a processing error.
impl<P: Clone + Send> RecordProcessor<P> for ContentBasedDispatcher<P> {
    fn process(&mut self, record: &Record<P>) -> Result<(), BoxError> {
        self.dispatch(record.clone())
            .map(|_| ())
            .map_err(|e| e.to_string().into())
    }

    fn name(&self) -> &str {
        "DISPATCH"
    }
}
