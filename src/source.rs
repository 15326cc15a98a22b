//! Record sources.
//!
//! A source produces records one at a time until it signals the end of the
//! stream. The engine opens it before the first read and closes it on every
//! exit path of a run, including the abort path.

use std::collections::VecDeque;

use crossbeam_channel::Receiver;

use crate::error::SourceError;
use crate::record::{Header, Record};

/// Producer of records for an engine run.
pub trait RecordSource: Send {
    type Payload;

    /// Acquire resources. Called once before the first read.
    fn open(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Non-destructive lookahead: is another record available?
    fn has_next(&mut self) -> bool;

    /// Read the next record. Fails on source malfunction.
    fn read_next(&mut self) -> Result<Record<Self::Payload>, SourceError>;

    /// Total number of records, when knowable.
    fn total_count(&self) -> Option<u64> {
        None
    }

    /// Human-readable description, carried into the report.
    fn description(&self) -> String;

    /// Release resources. Called once when the run ends.
    fn close(&mut self) -> Result<(), SourceError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory source
// ---------------------------------------------------------------------------

/// Source over any iterator, numbering items from 1.
///
/// The total count is known when the iterator's size hint is exact.
pub struct IterSource<I: Iterator> {
    items: std::iter::Peekable<I>,
    total: Option<u64>,
    number: u64,
}

impl<I: Iterator> IterSource<I> {
    pub fn new(items: impl IntoIterator<IntoIter = I>) -> Self {
        let items = items.into_iter();
        let total = match items.size_hint() {
            (lower, Some(upper)) if lower == upper => Some(upper as u64),
            _ => None,
        };
        Self {
            items: items.peekable(),
            total,
            number: 0,
        }
    }
}

impl<I> RecordSource for IterSource<I>
where
    I: Iterator + Send,
    I::Item: Send,
{
    type Payload = I::Item;

    fn has_next(&mut self) -> bool {
        self.items.peek().is_some()
    }

    fn read_next(&mut self) -> Result<Record<I::Item>, SourceError> {
        let number = self.number + 1;
        match self.items.next() {
            Some(item) => {
                self.number = number;
                Ok(Record::numbered(number, item))
            }
            None => Err(SourceError::Malformed {
                number,
                detail: "read past the end of the in-memory source".to_string(),
            }),
        }
    }

    fn total_count(&self) -> Option<u64> {
        self.total
    }

    fn description(&self) -> String {
        "In-Memory".to_string()
    }
}

// ---------------------------------------------------------------------------
// Queue source
// ---------------------------------------------------------------------------

/// Source draining a destination queue filled by a dispatcher.
///
/// Each received record is renumbered in arrival order. The stream ends once
/// every sender of the queue has been dropped and the queue is empty.
pub struct QueueSource<P> {
    receiver: Receiver<Record<P>>,
    name: String,
    buffered: VecDeque<Record<P>>,
    number: u64,
}

impl<P> QueueSource<P> {
    pub fn new(name: impl Into<String>, receiver: Receiver<Record<P>>) -> Self {
        Self {
            receiver,
            name: name.into(),
            buffered: VecDeque::with_capacity(1),
            number: 0,
        }
    }
}

impl<P: Send> RecordSource for QueueSource<P> {
    type Payload = P;

    /// Blocks until a record arrives or the queue disconnects.
    fn has_next(&mut self) -> bool {
        if !self.buffered.is_empty() {
            return true;
        }
        match self.receiver.recv() {
            Ok(record) => {
                self.buffered.push_back(record);
                true
            }
            Err(_) => false,
        }
    }

    fn read_next(&mut self) -> Result<Record<P>, SourceError> {
        let record = match self.buffered.pop_front() {
            Some(record) => record,
            None => self.receiver.recv().map_err(|_| SourceError::Malformed {
                number: self.number + 1,
                detail: format!("queue {} disconnected", self.name),
            })?,
        };
        self.number += 1;
        let created_at = record.header().created_at();
        Ok(Record::new(
            Header::with_timestamp(self.number, created_at),
            record.into_payload(),
        ))
    }

    fn description(&self) -> String {
        format!("Queue: {}", self.name)
    }
}
