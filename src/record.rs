//! Record and header types.
//!
//! A record is the unit of work flowing through an engine run. The header
//! carries positional and temporal metadata assigned by the source when the
//! record is read; the payload is opaque to the engine and only passed
//! through stage contracts.

use chrono::{DateTime, Local};

/// Positional and temporal metadata of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    number: u64,
    created_at: DateTime<Local>,
}

impl Header {
    /// Create a header stamped with the current time.
    ///
    /// `number` is the 1-based sequence number within the source.
    pub fn new(number: u64) -> Self {
        Self::with_timestamp(number, Local::now())
    }

    pub fn with_timestamp(number: u64, created_at: DateTime<Local>) -> Self {
        Self { number, created_at }
    }

    /// 1-based sequence number assigned at read time.
    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }
}

/// A header paired with an opaque payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<P> {
    header: Header,
    payload: P,
}

impl<P> Record<P> {
    pub fn new(header: Header, payload: P) -> Self {
        Self { header, payload }
    }

    /// Create a record numbered `number`, stamped with the current time.
    pub fn numbered(number: u64, payload: P) -> Self {
        Self::new(Header::new(number), payload)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Shorthand for `header().number()`.
    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }

    pub fn into_parts(self) -> (Header, P) {
        (self.header, self.payload)
    }

    /// Replace the payload, keeping the header.
    ///
    /// This is how mappers produce a record of a new payload type while
    /// preserving the sequence number and timestamp of the original.
    pub fn map<Q>(self, f: impl FnOnce(P) -> Q) -> Record<Q> {
        Record {
            header: self.header,
            payload: f(self.payload),
        }
    }

    /// Fallible variant of [`Record::map`].
    pub fn try_map<Q, E>(self, f: impl FnOnce(P) -> Result<Q, E>) -> Result<Record<Q>, E> {
        Ok(Record {
            header: self.header,
            payload: f(self.payload)?,
        })
    }
}
