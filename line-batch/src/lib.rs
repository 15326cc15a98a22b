//! Line-oriented batch jobs on top of `batch-pipelines`.
//!
//! This crate provides the adapters the engine needs to run against text:
//! a line source over strings and files, stages for delimited fields, a
//! TOML job configuration, and the job runner behind the `batch-run` CLI.

pub mod config;
pub mod error;
pub mod fields;
pub mod job;
pub mod lines;

pub use config::{JobConfig, RoutingConfig};
pub use error::JobError;
pub use fields::{DelimitedMapper, LineFilter, RequiredField};
pub use job::{DEFAULT_ROUTE, JobOutcome, run_job};
pub use lines::LineSource;
