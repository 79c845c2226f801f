//! Parallel FTGS execution.
//!
//! A run computes, for every configured field and every term of the field,
//! per-group sums of the stat columns of the documents containing the term,
//! and streams the results over one output stream per (field, split).
//!
//! - [`config`]: run configuration and the validated run context.
//! - [`runner`]: dispatch of one task per (field, split) on the worker pool.
//! - [`accumulator`]: per-term group statistics.
//! - [`remote_output`]: the buffered output stream writer.
//! - [`host`]: adapters for resources handed over by a host process.

pub mod accumulator;
pub mod config;
pub mod host;
pub mod remote_output;
pub mod runner;

pub use config::{FtgsConfig, RunContext};
pub use runner::FtgsRunner;

#[cfg(test)]
mod tests;
