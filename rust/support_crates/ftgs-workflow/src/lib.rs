//! Worker pool used to run the independent (field, split) tasks of an FTGS
//! run.

pub mod executor;

pub use executor::{ExecutorService, catch_panic};
