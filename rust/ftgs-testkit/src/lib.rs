//! Test utilities for the ftgs crates.
//!
//! This crate provides:
//! - Synthetic shard directories with int and string field files
//! - Random term and posting list generation
//!
//! It is intended for use within the ftgs test suites only.

pub mod data_gen;
pub mod shard_dir;
