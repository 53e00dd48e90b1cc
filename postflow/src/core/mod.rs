//! Deterministic, pure logic shared by the post pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod gate;
pub mod naming;
pub mod parse;
pub mod platform;
pub mod schedule;
pub mod types;
pub mod verdict;
