//! Deterministic, pure logic shared by the pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod language;
pub mod normalize;
pub mod path;
pub mod profile;
pub mod scaffold;
pub mod state;
pub mod transitions;
pub mod types;
