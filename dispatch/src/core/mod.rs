//! Deterministic, pure logic shared by the coordination hooks.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod gate;
pub mod invariants;
pub mod ownership;
pub mod provenance;
pub mod reclaim_policy;
pub mod resolve;
pub mod stop_policy;
pub mod task_lint;
pub mod tasks;
pub mod types;
