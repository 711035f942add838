//! Coordination layer for partitioned multi-agent dispatches.
//!
//! A lead process and several workers execute one run ("dispatch") against a
//! shared state record on disk. This crate decides, at each hook point of
//! the host, whether the lead may stop, whether a new session may take over
//! coordination, whether a worker may write a file, and whether a completed
//! unit passes the quality gate. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (run resolution, stop and
//!   reclaim policies, ownership checks, gate planning, task lists).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (State Store, counters, team
//!   registry, config, processes, git). Isolated behind small types and
//!   traits to enable fakes in tests.
//!
//! Orchestration modules ([`stop`], [`reclaim`], [`file_guard`],
//! [`quality_gate`], [`validate`], [`mark`], [`provenance`], [`lint`],
//! [`abort`]) coordinate core logic with I/O to implement CLI commands.

pub mod abort;
pub mod core;
pub mod exit_codes;
pub mod file_guard;
pub mod io;
pub mod lint;
pub mod logging;
pub mod mark;
pub mod provenance;
pub mod quality_gate;
pub mod reclaim;
pub mod state;
pub mod stop;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
