//! I/O helpers for dispatch hooks and operator commands.

pub mod atomic;
pub mod block_counter;
pub mod clock;
pub mod commands;
pub mod config;
pub mod gate_counter;
pub mod git;
pub mod hook_input;
pub mod lock;
pub mod paths;
pub mod process;
pub mod state_store;
pub mod task_list;
pub mod team;
pub mod workspace;
