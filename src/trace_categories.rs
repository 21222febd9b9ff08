//! Trace utilities

/// Trace category for launching child processes.
pub const SPAWN: &str = "spawn";
/// Trace category for stream draining and feeding.
pub const IO: &str = "io";
/// Trace category for waiting on child exit.
pub const WAIT: &str = "wait";
