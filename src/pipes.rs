//! Pipe-pair construction.
//!
//! Each pair has an asynchronous parent-facing end and a blocking,
//! close-on-exec child-facing end suitable for handing across the spawn
//! boundary. The spawn plan duplicates the child-facing end into one of the
//! standard descriptor slots; the duplicate is the only copy that survives
//! the exec.

use std::os::fd::OwnedFd;

use tokio::net::unix::pipe;

use crate::error::SpawnError;

/// Creates a pipe for capturing one of the child's output streams.
/// Returns the parent's read end and the child's write end.
pub(crate) fn output_pair() -> Result<(pipe::Receiver, OwnedFd), SpawnError> {
    let (tx, rx) = pipe::pipe().map_err(SpawnError::syscall("pipe"))?;
    let child_end = tx.into_blocking_fd().map_err(SpawnError::syscall("fcntl"))?;
    Ok((rx, child_end))
}

/// Creates a pipe for feeding the child's standard input.
/// Returns the parent's write end and the child's read end.
pub(crate) fn input_pair() -> Result<(pipe::Sender, OwnedFd), SpawnError> {
    let (tx, rx) = pipe::pipe().map_err(SpawnError::syscall("pipe"))?;
    let child_end = rx.into_blocking_fd().map_err(SpawnError::syscall("fcntl"))?;
    Ok((tx, child_end))
}
