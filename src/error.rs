//! Error types for the process engine.

use std::fmt::Display;

/// Identifies one of a child's output streams.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StreamType {
    /// The child's standard output stream.
    Stdout,
    /// The child's standard error stream.
    Stderr,
}

impl Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// An error that prevented a child process from being launched.
///
/// No partial handle exists once one of these is returned; every descriptor
/// allocated on the way to the failure has already been closed.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The program could not be resolved to an executable regular file.
    #[error("command not found: {0}")]
    CommandNotFound(String),

    /// A system call failed while preparing or performing the spawn.
    #[error("{step} failed: {source}")]
    Syscall {
        /// The name of the failing operation.
        step: &'static str,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

impl SpawnError {
    /// Returns a conversion from an I/O error into a [`SpawnError`] naming
    /// the failing step; usable with `map_err`.
    pub(crate) fn syscall(step: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::Syscall { step, source }
    }

    /// The raw OS error code behind this error, if there is one.
    pub fn os_error(&self) -> Option<i32> {
        match self {
            Self::CommandNotFound(_) => None,
            Self::Syscall { source, .. } => source.raw_os_error(),
        }
    }
}

/// An error that occurred after a child was successfully launched, while
/// feeding it input, draining its output, or waiting for it to exit.
///
/// A non-zero exit is not a `RunError`; it is reported as ordinary data in
/// [`Output`](crate::Output).
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    /// Waiting for the child to exit failed.
    #[error("failed while waiting for child: {0}")]
    Wait(#[source] std::io::Error),

    /// Reading one of the child's output streams failed.
    #[error("failed reading child {stream}: {source}")]
    Read {
        /// Which stream was being drained.
        stream: StreamType,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Writing the child's standard input failed.
    #[error("failed feeding child stdin: {0}")]
    Feed(#[source] std::io::Error),

    /// A drain or feeder task could not be joined.
    #[error("threading error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Umbrella error for the convenience entry points that combine launching
/// a child with collecting its result.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The child could not be launched.
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    /// The child was launched but its result could not be collected.
    #[error(transparent)]
    Run(#[from] RunError),

    /// The child ran to completion but exited unsuccessfully. Only produced
    /// by [`Launcher::run_checked`](crate::Launcher::run_checked); carries
    /// the full output for diagnostics.
    #[error("command exited with status {}", .0.exit_code())]
    ExitFailure(crate::Output),
}
