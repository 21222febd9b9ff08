//! Async child-process execution engine.
//!
//! Given a program, arguments, environment, working directory, and an
//! optional input source, this crate starts the program as a subprocess
//! with pipes wired to its standard streams, drains its output concurrently
//! with waiting for it to exit, and returns one aggregated [`Output`]
//! (exit code, captured stdout bytes, captured stderr text) or a structured
//! failure.
//!
//! Draining both output streams concurrently with the exit wait is a
//! correctness requirement, not an optimization: reading the streams one
//! after the other deadlocks as soon as the child fills the kernel buffer
//! of the pipe the parent is not currently reading.
//!
//! ```no_run
//! # async fn demo() -> Result<(), subproc::Error> {
//! let output = subproc::Launcher::new("cat")
//!     .stdin(subproc::StdinSource::text("hello\n"))
//!     .run()
//!     .await?;
//! assert_eq!(output.stdout(), b"hello\n");
//! # Ok(())
//! # }
//! ```
//!
//! Unix only. No shell interpretation occurs; the caller supplies the
//! program name and the argument vector directly.

mod commands;
mod error;
mod pathsearch;
mod pipes;
mod processes;
mod spawnplan;
mod stdin;
mod trace_categories;

pub use error::{Error, RunError, SpawnError, StreamType};
pub use pathsearch::search_for_executable;
pub use processes::{Launcher, Output, ProcessHandle};
pub use stdin::StdinSource;
