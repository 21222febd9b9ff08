//! Launching child processes and aggregating their results.

use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::ExitStatus;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::pipe;
use tokio::task::JoinHandle;

use crate::error::{Error, RunError, SpawnError, StreamType};
use crate::stdin::{FeedPayload, ResolvedStdin, StdinSource};
use crate::{commands, pathsearch, pipes, spawnplan, trace_categories};

/// Describes a child process to launch: program, arguments, input source,
/// environment overrides, working directory, and output capture.
///
/// Capture is on by default. The program is resolved through the `PATH`
/// search collaborator unless it contains a path separator.
///
/// ```no_run
/// # async fn demo() -> Result<(), subproc::Error> {
/// let output = subproc::Launcher::new("sort")
///     .arg("-r")
///     .stdin(subproc::StdinSource::text("b\na\nc\n"))
///     .run()
///     .await?;
/// assert_eq!(output.stdout(), b"c\nb\na\n");
/// # Ok(())
/// # }
/// ```
pub struct Launcher {
    program: String,
    args: Vec<String>,
    stdin: StdinSource,
    env_overrides: Vec<(String, String)>,
    working_dir: Option<PathBuf>,
    capture_output: bool,
}

impl Launcher {
    /// Starts describing a launch of the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: StdinSource::Inherit,
            env_overrides: Vec::new(),
            working_dir: None,
            capture_output: true,
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment override for the child. Overrides are merged
    /// over the inherited environment and win on key collision.
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_overrides.push((name.into(), value.into()));
        self
    }

    /// Sets environment overrides for the child. Overrides are merged
    /// over the inherited environment and win on key collision.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_overrides
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sets the child's standard input source.
    pub fn stdin(mut self, source: StdinSource) -> Self {
        self.stdin = source;
        self
    }

    /// Sets the working directory the child starts in. A directory that
    /// cannot be entered makes the launch fail with a [`SpawnError`].
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Controls whether the child's stdout and stderr are captured. With
    /// capture off the child inherits the parent's output streams and the
    /// result's captured output is empty.
    pub fn capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    /// Launches the child and starts its drain and feeder tasks.
    ///
    /// On failure, every descriptor allocated along the way has been closed
    /// and no handle exists. Must be called within a tokio runtime.
    pub async fn launch(self) -> Result<ProcessHandle, SpawnError> {
        let resolved_path = pathsearch::resolve_program(&self.program)?;
        let resolved_stdin = self.stdin.resolve()?;

        let mut plan = spawnplan::SpawnPlan::default();

        let mut stdout_pipe = None;
        let mut stderr_pipe = None;
        if self.capture_output {
            let (parent_end, child_end) = pipes::output_pair()?;
            plan.redirect(spawnplan::moved_above_stdio(child_end)?, 1);
            stdout_pipe = Some(parent_end);

            let (parent_end, child_end) = pipes::output_pair()?;
            plan.redirect(spawnplan::moved_above_stdio(child_end)?, 2);
            stderr_pipe = Some(parent_end);
        }

        let mut feeder_input = None;
        match resolved_stdin {
            ResolvedStdin::Inherit => (),
            ResolvedStdin::ChildFd(fd) => {
                plan.redirect(spawnplan::moved_above_stdio(fd)?, 0);
            }
            ResolvedStdin::Feed {
                child_end,
                parent_end,
                payload,
            } => {
                plan.redirect(spawnplan::moved_above_stdio(child_end)?, 0);
                feeder_input = Some((parent_end, payload));
            }
        }

        if let Some(dir) = &self.working_dir {
            plan.chdir(dir)?;
        }

        let command = commands::compose_std_command(
            &resolved_path,
            &self.program,
            &self.args,
            &self.env_overrides,
            plan,
        );

        tracing::debug!(
            target: trace_categories::SPAWN,
            program = %resolved_path.display(),
            "spawning child"
        );

        // The command owns the plan; dropping it here (on success and
        // failure alike) closes the child-facing pipe ends in the parent.
        let child = commands::spawn(command).map_err(SpawnError::syscall("spawn"))?;

        let pid = child.id().and_then(|id| i32::try_from(id).ok());
        tracing::debug!(target: trace_categories::SPAWN, pid, "child spawned");

        Ok(ProcessHandle::new(
            pid,
            child,
            stdout_pipe,
            stderr_pipe,
            feeder_input,
        ))
    }

    /// Launches the child and collects its result.
    pub async fn run(self) -> Result<Output, Error> {
        let mut handle = self.launch().await?;
        Ok(handle.output().await?)
    }

    /// Like [`run`](Self::run), but additionally promotes a non-zero exit
    /// to [`Error::ExitFailure`] carrying the captured output.
    pub async fn run_checked(self) -> Result<Output, Error> {
        let output = self.run().await?;
        if output.success() {
            Ok(output)
        } else {
            Err(Error::ExitFailure(output))
        }
    }
}

/// Result-aggregation states of a [`ProcessHandle`].
#[derive(Debug, Eq, PartialEq)]
enum HandleState {
    Launched,
    ResultPending,
    Completed,
}

/// A launched child process and its in-flight drain and feeder tasks.
///
/// Exactly one handle exists per spawned child. The drain and feeder tasks
/// run from the moment of the launch; [`output`](Self::output) joins them
/// with the exit wait and may be called at most once.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Option<i32>,
    child: tokio::process::Child,
    stdout_drain: Option<JoinHandle<Result<Vec<u8>, std::io::Error>>>,
    stderr_drain: Option<JoinHandle<Result<Vec<u8>, std::io::Error>>>,
    feeder: Option<JoinHandle<Result<(), std::io::Error>>>,
    state: HandleState,
}

impl ProcessHandle {
    fn new(
        pid: Option<i32>,
        child: tokio::process::Child,
        stdout_pipe: Option<pipe::Receiver>,
        stderr_pipe: Option<pipe::Receiver>,
        feeder_input: Option<(pipe::Sender, FeedPayload)>,
    ) -> Self {
        // Each task exclusively owns its descriptor; nothing is shared and
        // nothing below is serialized with anything else until the final
        // join in `output`.
        let stdout_drain = stdout_pipe.map(|r| tokio::spawn(drain(r, StreamType::Stdout)));
        let stderr_drain = stderr_pipe.map(|r| tokio::spawn(drain(r, StreamType::Stderr)));
        let feeder = feeder_input.map(|(tx, payload)| tokio::spawn(feed_stdin(tx, payload)));

        Self {
            pid,
            child,
            stdout_drain,
            stderr_drain,
            feeder,
            state: HandleState::Launched,
        }
    }

    /// The child's process id as recorded at launch.
    pub fn pid(&self) -> Option<i32> {
        self.pid
    }

    /// Waits for the child to exit, joins the drains and the feeder, and
    /// returns the aggregated result.
    ///
    /// A non-zero exit code is ordinary data in the returned [`Output`],
    /// not an error.
    ///
    /// # Panics
    ///
    /// Panics if called more than once on the same handle. That is a
    /// caller bug, not a runtime condition.
    pub async fn output(&mut self) -> Result<Output, RunError> {
        assert!(
            self.state == HandleState::Launched,
            "process result already requested"
        );
        self.state = HandleState::ResultPending;

        // Interrupted waits are retried inside the runtime's child reaper
        // and never surface here.
        let status = self.child.wait().await.map_err(RunError::Wait)?;
        let exit_code = exit_code_from_status(status);
        tracing::debug!(
            target: trace_categories::WAIT,
            pid = self.pid,
            exit_code,
            "child exited"
        );

        // Fan-in join of every remaining task, so no task error is lost.
        let (stdout, stderr, fed) = tokio::join!(
            join_drain(self.stdout_drain.take(), StreamType::Stdout),
            join_drain(self.stderr_drain.take(), StreamType::Stderr),
            join_feeder(self.feeder.take()),
        );
        self.state = HandleState::Completed;

        let stdout = stdout?;
        let stderr = stderr?;
        fed?;

        Ok(Output {
            exit_code,
            stdout,
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // A handle abandoned before its result was taken cancels the
        // in-flight I/O. Each task's owned pipe end closes as it unwinds,
        // so the child still observes end-of-input on stdin. The kernel
        // wait itself is not interruptible; the runtime reaps the child
        // whenever it exits.
        for task in [&self.stdout_drain, &self.stderr_drain] {
            if let Some(task) = task {
                task.abort();
            }
        }
        if let Some(task) = &self.feeder {
            task.abort();
        }
    }
}

/// Reads one of the child's output pipes to end-of-file.
async fn drain(
    mut reader: pipe::Receiver,
    stream: StreamType,
) -> Result<Vec<u8>, std::io::Error> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    tracing::trace!(
        target: trace_categories::IO,
        %stream,
        bytes = buf.len(),
        "stream drained"
    );
    Ok(buf)
}

/// Writes the payload into the child's standard input.
///
/// The write end travels by value into this task, so the child reliably
/// observes end-of-input: the descriptor closes on drop, on success,
/// failure, and cancellation alike.
async fn feed_stdin(
    mut writer: pipe::Sender,
    payload: FeedPayload,
) -> Result<(), std::io::Error> {
    let result = match payload {
        FeedPayload::Buffer(bytes) => writer.write_all(&bytes).await,
        FeedPayload::Stream(mut rx) => {
            let mut result = Ok(());
            while let Some(chunk) = rx.recv().await {
                if let Err(err) = writer.write_all(&chunk).await {
                    result = Err(err);
                    break;
                }
            }
            result
        }
    };

    match result {
        // The child exited without consuming its input; its exit status is
        // the authoritative outcome.
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {
            tracing::debug!(
                target: trace_categories::IO,
                "child stdin closed before payload was fully written"
            );
            Ok(())
        }
        other => other,
    }
}

async fn join_drain(
    handle: Option<JoinHandle<Result<Vec<u8>, std::io::Error>>>,
    stream: StreamType,
) -> Result<Vec<u8>, RunError> {
    match handle {
        None => Ok(Vec::new()),
        Some(handle) => handle
            .await?
            .map_err(|source| RunError::Read { stream, source }),
    }
}

async fn join_feeder(
    handle: Option<JoinHandle<Result<(), std::io::Error>>>,
) -> Result<(), RunError> {
    match handle {
        None => Ok(()),
        Some(handle) => handle.await?.map_err(RunError::Feed),
    }
}

/// Classifies a raw wait status into a single exit code: the child's real
/// exit code for a normal exit, or `128 + signal` for signal termination,
/// mirroring shell convention.
fn exit_code_from_status(status: ExitStatus) -> u8 {
    if let Some(code) = status.code() {
        #[allow(clippy::cast_sign_loss)]
        return (code & 0xFF) as u8;
    }

    if let Some(signal) = status.signal() {
        #[allow(clippy::cast_sign_loss)]
        return (signal & 0x7F) as u8 + 128;
    }

    tracing::error!(target: trace_categories::WAIT, "unhandled process exit");
    127
}

/// The aggregated, immutable result of a completed child process.
#[derive(Clone, Debug)]
pub struct Output {
    exit_code: u8,
    stdout: Vec<u8>,
    stderr: String,
}

impl Output {
    /// The child's exit code: its real exit code for a normal exit, or
    /// `128 + signal` if it was terminated by a signal.
    pub const fn exit_code(&self) -> u8 {
        self.exit_code
    }

    /// Returns whether the child exited successfully.
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// The raw bytes the child wrote to standard output.
    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    /// The child's standard output, lossily decoded as UTF-8.
    pub fn stdout_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    /// The text the child wrote to standard error.
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Consumes the output, returning the captured standard output bytes.
    pub fn into_stdout(self) -> Vec<u8> {
        self.stdout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(raw: i32) -> ExitStatus {
        ExitStatus::from_raw(raw)
    }

    #[test]
    fn normal_exits_keep_their_code() {
        assert_eq!(exit_code_from_status(status(0)), 0);
        assert_eq!(exit_code_from_status(status(23 << 8)), 23);
        assert_eq!(exit_code_from_status(status(255 << 8)), 255);
    }

    #[test]
    fn signal_termination_maps_to_pseudo_code() {
        // Raw wait statuses for children killed by SIGKILL and SIGTERM.
        assert_eq!(exit_code_from_status(status(9)), 137);
        assert_eq!(exit_code_from_status(status(15)), 143);
    }

    #[test]
    fn output_accessors() {
        let output = Output {
            exit_code: 0,
            stdout: b"abc".to_vec(),
            stderr: "warning".into(),
        };
        assert!(output.success());
        assert_eq!(output.stdout(), b"abc");
        assert_eq!(output.stdout_str(), "abc");
        assert_eq!(output.stderr(), "warning");
    }
}
