//! Composition of the OS command from a launch request.

use std::os::unix::process::CommandExt;
use std::path::Path;

use crate::spawnplan::SpawnPlan;

/// Builds the `std::process::Command` for a launch: resolved program path,
/// child-visible argv[0], argument vector, environment overrides, and the
/// installed spawn plan.
pub(crate) fn compose_std_command(
    resolved_path: &Path,
    argv0: &str,
    args: &[String],
    env_overrides: &[(String, String)],
    plan: SpawnPlan,
) -> std::process::Command {
    let mut cmd = std::process::Command::new(resolved_path);

    // Preserve the original, unresolved name as the child-visible argv[0].
    cmd.arg0(argv0);

    // Pass through args.
    for arg in args {
        cmd.arg(arg);
    }

    // The child inherits the parent's environment; overrides win on key
    // collision. No overrides leaves the environment untouched.
    for (name, value) in env_overrides {
        cmd.env(name, value);
    }

    plan.install(&mut cmd);

    cmd
}

/// Spawns the composed command through the async runtime, which owns
/// child-exit notification from then on.
pub(crate) fn spawn(command: std::process::Command) -> std::io::Result<tokio::process::Child> {
    let mut command = tokio::process::Command::from(command);
    command.spawn()
}
