//! End-to-end tests driving real child processes.

use pretty_assertions::assert_eq;
use subproc::{Error, Launcher, SpawnError, StdinSource};

#[tokio::test]
async fn reports_normal_exit_code() -> anyhow::Result<()> {
    let output = Launcher::new("sh").args(["-c", "exit 7"]).run().await?;
    assert_eq!(output.exit_code(), 7);
    assert!(!output.success());
    Ok(())
}

#[tokio::test]
async fn signal_termination_yields_shell_pseudo_code() -> anyhow::Result<()> {
    let output = Launcher::new("sh").args(["-c", "kill -9 $$"]).run().await?;
    assert_eq!(output.exit_code(), 137);
    Ok(())
}

#[tokio::test]
async fn captures_exact_stdout_bytes() -> anyhow::Result<()> {
    let output = Launcher::new("sh")
        .args(["-c", r"printf 'a\000b'"])
        .run()
        .await?;
    assert_eq!(output.stdout(), b"a\0b");
    Ok(())
}

#[tokio::test]
async fn text_stdin_round_trips_through_cat() -> anyhow::Result<()> {
    let output = Launcher::new("cat")
        .stdin(StdinSource::text("hello\n"))
        .run()
        .await?;
    assert_eq!(output.stdout(), b"hello\n");
    Ok(())
}

#[tokio::test]
async fn large_interleaved_output_is_captured_without_loss() -> anyhow::Result<()> {
    // Both streams carry well over a pipe buffer's worth of data.
    let script = "i=0; while [ \"$i\" -lt 4000 ]; do \
                  echo abcdefghijklmnopqrstuvwxyz; \
                  echo ABCDEFGHIJKLMNOPQRSTUVWXYZ 1>&2; \
                  i=$((i+1)); done";
    let output = Launcher::new("sh").args(["-c", script]).run().await?;

    assert_eq!(
        output.stdout_str(),
        "abcdefghijklmnopqrstuvwxyz\n".repeat(4000)
    );
    assert_eq!(output.stderr(), "ABCDEFGHIJKLMNOPQRSTUVWXYZ\n".repeat(4000));
    assert!(output.success());
    Ok(())
}

#[tokio::test]
async fn stderr_flood_then_stdin_read_does_not_deadlock() -> anyhow::Result<()> {
    // The child fills its stderr pipe buffer before it touches stdin or
    // stdout; only concurrent drains keep this from wedging.
    let payload = vec![b'x'; 64 * 1024];
    let output = Launcher::new("sh")
        .args(["-c", "head -c 100000 /dev/zero 1>&2; cat"])
        .stdin(StdinSource::bytes(payload.clone()))
        .run()
        .await?;

    assert_eq!(output.stdout(), payload.as_slice());
    assert_eq!(output.stderr().len(), 100_000);
    Ok(())
}

#[tokio::test]
#[should_panic(expected = "process result already requested")]
async fn second_result_request_panics() {
    let mut handle = Launcher::new("sh")
        .args(["-c", ":"])
        .launch()
        .await
        .unwrap();
    handle.output().await.unwrap();
    let _ = handle.output().await;
}

#[tokio::test]
async fn nonexistent_executable_fails_resolution() {
    let err = Launcher::new("/nonexistent/path-xyz").launch().await.unwrap_err();
    assert!(matches!(err, SpawnError::CommandNotFound(_)));
}

#[tokio::test]
async fn working_directory_is_observed_by_the_child() -> anyhow::Result<()> {
    let output = Launcher::new("pwd").current_dir("/").run().await?;
    assert_eq!(output.stdout(), b"/\n");
    Ok(())
}

#[tokio::test]
async fn unenterable_working_directory_fails_the_spawn() {
    let err = Launcher::new("pwd")
        .current_dir("/nonexistent/dir-xyz")
        .launch()
        .await
        .unwrap_err();
    assert!(matches!(err, SpawnError::Syscall { step: "spawn", .. }));
}

#[tokio::test]
async fn environment_overrides_win_over_inherited_values() -> anyhow::Result<()> {
    let output = Launcher::new("sh")
        .args(["-c", "printf '%s' \"$SUBPROC_TEST_VAR\""])
        .env("SUBPROC_TEST_VAR", "value123")
        .run()
        .await?;
    assert_eq!(output.stdout(), b"value123");
    Ok(())
}

#[tokio::test]
async fn bulk_environment_overrides_extend_single_ones() -> anyhow::Result<()> {
    let output = Launcher::new("sh")
        .args(["-c", "printf '%s/%s/%s' \"$SUBPROC_A\" \"$SUBPROC_B\" \"$SUBPROC_C\""])
        .env("SUBPROC_A", "one")
        .envs([("SUBPROC_B", "two"), ("SUBPROC_C", "three")])
        .run()
        .await?;
    assert_eq!(output.stdout(), b"one/two/three");
    Ok(())
}

#[tokio::test]
async fn environment_is_inherited_without_overrides() -> anyhow::Result<()> {
    let output = Launcher::new("sh")
        .args(["-c", "printf '%s' \"$PATH\""])
        .run()
        .await?;
    assert!(!output.stdout().is_empty());
    Ok(())
}

#[tokio::test]
async fn child_sees_the_unresolved_name_as_argv0() -> anyhow::Result<()> {
    // The program resolves to an absolute path, but argv[0] keeps the name
    // the caller used.
    let output = Launcher::new("sh")
        .args(["-c", "printf '%s' \"$0\""])
        .run()
        .await?;
    assert_eq!(output.stdout(), b"sh");
    Ok(())
}

#[tokio::test]
async fn fd_stdin_source_feeds_the_child() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join(format!("subproc-fd-{}", std::process::id()));
    std::fs::write(&path, "from fd\n")?;

    let file = std::fs::File::open(&path)?;
    let output = Launcher::new("cat")
        .stdin(StdinSource::fd(&file)?)
        .run()
        .await?;

    // The caller's descriptor is still its own to use.
    assert!(file.metadata().is_ok());
    assert_eq!(output.stdout(), b"from fd\n");

    std::fs::remove_file(&path)?;
    Ok(())
}

#[tokio::test]
async fn path_stdin_source_feeds_the_child() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join(format!("subproc-path-{}", std::process::id()));
    std::fs::write(&path, "from file\n")?;

    let output = Launcher::new("cat")
        .stdin(StdinSource::path(&path))
        .run()
        .await?;
    assert_eq!(output.stdout(), b"from file\n");

    std::fs::remove_file(&path)?;
    Ok(())
}

#[tokio::test]
async fn stream_stdin_source_delivers_chunks_until_close() -> anyhow::Result<()> {
    let (tx, rx) = tokio::sync::mpsc::channel(4);
    tx.send(b"hello ".to_vec()).await.unwrap();
    tx.send(b"world".to_vec()).await.unwrap();
    drop(tx);

    let output = Launcher::new("cat")
        .stdin(StdinSource::stream(rx))
        .run()
        .await?;
    assert_eq!(output.stdout(), b"hello world");
    Ok(())
}

#[tokio::test]
async fn early_exit_tolerates_unconsumed_stdin() -> anyhow::Result<()> {
    // The child never reads its input; the broken pipe in the feeder must
    // not mask the child's own exit status.
    let payload = vec![b'y'; 256 * 1024];
    let output = Launcher::new("sh")
        .args(["-c", "exit 5"])
        .stdin(StdinSource::bytes(payload))
        .run()
        .await?;
    assert_eq!(output.exit_code(), 5);
    Ok(())
}

#[tokio::test]
async fn capture_off_leaves_output_empty() -> anyhow::Result<()> {
    let output = Launcher::new("sh")
        .args(["-c", ":"])
        .capture_output(false)
        .run()
        .await?;
    assert!(output.success());
    assert!(output.stdout().is_empty());
    assert!(output.stderr().is_empty());
    Ok(())
}

#[tokio::test]
async fn run_checked_promotes_nonzero_exit() {
    let err = Launcher::new("sh")
        .args(["-c", "echo diagnostics 1>&2; exit 3"])
        .run_checked()
        .await
        .unwrap_err();

    match err {
        Error::ExitFailure(output) => {
            assert_eq!(output.exit_code(), 3);
            assert_eq!(output.stderr(), "diagnostics\n");
        }
        other => panic!("expected ExitFailure, got: {other}"),
    }
}

#[tokio::test]
async fn handle_reports_the_child_pid() -> anyhow::Result<()> {
    let mut handle = Launcher::new("sh").args(["-c", ":"]).launch().await?;
    assert!(handle.pid().is_some_and(|pid| pid > 0));
    handle.output().await?;
    Ok(())
}
