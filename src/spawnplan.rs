//! Descriptor actions applied in the child between fork and exec.

use std::ffi::CString;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::process::CommandExt;
use std::path::Path;

use crate::error::SpawnError;

/// A single descriptor operation to perform in the child before `exec`.
pub(crate) enum SpawnAction {
    /// Duplicates `src` onto descriptor `dst`. The two never alias, so the
    /// duplicate has close-on-exec cleared and survives the exec.
    Dup2 {
        /// The parent-owned descriptor being handed to the child.
        src: OwnedFd,
        /// The slot the child will see it at.
        dst: RawFd,
    },
    /// Closes a descriptor in the child.
    Close {
        /// The descriptor to close.
        fd: RawFd,
    },
    /// Changes the child's working directory. The path is pre-converted so
    /// applying the plan performs no allocation.
    Chdir {
        /// The directory to change to.
        path: CString,
    },
}

/// An ordered list of descriptor actions, built before spawning and applied
/// in the forked child immediately before the program image is replaced.
///
/// Ordering is deterministic: each duplication precedes the close of its
/// source, and the directory change comes last. The plan exclusively owns
/// every descriptor it holds; dropping it (after the spawn call returns, on
/// success and failure alike) closes the child-facing ends in the parent.
#[derive(Default)]
pub(crate) struct SpawnPlan {
    actions: Vec<SpawnAction>,
}

impl SpawnPlan {
    /// Arranges for `fd` to become the child's descriptor `dst`, closing
    /// the source descriptor in the child once it has been duplicated.
    ///
    /// The source must not already occupy `dst`; run descriptors through
    /// [`moved_above_stdio`] first.
    pub(crate) fn redirect(&mut self, fd: OwnedFd, dst: RawFd) {
        let src = fd.as_raw_fd();
        debug_assert_ne!(src, dst);
        self.actions.push(SpawnAction::Dup2 { src: fd, dst });
        self.actions.push(SpawnAction::Close { fd: src });
    }

    /// Arranges for the child to start in the given working directory.
    /// A directory that cannot be entered makes the spawn itself fail.
    pub(crate) fn chdir(&mut self, path: &Path) -> Result<(), SpawnError> {
        let path = CString::new(path.as_os_str().as_bytes()).map_err(|_| SpawnError::Syscall {
            step: "chdir",
            source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
        })?;
        self.actions.push(SpawnAction::Chdir { path });
        Ok(())
    }

    /// Installs the plan on the command as a pre-exec hook.
    pub(crate) fn install(self, cmd: &mut std::process::Command) {
        if self.actions.is_empty() {
            return;
        }

        // SAFETY:
        // This arranges for a provided function to run in the context of the
        // forked process before it exec's the target command. The hook
        // performs only async-signal-safe system calls on descriptors and a
        // pre-converted C path, with no allocation.
        unsafe {
            cmd.pre_exec(move || self.apply());
        }
    }

    /// Applies each action in order. Runs in the forked child.
    fn apply(&self) -> std::io::Result<()> {
        for action in &self.actions {
            match action {
                SpawnAction::Dup2 { src, dst } => {
                    // SAFETY: dup2 onto a standard slot; both descriptor
                    // numbers were fixed before the fork.
                    check_ret(unsafe { nix::libc::dup2(src.as_raw_fd(), *dst) })?;
                }
                SpawnAction::Close { fd } => {
                    // SAFETY: closing the already-duplicated source in the
                    // child; the parent's copy is unaffected.
                    check_ret(unsafe { nix::libc::close(*fd) })?;
                }
                SpawnAction::Chdir { path } => {
                    // SAFETY: chdir with a NUL-terminated path prepared
                    // before the fork.
                    check_ret(unsafe { nix::libc::chdir(path.as_ptr()) })?;
                }
            }
        }

        Ok(())
    }
}

fn check_ret(ret: nix::libc::c_int) -> std::io::Result<()> {
    if ret < 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Re-duplicates a descriptor if it occupies one of the standard slots,
/// where a later duplication in the plan could clobber it before its turn.
pub(crate) fn moved_above_stdio(fd: OwnedFd) -> Result<OwnedFd, SpawnError> {
    if fd.as_raw_fd() > 2 {
        return Ok(fd);
    }

    let raw = nix::fcntl::fcntl(&fd, nix::fcntl::FcntlArg::F_DUPFD_CLOEXEC(3))
        .map_err(|errno| SpawnError::Syscall {
            step: "fcntl",
            source: errno.into(),
        })?;

    // SAFETY: fcntl just returned this descriptor and nothing else owns it.
    Ok(unsafe { OwnedFd::from_raw_fd(raw) })
}
