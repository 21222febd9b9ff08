//! Sources of input for a child's standard input.

use std::os::fd::{AsFd, OwnedFd};
use std::path::PathBuf;

use tokio::net::unix::pipe;
use tokio::sync::mpsc;

use crate::error::SpawnError;
use crate::pipes;

/// Describes what a launched child should receive on standard input.
///
/// Exactly one variant is active per launch. Buffer and stream sources are
/// delivered through a pipe by a feeder task; descriptor and path sources
/// are duplicated directly into the child without allocating a pipe.
#[derive(Debug, Default)]
pub enum StdinSource {
    /// The child inherits the parent's standard input.
    #[default]
    Inherit,
    /// The child reads the given bytes, then sees end-of-input.
    Bytes(Vec<u8>),
    /// The child reads the given text, then sees end-of-input.
    Text(String),
    /// The child reads from a duplicate of an already-open descriptor.
    Fd(OwnedFd),
    /// The child reads from the file at the given path, opened at launch.
    File(PathBuf),
    /// The child reads whatever the channel yields, until it closes.
    Stream(mpsc::Receiver<Vec<u8>>),
}

impl StdinSource {
    /// A source feeding the child the given raw bytes.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(bytes.into())
    }

    /// A source feeding the child the given text.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// A source backed by a duplicate of the caller's descriptor. The
    /// caller keeps the original; the engine owns the duplicate and closes
    /// it once it has been handed to the child.
    pub fn fd(fd: impl AsFd) -> std::io::Result<Self> {
        Ok(Self::Fd(fd.as_fd().try_clone_to_owned()?))
    }

    /// A source backed by the file at the given path.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// A push-based source: the child receives each chunk the channel
    /// yields, and end-of-input once the channel closes.
    pub fn stream(rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self::Stream(rx)
    }

    /// Resolves the source, once per launch, into either "duplicate a
    /// descriptor into the child" or "allocate a pipe and feed it".
    pub(crate) fn resolve(self) -> Result<ResolvedStdin, SpawnError> {
        match self {
            Self::Inherit => Ok(ResolvedStdin::Inherit),
            Self::Fd(fd) => Ok(ResolvedStdin::ChildFd(fd)),
            Self::File(path) => {
                let file = std::fs::File::open(&path).map_err(SpawnError::syscall("open"))?;
                Ok(ResolvedStdin::ChildFd(file.into()))
            }
            Self::Bytes(bytes) => feed(FeedPayload::Buffer(bytes)),
            Self::Text(text) => feed(FeedPayload::Buffer(text.into_bytes())),
            Self::Stream(rx) => feed(FeedPayload::Stream(rx)),
        }
    }
}

fn feed(payload: FeedPayload) -> Result<ResolvedStdin, SpawnError> {
    let (parent_end, child_end) = pipes::input_pair()?;
    Ok(ResolvedStdin::Feed {
        child_end,
        parent_end,
        payload,
    })
}

/// What a feeder task writes into the child's standard input pipe.
#[derive(Debug)]
pub(crate) enum FeedPayload {
    /// A complete payload, written in full.
    Buffer(Vec<u8>),
    /// A push-based stream, pulled to exhaustion.
    Stream(mpsc::Receiver<Vec<u8>>),
}

/// The launch-time form of a [`StdinSource`].
#[derive(Debug)]
pub(crate) enum ResolvedStdin {
    /// No action; the child inherits descriptor 0.
    Inherit,
    /// A descriptor to duplicate into the child's slot 0.
    ChildFd(OwnedFd),
    /// A freshly allocated pipe: the child end goes into slot 0, the parent
    /// end goes to a feeder task along with the payload to deliver.
    Feed {
        /// The child's read end.
        child_end: OwnedFd,
        /// The parent's write end.
        parent_end: pipe::Sender,
        /// The payload the feeder will deliver.
        payload: FeedPayload,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_source_inherits() {
        assert!(matches!(StdinSource::default(), StdinSource::Inherit));
    }

    #[test]
    fn fd_source_duplicates_the_callers_descriptor() {
        use std::os::fd::AsRawFd;

        let file = std::fs::File::open("/dev/null").unwrap();
        let source = StdinSource::fd(&file).unwrap();

        // The caller's descriptor stays open and distinct.
        let StdinSource::Fd(dup) = source else {
            panic!("expected an fd source");
        };
        assert_ne!(dup.as_raw_fd(), file.as_raw_fd());
        assert!(file.metadata().is_ok());
    }

    #[test]
    fn missing_path_source_fails_at_resolution() {
        let err = StdinSource::path("/nonexistent/path-xyz").resolve().unwrap_err();
        assert!(matches!(err, SpawnError::Syscall { step: "open", .. }));
    }
}
