//! Publish error types.

use driverpub_archive::ArchiveError;
use driverpub_settings::ConfigError;

use crate::remote::RemoteError;

/// Every way a publish can fail.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("filesystem error: {0}")]
    Filesystem(#[source] ArchiveError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no items found for publishing")]
    NothingToPublish,

    #[error("unknown host: {0}")]
    UnknownHost(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("failed to update {target}: {reason}")]
    RemoteUpdate { target: String, reason: String },

    #[error("cancelled")]
    Cancelled,
}

impl PublishError {
    /// Classifies an error raised while analyzing a source tree.
    pub(crate) fn analysis(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Io(io) => Self::Io(io),
            other => Self::Filesystem(other),
        }
    }

    /// Classifies an error raised while writing an archive.
    pub(crate) fn build(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Io(io) => Self::Io(io),
            other => Self::Io(std::io::Error::other(other)),
        }
    }

    /// Classifies a remote failure while working on `target`.
    pub(crate) fn remote(target: &str, err: RemoteError) -> Self {
        match err {
            RemoteError::UnknownHost(host) => Self::UnknownHost(host),
            RemoteError::Auth(reason) => Self::Auth(reason),
            RemoteError::Rejected(reason) | RemoteError::Transport(reason) => Self::RemoteUpdate {
                target: target.to_string(),
                reason,
            },
        }
    }

    pub(crate) fn join(err: tokio::task::JoinError) -> Self {
        Self::Io(std::io::Error::other(format!("task join error: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn missing_root_is_filesystem() {
        let err = PublishError::analysis(ArchiveError::MissingRoot(PathBuf::from("/proj/src")));
        assert!(matches!(err, PublishError::Filesystem(_)));
        assert!(err.to_string().contains("/proj/src"));
    }

    #[test]
    fn build_failures_are_io() {
        let err = PublishError::build(ArchiveError::InvalidEntryName("../x".into()));
        assert!(matches!(err, PublishError::Io(_)));
    }

    #[test]
    fn remote_errors_keep_their_class() {
        assert!(matches!(
            PublishError::remote("x", RemoteError::UnknownHost("cs".into())),
            PublishError::UnknownHost(_)
        ));
        assert!(matches!(
            PublishError::remote("x", RemoteError::Auth("bad password".into())),
            PublishError::Auth(_)
        ));

        let err = PublishError::remote("setup.py", RemoteError::Rejected("409".into()));
        match err {
            PublishError::RemoteUpdate { target, reason } => {
                assert_eq!(target, "setup.py");
                assert_eq!(reason, "409");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
