use std::{io, path::PathBuf, process::ExitStatus, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("music folder {} does not exist", .0.to_string_lossy())]
    RootNotFound(PathBuf),

    #[error("failed to read header template {}: {source}", path.to_string_lossy())]
    HeaderTemplate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", path.to_string_lossy())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read link sidecar {}: {source}", path.to_string_lossy())]
    Sidecar {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("link sidecar {} has no URL line", .0.to_string_lossy())]
    MalformedSidecar(PathBuf),
}

/// Failure of the batched version-control history query
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to run git: {0}")]
    Io(#[from] io::Error),

    #[error("git log exited with {0}")]
    Status(ExitStatus),

    #[error("git log did not finish within {0:?}")]
    Timeout(Duration),

    #[error("git log output is not valid UTF-8")]
    Encoding,
}
