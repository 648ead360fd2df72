use std::path::PathBuf;

/// Raised when the builder reaches an internal state it cannot resolve.
///
/// Callers keep their last accepted graph when this happens.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("speaker '{name}' on line {line} was never registered")]
    UnresolvedSpeaker { name: String, line: usize },

    #[error("pending choice points at node {index}, which is not a choice node")]
    PendingChoiceMismatch { index: usize },
}

/// Rejection of a foreign script file. No partial import is ever kept.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("invalid script file: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid script file: {0}")]
    Structure(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt data in {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no data directory available on this platform")]
    NoDataDir,

    #[error("project '{0}' not found")]
    UnknownProject(String),
}
