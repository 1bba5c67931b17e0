use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the library API.
///
/// Per-metric failures never show up here; they are recorded inside a
/// [`Snapshot`](crate::snapshot::Snapshot) as
/// [`Reading::Unavailable`](crate::snapshot::Reading) so one bad metric
/// cannot take sampling down with it.
#[derive(Debug, Error)]
pub enum Error {
    /// Interface selection named an interface the source has never reported.
    /// The previous selection stays in effect.
    #[error("unknown network interface: {0}")]
    InvalidInterface(String),

    /// A command was sent to a sampler that has already stopped.
    #[error("sampler is not running")]
    NotRunning,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("diagnostic failed: {0}")]
    Diagnostic(String),
}
