//! CLI error types.

use std::path::PathBuf;

use pagesync_config::ConfigError;
use pagesync_confluence::StoreError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0} document(s) failed to sync")]
    SyncFailed(usize),
}
