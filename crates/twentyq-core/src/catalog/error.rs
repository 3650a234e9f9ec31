use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures at the catalog's persistence boundary.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse catalog file {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },
    #[error("failed to write catalog file {path:?}: {source}")]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to serialize learned state: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CatalogError {
    pub fn path(&self) -> Option<&Path> {
        match self {
            CatalogError::Read { path, .. }
            | CatalogError::Parse { path, .. }
            | CatalogError::Write { path, .. } => Some(path.as_path()),
            CatalogError::Serialize(_) => None,
        }
    }
}
