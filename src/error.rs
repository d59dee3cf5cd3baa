use std::path::PathBuf;

/// Errors produced by the plugin store.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Plugin manifest not found: {path}")]
    ManifestNotFound { path: PathBuf },

    #[error("Invalid plugin manifest at {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("Invalid document at {path}: {reason}")]
    InvalidDocument { path: PathBuf, reason: String },

    #[error("Invalid skill: {reason}")]
    InvalidSkill { reason: String },

    #[error("Plugin '{id}' already exists")]
    DuplicateId { id: String },

    #[error("Plugin '{id}' not found")]
    NotFound { id: String },

    #[error("Plugin source not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Destination already exists: {path}")]
    DestinationExists { path: PathBuf },

    #[error("Timed out waiting for lock on {path}")]
    LockTimeout { path: PathBuf },

    #[error("Failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("Invalid plugin archive: {reason}")]
    Archive { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
