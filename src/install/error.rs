//! Installer error taxonomy.
//!
//! Every variant except [`InstallerError::PathRegistration`] is fatal: the
//! orchestrator stops the pipeline, cleans up the workspace and exits
//! nonzero. Path registration failures are downgraded to warnings.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the install/uninstall pipeline
#[derive(Debug, Error)]
pub enum InstallerError {
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("release query failed: {0}")]
    Network(String),

    #[error("no release asset named {filename} in release {tag} (available: {})", list_or_none(.available))]
    AssetNotFound {
        filename: String,
        tag: String,
        available: Vec<String>,
    },

    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("placement failed: {0}")]
    Placement(#[from] PlacementError),

    #[error("elevation denied: {0}")]
    ElevationDenied(String),

    #[error("could not update the user PATH: {0}")]
    PathRegistration(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("temporary workspace: {0}")]
    Workspace(String),
}

impl InstallerError {
    /// Whether this error aborts the workflow
    pub fn is_fatal(&self) -> bool {
        !matches!(self, InstallerError::PathRegistration(_))
    }

    pub(crate) fn network(err: impl std::fmt::Display) -> Self {
        InstallerError::Network(err.to_string())
    }

    pub(crate) fn download(url: &str, reason: impl std::fmt::Display) -> Self {
        InstallerError::Download {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Failures while moving the payload into its install location
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not writable and privilege escalation was declined: {reason}", .path.display())]
    ElevationDeclined { path: PathBuf, reason: String },

    #[error("payload missing: {}", .0.display())]
    MissingPayload(PathBuf),

    #[error("placed file {} is not executable", .0.display())]
    NotExecutable(PathBuf),
}

impl PlacementError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PlacementError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

fn list_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}
