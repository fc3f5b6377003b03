//! Typed failures surfaced by the stores, the installer and the archive code.
//!
//! Every enum exposes a stable machine-readable `kind()` for logs and a
//! `user_message()` that a UI can show (or map to a localized string)
//! without leaking the cause chain.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("identity provider rejected the request: {0}")]
    ProviderRejected(String),

    #[error("network error while talking to the identity provider: {0}")]
    Network(String),

    #[error("login was cancelled")]
    Cancelled,

    #[error("session for {0} expired and cannot be refreshed")]
    TokenExpiredNoRefresh(String),

    #[error("no account matches {0}")]
    UnknownAccount(String),
}

impl AuthError {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::ProviderRejected(_) => "provider_rejected",
            AuthError::Network(_) => "network",
            AuthError::Cancelled => "cancelled",
            AuthError::TokenExpiredNoRefresh(_) => "token_expired_no_refresh",
            AuthError::UnknownAccount(_) => "unknown_account",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            AuthError::ProviderRejected(_) => {
                "The sign-in was rejected. Check your credentials and try again.".to_string()
            }
            AuthError::Network(_) => {
                "Could not reach the sign-in service. Check your connection.".to_string()
            }
            AuthError::Cancelled => "Sign-in was cancelled.".to_string(),
            AuthError::TokenExpiredNoRefresh(_) => {
                "Your session has expired. Please sign in again.".to_string()
            }
            AuthError::UnknownAccount(_) => "That account no longer exists.".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("network error: {0}")]
    NetworkError(String),

    #[error("version catalog rejected the request: {0}")]
    CatalogRejected(String),

    #[error("installer process exited with code {code}")]
    SubprocessNonZero { code: i32 },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("could not resolve required dependency {0}")]
    DependencyUnresolved(String),

    #[error("an install for {0} is already running")]
    Busy(String),

    #[error("install was cancelled")]
    Cancelled,

    #[error("installer fault: {0}")]
    Internal(String),
}

impl InstallError {
    pub fn kind(&self) -> &'static str {
        match self {
            InstallError::NetworkError(_) => "network_error",
            InstallError::CatalogRejected(_) => "catalog_rejected",
            InstallError::SubprocessNonZero { .. } => "subprocess_non_zero",
            InstallError::Filesystem(_) => "filesystem",
            InstallError::NotSupported(_) => "not_supported",
            InstallError::DependencyUnresolved(_) => "dependency_unresolved",
            InstallError::Busy(_) => "busy",
            InstallError::Cancelled => "cancelled",
            InstallError::Internal(_) => "internal",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            InstallError::NetworkError(_) => {
                "Download failed. Check your connection and try again.".to_string()
            }
            InstallError::CatalogRejected(_) => {
                "The version could not be installed.".to_string()
            }
            InstallError::SubprocessNonZero { code } => {
                format!("The loader installer failed (exit code {}).", code)
            }
            InstallError::Filesystem(_) => {
                "Could not write game files. Check disk space and permissions.".to_string()
            }
            InstallError::NotSupported(what) => format!("{} is not supported.", what),
            InstallError::DependencyUnresolved(what) => {
                format!("No compatible version of required dependency {} was found.", what)
            }
            InstallError::Busy(_) => "This profile is already being installed.".to_string(),
            InstallError::Cancelled => "Installation was cancelled.".to_string(),
            InstallError::Internal(_) => {
                "Installation failed unexpectedly. See the log for details.".to_string()
            }
        }
    }

    /// Maps an error coming back from a catalog, loader installer or registry
    /// onto the install taxonomy.
    ///
    /// Typed install errors anywhere in the chain keep their kind, I/O errors
    /// become [`InstallError::Filesystem`], and everything else is treated as
    /// the collaborator refusing the request.
    pub fn classify(err: anyhow::Error) -> Self {
        let err = match err.downcast::<InstallError>() {
            Ok(typed) => return typed,
            Err(err) => err,
        };
        let detail = format!("{:#}", err);
        if err.chain().any(|cause| cause.is::<std::io::Error>()) {
            InstallError::Filesystem(detail)
        } else {
            InstallError::CatalogRejected(detail)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to persist {}: {reason}", path.display())]
    PersistenceFailed { path: PathBuf, reason: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid value: {0}")]
    Invalid(String),
}

impl StoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::PersistenceFailed { .. } => "persistence_failed",
            StoreError::NotFound(_) => "not_found",
            StoreError::Conflict(_) => "conflict",
            StoreError::Invalid(_) => "invalid",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            StoreError::PersistenceFailed { .. } => {
                "Changes could not be saved to disk.".to_string()
            }
            StoreError::NotFound(what) => format!("{} could not be found.", what),
            StoreError::Conflict(reason) => reason.clone(),
            StoreError::Invalid(reason) => reason.clone(),
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        StoreError::PersistenceFailed {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("invalid profile archive: {0}")]
    InvalidFormat(String),

    /// Only reported as a warning by the importer; kept here so callers that
    /// want strict checking can build it from the manifest themselves.
    #[error("archive format version {found} does not match {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ArchiveError {
    pub fn kind(&self) -> &'static str {
        match self {
            ArchiveError::InvalidFormat(_) => "invalid_format",
            ArchiveError::VersionMismatch { .. } => "version_mismatch",
            ArchiveError::Filesystem(_) => "filesystem",
            ArchiveError::Store(inner) => inner.kind(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ArchiveError::InvalidFormat(_) => "This file is not a valid profile export.".to_string(),
            ArchiveError::VersionMismatch { .. } => {
                "This export was made by a different launcher version.".to_string()
            }
            ArchiveError::Filesystem(_) => "Could not read or write the archive.".to_string(),
            ArchiveError::Store(inner) => inner.user_message(),
        }
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(err: std::io::Error) -> Self {
        ArchiveError::Filesystem(err.to_string())
    }
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => ArchiveError::Filesystem(io.to_string()),
            other => ArchiveError::InvalidFormat(other.to_string()),
        }
    }
}

/// Failure of a [`LauncherContext`](crate::LauncherContext) operation, which
/// may cross several components.
#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("launch failed: {0}")]
    Launch(String),
}

impl LauncherError {
    pub fn kind(&self) -> &'static str {
        match self {
            LauncherError::Auth(inner) => inner.kind(),
            LauncherError::Install(inner) => inner.kind(),
            LauncherError::Store(inner) => inner.kind(),
            LauncherError::Archive(inner) => inner.kind(),
            LauncherError::Launch(_) => "launch_failed",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            LauncherError::Auth(inner) => inner.user_message(),
            LauncherError::Install(inner) => inner.user_message(),
            LauncherError::Store(inner) => inner.user_message(),
            LauncherError::Archive(inner) => inner.user_message(),
            LauncherError::Launch(_) => {
                "The game could not be started. Check your Java installation.".to_string()
            }
        }
    }
}
