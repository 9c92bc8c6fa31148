//! Error taxonomy for the registry, the discovery loader and the score board.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LauncherError>;

/// Coarse failure category, used by the controller to pick a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidIdentifier,
    DuplicateIdentifier,
    NotFound,
    InvalidPackage,
    IncompatibleBinary,
    NoCompatibleUnits,
    InstantiationFailure,
    Io,
    Config,
}

#[derive(Debug, Error)]
pub enum LauncherError {
    #[error("invalid identifier `{raw}`: identifiers must not be empty")]
    InvalidIdentifier { raw: String },

    #[error("a game is already registered as `{id}`")]
    DuplicateIdentifier { id: String },

    #[error("no game registered as `{id}`")]
    NotFound { id: String },

    #[error("invalid package `{path}`: {reason}")]
    InvalidPackage { path: PathBuf, reason: String },

    #[error("package `{path}` was built for plugin ABI {found}, host supports {expected}{hint}")]
    IncompatibleBinary {
        path: PathBuf,
        found: u32,
        expected: u32,
        hint: &'static str,
    },

    #[error("package `{path}` contains no compatible games")]
    NoCompatibleUnits { path: PathBuf },

    #[error("could not instantiate `{unit}`: {reason}")]
    InstantiationFailure { unit: String, reason: String },

    #[error("io failed at `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration `{path}`: {details}")]
    Config { path: PathBuf, details: String },
}

impl LauncherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIdentifier { .. } => ErrorKind::InvalidIdentifier,
            Self::DuplicateIdentifier { .. } => ErrorKind::DuplicateIdentifier,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidPackage { .. } => ErrorKind::InvalidPackage,
            Self::IncompatibleBinary { .. } => ErrorKind::IncompatibleBinary,
            Self::NoCompatibleUnits { .. } => ErrorKind::NoCompatibleUnits,
            Self::InstantiationFailure { .. } => ErrorKind::InstantiationFailure,
            Self::Io { .. } => ErrorKind::Io,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    pub fn invalid_package(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPackage {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn incompatible_binary(path: impl Into<PathBuf>, found: u32, expected: u32) -> Self {
        let hint = if found > expected {
            " (compiled against a newer launcher runtime)"
        } else {
            " (compiled against an older launcher runtime)"
        };
        Self::IncompatibleBinary {
            path: path.into(),
            found,
            expected,
            hint,
        }
    }

    pub fn instantiation(unit: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InstantiationFailure {
            unit: unit.into(),
            reason: reason.into(),
        }
    }

    pub fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Extract a human-readable message from a panic payload.
pub fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}
