//! Error taxonomy for the virtual filesystem layer.
//!
//! Path, validation and conflict errors are raised before anything touches
//! storage. Only [`Error::Io`] can follow a physical change.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::paths::VirtualPath;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Whether a node is a plain file or a folder.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Folder,
}

impl EntryKind {
    #[must_use]
    pub fn from_is_dir(is_dir: bool) -> Self {
        if is_dir {
            EntryKind::Folder
        } else {
            EntryKind::File
        }
    }

    #[must_use]
    pub fn is_dir(self) -> bool {
        self == EntryKind::Folder
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::File => f.write_str("file"),
            EntryKind::Folder => f.write_str("folder"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathResolutionError {
    #[error("path is empty")]
    Empty,
    #[error("`{0}` climbs out of its root folder")]
    EscapesRoot(String),
    #[error("`{root}` is not a configured root folder (while resolving `{path}`)")]
    UnknownRoot { root: String, path: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("cannot operate on top-level folder `{0}`")]
    TopLevelFolder(VirtualPath),
    #[error("cannot drop into the root")]
    DropIntoRoot,
    #[error("cannot put `{from}` inside itself (`{target}`)")]
    IntoItself { from: VirtualPath, target: VirtualPath },
    #[error("cannot replace `{destination}` with `{from}`; it contains `{from}`")]
    OntoAncestor {
        from: VirtualPath,
        destination: VirtualPath,
    },
    #[error("`{0}` is already in that folder; in-place reordering is not supported")]
    InPlaceReorder(VirtualPath),
    #[error("`{0}` does not exist")]
    SourceMissing(VirtualPath),
    #[error("destination folder `{0}` does not exist")]
    DestinationMissing(VirtualPath),
    #[error("destination `{0}` is not a folder")]
    DestinationNotDirectory(VirtualPath),
    #[error("`{0}` is not a valid name")]
    InvalidName(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConflictError {
    /// Never resolvable by confirming the overwrite.
    #[error("`{path}` already exists as a {existing}; it cannot be replaced by a {incoming}")]
    TypeMismatch {
        path: VirtualPath,
        existing: EntryKind,
        incoming: EntryKind,
    },
    /// Resolvable by re-issuing the command with overwrite confirmed.
    #[error("{kind} `{path}` already exists")]
    Exists { path: VirtualPath, kind: EntryKind },
}

impl ConflictError {
    /// Whether re-issuing the command with the overwrite flag set can succeed.
    #[must_use]
    pub fn is_overridable(&self) -> bool {
        matches!(self, ConflictError::Exists { .. })
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    PathResolution(#[from] PathResolutionError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error("I/O error on `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("`{path}` is not a valid snippet document: {source}")]
    InvalidDocument {
        path: VirtualPath,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub fn io(path: impl fmt::Display, source: io::Error) -> Self {
        Error::Io {
            path: path.to_string(),
            source,
        }
    }

    /// Stable identifier for the error family, used on the wire.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Error::PathResolution(_) => "pathResolution",
            Error::Validation(_) => "validation",
            Error::Conflict(_) => "conflict",
            Error::Io { .. } => "io",
            Error::InvalidDocument { .. } => "invalidDocument",
        }
    }

    /// True when the underlying cause is a missing file or folder.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}
