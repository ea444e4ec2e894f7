//! Structural mutations: move, copy, remove, rename and create.
//!
//! Move and copy run their gates in a fixed order and stop at the first
//! failure, before anything touches storage:
//!
//! 1. the source is not a root folder (and, for a move, the target is not
//!    the namespace above the roots);
//! 2. the source exists;
//! 3. a folder is not put inside itself, and nothing is put back into the
//!    folder it already lives in;
//! 4. the target exists and is a folder;
//! 5. the destination is not the source or one of its ancestors, and the
//!    containment rules of 3 also hold for the physical paths;
//! 6. an entry already at the destination is either a type mismatch
//!    (always rejected), a conflict (rejected unless overwrite is set), or
//!    deleted so the operation can proceed.
//!
//! Only then is the physical rename or copy performed and exactly one
//! [`MutationEvent`] produced.

use camino::Utf8Path;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ConflictError;
use crate::error::EntryKind;
use crate::error::Error;
use crate::error::Result;
use crate::error::ValidationError;
use crate::events::ChangeListener;
use crate::events::MutationEvent;
use crate::paths::VirtualPath;
use crate::snippet::SnippetDocument;
use crate::snippet::SNIPPET_EXTENSION;
use crate::store::Store;
use crate::system::Metadata;

/// A drag-and-drop style request: put `source` inside the folder `target`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub source: String,
    pub target: String,
    /// What the UI believes the source is. The on-disk kind wins.
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default)]
    pub overwrite: bool,
}

pub type MoveRequest = TransferRequest;
pub type CopyRequest = TransferRequest;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Transfer {
    Move,
    Copy,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationStatus {
    pub exists: bool,
    pub is_directory: bool,
}

/// A remove that passed its gates and awaits confirmation.
///
/// Dropping it without calling [`PendingRemove::commit`] declines the
/// removal: nothing changes and no event is emitted.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct PendingRemove {
    path: VirtualPath,
    is_dir: bool,
}

impl PendingRemove {
    #[must_use]
    pub fn path(&self) -> &VirtualPath {
        &self.path
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    #[must_use]
    pub fn confirmation_message(&self) -> String {
        if self.is_dir {
            format!(
                "Delete folder '{}' and everything in it?",
                self.path.name()
            )
        } else {
            format!("Delete '{}'?", self.path.name())
        }
    }

    /// Delete the entry.
    ///
    /// The listener hears about the removal before the physical delete
    /// happens; a failing delete still leaves the listener notified.
    pub fn commit(
        self,
        store: &Store,
        listener: &mut dyn ChangeListener,
    ) -> Result<MutationEvent> {
        let event = MutationEvent::Removed {
            path: self.path.clone(),
            is_dir: self.is_dir,
        };
        event.notify(listener);

        let path = self.path;
        store.remove(&path, true).inspect_err(|err| {
            tracing::error!("removing {path} failed: {err}");
        })?;
        tracing::info!("removed {path}");
        Ok(event)
    }
}

pub struct Mutator<'a> {
    store: &'a Store,
}

impl<'a> Mutator<'a> {
    #[must_use]
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn move_node(
        &self,
        request: &MoveRequest,
        listener: &mut dyn ChangeListener,
    ) -> Result<MutationEvent> {
        self.transfer(Transfer::Move, request, listener)
    }

    pub fn copy_node(
        &self,
        request: &CopyRequest,
        listener: &mut dyn ChangeListener,
    ) -> Result<MutationEvent> {
        self.transfer(Transfer::Copy, request, listener)
    }

    /// Run the remove gates. Nothing is deleted until the returned value is
    /// committed.
    pub fn prepare_remove(&self, path: &str, is_folder: bool) -> Result<PendingRemove> {
        let path = VirtualPath::parse(path)?;
        self.guard_root(&path)?;
        let metadata = self.require_source(&path)?;
        let is_dir = metadata.is_dir();
        if is_dir != is_folder {
            tracing::debug!("{path} is a {}, request said otherwise", metadata.kind);
        }
        Ok(PendingRemove { path, is_dir })
    }

    pub fn rename_node(
        &self,
        path: &str,
        new_name: &str,
        listener: &mut dyn ChangeListener,
    ) -> Result<MutationEvent> {
        let from = VirtualPath::parse(path)?;
        self.guard_root(&from)?;
        let new_name = validate_name(new_name)?;
        let is_dir = self.require_source(&from)?.is_dir();

        let parent = from
            .parent()
            .ok_or_else(|| ValidationError::TopLevelFolder(from.clone()))?;
        let to = parent.join(new_name)?;
        if let Some(existing) = self.store.try_stat(&to)? {
            return Err(ConflictError::Exists {
                path: to,
                kind: existing.kind,
            }
            .into());
        }

        self.store.rename(&from, &to)?;
        tracing::info!("renamed {from} -> {to}");

        let event = MutationEvent::Renamed { from, to, is_dir };
        event.notify(listener);
        Ok(event)
    }

    pub fn create_folder(&self, path: &str) -> Result<MutationEvent> {
        let path = VirtualPath::parse(path)?;
        self.require_creatable(&path, EntryKind::Folder)?;
        self.store.mkdir(&path, false)?;
        tracing::info!("created folder {path}");
        Ok(MutationEvent::Created { path, is_dir: true })
    }

    /// Create an empty snippet document titled after the file stem.
    ///
    /// Names without an extension get `.snippet` appended.
    pub fn create_snippet(&self, path: &str) -> Result<MutationEvent> {
        let mut path = VirtualPath::parse(path)?;
        if Utf8Path::new(path.name()).extension().is_none() {
            let named = format!("{}.{SNIPPET_EXTENSION}", path.name());
            path = match path.parent() {
                Some(parent) => parent.join(&named)?,
                None => VirtualPath::parse(&named)?,
            };
        }
        self.require_creatable(&path, EntryKind::File)?;

        let stem = Utf8Path::new(path.name())
            .file_stem()
            .unwrap_or(path.name())
            .to_string();
        let contents = SnippetDocument::new(stem)
            .to_json_pretty()
            .map_err(|source| Error::InvalidDocument {
                path: path.clone(),
                source,
            })?;
        self.store.write_file(&path, contents.as_bytes())?;
        tracing::info!("created snippet {path}");
        Ok(MutationEvent::Created {
            path,
            is_dir: false,
        })
    }

    /// Append a captured selection to a snippet document, returning its uid.
    pub fn append_snippet(
        &self,
        path: &str,
        text: &str,
        file_path: &str,
        line: &str,
    ) -> Result<String> {
        let path = VirtualPath::parse(path)?;
        let raw = self.store.read_to_string(&path)?;
        let mut document =
            SnippetDocument::from_json(&raw).map_err(|source| Error::InvalidDocument {
                path: path.clone(),
                source,
            })?;
        let uid = document.push_entry(text, file_path, line).to_string();
        let contents = document
            .to_json_pretty()
            .map_err(|source| Error::InvalidDocument {
                path: path.clone(),
                source,
            })?;
        self.store.write_file(&path, contents.as_bytes())?;
        tracing::debug!("appended snippet {uid} to {path}");
        Ok(uid)
    }

    /// Answer whether something already occupies `path`.
    pub fn check_destination(&self, path: &str) -> Result<DestinationStatus> {
        let path = VirtualPath::parse(path)?;
        Ok(match self.store.try_stat(&path)? {
            Some(metadata) => DestinationStatus {
                exists: true,
                is_directory: metadata.is_dir(),
            },
            None => DestinationStatus {
                exists: false,
                is_directory: false,
            },
        })
    }

    fn transfer(
        &self,
        transfer: Transfer,
        request: &TransferRequest,
        listener: &mut dyn ChangeListener,
    ) -> Result<MutationEvent> {
        let source = VirtualPath::parse(&request.source)?;
        self.guard_root(&source)?;
        if transfer == Transfer::Move && is_namespace_root(&request.target) {
            return Err(ValidationError::DropIntoRoot.into());
        }
        let target = VirtualPath::parse(&request.target)?;

        let metadata = self.require_source(&source)?;
        let is_dir = metadata.is_dir();
        if is_dir != request.is_folder {
            tracing::debug!("{source} is a {}, request said otherwise", metadata.kind);
        }

        if is_dir && target.starts_with(&source) {
            return Err(ValidationError::IntoItself {
                from: source,
                target,
            }
            .into());
        }
        if source.parent().as_ref() == Some(&target) {
            return Err(ValidationError::InPlaceReorder(source).into());
        }

        match self.store.try_stat(&target)? {
            None => return Err(ValidationError::DestinationMissing(target).into()),
            Some(container) if !container.is_dir() => {
                return Err(ValidationError::DestinationNotDirectory(target).into());
            }
            Some(_) => {}
        }

        let destination = target.join(source.name())?;
        self.guard_containment(&source, &target, &destination, is_dir)?;
        let replaced = self.negotiate_overwrite(&destination, is_dir, request.overwrite)?;

        let event = match transfer {
            Transfer::Move => {
                self.store.rename(&source, &destination)?;
                tracing::info!("moved {source} -> {destination}");
                MutationEvent::Moved {
                    from: source,
                    to: destination,
                    is_dir,
                    replaced,
                }
            }
            Transfer::Copy => {
                self.store.copy(&source, &destination)?;
                tracing::info!("copied {source} -> {destination}");
                if replaced {
                    MutationEvent::Overwritten {
                        path: destination,
                        is_dir,
                    }
                } else {
                    MutationEvent::Copied {
                        from: source,
                        to: destination,
                        is_dir,
                    }
                }
            }
        };
        event.notify(listener);
        Ok(event)
    }

    /// The destination must not contain the source, and a folder must not
    /// land inside itself. Checked on virtual paths and again on physical
    /// ones, since root folders may nest on disk.
    fn guard_containment(
        &self,
        source: &VirtualPath,
        target: &VirtualPath,
        destination: &VirtualPath,
        is_dir: bool,
    ) -> Result<()> {
        let onto_ancestor = || -> Error {
            ValidationError::OntoAncestor {
                from: source.clone(),
                destination: destination.clone(),
            }
            .into()
        };
        if source.starts_with(destination) {
            return Err(onto_ancestor());
        }

        let src = self.store.resolve(source)?;
        let dst = self.store.resolve(destination)?;
        if src == dst {
            return Err(ValidationError::InPlaceReorder(source.clone()).into());
        }
        if src.starts_with(&dst) {
            return Err(onto_ancestor());
        }
        if is_dir && self.store.resolve(target)?.starts_with(&src) {
            return Err(ValidationError::IntoItself {
                from: source.clone(),
                target: target.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Returns whether an existing entry was deleted to make room.
    fn negotiate_overwrite(
        &self,
        destination: &VirtualPath,
        is_dir: bool,
        overwrite: bool,
    ) -> Result<bool> {
        let Some(existing) = self.store.try_stat(destination)? else {
            return Ok(false);
        };

        let incoming = EntryKind::from_is_dir(is_dir);
        if existing.kind != incoming {
            return Err(ConflictError::TypeMismatch {
                path: destination.clone(),
                existing: existing.kind,
                incoming,
            }
            .into());
        }
        if !overwrite {
            tracing::debug!("{destination} exists, waiting for overwrite confirmation");
            return Err(ConflictError::Exists {
                path: destination.clone(),
                kind: existing.kind,
            }
            .into());
        }

        self.store.remove(destination, true)?;
        tracing::debug!("deleted {destination} to make room");
        Ok(true)
    }

    fn guard_root(&self, path: &VirtualPath) -> Result<()> {
        if self.store.resolver().is_root_folder(path) {
            return Err(ValidationError::TopLevelFolder(path.clone()).into());
        }
        Ok(())
    }

    fn require_source(&self, path: &VirtualPath) -> Result<Metadata> {
        self.store
            .try_stat(path)?
            .ok_or_else(|| ValidationError::SourceMissing(path.clone()).into())
    }

    fn require_creatable(&self, path: &VirtualPath, kind: EntryKind) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| ValidationError::TopLevelFolder(path.clone()))?;
        match self.store.try_stat(&parent)? {
            None => return Err(ValidationError::DestinationMissing(parent).into()),
            Some(metadata) if !metadata.is_dir() => {
                return Err(ValidationError::DestinationNotDirectory(parent).into());
            }
            Some(_) => {}
        }
        if let Some(existing) = self.store.try_stat(path)? {
            tracing::debug!("cannot create {kind} {path}: already exists");
            return Err(ConflictError::Exists {
                path: path.clone(),
                kind: existing.kind,
            }
            .into());
        }
        Ok(())
    }
}

fn is_namespace_root(target: &str) -> bool {
    target.trim().chars().all(|c| c == '/' || c == '\\')
}

fn validate_name(name: &str) -> Result<&str, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\'])
    {
        return Err(ValidationError::InvalidName(name.to_string()));
    }
    Ok(trimmed)
}
