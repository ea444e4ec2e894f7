//! Virtual-path storage operations over a pluggable [`FileSystem`].
//!
//! The recursive operations (`mkdir -p`, `rm -r`, tree copy) are written
//! once here against the non-recursive backend primitives, so both backends
//! behave identically.

use std::io;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use camino::Utf8Path;
use camino::Utf8PathBuf;
use serde::Serialize;

use crate::error::Error;
use crate::error::Result;
use crate::paths::PathResolver;
use crate::paths::Root;
use crate::paths::VirtualPath;
use crate::system::FileSystem;
use crate::system::Metadata;

/// A tree entry as shown to the UI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub name: String,
    pub path: VirtualPath,
    pub is_directory: bool,
}

pub struct Store {
    fs: Arc<dyn FileSystem>,
    resolver: RwLock<Arc<PathResolver>>,
}

impl Store {
    pub fn new(fs: Arc<dyn FileSystem>, resolver: PathResolver) -> Self {
        Self {
            fs,
            resolver: RwLock::new(Arc::new(resolver)),
        }
    }

    /// Snapshot of the current resolver.
    #[must_use]
    pub fn resolver(&self) -> Arc<PathResolver> {
        self.resolver
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_resolver(&self, resolver: PathResolver) {
        *self.resolver.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(resolver);
    }

    /// Replace the configured roots, keeping the session root.
    pub fn set_roots(&self, roots: Vec<Root>) {
        let session_root = self.resolver().session_root().to_path_buf();
        self.set_resolver(PathResolver::new(roots, session_root));
    }

    #[must_use]
    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    pub fn resolve(&self, path: &VirtualPath) -> Result<Utf8PathBuf> {
        Ok(self.resolver().resolve(path)?)
    }

    pub fn exists(&self, path: &VirtualPath) -> Result<bool> {
        Ok(self.fs.exists(&self.resolve(path)?))
    }

    pub fn stat(&self, path: &VirtualPath) -> Result<Metadata> {
        let physical = self.resolve(path)?;
        self.fs.metadata(&physical).map_err(|err| Error::io(path, err))
    }

    /// `stat` that maps a missing entry to `None`.
    pub fn try_stat(&self, path: &VirtualPath) -> Result<Option<Metadata>> {
        match self.stat(path) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn read(&self, path: &VirtualPath) -> Result<Vec<u8>> {
        let physical = self.resolve(path)?;
        self.fs.read(&physical).map_err(|err| Error::io(path, err))
    }

    pub fn read_to_string(&self, path: &VirtualPath) -> Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes)
            .map_err(|err| Error::io(path, io::Error::new(io::ErrorKind::InvalidData, err)))
    }

    /// Write a file, creating missing parent folders.
    pub fn write_file(&self, path: &VirtualPath, contents: &[u8]) -> Result<()> {
        let physical = self.resolve(path)?;
        if let Some(parent) = physical.parent() {
            self.create_dir_all(parent)
                .map_err(|err| Error::io(parent, err))?;
        }
        self.fs
            .write(&physical, contents)
            .map_err(|err| Error::io(path, err))
    }

    pub fn mkdir(&self, path: &VirtualPath, recursive: bool) -> Result<()> {
        let physical = self.resolve(path)?;
        let result = if recursive {
            self.create_dir_all(&physical)
        } else {
            self.fs.create_dir(&physical)
        };
        result.map_err(|err| Error::io(path, err))
    }

    pub fn remove(&self, path: &VirtualPath, recursive: bool) -> Result<()> {
        let physical = self.resolve(path)?;
        let result = match self.fs.metadata(&physical) {
            Ok(metadata) if metadata.is_dir() && recursive => self.remove_all(&physical),
            Ok(metadata) if metadata.is_dir() => self.fs.remove_dir(&physical),
            Ok(_) => self.fs.remove_file(&physical),
            Err(err) => Err(err),
        };
        result.map_err(|err| Error::io(path, err))
    }

    /// Copy a file, or a folder with all its descendants.
    pub fn copy(&self, from: &VirtualPath, to: &VirtualPath) -> Result<()> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        if dst.starts_with(&src) {
            return Err(Error::io(
                to,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("cannot copy {from} into itself"),
                ),
            ));
        }
        self.copy_all(&src, &dst).map_err(|err| Error::io(from, err))
    }

    /// Rename a file or folder. Fails when `to` already exists.
    ///
    /// A rename across devices falls back to copy then remove, which is not
    /// atomic.
    pub fn rename(&self, from: &VirtualPath, to: &VirtualPath) -> Result<()> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        if self.fs.exists(&dst) {
            return Err(Error::io(
                to,
                io::Error::new(io::ErrorKind::AlreadyExists, format!("{to} already exists")),
            ));
        }

        match self.fs.rename(&src, &dst) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
                tracing::debug!("rename {src} -> {dst} crosses devices, copying instead");
                self.copy_all(&src, &dst)
                    .and_then(|()| self.remove_all(&src))
                    .map_err(|err| Error::io(from, err))
            }
            Err(err) => Err(Error::io(from, err)),
        }
    }

    /// Children of a folder: folders first, then files, each sorted by name.
    pub fn list(&self, path: &VirtualPath) -> Result<Vec<Node>> {
        let physical = self.resolve(path)?;
        let children = self
            .fs
            .read_dir(&physical)
            .map_err(|err| Error::io(path, err))?;

        let mut nodes = Vec::with_capacity(children.len());
        for child in children {
            let Some(name) = child.file_name() else {
                continue;
            };
            let is_directory = self
                .fs
                .metadata(&child)
                .map_err(|err| Error::io(&child, err))?
                .is_dir();
            nodes.push(Node {
                name: name.to_string(),
                path: path.join(name)?,
                is_directory,
            });
        }

        nodes.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(nodes)
    }

    /// One folder node per configured root, in configuration order.
    pub fn list_roots(&self) -> Result<Vec<Node>> {
        self.resolver()
            .roots()
            .iter()
            .map(|root| {
                Ok(Node {
                    name: root.name().to_string(),
                    path: root.virtual_path()?,
                    is_directory: true,
                })
            })
            .collect()
    }

    fn create_dir_all(&self, path: &Utf8Path) -> io::Result<()> {
        if self.fs.exists(path) {
            return if self.fs.metadata(path)?.is_dir() {
                Ok(())
            } else {
                Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("{path} is not a directory"),
                ))
            };
        }
        if let Some(parent) = path.parent() {
            self.create_dir_all(parent)?;
        }
        match self.fs.create_dir(path) {
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            other => other,
        }
    }

    fn remove_all(&self, path: &Utf8Path) -> io::Result<()> {
        if !self.fs.metadata(path)?.is_dir() {
            return self.fs.remove_file(path);
        }
        for child in self.fs.read_dir(path)? {
            self.remove_all(&child)?;
        }
        self.fs.remove_dir(path)
    }

    fn copy_all(&self, src: &Utf8Path, dst: &Utf8Path) -> io::Result<()> {
        if !self.fs.metadata(src)?.is_dir() {
            let contents = self.fs.read(src)?;
            return self.fs.write(dst, &contents);
        }
        self.create_dir_all(dst)?;
        for child in self.fs.read_dir(src)? {
            if let Some(name) = child.file_name() {
                self.copy_all(&child, &dst.join(name))?;
            }
        }
        Ok(())
    }
}
