//! Physical storage backends.
//!
//! [`OsFileSystem`] talks to the real disk; [`InMemoryFileSystem`] keeps a
//! tree in memory so the same store logic can run in tests and in sessions
//! that should never touch the host.

use std::collections::BTreeMap;
use std::io;
use std::ops::Bound;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::SystemTime;

use camino::Utf8Path;
use camino::Utf8PathBuf;

use crate::error::EntryKind;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    pub kind: EntryKind,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl Metadata {
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Minimal set of operations the store needs from a backend.
///
/// Semantics follow [`std::fs`]: `create_dir` and `remove_dir` are not
/// recursive, and `rename` fails when the destination parent is missing.
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Utf8Path) -> bool;
    fn metadata(&self, path: &Utf8Path) -> io::Result<Metadata>;
    fn read(&self, path: &Utf8Path) -> io::Result<Vec<u8>>;
    fn write(&self, path: &Utf8Path, contents: &[u8]) -> io::Result<()>;
    fn create_dir(&self, path: &Utf8Path) -> io::Result<()>;
    /// Immediate children, in no particular order.
    fn read_dir(&self, path: &Utf8Path) -> io::Result<Vec<Utf8PathBuf>>;
    fn remove_file(&self, path: &Utf8Path) -> io::Result<()>;
    fn remove_dir(&self, path: &Utf8Path) -> io::Result<()>;
    fn rename(&self, from: &Utf8Path, to: &Utf8Path) -> io::Result<()>;
}

/// Standard file system implementation that uses [`std::fs`].
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn exists(&self, path: &Utf8Path) -> bool {
        path.exists()
    }

    fn metadata(&self, path: &Utf8Path) -> io::Result<Metadata> {
        let metadata = std::fs::metadata(path)?;
        Ok(Metadata {
            kind: EntryKind::from_is_dir(metadata.is_dir()),
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }

    fn read(&self, path: &Utf8Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write(&self, path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
        std::fs::write(path, contents)
    }

    fn create_dir(&self, path: &Utf8Path) -> io::Result<()> {
        std::fs::create_dir(path)
    }

    fn read_dir(&self, path: &Utf8Path) -> io::Result<Vec<Utf8PathBuf>> {
        path.read_dir_utf8()?
            .map(|entry| entry.map(|e| e.path().to_path_buf()))
            .collect()
    }

    fn remove_file(&self, path: &Utf8Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Utf8Path) -> io::Result<()> {
        std::fs::remove_dir(path)
    }

    fn rename(&self, from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }
}

#[derive(Clone, Debug)]
enum Entry {
    File {
        contents: Vec<u8>,
        modified: SystemTime,
    },
    Dir,
}

/// In-memory tree keyed by absolute path.
///
/// A path without a parent (the filesystem root) always exists as a folder.
#[derive(Debug, Default)]
pub struct InMemoryFileSystem {
    entries: Mutex<BTreeMap<Utf8PathBuf, Entry>>,
}

impl InMemoryFileSystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file, creating any missing parent folders.
    pub fn add_file(&self, path: impl Into<Utf8PathBuf>, contents: impl Into<Vec<u8>>) {
        let path = path.into();
        let mut entries = self.lock();
        insert_parents(&mut entries, &path);
        entries.insert(
            path,
            Entry::File {
                contents: contents.into(),
                modified: SystemTime::now(),
            },
        );
    }

    /// Seed a folder, creating any missing parent folders.
    pub fn add_dir(&self, path: impl Into<Utf8PathBuf>) {
        let path = path.into();
        let mut entries = self.lock();
        insert_parents(&mut entries, &path);
        entries.insert(path, Entry::Dir);
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<Utf8PathBuf, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn insert_parents(entries: &mut BTreeMap<Utf8PathBuf, Entry>, path: &Utf8Path) {
    for ancestor in path.ancestors().skip(1) {
        if ancestor.parent().is_none() {
            break;
        }
        entries.entry(ancestor.to_path_buf()).or_insert(Entry::Dir);
    }
}

fn is_dir(entries: &BTreeMap<Utf8PathBuf, Entry>, path: &Utf8Path) -> bool {
    path.parent().is_none() || matches!(entries.get(path), Some(Entry::Dir))
}

fn contains(entries: &BTreeMap<Utf8PathBuf, Entry>, path: &Utf8Path) -> bool {
    path.parent().is_none() || entries.contains_key(path)
}

fn descendants<'a>(
    entries: &'a BTreeMap<Utf8PathBuf, Entry>,
    path: &'a Utf8Path,
) -> impl Iterator<Item = &'a Utf8PathBuf> + 'a {
    entries
        .range::<Utf8Path, _>((Bound::Excluded(path), Bound::Unbounded))
        .map(|(key, _)| key)
        .take_while(move |key| key.starts_with(path))
}

fn not_found(path: &Utf8Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{path} not found"))
}

fn already_exists(path: &Utf8Path) -> io::Error {
    io::Error::new(io::ErrorKind::AlreadyExists, format!("{path} already exists"))
}

fn require_parent_dir(entries: &BTreeMap<Utf8PathBuf, Entry>, path: &Utf8Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !is_dir(entries, parent) => Err(not_found(parent)),
        _ => Ok(()),
    }
}

impl FileSystem for InMemoryFileSystem {
    fn exists(&self, path: &Utf8Path) -> bool {
        contains(&self.lock(), path)
    }

    fn metadata(&self, path: &Utf8Path) -> io::Result<Metadata> {
        let entries = self.lock();
        if path.parent().is_none() {
            return Ok(Metadata {
                kind: EntryKind::Folder,
                len: 0,
                modified: None,
            });
        }
        match entries.get(path) {
            Some(Entry::File { contents, modified }) => Ok(Metadata {
                kind: EntryKind::File,
                len: contents.len() as u64,
                modified: Some(*modified),
            }),
            Some(Entry::Dir) => Ok(Metadata {
                kind: EntryKind::Folder,
                len: 0,
                modified: None,
            }),
            None => Err(not_found(path)),
        }
    }

    fn read(&self, path: &Utf8Path) -> io::Result<Vec<u8>> {
        match self.lock().get(path) {
            Some(Entry::File { contents, .. }) => Ok(contents.clone()),
            Some(Entry::Dir) => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("{path} is a directory"),
            )),
            None => Err(not_found(path)),
        }
    }

    fn write(&self, path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
        let mut entries = self.lock();
        require_parent_dir(&entries, path)?;
        if is_dir(&entries, path) {
            return Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("{path} is a directory"),
            ));
        }
        entries.insert(
            path.to_path_buf(),
            Entry::File {
                contents: contents.to_vec(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn create_dir(&self, path: &Utf8Path) -> io::Result<()> {
        let mut entries = self.lock();
        if contains(&entries, path) {
            return Err(already_exists(path));
        }
        require_parent_dir(&entries, path)?;
        entries.insert(path.to_path_buf(), Entry::Dir);
        Ok(())
    }

    fn read_dir(&self, path: &Utf8Path) -> io::Result<Vec<Utf8PathBuf>> {
        let entries = self.lock();
        if !contains(&entries, path) {
            return Err(not_found(path));
        }
        if !is_dir(&entries, path) {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{path} is not a directory"),
            ));
        }
        Ok(descendants(&entries, path)
            .filter(|key| key.parent() == Some(path))
            .cloned()
            .collect())
    }

    fn remove_file(&self, path: &Utf8Path) -> io::Result<()> {
        let mut entries = self.lock();
        match entries.get(path) {
            Some(Entry::File { .. }) => {
                entries.remove(path);
                Ok(())
            }
            Some(Entry::Dir) => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("{path} is a directory"),
            )),
            None => Err(not_found(path)),
        }
    }

    fn remove_dir(&self, path: &Utf8Path) -> io::Result<()> {
        let mut entries = self.lock();
        match entries.get(path) {
            Some(Entry::Dir) => {
                if descendants(&entries, path).next().is_some() {
                    return Err(io::Error::new(
                        io::ErrorKind::DirectoryNotEmpty,
                        format!("{path} is not empty"),
                    ));
                }
                entries.remove(path);
                Ok(())
            }
            Some(Entry::File { .. }) => Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{path} is not a directory"),
            )),
            None => Err(not_found(path)),
        }
    }

    fn rename(&self, from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
        let mut entries = self.lock();
        let Some(entry) = entries.get(from).cloned() else {
            return Err(not_found(from));
        };
        require_parent_dir(&entries, to)?;
        if to.starts_with(from) && to != from {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot move {from} into itself"),
            ));
        }
        match (&entry, entries.get(to)) {
            (_, None) | (Entry::File { .. }, Some(Entry::File { .. })) => {}
            _ => return Err(already_exists(to)),
        }

        let moved: Vec<Utf8PathBuf> = descendants(&entries, from).cloned().collect();
        for old in moved {
            if let Some(child) = entries.remove(&old) {
                if let Ok(rest) = old.strip_prefix(from) {
                    entries.insert(to.join(rest), child);
                }
            }
        }
        entries.remove(from);
        entries.insert(to.to_path_buf(), entry);
        Ok(())
    }
}
