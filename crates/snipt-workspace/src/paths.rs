//! Virtual path algebra.
//!
//! A virtual path looks like `Drafts/notes/today.snippet`: the first segment
//! names a configured [`Root`], the rest is relative to that root's physical
//! directory. Everything in this module is syntactic; nothing here touches
//! the disk.

use std::fmt;
use std::str::FromStr;

use camino::Utf8Component;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use serde::Deserialize;
use serde::Serialize;

use crate::error::PathResolutionError;

/// A normalized, root-qualified path in the virtual namespace.
///
/// Two virtual paths denote the same node iff they compare equal. The
/// invariants (no empty segments, no leading or trailing slash, no `..`
/// above the root segment) are established by [`VirtualPath::parse`] and
/// preserved by every method that returns a new path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VirtualPath(String);

impl VirtualPath {
    /// Parse and normalize a virtual path.
    ///
    /// Both `/` and `\` separate segments. Empty and `.` segments are dropped
    /// and `..` is resolved lexically, but never past the root segment.
    pub fn parse(input: &str) -> Result<Self, PathResolutionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PathResolutionError::Empty);
        }

        let mut segments: Vec<&str> = Vec::new();
        for segment in trimmed.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.len() <= 1 {
                        return Err(PathResolutionError::EscapesRoot(input.to_string()));
                    }
                    segments.pop();
                }
                segment => segments.push(segment),
            }
        }

        if segments.is_empty() {
            return Err(PathResolutionError::Empty);
        }

        Ok(Self(segments.join("/")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the root folder this path lives in.
    #[must_use]
    pub fn root(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// True when the path consists of the root segment alone.
    #[must_use]
    pub fn is_root(&self) -> bool {
        !self.0.contains('/')
    }

    /// Last segment (basename).
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Containing folder (dirname); `None` for a top-level path.
    #[must_use]
    pub fn parent(&self) -> Option<VirtualPath> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| VirtualPath(parent.to_string()))
    }

    /// Append one or more segments, normalizing the result.
    pub fn join(&self, child: &str) -> Result<VirtualPath, PathResolutionError> {
        VirtualPath::parse(&format!("{}/{}", self.0, child))
    }

    /// Segment-wise prefix test; a path starts with itself.
    #[must_use]
    pub fn starts_with(&self, base: &VirtualPath) -> bool {
        self.strip_prefix(base).is_some()
    }

    /// True when `self` is a descendant of `base`, excluding `base` itself.
    #[must_use]
    pub fn is_strictly_under(&self, base: &VirtualPath) -> bool {
        self.strip_prefix(base).is_some_and(|rest| !rest.is_empty())
    }

    /// Suffix of `self` below `base`, without the separating slash.
    #[must_use]
    pub fn strip_prefix(&self, base: &VirtualPath) -> Option<&str> {
        let rest = self.0.strip_prefix(base.as_str())?;
        if rest.is_empty() {
            Some(rest)
        } else {
            rest.strip_prefix('/')
        }
    }

    /// Replace the `old` prefix with `new`, keeping the suffix.
    ///
    /// Returns `None` when `self` does not start with `old`.
    #[must_use]
    pub fn with_prefix_replaced(&self, old: &VirtualPath, new: &VirtualPath) -> Option<VirtualPath> {
        let rest = self.strip_prefix(old)?;
        if rest.is_empty() {
            Some(new.clone())
        } else {
            Some(VirtualPath(format!("{new}/{rest}")))
        }
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VirtualPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for VirtualPath {
    type Err = PathResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VirtualPath::parse(s)
    }
}

impl TryFrom<String> for VirtualPath {
    type Error = PathResolutionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        VirtualPath::parse(&value)
    }
}

impl From<VirtualPath> for String {
    fn from(path: VirtualPath) -> Self {
        path.0
    }
}

/// A named top-level folder backed by a physical directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Root {
    name: String,
    physical: Utf8PathBuf,
}

impl Root {
    pub fn new(name: impl Into<String>, physical: impl AsRef<Utf8Path>) -> Self {
        Self {
            name: name.into(),
            physical: normalize_physical(physical.as_ref()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn physical(&self) -> &Utf8Path {
        &self.physical
    }

    /// Virtual path of the root folder itself.
    pub fn virtual_path(&self) -> Result<VirtualPath, PathResolutionError> {
        VirtualPath::parse(&self.name)
    }
}

/// Translates between virtual and physical paths for a fixed set of roots.
#[derive(Clone, Debug, Default)]
pub struct PathResolver {
    roots: Vec<Root>,
    session_root: Utf8PathBuf,
}

impl PathResolver {
    /// Roots keep the given order; it is the enumeration order shown to users.
    pub fn new(roots: Vec<Root>, session_root: impl AsRef<Utf8Path>) -> Self {
        Self {
            roots,
            session_root: normalize_physical(session_root.as_ref()),
        }
    }

    #[must_use]
    pub fn roots(&self) -> &[Root] {
        &self.roots
    }

    #[must_use]
    pub fn session_root(&self) -> &Utf8Path {
        &self.session_root
    }

    #[must_use]
    pub fn root(&self, name: &str) -> Option<&Root> {
        self.roots.iter().find(|root| root.name == name)
    }

    /// True iff `path` is exactly one segment naming a configured root.
    #[must_use]
    pub fn is_root_folder(&self, path: &VirtualPath) -> bool {
        path.is_root() && self.root(path.as_str()).is_some()
    }

    /// Translate user input into a physical path.
    ///
    /// Absolute-looking input is taken to be physical already and is only
    /// normalized.
    pub fn to_absolute(&self, input: &str) -> Result<Utf8PathBuf, PathResolutionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PathResolutionError::Empty);
        }
        if looks_absolute(trimmed) {
            return Ok(normalize_physical(Utf8Path::new(trimmed)));
        }
        self.resolve(&VirtualPath::parse(trimmed)?)
    }

    /// Physical location of a virtual path.
    pub fn resolve(&self, path: &VirtualPath) -> Result<Utf8PathBuf, PathResolutionError> {
        let root = self
            .root(path.root())
            .ok_or_else(|| PathResolutionError::UnknownRoot {
                root: path.root().to_string(),
                path: path.to_string(),
            })?;

        let mut physical = root.physical.clone();
        for segment in path.segments().skip(1) {
            physical.push(segment);
        }
        Ok(physical)
    }

    /// Reconstruct a virtual path from a physical one. Never fails.
    ///
    /// The root with the longest matching physical prefix wins; equal
    /// lengths go to the root configured first. Paths outside every root are
    /// made relative to the session root when possible, otherwise returned
    /// normalized with forward slashes.
    #[must_use]
    pub fn to_relative(&self, physical: &Utf8Path) -> String {
        let normalized = normalize_physical(physical);

        if let Some(path) = self.match_root(&normalized) {
            return path;
        }

        if let Ok(rest) = normalized.strip_prefix(&self.session_root) {
            return join_components(rest);
        }

        normalized.as_str().replace('\\', "/")
    }

    /// Like [`PathResolver::to_relative`] but only succeeds inside a root.
    #[must_use]
    pub fn to_virtual(&self, physical: &Utf8Path) -> Option<VirtualPath> {
        let path = self.match_root(&normalize_physical(physical))?;
        VirtualPath::parse(&path).ok()
    }

    fn match_root(&self, normalized: &Utf8Path) -> Option<String> {
        let mut best: Option<(&Root, usize)> = None;
        for root in &self.roots {
            if !normalized.starts_with(&root.physical) {
                continue;
            }
            let depth = root.physical.components().count();
            if best.is_none_or(|(_, best_depth)| depth > best_depth) {
                best = Some((root, depth));
            }
        }

        let (root, _) = best?;
        let rest = normalized.strip_prefix(&root.physical).ok()?;
        let suffix = join_components(rest);
        if suffix.is_empty() {
            Some(root.name.clone())
        } else {
            Some(format!("{}/{suffix}", root.name))
        }
    }
}

fn join_components(path: &Utf8Path) -> String {
    path.components()
        .map(|component| component.as_str())
        .collect::<Vec<_>>()
        .join("/")
}

fn looks_absolute(input: &str) -> bool {
    if input.starts_with('/') || input.starts_with('\\') {
        return true;
    }
    let bytes = input.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Lexically normalize a physical path: drop `.`, fold `..` into its parent.
#[must_use]
pub fn normalize_physical(path: &Utf8Path) -> Utf8PathBuf {
    let mut normalized = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                match normalized.components().next_back() {
                    Some(Utf8Component::Normal(_)) => {
                        normalized.pop();
                    }
                    Some(Utf8Component::RootDir | Utf8Component::Prefix(_)) => {}
                    _ => normalized.push(".."),
                }
            }
            other => normalized.push(other.as_str()),
        }
    }
    normalized
}
