//! Root folder configuration (`roots.json`).
//!
//! The file is a JSON array of `{"folder": "...", "mapping": "..."}`
//! objects. `mapping` names the root in the virtual tree, `folder` is the
//! physical directory behind it.

use std::fmt;
use std::fs;
use std::io;

use camino::Utf8Path;
use camino::Utf8PathBuf;
use directories::BaseDirs;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use serde::Serialize;

use crate::utf8;
use crate::ConfigError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootEntry {
    pub folder: String,
    pub mapping: String,
}

impl RootEntry {
    pub fn new(mapping: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            mapping: mapping.into(),
        }
    }

    /// Physical directory, with a leading `~/` expanded to the home directory.
    #[must_use]
    pub fn physical(&self) -> Utf8PathBuf {
        if let Some(rest) = self.folder.strip_prefix("~/") {
            if let Some(home) = BaseDirs::new().and_then(|dirs| utf8(dirs.home_dir())) {
                return home.join(rest);
            }
        }
        Utf8PathBuf::from(&self.folder)
    }
}

/// Built-in roots under the application data directory.
#[must_use]
pub fn default_roots(data_dir: Option<&Utf8Path>) -> Vec<RootEntry> {
    let Some(data_dir) = data_dir else {
        return Vec::new();
    };
    ["Drafts", "LocalSpace"]
        .into_iter()
        .map(|name| RootEntry::new(name, data_dir.join(name).as_str()))
        .collect()
}

pub fn validate_roots(entries: &[RootEntry]) -> Result<(), ConfigError> {
    if entries.is_empty() {
        return Err(ConfigError::InvalidRoots("no roots configured".to_string()));
    }

    let mut seen = FxHashSet::default();
    for entry in entries {
        let name = entry.mapping.trim();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(ConfigError::InvalidRoots(format!(
                "`{}` is not a valid root name",
                entry.mapping
            )));
        }
        if entry.folder.trim().is_empty() {
            return Err(ConfigError::InvalidRoots(format!(
                "root `{name}` has no folder"
            )));
        }
        if !seen.insert(name) {
            return Err(ConfigError::InvalidRoots(format!(
                "root `{name}` is configured twice"
            )));
        }
    }
    Ok(())
}

/// Why the effective roots differ from the file's contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FallbackWarning {
    UsingLastKnownGood { reason: String },
    UsingDefaults { reason: String },
    NothingUsable { reason: String },
}

impl fmt::Display for FallbackWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackWarning::UsingLastKnownGood { reason } => {
                write!(f, "Root configuration is invalid ({reason}); keeping the previous roots")
            }
            FallbackWarning::UsingDefaults { reason } => {
                write!(f, "Root configuration is invalid ({reason}); using the default roots")
            }
            FallbackWarning::NothingUsable { reason } => {
                write!(f, "Root configuration is invalid ({reason}) and no default roots are available")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootsLoad {
    pub roots: Vec<RootEntry>,
    pub warning: Option<FallbackWarning>,
}

/// The root configuration file plus the fallbacks used when it is unusable.
#[derive(Debug)]
pub struct RootsConfig {
    path: Utf8PathBuf,
    defaults: Vec<RootEntry>,
    last_known_good: Option<Vec<RootEntry>>,
}

impl RootsConfig {
    #[must_use]
    pub fn new(path: Utf8PathBuf, defaults: Vec<RootEntry>) -> Self {
        Self {
            path,
            defaults,
            last_known_good: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    #[must_use]
    pub fn defaults(&self) -> &[RootEntry] {
        &self.defaults
    }

    /// Read the file and decide which roots to use. Never fails.
    pub fn load(&mut self) -> RootsLoad {
        match Self::read(&self.path) {
            Ok(Some(roots)) => {
                self.last_known_good = Some(roots.clone());
                RootsLoad {
                    roots,
                    warning: None,
                }
            }
            Ok(None) => {
                tracing::debug!("{} does not exist, using default roots", self.path);
                self.last_known_good = Some(self.defaults.clone());
                RootsLoad {
                    roots: self.defaults.clone(),
                    warning: None,
                }
            }
            Err(err) => {
                let reason = err.chain();
                let load = if let Some(previous) = &self.last_known_good {
                    RootsLoad {
                        roots: previous.clone(),
                        warning: Some(FallbackWarning::UsingLastKnownGood { reason }),
                    }
                } else if !self.defaults.is_empty() {
                    RootsLoad {
                        roots: self.defaults.clone(),
                        warning: Some(FallbackWarning::UsingDefaults { reason }),
                    }
                } else {
                    RootsLoad {
                        roots: Vec::new(),
                        warning: Some(FallbackWarning::NothingUsable { reason }),
                    }
                };
                if let Some(warning) = &load.warning {
                    tracing::warn!("{warning}");
                }
                load
            }
        }
    }

    /// Parse and validate the file; `Ok(None)` when it does not exist.
    pub fn read(path: &Utf8Path) -> Result<Option<Vec<RootEntry>>, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(ConfigError::io(path, err)),
        };
        let entries: Vec<RootEntry> =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        validate_roots(&entries)?;
        Ok(Some(entries))
    }

    /// Write the default roots if the file is missing. Returns whether it wrote.
    pub fn write_defaults_if_missing(&self) -> Result<bool, ConfigError> {
        if self.path.exists() {
            return Ok(false);
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| ConfigError::io(parent, err))?;
        }
        let content = serde_json::to_string_pretty(&self.defaults).map_err(|source| {
            ConfigError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, content).map_err(|err| ConfigError::io(&self.path, err))?;
        tracing::info!("wrote default root configuration to {}", self.path);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_in(dir: &tempfile::TempDir) -> RootsConfig {
        let path = Utf8PathBuf::from_path_buf(dir.path().join("roots.json")).unwrap();
        RootsConfig::new(path, default_roots(Some(Utf8Path::new("/data"))))
    }

    mod validation {
        use super::*;

        #[test]
        fn test_accepts_well_formed() {
            assert!(validate_roots(&[
                RootEntry::new("Drafts", "/a"),
                RootEntry::new("LocalSpace", "/b"),
            ])
            .is_ok());
        }

        #[test]
        fn test_rejects_bad_entries() {
            let cases = [
                vec![],
                vec![RootEntry::new("", "/a")],
                vec![RootEntry::new("a/b", "/a")],
                vec![RootEntry::new("..", "/a")],
                vec![RootEntry::new("Drafts", " ")],
                vec![RootEntry::new("Drafts", "/a"), RootEntry::new("Drafts", "/b")],
            ];
            for entries in cases {
                assert!(
                    matches!(validate_roots(&entries), Err(ConfigError::InvalidRoots(_))),
                    "{entries:?}"
                );
            }
        }
    }

    mod loading {
        use super::*;

        #[test]
        fn test_missing_file_uses_defaults_silently() {
            let dir = tempdir().unwrap();
            let mut config = config_in(&dir);

            let load = config.load();
            assert_eq!(load.roots, default_roots(Some(Utf8Path::new("/data"))));
            assert_eq!(load.warning, None);
        }

        #[test]
        fn test_valid_file() {
            let dir = tempdir().unwrap();
            let mut config = config_in(&dir);
            fs::write(
                config.path(),
                r#"[{"folder": "/notes", "mapping": "Notes"}]"#,
            )
            .unwrap();

            let load = config.load();
            assert_eq!(load.roots, vec![RootEntry::new("Notes", "/notes")]);
            assert_eq!(load.warning, None);
        }

        #[test]
        fn test_invalid_file_without_history_uses_defaults() {
            let dir = tempdir().unwrap();
            let mut config = config_in(&dir);
            fs::write(config.path(), "{not json").unwrap();

            let load = config.load();
            assert_eq!(load.roots.len(), 2);
            assert!(matches!(
                load.warning,
                Some(FallbackWarning::UsingDefaults { .. })
            ));
        }

        #[test]
        fn test_invalid_file_keeps_last_known_good() {
            let dir = tempdir().unwrap();
            let mut config = config_in(&dir);
            fs::write(config.path(), r#"[{"folder": "/n", "mapping": "Notes"}]"#).unwrap();
            config.load();

            fs::write(config.path(), r#"[{"folder": "/n"}]"#).unwrap();
            let load = config.load();
            assert_eq!(load.roots, vec![RootEntry::new("Notes", "/n")]);
            assert!(matches!(
                load.warning,
                Some(FallbackWarning::UsingLastKnownGood { .. })
            ));
        }

        #[test]
        fn test_nothing_usable() {
            let dir = tempdir().unwrap();
            let path = Utf8PathBuf::from_path_buf(dir.path().join("roots.json")).unwrap();
            fs::write(&path, "[]").unwrap();
            let mut config = RootsConfig::new(path, Vec::new());

            let load = config.load();
            assert!(load.roots.is_empty());
            assert!(matches!(
                load.warning,
                Some(FallbackWarning::NothingUsable { .. })
            ));
        }
    }

    #[test]
    fn test_write_defaults_if_missing() {
        let dir = tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("nested/roots.json")).unwrap();
        let config = RootsConfig::new(path.clone(), default_roots(Some(Utf8Path::new("/data"))));

        assert!(config.write_defaults_if_missing().unwrap());
        assert!(!config.write_defaults_if_missing().unwrap());
        assert_eq!(
            RootsConfig::read(&path).unwrap(),
            Some(default_roots(Some(Utf8Path::new("/data"))))
        );
    }

    #[test]
    fn test_plain_folder_is_not_expanded() {
        assert_eq!(
            RootEntry::new("Notes", "/srv/notes").physical(),
            Utf8PathBuf::from("/srv/notes")
        );
    }
}
