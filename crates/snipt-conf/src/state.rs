use std::fs;
use std::io;

use camino::Utf8Path;
use serde::Deserialize;
use serde::Serialize;

use crate::ConfigError;

/// Persisted tree view state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeState {
    #[serde(default)]
    pub expanded: Vec<String>,
}

impl TreeState {
    /// A missing file is an empty state.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::io(path, err)),
        }
    }

    pub fn save(&self, path: &Utf8Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| ConfigError::io(parent, err))?;
        }
        let content = serde_json::to_string(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(|err| ConfigError::io(path, err))
    }
}
