mod roots;
mod state;

use std::path::Path;

use camino::Utf8Path;
use camino::Utf8PathBuf;
use config::Config;
use config::ConfigError as ExternalConfigError;
use config::File;
use config::FileFormat;
use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

pub use roots::default_roots;
pub use roots::validate_roots;
pub use roots::FallbackWarning;
pub use roots::RootEntry;
pub use roots::RootsConfig;
pub use roots::RootsLoad;
pub use state::TreeState;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration build/deserialize error")]
    Config(#[from] ExternalConfigError),
    #[error("Failed to access {path}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid root configuration: {0}")]
    InvalidRoots(String),
}

impl ConfigError {
    pub(crate) fn io(path: &Utf8Path, source: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// The error and all of its causes, joined with `: `.
    #[must_use]
    pub fn chain(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

pub(crate) fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com.github", "snipt", "snipt")
}

pub(crate) fn utf8(path: &Path) -> Option<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).ok()
}

/// Directory for application data (default roots, tree state, logs).
#[must_use]
pub fn data_dir() -> Option<Utf8PathBuf> {
    project_dirs().and_then(|dirs| utf8(dirs.data_dir()))
}

#[must_use]
pub fn config_dir() -> Option<Utf8PathBuf> {
    project_dirs().and_then(|dirs| utf8(dirs.config_dir()))
}

#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    roots_file: Option<Utf8PathBuf>,
    state_file: Option<Utf8PathBuf>,
    session_root: Option<Utf8PathBuf>,
    log_level: Option<String>,
    log_dir: Option<Utf8PathBuf>,
    watch_roots_file: Option<bool>,
}

impl Settings {
    /// Load the user config file, then `explicit` on top when given.
    pub fn new(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let user_config_file = project_dirs().map(|dirs| dirs.config_dir().join("snipt.toml"));

        Self::load_from_paths(user_config_file.as_deref(), explicit)
    }

    fn load_from_paths(
        user_config_path: Option<&Path>,
        explicit_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = user_config_path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        if let Some(path) = explicit_path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let config = builder.build()?;
        let settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Location of `roots.json`; `None` when no config directory can be found.
    #[must_use]
    pub fn roots_file(&self) -> Option<Utf8PathBuf> {
        self.roots_file
            .clone()
            .or_else(|| config_dir().map(|dir| dir.join("roots.json")))
    }

    #[must_use]
    pub fn state_file(&self) -> Option<Utf8PathBuf> {
        self.state_file
            .clone()
            .or_else(|| data_dir().map(|dir| dir.join("tree-state.json")))
    }

    #[must_use]
    pub fn session_root(&self) -> Utf8PathBuf {
        self.session_root.clone().unwrap_or_else(|| {
            std::env::current_dir()
                .ok()
                .and_then(|dir| utf8(&dir))
                .unwrap_or_else(|| Utf8PathBuf::from("."))
        })
    }

    #[must_use]
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    #[must_use]
    pub fn log_dir(&self) -> Utf8PathBuf {
        self.log_dir
            .clone()
            .or_else(|| data_dir().map(|dir| dir.join("logs")))
            .or_else(|| utf8(&std::env::temp_dir()))
            .unwrap_or_else(|| Utf8PathBuf::from("."))
    }

    #[must_use]
    pub fn watch_roots_file(&self) -> bool {
        self.watch_roots_file.unwrap_or(true)
    }

    #[must_use]
    pub fn with_watch_roots_file(mut self, watch: bool) -> Self {
        self.watch_roots_file = Some(watch);
        self
    }
}
