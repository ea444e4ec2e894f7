use std::sync::Arc;

use camino::Utf8PathBuf;
use snipt_conf::default_roots;
use snipt_conf::ConfigError;
use snipt_conf::FallbackWarning;
use snipt_conf::RootEntry;
use snipt_conf::RootsConfig;
use snipt_conf::Settings;
use snipt_conf::TreeState;
use snipt_workspace::ActiveDocumentTracker;
use snipt_workspace::DestinationStatus;
use snipt_workspace::Error;
use snipt_workspace::FileSystem;
use snipt_workspace::MutationEvent;
use snipt_workspace::Mutator;
use snipt_workspace::Node;
use snipt_workspace::PathResolver;
use snipt_workspace::PendingRemove;
use snipt_workspace::ReloadChoice;
use snipt_workspace::Result;
use snipt_workspace::Root;
use snipt_workspace::SnippetDocument;
use snipt_workspace::Store;
use snipt_workspace::TrackerSignal;
use snipt_workspace::TransferRequest;
use snipt_workspace::VirtualPath;

/// Per-connection state: the store, the active document and the root
/// configuration it was built from.
pub struct Session {
    settings: Settings,
    store: Arc<Store>,
    tracker: ActiveDocumentTracker,
    roots_config: Option<RootsConfig>,
    roots_warning: Option<FallbackWarning>,
    state_file: Option<Utf8PathBuf>,
}

/// Resolver roots for configured entries, with mappings trimmed and `~/`
/// expanded.
#[must_use]
pub fn to_roots(entries: &[RootEntry]) -> Vec<Root> {
    entries
        .iter()
        .map(|entry| Root::new(entry.mapping.trim(), entry.physical()))
        .collect()
}

impl Session {
    pub fn new(settings: Settings, fs: Arc<dyn FileSystem>) -> Self {
        let defaults = default_roots(snipt_conf::data_dir().as_deref());
        let mut roots_config = settings
            .roots_file()
            .map(|path| RootsConfig::new(path, defaults.clone()));
        let (roots, roots_warning) = match roots_config.as_mut() {
            Some(config) => {
                let load = config.load();
                (load.roots, load.warning)
            }
            None => (defaults.clone(), None),
        };

        let resolver = PathResolver::new(to_roots(&roots), settings.session_root());
        let store = Arc::new(Store::new(fs, resolver));
        let state_file = settings.state_file();

        let session = Self {
            settings,
            tracker: ActiveDocumentTracker::new(store.clone()),
            store,
            roots_config,
            roots_warning,
            state_file,
        };
        session.create_default_roots(&roots, &defaults);
        session
    }

    /// A session over an existing store, without settings files.
    pub fn with_store(store: Arc<Store>) -> Self {
        Self {
            settings: Settings::default(),
            tracker: ActiveDocumentTracker::new(store.clone()),
            store,
            roots_config: None,
            roots_warning: None,
            state_file: None,
        }
    }

    #[must_use]
    pub fn with_roots_config(mut self, config: RootsConfig) -> Self {
        self.roots_config = Some(config);
        self
    }

    #[must_use]
    pub fn with_state_file(mut self, path: Utf8PathBuf) -> Self {
        self.state_file = Some(path);
        self
    }

    fn create_default_roots(&self, roots: &[RootEntry], defaults: &[RootEntry]) {
        for entry in roots.iter().filter(|entry| defaults.contains(entry)) {
            let Ok(path) = VirtualPath::parse(&entry.mapping) else {
                continue;
            };
            if let Err(err) = self.store.mkdir(&path, true) {
                tracing::warn!("could not create default root {path}: {err}");
            }
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn tracker(&self) -> &ActiveDocumentTracker {
        &self.tracker
    }

    pub fn roots_warning(&self) -> Option<&FallbackWarning> {
        self.roots_warning.as_ref()
    }

    pub fn roots_file(&self) -> Option<&camino::Utf8Path> {
        self.roots_config.as_ref().map(RootsConfig::path)
    }

    /// Re-read the root configuration and swap the resolver.
    pub fn reload_roots(&mut self) -> Option<&FallbackWarning> {
        let Some(config) = self.roots_config.as_mut() else {
            return None;
        };
        let load = config.load();
        self.store.set_roots(to_roots(&load.roots));
        tracing::info!("reloaded {} root(s) from {}", load.roots.len(), config.path());
        self.roots_warning = load.warning;
        self.roots_warning.as_ref()
    }

    /// Write the default root configuration if there is none yet, returning
    /// the file to show the user.
    pub fn open_config(&self) -> std::result::Result<Option<Utf8PathBuf>, ConfigError> {
        let Some(config) = &self.roots_config else {
            return Ok(None);
        };
        config.write_defaults_if_missing()?;
        Ok(Some(config.path().to_path_buf()))
    }

    pub fn tree_state(&self) -> std::result::Result<TreeState, ConfigError> {
        match &self.state_file {
            Some(path) => TreeState::load(path),
            None => Ok(TreeState::default()),
        }
    }

    pub fn save_tree_state(&self, expanded: Vec<String>) -> std::result::Result<(), ConfigError> {
        let Some(path) = &self.state_file else {
            tracing::debug!("no state file configured, tree state not saved");
            return Ok(());
        };
        TreeState { expanded }.save(path)
    }

    pub fn list_roots(&self) -> Result<Vec<Node>> {
        self.store.list_roots()
    }

    pub fn list(&self, path: &str) -> Result<Vec<Node>> {
        self.store.list(&VirtualPath::parse(path)?)
    }

    pub fn move_node(&mut self, request: &TransferRequest) -> Result<MutationEvent> {
        Mutator::new(&self.store).move_node(request, &mut self.tracker)
    }

    pub fn copy_node(&mut self, request: &TransferRequest) -> Result<MutationEvent> {
        Mutator::new(&self.store).copy_node(request, &mut self.tracker)
    }

    pub fn rename_node(&mut self, path: &str, new_name: &str) -> Result<MutationEvent> {
        Mutator::new(&self.store).rename_node(path, new_name, &mut self.tracker)
    }

    pub fn prepare_remove(&self, path: &str, is_folder: bool) -> Result<PendingRemove> {
        Mutator::new(&self.store).prepare_remove(path, is_folder)
    }

    pub fn commit_remove(&mut self, pending: PendingRemove) -> Result<MutationEvent> {
        pending.commit(&self.store, &mut self.tracker)
    }

    pub fn create_folder(&self, path: &str) -> Result<MutationEvent> {
        Mutator::new(&self.store).create_folder(path)
    }

    pub fn create_snippet(&self, path: &str) -> Result<MutationEvent> {
        Mutator::new(&self.store).create_snippet(path)
    }

    pub fn append_snippet(
        &mut self,
        path: &str,
        text: &str,
        file_path: &str,
        line: &str,
    ) -> Result<String> {
        let uid = Mutator::new(&self.store).append_snippet(path, text, file_path, line)?;
        let target = VirtualPath::parse(path)?;
        if self.tracker.active_path() == Some(&target) {
            self.tracker.open(target)?;
        }
        Ok(uid)
    }

    pub fn check_destination(&self, path: &str) -> Result<DestinationStatus> {
        Mutator::new(&self.store).check_destination(path)
    }

    /// Make `path` the active document and return its parsed contents.
    pub fn open_document(&mut self, path: &str) -> Result<SnippetDocument> {
        let path = VirtualPath::parse(path)?;
        let content = self.store.read_to_string(&path)?;
        let document =
            SnippetDocument::from_json(&content).map_err(|source| Error::InvalidDocument {
                path: path.clone(),
                source,
            })?;
        self.tracker.activate(path, content);
        Ok(document)
    }

    pub fn open_text(&self, path: &str) -> Result<String> {
        self.store.read_to_string(&VirtualPath::parse(path)?)
    }

    pub fn close_document(&mut self) -> Option<VirtualPath> {
        self.tracker.close().map(|document| document.path)
    }

    pub fn resolve_reload(&mut self, reload: bool) -> Result<()> {
        let choice = if reload {
            ReloadChoice::Reload
        } else {
            ReloadChoice::Keep
        };
        self.tracker.resolve_reload(choice)
    }

    pub fn drain_signals(&mut self) -> Vec<TrackerSignal> {
        self.tracker.drain_signals()
    }
}
